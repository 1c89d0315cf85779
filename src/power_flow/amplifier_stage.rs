//! Stage 1: amplifier and powered-speaker electrical draw.

use itertools::Itertools;

use super::primitives::{
    apparent_power_va, db_to_power_ratio, effective_impedance, percent_of, spl_sum, LoadBranch,
};
use super::snapshot::{AmplifierReport, ChannelReport, PoweredSpeakerReport};
use crate::crest::{aggregate, CrestAlgorithm};
use crate::domain::{
    AmpChannel, Amplifier, ChannelRole, GlobalSettings, PoweredSpeaker, Rig, Speaker, TargetType,
    DEFAULT_IMPEDANCE_OHMS,
};

/// Average and worst-case crest factor of one pass band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandCrest {
    /// Crest from the configured algorithm
    pub average: f64,
    /// Crest from the `peak` algorithm (≤ `average`)
    pub peak: f64,
}

/// Crest factors of the band `(hpf, lpf)` under the active content model
pub fn band_crest(band: (f64, f64), settings: &GlobalSettings) -> BandCrest {
    let (hpf, lpf) = band;
    let curve = settings.active_curve();
    let intervals = settings.frequency_samples.max(1);
    BandCrest {
        average: aggregate(hpf, lpf, curve, settings.crest_algorithm, intervals),
        peak: aggregate(hpf, lpf, curve, CrestAlgorithm::Peak, intervals),
    }
}

/// Electrical draw for a given audio power, crest factor and efficiency
///
/// `audio / 10^(crest/10) × efficiency`, never negative.
pub fn electrical_draw(audio_watts: f64, crest_db: f64, efficiency: f64) -> f64 {
    let draw = audio_watts / db_to_power_ratio(crest_db) * efficiency;
    if draw.is_finite() {
        draw.max(0.0)
    } else {
        0.0
    }
}

/// Speakers wired to an amplifier channel
pub fn connected_speakers<'r>(rig: &'r Rig, channel: &AmpChannel) -> Vec<&'r Speaker> {
    rig.graph()
        .downstream_of(channel.id)
        .filter(|c| c.target_type == TargetType::Speaker)
        .filter_map(|c| rig.speaker(c.target_id))
        .collect()
}

fn compute_channel(
    rig: &Rig,
    amp: &Amplifier,
    channel: &AmpChannel,
    settings: &GlobalSettings,
) -> ChannelReport {
    let crest = band_crest(channel.crossover.band(), settings);
    let speakers = if channel.is_driving() {
        connected_speakers(rig, channel)
    } else {
        Vec::new()
    };

    let idle = ChannelReport {
        channel_id: channel.id,
        effective_z: DEFAULT_IMPEDANCE_OHMS,
        music_power_watts: 0.0,
        energy_watts: 0.0,
        peak_energy_watts: 0.0,
        average_crest: crest.average,
        peak_crest: crest.peak,
        impedance_warning: false,
    };
    if speakers.is_empty() {
        return idle;
    }

    let branches = speakers
        .iter()
        .map(|s| LoadBranch {
            impedance_ohms: s.load_impedance_ohms(),
            cable_ohms: s.cable_ohms(),
            quantity: s.quantity,
        })
        .collect_vec();
    let effective_z = effective_impedance(&branches);

    let rated_audio: f64 = speakers
        .iter()
        .map(|s| s.pmax_watts * s.quantity as f64)
        .sum();
    let music_power_watts = rated_audio * db_to_power_ratio(channel.effective_gain_db());

    let min_z = match channel.role {
        ChannelRole::BridgedPrimary { .. } => amp.min_impedance_ohms * 2.0,
        _ => amp.min_impedance_ohms,
    };

    ChannelReport {
        effective_z,
        music_power_watts,
        energy_watts: electrical_draw(music_power_watts, crest.average, amp.efficiency),
        peak_energy_watts: electrical_draw(music_power_watts, crest.peak, amp.efficiency),
        impedance_warning: effective_z < min_z,
        ..idle
    }
}

/// Per-channel and aggregate draw of one amplifier
pub fn compute_amplifier(rig: &Rig, amp: &Amplifier, settings: &GlobalSettings) -> AmplifierReport {
    let channels = amp
        .channels
        .iter()
        .map(|ch| compute_channel(rig, amp, ch, settings))
        .collect_vec();

    let parasitic = amp.parasitic_watts.max(0.0);
    let rms_watts_drawn = channels.iter().map(|c| c.energy_watts).sum::<f64>() + parasitic;
    let peak_rms_watts_drawn = channels.iter().map(|c| c.peak_energy_watts).sum::<f64>() + parasitic;

    AmplifierReport {
        amplifier_id: amp.id,
        channels,
        rms_watts_drawn,
        peak_rms_watts_drawn,
        apparent_power_va: apparent_power_va(rms_watts_drawn, amp.power_factor),
        utilization_percent: percent_of(rms_watts_drawn, amp.pmax_watts),
        peak_utilization_percent: percent_of(peak_rms_watts_drawn, amp.pmax_watts),
    }
}

/// Draw of a self-powered speaker running at its rated output
pub fn compute_powered_speaker(
    speaker: &PoweredSpeaker,
    settings: &GlobalSettings,
) -> PoweredSpeakerReport {
    let crest = band_crest(speaker.crossover.band(), settings);
    let quantity = speaker.quantity as f64;
    let audio_watts = speaker.pmax_watts * quantity;
    let parasitic = speaker.parasitic_watts.max(0.0) * quantity;

    PoweredSpeakerReport {
        speaker_id: speaker.id,
        average_crest: crest.average,
        peak_crest: crest.peak,
        rms_watts_drawn: electrical_draw(audio_watts, crest.average, speaker.efficiency) + parasitic,
        peak_rms_watts_drawn: electrical_draw(audio_watts, crest.peak, speaker.efficiency)
            + parasitic,
        spl_output: spl_sum(
            speaker.sensitivity_db,
            speaker.pmax_watts,
            speaker.quantity,
            settings.array_summation_factor,
            settings.spl_reference_distance_m,
        ),
    }
}

/// Run the amplifier stage over the whole rig
pub fn compute(rig: &Rig, settings: &GlobalSettings) -> (Vec<AmplifierReport>, Vec<PoweredSpeakerReport>) {
    let amplifiers = rig
        .amplifiers
        .iter()
        .map(|amp| compute_amplifier(rig, amp, settings))
        .collect();
    let powered = rig
        .powered_speakers
        .iter()
        .map(|spk| compute_powered_speaker(spk, settings))
        .collect();
    (amplifiers, powered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crest::CrestCurve;
    use crate::domain::{Connection, Crossover, SourceType};
    use proptest::prelude::*;

    fn flat_settings() -> GlobalSettings {
        GlobalSettings::with_custom_curve(CrestCurve::flat(8.0))
    }

    /// One amp, one channel (30-100 Hz), wired to the given speakers
    fn rig_with(speakers: Vec<Speaker>) -> Rig {
        let mut amp = Amplifier::new("Amp", 1000.0, 0.85, 50.0, 2);
        amp.channels[0].crossover = Crossover::band_pass(30.0, 100.0);
        let ch = amp.channels[0].id;
        let mut rig = Rig::new();
        for spk in speakers {
            rig.connections.push(Connection::new(
                ch,
                SourceType::AmpChannel,
                spk.id,
                TargetType::Speaker,
                "",
            ));
            rig.speakers.push(spk);
        }
        rig.amplifiers.push(amp);
        rig
    }

    #[test]
    fn test_single_speaker_draw() {
        let rig = rig_with(vec![Speaker::new("Sub", 1000.0, 8.0, 98.0)]);
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &flat_settings());
        let ch = &report.channels[0];

        assert!((ch.music_power_watts - 1000.0).abs() < 1e-9);
        assert!((ch.energy_watts - 134.72).abs() < 0.01);
        assert!((report.rms_watts_drawn - 184.72).abs() < 0.01);
        assert!((report.utilization_percent - 18.47).abs() < 0.01);
        assert_eq!(ch.effective_z, 8.0);
    }

    #[test]
    fn test_unconnected_and_disabled_channels_idle() {
        let mut rig = rig_with(vec![Speaker::new("Sub", 1000.0, 8.0, 98.0)]);
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &flat_settings());
        let idle = &report.channels[1];
        assert_eq!(idle.energy_watts, 0.0);
        assert_eq!(idle.effective_z, DEFAULT_IMPEDANCE_OHMS);

        rig.amplifiers[0].channels[0].enabled = false;
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &flat_settings());
        assert_eq!(report.channels[0].music_power_watts, 0.0);
        assert_eq!(report.channels[0].effective_z, DEFAULT_IMPEDANCE_OHMS);
        // parasitic draw only
        assert_eq!(report.rms_watts_drawn, 50.0);
    }

    #[test]
    fn test_quantity_scales_power_and_parallels_impedance() {
        let rig = rig_with(vec![Speaker::new("Sub", 1000.0, 8.0, 98.0).with_quantity(4)]);
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &flat_settings());
        let ch = &report.channels[0];
        assert!((ch.music_power_watts - 4000.0).abs() < 1e-9);
        assert!((ch.effective_z - 2.0).abs() < 1e-9);
        // 2 Ω is the default minimum, so no warning yet
        assert!(!ch.impedance_warning);
    }

    #[test]
    fn test_low_impedance_warning() {
        let rig = rig_with(vec![Speaker::new("Sub", 1000.0, 4.0, 98.0).with_quantity(4)]);
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &flat_settings());
        assert!(report.channels[0].impedance_warning);
    }

    #[test]
    fn test_bridged_secondary_never_drives() {
        let mut rig = rig_with(vec![]);
        rig.amplifiers[0].bridge(0).unwrap();
        let secondary = rig.amplifiers[0].channels[1].id;
        let spk = Speaker::new("Top", 500.0, 8.0, 98.0);
        rig.connections.push(Connection::new(
            secondary,
            SourceType::AmpChannel,
            spk.id,
            TargetType::Speaker,
            "",
        ));
        rig.speakers.push(spk);
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &flat_settings());
        assert_eq!(report.channels[1].music_power_watts, 0.0);
    }

    #[test]
    fn test_gain_reduces_music_power() {
        let mut rig = rig_with(vec![Speaker::new("Sub", 1000.0, 8.0, 98.0)]);
        rig.amplifiers[0].channels[0].gain_db = -3.0;
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &flat_settings());
        assert!((report.channels[0].music_power_watts - 501.187).abs() < 0.01);
    }

    #[test]
    fn test_peak_crest_yields_more_energy() {
        let rig = rig_with(vec![Speaker::new("Sub", 1000.0, 8.0, 98.0)]);
        let settings = GlobalSettings::with_custom_curve(CrestCurve::from_pairs(&[
            (30.0, 6.0),
            (100.0, 10.0),
        ]));
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &settings);
        let ch = &report.channels[0];
        assert!((ch.peak_crest - 6.0).abs() < 1e-9);
        assert!(ch.peak_crest <= ch.average_crest);
        assert!(ch.peak_energy_watts >= ch.energy_watts);
        assert!(report.peak_rms_watts_drawn >= report.rms_watts_drawn);
    }

    #[test]
    fn test_zero_pmax_amplifier_reports_zero_utilization() {
        let mut rig = rig_with(vec![Speaker::new("Sub", 1000.0, 8.0, 98.0)]);
        rig.amplifiers[0].pmax_watts = 0.0;
        let report = compute_amplifier(&rig, &rig.amplifiers[0], &flat_settings());
        assert_eq!(report.utilization_percent, 0.0);
        assert_eq!(report.peak_utilization_percent, 0.0);
    }

    #[test]
    fn test_powered_speaker_draw() {
        let mut spk = PoweredSpeaker::new("Wedge", 1000.0, 0.85, 128.0);
        spk.quantity = 2;
        spk.parasitic_watts = 20.0;
        spk.crossover = Crossover::band_pass(30.0, 100.0);
        let report = compute_powered_speaker(&spk, &flat_settings());
        // 2 × 134.72 W + 2 × 20 W
        assert!((report.rms_watts_drawn - 309.43).abs() < 0.01);
        assert!(report.spl_output.is_some());
    }

    proptest! {
        #[test]
        fn prop_energy_monotonic_in_gain(g1 in -40.0f64..0.0, g2 in -40.0f64..0.0) {
            let (lo, hi) = if g1 <= g2 { (g1, g2) } else { (g2, g1) };
            let mut rig = rig_with(vec![Speaker::new("Sub", 1000.0, 8.0, 98.0)]);
            let settings = flat_settings();

            rig.amplifiers[0].channels[0].gain_db = lo;
            let quiet = compute_amplifier(&rig, &rig.amplifiers[0], &settings).channels[0].energy_watts;
            rig.amplifiers[0].channels[0].gain_db = hi;
            let loud = compute_amplifier(&rig, &rig.amplifiers[0], &settings).channels[0].energy_watts;

            prop_assert!(loud >= quiet);
        }
    }
}
