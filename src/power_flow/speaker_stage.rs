//! Stage 2: feed amplifier results back onto the passive speakers.

use super::primitives::{percent_of, spl_sum};
use super::snapshot::{AmplifierReport, SpeakerReport};
use crate::domain::{GlobalSettings, Rig, SourceType, Speaker};

/// Incoming power, utilization and SPL of one speaker
///
/// A speaker driven by more than one channel takes its power from the first
/// upstream edge only.
pub fn compute_speaker(
    rig: &Rig,
    speaker: &Speaker,
    amplifiers: &[AmplifierReport],
    settings: &GlobalSettings,
) -> SpeakerReport {
    let source_channel = rig
        .graph()
        .upstream_of(speaker.id)
        .find(|c| c.source_type == SourceType::AmpChannel)
        .map(|c| c.source_id);

    let incoming_power_watts = source_channel
        .and_then(|ch| amplifiers.iter().find_map(|a| a.channel(ch)))
        .map(|ch| ch.music_power_watts)
        .unwrap_or(0.0);

    let quantity = speaker.quantity.max(1) as f64;
    let spl_output = spl_sum(
        speaker.sensitivity_db,
        incoming_power_watts / quantity,
        speaker.quantity,
        settings.array_summation_factor,
        settings.spl_reference_distance_m,
    );

    SpeakerReport {
        speaker_id: speaker.id,
        source_channel,
        incoming_power_watts,
        utilization_percent: percent_of(
            incoming_power_watts,
            speaker.pmax_watts * speaker.quantity as f64,
        ),
        spl_output,
    }
}

pub fn compute(rig: &Rig, amplifiers: &[AmplifierReport], settings: &GlobalSettings) -> Vec<SpeakerReport> {
    rig.speakers
        .iter()
        .map(|spk| compute_speaker(rig, spk, amplifiers, settings))
        .collect()
}
