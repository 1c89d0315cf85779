//! Stage 3: distro outlet loads and generator capacity.

use super::primitives::{
    altitude_derate, cable_resistance_ohms, feeder_loss, kva_to_watts, percent_of,
    temperature_derate, user_derate,
};
use super::snapshot::{AmplifierReport, DistroChannelReport, GeneratorReport, PoweredSpeakerReport};
use super::three_phase::ThreePhasePower;
use crate::domain::{
    Current, DistroChannel, Generator, GlobalSettings, PhaseType, Power, RatingType, Rig,
    TargetType, Temperature, Voltage,
};

fn rating_to_watts(generator: &Generator, rating: f64) -> f64 {
    match generator.rating_type {
        RatingType::Watts => rating,
        RatingType::Kva => kva_to_watts(rating, generator.power_factor),
    }
}

/// Continuous rating of a generator in watts, before derating
pub fn rated_watts(generator: &Generator) -> f64 {
    rating_to_watts(generator, generator.continuous_rating)
}

/// Peak/standby rating in watts, before derating
pub fn rated_peak_watts(generator: &Generator) -> f64 {
    rating_to_watts(generator, generator.peak_rating)
}

/// (average, peak) draw of everything plugged into one outlet
fn outlet_load(
    rig: &Rig,
    channel: &DistroChannel,
    amplifiers: &[AmplifierReport],
    powered: &[PoweredSpeakerReport],
) -> (f64, f64) {
    rig.graph()
        .downstream_of(channel.id)
        .filter_map(|c| match c.target_type {
            TargetType::Amp => amplifiers
                .iter()
                .find(|a| a.amplifier_id == c.target_id)
                .map(|a| (a.rms_watts_drawn, a.peak_rms_watts_drawn)),
            TargetType::PoweredSpeaker => powered
                .iter()
                .find(|p| p.speaker_id == c.target_id)
                .map(|p| (p.rms_watts_drawn, p.peak_rms_watts_drawn)),
            // rejected by the graph rules
            TargetType::Speaker => None,
        })
        .fold((0.0, 0.0), |(avg, peak), (a, p)| (avg + a, peak + p))
}

fn compute_channel(
    rig: &Rig,
    generator: &Generator,
    channel: &DistroChannel,
    amplifiers: &[AmplifierReport],
    powered: &[PoweredSpeakerReport],
) -> DistroChannelReport {
    let (load_watts, peak_load_watts) = outlet_load(rig, channel, amplifiers, powered);
    let cable = feeder_loss(
        load_watts,
        generator.voltage,
        channel.output_phase,
        cable_resistance_ohms(&channel.cable),
    );

    DistroChannelReport {
        channel_id: channel.id,
        load_watts,
        peak_load_watts,
        current_amps: cable.current_a,
        breaker_utilization_percent: percent_of(cable.current_a, channel.breaker_amps),
        cable,
    }
}

/// Outlet loads, derated capacity and feeder losses of one generator
pub fn compute_generator(
    rig: &Rig,
    generator: &Generator,
    amplifiers: &[AmplifierReport],
    powered: &[PoweredSpeakerReport],
    settings: &GlobalSettings,
) -> GeneratorReport {
    let channels: Vec<DistroChannelReport> = generator
        .channels
        .iter()
        .map(|ch| compute_channel(rig, generator, ch, amplifiers, powered))
        .collect();

    let mut total_load_watts = 0.0;
    let mut total_peak_load_watts = 0.0;
    let mut phase_loads = ThreePhasePower::default();
    for (channel, report) in generator.channels.iter().zip(&channels) {
        if !channel.enabled {
            continue;
        }
        total_load_watts += report.load_watts;
        total_peak_load_watts += report.peak_load_watts;
        phase_loads = phase_loads.add(&ThreePhasePower::on_selector(report.load_watts, channel.phase));
    }

    let phase_unbalance = match generator.phase {
        PhaseType::Three => phase_loads.unbalance_factor(),
        PhaseType::Single => {
            phase_loads = phase_loads.as_single_phase();
            0.0
        }
    };

    let rated = rated_watts(generator);
    let rated_peak = rated_peak_watts(generator);

    let feeder = feeder_loss(
        total_load_watts,
        generator.voltage,
        generator.phase,
        cable_resistance_ohms(&generator.feeder_cable),
    );

    let mut report = GeneratorReport {
        generator_id: generator.id,
        channels,
        total_load_watts,
        total_peak_load_watts,
        rated_watts: rated,
        rated_peak_watts: rated_peak,
        temperature_derate: temperature_derate(settings.ambient_temperature_c),
        altitude_derate: altitude_derate(settings.altitude_m),
        user_derate: user_derate(generator.user_derate_percent),
        effective_watts: 0.0,
        peak_capacity_watts: 0.0,
        utilization_percent: 0.0,
        peak_utilization_percent: 0.0,
        feeder,
        phase_loads,
        phase_unbalance,
    };
    let derate = report.total_derate();
    report.effective_watts = rated * derate;
    report.peak_capacity_watts = rated_peak * derate;
    // peak load is judged against continuous capacity; the peak rating is reported alongside
    report.utilization_percent = percent_of(total_load_watts, report.effective_watts);
    report.peak_utilization_percent = percent_of(total_peak_load_watts, report.effective_watts);
    report
}

pub fn compute(
    rig: &Rig,
    amplifiers: &[AmplifierReport],
    powered: &[PoweredSpeakerReport],
    settings: &GlobalSettings,
) -> Vec<GeneratorReport> {
    rig.generators
        .iter()
        .map(|g| compute_generator(rig, g, amplifiers, powered, settings))
        .collect()
}

/// Human-readable steps from nameplate rating to effective capacity
pub fn derate_breakdown(
    generator: &Generator,
    report: &GeneratorReport,
    settings: &GlobalSettings,
) -> Vec<String> {
    let mut lines = Vec::new();

    match generator.rating_type {
        RatingType::Watts => lines.push(format!("Rated: {}", Power::watts(report.rated_watts))),
        RatingType::Kva => lines.push(format!(
            "Rated: {:.1} kVA × PF {:.2} = {}",
            generator.continuous_rating,
            generator.power_factor,
            Power::watts(report.rated_watts)
        )),
    }
    lines.push(format!(
        "Temperature {}: ×{:.2}",
        Temperature(settings.ambient_temperature_c),
        report.temperature_derate
    ));
    lines.push(format!(
        "Altitude {:.0} m: ×{:.2}",
        settings.altitude_m, report.altitude_derate
    ));
    lines.push(format!(
        "User margin {:.0}%: ×{:.2}",
        generator.user_derate_percent, report.user_derate
    ));
    lines.push(format!("Effective: {}", Power::watts(report.effective_watts)));
    lines.push(format!(
        "Load: {} ({:.1}%), headroom {}",
        Power::watts(report.total_load_watts),
        report.utilization_percent,
        report.headroom()
    ));
    lines.push(format!(
        "Peak: {} of {} peak capacity ({:.1}%)",
        Power::watts(report.total_peak_load_watts),
        Power::watts(report.peak_capacity_watts),
        percent_of(report.total_peak_load_watts, report.peak_capacity_watts)
    ));

    if report.feeder.resistance_ohms > 0.0 {
        lines.push(format!(
            "Feeder: {} drop {} ({:.1}%), {} at distro, loss {}",
            Current(report.feeder.current_a),
            Voltage(report.feeder.voltage_drop),
            report.feeder.voltage_drop_percent(generator.voltage),
            Voltage(report.feeder.voltage_at_distro),
            Power::watts(report.feeder.power_loss_watts)
        ));
    }

    lines
}
