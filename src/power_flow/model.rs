use tracing::{debug, warn};

use super::{amplifier_stage, distribution, speaker_stage, RigReport};
use crate::domain::{GlobalSettings, Rig};

// Utilization above which the pipeline logs a warning
const OVERLOAD_WARN_PERCENT: f64 = 100.0;

/// Power Flow Model - the recalculation pipeline
///
/// Every derived value of a rig is recomputed from scratch, in a fixed order:
/// 1. Amplifier stage: crest factors, music power and electrical draw per channel
/// 2. Speaker stage: incoming power, utilization and SPL from the amplifier results
/// 3. Distribution stage: outlet loads, derated generator capacity, feeder losses
///
/// Stages read only the rig, the settings and the reports of earlier stages,
/// so running the model twice on the same inputs yields the same report.
pub struct PowerFlowModel<'s> {
    settings: &'s GlobalSettings,
}

impl<'s> PowerFlowModel<'s> {
    pub fn new(settings: &'s GlobalSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GlobalSettings {
        self.settings
    }

    /// Run all three stages over `rig`
    pub fn compute(&self, rig: &Rig) -> RigReport {
        let (amplifiers, powered_speakers) = amplifier_stage::compute(rig, self.settings);
        let speakers = speaker_stage::compute(rig, &amplifiers, self.settings);
        let generators = distribution::compute(rig, &amplifiers, &powered_speakers, self.settings);

        for (gen, report) in rig.generators.iter().zip(&generators) {
            if report.utilization_percent > OVERLOAD_WARN_PERCENT {
                warn!(
                    generator = %gen.name,
                    utilization = report.utilization_percent,
                    "Generator overloaded"
                );
            }
        }
        for (amp, report) in rig.amplifiers.iter().zip(&amplifiers) {
            if report.channels.iter().any(|c| c.impedance_warning) {
                warn!(amplifier = %amp.name, "Load below minimum impedance");
            }
        }

        let report = RigReport {
            amplifiers,
            speakers,
            powered_speakers,
            generators,
        };
        debug!(%report, "Recalculated rig");
        report
    }
}

/// Recalculate every derived value of `rig` under `settings`
pub fn recalculate(rig: &Rig, settings: &GlobalSettings) -> RigReport {
    PowerFlowModel::new(settings).compute(rig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crest::CrestCurve;
    use crate::domain::{
        Amplifier, Connection, Crossover, DistroChannel, Generator, SourceType, Speaker, TargetType,
    };

    fn chain() -> Rig {
        let distro = DistroChannel::new("A1", 20.0);
        let gen = Generator::new("Gen", 5000.0, 230.0).with_channel(distro.clone());
        let mut amp = Amplifier::new("Amp", 1000.0, 0.85, 50.0, 2);
        amp.channels[0].crossover = Crossover::band_pass(30.0, 100.0);
        let spk = Speaker::new("Sub", 1000.0, 8.0, 98.0);

        let mut rig = Rig::new();
        rig.connections.push(Connection::new(distro.id, SourceType::Distro, amp.id, TargetType::Amp, ""));
        rig.connections.push(Connection::new(
            amp.channels[0].id,
            SourceType::AmpChannel,
            spk.id,
            TargetType::Speaker,
            "",
        ));
        rig.generators.push(gen);
        rig.amplifiers.push(amp);
        rig.speakers.push(spk);
        rig
    }

    #[test]
    fn test_stages_chain_through_report() {
        let rig = chain();
        let settings = GlobalSettings::with_custom_curve(CrestCurve::flat(8.0));
        let report = recalculate(&rig, &settings);

        let amp = &report.amplifiers[0];
        let gen = &report.generators[0];
        assert!((amp.rms_watts_drawn - 184.72).abs() < 0.01);
        assert_eq!(gen.total_load_watts, amp.rms_watts_drawn);
        assert!((gen.utilization_percent - 3.694).abs() < 0.001);
        assert!((report.speakers[0].utilization_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_recalculation_is_idempotent() {
        let rig = chain();
        let settings = GlobalSettings::default();
        let model = PowerFlowModel::new(&settings);
        assert_eq!(model.compute(&rig), model.compute(&rig));
    }

    #[test]
    fn test_empty_rig_yields_empty_report() {
        let report = recalculate(&Rig::new(), &GlobalSettings::default());
        assert_eq!(report, RigReport::default());
    }
}
