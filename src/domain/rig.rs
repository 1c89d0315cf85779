use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::{
    AmpChannel, Amplifier, Connection, DistroChannel, EntityId, Generator, GlobalSettings,
    PoweredSpeaker, SourceType, Speaker, TargetType,
};
use crate::power_flow::RigReport;
use crate::topology::ConnectionGraph;

/// Errors found while ingesting a rig from outside the engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("duplicate id {0}")]
    DuplicateId(EntityId),
    #[error("{entity}: {field} is not finite")]
    NonFinite { entity: String, field: &'static str },
    #[error("{entity}: {field} must be within {range}, got {value}")]
    OutOfRange {
        entity: String,
        field: &'static str,
        range: &'static str,
        value: f64,
    },
    #[error("connection {connection} references unknown {end} {id}")]
    DanglingEndpoint {
        connection: EntityId,
        end: &'static str,
        id: EntityId,
    },
    #[error("topology violation: {0}")]
    Topology(String),
    #[error("custom content profile needs at least one crest curve point")]
    EmptyCrestCurve,
    #[error("invalid crest curve point ({frequency} Hz, {crest_factor} dB)")]
    InvalidCrestPoint { frequency: f64, crest_factor: f64 },
}

/// Authoritative rig inputs: equipment plus the connection graph
///
/// Holds no derived values; see [`RigReport`] for those.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Rig {
    pub generators: Vec<Generator>,
    pub amplifiers: Vec<Amplifier>,
    pub speakers: Vec<Speaker>,
    pub powered_speakers: Vec<PoweredSpeaker>,
    pub connections: Vec<Connection>,
}

impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generator(&self, id: EntityId) -> Option<&Generator> {
        self.generators.iter().find(|g| g.id == id)
    }

    pub fn amplifier(&self, id: EntityId) -> Option<&Amplifier> {
        self.amplifiers.iter().find(|a| a.id == id)
    }

    pub fn speaker(&self, id: EntityId) -> Option<&Speaker> {
        self.speakers.iter().find(|s| s.id == id)
    }

    pub fn powered_speaker(&self, id: EntityId) -> Option<&PoweredSpeaker> {
        self.powered_speakers.iter().find(|s| s.id == id)
    }

    /// Distro outlet by id, with its owning generator
    pub fn distro_channel(&self, id: EntityId) -> Option<(&Generator, &DistroChannel)> {
        self.generators
            .iter()
            .find_map(|g| g.channel(id).map(|c| (g, c)))
    }

    /// Amplifier channel by id, with its owning amplifier
    pub fn amp_channel(&self, id: EntityId) -> Option<(&Amplifier, &AmpChannel)> {
        self.amplifiers
            .iter()
            .find_map(|a| a.channel(id).map(|c| (a, c)))
    }

    pub fn graph(&self) -> ConnectionGraph<'_> {
        ConnectionGraph::new(&self.connections)
    }

    /// Whether `id` names an entity of the given source kind
    pub fn has_source(&self, kind: SourceType, id: EntityId) -> bool {
        match kind {
            SourceType::Distro => self.distro_channel(id).is_some(),
            SourceType::AmpChannel => self.amp_channel(id).is_some(),
        }
    }

    /// Whether `id` names an entity of the given target kind
    pub fn has_target(&self, kind: TargetType, id: EntityId) -> bool {
        match kind {
            TargetType::Amp => self.amplifier(id).is_some(),
            TargetType::Speaker => self.speaker(id).is_some(),
            TargetType::PoweredSpeaker => self.powered_speaker(id).is_some(),
        }
    }

    fn all_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        let generators = self
            .generators
            .iter()
            .flat_map(|g| std::iter::once(g.id).chain(g.channels.iter().map(|c| c.id)));
        let amplifiers = self
            .amplifiers
            .iter()
            .flat_map(|a| std::iter::once(a.id).chain(a.channels.iter().map(|c| c.id)));
        generators
            .chain(amplifiers)
            .chain(self.speakers.iter().map(|s| s.id))
            .chain(self.powered_speakers.iter().map(|s| s.id))
            .chain(self.connections.iter().map(|c| c.id))
    }

    /// Validate a rig at the ingestion boundary
    ///
    /// The pipeline assumes a rig that passed this check: unique ids,
    /// finite numbers, efficiencies/power factors in (0, 1], and edges whose
    /// endpoints exist and respect the topology rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for id in self.all_ids() {
            if !seen.insert(id) {
                return Err(ValidationError::DuplicateId(id));
            }
        }

        for g in &self.generators {
            check_finite(&g.name, "continuousRating", g.continuous_rating)?;
            check_finite(&g.name, "peakRating", g.peak_rating)?;
            check_finite(&g.name, "voltage", g.voltage)?;
            check_finite(&g.name, "userDeratePercent", g.user_derate_percent)?;
            check_range(&g.name, "powerFactor", g.power_factor, 0.0, 1.0, "(0, 1]")?;
            check_range(&g.name, "userDeratePercent", g.user_derate_percent, -f64::EPSILON, 100.0, "[0, 100]")?;
            for c in &g.channels {
                check_finite(&g.name, "breakerAmps", c.breaker_amps)?;
            }
        }

        for a in &self.amplifiers {
            check_finite(&a.name, "pmaxWatts", a.pmax_watts)?;
            check_finite(&a.name, "parasiticWatts", a.parasitic_watts)?;
            check_range(&a.name, "efficiency", a.efficiency, 0.0, 1.0, "(0, 1]")?;
            check_range(&a.name, "powerFactor", a.power_factor, 0.0, 1.0, "(0, 1]")?;
            for c in &a.channels {
                check_finite(&a.name, "gainDb", c.gain_db)?;
                check_finite(&a.name, "hpfHz", c.crossover.hpf_hz)?;
                check_finite(&a.name, "lpfHz", c.crossover.lpf_hz)?;
            }
        }

        for s in &self.speakers {
            check_finite(&s.name, "pmaxWatts", s.pmax_watts)?;
            check_finite(&s.name, "nominalImpedanceOhms", s.nominal_impedance_ohms)?;
            check_finite(&s.name, "cableMilliohms", s.cable_milliohms)?;
            check_finite(&s.name, "sensitivityDb", s.sensitivity_db)?;
        }

        for p in &self.powered_speakers {
            check_finite(&p.name, "pmaxWatts", p.pmax_watts)?;
            check_finite(&p.name, "sensitivityDb", p.sensitivity_db)?;
            check_range(&p.name, "efficiency", p.efficiency, 0.0, 1.0, "(0, 1]")?;
            check_range(&p.name, "powerFactor", p.power_factor, 0.0, 1.0, "(0, 1]")?;
        }

        for c in &self.connections {
            if !self.has_source(c.source_type, c.source_id) {
                return Err(ValidationError::DanglingEndpoint {
                    connection: c.id,
                    end: "source",
                    id: c.source_id,
                });
            }
            if !self.has_target(c.target_type, c.target_id) {
                return Err(ValidationError::DanglingEndpoint {
                    connection: c.id,
                    end: "target",
                    id: c.target_id,
                });
            }
        }

        if let Some(violation) = self.graph().check_invariants().into_iter().next() {
            return Err(ValidationError::Topology(violation.to_string()));
        }

        Ok(())
    }
}

fn check_finite(entity: &str, field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            entity: entity.to_string(),
            field,
        })
    }
}

// lower bound exclusive, upper inclusive
fn check_range(
    entity: &str,
    field: &'static str,
    value: f64,
    lo: f64,
    hi: f64,
    range: &'static str,
) -> Result<(), ValidationError> {
    check_finite(entity, field, value)?;
    if value > lo && value <= hi {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            entity: entity.to_string(),
            field,
            range,
            value,
        })
    }
}

/// Export/import shape: settings, authoritative rig, and the derived report
///
/// On import the report is ignored and recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RigDocument {
    #[serde(default)]
    pub settings: GlobalSettings,
    #[serde(default)]
    pub rig: Rig,
    #[serde(default, skip_deserializing)]
    pub report: Option<RigReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DistroChannel, Generator};
    use uuid::Uuid;

    fn small_rig() -> (Rig, EntityId, EntityId) {
        let distro = DistroChannel::new("A1", 20.0);
        let distro_id = distro.id;
        let gen = Generator::new("Gen", 5000.0, 230.0).with_channel(distro);
        let amp = Amplifier::new("Amp", 1000.0, 0.85, 50.0, 2);
        let amp_id = amp.id;
        let mut rig = Rig::new();
        rig.generators.push(gen);
        rig.amplifiers.push(amp);
        (rig, distro_id, amp_id)
    }

    #[test]
    fn test_valid_rig_passes() {
        let (mut rig, distro, amp) = small_rig();
        rig.connections.push(Connection::new(distro, SourceType::Distro, amp, TargetType::Amp, ""));
        assert!(rig.validate().is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let (mut rig, _, _) = small_rig();
        let dup = rig.amplifiers[0].clone();
        rig.amplifiers.push(dup);
        assert!(matches!(rig.validate(), Err(ValidationError::DuplicateId(_))));
    }

    #[test]
    fn test_dangling_connection_rejected() {
        let (mut rig, distro, _) = small_rig();
        rig.connections.push(Connection::new(
            distro,
            SourceType::Distro,
            Uuid::new_v4(),
            TargetType::Amp,
            "",
        ));
        assert!(matches!(
            rig.validate(),
            Err(ValidationError::DanglingEndpoint { end: "target", .. })
        ));
    }

    #[test]
    fn test_efficiency_out_of_range_rejected() {
        let (mut rig, _, _) = small_rig();
        rig.amplifiers[0].efficiency = 1.5;
        assert!(matches!(
            rig.validate(),
            Err(ValidationError::OutOfRange { field: "efficiency", .. })
        ));
    }

    #[test]
    fn test_direct_distro_to_speaker_rejected() {
        let (mut rig, distro, _) = small_rig();
        let spk = Speaker::new("Top", 1000.0, 8.0, 98.0);
        let spk_id = spk.id;
        rig.speakers.push(spk);
        rig.connections.push(Connection::new(
            distro,
            SourceType::Distro,
            spk_id,
            TargetType::Speaker,
            "",
        ));
        assert!(matches!(rig.validate(), Err(ValidationError::Topology(_))));
    }

    #[test]
    fn test_lookup_helpers() {
        let (rig, distro, amp) = small_rig();
        let (gen, ch) = rig.distro_channel(distro).unwrap();
        assert_eq!(gen.name, "Gen");
        assert_eq!(ch.id, distro);
        let ch_id = rig.amplifiers[0].channels[1].id;
        assert_eq!(rig.amp_channel(ch_id).unwrap().0.id, amp);
        assert!(rig.has_target(TargetType::Amp, amp));
        assert!(!rig.has_target(TargetType::Speaker, amp));
    }

    #[test]
    fn test_document_ignores_stale_report_on_import() {
        let json = r#"{"rig": {"generators": []}, "report": {"bogus": true}}"#;
        let doc: RigDocument = serde_json::from_str(json).unwrap();
        assert!(doc.report.is_none());
        assert!(doc.rig.generators.is_empty());
    }
}
