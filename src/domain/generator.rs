use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CableSpec, EntityId, PhaseType};

/// Unit the generator's ratings are expressed in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RatingType {
    #[default]
    Watts,
    Kva,
}

/// Which supply phase(s) a distro outlet is wired to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PhaseSelector {
    #[default]
    L1,
    L2,
    L3,
    /// Three-phase outlet, load shared evenly
    AllPhases,
}

/// Generator feeding one distribution unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Generator {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub rating_type: RatingType,
    /// Continuous rating (W or kVA per `rating_type`)
    pub continuous_rating: f64,
    /// Peak/standby rating (W or kVA per `rating_type`)
    #[serde(default)]
    pub peak_rating: f64,
    #[serde(default = "default_power_factor")]
    pub power_factor: f64,
    #[serde(default)]
    pub phase: PhaseType,
    pub voltage: f64,
    /// Additional safety margin (%)
    #[serde(default)]
    pub user_derate_percent: f64,
    #[serde(default)]
    pub feeder_cable: CableSpec,
    #[serde(default)]
    pub channels: Vec<DistroChannel>,
}

pub(crate) fn default_power_factor() -> f64 {
    0.8
}

impl Generator {
    pub fn new(name: impl Into<String>, continuous_watts: f64, voltage: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rating_type: RatingType::Watts,
            continuous_rating: continuous_watts,
            peak_rating: continuous_watts,
            power_factor: default_power_factor(),
            phase: PhaseType::Single,
            voltage,
            user_derate_percent: 0.0,
            feeder_cable: CableSpec::None,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: DistroChannel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel(&self, id: EntityId) -> Option<&DistroChannel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn channel_mut(&mut self, id: EntityId) -> Option<&mut DistroChannel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }
}

/// One breaker/outlet of a distribution unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistroChannel {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub phase: PhaseSelector,
    pub breaker_amps: f64,
    #[serde(default)]
    pub output_phase: PhaseType,
    #[serde(default)]
    pub cable: CableSpec,
}

impl DistroChannel {
    pub fn new(name: impl Into<String>, breaker_amps: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            enabled: true,
            phase: PhaseSelector::L1,
            breaker_amps,
            output_phase: PhaseType::Single,
            cable: CableSpec::None,
        }
    }

    pub fn on_phase(mut self, phase: PhaseSelector) -> Self {
        self.phase = phase;
        if phase == PhaseSelector::AllPhases {
            self.output_phase = PhaseType::Three;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_json_defaults() {
        let json = r#"{
            "id": "6f1c1f44-4b3e-4c47-9d64-0a4b2b5a4c11",
            "name": "Gen A",
            "continuousRating": 5000,
            "voltage": 230
        }"#;
        let gen: Generator = serde_json::from_str(json).unwrap();
        assert_eq!(gen.rating_type, RatingType::Watts);
        assert_eq!(gen.power_factor, 0.8);
        assert!(gen.channels.is_empty());
        assert_eq!(gen.feeder_cable, CableSpec::None);
    }

    #[test]
    fn test_channel_lookup() {
        let ch = DistroChannel::new("A1", 20.0);
        let id = ch.id;
        let mut gen = Generator::new("Gen", 5000.0, 230.0).with_channel(ch);
        assert!(gen.channel(id).is_some());
        gen.channel_mut(id).unwrap().enabled = false;
        assert!(!gen.channel(id).unwrap().enabled);
    }

    #[test]
    fn test_all_phases_outlet_is_three_phase() {
        let ch = DistroChannel::new("3P", 32.0).on_phase(PhaseSelector::AllPhases);
        assert_eq!(ch.output_phase, PhaseType::Three);
    }
}
