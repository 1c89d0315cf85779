use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::generator::default_power_factor;
use super::{Crossover, EntityId};

/// Bridging errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    #[error("amplifier `{0}` does not support bridging")]
    NotSupported(String),
    #[error("channel index {0} cannot start a bridged pair (must be even with a partner)")]
    InvalidPair(usize),
}

/// A channel's place in a bridged pair
///
/// The partner is referenced by id so adding or removing channels never
/// re-pairs the wrong neighbours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum ChannelRole {
    #[default]
    Standalone,
    BridgedPrimary { partner: EntityId },
    BridgedSecondary { partner: EntityId },
}

/// One output channel of an amplifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AmpChannel {
    pub id: EntityId,
    pub enabled: bool,
    #[serde(default)]
    pub role: ChannelRole,
    #[serde(default)]
    pub crossover: Crossover,
    /// Channel gain (dB, ≤ 0)
    #[serde(default)]
    pub gain_db: f64,
    /// Nominal rated load (Ω)
    #[serde(default = "default_nominal_load")]
    pub nominal_load_ohms: f64,
}

fn default_nominal_load() -> f64 {
    4.0
}

impl AmpChannel {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            enabled: true,
            role: ChannelRole::Standalone,
            crossover: Crossover::default(),
            gain_db: 0.0,
            nominal_load_ohms: default_nominal_load(),
        }
    }

    /// Gain as applied: positive values are treated as 0 dB
    pub fn effective_gain_db(&self) -> f64 {
        self.gain_db.min(0.0)
    }

    pub fn is_bridged(&self) -> bool {
        !matches!(self.role, ChannelRole::Standalone)
    }

    /// Whether this channel produces output. A bridged secondary is slaved
    /// to its primary and never drives a load on its own.
    pub fn is_driving(&self) -> bool {
        self.enabled && !matches!(self.role, ChannelRole::BridgedSecondary { .. })
    }
}

impl Default for AmpChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Power amplifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Amplifier {
    pub id: EntityId,
    pub name: String,
    /// Maximum rated draw (W)
    pub pmax_watts: f64,
    /// Efficiency (0-1)
    pub efficiency: f64,
    /// Idle/parasitic draw (W)
    #[serde(default)]
    pub parasitic_watts: f64,
    #[serde(default = "default_power_factor")]
    pub power_factor: f64,
    #[serde(default)]
    pub supports_bridging: bool,
    /// Minimum stable load per channel (Ω)
    #[serde(default = "default_min_impedance")]
    pub min_impedance_ohms: f64,
    #[serde(default)]
    pub channels: Vec<AmpChannel>,
}

fn default_min_impedance() -> f64 {
    2.0
}

impl Amplifier {
    pub fn new(
        name: impl Into<String>,
        pmax_watts: f64,
        efficiency: f64,
        parasitic_watts: f64,
        channel_count: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pmax_watts,
            efficiency,
            parasitic_watts,
            power_factor: default_power_factor(),
            supports_bridging: true,
            min_impedance_ohms: default_min_impedance(),
            channels: (0..channel_count).map(|_| AmpChannel::new()).collect(),
        }
    }

    pub fn channel(&self, id: EntityId) -> Option<&AmpChannel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn channel_mut(&mut self, id: EntityId) -> Option<&mut AmpChannel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    /// Bridge channel `primary_index` (even) with the channel after it
    pub fn bridge(&mut self, primary_index: usize) -> Result<(), BridgeError> {
        if !self.supports_bridging {
            return Err(BridgeError::NotSupported(self.name.clone()));
        }
        if primary_index % 2 != 0 || primary_index + 1 >= self.channels.len() {
            return Err(BridgeError::InvalidPair(primary_index));
        }
        let primary = self.channels[primary_index].id;
        let secondary = self.channels[primary_index + 1].id;
        self.channels[primary_index].role = ChannelRole::BridgedPrimary { partner: secondary };
        self.channels[primary_index + 1].role = ChannelRole::BridgedSecondary { partner: primary };
        Ok(())
    }

    /// Undo a bridge started at `primary_index`
    pub fn unbridge(&mut self, primary_index: usize) -> Result<(), BridgeError> {
        if primary_index % 2 != 0 || primary_index + 1 >= self.channels.len() {
            return Err(BridgeError::InvalidPair(primary_index));
        }
        self.channels[primary_index].role = ChannelRole::Standalone;
        self.channels[primary_index + 1].role = ChannelRole::Standalone;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_pairs_by_id() {
        let mut amp = Amplifier::new("PLM", 2000.0, 0.85, 50.0, 4);
        amp.bridge(2).unwrap();

        let (c2, c3) = (amp.channels[2].id, amp.channels[3].id);
        assert_eq!(amp.channels[2].role, ChannelRole::BridgedPrimary { partner: c3 });
        assert_eq!(amp.channels[3].role, ChannelRole::BridgedSecondary { partner: c2 });
        assert!(amp.channels[2].is_driving());
        assert!(!amp.channels[3].is_driving());
        assert!(!amp.channels[0].is_bridged());
    }

    #[test]
    fn test_bridge_rejects_odd_or_missing_partner() {
        let mut amp = Amplifier::new("Amp", 1000.0, 0.8, 20.0, 3);
        assert_eq!(amp.bridge(1), Err(BridgeError::InvalidPair(1)));
        assert_eq!(amp.bridge(2), Err(BridgeError::InvalidPair(2)));
    }

    #[test]
    fn test_bridge_requires_support() {
        let mut amp = Amplifier::new("Amp", 1000.0, 0.8, 20.0, 2);
        amp.supports_bridging = false;
        assert!(matches!(amp.bridge(0), Err(BridgeError::NotSupported(_))));
    }

    #[test]
    fn test_unbridge_restores_standalone() {
        let mut amp = Amplifier::new("Amp", 1000.0, 0.8, 20.0, 2);
        amp.bridge(0).unwrap();
        amp.unbridge(0).unwrap();
        assert!(amp.channels.iter().all(|c| c.role == ChannelRole::Standalone));
    }

    #[test]
    fn test_positive_gain_is_capped() {
        let mut ch = AmpChannel::new();
        ch.gain_db = 3.0;
        assert_eq!(ch.effective_gain_db(), 0.0);
        ch.gain_db = -6.0;
        assert_eq!(ch.effective_gain_db(), -6.0);
    }

    #[test]
    fn test_role_json_shape() {
        let partner = Uuid::new_v4();
        let json = serde_json::to_value(ChannelRole::BridgedPrimary { partner }).unwrap();
        assert_eq!(json["role"], "bridgedPrimary");
        assert_eq!(json["partner"], partner.to_string());
    }
}
