use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::generator::default_power_factor;
use super::{Crossover, EntityId};

/// Passive loudspeaker (or a group of identical cabinets)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Speaker {
    pub id: EntityId,
    pub name: String,
    /// AES power handling (W) per cabinet
    pub pmax_watts: f64,
    pub nominal_impedance_ohms: f64,
    /// Measured impedance (Ω), overrides nominal when present
    #[serde(default)]
    pub actual_impedance_ohms: Option<f64>,
    /// Speaker cable loop resistance (mΩ)
    #[serde(default)]
    pub cable_milliohms: f64,
    /// Sensitivity (dB SPL @ 1 W / 1 m)
    pub sensitivity_db: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

pub(crate) fn default_quantity() -> u32 {
    1
}

impl Speaker {
    pub fn new(
        name: impl Into<String>,
        pmax_watts: f64,
        nominal_impedance_ohms: f64,
        sensitivity_db: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pmax_watts,
            nominal_impedance_ohms,
            actual_impedance_ohms: None,
            cable_milliohms: 0.0,
            sensitivity_db,
            quantity: 1,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_cable(mut self, milliohms: f64) -> Self {
        self.cable_milliohms = milliohms;
        self
    }

    /// Impedance used for load calculations (Ω)
    pub fn load_impedance_ohms(&self) -> f64 {
        self.actual_impedance_ohms
            .unwrap_or(self.nominal_impedance_ohms)
    }

    pub fn cable_ohms(&self) -> f64 {
        self.cable_milliohms / 1000.0
    }
}

/// Self-amplified loudspeaker fed straight from a distro outlet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoweredSpeaker {
    pub id: EntityId,
    pub name: String,
    /// Amplifier output rating (W) per cabinet
    pub pmax_watts: f64,
    pub sensitivity_db: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub efficiency: f64,
    /// Idle draw (W) per cabinet
    #[serde(default)]
    pub parasitic_watts: f64,
    #[serde(default = "default_power_factor")]
    pub power_factor: f64,
    #[serde(default)]
    pub crossover: Crossover,
}

impl PoweredSpeaker {
    pub fn new(name: impl Into<String>, pmax_watts: f64, efficiency: f64, sensitivity_db: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pmax_watts,
            sensitivity_db,
            quantity: 1,
            efficiency,
            parasitic_watts: 0.0,
            power_factor: default_power_factor(),
            crossover: Crossover::default(),
        }
    }
}
