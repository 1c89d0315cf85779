use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use uuid::Uuid;

/// Identity shared by every rig entity and connection
pub type EntityId = Uuid;

/// Impedance assumed for a channel with nothing connected (Ω)
pub const DEFAULT_IMPEDANCE_OHMS: f64 = 8.0;

/// Full-range band corners used when a crossover leaves a side open (Hz)
pub const FULL_RANGE_LOW_HZ: f64 = 20.0;
pub const FULL_RANGE_HIGH_HZ: f64 = 20_000.0;

// ============================================================================
// Physical Unit Newtypes
// ============================================================================

/// Power in Watts (W)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd, Default)]
pub struct Power(pub f64);

impl Power {
    pub fn watts(w: f64) -> Self {
        Self(w)
    }

    pub fn kilowatts(kw: f64) -> Self {
        Self(kw * 1000.0)
    }

    pub fn as_watts(&self) -> f64 {
        self.0
    }

    pub fn as_kilowatts(&self) -> f64 {
        self.0 / 1000.0
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.abs() >= 1000.0 {
            write!(f, "{:.2} kW", self.as_kilowatts())
        } else {
            write!(f, "{:.1} W", self.0)
        }
    }
}

impl Add for Power {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Power {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Voltage in Volts (V)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Voltage(pub f64);

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} V", self.0)
    }
}

/// Current in Amperes (A)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Current(pub f64);

impl fmt::Display for Current {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} A", self.0)
    }
}

/// Temperature in Celsius (°C)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Temperature(pub f64);

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C", self.0)
    }
}

// ============================================================================
// Shared equipment enums
// ============================================================================

/// Electrical phase arrangement of a supply or outlet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PhaseType {
    #[default]
    Single,
    Three,
}

impl PhaseType {
    /// Number of live conductors
    pub fn count(&self) -> u8 {
        match self {
            PhaseType::Single => 1,
            PhaseType::Three => 3,
        }
    }

    /// Line-current divisor multiplier (√3 for three-phase)
    pub fn current_factor(&self) -> f64 {
        match self {
            PhaseType::Single => 1.0,
            PhaseType::Three => 3f64.sqrt(),
        }
    }
}

/// Which filters of a crossover are active
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CrossoverMode {
    #[default]
    FullRange,
    HighPass,
    LowPass,
    BandPass,
}

/// Channel/cabinet crossover settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Crossover {
    pub mode: CrossoverMode,
    pub hpf_hz: f64,
    pub lpf_hz: f64,
    /// Filter Q, informational
    #[serde(default = "default_q")]
    pub q: f64,
}

fn default_q() -> f64 {
    0.707
}

impl Default for Crossover {
    fn default() -> Self {
        Self {
            mode: CrossoverMode::FullRange,
            hpf_hz: FULL_RANGE_LOW_HZ,
            lpf_hz: FULL_RANGE_HIGH_HZ,
            q: default_q(),
        }
    }
}

impl Crossover {
    pub fn band_pass(hpf_hz: f64, lpf_hz: f64) -> Self {
        Self {
            mode: CrossoverMode::BandPass,
            hpf_hz,
            lpf_hz,
            ..Self::default()
        }
    }

    /// Effective `(low, high)` corners of the pass band
    pub fn band(&self) -> (f64, f64) {
        match self.mode {
            CrossoverMode::FullRange => (FULL_RANGE_LOW_HZ, FULL_RANGE_HIGH_HZ),
            CrossoverMode::HighPass => (self.hpf_hz, FULL_RANGE_HIGH_HZ),
            CrossoverMode::LowPass => (FULL_RANGE_LOW_HZ, self.lpf_hz),
            CrossoverMode::BandPass => (self.hpf_hz, self.lpf_hz),
        }
    }
}
