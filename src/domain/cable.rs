use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// American Wire Gauge sizes available for feeder and outlet cabling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum AwgGauge {
    #[serde(rename = "14")]
    #[strum(serialize = "14")]
    Awg14,
    #[serde(rename = "12")]
    #[strum(serialize = "12")]
    Awg12,
    #[serde(rename = "10")]
    #[strum(serialize = "10")]
    Awg10,
    #[serde(rename = "8")]
    #[strum(serialize = "8")]
    Awg8,
    #[serde(rename = "6")]
    #[strum(serialize = "6")]
    Awg6,
    #[serde(rename = "4")]
    #[strum(serialize = "4")]
    Awg4,
    #[serde(rename = "3")]
    #[strum(serialize = "3")]
    Awg3,
    #[serde(rename = "2")]
    #[strum(serialize = "2")]
    Awg2,
    #[serde(rename = "1")]
    #[strum(serialize = "1")]
    Awg1,
    #[serde(rename = "1/0")]
    #[strum(serialize = "1/0")]
    Awg1_0,
    #[serde(rename = "2/0")]
    #[strum(serialize = "2/0")]
    Awg2_0,
    #[serde(rename = "3/0")]
    #[strum(serialize = "3/0")]
    Awg3_0,
    #[serde(rename = "4/0")]
    #[strum(serialize = "4/0")]
    Awg4_0,
}

impl AwgGauge {
    /// Copper conductor resistance, milliohms per 1000 ft
    pub fn milliohms_per_kft(&self) -> f64 {
        match self {
            AwgGauge::Awg14 => 2525.0,
            AwgGauge::Awg12 => 1588.0,
            AwgGauge::Awg10 => 999.0,
            AwgGauge::Awg8 => 628.0,
            AwgGauge::Awg6 => 395.0,
            AwgGauge::Awg4 => 249.0,
            AwgGauge::Awg3 => 197.0,
            AwgGauge::Awg2 => 156.0,
            AwgGauge::Awg1 => 124.0,
            AwgGauge::Awg1_0 => 98.3,
            AwgGauge::Awg2_0 => 77.9,
            AwgGauge::Awg3_0 => 61.8,
            AwgGauge::Awg4_0 => 49.0,
        }
    }
}

/// How the resistance of a cable run is specified
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum CableSpec {
    /// No cable modelled (zero resistance)
    #[default]
    None,
    /// Gauge and run length
    #[serde(rename_all = "camelCase")]
    Awg { gauge: AwgGauge, length_ft: f64 },
    /// Measured loop resistance
    Manual { milliohms: f64 },
}

impl CableSpec {
    pub fn awg(gauge: AwgGauge, length_ft: f64) -> Self {
        CableSpec::Awg { gauge, length_ft }
    }

    pub fn manual(milliohms: f64) -> Self {
        CableSpec::Manual { milliohms }
    }
}
