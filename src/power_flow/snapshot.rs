use serde::{Deserialize, Serialize};
use std::fmt;

use super::primitives::FeederLoss;
use super::three_phase::ThreePhasePower;
use crate::domain::{EntityId, Power};

/// Derived values for one amplifier channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReport {
    pub channel_id: EntityId,
    /// Net load impedance seen by the channel (Ω)
    pub effective_z: f64,
    /// Audio power delivered to the connected speakers (W)
    pub music_power_watts: f64,
    /// Average electrical draw (W)
    pub energy_watts: f64,
    /// Draw with the worst-case (lowest) crest in the band (W)
    pub peak_energy_watts: f64,
    pub average_crest: f64,
    pub peak_crest: f64,
    /// Load below the amplifier's minimum impedance
    pub impedance_warning: bool,
}

/// Derived values for one amplifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AmplifierReport {
    pub amplifier_id: EntityId,
    pub channels: Vec<ChannelReport>,
    pub rms_watts_drawn: f64,
    pub peak_rms_watts_drawn: f64,
    pub apparent_power_va: f64,
    pub utilization_percent: f64,
    pub peak_utilization_percent: f64,
}

impl AmplifierReport {
    pub fn channel(&self, id: EntityId) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.channel_id == id)
    }
}

/// Derived values for one passive speaker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerReport {
    pub speaker_id: EntityId,
    /// Channel feeding this speaker, if connected
    pub source_channel: Option<EntityId>,
    pub incoming_power_watts: f64,
    pub utilization_percent: f64,
    /// Estimated SPL at the reference distance (dB)
    pub spl_output: Option<f64>,
}

/// Derived values for one powered speaker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoweredSpeakerReport {
    pub speaker_id: EntityId,
    pub average_crest: f64,
    pub peak_crest: f64,
    pub rms_watts_drawn: f64,
    pub peak_rms_watts_drawn: f64,
    pub spl_output: Option<f64>,
}

/// Derived values for one distro outlet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistroChannelReport {
    pub channel_id: EntityId,
    pub load_watts: f64,
    pub peak_load_watts: f64,
    pub current_amps: f64,
    pub breaker_utilization_percent: f64,
    pub cable: FeederLoss,
}

/// Derived values for one generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorReport {
    pub generator_id: EntityId,
    pub channels: Vec<DistroChannelReport>,
    pub total_load_watts: f64,
    pub total_peak_load_watts: f64,
    /// Continuous rating in watts before derating
    pub rated_watts: f64,
    /// Peak/standby rating in watts before derating
    pub rated_peak_watts: f64,
    pub temperature_derate: f64,
    pub altitude_derate: f64,
    pub user_derate: f64,
    /// Rating after all derates (W)
    pub effective_watts: f64,
    /// Peak rating after the same derates (W)
    pub peak_capacity_watts: f64,
    pub utilization_percent: f64,
    pub peak_utilization_percent: f64,
    pub feeder: FeederLoss,
    pub phase_loads: ThreePhasePower,
    /// 0 = balanced, 1 = all load on one phase
    pub phase_unbalance: f64,
}

impl GeneratorReport {
    pub fn channel(&self, id: EntityId) -> Option<&DistroChannelReport> {
        self.channels.iter().find(|c| c.channel_id == id)
    }

    /// Combined derate multiplier
    pub fn total_derate(&self) -> f64 {
        self.temperature_derate * self.altitude_derate * self.user_derate
    }

    pub fn headroom(&self) -> Power {
        Power::watts((self.effective_watts - self.total_load_watts).max(0.0))
    }
}

/// Every derived quantity of a rig, freshly computed by one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RigReport {
    pub amplifiers: Vec<AmplifierReport>,
    pub speakers: Vec<SpeakerReport>,
    pub powered_speakers: Vec<PoweredSpeakerReport>,
    pub generators: Vec<GeneratorReport>,
}

impl RigReport {
    pub fn amplifier(&self, id: EntityId) -> Option<&AmplifierReport> {
        self.amplifiers.iter().find(|a| a.amplifier_id == id)
    }

    /// Channel report by channel id, searching every amplifier
    pub fn amp_channel(&self, id: EntityId) -> Option<&ChannelReport> {
        self.amplifiers.iter().find_map(|a| a.channel(id))
    }

    pub fn speaker(&self, id: EntityId) -> Option<&SpeakerReport> {
        self.speakers.iter().find(|s| s.speaker_id == id)
    }

    pub fn powered_speaker(&self, id: EntityId) -> Option<&PoweredSpeakerReport> {
        self.powered_speakers.iter().find(|s| s.speaker_id == id)
    }

    pub fn generator(&self, id: EntityId) -> Option<&GeneratorReport> {
        self.generators.iter().find(|g| g.generator_id == id)
    }

    pub fn distro_channel(&self, id: EntityId) -> Option<&DistroChannelReport> {
        self.generators.iter().find_map(|g| g.channel(id))
    }

    /// Total draw across all generators
    pub fn total_load(&self) -> Power {
        Power::watts(self.generators.iter().map(|g| g.total_load_watts).sum())
    }

    /// Highest generator utilization in the rig
    pub fn worst_generator_utilization(&self) -> f64 {
        self.generators
            .iter()
            .map(|g| g.utilization_percent)
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for RigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RigReport {{ generators: {}, amplifiers: {}, speakers: {}, powered: {}, load: {}, worst: {:.1}% }}",
            self.generators.len(),
            self.amplifiers.len(),
            self.speakers.len(),
            self.powered_speakers.len(),
            self.total_load(),
            self.worst_generator_utilization()
        )
    }
}
