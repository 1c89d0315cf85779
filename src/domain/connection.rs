use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::EntityId;

/// Kind of entity an edge can start from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SourceType {
    /// Distro outlet (many downstream amps/powered speakers)
    Distro,
    /// Amplifier output channel (one downstream speaker)
    AmpChannel,
}

/// Kind of entity an edge can end at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TargetType {
    Amp,
    Speaker,
    PoweredSpeaker,
}

/// Directed, typed edge of the rig graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: EntityId,
    pub source_id: EntityId,
    pub source_type: SourceType,
    pub target_id: EntityId,
    pub target_type: TargetType,
    #[serde(default)]
    pub color: String,
}

impl Connection {
    pub fn new(
        source_id: EntityId,
        source_type: SourceType,
        target_id: EntityId,
        target_type: TargetType,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            source_type,
            target_id,
            target_type,
            color: color.into(),
        }
    }

    /// Whether either end references `id`
    pub fn touches(&self, id: EntityId) -> bool {
        self.source_id == id || self.target_id == id
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Distro => write!(f, "distro"),
            SourceType::AmpChannel => write!(f, "ampChannel"),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Amp => write!(f, "amp"),
            TargetType::Speaker => write!(f, "speaker"),
            TargetType::PoweredSpeaker => write!(f, "poweredSpeaker"),
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source_type, self.source_id, self.target_type, self.target_id
        )
    }
}
