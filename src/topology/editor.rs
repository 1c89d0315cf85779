//! Connect/disconnect gestures applied to a rig's edge list.
//!
//! The editor keeps at most one pending source between a `begin` and the
//! `complete` that names the target. Every mutation leaves the edge list
//! satisfying the graph invariants.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::graph::is_legal_edge;
use crate::domain::{Connection, EntityId, SourceType, TargetType};

/// Display colors handed out to new connections, in order
pub const CONNECTION_PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#fabebe",
];

/// Round-robin color assignment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCursor {
    next: usize,
}

impl ColorCursor {
    pub fn next_color(&mut self) -> &'static str {
        let color = CONNECTION_PALETTE[self.next % CONNECTION_PALETTE.len()];
        self.next = (self.next + 1) % CONNECTION_PALETTE.len();
        color
    }
}

/// Source end of a connection gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub id: EntityId,
    pub kind: SourceType,
}

impl SourceRef {
    pub fn distro(id: EntityId) -> Self {
        Self { id, kind: SourceType::Distro }
    }

    pub fn amp_channel(id: EntityId) -> Self {
        Self { id, kind: SourceType::AmpChannel }
    }
}

/// Target end of a connection gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub id: EntityId,
    pub kind: TargetType,
}

impl TargetRef {
    pub fn amp(id: EntityId) -> Self {
        Self { id, kind: TargetType::Amp }
    }

    pub fn speaker(id: EntityId) -> Self {
        Self { id, kind: TargetType::Speaker }
    }

    pub fn powered_speaker(id: EntityId) -> Self {
        Self { id, kind: TargetType::PoweredSpeaker }
    }
}

/// Rejected connection attempts; the edge list is left untouched
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TopologyError {
    #[error("powered speaker {0} cannot be driven by an amplifier channel")]
    PoweredSpeakerRejectsAmpChannel(EntityId),
    #[error("cannot connect {source_type} to {target_type}")]
    IllegalEdge {
        source_type: SourceType,
        target_type: TargetType,
    },
    #[error("no source selected")]
    NoPendingSource,
}

/// Result of completing a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Edge created with this id
    Connected(EntityId),
    /// A distro outlet was wired straight into a passive speaker. No edge is
    /// created; the speaker is destroyed and should be removed from the rig.
    OvervoltageFault { speaker: EntityId },
}

/// Drop every edge leaving `source`
pub fn disconnect_source(edges: &mut Vec<Connection>, source: EntityId) -> Vec<Connection> {
    let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(edges)
        .into_iter()
        .partition(|c| c.source_id == source);
    *edges = kept;
    removed
}

/// Drop every edge terminating at `target`
pub fn disconnect_target(edges: &mut Vec<Connection>, target: EntityId) -> Vec<Connection> {
    let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(edges)
        .into_iter()
        .partition(|c| c.target_id == target);
    *edges = kept;
    removed
}

/// Remove the edge with the given connection id
pub fn remove_connection(edges: &mut Vec<Connection>, id: EntityId) -> Option<Connection> {
    let index = edges.iter().position(|c| c.id == id)?;
    Some(edges.remove(index))
}

/// Cascade delete: drop every edge with any of `ids` at either end
///
/// Pass an entity's own id together with its channels' ids.
pub fn remove_touching(edges: &mut Vec<Connection>, ids: &[EntityId]) -> usize {
    let before = edges.len();
    edges.retain(|c| !ids.iter().any(|&id| c.touches(id)));
    before - edges.len()
}

/// Apply one complete connection with all replacement rules
///
/// An amplifier channel keeps a single downstream edge and every target keeps
/// a single upstream edge, so existing edges at either end are replaced.
/// Distro outlets fan out freely.
pub fn connect(
    edges: &mut Vec<Connection>,
    source: SourceRef,
    target: TargetRef,
    color: &str,
) -> Result<ConnectOutcome, TopologyError> {
    match (source.kind, target.kind) {
        (SourceType::Distro, TargetType::Speaker) => {
            warn!(distro = %source.id, speaker = %target.id, "Distro wired directly to passive speaker");
            return Ok(ConnectOutcome::OvervoltageFault { speaker: target.id });
        }
        (SourceType::AmpChannel, TargetType::PoweredSpeaker) => {
            return Err(TopologyError::PoweredSpeakerRejectsAmpChannel(target.id));
        }
        (s, t) if !is_legal_edge(s, t) => {
            return Err(TopologyError::IllegalEdge {
                source_type: s,
                target_type: t,
            });
        }
        _ => {}
    }

    if source.kind == SourceType::AmpChannel {
        disconnect_source(edges, source.id);
    }
    disconnect_target(edges, target.id);

    let conn = Connection::new(source.id, source.kind, target.id, target.kind, color);
    let id = conn.id;
    debug!(%conn, "Connected");
    edges.push(conn);
    Ok(ConnectOutcome::Connected(id))
}

/// Two-step connect gesture with click-to-disconnect
#[derive(Debug, Clone, Default)]
pub struct ConnectionEditor {
    pending: Option<SourceRef>,
    colors: ColorCursor,
}

impl ConnectionEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<SourceRef> {
        self.pending
    }

    /// Select a source. An amplifier channel drops its current edge right away.
    pub fn begin(&mut self, edges: &mut Vec<Connection>, source: SourceRef) -> Vec<Connection> {
        let removed = match source.kind {
            SourceType::AmpChannel => disconnect_source(edges, source.id),
            SourceType::Distro => Vec::new(),
        };
        self.pending = Some(source);
        removed
    }

    /// Finish the pending gesture on `target`
    ///
    /// The pending source is cleared whatever the outcome.
    pub fn complete(
        &mut self,
        edges: &mut Vec<Connection>,
        target: TargetRef,
    ) -> Result<ConnectOutcome, TopologyError> {
        let source = self.pending.take().ok_or(TopologyError::NoPendingSource)?;
        let color = self.colors.next_color();
        connect(edges, source, target, color)
    }

    /// Click on a terminal with no source selected removes an edge there
    ///
    /// Returns the removed edge, or `None` when a gesture is pending or the
    /// terminal is free.
    pub fn click_terminal(&mut self, edges: &mut Vec<Connection>, endpoint: EntityId) -> Option<Connection> {
        if self.pending.is_some() {
            return None;
        }
        let index = edges.iter().position(|c| c.touches(endpoint))?;
        let removed = edges.remove(index);
        debug!(conn = %removed, "Disconnected");
        Some(removed)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
