use itertools::Itertools;
use thiserror::Error;

use crate::domain::{Connection, EntityId, SourceType, TargetType};

/// Whether an edge of this shape may exist in a rig
///
/// Distro outlets feed amplifiers and powered speakers; amplifier channels
/// feed passive speakers. Nothing else.
pub fn is_legal_edge(source: SourceType, target: TargetType) -> bool {
    matches!(
        (source, target),
        (SourceType::Distro, TargetType::Amp)
            | (SourceType::Distro, TargetType::PoweredSpeaker)
            | (SourceType::AmpChannel, TargetType::Speaker)
    )
}

/// A broken topology invariant found in an edge set
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TopologyViolation {
    #[error("amp channel {channel} drives {count} targets")]
    ChannelFanOut { channel: EntityId, count: usize },
    #[error("{target_type} {target} has {count} upstream connections")]
    MultipleUpstream {
        target: EntityId,
        target_type: TargetType,
        count: usize,
    },
    #[error("connection {connection} is an illegal {source_type} -> {target_type} edge")]
    IllegalEdge {
        connection: EntityId,
        source_type: SourceType,
        target_type: TargetType,
    },
}

/// Read-only view over a rig's edges
#[derive(Debug, Clone, Copy)]
pub struct ConnectionGraph<'a> {
    edges: &'a [Connection],
}

impl<'a> ConnectionGraph<'a> {
    pub fn new(edges: &'a [Connection]) -> Self {
        Self { edges }
    }

    pub fn edges(&self) -> &'a [Connection] {
        self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges terminating at `target`, in insertion order
    pub fn upstream_of(&self, target: EntityId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.edges.iter().filter(move |c| c.target_id == target)
    }

    /// Edges leaving `source`, in insertion order
    pub fn downstream_of(&self, source: EntityId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.edges.iter().filter(move |c| c.source_id == source)
    }

    /// First edge with either end at `endpoint`
    pub fn edge_at(&self, endpoint: EntityId) -> Option<&'a Connection> {
        self.edges.iter().find(|c| c.touches(endpoint))
    }

    /// Every invariant violation in the edge set, empty when the graph is sound
    pub fn check_invariants(&self) -> Vec<TopologyViolation> {
        let mut violations: Vec<TopologyViolation> = self
            .edges
            .iter()
            .filter(|c| !is_legal_edge(c.source_type, c.target_type))
            .map(|c| TopologyViolation::IllegalEdge {
                connection: c.id,
                source_type: c.source_type,
                target_type: c.target_type,
            })
            .collect();

        let fan_out = self
            .edges
            .iter()
            .filter(|c| c.source_type == SourceType::AmpChannel)
            .counts_by(|c| c.source_id);
        violations.extend(
            fan_out
                .into_iter()
                .filter(|&(_, count)| count > 1)
                .sorted_by_key(|&(channel, _)| channel)
                .map(|(channel, count)| TopologyViolation::ChannelFanOut { channel, count }),
        );

        let fan_in = self
            .edges
            .iter()
            .counts_by(|c| (c.target_id, c.target_type));
        violations.extend(
            fan_in
                .into_iter()
                .filter(|&(_, count)| count > 1)
                .sorted_by_key(|&((target, _), _)| target)
                .map(|((target, target_type), count)| TopologyViolation::MultipleUpstream {
                    target,
                    target_type,
                    count,
                }),
        );

        violations
    }
}
