/// Connection Graph
///
/// Typed, directed edges binding distro outlets, amplifiers and speakers,
/// plus the gesture rules that keep them consistent.

pub mod editor;
pub mod graph;

pub use editor::{
    connect, disconnect_source, disconnect_target, remove_connection, remove_touching,
    ColorCursor, ConnectOutcome, ConnectionEditor, SourceRef, TargetRef, TopologyError,
    CONNECTION_PALETTE,
};
pub use graph::{is_legal_edge, ConnectionGraph, TopologyViolation};
