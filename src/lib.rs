//! Power-distribution recalculation engine for live-audio rigs.
//!
//! Generators feed distro outlets, outlets feed amplifiers and powered
//! speakers, amplifier channels feed passive speakers. From equipment
//! parameters, the connection graph and a crest-factor content model the
//! engine derives channel draw, speaker load, cable losses, derated
//! generator capacity and utilization.

pub mod config;
pub mod crest;
pub mod domain;
pub mod power_flow;
pub mod telemetry;
pub mod topology;
pub mod workspace;

pub use power_flow::{recalculate, RigReport};
pub use workspace::{RigWorkspace, WorkspaceError};
