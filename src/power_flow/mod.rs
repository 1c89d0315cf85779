/// Power Flow Recalculation
///
/// Turns a rig (equipment plus connections) and the global settings into a
/// fresh `RigReport`. Inputs are never mutated; the report is rebuilt in full
/// on every run.

pub mod amplifier_stage;
pub mod distribution;
pub mod model;
pub mod primitives;
pub mod snapshot;
pub mod speaker_stage;
pub mod three_phase;

pub use distribution::{derate_breakdown, rated_peak_watts, rated_watts};
pub use model::{recalculate, PowerFlowModel};
pub use primitives::FeederLoss;
pub use snapshot::{
    AmplifierReport, ChannelReport, DistroChannelReport, GeneratorReport, PoweredSpeakerReport,
    RigReport, SpeakerReport,
};
pub use three_phase::ThreePhasePower;
