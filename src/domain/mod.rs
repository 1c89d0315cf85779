pub mod amplifier;
pub mod cable;
pub mod connection;
pub mod generator;
pub mod rig;
pub mod settings;
pub mod speaker;
pub mod types;

pub use amplifier::*;
pub use cable::*;
pub use connection::*;
pub use generator::*;
pub use rig::*;
pub use settings::*;
pub use speaker::*;
pub use types::*;
