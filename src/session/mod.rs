//! Session lifecycle and microphone gating

pub mod machine;
pub mod state;

pub use machine::Session;
pub use state::{AudioState, ConnectionState, MuteOverrideState, SessionSnapshot};
