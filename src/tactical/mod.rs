//! Tactical protocol: flares, priority mute, chat

pub mod coordinator;
pub mod events;

pub use coordinator::TacticalCoordinator;
pub use events::TacticalEvent;
