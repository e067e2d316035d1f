pub mod commands;
pub mod controller;
pub mod state;
pub mod store;

pub use commands::HostCommand;
pub use controller::{TrackerCommand, TrackerController, TrackerSnapshot};
pub use state::{
    DiscardReason, SessionTracker, StopPolicy, TrackerConfig, TrackerEffect, TrackerEvent,
    TrackerPhase, TrackerState,
};
pub use store::{AppendOutcome, SessionStore};
