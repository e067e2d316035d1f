pub mod detection;
pub mod session;

pub use detection::DetectionEvent;
pub use session::{
    duration_to_secs, seconds_between, HealthBadge, Session, MIN_SESSION_DURATION_SECS,
};
