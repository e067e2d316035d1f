pub mod copy;
pub mod engine;
pub mod notifier;
pub mod policy;

pub use engine::{Alert, AlertEngine, ManualOutcome};
pub use notifier::{LogNotifier, NotificationPermission, Notifier};
pub use policy::{AlertConfig, AlertKind, AlertPolicy, ConfigError, Priority};
