//! Smart alerting: per-user preferences, per-game history and the rule set
//! that turns win probability updates into alerts.

pub mod engine;
pub mod history;
pub mod models;
pub mod preferences;
pub mod rules;

pub use engine::{ClockFn, SmartAlertEngine, DEFAULT_QUEUE_CAPACITY};
pub use history::{DedupKey, GameHistory, HistoryStore, InMemoryHistoryStore};
pub use models::{Alert, AlertMetadata, AlertPriority, AlertType, DeliveryMethod, DeliveryStatus};
pub use preferences::{AlertPreferences, AlertThresholds, QuietHours};
