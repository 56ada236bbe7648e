//! Live win probability models and a smart alert engine.
//!
//! ```text
//!  GameState ──▶ ModelFactory ──▶ WinProbabilityModel (football / basketball / baseball)
//!                                     │ WinProbabilityResult + leverage index
//!                                     ▼
//!              SmartAlertEngine ── rules + per-game HistoryStore
//!                                     │ Vec<Alert>
//!                                     ▼
//!              DeliveryDispatcher ──▶ websocket broadcast / push / email / SMS webhooks
//! ```

pub mod alerts;
pub mod config;
pub mod delivery;
pub mod game;
pub mod probability;
pub mod server;

pub use alerts::{Alert, AlertPreferences, SmartAlertEngine};
pub use game::GameState;
pub use probability::{ModelFactory, ProbabilityError, WinProbabilityModel, WinProbabilityResult};
