use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::game::{GameState, InningHalf};
use crate::probability::WinProbabilityResult;

/// Conditions the engine can alert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighLeverage,
    LeadChange,
    CloseGame,
    UpsetAlert,
    WalkOff,
    MomentumShift,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighLeverage => "high_leverage",
            AlertType::LeadChange => "lead_change",
            AlertType::CloseGame => "close_game",
            AlertType::UpsetAlert => "upset_alert",
            AlertType::WalkOff => "walk_off",
            AlertType::MomentumShift => "momentum_shift",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Channels an alert can be delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryMethod {
    WebSocket,
    Push,
    Email,
    Sms,
}

impl DeliveryMethod {
    pub const ALL: [DeliveryMethod; 4] = [
        DeliveryMethod::WebSocket,
        DeliveryMethod::Push,
        DeliveryMethod::Email,
        DeliveryMethod::Sms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::WebSocket => "webSocket",
            DeliveryMethod::Push => "push",
            DeliveryMethod::Email => "email",
            DeliveryMethod::Sms => "sms",
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one delivery attempt on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed { error: String },
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryStatus::Sent)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DeliveryStatus::Failed { .. })
    }
}

/// Summary fields for sinks that do not want the full snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMetadata {
    pub home_team: String,
    pub away_team: String,
    /// Inning or period
    pub inning: u32,
    pub half: Option<InningHalf>,
    pub score: String,
    pub leverage_index: f64,
    /// Absolute win probability swing since the previous update
    pub wpa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "alertId")]
    pub id: String,
    pub user_id: String,
    pub game_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub title: String,
    pub message: String,
    pub game_state: GameState,
    pub win_probability: WinProbabilityResult,
    pub metadata: AlertMetadata,
    #[serde(default)]
    pub delivery_status: BTreeMap<DeliveryMethod, DeliveryStatus>,
    /// At least one channel was tried
    #[serde(default)]
    pub attempted: bool,
    /// At least one channel succeeded
    #[serde(default)]
    pub delivered: bool,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::game::models::fixtures as game_fixtures;
    use crate::probability::{FootballModel, WinProbabilityModel};

    pub fn alert(user_id: &str) -> Alert {
        let state = game_fixtures::football(21, 20, 4, 90);
        let win_probability = FootballModel.calculate(&state);
        Alert {
            id: "a1".into(),
            user_id: user_id.into(),
            game_id: state.game_id.clone(),
            timestamp: Utc::now(),
            alert_type: AlertType::HighLeverage,
            priority: AlertPriority::High,
            title: "High-leverage moment".into(),
            message: "test".into(),
            metadata: AlertMetadata {
                home_team: state.home_team.name.clone(),
                away_team: state.away_team.name.clone(),
                inning: state.period,
                half: None,
                score: state.score_line(),
                leverage_index: 3.2,
                wpa: 0.0,
            },
            game_state: state,
            win_probability,
            delivery_status: BTreeMap::new(),
            attempted: false,
            delivered: false,
        }
    }
}
