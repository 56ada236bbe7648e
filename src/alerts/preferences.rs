use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use super::models::{AlertType, DeliveryMethod};
use crate::game::GameState;

const QUIET_HOURS_FORMAT: &str = "%H:%M";

/// Per-user alert subscription, supplied fresh with every update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPreferences {
    pub user_id: String,
    /// Team ids the user follows
    #[serde(default)]
    pub team_ids: Vec<String>,
    /// Per-type switches; a type missing from the map is enabled
    #[serde(default)]
    pub alert_types: HashMap<AlertType, bool>,
    #[serde(default)]
    pub thresholds: AlertThresholds,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
    /// IANA zone name for quiet hours, e.g. `"America/Chicago"`; UTC if unset
    #[serde(default)]
    pub timezone: Option<String>,
    /// Channels to deliver through; a channel missing from the map is off
    #[serde(default)]
    pub delivery_methods: HashMap<DeliveryMethod, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertThresholds {
    /// Minimum leverage index for a high-leverage alert
    pub min_leverage: f64,
    /// Minimum pregame favorite-minus-underdog gap for an upset alert
    pub upset_threshold: f64,
    /// Maximum distance from 50% for a close-game alert
    pub close_game_margin: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            min_leverage: 1.8,
            upset_threshold: 0.30,
            close_game_margin: 0.10,
        }
    }
}

/// Local wall-clock window ("HH:MM") in which nothing is delivered.
/// `start > end` wraps past midnight; `start == end` is an empty window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: String,
    pub end: String,
}

impl QuietHours {
    pub fn new(start: &str, end: &str) -> Self {
        QuietHours {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    fn window(&self) -> Option<(NaiveTime, NaiveTime)> {
        let start = NaiveTime::parse_from_str(self.start.trim(), QUIET_HOURS_FORMAT).ok()?;
        let end = NaiveTime::parse_from_str(self.end.trim(), QUIET_HOURS_FORMAT).ok()?;
        Some((start, end))
    }

    /// Whether `t` falls inside the window. Unparseable bounds never match.
    pub fn contains(&self, t: NaiveTime) -> bool {
        let Some((start, end)) = self.window() else {
            warn!(
                "Ignoring malformed quiet hours {}-{}",
                self.start, self.end
            );
            return false;
        };
        if start <= end {
            t >= start && t < end
        } else {
            t >= start || t < end
        }
    }
}

impl AlertPreferences {
    /// Whether the user follows either team in the game.
    pub fn is_watching(&self, state: &GameState) -> bool {
        self.team_ids
            .iter()
            .any(|id| *id == state.home_team.id || *id == state.away_team.id)
    }

    pub fn is_enabled(&self, alert_type: AlertType) -> bool {
        self.alert_types.get(&alert_type).copied().unwrap_or(true)
    }

    pub fn wants_delivery(&self, method: DeliveryMethod) -> bool {
        self.delivery_methods.get(&method).copied().unwrap_or(false)
    }

    /// The user's zone, falling back to UTC when unset or unknown.
    pub fn time_zone(&self) -> Tz {
        match self.timezone.as_deref() {
            None => Tz::UTC,
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                warn!("Unknown timezone '{}' for user {}, using UTC", name, self.user_id);
                Tz::UTC
            }),
        }
    }

    pub fn in_quiet_hours(&self, now: DateTime<Utc>) -> bool {
        match &self.quiet_hours {
            Some(q) => q.contains(now.with_timezone(&self.time_zone()).time()),
            None => false,
        }
    }
}
