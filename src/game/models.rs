use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::probability::ProbabilityError;

/// Sports with a registered win-probability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Football,
    Basketball,
    Baseball,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Football => "football",
            Sport::Basketball => "basketball",
            Sport::Baseball => "baseball",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sport {
    type Err = ProbabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "football" | "american_football" | "nfl" | "ncaaf" => Ok(Sport::Football),
            "basketball" | "nba" | "ncaab" => Ok(Sport::Basketball),
            "baseball" | "mlb" => Ok(Sport::Baseball),
            other => Err(ProbabilityError::UnsupportedSport(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

/// Which team is ahead on the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lead {
    Home,
    Away,
    Tied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InningHalf {
    Top,
    Bottom,
}

impl fmt::Display for InningHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InningHalf::Top => f.write_str("Top"),
            InningHalf::Bottom => f.write_str("Bottom"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

/// Football situation: down and distance are relative to the team in
/// possession, `yard_line` is measured from that team's own goal line (1–99).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FootballState {
    pub down: u8,
    pub distance: u8,
    pub yard_line: u8,
    pub home_timeouts: u8,
    pub away_timeouts: u8,
    /// Points the home team was favored by before kickoff
    #[serde(default)]
    pub pregame_spread: Option<f64>,
}

impl Default for FootballState {
    fn default() -> Self {
        FootballState {
            down: 1,
            distance: 10,
            yard_line: 25,
            home_timeouts: 3,
            away_timeouts: 3,
            pregame_spread: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketballState {
    #[serde(default)]
    pub home_fouls: u32,
    #[serde(default)]
    pub away_fouls: u32,
    /// Possessions per 40 minutes
    #[serde(default = "default_pace")]
    pub pace: f64,
}

fn default_pace() -> f64 {
    crate::probability::basketball::DEFAULT_PACE
}

impl Default for BasketballState {
    fn default() -> Self {
        BasketballState {
            home_fouls: 0,
            away_fouls: 0,
            pace: default_pace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseballState {
    pub half: InningHalf,
    pub outs: u8,
    /// Occupied bases: first, second, third
    #[serde(default)]
    pub runners: [bool; 3],
}

impl Default for BaseballState {
    fn default() -> Self {
        BaseballState {
            half: InningHalf::Top,
            outs: 0,
            runners: [false; 3],
        }
    }
}

/// Sport-specific part of a game snapshot, tagged by sport on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sport", rename_all = "snake_case")]
pub enum SportState {
    Football(FootballState),
    Basketball(BasketballState),
    Baseball(BaseballState),
}

/// Live game snapshot as handed to the pipeline by the polling/streaming source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub game_id: String,
    pub home_team: Team,
    pub away_team: Team,
    pub home_score: u32,
    pub away_score: u32,
    /// Quarter, half or inning (1-based)
    pub period: u32,
    /// Seconds left in regulation; ignored for baseball
    #[serde(default)]
    pub time_remaining_secs: u32,
    #[serde(default)]
    pub possession: Option<Side>,
    /// Pregame home win probability, used for upset detection
    #[serde(default)]
    pub pregame_home_win_prob: Option<f64>,
    pub detail: SportState,
}

impl GameState {
    pub fn sport(&self) -> Sport {
        match self.detail {
            SportState::Football(_) => Sport::Football,
            SportState::Basketball(_) => Sport::Basketball,
            SportState::Baseball(_) => Sport::Baseball,
        }
    }

    /// Home score minus away score.
    pub fn score_diff(&self) -> i64 {
        i64::from(self.home_score) - i64::from(self.away_score)
    }

    pub fn lead(&self) -> Lead {
        match self.score_diff() {
            d if d > 0 => Lead::Home,
            d if d < 0 => Lead::Away,
            _ => Lead::Tied,
        }
    }

    pub fn football(&self) -> Option<&FootballState> {
        match &self.detail {
            SportState::Football(s) => Some(s),
            _ => None,
        }
    }

    pub fn basketball(&self) -> Option<&BasketballState> {
        match &self.detail {
            SportState::Basketball(s) => Some(s),
            _ => None,
        }
    }

    pub fn baseball(&self) -> Option<&BaseballState> {
        match &self.detail {
            SportState::Baseball(s) => Some(s),
            _ => None,
        }
    }

    pub fn half(&self) -> Option<InningHalf> {
        self.baseball().map(|b| b.half)
    }

    /// Scoreboard line, e.g. `"Cubs 3 - 2 Cardinals"` (home first).
    pub fn score_line(&self) -> String {
        format!(
            "{} {} - {} {}",
            self.home_team.name, self.home_score, self.away_score, self.away_team.name
        )
    }

    /// Human-readable game clock: `"Bottom 9th"`, `"Q4 2:05"`.
    pub fn situation(&self) -> String {
        match &self.detail {
            SportState::Baseball(b) => format!("{} {}", b.half, ordinal(self.period)),
            _ => {
                let mins = self.time_remaining_secs / 60;
                let secs = self.time_remaining_secs % 60;
                format!("P{} {}:{:02} left", self.period, mins, secs)
            }
        }
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}
