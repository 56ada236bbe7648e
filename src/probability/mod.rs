//! Sport-specific in-play win probability models.
//!
//! Every model is a pure function of the [`GameState`]: no I/O, no shared
//! mutable state, and no failure mode for a structurally valid snapshot.
//! Out-of-range inputs (yard line 0, negative pace, four outs) are clamped to
//! the nearest meaningful value instead of rejected.
//!
//! Models implemented:
//! - **Football**: expected points from field position × down/distance,
//!   clock decay on quarters remaining, timeout edge, pregame spread prior
//! - **Basketball**: remaining possessions from pace, z-score of the margin
//!   against the scoring noise still to come, normal CDF
//! - **Baseball**: base-out run expectancy for the half-inning in progress
//!   plus flat runs per remaining frame, logistic on expected final margin
//!
//! Results are rounded (probabilities to 3 decimals, confidence to 2) so that
//! identical snapshots compare equal.

pub mod baseball;
pub mod basketball;
pub mod factory;
pub mod football;

pub use baseball::BaseballModel;
pub use basketball::BasketballModel;
pub use factory::ModelFactory;
pub use football::FootballModel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::game::{GameState, Sport};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbabilityError {
    /// No model is registered for the sport tag.
    #[error("unsupported sport: {0}")]
    UnsupportedSport(String),
}

/// Output of a single model invocation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinProbabilityResult {
    pub home_win_probability: f64,
    pub away_win_probability: f64,
    pub confidence: f64,
    /// Inputs that drove the estimate, keyed by name
    pub factors: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

impl WinProbabilityResult {
    /// Same estimate with the timestamp ignored.
    pub fn same_estimate(&self, other: &WinProbabilityResult) -> bool {
        self.home_win_probability == other.home_win_probability
            && self.away_win_probability == other.away_win_probability
            && self.confidence == other.confidence
            && self.factors == other.factors
    }
}

/// A win probability model for one sport.
///
/// Implementors supply the raw home probability, a confidence heuristic and
/// the factor echo; rounding, result assembly and the leverage index are
/// shared.
pub trait WinProbabilityModel: Send + Sync {
    fn sport(&self) -> Sport;

    /// Unrounded P(home wins) in [0, 1].
    fn home_win_probability(&self, state: &GameState) -> f64;

    /// Confidence in the estimate, [0, 1].
    fn confidence(&self, state: &GameState) -> f64;

    fn factors(&self, state: &GameState) -> BTreeMap<String, f64>;

    /// Points added by a typical score (touchdown, basket, run).
    fn scoring_unit(&self) -> u32;

    /// The same matchup reset to a tied score at the first snap/tip/pitch.
    fn opening_state(&self, state: &GameState) -> GameState;

    fn calculate(&self, state: &GameState) -> WinProbabilityResult {
        self.calculate_at(state, Utc::now())
    }

    fn calculate_at(&self, state: &GameState, timestamp: DateTime<Utc>) -> WinProbabilityResult {
        let home = round_to(clamp_unit(self.home_win_probability(state)), 3);
        WinProbabilityResult {
            home_win_probability: home,
            away_win_probability: round_to(1.0 - home, 3),
            confidence: round_to(clamp_unit(self.confidence(state)), 2),
            factors: self.factors(state),
            timestamp,
        }
    }

    /// How much one score by either side would swing the game right now,
    /// relative to the same swing at the opening whistle (1.0 = average).
    fn leverage_index(&self, state: &GameState) -> f64 {
        let baseline = probability_swing(self, &self.opening_state(state));
        if baseline <= f64::EPSILON {
            return 1.0;
        }
        round_to(probability_swing(self, state) / baseline, 2)
    }
}

/// Half the spread between "home scores next" and "away scores next".
fn probability_swing<M: WinProbabilityModel + ?Sized>(model: &M, state: &GameState) -> f64 {
    let unit = model.scoring_unit();
    let mut home_scores = state.clone();
    home_scores.home_score = home_scores.home_score.saturating_add(unit);
    let mut away_scores = state.clone();
    away_scores.away_score = away_scores.away_score.saturating_add(unit);
    (model.home_win_probability(&home_scores) - model.home_win_probability(&away_scores)).abs()
        / 2.0
}

// ── Math utilities ───────────────────────────────────────────────────────────

/// Numerically stable logistic sigmoid.
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Standard normal CDF, Abramowitz & Stegun 26.2.17 (|error| < 7.5e-8).
pub(crate) fn normal_cdf(z: f64) -> f64 {
    const P: f64 = 0.231_641_9;
    const B: [f64; 5] = [
        0.319_381_530,
        -0.356_563_782,
        1.781_477_937,
        -1.821_255_978,
        1.330_274_429,
    ];
    let x = z.abs();
    let t = 1.0 / (1.0 + P * x);
    let pdf = (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt();
    let poly = t * (B[0] + t * (B[1] + t * (B[2] + t * (B[3] + t * B[4]))));
    let upper_tail = pdf * poly;
    if z >= 0.0 {
        1.0 - upper_tail
    } else {
        upper_tail
    }
}

/// Probability at the final buzzer: decided unless tied.
pub(crate) fn final_outcome(score_diff: f64) -> f64 {
    if score_diff > 0.0 {
        1.0
    } else if score_diff < 0.0 {
        0.0
    } else {
        0.5
    }
}

pub(crate) fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round() / scale
}

fn clamp_unit(p: f64) -> f64 {
    if p.is_nan() {
        0.5
    } else {
        p.clamp(0.0, 1.0)
    }
}

pub(crate) fn factor_map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), round_to(*v, 3)))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
