// ── Basketball ───────────────────────────────────────────────────────────────
//
// Key dynamics:
//   - Scoring is frequent, so a lead is judged against the noise of the
//     possessions still to be played, not against the clock directly
//   - Having the ball is worth about half a point
//   - Remaining possessions = pace × share of regulation left
//
// Model: z = (diff ± 0.5) / (√possessions × points_per_possession × σ × 2)
//        P(home wins) = Φ(z)

use std::collections::BTreeMap;

use super::{factor_map, final_outcome, normal_cdf, WinProbabilityModel};
use crate::game::{BasketballState, GameState, Side, Sport, SportState};

/// Regulation length in seconds (two 20-minute halves).
pub const REGULATION_SECS: u32 = 2400;
/// Possessions per 40 minutes when the feed does not supply one.
pub const DEFAULT_PACE: f64 = 68.0;
const MIN_PACE: f64 = 30.0;
const MAX_PACE: f64 = 120.0;

/// Point value of currently having the ball.
const POSSESSION_VALUE: f64 = 0.5;
const POINTS_PER_POSSESSION: f64 = 1.05;
/// Per-possession scoring standard deviation, in points-per-possession units.
const SCORING_STD_DEV: f64 = 0.75;
/// Floor on remaining possessions while the clock is still running.
const MIN_POSSESSIONS: f64 = 0.25;

pub struct BasketballModel;

fn detail(state: &GameState) -> BasketballState {
    state.basketball().cloned().unwrap_or_default()
}

fn pace(bb: &BasketballState) -> f64 {
    if bb.pace.is_finite() {
        bb.pace.clamp(MIN_PACE, MAX_PACE)
    } else {
        DEFAULT_PACE
    }
}

/// Possessions left in regulation at the current pace.
pub fn remaining_possessions(state: &GameState) -> f64 {
    let share_left = f64::from(state.time_remaining_secs.min(REGULATION_SECS))
        / f64::from(REGULATION_SECS);
    pace(&detail(state)) * share_left
}

fn adjusted_score_diff(state: &GameState) -> f64 {
    let diff = state.score_diff() as f64;
    match state.possession {
        Some(Side::Home) => diff + POSSESSION_VALUE,
        Some(Side::Away) => diff - POSSESSION_VALUE,
        None => diff,
    }
}

fn standard_error(possessions: f64) -> f64 {
    possessions.max(MIN_POSSESSIONS).sqrt() * POINTS_PER_POSSESSION * SCORING_STD_DEV * 2.0
}

impl WinProbabilityModel for BasketballModel {
    fn sport(&self) -> Sport {
        Sport::Basketball
    }

    fn home_win_probability(&self, state: &GameState) -> f64 {
        if state.time_remaining_secs == 0 {
            return final_outcome(state.score_diff() as f64);
        }
        let z = adjusted_score_diff(state) / standard_error(remaining_possessions(state));
        normal_cdf(z)
    }

    fn confidence(&self, state: &GameState) -> f64 {
        let diff = state.score_diff().abs();
        let poss = remaining_possessions(state);
        if diff > 15 && poss < 10.0 {
            0.95
        } else if diff > 10 && poss < 5.0 {
            0.90
        } else if diff <= 5 && poss > 40.0 {
            0.60
        } else if diff <= 3 && poss > 20.0 {
            0.55
        } else {
            let played = (1.0 - poss / pace(&detail(state))).clamp(0.0, 1.0);
            0.60 + 0.30 * played
        }
    }

    fn factors(&self, state: &GameState) -> BTreeMap<String, f64> {
        let bb = detail(state);
        let poss = remaining_possessions(state);
        factor_map(&[
            ("score_diff", state.score_diff() as f64),
            ("adjusted_score_diff", adjusted_score_diff(state)),
            ("remaining_possessions", poss),
            ("standard_error", standard_error(poss)),
            ("pace", pace(&bb)),
            ("home_fouls", f64::from(bb.home_fouls)),
            ("away_fouls", f64::from(bb.away_fouls)),
            ("time_remaining_secs", f64::from(state.time_remaining_secs)),
        ])
    }

    fn scoring_unit(&self) -> u32 {
        2
    }

    fn opening_state(&self, state: &GameState) -> GameState {
        let bb = detail(state);
        GameState {
            home_score: 0,
            away_score: 0,
            period: 1,
            time_remaining_secs: REGULATION_SECS,
            possession: None,
            detail: SportState::Basketball(BasketballState {
                home_fouls: 0,
                away_fouls: 0,
                pace: bb.pace,
            }),
            ..state.clone()
        }
    }
}
