// ── Football ─────────────────────────────────────────────────────────────────
//
// Key dynamics:
//   - Field position is worth points before they are scored: a 1st down at
//     midfield is ~2.2 expected points for the offense
//   - Later downs and long yardage erode that value (4th down keeps ~30%)
//   - The same lead is far safer with two minutes left than at kickoff
//   - Timeouts matter late (clock management), the pregame spread early
//
// Model: logit = adjusted_diff × k × √(4 / quarters_remaining)
//              + timeout_diff × w_to × (1 − quarters_remaining/4)
//              + spread × w_spread × (quarters_remaining/4)

use std::collections::BTreeMap;

use super::{factor_map, final_outcome, round_to, sigmoid, WinProbabilityModel};
use crate::game::{FootballState, GameState, Side, Sport, SportState};

/// Regulation length in seconds.
pub const REGULATION_SECS: u32 = 3600;
const QUARTER_SECS: f64 = 900.0;
const QUARTERS: f64 = 4.0;

/// Expected points for the offense by 10-yard band, measured from its own
/// goal line (index 0 = own 1–9, index 5 = midfield to opponent 41).
const EXPECTED_POINTS: [f64; 10] = [-0.4, 0.3, 0.8, 1.3, 1.8, 2.2, 2.9, 3.6, 4.4, 5.3];

/// Share of field-position value kept on 1st through 4th down.
const DOWN_MULTIPLIERS: [f64; 4] = [1.0, 0.8, 0.6, 0.3];
/// Value lost per yard to go beyond 3 yards (2nd down onward).
const DISTANCE_PENALTY_PER_YARD: f64 = 0.03;
const MAX_DISTANCE_PENALTY: f64 = 0.5;

/// Logit per point of adjusted margin at kickoff.
/// Calibrated: 7-pt lead at kickoff → ~61%, with 2 min left → ~92%.
const SCORE_WEIGHT: f64 = 0.065;
/// Cap on the clock multiplier so the final seconds stay finite.
const MAX_TIME_FACTOR: f64 = 6.0;
const TIMEOUT_WEIGHT: f64 = 0.08;
const SPREAD_WEIGHT: f64 = 0.06;
const MAX_TIMEOUTS: u8 = 3;

/// Points a scoring play is worth for EPA, overriding the table.
const TOUCHDOWN_POINTS: f64 = 7.0;
const FIELD_GOAL_POINTS: f64 = 3.0;
const SAFETY_POINTS: f64 = -2.0;

pub struct FootballModel;

/// How a play ended, for expected-points-added accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Normal,
    Touchdown,
    FieldGoal,
    Safety,
    Turnover,
}

/// Down, distance and field position at one instant of a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaySnapshot {
    pub down: u8,
    pub distance: u8,
    pub yard_line: u8,
}

impl From<&FootballState> for PlaySnapshot {
    fn from(s: &FootballState) -> Self {
        PlaySnapshot {
            down: s.down,
            distance: s.distance,
            yard_line: s.yard_line,
        }
    }
}

/// Raw table value for a yard line (clamped to 1–99).
pub fn field_position_value(yard_line: u8) -> f64 {
    let yl = yard_line.clamp(1, 99);
    EXPECTED_POINTS[usize::from(yl / 10)]
}

/// Scale applied to the field-position value for the current down and distance.
pub fn down_distance_multiplier(down: u8, distance: u8) -> f64 {
    let down = down.clamp(1, 4);
    let base = DOWN_MULTIPLIERS[usize::from(down - 1)];
    let penalty = if down > 1 && distance > 3 {
        (f64::from(distance - 3) * DISTANCE_PENALTY_PER_YARD).min(MAX_DISTANCE_PENALTY)
    } else {
        0.0
    };
    base * (1.0 - penalty)
}

/// Expected points for the offense in the given situation.
pub fn expected_points(play: PlaySnapshot) -> f64 {
    field_position_value(play.yard_line) * down_distance_multiplier(play.down, play.distance)
}

/// Expected points added by a single play.
pub fn calculate_epa(before: PlaySnapshot, after: PlaySnapshot, outcome: PlayOutcome) -> f64 {
    let pre = expected_points(before);
    let post = match outcome {
        PlayOutcome::Touchdown => TOUCHDOWN_POINTS,
        PlayOutcome::FieldGoal => FIELD_GOAL_POINTS,
        PlayOutcome::Safety => SAFETY_POINTS,
        // the other offense now owns the post-play field position
        PlayOutcome::Turnover => -expected_points(after),
        PlayOutcome::Normal => expected_points(after),
    };
    round_to(post - pre, 2)
}

fn detail(state: &GameState) -> FootballState {
    state.football().cloned().unwrap_or_default()
}

fn quarters_remaining(state: &GameState) -> f64 {
    f64::from(state.time_remaining_secs.min(REGULATION_SECS)) / QUARTER_SECS
}

/// Score differential plus the possessing team's expected points.
fn adjusted_score_diff(state: &GameState, fb: &FootballState) -> f64 {
    let diff = state.score_diff() as f64;
    let ep = expected_points(PlaySnapshot::from(fb));
    match state.possession {
        Some(Side::Home) => diff + ep,
        Some(Side::Away) => diff - ep,
        None => diff,
    }
}

fn timeout_diff(fb: &FootballState) -> f64 {
    f64::from(fb.home_timeouts.min(MAX_TIMEOUTS)) - f64::from(fb.away_timeouts.min(MAX_TIMEOUTS))
}

impl WinProbabilityModel for FootballModel {
    fn sport(&self) -> Sport {
        Sport::Football
    }

    fn home_win_probability(&self, state: &GameState) -> f64 {
        if state.time_remaining_secs == 0 {
            return final_outcome(state.score_diff() as f64);
        }
        let fb = detail(state);
        let qr = quarters_remaining(state);

        let time_factor = (QUARTERS / qr.max(0.01)).sqrt().min(MAX_TIME_FACTOR);
        let score_term = adjusted_score_diff(state, &fb) * SCORE_WEIGHT * time_factor;
        let timeout_term = timeout_diff(&fb) * TIMEOUT_WEIGHT * (1.0 - qr / QUARTERS);
        let spread_term = fb.pregame_spread.filter(|s| s.is_finite()).unwrap_or(0.0)
            * SPREAD_WEIGHT
            * (qr / QUARTERS);

        sigmoid(score_term + timeout_term + spread_term)
    }

    fn confidence(&self, state: &GameState) -> f64 {
        let diff = state.score_diff().abs();
        let t = state.time_remaining_secs.min(REGULATION_SECS);
        if diff > 21 && t < 600 {
            0.95
        } else if diff > 14 && t < 300 {
            0.90
        } else if diff <= 7 && t > 1800 {
            0.60
        } else if diff <= 3 && t > 900 {
            0.55
        } else {
            let elapsed = 1.0 - f64::from(t) / f64::from(REGULATION_SECS);
            0.60 + 0.30 * elapsed
        }
    }

    fn factors(&self, state: &GameState) -> BTreeMap<String, f64> {
        let fb = detail(state);
        let possession = match state.possession {
            Some(Side::Home) => 1.0,
            Some(Side::Away) => -1.0,
            None => 0.0,
        };
        let mut factors = factor_map(&[
            ("score_diff", state.score_diff() as f64),
            ("adjusted_score_diff", adjusted_score_diff(state, &fb)),
            ("expected_points", expected_points(PlaySnapshot::from(&fb))),
            ("quarters_remaining", quarters_remaining(state)),
            ("time_remaining_secs", f64::from(state.time_remaining_secs)),
            ("timeout_diff", timeout_diff(&fb)),
            ("down", f64::from(fb.down)),
            ("distance", f64::from(fb.distance)),
            ("yard_line", f64::from(fb.yard_line.clamp(1, 99))),
            ("possession", possession),
        ]);
        if let Some(spread) = fb.pregame_spread.filter(|s| s.is_finite()) {
            factors.insert("pregame_spread".into(), round_to(spread, 3));
        }
        factors
    }

    fn scoring_unit(&self) -> u32 {
        7
    }

    fn opening_state(&self, state: &GameState) -> GameState {
        let spread = detail(state).pregame_spread;
        GameState {
            home_score: 0,
            away_score: 0,
            period: 1,
            time_remaining_secs: REGULATION_SECS,
            possession: None,
            detail: SportState::Football(FootballState {
                pregame_spread: spread,
                ..FootballState::default()
            }),
            ..state.clone()
        }
    }
}
