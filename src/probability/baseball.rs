// ── Baseball ─────────────────────────────────────────────────────────────────
//
// Key dynamics:
//   - Runs already "in progress" in the current half-inning are worth their
//     base-out run expectancy (runner on 3rd, 0 outs ≈ 1.35 runs)
//   - Every frame still to be played is worth ~0.5 runs to the batting team;
//     the home team has one more frame left during the top of an inning
//   - The fewer innings remain, the less a given margin can still move
//
// Model: margin = diff ± RE(bases, outs) + 0.5 × (home_frames − away_frames)
//        P(home wins) = sigmoid(k × margin / √innings_remaining)

use std::collections::BTreeMap;

use super::{factor_map, sigmoid, WinProbabilityModel};
use crate::game::{BaseballState, GameState, InningHalf, Sport, SportState};

/// Scheduled innings.
pub const REGULATION_INNINGS: u32 = 9;
/// League-average runs scored per half-inning.
const RUNS_PER_FRAME: f64 = 0.5;
/// Logistic coefficient on expected final margin.
/// Calibrated: 1-run lead entering the 8th → ~75%, 3-run lead in the 7th → ~90%.
const MARGIN_WEIGHT: f64 = 1.4;
const MIN_INNINGS_REMAINING: f64 = 0.1;
/// Innings after which confidence stops growing.
const CONFIDENCE_CAP_INNINGS: f64 = 6.0;

/// 2023 MLB run expectancy for the rest of the half-inning.
/// Rows: base state as a bitmask (1st = 1, 2nd = 2, 3rd = 4).
/// Columns: 0, 1, 2 outs.
const RUN_EXPECTANCY: [[f64; 3]; 8] = [
    // ___
    [0.48, 0.25, 0.10],
    // 1__
    [0.86, 0.51, 0.22],
    // _2_
    [1.10, 0.66, 0.32],
    // 12_
    [1.44, 0.90, 0.43],
    // __3
    [1.35, 0.95, 0.36],
    // 1_3
    [1.78, 1.14, 0.48],
    // _23
    [1.96, 1.38, 0.58],
    // 123
    [2.25, 1.54, 0.75],
];

pub struct BaseballModel;

/// Runs the batting team is expected to add before the third out.
pub fn run_expectancy(runners: [bool; 3], outs: u8) -> f64 {
    if outs >= 3 {
        return 0.0;
    }
    let base_state = runners
        .iter()
        .enumerate()
        .filter(|(_, on)| **on)
        .fold(0usize, |acc, (i, _)| acc | (1 << i));
    RUN_EXPECTANCY[base_state][usize::from(outs)]
}

fn detail(state: &GameState) -> BaseballState {
    state.baseball().cloned().unwrap_or_default()
}

/// Innings/frames still to be played after the current half-inning ends.
struct Frames {
    home: f64,
    away: f64,
    in_progress_home: f64,
    in_progress_away: f64,
    outs_left: f64,
}

fn frames(state: &GameState, bs: &BaseballState) -> Frames {
    let inning = state.period.max(1);
    let after = f64::from(REGULATION_INNINGS.saturating_sub(inning));
    let re = run_expectancy(bs.runners, bs.outs);
    let outs_left = f64::from(3u8.saturating_sub(bs.outs.min(3)));
    match bs.half {
        InningHalf::Top => Frames {
            home: after + 1.0,
            away: after,
            in_progress_home: 0.0,
            in_progress_away: re,
            outs_left,
        },
        InningHalf::Bottom => Frames {
            home: after,
            away: after,
            in_progress_home: re,
            in_progress_away: 0.0,
            outs_left,
        },
    }
}

fn expected_margin(state: &GameState, f: &Frames) -> f64 {
    state.score_diff() as f64 + f.in_progress_home - f.in_progress_away
        + RUNS_PER_FRAME * (f.home - f.away)
}

fn innings_remaining(f: &Frames) -> f64 {
    ((f.home + f.away) / 2.0 + f.outs_left / 6.0).max(MIN_INNINGS_REMAINING)
}

/// Completed innings, counting a finished top half as half an inning.
fn innings_played(state: &GameState, bs: &BaseballState) -> f64 {
    let completed = f64::from(state.period.max(1) - 1);
    match bs.half {
        InningHalf::Top => completed,
        InningHalf::Bottom => completed + 0.5,
    }
}

impl WinProbabilityModel for BaseballModel {
    fn sport(&self) -> Sport {
        Sport::Baseball
    }

    fn home_win_probability(&self, state: &GameState) -> f64 {
        let bs = detail(state);
        let f = frames(state, &bs);
        let z = MARGIN_WEIGHT * expected_margin(state, &f) / innings_remaining(&f).sqrt();
        sigmoid(z)
    }

    fn confidence(&self, state: &GameState) -> f64 {
        let played = innings_played(state, &detail(state)).min(CONFIDENCE_CAP_INNINGS);
        0.50 + 0.40 * played / CONFIDENCE_CAP_INNINGS
    }

    fn factors(&self, state: &GameState) -> BTreeMap<String, f64> {
        let bs = detail(state);
        let f = frames(state, &bs);
        factor_map(&[
            ("score_diff", state.score_diff() as f64),
            ("inning", f64::from(state.period)),
            ("outs", f64::from(bs.outs)),
            ("run_expectancy", run_expectancy(bs.runners, bs.outs)),
            ("expected_margin", expected_margin(state, &f)),
            ("innings_remaining", innings_remaining(&f)),
            ("runner_first", if bs.runners[0] { 1.0 } else { 0.0 }),
            ("runner_second", if bs.runners[1] { 1.0 } else { 0.0 }),
            ("runner_third", if bs.runners[2] { 1.0 } else { 0.0 }),
        ])
    }

    fn scoring_unit(&self) -> u32 {
        1
    }

    fn opening_state(&self, state: &GameState) -> GameState {
        GameState {
            home_score: 0,
            away_score: 0,
            period: 1,
            time_remaining_secs: 0,
            possession: None,
            detail: SportState::Baseball(BaseballState::default()),
            ..state.clone()
        }
    }
}
