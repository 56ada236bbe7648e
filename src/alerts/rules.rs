//! Alert rules.
//!
//! Each rule is an independent predicate over the fresh estimate, the game's
//! history and the user's thresholds. Rules run in a fixed order so output is
//! deterministic; order does not change which rules match.

use super::history::{DedupKey, GameHistory};
use super::models::{AlertPriority, AlertType};
use super::preferences::AlertPreferences;
use crate::game::{GameState, InningHalf, Lead, Side};
use crate::probability::{round_to, WinProbabilityResult};

/// Period/inning from which a game counts as "late".
pub const LATE_GAME_PERIOD: u32 = 7;
/// Live win probability the pregame underdog must reach.
pub const UPSET_WIN_PROB: f64 = 0.70;
pub const WALK_OFF_INNING: u32 = 9;
pub const WALK_OFF_MIN_LEVERAGE: f64 = 1.5;
/// Win probability swing between consecutive updates.
pub const MOMENTUM_SWING: f64 = 0.15;
const BIG_MOMENTUM_SWING: f64 = 0.25;
const EXTREME_LEVERAGE: f64 = 3.0;

/// Everything a rule may look at for one update.
pub struct RuleContext<'a> {
    pub state: &'a GameState,
    pub result: &'a WinProbabilityResult,
    pub leverage_index: f64,
    pub history: &'a GameHistory,
    pub preferences: &'a AlertPreferences,
}

impl RuleContext<'_> {
    fn home_prob(&self) -> f64 {
        self.result.home_win_probability
    }

    /// Absolute change in home win probability since the last update,
    /// rounded to the 3 decimals probabilities are reported in.
    pub fn swing(&self) -> f64 {
        round_to((self.home_prob() - self.history.last_win_prob).abs(), 3)
    }

    fn matchup(&self) -> String {
        format!("{} at {}", self.state.away_team.name, self.state.home_team.name)
    }

    fn pct(p: f64) -> String {
        format!("{:.0}%", p * 100.0)
    }
}

/// A rule that matched, before dedup recording and delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    /// Ledger entry to record; `None` means the rule may fire every update
    pub dedup: Option<DedupKey>,
    pub title: String,
    pub message: String,
}

type Rule = fn(&RuleContext<'_>) -> Option<RuleMatch>;

const RULES: [(AlertType, Rule); 6] = [
    (AlertType::HighLeverage, high_leverage),
    (AlertType::LeadChange, lead_change),
    (AlertType::CloseGame, close_game),
    (AlertType::UpsetAlert, upset_alert),
    (AlertType::WalkOff, walk_off),
    (AlertType::MomentumShift, momentum_shift),
];

/// Run every enabled rule. Matches whose dedup key is already in the
/// history's ledger are dropped here.
pub fn evaluate(ctx: &RuleContext<'_>) -> Vec<RuleMatch> {
    RULES
        .iter()
        .filter(|(alert_type, _)| ctx.preferences.is_enabled(*alert_type))
        .filter_map(|(_, rule)| rule(ctx))
        .filter(|m| m.dedup.map_or(true, |key| !ctx.history.has_sent(&key)))
        .collect()
}

fn high_leverage(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let li = ctx.leverage_index;
    if li < ctx.preferences.thresholds.min_leverage {
        return None;
    }
    let priority = if li >= EXTREME_LEVERAGE {
        AlertPriority::Critical
    } else {
        AlertPriority::High
    };
    Some(RuleMatch {
        alert_type: AlertType::HighLeverage,
        priority,
        dedup: Some(DedupKey::per_game(AlertType::HighLeverage)),
        title: "High-leverage moment".into(),
        message: format!(
            "{}, {}: leverage index {:.2}, {}",
            ctx.matchup(),
            ctx.state.situation(),
            li,
            ctx.state.score_line()
        ),
    })
}

fn lead_change(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let current = ctx.state.lead();
    let previous = ctx.history.last_lead;
    if current == previous {
        return None;
    }
    // the opening score of the game is not a lead change
    if ctx.state.period <= 1 && previous == Lead::Tied {
        return None;
    }
    let priority = if ctx.state.period >= LATE_GAME_PERIOD {
        AlertPriority::Critical
    } else {
        AlertPriority::High
    };
    let title = match current {
        Lead::Home => format!("{} take the lead", ctx.state.home_team.name),
        Lead::Away => format!("{} take the lead", ctx.state.away_team.name),
        Lead::Tied => "Game tied".to_string(),
    };
    Some(RuleMatch {
        alert_type: AlertType::LeadChange,
        priority,
        dedup: None,
        title,
        message: format!(
            "{} ({}). {} win probability now {}",
            ctx.state.score_line(),
            ctx.state.situation(),
            ctx.state.home_team.name,
            RuleContext::pct(ctx.home_prob())
        ),
    })
}

fn close_game(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    if ctx.state.period < LATE_GAME_PERIOD {
        return None;
    }
    let distance = round_to((ctx.home_prob() - 0.5).abs(), 3);
    if distance >= ctx.preferences.thresholds.close_game_margin {
        return None;
    }
    Some(RuleMatch {
        alert_type: AlertType::CloseGame,
        priority: AlertPriority::Medium,
        dedup: Some(DedupKey::per_game(AlertType::CloseGame)),
        title: "Close game late".into(),
        message: format!(
            "{} is a coin flip in the {}: {}",
            ctx.matchup(),
            ctx.state.situation(),
            ctx.state.score_line()
        ),
    })
}

fn upset_alert(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let underdog = ctx.history.pregame_underdog?;
    let pregame_home = ctx.history.pregame_home_prob?;
    let pregame_gap = round_to((2.0 * pregame_home - 1.0).abs(), 3);
    if pregame_gap <= ctx.preferences.thresholds.upset_threshold {
        return None;
    }
    let (live, pregame, team) = match underdog {
        Side::Home => (
            ctx.result.home_win_probability,
            pregame_home,
            &ctx.state.home_team.name,
        ),
        Side::Away => (
            ctx.result.away_win_probability,
            1.0 - pregame_home,
            &ctx.state.away_team.name,
        ),
    };
    if live < UPSET_WIN_PROB {
        return None;
    }
    Some(RuleMatch {
        alert_type: AlertType::UpsetAlert,
        priority: AlertPriority::High,
        dedup: Some(DedupKey::per_game(AlertType::UpsetAlert)),
        title: format!("Upset brewing: {}", team),
        message: format!(
            "{} were {} before the game and are now {} to win. {}",
            team,
            RuleContext::pct(pregame),
            RuleContext::pct(live),
            ctx.state.score_line()
        ),
    })
}

fn walk_off(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let bs = ctx.state.baseball()?;
    if bs.half != InningHalf::Bottom || ctx.state.period < WALK_OFF_INNING {
        return None;
    }
    if ctx.state.lead() == Lead::Home || ctx.leverage_index < WALK_OFF_MIN_LEVERAGE {
        return None;
    }
    Some(RuleMatch {
        alert_type: AlertType::WalkOff,
        priority: AlertPriority::Critical,
        dedup: Some(DedupKey::per_period(AlertType::WalkOff, ctx.state.period)),
        title: "Walk-off chance".into(),
        message: format!(
            "{} are one swing from a walk-off in the {}: {}",
            ctx.state.home_team.name,
            ctx.state.situation(),
            ctx.state.score_line()
        ),
    })
}

fn momentum_shift(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let swing = ctx.swing();
    if swing < MOMENTUM_SWING {
        return None;
    }
    let priority = if swing >= BIG_MOMENTUM_SWING {
        AlertPriority::High
    } else {
        AlertPriority::Medium
    };
    let gainer = if ctx.home_prob() > ctx.history.last_win_prob {
        &ctx.state.home_team.name
    } else {
        &ctx.state.away_team.name
    };
    Some(RuleMatch {
        alert_type: AlertType::MomentumShift,
        priority,
        dedup: None,
        title: format!("Momentum shift toward {}", gainer),
        message: format!(
            "Win probability moved {:.0} points ({} → {} for {}). {}",
            swing * 100.0,
            RuleContext::pct(ctx.history.last_win_prob),
            RuleContext::pct(ctx.home_prob()),
            ctx.state.home_team.name,
            ctx.state.score_line()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::models::fixtures;
    use crate::probability::{BaseballModel, WinProbabilityModel};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn result(home: f64) -> WinProbabilityResult {
        WinProbabilityResult {
            home_win_probability: home,
            away_win_probability: 1.0 - home,
            confidence: 0.8,
            factors: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    fn types(matches: &[RuleMatch]) -> Vec<AlertType> {
        matches.iter().map(|m| m.alert_type).collect()
    }

    fn run(state: &GameState, home: f64, li: f64, history: &GameHistory) -> Vec<RuleMatch> {
        let prefs = AlertPreferences::default();
        run_with(state, home, li, history, &prefs)
    }

    fn run_with(
        state: &GameState,
        home: f64,
        li: f64,
        history: &GameHistory,
        prefs: &AlertPreferences,
    ) -> Vec<RuleMatch> {
        let r = result(home);
        let ctx = RuleContext {
            state,
            result: &r,
            leverage_index: li,
            history,
            preferences: prefs,
        };
        evaluate(&ctx)
    }

    #[test]
    fn quiet_mid_game_update_matches_nothing() {
        let g = fixtures::baseball(2, 2, 4, InningHalf::Top, 1, [false; 3]);
        let h = GameHistory::default();
        assert!(run(&g, 0.52, 1.0, &h).is_empty());
    }

    #[test]
    fn high_leverage_threshold_and_ledger() {
        let g = fixtures::baseball(0, 0, 4, InningHalf::Top, 1, [false; 3]);
        let mut h = GameHistory::default();
        assert_eq!(types(&run(&g, 0.5, 1.8, &h)), vec![AlertType::HighLeverage]);
        assert!(run(&g, 0.5, 1.79, &h).is_empty());
        h.alerts_sent.insert(DedupKey::per_game(AlertType::HighLeverage));
        assert!(run(&g, 0.5, 4.0, &h).is_empty());
    }

    #[test]
    fn high_leverage_respects_user_threshold() {
        let g = fixtures::baseball(0, 0, 4, InningHalf::Top, 1, [false; 3]);
        let mut prefs = AlertPreferences::default();
        prefs.thresholds.min_leverage = 2.5;
        let h = GameHistory::default();
        assert!(run_with(&g, 0.5, 2.0, &h, &prefs).is_empty());
        let m = run_with(&g, 0.5, 3.1, &h, &prefs);
        assert_eq!(m[0].priority, AlertPriority::Critical);
    }

    #[test]
    fn opening_score_is_not_a_lead_change() {
        let g = fixtures::baseball(0, 1, 1, InningHalf::Top, 1, [false; 3]);
        let h = GameHistory::default();
        assert!(run(&g, 0.45, 1.0, &h).is_empty());
    }

    #[test]
    fn late_lead_change_is_critical() {
        let g = fixtures::baseball(3, 2, 8, InningHalf::Bottom, 1, [false; 3]);
        let h = GameHistory::default();
        let m = run(&g, 0.64, 1.0, &h);
        assert_eq!(types(&m), vec![AlertType::LeadChange]);
        assert_eq!(m[0].priority, AlertPriority::Critical);
        assert_eq!(m[0].title, "Home take the lead");
    }

    #[test]
    fn mid_game_lead_change_is_high() {
        let g = fixtures::baseball(2, 3, 5, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Home,
            last_win_prob: 0.5,
            ..GameHistory::default()
        };
        let m = run(&g, 0.45, 1.0, &h);
        assert_eq!(types(&m), vec![AlertType::LeadChange]);
        assert_eq!(m[0].priority, AlertPriority::High);
        assert_eq!(m[0].title, "Away take the lead");
    }

    #[test]
    fn tying_run_is_a_lead_change() {
        let g = fixtures::baseball(3, 3, 1, InningHalf::Bottom, 2, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Away,
            ..GameHistory::default()
        };
        let m = run(&g, 0.5, 1.0, &h);
        assert_eq!(m[0].title, "Game tied");
    }

    #[test]
    fn close_game_needs_late_period() {
        let h = GameHistory::default();
        let early = fixtures::baseball(1, 1, 6, InningHalf::Top, 0, [false; 3]);
        assert!(run(&early, 0.52, 1.0, &h).is_empty());
        let late = fixtures::baseball(1, 1, 7, InningHalf::Top, 0, [false; 3]);
        assert_eq!(types(&run(&late, 0.52, 1.0, &h)), vec![AlertType::CloseGame]);
        assert!(run(&late, 0.61, 1.0, &h).is_empty());
    }

    #[test]
    fn upset_requires_pregame_context() {
        let g = fixtures::baseball(0, 5, 6, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Away,
            last_win_prob: 0.2,
            ..GameHistory::default()
        };
        assert!(run(&g, 0.2, 1.0, &h).is_empty());
    }

    #[test]
    fn upset_fires_for_big_underdog() {
        let g = fixtures::baseball(0, 5, 6, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Away,
            last_win_prob: 0.2,
            ..GameHistory::new(Some(0.7))
        };
        let m = run(&g, 0.2, 1.0, &h);
        assert_eq!(types(&m), vec![AlertType::UpsetAlert]);
        assert_eq!(m[0].title, "Upset brewing: Away");
    }

    #[test]
    fn upset_ignores_small_pregame_gap() {
        let g = fixtures::baseball(0, 5, 6, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Away,
            last_win_prob: 0.2,
            ..GameHistory::new(Some(0.6))
        };
        assert!(run(&g, 0.2, 1.0, &h).is_empty());
    }

    #[test]
    fn walk_off_bottom_ninth_home_not_leading() {
        let g = fixtures::baseball(2, 2, 9, InningHalf::Bottom, 2, [false, false, true]);
        let h = GameHistory::default();
        let li = BaseballModel.leverage_index(&g);
        let m = run(&g, 0.55, li, &h);
        assert!(types(&m).contains(&AlertType::WalkOff));
        let walk = m.iter().find(|m| m.alert_type == AlertType::WalkOff).unwrap();
        assert_eq!(walk.dedup, Some(DedupKey::per_period(AlertType::WalkOff, 9)));
    }

    #[test]
    fn walk_off_not_in_top_half_or_when_leading() {
        let prefs = AlertPreferences {
            alert_types: [(AlertType::HighLeverage, false), (AlertType::CloseGame, false)]
                .into_iter()
                .collect(),
            ..AlertPreferences::default()
        };
        let h = GameHistory::default();
        let top = fixtures::baseball(2, 2, 9, InningHalf::Top, 2, [false, false, true]);
        assert!(run_with(&top, 0.5, 3.0, &h, &prefs).is_empty());
        let leading = fixtures::baseball(4, 2, 10, InningHalf::Bottom, 2, [false; 3]);
        let h_home = GameHistory {
            last_lead: Lead::Home,
            last_win_prob: 0.99,
            ..GameHistory::default()
        };
        assert!(run_with(&leading, 0.99, 3.0, &h_home, &prefs).is_empty());
    }

    #[test]
    fn walk_off_refires_in_extra_innings() {
        let mut h = GameHistory::default();
        h.alerts_sent.insert(DedupKey::per_period(AlertType::WalkOff, 9));
        let tenth = fixtures::baseball(3, 3, 10, InningHalf::Bottom, 1, [true, true, false]);
        let m = run(&tenth, 0.5, 2.0, &h);
        assert!(types(&m).contains(&AlertType::WalkOff));
    }

    #[test]
    fn walk_off_is_baseball_only() {
        let g = fixtures::football(10, 10, 9, 300);
        let h = GameHistory::default();
        let prefs = AlertPreferences {
            alert_types: [(AlertType::HighLeverage, false), (AlertType::CloseGame, false)]
                .into_iter()
                .collect(),
            ..AlertPreferences::default()
        };
        assert!(run_with(&g, 0.5, 5.0, &h, &prefs).is_empty());
    }

    #[test]
    fn momentum_fires_every_time() {
        let g = fixtures::baseball(1, 0, 3, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Home,
            last_win_prob: 0.40,
            alerts_sent: [DedupKey::per_game(AlertType::HighLeverage)].into_iter().collect(),
            ..GameHistory::default()
        };
        let m = run(&g, 0.70, 1.0, &h);
        assert_eq!(types(&m), vec![AlertType::MomentumShift]);
        assert_eq!(m[0].priority, AlertPriority::High);
        assert!(m[0].dedup.is_none());
        assert_eq!(m[0].title, "Momentum shift toward Home");

        let small = run(&g, 0.50, 1.0, &h);
        assert!(small.is_empty());
    }

    #[test]
    fn momentum_threshold_is_inclusive() {
        let g = fixtures::baseball(1, 0, 3, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Home,
            last_win_prob: 0.132,
            ..GameHistory::default()
        };
        let m = run(&g, 0.282, 1.0, &h);
        assert_eq!(types(&m), vec![AlertType::MomentumShift]);
        assert_eq!(m[0].priority, AlertPriority::Medium);
        assert!(run(&g, 0.281, 1.0, &h).is_empty());

        let down = GameHistory {
            last_win_prob: 0.582,
            ..h
        };
        assert_eq!(types(&run(&g, 0.432, 1.0, &down)), vec![AlertType::MomentumShift]);
    }

    #[test]
    fn big_momentum_threshold_is_inclusive() {
        let g = fixtures::baseball(1, 0, 3, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Home,
            last_win_prob: 0.332,
            ..GameHistory::default()
        };
        let m = run(&g, 0.582, 1.0, &h);
        assert_eq!(m[0].priority, AlertPriority::High);
    }

    #[test]
    fn close_game_margin_is_exclusive() {
        let g = fixtures::baseball(1, 1, 8, InningHalf::Top, 0, [false; 3]);
        for p in [0.600, 0.400] {
            let h = GameHistory {
                last_win_prob: p,
                ..GameHistory::default()
            };
            assert!(run(&g, p, 1.0, &h).is_empty(), "{} counted as close", p);
        }
        for p in [0.599, 0.401] {
            let h = GameHistory {
                last_win_prob: p,
                ..GameHistory::default()
            };
            assert_eq!(types(&run(&g, p, 1.0, &h)), vec![AlertType::CloseGame]);
        }
    }

    #[test]
    fn upset_gap_must_exceed_threshold() {
        // away underdog at 35%, gap exactly 0.30
        let away_dog = fixtures::baseball(0, 5, 6, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Away,
            last_win_prob: 0.2,
            ..GameHistory::new(Some(0.65))
        };
        assert!(run(&away_dog, 0.2, 1.0, &h).is_empty());

        // home underdog at 35%, gap exactly 0.30
        let home_dog = fixtures::baseball(5, 0, 6, InningHalf::Top, 0, [false; 3]);
        let h = GameHistory {
            last_lead: Lead::Home,
            last_win_prob: 0.8,
            ..GameHistory::new(Some(0.35))
        };
        assert!(run(&home_dog, 0.8, 1.0, &h).is_empty());

        let h = GameHistory {
            last_lead: Lead::Away,
            last_win_prob: 0.2,
            ..GameHistory::new(Some(0.651))
        };
        assert_eq!(types(&run(&away_dog, 0.2, 1.0, &h)), vec![AlertType::UpsetAlert]);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let g = fixtures::baseball(3, 2, 8, InningHalf::Bottom, 1, [false; 3]);
        let prefs = AlertPreferences {
            alert_types: [(AlertType::LeadChange, false)].into_iter().collect(),
            ..AlertPreferences::default()
        };
        assert!(run_with(&g, 0.64, 1.0, &GameHistory::default(), &prefs).is_empty());
    }

    #[test]
    fn rules_run_in_fixed_order() {
        let g = fixtures::baseball(2, 2, 9, InningHalf::Bottom, 2, [false, false, true]);
        let h = GameHistory {
            last_lead: Lead::Away,
            last_win_prob: 0.20,
            ..GameHistory::default()
        };
        let m = run(&g, 0.55, 3.5, &h);
        assert_eq!(
            types(&m),
            vec![
                AlertType::HighLeverage,
                AlertType::LeadChange,
                AlertType::CloseGame,
                AlertType::WalkOff,
                AlertType::MomentumShift,
            ]
        );
    }
}
