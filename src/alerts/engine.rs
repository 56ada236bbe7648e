use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::history::{HistoryStore, InMemoryHistoryStore};
use super::models::{Alert, AlertMetadata, DeliveryMethod};
use super::preferences::AlertPreferences;
use super::rules::{self, RuleContext, RuleMatch};
use crate::delivery::{DeliveryChannel, DeliveryDispatcher};
use crate::game::GameState;
use crate::probability::{ModelFactory, ProbabilityError, WinProbabilityResult};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Source of "now"; injectable so quiet hours can be tested.
pub type ClockFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Turns game updates into deduplicated, prioritised alerts and hands them
/// to the delivery dispatcher.
///
/// One engine serves every user and game. It is built once, has its
/// delivery channels registered, and is then shared behind an `Arc`.
pub struct SmartAlertEngine {
    factory: ModelFactory,
    history: Arc<dyn HistoryStore>,
    dispatcher: DeliveryDispatcher,
    queue: Mutex<VecDeque<Alert>>,
    queue_capacity: usize,
    clock: ClockFn,
}

impl SmartAlertEngine {
    pub fn new(factory: ModelFactory) -> Self {
        SmartAlertEngine {
            factory,
            history: Arc::new(InMemoryHistoryStore::new()),
            dispatcher: DeliveryDispatcher::new(),
            queue: Mutex::new(VecDeque::new()),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_history_store(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn with_clock(mut self, clock: ClockFn) -> Self {
        self.clock = clock;
        self
    }

    /// Bound on the inspection queue; the oldest alert is dropped when full.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn register_delivery_method(&mut self, method: DeliveryMethod, channel: Arc<dyn DeliveryChannel>) {
        self.dispatcher.register(method, channel);
    }

    pub fn factory(&self) -> &ModelFactory {
        &self.factory
    }

    /// Evaluate one game update for one user.
    ///
    /// Returns the alerts that fired, already dispatched. An unsupported
    /// sport is the only error; nothing is recorded for it.
    pub async fn process_game_update(
        &self,
        state: &GameState,
        preferences: &AlertPreferences,
    ) -> Result<Vec<Alert>, ProbabilityError> {
        if !preferences.is_watching(state) {
            debug!(
                "User {} does not follow {} or {}, skipping game {}",
                preferences.user_id, state.home_team.id, state.away_team.id, state.game_id
            );
            return Ok(Vec::new());
        }
        let now = (self.clock)();
        if preferences.in_quiet_hours(now) {
            debug!(
                "Quiet hours for user {}, skipping game {}",
                preferences.user_id, state.game_id
            );
            return Ok(Vec::new());
        }

        let model = self.factory.model_for(state.sport())?;
        let history = self
            .history
            .get_or_create(&state.game_id, state.pregame_home_win_prob)
            .await;

        let result = model.calculate_at(state, now);
        let leverage_index = model.leverage_index(state);
        let ctx = RuleContext {
            state,
            result: &result,
            leverage_index,
            history: &history,
            preferences,
        };
        let matches = rules::evaluate(&ctx);
        let wpa = ctx.swing();

        // losing a check-and-set race means another update already fired it
        let mut fired = Vec::with_capacity(matches.len());
        for m in matches {
            if let Some(key) = m.dedup {
                if !self.history.mark_sent(&state.game_id, key).await {
                    debug!("{} for game {} already sent", m.alert_type, state.game_id);
                    continue;
                }
            }
            fired.push(m);
        }

        self.history
            .record_update(&state.game_id, result.home_win_probability, state.lead())
            .await;

        let mut alerts = Vec::with_capacity(fired.len());
        for m in fired {
            let mut alert = build_alert(m, state, &result, leverage_index, wpa, preferences, now);
            info!(
                "🔔 {} [{:?}] for user {} in game {}: {}",
                alert.alert_type, alert.priority, alert.user_id, alert.game_id, alert.title
            );
            self.dispatcher.dispatch(&mut alert, preferences).await;
            self.enqueue(alert.clone()).await;
            alerts.push(alert);
        }
        Ok(alerts)
    }

    async fn enqueue(&self, alert: Alert) {
        let mut queue = self.queue.lock().await;
        while queue.len() >= self.queue_capacity {
            if let Some(dropped) = queue.pop_front() {
                debug!("Alert queue full, dropping {}", dropped.id);
            }
        }
        queue.push_back(alert);
    }

    /// Forget everything about a finished game.
    pub async fn clear_game_history(&self, game_id: &str) -> bool {
        let existed = self.history.clear(game_id).await;
        if existed {
            info!("Cleared alert history for game {}", game_id);
        }
        existed
    }

    pub async fn tracked_games(&self) -> usize {
        self.history.game_count().await
    }

    /// Snapshot of generated alerts, oldest first.
    pub async fn get_alert_queue(&self) -> Vec<Alert> {
        self.queue.lock().await.iter().cloned().collect()
    }

    /// Drop delivered alerts from the queue; returns how many were removed.
    pub async fn clear_delivered_alerts(&self) -> usize {
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        queue.retain(|a| !a.delivered);
        before - queue.len()
    }
}

fn build_alert(
    m: RuleMatch,
    state: &GameState,
    result: &WinProbabilityResult,
    leverage_index: f64,
    wpa: f64,
    preferences: &AlertPreferences,
    now: DateTime<Utc>,
) -> Alert {
    Alert {
        id: Uuid::new_v4().to_string(),
        user_id: preferences.user_id.clone(),
        game_id: state.game_id.clone(),
        timestamp: now,
        alert_type: m.alert_type,
        priority: m.priority,
        title: m.title,
        message: m.message,
        game_state: state.clone(),
        win_probability: result.clone(),
        metadata: AlertMetadata {
            home_team: state.home_team.name.clone(),
            away_team: state.away_team.name.clone(),
            inning: state.period,
            half: state.half(),
            score: state.score_line(),
            leverage_index,
            wpa,
        },
        delivery_status: Default::default(),
        attempted: false,
        delivered: false,
    }
}
