//! Per-game alert history.
//!
//! The engine keeps one [`GameHistory`] per live game id: the previous win
//! probability and lead, the pregame underdog, and the dedup ledger of alerts
//! already fired. Storage sits behind [`HistoryStore`] so the in-process map
//! can be swapped for keyed external state; `mark_sent` is the atomic
//! check-and-set that keeps two concurrent updates from firing the same alert.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::models::AlertType;
use crate::game::{Lead, Side};

/// Dedup ledger entry. Walk-offs are keyed per inning so they can fire again
/// in extra innings; everything else is once per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub alert_type: AlertType,
    pub period: Option<u32>,
}

impl DedupKey {
    pub fn per_game(alert_type: AlertType) -> Self {
        DedupKey {
            alert_type,
            period: None,
        }
    }

    pub fn per_period(alert_type: AlertType, period: u32) -> Self {
        DedupKey {
            alert_type,
            period: Some(period),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameHistory {
    pub last_win_prob: f64,
    pub last_lead: Lead,
    pub alerts_sent: HashSet<DedupKey>,
    pub pregame_underdog: Option<Side>,
    pub pregame_home_prob: Option<f64>,
}

impl GameHistory {
    /// Fresh history; the pregame probability (if any) fixes the underdog.
    pub fn new(pregame_home_prob: Option<f64>) -> Self {
        let pregame_home_prob = pregame_home_prob.filter(|p| (0.0..=1.0).contains(p));
        let pregame_underdog = pregame_home_prob.and_then(|p| {
            if p < 0.5 {
                Some(Side::Home)
            } else if p > 0.5 {
                Some(Side::Away)
            } else {
                None
            }
        });
        GameHistory {
            last_win_prob: 0.5,
            last_lead: Lead::Tied,
            alerts_sent: HashSet::new(),
            pregame_underdog,
            pregame_home_prob,
        }
    }

    pub fn has_sent(&self, key: &DedupKey) -> bool {
        self.alerts_sent.contains(key)
    }
}

impl Default for GameHistory {
    fn default() -> Self {
        GameHistory::new(None)
    }
}

/// Keyed storage for game histories.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Snapshot of the game's history, creating it on first sight. The
    /// pregame probability is only used when the entry is created.
    async fn get_or_create(&self, game_id: &str, pregame_home_prob: Option<f64>) -> GameHistory;

    /// Record `key` as fired. Returns `false` if it was already recorded
    /// or the game's history has been cleared.
    async fn mark_sent(&self, game_id: &str, key: DedupKey) -> bool;

    /// Store the latest win probability and lead. A cleared game stays
    /// cleared.
    async fn record_update(&self, game_id: &str, win_prob: f64, lead: Lead);

    /// Drop the game's history. Returns whether an entry existed.
    async fn clear(&self, game_id: &str) -> bool;

    async fn game_count(&self) -> usize;
}

/// Process-local store; one entry per live game until cleared.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    games: RwLock<HashMap<String, GameHistory>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get_or_create(&self, game_id: &str, pregame_home_prob: Option<f64>) -> GameHistory {
        if let Some(h) = self.games.read().await.get(game_id) {
            return h.clone();
        }
        let mut games = self.games.write().await;
        games
            .entry(game_id.to_string())
            .or_insert_with(|| GameHistory::new(pregame_home_prob))
            .clone()
    }

    async fn mark_sent(&self, game_id: &str, key: DedupKey) -> bool {
        let mut games = self.games.write().await;
        match games.get_mut(game_id) {
            Some(h) => h.alerts_sent.insert(key),
            None => false,
        }
    }

    async fn record_update(&self, game_id: &str, win_prob: f64, lead: Lead) {
        let mut games = self.games.write().await;
        if let Some(h) = games.get_mut(game_id) {
            h.last_win_prob = win_prob;
            h.last_lead = lead;
        }
    }

    async fn clear(&self, game_id: &str) -> bool {
        self.games.write().await.remove(game_id).is_some()
    }

    async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_history_defaults() {
        let h = GameHistory::default();
        assert_eq!(h.last_win_prob, 0.5);
        assert_eq!(h.last_lead, Lead::Tied);
        assert!(h.alerts_sent.is_empty());
        assert!(h.pregame_underdog.is_none());
    }

    #[test]
    fn test_pregame_underdog() {
        assert_eq!(GameHistory::new(Some(0.3)).pregame_underdog, Some(Side::Home));
        assert_eq!(GameHistory::new(Some(0.7)).pregame_underdog, Some(Side::Away));
        assert_eq!(GameHistory::new(Some(0.5)).pregame_underdog, None);
        let bogus = GameHistory::new(Some(1.7));
        assert!(bogus.pregame_home_prob.is_none());
        assert!(bogus.pregame_underdog.is_none());
    }

    #[tokio::test]
    async fn test_pregame_captured_only_on_create() {
        let store = InMemoryHistoryStore::new();
        let first = store.get_or_create("g1", Some(0.3)).await;
        assert_eq!(first.pregame_home_prob, Some(0.3));
        let second = store.get_or_create("g1", Some(0.9)).await;
        assert_eq!(second.pregame_home_prob, Some(0.3));
    }

    #[tokio::test]
    async fn test_mark_sent_is_check_and_set() {
        let store = InMemoryHistoryStore::new();
        store.get_or_create("g1", None).await;
        store.get_or_create("g2", None).await;
        let key = DedupKey::per_game(AlertType::HighLeverage);
        assert!(store.mark_sent("g1", key).await);
        assert!(!store.mark_sent("g1", key).await);
        // other games and other innings are independent
        assert!(store.mark_sent("g2", key).await);
        assert!(store.mark_sent("g1", DedupKey::per_period(AlertType::WalkOff, 9)).await);
        assert!(store.mark_sent("g1", DedupKey::per_period(AlertType::WalkOff, 10)).await);
    }

    #[tokio::test]
    async fn test_concurrent_mark_sent_fires_once() {
        let store = Arc::new(InMemoryHistoryStore::new());
        store.get_or_create("g1", None).await;
        let key = DedupKey::per_game(AlertType::CloseGame);
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.mark_sent("g1", key).await })
            })
            .collect();
        let mut wins = 0;
        for t in tasks {
            if t.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_record_and_clear() {
        let store = InMemoryHistoryStore::new();
        store.get_or_create("g1", None).await;
        store.record_update("g1", 0.72, Lead::Home).await;
        let h = store.get_or_create("g1", None).await;
        assert_eq!(h.last_win_prob, 0.72);
        assert_eq!(h.last_lead, Lead::Home);
        assert_eq!(store.game_count().await, 1);
        assert!(store.clear("g1").await);
        assert!(!store.clear("g1").await);
        assert_eq!(store.game_count().await, 0);
        let fresh = store.get_or_create("g1", None).await;
        assert_eq!(fresh.last_lead, Lead::Tied);
    }

    #[tokio::test]
    async fn test_cleared_game_is_not_recreated_by_writes() {
        let store = InMemoryHistoryStore::new();
        store.get_or_create("g1", Some(0.3)).await;
        assert!(store.clear("g1").await);

        // an update that was already in flight when the game was cleared
        assert!(!store.mark_sent("g1", DedupKey::per_game(AlertType::UpsetAlert)).await);
        store.record_update("g1", 0.9, Lead::Away).await;
        assert_eq!(store.game_count().await, 0);
    }
}
