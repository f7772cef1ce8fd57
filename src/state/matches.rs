use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::state::{
    pvp_match::{PvpMatch, UserId},
    scenario::Scenario,
    state_machine::MatchStatus,
};

/// Shared handle to one match.
///
/// Every mutation of the record goes through `record`, which serializes racing submissions and
/// the driver's deadline handling.
pub struct MatchSlot {
    /// Same as the record's id.
    pub id: Uuid,
    /// The match record; hold the lock across read-modify-write.
    pub record: Mutex<PvpMatch>,
    scenarios: DashMap<u8, Arc<Scenario>>,
    decided: watch::Sender<u8>,
    cancel: CancellationToken,
}

impl MatchSlot {
    fn new(record: PvpMatch) -> Self {
        let (decided, _rx) = watch::channel(0);
        Self {
            id: record.id,
            record: Mutex::new(record),
            scenarios: DashMap::new(),
            decided,
            cancel: CancellationToken::new(),
        }
    }

    /// Remember the scenario served for a round.
    pub fn attach_scenario(&self, round_number: u8, scenario: Arc<Scenario>) {
        self.scenarios.insert(round_number, scenario);
    }

    /// Scenario served for a round, if any.
    pub fn scenario(&self, round_number: u8) -> Option<Arc<Scenario>> {
        self.scenarios
            .get(&round_number)
            .map(|entry| entry.value().clone())
    }

    /// Wake the driver waiting on `round_number`.
    pub fn signal_round_completed(&self, round_number: u8) {
        self.decided.send_if_modified(|latest| {
            if *latest < round_number {
                *latest = round_number;
                true
            } else {
                false
            }
        });
    }

    /// Highest round number reported as completed so far.
    pub fn decided_rounds(&self) -> watch::Receiver<u8> {
        self.decided.subscribe()
    }

    /// Cancelled when the match is abandoned.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abandon the match, waking anything waiting on it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Live matches, an index of each user's unfinished match, and the archive of completed ones.
///
/// A slot lives here from pairing until [`MatchStore::retire`]; only completed records outlive it,
/// as plain snapshots in each player's history.
#[derive(Default)]
pub struct MatchStore {
    matches: DashMap<Uuid, Arc<MatchSlot>>,
    active_by_user: DashMap<UserId, Uuid>,
    history: DashMap<UserId, Vec<Arc<PvpMatch>>>,
}

impl MatchStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly paired match and index it as both players' active match.
    pub fn insert(&self, record: PvpMatch) -> Arc<MatchSlot> {
        let players = [record.player_a.clone(), record.player_b.clone()];
        let slot = Arc::new(MatchSlot::new(record));
        self.matches.insert(slot.id, slot.clone());
        for player in players {
            self.active_by_user.insert(player, slot.id);
        }
        slot
    }

    /// Live match by id. Retired matches are gone.
    pub fn get(&self, match_id: Uuid) -> Option<Arc<MatchSlot>> {
        self.matches.get(&match_id).map(|entry| entry.value().clone())
    }

    /// The unfinished match a user is playing, if any.
    pub fn active_for(&self, user_id: &str) -> Option<Arc<MatchSlot>> {
        let match_id = *self.active_by_user.get(user_id)?;
        self.get(match_id)
    }

    /// Drop a finished or abandoned match. Completed records are kept in both players' history.
    pub fn retire(&self, record: &PvpMatch) {
        for player in [&record.player_a, &record.player_b] {
            self.active_by_user
                .remove_if(player, |_, current| *current == record.id);
        }
        self.matches.remove(&record.id);

        if record.status() == MatchStatus::Completed {
            let snapshot = Arc::new(record.clone());
            for player in [&record.player_a, &record.player_b] {
                self.history
                    .entry(player.clone())
                    .or_default()
                    .push(snapshot.clone());
            }
        }
    }

    /// Number of distinct unfinished matches.
    pub fn active_count(&self) -> usize {
        self.active_by_user
            .iter()
            .map(|entry| *entry.value())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Completed matches involving `user_id`, newest first.
    pub fn completed_for(&self, user_id: &str) -> Vec<Arc<PvpMatch>> {
        self.history
            .get(user_id)
            .map(|entry| entry.value().iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{pvp_match::fixtures::played_match, scenario::Decision, tier::RankTier};

    fn pairing(a: &str, b: &str) -> PvpMatch {
        PvpMatch::new(a.into(), b.into(), RankTier::Bronze1, 5)
    }

    fn finished(a: &str, b: &str) -> PvpMatch {
        played_match(a, b, Decision::Buy, Decision::Sell)
    }

    #[tokio::test]
    async fn active_index_tracks_both_players_until_retired() {
        let store = MatchStore::new();
        let slot = store.insert(pairing("alice", "bob"));

        assert_eq!(store.active_for("alice").map(|s| s.id), Some(slot.id));
        assert_eq!(store.active_for("bob").map(|s| s.id), Some(slot.id));

        let record = slot.record.lock().await.clone();
        store.retire(&record);
        assert!(store.active_for("alice").is_none());
        assert!(store.get(slot.id).is_none());
        assert_eq!(store.active_count(), 0);
    }

    #[tokio::test]
    async fn retire_keeps_newer_matches_indexed() {
        let store = MatchStore::new();
        let old = store.insert(pairing("alice", "bob"));
        let new = store.insert(pairing("alice", "carol"));

        let record = old.record.lock().await.clone();
        store.retire(&record);
        assert_eq!(store.active_for("alice").map(|s| s.id), Some(new.id));
    }

    #[tokio::test]
    async fn only_completed_matches_reach_history() {
        let store = MatchStore::new();
        let cancelled = store.insert(pairing("alice", "bob"));
        let abandoned = {
            let mut record = cancelled.record.lock().await;
            record.cancel().unwrap();
            record.clone()
        };
        store.retire(&abandoned);

        let first = finished("alice", "bob");
        let second = finished("carol", "alice");
        store.retire(&first);
        store.retire(&second);

        let ids: Vec<Uuid> = store.completed_for("alice").iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(store.completed_for("bob").len(), 1);
        assert!(store.completed_for("dave").is_empty());
        assert!(store.get(abandoned.id).is_none());
    }

    #[tokio::test]
    async fn round_signal_only_moves_forward() {
        let store = MatchStore::new();
        let slot = store.insert(pairing("alice", "bob"));
        let rx = slot.decided_rounds();

        slot.signal_round_completed(2);
        slot.signal_round_completed(1);
        assert_eq!(*rx.borrow(), 2);
    }
}
