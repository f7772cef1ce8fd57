use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

use crate::{
    config::MatchmakingConfig,
    state::{pvp_match::UserId, tier::RankTier},
};

/// A player waiting for an opponent.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Stable across re-joins of the same user.
    pub id: Uuid,
    pub user_id: UserId,
    /// Tier at admission; drives compatibility.
    pub tier: RankTier,
    pub joined_at: Instant,
    /// Entry stops being live after this instant.
    pub expires_at: Instant,
    /// Wall-clock counterpart of `expires_at`, reported to clients.
    pub expires_at_utc: SystemTime,
    /// Cleared when the player leaves or gets paired.
    pub active: bool,
}

impl QueueEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.active && self.expires_at > now
    }
}

/// Receipt returned when a player enters the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueTicket {
    /// Id of the queue entry.
    pub queue_id: Uuid,
    /// Live entries admitted strictly earlier; 0 is the front.
    pub position: usize,
    /// When the entry expires if nobody is found.
    pub expires_at: SystemTime,
}

/// Result of one pairing attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PairingOutcome {
    /// Both entries were withdrawn; the returned entry is the opponent.
    Paired(QueueEntry),
    /// Still queued, nobody compatible yet.
    NoCandidate,
    /// The requester has no live entry (left, expired or already paired).
    NotQueued,
}

/// Tier-aware waiting list.
///
/// Entries are kept in admission order, so the first compatible entry found while iterating is
/// the oldest one. Every mutation happens under a single lock, which makes pairing an atomic
/// compare-and-withdraw of both entries.
pub struct MatchmakingQueue {
    entries: Mutex<IndexMap<UserId, QueueEntry>>,
    ttl: Duration,
    tier_tolerance: u8,
    widen_every: Option<Duration>,
}

impl MatchmakingQueue {
    /// Empty queue using the configured TTL and tier window.
    pub fn new(config: &MatchmakingConfig) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            ttl: config.queue_ttl,
            tier_tolerance: config.tier_tolerance,
            widen_every: config.widen_every,
        }
    }

    /// Admit a player, or refresh their entry if they are already queued.
    pub async fn join(&self, user_id: &str, tier: RankTier) -> QueueTicket {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        // Re-inserting at the back keeps map order equal to admission order.
        let id = entries
            .shift_remove(user_id)
            .map(|previous| previous.id)
            .unwrap_or_else(Uuid::new_v4);
        let entry = QueueEntry {
            id,
            user_id: user_id.to_string(),
            tier,
            joined_at: now,
            expires_at: now + self.ttl,
            expires_at_utc: SystemTime::now() + self.ttl,
            active: true,
        };
        let ticket = QueueTicket {
            queue_id: entry.id,
            position: entries.values().filter(|e| e.is_live(now)).count(),
            expires_at: entry.expires_at_utc,
        };
        entries.insert(entry.user_id.clone(), entry);
        ticket
    }

    /// Withdraw a player. Returns whether a live entry was withdrawn.
    pub async fn leave(&self, user_id: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(user_id) {
            Some(entry) if entry.is_live(now) => {
                entry.active = false;
                true
            }
            _ => false,
        }
    }

    /// Pair the requester with the oldest compatible live entry.
    ///
    /// On success both entries are withdrawn before the lock is released, so no other caller
    /// can be handed either of them.
    pub async fn find_opponent(&self, user_id: &str, tier: RankTier) -> PairingOutcome {
        self.find_opponent_where(user_id, tier, |_| true).await
    }

    /// Like [`find_opponent`](Self::find_opponent), skipping candidates `eligible` rejects.
    /// Skipped entries stay queued.
    pub async fn find_opponent_where(
        &self,
        user_id: &str,
        tier: RankTier,
        eligible: impl Fn(&str) -> bool,
    ) -> PairingOutcome {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.is_live(now));

        let Some(requester) = entries.get(user_id) else {
            return PairingOutcome::NotQueued;
        };
        let tolerance = self.tolerance_after(now.saturating_duration_since(requester.joined_at));

        let Some(index) = entries.values().position(|candidate| {
            candidate.user_id != user_id
                && candidate.tier.distance(tier) <= tolerance
                && eligible(&candidate.user_id)
        }) else {
            return PairingOutcome::NoCandidate;
        };

        let Some((_, mut opponent)) = entries.shift_remove_index(index) else {
            return PairingOutcome::NoCandidate;
        };
        entries.shift_remove(user_id);
        opponent.active = false;
        PairingOutcome::Paired(opponent)
    }

    /// Tier distance accepted after waiting `waited`.
    fn tolerance_after(&self, waited: Duration) -> u8 {
        let widened = match self.widen_every {
            Some(step) if !step.is_zero() => {
                u8::try_from(waited.as_nanos() / step.as_nanos()).unwrap_or(u8::MAX)
            }
            _ => 0,
        };
        self.tier_tolerance.saturating_add(widened)
    }

    /// Drop expired and withdrawn entries, returning how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Whether the user holds a live entry.
    pub async fn is_queued(&self, user_id: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .get(user_id)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Raw entry, live or not.
    pub async fn entry(&self, user_id: &str) -> Option<QueueEntry> {
        self.entries.lock().await.get(user_id).cloned()
    }

    /// Number of live entries.
    pub async fn active_len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;

    fn queue() -> MatchmakingQueue {
        MatchmakingQueue::new(&MatchmakingConfig::default())
    }

    #[tokio::test]
    async fn join_reports_position_and_is_idempotent() {
        let queue = queue();
        let first = queue.join("alice", RankTier::Bronze1).await;
        let second = queue.join("bob", RankTier::Bronze1).await;
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);

        let again = queue.join("alice", RankTier::Bronze1).await;
        assert_eq!(again.queue_id, first.queue_id);
        assert_eq!(again.position, 1);
        assert_eq!(queue.active_len().await, 2);
    }

    #[tokio::test]
    async fn leave_is_a_noop_for_unknown_users() {
        let queue = queue();
        assert!(!queue.leave("ghost").await);

        queue.join("alice", RankTier::Bronze1).await;
        assert!(queue.leave("alice").await);
        assert!(!queue.leave("alice").await);
        assert!(!queue.is_queued("alice").await);
        assert_eq!(
            queue.find_opponent("alice", RankTier::Bronze1).await,
            PairingOutcome::NotQueued
        );
    }

    #[tokio::test]
    async fn ineligible_candidates_are_skipped_but_stay_queued() {
        let queue = queue();
        queue.join("ghost", RankTier::Bronze2).await;
        queue.join("live", RankTier::Bronze2).await;
        queue.join("me", RankTier::Bronze2).await;

        let outcome = queue
            .find_opponent_where("me", RankTier::Bronze2, |user| user != "ghost")
            .await;
        match outcome {
            PairingOutcome::Paired(opponent) => assert_eq!(opponent.user_id, "live"),
            other => panic!("expected pairing, got {other:?}"),
        }
        assert!(queue.is_queued("ghost").await);

        queue.join("other", RankTier::Bronze2).await;
        assert_eq!(
            queue
                .find_opponent_where("other", RankTier::Bronze2, |user| user != "ghost")
                .await,
            PairingOutcome::NoCandidate
        );
    }

    #[tokio::test]
    async fn pairs_oldest_compatible_entry() {
        let queue = queue();
        queue.join("silver", RankTier::Silver1).await;
        queue.join("early", RankTier::Bronze2).await;
        queue.join("late", RankTier::Bronze2).await;
        queue.join("me", RankTier::Bronze2).await;

        match queue.find_opponent("me", RankTier::Bronze2).await {
            PairingOutcome::Paired(opponent) => assert_eq!(opponent.user_id, "early"),
            other => panic!("expected pairing, got {other:?}"),
        }
        assert!(!queue.is_queued("me").await);
        assert!(!queue.is_queued("early").await);
        assert!(queue.is_queued("late").await);
        assert!(queue.is_queued("silver").await);
    }

    #[tokio::test]
    async fn exact_tier_policy_ignores_neighbours() {
        let queue = queue();
        queue.join("bronze", RankTier::Bronze3).await;
        queue.join("silver", RankTier::Silver1).await;
        assert_eq!(
            queue.find_opponent("silver", RankTier::Silver1).await,
            PairingOutcome::NoCandidate
        );
        assert!(queue.is_queued("silver").await);
    }

    #[tokio::test(start_paused = true)]
    async fn tolerance_widens_with_waiting_time() {
        let config = MatchmakingConfig {
            widen_every: Some(Duration::from_secs(10)),
            ..MatchmakingConfig::default()
        };
        let queue = MatchmakingQueue::new(&config);
        queue.join("gold", RankTier::Gold1).await;
        queue.join("silver", RankTier::Silver2).await;

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(
            queue.find_opponent("silver", RankTier::Silver2).await,
            PairingOutcome::NoCandidate
        );

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(matches!(
            queue.find_opponent("silver", RankTier::Silver2).await,
            PairingOutcome::Paired(entry) if entry.user_id == "gold"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_never_paired_and_get_swept() {
        let queue = queue();
        queue.join("stale", RankTier::Bronze1).await;
        tokio::time::advance(Duration::from_secs(301)).await;
        queue.join("fresh", RankTier::Bronze1).await;

        assert!(!queue.is_queued("stale").await);
        assert_eq!(
            queue.find_opponent("fresh", RankTier::Bronze1).await,
            PairingOutcome::NoCandidate
        );

        queue.join("gone", RankTier::Bronze1).await;
        queue.leave("gone").await;
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(queue.sweep_expired().await, 2);
        assert_eq!(queue.active_len().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_pollers_form_disjoint_pairs() {
        const USERS: usize = 64;
        let queue = Arc::new(queue());
        for n in 0..USERS {
            queue.join(&format!("user-{n}"), RankTier::Gold2).await;
        }

        let mut handles = Vec::new();
        for n in 0..USERS {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let me = format!("user-{n}");
                match queue.find_opponent(&me, RankTier::Gold2).await {
                    PairingOutcome::Paired(opponent) => Some((me, opponent.user_id)),
                    _ => None,
                }
            }));
        }

        let mut seen = HashSet::new();
        let mut pairs = 0;
        for handle in handles {
            if let Some((me, opponent)) = handle.await.unwrap() {
                assert!(seen.insert(me), "requester paired twice");
                assert!(seen.insert(opponent), "opponent paired twice");
                pairs += 1;
            }
        }
        assert_eq!(pairs, USERS / 2);
        assert_eq!(seen.len(), USERS);
        assert_eq!(queue.active_len().await, 0);
    }
}
