/// Live match slots and completed history.
pub mod matches;
/// Match record, rounds and decision slots.
pub mod pvp_match;
/// Matchmaking queue.
pub mod queue;
/// Connections and match rooms.
pub mod registry;
/// Trading scenarios and decisions.
pub mod scenario;
/// Round scoring and ranking rewards.
pub mod scoring;
/// Match lifecycle transitions.
pub mod state_machine;
/// Rank tiers.
pub mod tier;

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    dao::stats_store::{InMemoryStatsStore, StatsStore},
    services::scenario_provider::{ScenarioProvider, StaticScenarioProvider},
};

use self::{
    matches::MatchStore, pvp_match::UserId, queue::MatchmakingQueue,
    registry::ConnectionRegistry,
};

/// Handle shared by every task and handler.
pub type SharedState = Arc<AppState>;

/// Central application state: live connections, the queue, matches and collaborators.
pub struct AppState {
    config: Arc<AppConfig>,
    registry: ConnectionRegistry,
    queue: MatchmakingQueue,
    matches: MatchStore,
    searches: DashMap<UserId, CancellationToken>,
    forfeits: DashMap<UserId, CancellationToken>,
    scenarios: Arc<dyn ScenarioProvider>,
    stats: Arc<dyn StatsStore>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        scenarios: Arc<dyn ScenarioProvider>,
        stats: Arc<dyn StatsStore>,
    ) -> SharedState {
        let queue = MatchmakingQueue::new(&config.matchmaking);
        Arc::new(Self {
            config: Arc::new(config),
            registry: ConnectionRegistry::new(),
            queue,
            matches: MatchStore::new(),
            searches: DashMap::new(),
            forfeits: DashMap::new(),
            scenarios,
            stats,
        })
    }

    /// State backed by the static scenario bank and the in-memory stats store.
    pub fn with_defaults(config: AppConfig) -> SharedState {
        Self::new(
            config,
            Arc::new(StaticScenarioProvider::default()),
            Arc::new(InMemoryStatsStore::new()),
        )
    }

    /// Snapshot of the immutable application configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// Live connections and rooms.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Matchmaking queue.
    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    /// Live and completed matches.
    pub fn matches(&self) -> &MatchStore {
        &self.matches
    }

    /// Cancellation handles of running opponent searches, keyed by user.
    pub fn searches(&self) -> &DashMap<UserId, CancellationToken> {
        &self.searches
    }

    /// Pending disconnect forfeits, keyed by the disconnected user.
    pub fn forfeits(&self) -> &DashMap<UserId, CancellationToken> {
        &self.forfeits
    }

    /// Scenario source for new rounds.
    pub fn scenarios(&self) -> Arc<dyn ScenarioProvider> {
        Arc::clone(&self.scenarios)
    }

    /// Ranking collaborator.
    pub fn stats(&self) -> Arc<dyn StatsStore> {
        Arc::clone(&self.stats)
    }
}
