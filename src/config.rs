//! Application-level configuration loading: matchmaking timings, round pacing and reward policy.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::state::scoring::{RewardRules, ScoringRules};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SMARTSTOCKS_PVP_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub matchmaking: MatchmakingConfig,
    pub pacing: PacingConfig,
    pub scoring: ScoringRules,
    pub rewards: RewardRules,
    pub connection: ConnectionConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        total_rounds = app_config.scoring.total_rounds,
                        tier_tolerance = app_config.matchmaking.tier_tolerance,
                        "loaded pvp configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Longest time the match driver waits for both decisions of a round.
    pub fn round_deadline(&self) -> Duration {
        Duration::from_secs(u64::from(self.scoring.time_limit_secs)) + self.pacing.decision_grace
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Queue polling, expiry and pairing tolerance.
pub struct MatchmakingConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "poll_interval_ms")]
    pub poll_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "search_timeout_ms")]
    pub search_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "queue_ttl_ms")]
    pub queue_ttl: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "sweep_interval_ms")]
    pub sweep_interval: Duration,
    /// Tier levels an opponent may differ by right away.
    pub tier_tolerance: u8,
    /// Widen the tolerance by one level each time the requester has waited this long.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "widen_every_ms")]
    pub widen_every: Option<Duration>,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            search_timeout: Duration::from_secs(300),
            queue_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            tier_tolerance: 0,
            widen_every: None,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Fixed delays the match driver inserts between lifecycle steps.
pub struct PacingConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "pre_round_delay_ms")]
    pub pre_round_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "inter_round_delay_ms")]
    pub inter_round_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "pre_result_delay_ms")]
    pub pre_result_delay: Duration,
    /// Slack added to the decision window before unanswered slots time out.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "decision_grace_ms")]
    pub decision_grace: Duration,
    /// How long a disconnected player has to come back before the match is cancelled.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "disconnect_grace_ms")]
    pub disconnect_grace: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            pre_round_delay: Duration::from_secs(3),
            inter_round_delay: Duration::from_secs(3),
            pre_result_delay: Duration::from_secs(2),
            decision_grace: Duration::from_secs(3),
            disconnect_grace: Duration::from_secs(10),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Per-connection queue sizing and liveness timers.
pub struct ConnectionConfig {
    pub outbound_capacity: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "read_timeout_ms")]
    pub read_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "heartbeat_interval_ms")]
    pub heartbeat_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            read_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(54),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.matchmaking.poll_interval, Duration::from_secs(1));
        assert_eq!(config.matchmaking.queue_ttl, Duration::from_secs(300));
        assert_eq!(config.pacing.pre_result_delay, Duration::from_secs(2));
        assert_eq!(config.scoring, ScoringRules::default());
        assert_eq!(config.rewards, RewardRules::default());
        assert_eq!(config.connection.outbound_capacity, 256);
        assert!(config.matchmaking.widen_every.is_none());
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "matchmaking": { "poll_interval_ms": 250, "tier_tolerance": 1, "widen_every_ms": 20000 },
                "rewards": { "win_base": 300 },
                "pacing": { "decision_grace_ms": 500 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.matchmaking.poll_interval, Duration::from_millis(250));
        assert_eq!(config.matchmaking.search_timeout, Duration::from_secs(300));
        assert_eq!(config.matchmaking.tier_tolerance, 1);
        assert_eq!(
            config.matchmaking.widen_every,
            Some(Duration::from_secs(20))
        );
        assert_eq!(config.rewards.win_base, 300);
        assert_eq!(config.rewards.loss_penalty, 100);
        assert_eq!(config.round_deadline(), Duration::from_millis(15_500));
    }
}
