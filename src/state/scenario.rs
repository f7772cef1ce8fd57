use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Trade action a player commits to for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Open or add to a position.
    Buy,
    /// Close the position.
    Sell,
    /// Do nothing and wait.
    Hold,
}

impl Decision {
    /// Wire representation used in payloads and requests.
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Buy => "buy",
            Decision::Sell => "sell",
            Decision::Hold => "hold",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string does not name a known decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown decision `{0}` (expected buy, sell or hold)")]
pub struct UnknownDecision(pub String);

impl FromStr for Decision {
    type Err = UnknownDecision;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "buy" => Ok(Decision::Buy),
            "sell" => Ok(Decision::Sell),
            "hold" => Ok(Decision::Hold),
            other => Err(UnknownDecision(other.to_string())),
        }
    }
}

/// How hard a scenario is to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Price series attached to a scenario.
///
/// `prices` is the visible prefix shown while the round is open, `full_prices` extends it with
/// the outcome revealed once the round is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub ticker: String,
    pub asset_name: String,
    pub labels: Vec<String>,
    pub prices: Vec<f64>,
    pub full_prices: Vec<f64>,
}

/// Decision challenge played during one round.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: Uuid,
    pub difficulty: Difficulty,
    pub news_content: String,
    pub chart: ChartData,
    /// Server-side only until the round is scored.
    pub correct_decision: Decision,
    /// Server-side only until the round is scored.
    pub explanation: String,
}
