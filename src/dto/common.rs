use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::scenario::{ChartData, Difficulty, Scenario};

/// Price chart as shown to players.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChartView {
    pub ticker: String,
    pub asset_name: String,
    pub labels: Vec<String>,
    pub prices: Vec<f64>,
}

impl ChartView {
    /// Only the prefix visible while a round is open.
    pub fn visible(chart: &ChartData) -> Self {
        Self {
            ticker: chart.ticker.clone(),
            asset_name: chart.asset_name.clone(),
            labels: chart.labels.iter().take(chart.prices.len()).cloned().collect(),
            prices: chart.prices.clone(),
        }
    }

    /// Complete series including the outcome.
    pub fn full(chart: &ChartData) -> Self {
        Self {
            ticker: chart.ticker.clone(),
            asset_name: chart.asset_name.clone(),
            labels: chart.labels.clone(),
            prices: chart.full_prices.clone(),
        }
    }
}

/// Scenario content sent with `round_start`. Carries no answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScenarioView {
    pub scenario_id: Uuid,
    pub difficulty: Difficulty,
    pub news_content: String,
    pub chart: ChartView,
}

impl From<&Scenario> for ScenarioView {
    fn from(scenario: &Scenario) -> Self {
        Self {
            scenario_id: scenario.id,
            difficulty: scenario.difficulty,
            news_content: scenario.news_content.clone(),
            chart: ChartView::visible(&scenario.chart),
        }
    }
}
