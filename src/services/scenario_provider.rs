//! Scenario sources for match rounds.
//!
//! The static bank always answers. Generated scenarios (feature `ai-scenarios`) sit in front of
//! it and fall back to it on any failure.

use std::{sync::Arc, time::Duration};

use futures::future::{BoxFuture, FutureExt};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::state::{
    scenario::{ChartData, Decision, Difficulty, Scenario},
    tier::RankTier,
};

/// Errors raised while producing a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario source unavailable: {0}")]
    Unavailable(String),
    #[error("scenario source timed out")]
    Timeout,
    #[error("malformed scenario: {0}")]
    Malformed(String),
    #[error("no scenario available for {0:?}")]
    Exhausted(Difficulty),
}

/// Supplies one decision challenge per round.
pub trait ScenarioProvider: Send + Sync {
    fn get_scenario(&self, tier: RankTier) -> BoxFuture<'static, Result<Scenario, ScenarioError>>;
}

/// Scenario as produced by an external generator, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioDraft {
    pub news_content: String,
    pub chart_data: ChartData,
    pub correct_decision: Decision,
    #[serde(default)]
    pub explanation: String,
}

impl ScenarioDraft {
    /// Check the draft is playable and stamp it with an id.
    pub fn into_scenario(self, difficulty: Difficulty) -> Result<Scenario, ScenarioError> {
        let chart = &self.chart_data;
        if self.news_content.trim().is_empty() {
            return Err(ScenarioError::Malformed("news content is empty".into()));
        }
        if chart.prices.is_empty() {
            return Err(ScenarioError::Malformed("chart prices are empty".into()));
        }
        if chart.full_prices.len() <= chart.prices.len() {
            return Err(ScenarioError::Malformed(
                "full prices must extend the visible prices".into(),
            ));
        }
        if chart.labels.len() < chart.prices.len() {
            return Err(ScenarioError::Malformed(
                "chart has fewer labels than prices".into(),
            ));
        }

        Ok(Scenario {
            id: Uuid::new_v4(),
            difficulty,
            news_content: self.news_content,
            chart: self.chart_data,
            correct_decision: self.correct_decision,
            explanation: self.explanation,
        })
    }
}

/// Strip a Markdown code fence some generators wrap around JSON.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Built-in scenarios, one bank per difficulty.
pub struct StaticScenarioProvider {
    easy: Vec<ScenarioDraft>,
    medium: Vec<ScenarioDraft>,
    hard: Vec<ScenarioDraft>,
}

impl Default for StaticScenarioProvider {
    fn default() -> Self {
        Self {
            easy: vec![draft(
                "AAPL",
                "Apple Inc.",
                "Apple reports record iPhone sales. Quarterly revenue beat market expectations \
                 with 15% growth, driven by strong demand in emerging markets and the success of \
                 the new models with built-in AI features.",
                [150.0, 155.0, 158.0, 162.0, 165.0, 170.0, 175.0],
                &[180.0, 185.0, 188.0, 190.0, 195.0],
                Decision::Buy,
                "A clear uptrend backed by excellent results makes this a good moment to buy. \
                 The company shows sustained growth and positive guidance.",
            )],
            medium: vec![draft(
                "MELI",
                "MercadoLibre",
                "MercadoLibre posts mixed results. Revenue grew 20% while operating costs rose \
                 25%. Expansion in Brazil looks promising but competition in Argentina is \
                 heating up, and analysts are split on the short-term outlook.",
                [1200.0, 1250.0, 1230.0, 1280.0, 1260.0, 1290.0, 1270.0],
                &[1280.0, 1290.0, 1285.0, 1295.0, 1300.0],
                Decision::Hold,
                "Mixed results and a choppy chart call for patience. Growth potential is there, \
                 but rising costs add uncertainty; holding lets you watch the story develop \
                 without taking extra risk.",
            )],
            hard: vec![draft(
                "YPF",
                "YPF",
                "The central bank raises interest rates by 2 points to fight inflation. That \
                 usually strengthens the currency but squeezes indebted companies. YPF carries \
                 heavy dollar-denominated debt, and new energy-sector regulation may hit margins.",
                [320.0, 335.0, 328.0, 340.0, 345.0, 338.0, 350.0],
                &[340.0, 325.0, 315.0, 305.0, 295.0],
                Decision::Sell,
                "The chart still points up, but the macro picture says trouble ahead: higher \
                 rates make YPF's dollar debt more expensive and new rules will pressure \
                 profitability. Take profits before the correction.",
            )],
        }
    }
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn draft(
    ticker: &str,
    asset_name: &str,
    news: &str,
    visible: [f64; 7],
    outcome: &[f64],
    correct_decision: Decision,
    explanation: &str,
) -> ScenarioDraft {
    let full_prices: Vec<f64> = visible.iter().chain(outcome).copied().collect();
    ScenarioDraft {
        news_content: news.to_string(),
        chart_data: ChartData {
            ticker: ticker.to_string(),
            asset_name: asset_name.to_string(),
            labels: MONTHS
                .iter()
                .take(full_prices.len())
                .map(|m| m.to_string())
                .collect(),
            prices: visible.to_vec(),
            full_prices,
        },
        correct_decision,
        explanation: explanation.to_string(),
    }
}

impl StaticScenarioProvider {
    fn bank(&self, difficulty: Difficulty) -> &[ScenarioDraft] {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    /// Pick a random scenario of the given difficulty.
    pub fn pick(&self, difficulty: Difficulty) -> Result<Scenario, ScenarioError> {
        self.bank(difficulty)
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(ScenarioError::Exhausted(difficulty))?
            .into_scenario(difficulty)
    }
}

impl ScenarioProvider for StaticScenarioProvider {
    fn get_scenario(&self, tier: RankTier) -> BoxFuture<'static, Result<Scenario, ScenarioError>> {
        let result = self.pick(tier.difficulty());
        async move { result }.boxed()
    }
}

/// Tries `primary` first and serves the static bank when it fails or is too slow.
pub struct FallbackScenarioProvider {
    primary: Arc<dyn ScenarioProvider>,
    fallback: Arc<StaticScenarioProvider>,
    timeout: Duration,
}

impl FallbackScenarioProvider {
    /// Wrap `primary`, giving it `timeout` per scenario.
    pub fn new(primary: Arc<dyn ScenarioProvider>, timeout: Duration) -> Self {
        Self {
            primary,
            fallback: Arc::new(StaticScenarioProvider::default()),
            timeout,
        }
    }
}

impl ScenarioProvider for FallbackScenarioProvider {
    fn get_scenario(&self, tier: RankTier) -> BoxFuture<'static, Result<Scenario, ScenarioError>> {
        let primary = self.primary.get_scenario(tier);
        let fallback = self.fallback.clone();
        let limit = self.timeout;
        async move {
            let err = match tokio::time::timeout(limit, primary).await {
                Ok(Ok(scenario)) => return Ok(scenario),
                Ok(Err(err)) => err,
                Err(_) => ScenarioError::Timeout,
            };
            warn!(
                error = %err,
                tier = ?tier,
                "scenario generation failed; serving static scenario"
            );
            fallback.pick(tier.difficulty())
        }
        .boxed()
    }
}

#[cfg(feature = "ai-scenarios")]
pub use self::openai::OpenAiScenarioProvider;

#[cfg(feature = "ai-scenarios")]
mod openai {
    use std::env;

    use futures::future::{BoxFuture, FutureExt};
    use serde::Deserialize;
    use serde_json::json;

    use super::{ScenarioDraft, ScenarioError, ScenarioProvider, strip_code_fence};
    use crate::state::{
        scenario::{Difficulty, Scenario},
        tier::RankTier,
    };

    const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
    const DEFAULT_MODEL: &str = "gpt-4";

    /// Chat-completions backed scenario generator.
    #[derive(Clone)]
    pub struct OpenAiScenarioProvider {
        client: reqwest::Client,
        api_key: String,
        api_url: String,
        model: String,
    }

    #[derive(Deserialize)]
    struct CompletionResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: String,
    }

    impl OpenAiScenarioProvider {
        /// Build from `OPENAI_API_KEY`, `OPENAI_API_URL` and `OPENAI_MODEL`; `None` without a key.
        pub fn from_env() -> Option<Self> {
            let api_key = env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty())?;
            Some(Self {
                client: reqwest::Client::new(),
                api_key,
                api_url: env::var("OPENAI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
                model: env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            })
        }

        fn prompt(difficulty: Difficulty) -> String {
            let level = match difficulty {
                Difficulty::Easy => {
                    "EASY: a well-known stock or coin, a clear and direct news item, an obvious trend."
                }
                Difficulty::Medium => {
                    "MEDIUM: mixed news with positive and negative elements, recognisable chart patterns."
                }
                Difficulty::Hard => {
                    "HARD: macroeconomic or fundamental factors, contradictory chart signals, a counter-intuitive answer."
                }
            };
            format!(
                "Generate a trading decision scenario where the player must buy, sell or hold.\n\
                 Difficulty {level}\n\
                 Answer ONLY with JSON of the form {{\"news_content\": string, \"chart_data\": \
                 {{\"labels\": [12 month labels], \"prices\": [7 visible prices], \
                 \"full_prices\": [12 prices including the future], \"ticker\": string, \
                 \"asset_name\": string}}, \"correct_decision\": \"buy|sell|hold\", \
                 \"explanation\": string}}."
            )
        }

        async fn generate(self, difficulty: Difficulty) -> Result<Scenario, ScenarioError> {
            let body = json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": "You generate educational finance scenarios and always answer with valid JSON."},
                    {"role": "user", "content": Self::prompt(difficulty)},
                ],
                "temperature": 0.7,
                "max_tokens": 1500,
            });

            let response = self
                .client
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|err| ScenarioError::Unavailable(err.to_string()))?;
            if !response.status().is_success() {
                return Err(ScenarioError::Unavailable(format!(
                    "generator answered {}",
                    response.status()
                )));
            }

            let completion: CompletionResponse = response
                .json()
                .await
                .map_err(|err| ScenarioError::Malformed(err.to_string()))?;
            let content = completion
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| ScenarioError::Malformed("no choices returned".into()))?;

            let draft: ScenarioDraft = serde_json::from_str(strip_code_fence(&content))
                .map_err(|err| ScenarioError::Malformed(err.to_string()))?;
            draft.into_scenario(difficulty)
        }
    }

    impl ScenarioProvider for OpenAiScenarioProvider {
        fn get_scenario(
            &self,
            tier: RankTier,
        ) -> BoxFuture<'static, Result<Scenario, ScenarioError>> {
            self.clone().generate(tier.difficulty()).boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FailingProvider {
        calls: AtomicUsize,
    }

    impl ScenarioProvider for FailingProvider {
        fn get_scenario(
            &self,
            _tier: RankTier,
        ) -> BoxFuture<'static, Result<Scenario, ScenarioError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ScenarioError::Unavailable("boom".into())) }.boxed()
        }
    }

    struct StalledProvider;

    impl ScenarioProvider for StalledProvider {
        fn get_scenario(
            &self,
            _tier: RankTier,
        ) -> BoxFuture<'static, Result<Scenario, ScenarioError>> {
            futures::future::pending().boxed()
        }
    }

    #[tokio::test]
    async fn static_bank_matches_tier_difficulty() {
        let provider = StaticScenarioProvider::default();
        let easy = provider.get_scenario(RankTier::Bronze2).await.unwrap();
        let medium = provider.get_scenario(RankTier::Silver1).await.unwrap();
        let hard = provider.get_scenario(RankTier::Master).await.unwrap();

        assert_eq!((easy.chart.ticker.as_str(), easy.correct_decision), ("AAPL", Decision::Buy));
        assert_eq!(
            (medium.chart.ticker.as_str(), medium.correct_decision),
            ("MELI", Decision::Hold)
        );
        assert_eq!((hard.chart.ticker.as_str(), hard.correct_decision), ("YPF", Decision::Sell));
        assert_eq!(hard.difficulty, Difficulty::Hard);
        assert_eq!(easy.chart.prices.len(), 7);
        assert_eq!(easy.chart.full_prices.len(), 12);
        assert_eq!(easy.chart.labels.len(), 12);
    }

    #[tokio::test]
    async fn each_pick_gets_a_fresh_id() {
        let provider = StaticScenarioProvider::default();
        let first = provider.pick(Difficulty::Easy).unwrap();
        let second = provider.pick(Difficulty::Easy).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn failures_fall_back_to_static_bank() {
        let primary = Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        });
        let provider = FallbackScenarioProvider::new(primary.clone(), Duration::from_secs(1));

        let scenario = provider.get_scenario(RankTier::Gold1).await.unwrap();
        assert_eq!(scenario.chart.ticker, "YPF");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_times_out_into_fallback() {
        let provider =
            FallbackScenarioProvider::new(Arc::new(StalledProvider), Duration::from_secs(5));
        let scenario = provider.get_scenario(RankTier::Bronze1).await.unwrap();
        assert_eq!(scenario.chart.ticker, "AAPL");
    }

    #[test]
    fn drafts_are_validated() {
        let raw = r#"```json
            {"news_content": "Rates cut", "chart_data": {"ticker": "X", "asset_name": "X Corp",
             "labels": ["a","b","c"], "prices": [1.0, 2.0], "full_prices": [1.0, 2.0, 3.0]},
             "correct_decision": "buy", "explanation": "Cheaper money"}
        ```"#;
        let draft: ScenarioDraft = serde_json::from_str(strip_code_fence(raw)).unwrap();
        let scenario = draft.clone().into_scenario(Difficulty::Medium).unwrap();
        assert_eq!(scenario.correct_decision, Decision::Buy);

        let mut short = draft.clone();
        short.chart_data.full_prices = vec![1.0, 2.0];
        assert!(matches!(
            short.into_scenario(Difficulty::Medium),
            Err(ScenarioError::Malformed(_))
        ));

        let mut silent = draft;
        silent.news_content = "  ".into();
        assert!(silent.into_scenario(Difficulty::Medium).is_err());
    }

    #[test]
    fn code_fence_is_optional() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    }
}
