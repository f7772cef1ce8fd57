use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerStats,
    dto::{
        common::{ChartView, ScenarioView},
        format_system_time,
        validation::{validate_decision, validate_time_elapsed},
    },
    state::{
        pvp_match::{PvpMatch, Round, Side},
        queue::QueueTicket,
        scenario::{Decision, Scenario},
        scoring::MatchOutcome,
        tier::RankTier,
    },
};

/// Sent to each player once an opponent is found.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchFoundPayload {
    pub match_id: Uuid,
    pub opponent_id: String,
    pub total_rounds: u8,
    pub tier: RankTier,
}

/// Broadcast when a round opens. Never carries the answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundStartPayload {
    pub match_id: Uuid,
    pub round_number: u8,
    pub total_rounds: u8,
    pub time_limit_seconds: u32,
    pub scenario: ScenarioView,
}

/// Outcome of a scored round from one player's point of view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundResultPayload {
    pub match_id: Uuid,
    pub round_number: u8,
    pub your_decision: Option<Decision>,
    pub opponent_decision: Option<Decision>,
    pub your_time: Option<f64>,
    pub opponent_time: Option<f64>,
    pub your_correct: bool,
    pub opponent_correct: bool,
    pub your_points: u32,
    pub opponent_points: u32,
    pub your_total_score: u32,
    pub opponent_total_score: u32,
    pub correct_decision: Decision,
    pub explanation: String,
    pub full_chart: Option<ChartView>,
    pub is_match_complete: bool,
}

impl RoundResultPayload {
    /// Build the result seen from `side`. `None` while the round is still open.
    pub fn for_side(
        pvp: &PvpMatch,
        round: &Round,
        side: Side,
        scenario: Option<&Scenario>,
    ) -> Option<Self> {
        let correct_decision = round.revealed_decision()?;
        let (mine, theirs) = (round.score(side)?, round.score(side.other())?);
        Some(Self {
            match_id: pvp.id,
            round_number: round.round_number,
            your_decision: round.slot(side).decision(),
            opponent_decision: round.slot(side.other()).decision(),
            your_time: round.slot(side).time_elapsed(),
            opponent_time: round.slot(side.other()).time_elapsed(),
            your_correct: mine.correct,
            opponent_correct: theirs.correct,
            your_points: mine.points,
            opponent_points: theirs.points,
            your_total_score: pvp.score(side),
            opponent_total_score: pvp.score(side.other()),
            correct_decision,
            explanation: scenario
                .map(|scenario| scenario.explanation.clone())
                .unwrap_or_default(),
            full_chart: scenario.map(|scenario| ChartView::full(&scenario.chart)),
            is_match_complete: round.round_number >= pvp.total_rounds(),
        })
    }
}

/// Who won, relative to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WinnerView {
    You,
    Opponent,
    Tie,
}

impl From<MatchOutcome> for WinnerView {
    fn from(outcome: MatchOutcome) -> Self {
        match outcome {
            MatchOutcome::Win => WinnerView::You,
            MatchOutcome::Loss => WinnerView::Opponent,
            MatchOutcome::Tie => WinnerView::Tie,
        }
    }
}

/// One line of the post-match summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundSummary {
    pub round_number: u8,
    pub your_decision: Option<Decision>,
    pub opponent_decision: Option<Decision>,
    pub correct_decision: Option<Decision>,
    pub your_points: u32,
    pub opponent_points: u32,
}

/// Final result of a match from one player's point of view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchResultPayload {
    pub match_id: Uuid,
    pub opponent_id: String,
    pub winner: WinnerView,
    pub your_final_score: u32,
    pub opponent_final_score: u32,
    pub points_gained: i64,
    pub new_total_points: i64,
    pub new_rank_tier: RankTier,
    pub win_streak: u32,
    pub streak_bonus: u32,
    pub rounds: Vec<RoundSummary>,
}

impl MatchResultPayload {
    pub fn for_side(
        pvp: &PvpMatch,
        side: Side,
        outcome: MatchOutcome,
        points_gained: i64,
        streak_bonus: u32,
        stats: &PlayerStats,
    ) -> Self {
        let rounds = pvp
            .rounds()
            .iter()
            .map(|round| RoundSummary {
                round_number: round.round_number,
                your_decision: round.slot(side).decision(),
                opponent_decision: round.slot(side.other()).decision(),
                correct_decision: round.revealed_decision(),
                your_points: round.score(side).map_or(0, |score| score.points),
                opponent_points: round.score(side.other()).map_or(0, |score| score.points),
            })
            .collect();

        Self {
            match_id: pvp.id,
            opponent_id: pvp.player(side.other()).clone(),
            winner: outcome.into(),
            your_final_score: pvp.score(side),
            opponent_final_score: pvp.score(side.other()),
            points_gained,
            new_total_points: stats.total_points,
            new_rank_tier: stats.rank_tier,
            win_streak: stats.win_streak,
            streak_bonus,
            rounds,
        }
    }
}

/// Sent to the remaining player when the match is abandoned.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OpponentLeftPayload {
    pub match_id: Uuid,
    pub opponent_id: String,
    pub message: String,
}

/// Receipt returned by `POST /pvp/queue/join`.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinQueueResponse {
    pub queue_id: Uuid,
    pub position: usize,
    pub expires_at: String,
    pub message: String,
}

impl From<QueueTicket> for JoinQueueResponse {
    fn from(ticket: QueueTicket) -> Self {
        Self {
            queue_id: ticket.queue_id,
            position: ticket.position,
            expires_at: format_system_time(ticket.expires_at),
            message: "searching for an opponent".into(),
        }
    }
}

/// Body of `POST /pvp/submit`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitDecisionRequest {
    pub match_id: Uuid,
    #[validate(range(min = 1))]
    pub round_number: u8,
    /// One of `buy`, `sell`, `hold`.
    #[validate(custom(function = "validate_decision"))]
    pub decision: String,
    /// Seconds since the round opened.
    #[validate(custom(function = "validate_time_elapsed"))]
    pub time_elapsed: f64,
}

/// Returned with 202 when the opponent has not decided yet.
#[derive(Debug, Serialize, ToSchema)]
pub struct WaitingResponse {
    pub status: String,
    pub match_id: Uuid,
    pub round_number: u8,
    pub message: String,
}

impl WaitingResponse {
    /// Acknowledge a decision still waiting on the opponent.
    pub fn new(match_id: Uuid, round_number: u8) -> Self {
        Self {
            status: "waiting".into(),
            match_id,
            round_number,
            message: "decision recorded; waiting for opponent".into(),
        }
    }
}

/// Query of `GET /pvp/history`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Number of matches to return (1-50, defaults to 20).
    pub limit: Option<i64>,
}

/// A finished match as listed in the history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchHistoryItem {
    pub match_id: Uuid,
    pub opponent_id: String,
    pub outcome: MatchOutcome,
    pub your_score: u32,
    pub opponent_score: u32,
    pub total_rounds: u8,
    pub tier: RankTier,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl MatchHistoryItem {
    pub fn for_side(pvp: &PvpMatch, side: Side) -> Self {
        let outcome = match pvp.winner() {
            None => MatchOutcome::Tie,
            Some(winner) if winner == pvp.player(side) => MatchOutcome::Win,
            Some(_) => MatchOutcome::Loss,
        };
        Self {
            match_id: pvp.id,
            opponent_id: pvp.player(side.other()).clone(),
            outcome,
            your_score: pvp.score(side),
            opponent_score: pvp.score(side.other()),
            total_rounds: pvp.total_rounds(),
            tier: pvp.tier,
            started_at: pvp.started_at().map(format_system_time),
            completed_at: pvp.completed_at().map(format_system_time),
        }
    }
}

/// Aggregate numbers shown next to the history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct HistoryStats {
    pub total_matches: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    /// Percentage of matches won.
    pub win_rate: f64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_points_won: i64,
    pub total_points_lost: i64,
}

/// Response of `GET /pvp/history`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub matches: Vec<MatchHistoryItem>,
    pub stats: HistoryStats,
}
