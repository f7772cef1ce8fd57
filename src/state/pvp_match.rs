use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::state::{
    scenario::Decision,
    scoring::ScoringRules,
    state_machine::{InvalidTransition, MatchEvent, MatchStateMachine, MatchStatus},
    tier::RankTier,
};

/// Identity supplied by the upstream auth collaborator.
pub type UserId = String;

/// Seat occupied by a player inside a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Player who started the search.
    A,
    /// Player found in the queue.
    B,
}

impl Side {
    /// The seat across the table.
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// A decision recorded for one side of a round.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub decision: Decision,
    /// Seconds since the round opened, as reported by the client.
    pub time_elapsed: f64,
    pub submitted_at: SystemTime,
}

/// What one side of a round holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DecisionSlot {
    /// Nothing submitted yet.
    #[default]
    Unset,
    /// First submission for the round; never overwritten.
    Set(Submission),
    /// The round deadline passed without a submission.
    TimedOut,
}

impl DecisionSlot {
    /// Whether the slot no longer accepts a submission.
    pub fn is_filled(&self) -> bool {
        !matches!(self, DecisionSlot::Unset)
    }

    /// Submitted decision, if any.
    pub fn decision(&self) -> Option<Decision> {
        match self {
            DecisionSlot::Set(submission) => Some(submission.decision),
            _ => None,
        }
    }

    /// Seconds taken to decide, if submitted.
    pub fn time_elapsed(&self) -> Option<f64> {
        match self {
            DecisionSlot::Set(submission) => Some(submission.time_elapsed),
            _ => None,
        }
    }
}

/// Progress of a round towards scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Neither side has submitted.
    Pending,
    /// Exactly one side has submitted.
    OneSided,
    /// Both slots are filled; the round can be scored.
    Decided,
}

/// Result of scoring one side of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundScore {
    /// Whether the decision matched the scenario's answer.
    pub correct: bool,
    /// Base plus speed bonus, or 0.
    pub points: u32,
}

/// One scenario-decision exchange within a match.
#[derive(Debug, Clone)]
pub struct Round {
    pub match_id: Uuid,
    /// 1-based.
    pub round_number: u8,
    pub scenario_id: Uuid,
    correct_decision: Decision,
    /// Decision of the player on side A.
    pub slot_a: DecisionSlot,
    /// Decision of the player on side B.
    pub slot_b: DecisionSlot,
    /// Set exactly once, when the round completes.
    pub score_a: Option<RoundScore>,
    /// Set exactly once, when the round completes.
    pub score_b: Option<RoundScore>,
    pub started_at: SystemTime,
    pub completed_at: Option<SystemTime>,
    accumulated: bool,
}

impl Round {
    fn new(match_id: Uuid, round_number: u8, scenario_id: Uuid, correct: Decision) -> Self {
        Self {
            match_id,
            round_number,
            scenario_id,
            correct_decision: correct,
            slot_a: DecisionSlot::Unset,
            slot_b: DecisionSlot::Unset,
            score_a: None,
            score_b: None,
            started_at: SystemTime::now(),
            completed_at: None,
            accumulated: false,
        }
    }

    /// Decision slot of one side.
    pub fn slot(&self, side: Side) -> &DecisionSlot {
        match side {
            Side::A => &self.slot_a,
            Side::B => &self.slot_b,
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut DecisionSlot {
        match side {
            Side::A => &mut self.slot_a,
            Side::B => &mut self.slot_b,
        }
    }

    /// Score of one side once the round is completed.
    pub fn score(&self, side: Side) -> Option<RoundScore> {
        match side {
            Side::A => self.score_a,
            Side::B => self.score_b,
        }
    }

    /// Phase derived from the two slots.
    pub fn phase(&self) -> RoundPhase {
        match (self.slot_a.is_filled(), self.slot_b.is_filled()) {
            (true, true) => RoundPhase::Decided,
            (false, false) => RoundPhase::Pending,
            _ => RoundPhase::OneSided,
        }
    }

    /// Whether the round has been scored.
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// The answer, available only once the round has been scored.
    pub fn revealed_decision(&self) -> Option<Decision> {
        self.completed_at.map(|_| self.correct_decision)
    }

    /// Score a slot against the round's answer. Pure: same slot, same result.
    fn score_slot(&self, slot: &DecisionSlot, rules: &ScoringRules) -> RoundScore {
        match slot {
            DecisionSlot::Set(submission) => {
                let correct = submission.decision == self.correct_decision;
                RoundScore {
                    correct,
                    points: rules.round_points(correct, submission.time_elapsed),
                }
            }
            DecisionSlot::Unset | DecisionSlot::TimedOut => RoundScore {
                correct: false,
                points: 0,
            },
        }
    }
}

/// Outcome of asking a round to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundCompletion {
    /// This call scored the round.
    Completed,
    /// An earlier call already scored the round.
    AlreadyCompleted,
    /// At least one slot is still open.
    Pending,
}

/// Errors raised by match and round operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// Lifecycle refused the transition.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Operation needs a match in progress.
    #[error("match is not in progress (status {0:?})")]
    NotInProgress(MatchStatus),
    /// Caller is not one of the two players.
    #[error("user `{0}` is not a player in this match")]
    NotParticipant(UserId),
    /// No round with that number was created.
    #[error("round {0} does not exist")]
    RoundNotFound(u8),
    /// Rounds are created in order, one at a time.
    #[error("round {round} is not the current round ({current})")]
    NotCurrentRound { round: u8, current: u8 },
    /// Round was created before.
    #[error("round {0} already exists")]
    RoundAlreadyExists(u8),
    /// Round is scored; no more decisions.
    #[error("round {0} is already closed")]
    RoundClosed(u8),
    /// Only the first decision per player counts.
    #[error("decision already submitted for round {0}")]
    DuplicateDecision(u8),
    /// Round is not scored yet.
    #[error("round {0} has not been decided yet")]
    RoundNotDecided(u8),
    /// Round totals were already added.
    #[error("score for round {0} was already applied")]
    ScoreAlreadyApplied(u8),
    /// The last round is already current.
    #[error("all {0} rounds have been played")]
    NoRoundsLeft(u8),
    /// Completion before the last round was settled.
    #[error("match cannot finish at round {current} of {total}")]
    RoundsRemaining { current: u8, total: u8 },
}

/// A two-player match and its rounds.
#[derive(Debug, Clone)]
pub struct PvpMatch {
    pub id: Uuid,
    /// Side A.
    pub player_a: UserId,
    /// Side B.
    pub player_b: UserId,
    /// Lower of the two players' tiers; sets scenario difficulty.
    pub tier: RankTier,
    score_a: u32,
    score_b: u32,
    winner: Option<UserId>,
    lifecycle: MatchStateMachine,
    current_round: u8,
    total_rounds: u8,
    pub created_at: SystemTime,
    started_at: Option<SystemTime>,
    completed_at: Option<SystemTime>,
    rounds: Vec<Round>,
}

impl PvpMatch {
    /// Allocate a waiting match with zeroed scores.
    pub fn new(player_a: UserId, player_b: UserId, tier: RankTier, total_rounds: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_a,
            player_b,
            tier,
            score_a: 0,
            score_b: 0,
            winner: None,
            lifecycle: MatchStateMachine::new(),
            current_round: 0,
            total_rounds,
            created_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
            rounds: Vec::new(),
        }
    }

    /// Lifecycle status.
    pub fn status(&self) -> MatchStatus {
        self.lifecycle.status()
    }

    /// Round being played; 0 before start.
    pub fn current_round(&self) -> u8 {
        self.current_round
    }

    /// Rounds in the match.
    pub fn total_rounds(&self) -> u8 {
        self.total_rounds
    }

    /// Running total of one side.
    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::A => self.score_a,
            Side::B => self.score_b,
        }
    }

    /// Winner once completed; `None` for a tie or an unfinished match.
    pub fn winner(&self) -> Option<&UserId> {
        self.winner.as_ref()
    }

    /// When the match started.
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    /// When the match completed or was cancelled.
    pub fn completed_at(&self) -> Option<SystemTime> {
        self.completed_at
    }

    /// Rounds created so far.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Round by number.
    pub fn round(&self, round_number: u8) -> Option<&Round> {
        self.rounds
            .iter()
            .find(|round| round.round_number == round_number)
    }

    fn round_mut(&mut self, round_number: u8) -> Result<&mut Round, MatchError> {
        self.rounds
            .iter_mut()
            .find(|round| round.round_number == round_number)
            .ok_or(MatchError::RoundNotFound(round_number))
    }

    /// Side played by `user_id`.
    pub fn side_of(&self, user_id: &str) -> Option<Side> {
        if self.player_a == user_id {
            Some(Side::A)
        } else if self.player_b == user_id {
            Some(Side::B)
        } else {
            None
        }
    }

    /// Player on a side.
    pub fn player(&self, side: Side) -> &UserId {
        match side {
            Side::A => &self.player_a,
            Side::B => &self.player_b,
        }
    }

    /// Opponent of `user_id`.
    pub fn opponent_of(&self, user_id: &str) -> Option<&UserId> {
        self.side_of(user_id).map(|side| self.player(side.other()))
    }

    fn ensure_in_progress(&self) -> Result<(), MatchError> {
        match self.status() {
            MatchStatus::InProgress => Ok(()),
            other => Err(MatchError::NotInProgress(other)),
        }
    }

    /// Move to `in_progress` with round 1 current. A second call is rejected.
    pub fn start(&mut self) -> Result<(), MatchError> {
        self.lifecycle.apply(MatchEvent::Start)?;
        self.current_round = 1;
        self.started_at = Some(SystemTime::now());
        Ok(())
    }

    /// Insert the current round. The answer stays on the server.
    pub fn create_round(
        &mut self,
        round_number: u8,
        scenario_id: Uuid,
        correct_decision: Decision,
    ) -> Result<&Round, MatchError> {
        self.ensure_in_progress()?;
        if round_number != self.current_round {
            return Err(MatchError::NotCurrentRound {
                round: round_number,
                current: self.current_round,
            });
        }
        if self.round(round_number).is_some() {
            return Err(MatchError::RoundAlreadyExists(round_number));
        }

        self.rounds.push(Round::new(
            self.id,
            round_number,
            scenario_id,
            correct_decision,
        ));
        self.round(round_number)
            .ok_or(MatchError::RoundNotFound(round_number))
    }

    /// Record the first decision of `user_id` for a round.
    pub fn submit_decision(
        &mut self,
        round_number: u8,
        user_id: &str,
        decision: Decision,
        time_elapsed: f64,
    ) -> Result<RoundPhase, MatchError> {
        self.ensure_in_progress()?;
        let side = self
            .side_of(user_id)
            .ok_or_else(|| MatchError::NotParticipant(user_id.to_string()))?;
        let round = self.round_mut(round_number)?;
        if round.is_completed() {
            return Err(MatchError::RoundClosed(round_number));
        }

        let slot = round.slot_mut(side);
        if slot.is_filled() {
            return Err(MatchError::DuplicateDecision(round_number));
        }
        *slot = DecisionSlot::Set(Submission {
            decision,
            time_elapsed,
            submitted_at: SystemTime::now(),
        });

        Ok(round.phase())
    }

    /// Score the round if both slots are filled. Scores exactly once.
    pub fn try_complete_round(
        &mut self,
        round_number: u8,
        rules: &ScoringRules,
    ) -> Result<RoundCompletion, MatchError> {
        let round = self.round_mut(round_number)?;
        if round.is_completed() {
            return Ok(RoundCompletion::AlreadyCompleted);
        }
        if round.phase() != RoundPhase::Decided {
            return Ok(RoundCompletion::Pending);
        }

        let score_a = round.score_slot(&round.slot_a, rules);
        let score_b = round.score_slot(&round.slot_b, rules);
        round.score_a = Some(score_a);
        round.score_b = Some(score_b);
        round.completed_at = Some(SystemTime::now());
        Ok(RoundCompletion::Completed)
    }

    /// Close every open slot as timed out, then complete the round.
    pub fn expire_round(
        &mut self,
        round_number: u8,
        rules: &ScoringRules,
    ) -> Result<RoundCompletion, MatchError> {
        let round = self.round_mut(round_number)?;
        if !round.is_completed() {
            for side in [Side::A, Side::B] {
                let slot = round.slot_mut(side);
                if !slot.is_filled() {
                    *slot = DecisionSlot::TimedOut;
                }
            }
        }
        self.try_complete_round(round_number, rules)
    }

    /// Add a completed round's points to the running totals, once.
    pub fn accumulate_score(&mut self, round_number: u8) -> Result<(), MatchError> {
        let round = self.round_mut(round_number)?;
        let (Some(score_a), Some(score_b)) = (round.score_a, round.score_b) else {
            return Err(MatchError::RoundNotDecided(round_number));
        };
        if round.accumulated {
            return Err(MatchError::ScoreAlreadyApplied(round_number));
        }
        round.accumulated = true;

        self.score_a += score_a.points;
        self.score_b += score_b.points;
        Ok(())
    }

    /// Whether the current round is scored and folded into the totals.
    fn current_round_settled(&self) -> bool {
        self.round(self.current_round)
            .is_some_and(|round| round.is_completed() && round.accumulated)
    }

    /// Make the next round current once the current one is settled.
    pub fn advance_round(&mut self) -> Result<u8, MatchError> {
        self.ensure_in_progress()?;
        if !self.current_round_settled() {
            return Err(MatchError::RoundNotDecided(self.current_round));
        }
        if self.current_round >= self.total_rounds {
            return Err(MatchError::NoRoundsLeft(self.total_rounds));
        }
        self.current_round += 1;
        Ok(self.current_round)
    }

    /// Higher total wins; equal totals are a tie.
    pub fn determine_winner(&self) -> Option<UserId> {
        match self.score_a.cmp(&self.score_b) {
            std::cmp::Ordering::Greater => Some(self.player_a.clone()),
            std::cmp::Ordering::Less => Some(self.player_b.clone()),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Finish the match after its last round has been settled.
    pub fn complete(&mut self, winner: Option<UserId>) -> Result<(), MatchError> {
        self.ensure_in_progress()?;
        if self.current_round != self.total_rounds || !self.current_round_settled() {
            return Err(MatchError::RoundsRemaining {
                current: self.current_round,
                total: self.total_rounds,
            });
        }
        if let Some(user_id) = winner.as_deref()
            && self.side_of(user_id).is_none()
        {
            return Err(MatchError::NotParticipant(user_id.to_string()));
        }

        self.lifecycle.apply(MatchEvent::Complete)?;
        self.winner = winner;
        self.completed_at = Some(SystemTime::now());
        Ok(())
    }

    /// Abandon the match. Scores and rounds stay as they were.
    pub fn cancel(&mut self) -> Result<(), MatchError> {
        self.lifecycle.apply(MatchEvent::Cancel)?;
        self.completed_at = Some(SystemTime::now());
        Ok(())
    }
}

/// Canned matches for tests elsewhere in the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A completed match where every round's answer is `buy` and both players decide at 5s.
    pub(crate) fn played_match(a: &str, b: &str, a_plays: Decision, b_plays: Decision) -> PvpMatch {
        let rules = ScoringRules::default();
        let mut pvp = PvpMatch::new(a.into(), b.into(), RankTier::Bronze1, 5);
        pvp.start().unwrap();
        for round in 1..=pvp.total_rounds() {
            if round > 1 {
                pvp.advance_round().unwrap();
            }
            pvp.create_round(round, Uuid::new_v4(), Decision::Buy).unwrap();
            pvp.submit_decision(round, a, a_plays, 5.0).unwrap();
            pvp.submit_decision(round, b, b_plays, 5.0).unwrap();
            pvp.try_complete_round(round, &rules).unwrap();
            pvp.accumulate_score(round).unwrap();
        }
        let winner = pvp.determine_winner();
        pvp.complete(winner).unwrap();
        pvp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_match() -> PvpMatch {
        let mut pvp = PvpMatch::new("alice".into(), "bob".into(), RankTier::Bronze1, 5);
        pvp.start().unwrap();
        pvp
    }

    fn play_round(pvp: &mut PvpMatch, a: (Decision, f64), b: (Decision, f64)) {
        let rules = ScoringRules::default();
        let round = pvp.current_round();
        pvp.create_round(round, Uuid::new_v4(), Decision::Buy).unwrap();
        pvp.submit_decision(round, "alice", a.0, a.1).unwrap();
        pvp.submit_decision(round, "bob", b.0, b.1).unwrap();
        assert_eq!(
            pvp.try_complete_round(round, &rules).unwrap(),
            RoundCompletion::Completed
        );
        pvp.accumulate_score(round).unwrap();
    }

    #[test]
    fn new_match_waits_with_zero_scores() {
        let pvp = PvpMatch::new("alice".into(), "bob".into(), RankTier::Gold2, 5);
        assert_eq!(pvp.status(), MatchStatus::Waiting);
        assert_eq!(pvp.score(Side::A), 0);
        assert_eq!(pvp.score(Side::B), 0);
        assert_eq!(pvp.current_round(), 0);
        assert_eq!(pvp.total_rounds(), 5);
    }

    #[test]
    fn starting_twice_keeps_progress() {
        let mut pvp = started_match();
        play_round(&mut pvp, (Decision::Buy, 3.0), (Decision::Hold, 10.0));
        pvp.advance_round().unwrap();

        assert!(matches!(
            pvp.start(),
            Err(MatchError::InvalidTransition(_))
        ));
        assert_eq!(pvp.current_round(), 2);
        assert_eq!(pvp.score(Side::A), 140);
    }

    #[test]
    fn rounds_only_exist_for_the_current_number() {
        let mut pvp = started_match();
        assert_eq!(
            pvp.create_round(2, Uuid::new_v4(), Decision::Sell).unwrap_err(),
            MatchError::NotCurrentRound {
                round: 2,
                current: 1
            }
        );
        pvp.create_round(1, Uuid::new_v4(), Decision::Sell).unwrap();
        assert_eq!(
            pvp.create_round(1, Uuid::new_v4(), Decision::Sell).unwrap_err(),
            MatchError::RoundAlreadyExists(1)
        );
    }

    #[test]
    fn first_submission_wins() {
        let mut pvp = started_match();
        pvp.create_round(1, Uuid::new_v4(), Decision::Buy).unwrap();

        assert_eq!(
            pvp.submit_decision(1, "alice", Decision::Buy, 2.0).unwrap(),
            RoundPhase::OneSided
        );
        assert_eq!(
            pvp.submit_decision(1, "alice", Decision::Sell, 4.0).unwrap_err(),
            MatchError::DuplicateDecision(1)
        );

        let slot = pvp.round(1).unwrap().slot(Side::A);
        assert_eq!(slot.decision(), Some(Decision::Buy));
        assert_eq!(slot.time_elapsed(), Some(2.0));
    }

    #[test]
    fn outsiders_cannot_submit() {
        let mut pvp = started_match();
        pvp.create_round(1, Uuid::new_v4(), Decision::Buy).unwrap();
        assert_eq!(
            pvp.submit_decision(1, "mallory", Decision::Buy, 1.0)
                .unwrap_err(),
            MatchError::NotParticipant("mallory".into())
        );
        assert_eq!(
            pvp.submit_decision(3, "alice", Decision::Buy, 1.0).unwrap_err(),
            MatchError::RoundNotFound(3)
        );
    }

    #[test]
    fn one_sided_round_stays_pending() {
        let rules = ScoringRules::default();
        let mut pvp = started_match();
        pvp.create_round(1, Uuid::new_v4(), Decision::Buy).unwrap();
        pvp.submit_decision(1, "bob", Decision::Buy, 1.0).unwrap();

        assert_eq!(
            pvp.try_complete_round(1, &rules).unwrap(),
            RoundCompletion::Pending
        );
        assert!(pvp.round(1).unwrap().revealed_decision().is_none());
    }

    #[test]
    fn completion_scores_once_and_reveals_answer() {
        let rules = ScoringRules::default();
        let mut pvp = started_match();
        pvp.create_round(1, Uuid::new_v4(), Decision::Buy).unwrap();
        pvp.submit_decision(1, "alice", Decision::Buy, 3.0).unwrap();
        pvp.submit_decision(1, "bob", Decision::Hold, 10.0).unwrap();

        assert_eq!(
            pvp.try_complete_round(1, &rules).unwrap(),
            RoundCompletion::Completed
        );
        assert_eq!(
            pvp.try_complete_round(1, &rules).unwrap(),
            RoundCompletion::AlreadyCompleted
        );

        let round = pvp.round(1).unwrap();
        assert_eq!(
            round.score(Side::A),
            Some(RoundScore {
                correct: true,
                points: 140
            })
        );
        assert_eq!(
            round.score(Side::B),
            Some(RoundScore {
                correct: false,
                points: 0
            })
        );
        assert_eq!(round.revealed_decision(), Some(Decision::Buy));
        assert_eq!(
            pvp.submit_decision(1, "bob", Decision::Buy, 1.0).unwrap_err(),
            MatchError::RoundClosed(1)
        );
    }

    #[test]
    fn scoring_ignores_submission_order() {
        let rules = ScoringRules::default();
        let mut first = started_match();
        let mut second = started_match();
        for pvp in [&mut first, &mut second] {
            pvp.create_round(1, Uuid::new_v4(), Decision::Sell).unwrap();
        }

        first.submit_decision(1, "alice", Decision::Sell, 6.0).unwrap();
        first.submit_decision(1, "bob", Decision::Sell, 9.0).unwrap();
        second.submit_decision(1, "bob", Decision::Sell, 9.0).unwrap();
        second.submit_decision(1, "alice", Decision::Sell, 6.0).unwrap();
        first.try_complete_round(1, &rules).unwrap();
        second.try_complete_round(1, &rules).unwrap();

        let (a, b) = (first.round(1).unwrap(), second.round(1).unwrap());
        assert_eq!(a.score_a, b.score_a);
        assert_eq!(a.score_b, b.score_b);
        assert_eq!(a.score_a.map(|s| s.points), Some(130));
        assert_eq!(a.score_b.map(|s| s.points), Some(120));
    }

    #[test]
    fn expiring_a_round_times_out_open_slots() {
        let rules = ScoringRules::default();
        let mut pvp = started_match();
        pvp.create_round(1, Uuid::new_v4(), Decision::Hold).unwrap();
        pvp.submit_decision(1, "alice", Decision::Hold, 5.0).unwrap();

        assert_eq!(
            pvp.expire_round(1, &rules).unwrap(),
            RoundCompletion::Completed
        );
        let round = pvp.round(1).unwrap();
        assert_eq!(round.slot_b, DecisionSlot::TimedOut);
        assert_eq!(round.score_a.map(|s| s.points), Some(133));
        assert_eq!(
            round.score_b,
            Some(RoundScore {
                correct: false,
                points: 0
            })
        );
        assert_eq!(
            pvp.expire_round(1, &rules).unwrap(),
            RoundCompletion::AlreadyCompleted
        );
    }

    #[test]
    fn scores_accumulate_exactly_once() {
        let mut pvp = started_match();
        play_round(&mut pvp, (Decision::Buy, 3.0), (Decision::Buy, 15.0));
        assert_eq!(
            pvp.accumulate_score(1).unwrap_err(),
            MatchError::ScoreAlreadyApplied(1)
        );
        assert_eq!(pvp.score(Side::A), 140);
        assert_eq!(pvp.score(Side::B), 100);
    }

    #[test]
    fn current_round_never_exceeds_total() {
        let mut pvp = started_match();
        assert_eq!(
            pvp.advance_round().unwrap_err(),
            MatchError::RoundNotDecided(1)
        );
        for expected in 2..=5 {
            play_round(&mut pvp, (Decision::Buy, 15.0), (Decision::Sell, 1.0));
            assert_eq!(pvp.advance_round().unwrap(), expected);
        }
        play_round(&mut pvp, (Decision::Buy, 15.0), (Decision::Sell, 1.0));
        assert_eq!(pvp.advance_round().unwrap_err(), MatchError::NoRoundsLeft(5));
        assert_eq!(pvp.current_round(), 5);
    }

    #[test]
    fn completion_requires_final_round_and_resolves_winner() {
        let mut pvp = started_match();
        play_round(&mut pvp, (Decision::Buy, 15.0), (Decision::Sell, 1.0));
        assert!(matches!(
            pvp.complete(None),
            Err(MatchError::RoundsRemaining { current: 1, total: 5 })
        ));

        for _ in 2..=5 {
            pvp.advance_round().unwrap();
            play_round(&mut pvp, (Decision::Buy, 15.0), (Decision::Sell, 1.0));
        }
        let winner = pvp.determine_winner();
        assert_eq!(winner.as_deref(), Some("alice"));
        pvp.complete(winner).unwrap();
        assert_eq!(pvp.status(), MatchStatus::Completed);
        assert_eq!(pvp.winner().map(String::as_str), Some("alice"));
        assert!(pvp.completed_at().is_some());
    }

    #[test]
    fn equal_totals_are_a_tie() {
        let mut pvp = started_match();
        play_round(&mut pvp, (Decision::Buy, 4.0), (Decision::Buy, 4.0));
        assert_eq!(pvp.determine_winner(), None);
    }

    #[test]
    fn cancelled_match_rejects_decisions() {
        let mut pvp = started_match();
        pvp.create_round(1, Uuid::new_v4(), Decision::Buy).unwrap();
        pvp.cancel().unwrap();
        assert_eq!(
            pvp.submit_decision(1, "alice", Decision::Buy, 1.0).unwrap_err(),
            MatchError::NotInProgress(MatchStatus::Cancelled)
        );
        assert!(pvp.cancel().is_err());
    }

    #[test]
    fn opponent_lookup_is_symmetric() {
        let pvp = started_match();
        assert_eq!(pvp.opponent_of("alice").map(String::as_str), Some("bob"));
        assert_eq!(pvp.opponent_of("bob").map(String::as_str), Some("alice"));
        assert!(pvp.opponent_of("carol").is_none());
    }
}
