//! Vote ledger: per-session answer dedup against the ranked store.
//!
//! A session holds at most one standing answer per question. A repeated
//! identical vote is a no-op; a changed vote moves the previous choice
//! (decrement old, record, increment new). The sequence is not wrapped in a
//! store transaction: each step is its own round trip, and concurrent votes
//! on the same (session, question) pair can interleave. Accepted tradeoff;
//! tallies converge with the standing-answer records.

use crate::error::Result;
use crate::store::TallyStore;
use std::sync::Arc;
use tracing::debug;

/// Outcome of comparing a new vote against the standing answer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum VoteTransition {
    /// Same answer already standing; nothing to do.
    NoOp,
    /// No standing answer yet; just record and increment.
    First,
    /// A different answer stands; it must be decremented first.
    Move { previous: String },
}

/// Decide the transition for a new vote. An empty standing answer is
/// treated as absent.
pub(crate) fn plan_transition(current: Option<&str>, next: &str) -> VoteTransition {
    match current.filter(|c| !c.is_empty()) {
        Some(c) if c == next => VoteTransition::NoOp,
        Some(c) => VoteTransition::Move {
            previous: c.to_string(),
        },
        None => VoteTransition::First,
    }
}

/// Computes vote transitions against the ranked store.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn TallyStore>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn TallyStore>) -> Self {
        Self { store }
    }

    /// Record a session's answer vote for a question.
    ///
    /// Returns `Some(new_tally)` when the tallies changed, `None` when the
    /// vote was a repeat of the standing answer. Any failed store step is
    /// surfaced as-is; callers must not assume partial completion.
    pub async fn record_vote(
        &self,
        session: &str,
        question: &str,
        answer: &str,
    ) -> Result<Option<f64>> {
        let current = self.store.standing_answer(session, question).await?;
        match plan_transition(current.as_deref(), answer) {
            VoteTransition::NoOp => {
                debug!("session {} repeated vote '{}' on '{}'", session, answer, question);
                Ok(None)
            }
            VoteTransition::First => {
                self.store
                    .set_standing_answer(session, question, answer)
                    .await?;
                let tally = self.store.incr_answer(question, answer, 1.0).await?;
                Ok(Some(tally))
            }
            VoteTransition::Move { previous } => {
                self.store.incr_answer(question, &previous, -1.0).await?;
                self.store
                    .set_standing_answer(session, question, answer)
                    .await?;
                let tally = self.store.incr_answer(question, answer, 1.0).await?;
                debug!(
                    "session {} moved vote on '{}' from '{}' to '{}'",
                    session, question, previous, answer
                );
                Ok(Some(tally))
            }
        }
    }

    /// Vote a question up. Every submission counts; question votes carry
    /// no per-session dedup, unlike answer votes.
    pub async fn record_question_vote(&self, question: &str) -> Result<f64> {
        let tally = self.store.incr_question(question, 1.0).await?;
        Ok(tally)
    }

    /// The session's standing answer for a question, if any.
    pub async fn standing_answer(&self, session: &str, question: &str) -> Result<Option<String>> {
        let answer = self.store.standing_answer(session, question).await?;
        Ok(answer.filter(|a| !a.is_empty()))
    }
}
