//! Ranking projector: ordered, client-facing snapshots of the vote tallies.
//!
//! Every snapshot is recomputed in full from the ranked store; nothing is
//! cached between reads. Sorting is a stable descending sort on the tally,
//! so tied items keep the store's iteration order within one read.

use crate::error::Result;
use crate::protocol::{item_id, RankedAnswer, RankedQuestion, ServerPush};
use crate::store::TallyStore;
use std::sync::Arc;

/// One ranked entry before it is shaped into a protocol struct.
struct RankedEntry {
    label: String,
    votes: f64,
    selected: bool,
    id: u32,
}

/// Rank raw tallies descending and mark the selection.
///
/// When `selected` is empty the view defaults to the current leader.
/// Returns the entries plus the top label for chaining into the answer view.
fn rank(entries: Vec<(String, f64)>, selected: &str) -> (Vec<RankedEntry>, String) {
    let mut items: Vec<RankedEntry> = entries
        .into_iter()
        .map(|(label, votes)| RankedEntry {
            id: item_id(&label),
            selected: !selected.is_empty() && label == selected,
            label,
            votes,
        })
        .collect();
    items.sort_by(|a, b| b.votes.total_cmp(&a.votes));
    if selected.is_empty() {
        if let Some(top) = items.first_mut() {
            top.selected = true;
        }
    }
    let top_label = items.first().map(|i| i.label.clone()).unwrap_or_default();
    (items, top_label)
}

/// Reads tallies from the ranked store and produces snapshot pushes.
#[derive(Clone)]
pub struct RankingProjector {
    store: Arc<dyn TallyStore>,
}

impl RankingProjector {
    pub fn new(store: Arc<dyn TallyStore>) -> Self {
        Self { store }
    }

    /// Ranked snapshot of all questions. Returns the push and the top
    /// question's label (empty when no questions exist).
    pub async fn project_questions(&self, selected: &str) -> Result<(ServerPush, String)> {
        let tallies = self.store.question_tallies().await?;
        let (items, top) = rank(tallies, selected);
        let questions = items
            .into_iter()
            .map(|e| RankedQuestion {
                question: e.label,
                votes: e.votes,
                selected: e.selected,
                id: e.id,
            })
            .collect();
        Ok((ServerPush::Questions { questions }, top))
    }

    /// Ranked snapshot of one question's answers.
    pub async fn project_answers(
        &self,
        question: &str,
        selected: &str,
    ) -> Result<(ServerPush, String)> {
        let tallies = self.store.answer_tallies(question).await?;
        let (items, top) = rank(tallies, selected);
        let answers = items
            .into_iter()
            .map(|e| RankedAnswer {
                answer: e.label,
                votes: e.votes,
                selected: e.selected,
                id: e.id,
            })
            .collect();
        let push = ServerPush::Answers {
            question: question.to_string(),
            answers,
        };
        Ok((push, top))
    }

    /// Highlight a session's own answer choice, independent of any ranking
    /// view. The tally is deliberately omitted (zero).
    pub fn project_selected_answer(&self, answer: &str) -> ServerPush {
        ServerPush::AnswerSelected {
            answer: RankedAnswer {
                answer: answer.to_string(),
                votes: 0.0,
                selected: true,
                id: item_id(answer),
            },
        }
    }
}
