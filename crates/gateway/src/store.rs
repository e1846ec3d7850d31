//! Seam over the ranked store.
//!
//! The ledger and projector talk to the store through this trait so the
//! vote and snapshot flows can run against injectable tallies in tests.
//! Production wires in [`RankedStore`].

use async_trait::async_trait;
use ranked_store::{RankedStore, Result};

/// Tally and standing-answer operations the gateway needs from the store.
#[async_trait]
pub trait TallyStore: Send + Sync {
    /// Read every question with its tally.
    async fn question_tallies(&self) -> Result<Vec<(String, f64)>>;

    /// Read every answer for a question with its tally.
    async fn answer_tallies(&self, question: &str) -> Result<Vec<(String, f64)>>;

    /// Atomically adjust a question's tally. Returns the new tally.
    async fn incr_question(&self, question: &str, by: f64) -> Result<f64>;

    /// Atomically adjust one answer's tally. Returns the new tally.
    async fn incr_answer(&self, question: &str, answer: &str, by: f64) -> Result<f64>;

    /// The session's standing answer for a question, if recorded.
    async fn standing_answer(&self, session: &str, question: &str) -> Result<Option<String>>;

    /// Record the session's standing answer for a question.
    async fn set_standing_answer(&self, session: &str, question: &str, answer: &str)
        -> Result<()>;
}

#[async_trait]
impl TallyStore for RankedStore {
    async fn question_tallies(&self) -> Result<Vec<(String, f64)>> {
        RankedStore::question_tallies(self).await
    }

    async fn answer_tallies(&self, question: &str) -> Result<Vec<(String, f64)>> {
        RankedStore::answer_tallies(self, question).await
    }

    async fn incr_question(&self, question: &str, by: f64) -> Result<f64> {
        RankedStore::incr_question(self, question, by).await
    }

    async fn incr_answer(&self, question: &str, answer: &str, by: f64) -> Result<f64> {
        RankedStore::incr_answer(self, question, answer, by).await
    }

    async fn standing_answer(&self, session: &str, question: &str) -> Result<Option<String>> {
        RankedStore::standing_answer(self, session, question).await
    }

    async fn set_standing_answer(
        &self,
        session: &str,
        question: &str,
        answer: &str,
    ) -> Result<()> {
        RankedStore::set_standing_answer(self, session, question, answer).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::TallyStore;
    use async_trait::async_trait;
    use ranked_store::Result;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory tally store for ledger, projector, and handler tests.
    /// Sets keep insertion order so tie ordering is observable.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        questions: Mutex<Vec<(String, f64)>>,
        answers: Mutex<HashMap<String, Vec<(String, f64)>>>,
        standing: Mutex<HashMap<(String, String), String>>,
    }

    impl MemoryStore {
        pub(crate) fn seed_questions(&self, tallies: &[(&str, f64)]) {
            *self.questions.lock().unwrap() = tallies
                .iter()
                .map(|(q, v)| (q.to_string(), *v))
                .collect();
        }

        pub(crate) fn seed_answers(&self, question: &str, tallies: &[(&str, f64)]) {
            self.answers.lock().unwrap().insert(
                question.to_string(),
                tallies.iter().map(|(a, v)| (a.to_string(), *v)).collect(),
            );
        }

        pub(crate) fn seed_standing(&self, session: &str, question: &str, answer: &str) {
            self.standing.lock().unwrap().insert(
                (session.to_string(), question.to_string()),
                answer.to_string(),
            );
        }
    }

    fn bump(set: &mut Vec<(String, f64)>, member: &str, by: f64) -> f64 {
        if let Some(entry) = set.iter_mut().find(|(m, _)| m == member) {
            entry.1 += by;
            entry.1
        } else {
            set.push((member.to_string(), by));
            by
        }
    }

    #[async_trait]
    impl TallyStore for MemoryStore {
        async fn question_tallies(&self) -> Result<Vec<(String, f64)>> {
            Ok(self.questions.lock().unwrap().clone())
        }

        async fn answer_tallies(&self, question: &str) -> Result<Vec<(String, f64)>> {
            Ok(self
                .answers
                .lock()
                .unwrap()
                .get(question)
                .cloned()
                .unwrap_or_default())
        }

        async fn incr_question(&self, question: &str, by: f64) -> Result<f64> {
            Ok(bump(&mut self.questions.lock().unwrap(), question, by))
        }

        async fn incr_answer(&self, question: &str, answer: &str, by: f64) -> Result<f64> {
            let mut answers = self.answers.lock().unwrap();
            Ok(bump(answers.entry(question.to_string()).or_default(), answer, by))
        }

        async fn standing_answer(&self, session: &str, question: &str) -> Result<Option<String>> {
            Ok(self
                .standing
                .lock()
                .unwrap()
                .get(&(session.to_string(), question.to_string()))
                .cloned())
        }

        async fn set_standing_answer(
            &self,
            session: &str,
            question: &str,
            answer: &str,
        ) -> Result<()> {
            self.seed_standing(session, question, answer);
            Ok(())
        }
    }
}
