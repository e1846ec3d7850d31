//! Redis client for vote tallies and standing answers.

use crate::error::Result;
use redis::AsyncCommands;
use tracing::debug;

/// Sorted set holding the tally for every submitted question.
const QUESTION_SET_KEY: &str = "questions/current";

/// Sorted set holding the answer tallies for one question.
/// Key format: answers/{question}
fn answer_set_key(question: &str) -> String {
    format!("answers/{question}")
}

/// Hash holding one session's standing answers, keyed by question.
/// Key format: sessions/{session}
fn session_key(session: &str) -> String {
    format!("sessions/{session}")
}

/// Client wrapper for the ranked vote store.
#[derive(Clone)]
pub struct RankedStore {
    client: redis::Client,
}

impl RankedStore {
    /// Create a new store client. Does not connect until first use.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get an async connection.
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Read every question with its tally. Unordered; callers rank.
    pub async fn question_tallies(&self) -> Result<Vec<(String, f64)>> {
        let mut conn = self.get_connection().await?;
        let tallies: Vec<(String, f64)> = conn.zrange_withscores(QUESTION_SET_KEY, 0, -1).await?;
        debug!("read {} question tallies", tallies.len());
        Ok(tallies)
    }

    /// Read every answer for a question with its tally. Unordered; callers rank.
    pub async fn answer_tallies(&self, question: &str) -> Result<Vec<(String, f64)>> {
        let mut conn = self.get_connection().await?;
        let key = answer_set_key(question);
        let tallies: Vec<(String, f64)> = conn.zrange_withscores(&key, 0, -1).await?;
        debug!("read {} answer tallies for '{}'", tallies.len(), question);
        Ok(tallies)
    }

    /// Atomically adjust a question's tally. Returns the new tally.
    pub async fn incr_question(&self, question: &str, by: f64) -> Result<f64> {
        let mut conn = self.get_connection().await?;
        let tally: f64 = conn.zincr(QUESTION_SET_KEY, question, by).await?;
        Ok(tally)
    }

    /// Atomically adjust one answer's tally within a question's answer set.
    /// Returns the new tally.
    pub async fn incr_answer(&self, question: &str, answer: &str, by: f64) -> Result<f64> {
        let mut conn = self.get_connection().await?;
        let key = answer_set_key(question);
        let tally: f64 = conn.zincr(&key, answer, by).await?;
        Ok(tally)
    }

    /// Read the session's standing answer for a question.
    /// An absent field is `None`, not an error.
    pub async fn standing_answer(&self, session: &str, question: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let key = session_key(session);
        let answer: Option<String> = conn.hget(&key, question).await?;
        Ok(answer)
    }

    /// Record the session's standing answer for a question.
    pub async fn set_standing_answer(
        &self,
        session: &str,
        question: &str,
        answer: &str,
    ) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let key = session_key(session);
        conn.hset::<_, _, _, ()>(&key, question, answer).await?;
        debug!("standing answer for '{}' in {} set to '{}'", question, key, answer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(QUESTION_SET_KEY, "questions/current");
        assert_eq!(answer_set_key("best pet?"), "answers/best pet?");
        assert_eq!(session_key("abc123"), "sessions/abc123");
    }
}
