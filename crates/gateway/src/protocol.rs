//! Wire protocol message types.
//!
//! Every frame in both directions is a JSON object of the shape
//! `{"method": <string>, "data": {...}}`. Outbound pushes are modeled as an
//! adjacently tagged enum so the wire shape falls out of serde; inbound
//! frames decode in two stages (raw envelope, then per-method payload) so a
//! malformed `data` map can be dropped without tearing the connection down.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

// ============================================================================
// Client → Server
// ============================================================================

/// Raw inbound frame: method name plus an uninterpreted payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Method name selecting the handler.
    pub method: String,
    /// Method-specific payload. Defaults to null when absent.
    #[serde(default)]
    pub data: Value,
}

/// Payload of an `"answer"` request: vote for an answer to a question.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerVote {
    pub question: String,
    pub answer: String,
}

/// Payload of a `"question"` request: vote a question up.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionVote {
    pub question: String,
}

/// Payload of a `"select-question"` request: change the connection's view
/// to a different question.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSelect {
    pub question: String,
}

// ============================================================================
// Server → Client
// ============================================================================

/// Message pushed from server to client, unicast or broadcast.
///
/// Pushes are full state snapshots, not incremental diffs. Broadcast
/// delivery is best-effort per client (a slow client may miss intermediate
/// pushes), so clients must treat every push as a replacement of what they
/// previously held.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "data", rename_all = "kebab-case")]
pub enum ServerPush {
    /// Ranked snapshot of all questions.
    Questions { questions: Vec<RankedQuestion> },
    /// Ranked snapshot of one question's answers.
    Answers {
        question: String,
        answers: Vec<RankedAnswer>,
    },
    /// Echo of the requesting session's own answer choice.
    AnswerSelected { answer: RankedAnswer },
    /// Periodic throughput snapshot: active clients, bytes/sec, messages/sec.
    Stats { acc: i64, bps: f64, mps: f64 },
    /// Generic failure notice. No structured codes are exposed.
    Error { error: String },
}

/// One question in a ranked snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RankedQuestion {
    pub question: String,
    pub votes: f64,
    pub selected: bool,
    pub id: u32,
}

/// One answer in a ranked snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RankedAnswer {
    pub answer: String,
    pub votes: f64,
    pub selected: bool,
    pub id: u32,
}

/// Stable numeric identifier for a label: the first 4 bytes of its SHA-256
/// digest. Reproducible across processes, so no central allocator is needed.
pub fn item_id(label: &str) -> u32 {
    let digest = Sha256::digest(label.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_id_is_stable() {
        // Pinned values: ids must not drift between processes or releases.
        assert_eq!(item_id("cats"), 3_644_219_531);
        assert_eq!(item_id("dogs"), 599_577_304);
        assert_eq!(item_id("what is rust"), 1_030_467_327);
        assert_eq!(item_id("cats"), item_id("cats"));
        assert_ne!(item_id("cats"), item_id("dogs"));
    }

    #[test]
    fn test_request_decodes_with_and_without_data() {
        let req: Request =
            serde_json::from_str(r#"{"method":"answer","data":{"question":"q","answer":"a"}}"#)
                .unwrap();
        assert_eq!(req.method, "answer");
        let vote: AnswerVote = serde_json::from_value(req.data).unwrap();
        assert_eq!(vote.question, "q");
        assert_eq!(vote.answer, "a");

        let bare: Request = serde_json::from_str(r#"{"method":"select-question"}"#).unwrap();
        assert_eq!(bare.method, "select-question");
        assert!(bare.data.is_null());
    }

    #[test]
    fn test_push_wire_shape() {
        let push = ServerPush::Questions {
            questions: vec![RankedQuestion {
                question: "cats".into(),
                votes: 3.0,
                selected: true,
                id: item_id("cats"),
            }],
        };
        assert_eq!(
            serde_json::to_value(&push).unwrap(),
            json!({
                "method": "questions",
                "data": {
                    "questions": [
                        {"question": "cats", "votes": 3.0, "selected": true, "id": 3_644_219_531u32}
                    ]
                }
            })
        );

        let push = ServerPush::Stats { acc: 2, bps: 10.5, mps: 1.25 };
        assert_eq!(
            serde_json::to_value(&push).unwrap(),
            json!({"method": "stats", "data": {"acc": 2, "bps": 10.5, "mps": 1.25}})
        );
    }

    #[test]
    fn test_push_method_names_are_kebab_case() {
        let push = ServerPush::AnswerSelected {
            answer: RankedAnswer {
                answer: "yes".into(),
                votes: 0.0,
                selected: true,
                id: item_id("yes"),
            },
        };
        let v = serde_json::to_value(&push).unwrap();
        assert_eq!(v["method"], "answer-selected");
        assert_eq!(v["data"]["answer"]["selected"], true);

        let v = serde_json::to_value(ServerPush::Error { error: "something went wrong".into() })
            .unwrap();
        assert_eq!(v["method"], "error");
        assert_eq!(v["data"]["error"], "something went wrong");
    }
}
