//! Request method handlers.
//!
//! The recognized method set is closed and fixed at build time; dispatch is
//! a match on the method name, with each handler decoding its own typed
//! payload. A payload that fails to decode is dropped silently (no error
//! push); only ranked store failures degrade to a generic `error` push.

use crate::broker::Broker;
use crate::client::ActiveClient;
use crate::ledger::VoteLedger;
use crate::projector::RankingProjector;
use crate::protocol::{AnswerVote, QuestionSelect, QuestionVote, Request, ServerPush};
use metrics::counter;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Message body of every `error` push. Deliberately generic; clients get
/// "something went wrong", never a structured code.
const GENERIC_ERROR: &str = "something went wrong";

/// Decode a handler payload from a request's data map.
/// Missing or mistyped fields are a silent no-op.
fn decode<T: DeserializeOwned>(method: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            debug!("ignoring '{}' request with bad payload: {}", method, e);
            None
        }
    }
}

/// Handler set shared by all session pipelines.
pub struct Handlers {
    broker: Broker,
    ledger: VoteLedger,
    projector: RankingProjector,
}

impl Handlers {
    pub fn new(broker: Broker, ledger: VoteLedger, projector: RankingProjector) -> Self {
        Self {
            broker,
            ledger,
            projector,
        }
    }

    /// Dispatch a decoded request to its handler, fire-and-forget. The
    /// reader loop never waits on a store round trip.
    pub fn dispatch(self: &Arc<Self>, req: Request, client: Arc<ActiveClient>) {
        let handlers = self.clone();
        tokio::spawn(async move {
            handlers.handle(req, client).await;
        });
    }

    async fn handle(&self, req: Request, client: Arc<ActiveClient>) {
        match req.method.as_str() {
            "answer" => {
                if let Some(vote) = decode::<AnswerVote>(&req.method, req.data) {
                    self.handle_answer(vote, &client).await;
                }
            }
            "question" => {
                if let Some(vote) = decode::<QuestionVote>(&req.method, req.data) {
                    self.handle_question(vote, &client).await;
                }
            }
            "select-question" => {
                if let Some(select) = decode::<QuestionSelect>(&req.method, req.data) {
                    self.handle_select_question(select, &client).await;
                }
            }
            other => {
                warn!("client {} sent unknown method '{}'", client.request_id, other);
            }
        }
    }

    /// `answer`: record the session's answer vote. A tally-changing vote
    /// broadcasts one fresh answers snapshot; the voter always gets an
    /// `answer-selected` echo of their own choice.
    async fn handle_answer(&self, vote: AnswerVote, client: &Arc<ActiveClient>) {
        counter!("gateway_votes_total").increment(1);
        match self
            .ledger
            .record_vote(&client.session, &vote.question, &vote.answer)
            .await
        {
            Ok(Some(_tally)) => {
                // The broadcast is one shared payload: leader-selected view.
                // The voter's own highlight travels only in the echo below.
                match self.projector.project_answers(&vote.question, "").await {
                    Ok((push, _top)) => self.broker.broadcast(push).await,
                    Err(e) => {
                        warn!("answers projection failed: {e}");
                        self.send_error(client).await;
                    }
                }
            }
            Ok(None) => {
                // Repeated identical vote: tallies untouched, nothing to broadcast.
            }
            Err(e) => {
                warn!("vote by {} failed: {e}", client.request_id);
                self.send_error(client).await;
                return;
            }
        }
        let echo = self.projector.project_selected_answer(&vote.answer);
        self.send(client, echo).await;
    }

    /// `question`: vote a question up. No per-session dedup; every
    /// submission counts. Broadcasts the updated question ranking.
    async fn handle_question(&self, vote: QuestionVote, client: &Arc<ActiveClient>) {
        counter!("gateway_votes_total").increment(1);
        if let Err(e) = self.ledger.record_question_vote(&vote.question).await {
            warn!("question vote by {} failed: {e}", client.request_id);
            self.send_error(client).await;
            return;
        }
        match self.projector.project_questions("").await {
            Ok((push, _top)) => self.broker.broadcast(push).await,
            Err(e) => {
                warn!("questions projection failed: {e}");
                self.send_error(client).await;
            }
        }
    }

    /// `select-question`: switch the connection's view to another question
    /// and send that question's current ranking, with the session's own
    /// standing answer highlighted when one exists.
    async fn handle_select_question(&self, select: QuestionSelect, client: &Arc<ActiveClient>) {
        client.set_selected_question(&select.question);
        let standing = match self
            .ledger
            .standing_answer(&client.session, &select.question)
            .await
        {
            Ok(standing) => standing,
            Err(e) => {
                warn!("standing answer lookup for {} failed: {e}", client.request_id);
                self.send_error(client).await;
                return;
            }
        };
        let selected = standing.as_deref().unwrap_or("");
        match self.projector.project_answers(&select.question, selected).await {
            Ok((push, _top)) => self.send(client, push).await,
            Err(e) => {
                warn!("answers projection failed: {e}");
                self.send_error(client).await;
                return;
            }
        }
        if let Some(answer) = standing {
            let echo = self.projector.project_selected_answer(&answer);
            self.send(client, echo).await;
        }
    }

    /// New-connection hook: seed the client with the current state. This is
    /// the only resynchronization mechanism a reconnecting client gets.
    pub async fn handle_connect(&self, client: Arc<ActiveClient>) {
        let selected = client.selected_question().unwrap_or_default();
        let (push, top) = match self.projector.project_questions(&selected).await {
            Ok(projection) => projection,
            Err(e) => {
                warn!("initial questions projection for {} failed: {e}", client.request_id);
                self.send_error(&client).await;
                return;
            }
        };
        self.send(&client, push).await;

        // No questions yet means no standing answer can exist anywhere.
        if top.is_empty() {
            return;
        }
        let standing = match self.ledger.standing_answer(&client.session, &top).await {
            Ok(standing) => standing,
            Err(e) => {
                warn!("standing answer lookup for {} failed: {e}", client.request_id);
                self.send_error(&client).await;
                return;
            }
        };
        if let Some(answer) = standing {
            match self.projector.project_answers(&top, &answer).await {
                Ok((push, _)) => self.send(&client, push).await,
                Err(e) => {
                    warn!("initial answers projection failed: {e}");
                    self.send_error(&client).await;
                    return;
                }
            }
            let echo = self.projector.project_selected_answer(&answer);
            self.send(&client, echo).await;
        }
    }

    async fn send(&self, client: &Arc<ActiveClient>, push: ServerPush) {
        if client.send(push).await.is_err() {
            debug!("client {} gone before unicast push", client.request_id);
        }
    }

    async fn send_error(&self, client: &Arc<ActiveClient>) {
        self.send(client, ServerPush::Error { error: GENERIC_ERROR.to_string() })
            .await;
    }
}
