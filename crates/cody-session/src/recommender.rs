//! Requests to the two recommendation engines.
//!
//! Fetch and merge for one engine run under that engine's flight lock, so two
//! batches of the same engine never interleave. The engines own disjoint
//! confidence bands and do not wait on each other.

use cody_core::Recommender;
use cody_store::MergeOutcome;
use cody_sync::SyncError;
use serde_json::Value;
use tracing::info;

use crate::{Session, SessionError, Ticket};

impl Session {
    /// Evaluate `label`'s code rule and merge the rule engine's suggestions.
    pub async fn request_rule_suggestions(
        &self,
        label: &str,
    ) -> Result<MergeOutcome, SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.engine_started(Recommender::RuleEngine).await;
        let _flight = self.inner.rule_flight.lock().await;
        let raw = self
            .inner
            .backend
            .fetch_rule_suggestions(&auth, ticket.document, label)
            .await;
        self.ingest(Recommender::RuleEngine, ticket, raw).await
    }

    /// Retrain the model on the selected document and merge its suggestions.
    pub async fn request_model_suggestions(&self) -> Result<MergeOutcome, SessionError> {
        let (ticket, _) = self.prepare().await?;
        self.suggest_model(ticket).await
    }

    pub(crate) async fn suggest_model(&self, ticket: Ticket) -> Result<MergeOutcome, SessionError> {
        let auth = self.bearer().await?;
        self.engine_started(Recommender::ModelEngine).await;
        let _flight = self.inner.model_flight.lock().await;
        let raw = self
            .inner
            .backend
            .fetch_model_suggestions(&auth, ticket.document)
            .await;
        self.ingest(Recommender::ModelEngine, ticket, raw).await
    }

    /// Drop every model suggestion, here and on the server.
    pub async fn delete_model_suggestions(&self) -> Result<usize, SessionError> {
        let (ticket, auth) = self.prepare().await?;
        let _flight = self.inner.model_flight.lock().await;
        self.write(
            "delete_model_suggestions",
            self.inner
                .backend
                .delete_model_suggestions(&auth, ticket.document),
        )
        .await?;
        self.commit(ticket, |ws| {
            ws.annotations
                .remove_all_suggestions(Recommender::ModelEngine)
        })
        .await
    }

    /// Accept one model suggestion as it stands; it becomes manual work.
    pub async fn accept_model_suggestion(&self, annotation_id: &str) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.ensure_annotation(annotation_id).await?;
        self.write(
            "accept_model_suggestion",
            self.inner
                .backend
                .accept_model_suggestion(&auth, ticket.document, annotation_id),
        )
        .await?;
        self.commit(ticket, |ws| ws.annotations.demote_to_manual(annotation_id))
            .await??;
        Ok(())
    }

    /// Count the request as done and merge the batch if still wanted.
    async fn ingest(
        &self,
        source: Recommender,
        ticket: Ticket,
        raw: Result<Value, SyncError>,
    ) -> Result<MergeOutcome, SessionError> {
        self.engine_finished(source).await;
        let op = match source {
            Recommender::RuleEngine => "fetch_rule_suggestions",
            Recommender::ModelEngine => "fetch_model_suggestions",
        };
        let raw = self.checked(op, raw).await?;
        let outcome = self
            .commit(ticket, |ws| ws.annotations.merge_suggestions(source, &raw))
            .await??;
        info!(
            doc = ticket.document,
            source = source.as_str(),
            added = outcome.added,
            "suggestions ingested"
        );
        Ok(outcome)
    }
}
