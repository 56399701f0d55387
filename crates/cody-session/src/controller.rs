//! Selecting a document: the switch barrier and the reloads built on the same
//! per-document fetches.

use cody_core::{DocumentId, wire};
use cody_sync::BearerToken;
use tracing::{info, warn};

use crate::{Session, SessionError, Ticket};

/// How a [`Session::switch_to`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Content, annotations and labels of the document are loaded.
    Switched,
    /// The document was already selected; nothing was fetched.
    AlreadyCurrent,
    /// Another switch started before this one settled. Whatever arrived late
    /// was discarded.
    Superseded,
}

impl Session {
    /// Select `document` and load it.
    ///
    /// Content, annotations, labels and the document catalog are fetched
    /// concurrently. Each result is committed as soon as it arrives, provided
    /// the switch is still the current one. The session stays busy until all
    /// four have settled, whatever their outcome. On failure the parts that
    /// did arrive stay committed.
    pub async fn switch_to(&self, document: DocumentId) -> Result<SwitchOutcome, SessionError> {
        let auth = self.bearer().await?;
        let ticket = self
            .update(|ws| (ws.target != Some(document)).then(|| ws.begin_switch(document)))
            .await;
        let Some(ticket) = ticket else {
            return Ok(SwitchOutcome::AlreadyCurrent);
        };
        info!(doc = document, epoch = ticket.epoch, "switching document");

        let (content, annotations, labels, documents) = tokio::join!(
            self.load_content(ticket, &auth),
            self.load_annotations(ticket, &auth),
            self.load_labels(ticket, &auth),
            self.load_documents(&auth),
        );
        self.update(|ws| ws.finish_switch(ticket)).await;

        let mut superseded = false;
        for result in [content, annotations, labels, documents.map(|_| ())] {
            match result {
                Ok(()) => {}
                Err(err) if err.is_stale() => superseded = true,
                Err(err) => return Err(err),
            }
        }
        if superseded {
            info!(doc = document, "switch superseded");
            return Ok(SwitchOutcome::Superseded);
        }

        info!(doc = document, "document loaded");
        if self.inner.config.suggest_after_switch {
            if let Err(err) = self.request_model_suggestions().await {
                warn!(doc = document, %err, "model suggestions after switch failed");
            }
        }
        Ok(SwitchOutcome::Switched)
    }

    /// Reload the selected document's annotations from the server.
    pub async fn refresh_annotations(&self) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.load_annotations(ticket, &auth).await
    }

    /// Reload the document catalog. Needs credentials but no selection.
    pub async fn refresh_documents(&self) -> Result<usize, SessionError> {
        let auth = self.bearer().await?;
        self.load_documents(&auth).await
    }

    /// Reload annotations and labels as one barrier, busy until both settle.
    pub(crate) async fn refresh_barrier(
        &self,
        ticket: Ticket,
        auth: &BearerToken,
    ) -> Result<(), SessionError> {
        self.commit(ticket, |ws| ws.refreshing = true).await?;
        let (annotations, labels) = tokio::join!(
            self.load_annotations(ticket, auth),
            self.load_labels(ticket, auth),
        );
        // a newer switch has already reset the flag
        self.commit(ticket, |ws| ws.refreshing = false).await.ok();
        annotations.and(labels)
    }

    pub(crate) async fn load_content(
        &self,
        ticket: Ticket,
        auth: &BearerToken,
    ) -> Result<(), SessionError> {
        let raw = self
            .fetch(
                "fetch_document",
                self.inner.backend.fetch_document(auth, ticket.document),
            )
            .await?;
        let content = wire::parse_document_content(&raw)?;
        let sections = content.sections.len();
        self.commit(ticket, |ws| ws.content = content).await?;
        info!(doc = ticket.document, sections, "committed document content");
        Ok(())
    }

    pub(crate) async fn load_annotations(
        &self,
        ticket: Ticket,
        auth: &BearerToken,
    ) -> Result<(), SessionError> {
        let raw = self
            .fetch(
                "fetch_annotations",
                self.inner.backend.fetch_annotations(auth, ticket.document),
            )
            .await?;
        self.commit(ticket, |ws| ws.annotations.replace_all(&raw))
            .await??;
        Ok(())
    }

    pub(crate) async fn load_labels(
        &self,
        ticket: Ticket,
        auth: &BearerToken,
    ) -> Result<(), SessionError> {
        let raw = self
            .fetch(
                "fetch_labels",
                self.inner.backend.fetch_labels(auth, ticket.document),
            )
            .await?;
        self.commit(ticket, |ws| ws.labels.replace(&raw)).await??;
        Ok(())
    }

    pub(crate) async fn load_documents(&self, auth: &BearerToken) -> Result<usize, SessionError> {
        let raw = self
            .fetch("fetch_documents", self.inner.backend.fetch_documents(auth))
            .await?;
        Ok(self.update(|ws| ws.documents.replace(&raw)).await?)
    }
}
