//! Every change the annotator makes goes through here.
//!
//! Creates and updates are applied locally first and then written. Deletes
//! are applied only once the server has confirmed them. A failed write keeps
//! the local change, flags the connection as degraded and returns the error.

use cody_core::{AnnotationDraft, CodeRule, DocumentId, Label, NewDocument, wire};
use cody_store::StoreError;
use tracing::info;

use crate::{Session, SessionError};

impl Session {
    // ── Annotations ──

    pub async fn create_annotation(&self, draft: AnnotationDraft) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.commit(ticket, |ws| ws.annotations.insert_manual(draft.clone()))
            .await??;
        self.write(
            "write_annotation",
            self.inner
                .backend
                .write_annotation(&auth, ticket.document, &draft),
        )
        .await
    }

    /// Relabel one annotation. Counts toward the retraining threshold once
    /// the server has accepted it.
    pub async fn update_annotation_label(
        &self,
        annotation_id: &str,
        label: &str,
    ) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.commit(ticket, |ws| ws.annotations.update_label(annotation_id, label))
            .await??;
        self.write(
            "update_annotation_label",
            self.inner
                .backend
                .update_annotation_label(&auth, ticket.document, annotation_id, label),
        )
        .await?;

        if self.update(|ws| ws.edits.record()).await {
            if label == self.inner.config.default_label {
                info!(label, "threshold reached on default label, no retraining");
            } else {
                self.spawn_retrain(ticket).await;
            }
        }
        Ok(())
    }

    pub async fn delete_annotation(&self, annotation_id: &str) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.ensure_annotation(annotation_id).await?;
        self.write(
            "delete_annotation",
            self.inner
                .backend
                .delete_annotation(&auth, ticket.document, annotation_id),
        )
        .await?;
        self.commit(ticket, |ws| ws.annotations.delete(annotation_id))
            .await??;
        Ok(())
    }

    // ── Codebook ──

    pub async fn add_labels(&self, labels: Vec<Label>) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.commit(ticket, |ws| ws.labels.push(&labels)).await?;
        self.write(
            "write_labels",
            self.inner
                .backend
                .write_labels(&auth, ticket.document, &labels),
        )
        .await?;
        self.load_labels(ticket, &auth).await
    }

    /// Persist a new label order chosen by the annotator.
    pub async fn reorder_labels(&self, labels: Vec<Label>) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.commit(ticket, |ws| ws.labels.reorder(&labels)).await??;
        self.write(
            "reorder_labels",
            self.inner
                .backend
                .reorder_labels(&auth, ticket.document, &labels),
        )
        .await?;
        self.load_labels(ticket, &auth).await
    }

    /// Rename a label on the codebook and on every annotation carrying it.
    pub async fn rename_label(&self, old: &str, new: &str) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        let relabelled = self
            .commit(ticket, |ws| {
                ws.labels.rename(old, new)?;
                Ok::<_, StoreError>(ws.annotations.relabel_all(old, new))
            })
            .await??;
        info!(old, new, relabelled, "renamed label locally");
        self.write(
            "rename_label",
            self.inner
                .backend
                .rename_label(&auth, ticket.document, old, new),
        )
        .await?;
        self.refresh_barrier(ticket, &auth).await
    }

    /// Delete a label together with the annotations carrying it.
    pub async fn delete_label(&self, text: &str) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        self.ensure_label(text).await?;
        self.write(
            "delete_label",
            self.inner
                .backend
                .delete_label(&auth, ticket.document, text),
        )
        .await?;
        let dropped = self
            .commit(ticket, |ws| {
                ws.labels.remove(text)?;
                Ok::<_, StoreError>(ws.annotations.remove_label(text))
            })
            .await??;
        info!(label = text, dropped, "deleted label");
        self.refresh_barrier(ticket, &auth).await
    }

    // ── Code rules ──

    /// Fetch a label's code rule. A rule the server generated on the spot is
    /// immediately evaluated by the rule engine.
    pub async fn fetch_code_rule(&self, label: &str) -> Result<Option<CodeRule>, SessionError> {
        let (ticket, auth) = self.prepare().await?;
        let raw = self
            .fetch(
                "fetch_code_rule",
                self.inner
                    .backend
                    .fetch_code_rule(&auth, ticket.document, label),
            )
            .await?;
        let rule = wire::parse_code_rule(label, &raw)?;
        self.commit(ticket, |ws| {
            if let Some(rule) = &rule {
                ws.labels.set_rule(rule);
            }
            ws.code_rule = rule.clone();
        })
        .await?;

        if rule.as_ref().is_some_and(|r| r.generated) {
            info!(label, "server generated a code rule");
            self.request_rule_suggestions(label).await?;
        }
        Ok(rule)
    }

    /// Replace a label's code rule, then re-evaluate it.
    pub async fn update_code_rule(&self, label: &str, body: &str) -> Result<(), SessionError> {
        let (ticket, auth) = self.prepare().await?;
        let rule = CodeRule {
            label: label.to_string(),
            body: body.to_string(),
            generated: false,
        };
        self.commit(ticket, |ws| ws.labels.set_rule(&rule)).await?;
        self.write(
            "update_code_rule",
            self.inner
                .backend
                .update_code_rule(&auth, ticket.document, label, body),
        )
        .await?;
        self.fetch_code_rule(label).await?;
        self.request_rule_suggestions(label).await?;
        Ok(())
    }

    // ── Documents ──

    /// Upload a document. Needs credentials but no selected document.
    pub async fn upload_document(&self, doc: NewDocument) -> Result<usize, SessionError> {
        let auth = self.bearer().await?;
        self.write(
            "upload_document",
            self.inner.backend.upload_document(&auth, &doc),
        )
        .await?;
        info!(name = %doc.name, "uploaded document");
        self.load_documents(&auth).await
    }

    /// Delete a document. Deleting the selected one closes it.
    pub async fn delete_document(&self, document: DocumentId) -> Result<usize, SessionError> {
        let auth = self.bearer().await?;
        self.write(
            "delete_document",
            self.inner.backend.delete_document(&auth, document),
        )
        .await?;
        self.update(|ws| {
            if ws.target == Some(document) {
                info!(doc = document, "closing deleted document");
                ws.close();
            }
        })
        .await;
        self.load_documents(&auth).await
    }

    // ── Checks ──

    pub(crate) async fn ensure_annotation(&self, annotation_id: &str) -> Result<(), SessionError> {
        let known = self
            .with_workspace(|ws| ws.annotations.get(annotation_id).is_some())
            .await;
        if known {
            Ok(())
        } else {
            Err(StoreError::UnknownAnnotation(annotation_id.to_string()).into())
        }
    }

    async fn ensure_label(&self, text: &str) -> Result<(), SessionError> {
        if self.with_workspace(|ws| ws.labels.contains(text)).await {
            Ok(())
        } else {
            Err(StoreError::UnknownLabel(text.to_string()).into())
        }
    }
}
