//! The remote store as the session sees it.
//!
//! Batches come back as raw JSON; `cody_core::wire` turns them into typed
//! records. Every call carries the bearer token, which callers obtain from
//! [`Credentials::bearer`](crate::Credentials::bearer) before touching the
//! network.

use async_trait::async_trait;
use cody_core::{AnnotationDraft, DocumentId, Label, NewDocument};
use serde_json::Value;

use crate::{BearerToken, SyncError};

#[async_trait]
pub trait Backend: Send + Sync {
    // ── Document catalog ──

    async fn fetch_documents(&self, auth: &BearerToken) -> Result<Value, SyncError>;
    async fn upload_document(&self, auth: &BearerToken, doc: &NewDocument)
    -> Result<(), SyncError>;
    async fn delete_document(&self, auth: &BearerToken, doc: DocumentId)
    -> Result<(), SyncError>;

    // ── Per-document reads ──

    /// Nested `{conversation: {attribute: text}}` object.
    async fn fetch_document(&self, auth: &BearerToken, doc: DocumentId)
    -> Result<Value, SyncError>;
    /// Ten-field annotation rows.
    async fn fetch_annotations(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
    ) -> Result<Value, SyncError>;
    /// Two-field label rows, optionally followed by the code rule.
    async fn fetch_labels(&self, auth: &BearerToken, doc: DocumentId) -> Result<Value, SyncError>;

    // ── Annotation writes ──

    async fn write_annotation(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        annotation: &AnnotationDraft,
    ) -> Result<(), SyncError>;
    async fn delete_annotation(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        annotation_id: &str,
    ) -> Result<(), SyncError>;
    async fn update_annotation_label(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        annotation_id: &str,
        label: &str,
    ) -> Result<(), SyncError>;

    // ── Codebook writes ──

    async fn write_labels(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        labels: &[Label],
    ) -> Result<(), SyncError>;
    /// Rewrite the whole codebook in the given order.
    async fn reorder_labels(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        labels: &[Label],
    ) -> Result<(), SyncError>;
    async fn rename_label(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        old: &str,
        new: &str,
    ) -> Result<(), SyncError>;
    async fn delete_label(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        label: &str,
    ) -> Result<(), SyncError>;

    // ── Code rules ──

    /// `[[rule], generated]`, or `null` for the default label.
    async fn fetch_code_rule(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        label: &str,
    ) -> Result<Value, SyncError>;
    async fn update_code_rule(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        label: &str,
        rule: &str,
    ) -> Result<(), SyncError>;

    // ── Recommenders ──

    async fn fetch_rule_suggestions(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        label: &str,
    ) -> Result<Value, SyncError>;
    /// Retrains the model and returns the document's full annotation batch.
    async fn fetch_model_suggestions(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
    ) -> Result<Value, SyncError>;
    async fn delete_model_suggestions(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
    ) -> Result<(), SyncError>;
    async fn accept_model_suggestion(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        annotation_id: &str,
    ) -> Result<(), SyncError>;
}
