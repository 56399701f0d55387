//! In-memory backend for session tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use cody_core::{AnnotationDraft, DocumentId, Label, NewDocument};
use cody_sync::{Backend, BearerToken, Credentials, SyncError};
use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::{Session, SessionConfig};

/// Canned answers for one document.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub content: Value,
    pub annotations: Value,
    pub labels: Value,
    pub code_rule: Value,
    pub rule_suggestions: Value,
    pub model_suggestions: Value,
}

impl Fixture {
    pub fn new(annotations: Value, labels: Value) -> Self {
        Self {
            content: json!({ "c1": { "a1": "The price was fair and the coffee good." } }),
            annotations,
            labels,
            code_rule: Value::Null,
            rule_suggestions: json!([]),
            model_suggestions: json!([]),
        }
    }
}

/// Records every call as `route:document` and answers from fixtures.
#[derive(Default)]
pub struct MockBackend {
    fixtures: Mutex<HashMap<DocumentId, Fixture>>,
    documents: Mutex<Value>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    gates: Mutex<HashMap<(&'static str, DocumentId), Arc<Notify>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        *backend.documents.lock().unwrap() = json!([]);
        backend
    }

    pub fn with_document(self, doc: DocumentId, fixture: Fixture) -> Self {
        self.documents
            .lock()
            .unwrap()
            .as_array_mut()
            .unwrap()
            .push(json!([doc, format!("doc {doc}"), 1, null, 0, "sentence"]));
        self.fixtures.lock().unwrap().insert(doc, fixture);
        self
    }

    pub fn set_fixture(&self, doc: DocumentId, f: impl FnOnce(&mut Fixture)) {
        f(self.fixtures.lock().unwrap().get_mut(&doc).unwrap());
    }

    /// Make every call to `route` fail.
    pub fn fail(&self, route: &'static str) {
        self.failing.lock().unwrap().insert(route);
    }

    /// Hold calls to `route` for `doc` until the returned gate is notified.
    pub fn gate(&self, route: &'static str, doc: DocumentId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert((route, doc), gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, route: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(':').next() == Some(route))
            .count()
    }

    /// Wait until a call to `route` has been recorded.
    pub async fn entered(&self, route: &str) {
        while self.count(route) == 0 {
            tokio::task::yield_now().await;
        }
    }

    async fn answer(
        &self,
        route: &'static str,
        doc: DocumentId,
        pick: impl FnOnce(&Fixture) -> Value,
    ) -> Result<Value, SyncError> {
        self.enter(route, doc).await?;
        let fixtures = self.fixtures.lock().unwrap();
        Ok(fixtures.get(&doc).map(pick).unwrap_or(Value::Null))
    }

    async fn enter(&self, route: &'static str, doc: DocumentId) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push(format!("{route}:{doc}"));
        let gate = self.gates.lock().unwrap().get(&(route, doc)).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.lock().unwrap().contains(route) {
            return Err(SyncError::Server {
                status: 500,
                body: format!("{route} failed"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn fetch_documents(&self, _auth: &BearerToken) -> Result<Value, SyncError> {
        self.enter("fetch_documents", 0).await?;
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn upload_document(&self, _auth: &BearerToken, _doc: &NewDocument) -> Result<(), SyncError> {
        self.enter("upload_document", 0).await
    }

    async fn delete_document(&self, _auth: &BearerToken, doc: DocumentId) -> Result<(), SyncError> {
        self.enter("delete_document", doc).await
    }

    async fn fetch_document(&self, _auth: &BearerToken, doc: DocumentId) -> Result<Value, SyncError> {
        self.answer("fetch_document", doc, |f| f.content.clone()).await
    }

    async fn fetch_annotations(&self, _auth: &BearerToken, doc: DocumentId) -> Result<Value, SyncError> {
        self.answer("fetch_annotations", doc, |f| f.annotations.clone())
            .await
    }

    async fn fetch_labels(&self, _auth: &BearerToken, doc: DocumentId) -> Result<Value, SyncError> {
        self.answer("fetch_labels", doc, |f| f.labels.clone()).await
    }

    async fn write_annotation(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _annotation: &AnnotationDraft,
    ) -> Result<(), SyncError> {
        self.enter("write_annotation", doc).await
    }

    async fn delete_annotation(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _annotation_id: &str,
    ) -> Result<(), SyncError> {
        self.enter("delete_annotation", doc).await
    }

    async fn update_annotation_label(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _annotation_id: &str,
        _label: &str,
    ) -> Result<(), SyncError> {
        self.enter("update_annotation_label", doc).await
    }

    async fn write_labels(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _labels: &[Label],
    ) -> Result<(), SyncError> {
        self.enter("write_labels", doc).await
    }

    async fn reorder_labels(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _labels: &[Label],
    ) -> Result<(), SyncError> {
        self.enter("reorder_labels", doc).await
    }

    async fn rename_label(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _old: &str,
        _new: &str,
    ) -> Result<(), SyncError> {
        self.enter("rename_label", doc).await
    }

    async fn delete_label(&self, _auth: &BearerToken, doc: DocumentId, _label: &str) -> Result<(), SyncError> {
        self.enter("delete_label", doc).await
    }

    async fn fetch_code_rule(&self, _auth: &BearerToken, doc: DocumentId, _label: &str) -> Result<Value, SyncError> {
        self.answer("fetch_code_rule", doc, |f| f.code_rule.clone())
            .await
    }

    async fn update_code_rule(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _label: &str,
        _rule: &str,
    ) -> Result<(), SyncError> {
        self.enter("update_code_rule", doc).await
    }

    async fn fetch_rule_suggestions(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _label: &str,
    ) -> Result<Value, SyncError> {
        self.answer("fetch_rule_suggestions", doc, |f| f.rule_suggestions.clone())
            .await
    }

    async fn fetch_model_suggestions(&self, _auth: &BearerToken, doc: DocumentId) -> Result<Value, SyncError> {
        self.answer("fetch_model_suggestions", doc, |f| f.model_suggestions.clone())
            .await
    }

    async fn delete_model_suggestions(&self, _auth: &BearerToken, doc: DocumentId) -> Result<(), SyncError> {
        self.enter("delete_model_suggestions", doc).await
    }

    async fn accept_model_suggestion(
        &self,
        _auth: &BearerToken,
        doc: DocumentId,
        _annotation_id: &str,
    ) -> Result<(), SyncError> {
        self.enter("accept_model_suggestion", doc).await
    }
}

/// A JWT valid for the next hour.
pub fn valid_credentials() -> Credentials {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"coder@example.org","exp":{exp}}}"#));
    Credentials::new(format!("{header}.{payload}.sig"))
}

pub fn session(backend: &Arc<MockBackend>) -> Session {
    Session::new(backend.clone(), valid_credentials(), SessionConfig::default())
}

/// A ten-field annotation row.
pub fn row(id: &str, label: &str, confidence: Option<f64>) -> Value {
    let suggested = u8::from(confidence.is_some());
    json!(["c1", "a1", id, "1", 0, 5, label, suggested, null, confidence])
}

pub fn labels(texts: &[&str]) -> Value {
    Value::Array(texts.iter().map(|t| json!([t, "#AAAAAA"])).collect())
}
