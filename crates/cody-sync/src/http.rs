//! HTTP backend for the Cody REST API.

use async_trait::async_trait;
use cody_core::wire;
use cody_core::{AnnotationDraft, DocumentId, Label, NewDocument};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{AuthError, Backend, BearerToken, Credentials, SyncError};

/// Client for one Cody server.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

impl HttpBackend {
    /// `base_url` should be like `http://localhost:5000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    // ── Authentication ──

    /// Exchange email and password for a token.
    pub async fn login(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        let url = self.url("login/");
        info!(url = %url, "logging in");
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        login_status(resp.status())?;
        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        Ok(Credentials::new(body.token))
    }

    /// Create an account, then log in with it.
    pub async fn register(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        let url = self.url("register/");
        info!(url = %url, "registering");
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            warn!(status = resp.status().as_u16(), "registration rejected");
            return Err(AuthError::RegistrationFailed);
        }
        self.login(email, password).await
    }

    /// Sanity check; needs no credentials.
    pub async fn ping(&self) -> Result<String, SyncError> {
        let resp = self.client.get(self.url("ping")).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json::<String>().await?)
    }

    // ── Request helpers ──

    async fn get(&self, auth: &BearerToken, path: String) -> Result<Value, SyncError> {
        let url = self.url(&path);
        info!(url = %url, "GET");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(auth.as_str())
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn write(
        &self,
        method: Method,
        auth: &BearerToken,
        path: String,
        body: Option<Value>,
    ) -> Result<(), SyncError> {
        let url = self.url(&path);
        info!(url = %url, method = %method, "write");
        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(auth.as_str());
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = check_status(req.send().await?).await?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(());
        }
        check_envelope(&serde_json::from_str(&text)?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(SyncError::Unauthorized);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SyncError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

/// Only 401 means the credentials are wrong; any other failure is the
/// server's.
fn login_status(status: StatusCode) -> Result<(), AuthError> {
    if status.is_success() {
        return Ok(());
    }
    warn!(status = status.as_u16(), "login rejected");
    if status == StatusCode::UNAUTHORIZED {
        Err(AuthError::BadCredentials)
    } else {
        Err(AuthError::Server(status.as_u16()))
    }
}

/// The server answers failed writes with HTTP 200 and one of
/// `{"status": 0, "message": ..}`, a bare `0` or `false`.
fn check_envelope(body: &Value) -> Result<(), SyncError> {
    let failed = |status: &Value| status.as_i64() == Some(0);
    match body {
        Value::Object(map) if map.get("status").is_some_and(failed) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("write failed");
            Err(SyncError::Rejected(message.to_string()))
        }
        Value::Number(_) if failed(body) => Err(SyncError::Rejected("write failed".into())),
        Value::Bool(false) => Err(SyncError::Rejected("write failed".into())),
        _ => Ok(()),
    }
}

fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_documents(&self, auth: &BearerToken) -> Result<Value, SyncError> {
        self.get(auth, "documents".into()).await
    }

    async fn upload_document(
        &self,
        auth: &BearerToken,
        doc: &NewDocument,
    ) -> Result<(), SyncError> {
        let body = wire::new_document_body(doc);
        self.write(Method::POST, auth, "documents".into(), Some(body))
            .await
    }

    async fn delete_document(&self, auth: &BearerToken, doc: DocumentId) -> Result<(), SyncError> {
        self.write(Method::DELETE, auth, format!("documents/{doc}"), None)
            .await
    }

    async fn fetch_document(&self, auth: &BearerToken, doc: DocumentId) -> Result<Value, SyncError> {
        self.get(auth, format!("sections/{doc}")).await
    }

    async fn fetch_annotations(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
    ) -> Result<Value, SyncError> {
        self.get(auth, format!("annotations/{doc}")).await
    }

    async fn fetch_labels(&self, auth: &BearerToken, doc: DocumentId) -> Result<Value, SyncError> {
        self.get(auth, format!("labels/{doc}")).await
    }

    async fn write_annotation(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        annotation: &AnnotationDraft,
    ) -> Result<(), SyncError> {
        let path = format!(
            "annotations/{doc}/{}",
            segment(&annotation.annotation_id)
        );
        self.write(Method::POST, auth, path, Some(wire::annotation_body(annotation)))
            .await
    }

    async fn delete_annotation(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        annotation_id: &str,
    ) -> Result<(), SyncError> {
        let path = format!("annotations/{doc}/{}", segment(annotation_id));
        self.write(Method::DELETE, auth, path, None).await
    }

    async fn update_annotation_label(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        annotation_id: &str,
        label: &str,
    ) -> Result<(), SyncError> {
        let path = format!("annotations/{doc}/{}", segment(annotation_id));
        self.write(Method::PUT, auth, path, Some(json!({ "label": label })))
            .await
    }

    /// The server takes one label per request.
    async fn write_labels(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        labels: &[Label],
    ) -> Result<(), SyncError> {
        for label in labels {
            self.write(
                Method::POST,
                auth,
                format!("labels/{doc}"),
                Some(wire::label_body(label)),
            )
            .await?;
        }
        Ok(())
    }

    async fn reorder_labels(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        labels: &[Label],
    ) -> Result<(), SyncError> {
        self.write(
            Method::POST,
            auth,
            format!("labels/all/{doc}"),
            Some(wire::labels_body(labels)),
        )
        .await
    }

    async fn rename_label(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        old: &str,
        new: &str,
    ) -> Result<(), SyncError> {
        let path = format!("labels/single/{doc}/{}", segment(old));
        self.write(Method::PUT, auth, path, Some(json!({ "newLabel": new })))
            .await
    }

    async fn delete_label(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        label: &str,
    ) -> Result<(), SyncError> {
        let path = format!("labels/single/{doc}/{}", segment(label));
        self.write(Method::DELETE, auth, path, None).await
    }

    async fn fetch_code_rule(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        label: &str,
    ) -> Result<Value, SyncError> {
        self.get(auth, format!("labels/{doc}/{}", segment(label)))
            .await
    }

    async fn update_code_rule(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        label: &str,
        rule: &str,
    ) -> Result<(), SyncError> {
        let path = format!("labels/{doc}/{}", segment(label));
        self.write(Method::PUT, auth, path, Some(json!({ "rule": rule })))
            .await
    }

    async fn fetch_rule_suggestions(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        label: &str,
    ) -> Result<Value, SyncError> {
        self.get(auth, format!("recs/CR/{doc}/{}", segment(label)))
            .await
    }

    async fn fetch_model_suggestions(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
    ) -> Result<Value, SyncError> {
        self.get(auth, format!("recs/ML/{doc}")).await
    }

    async fn delete_model_suggestions(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
    ) -> Result<(), SyncError> {
        self.write(Method::DELETE, auth, format!("recs/ML/{doc}"), None)
            .await
    }

    /// A GET on the server, but it mutates: the suggestion becomes manual.
    async fn accept_model_suggestion(
        &self,
        auth: &BearerToken,
        doc: DocumentId,
        annotation_id: &str,
    ) -> Result<(), SyncError> {
        self.get(auth, format!("recs/ML/{doc}/{}", segment(annotation_id)))
            .await
            .and_then(|body| check_envelope(&body))
    }
}
