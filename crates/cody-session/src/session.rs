//! The session handle and the plumbing shared by its operations: credential
//! checks, ticket checks before commits, and failure flagging.

use std::future::Future;
use std::sync::Arc;

use cody_core::Recommender;
use cody_sync::{Backend, BearerToken, Credentials, SyncError};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{SessionConfig, SessionError, SessionFlags, Ticket, Workspace, WriteOutcome};

/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) backend: Arc<dyn Backend>,
    credentials: RwLock<Credentials>,
    pub(crate) config: SessionConfig,
    workspace: RwLock<Workspace>,
    /// Serialise fetch-and-merge per recommender.
    pub(crate) rule_flight: Mutex<()>,
    pub(crate) model_flight: Mutex<()>,
    background: Mutex<JoinSet<()>>,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, credentials: Credentials, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                credentials: RwLock::new(credentials),
                config,
                workspace: RwLock::new(Workspace::default()),
                rule_flight: Mutex::new(()),
                model_flight: Mutex::new(()),
                background: Mutex::new(JoinSet::new()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub async fn set_credentials(&self, credentials: Credentials) {
        *self.inner.credentials.write().await = credentials;
    }

    /// Read the workspace under the lock.
    pub async fn with_workspace<R>(&self, f: impl FnOnce(&Workspace) -> R) -> R {
        f(&*self.inner.workspace.read().await)
    }

    pub async fn flags(&self) -> SessionFlags {
        self.inner.workspace.read().await.flags()
    }

    /// Take the suggestion notice of the last full reload, if any.
    pub async fn take_notice(&self) -> Option<String> {
        self.inner
            .workspace
            .write()
            .await
            .annotations
            .take_notice()
            .map(|n| n.to_string())
    }

    /// The annotator has seen the connectivity warning.
    pub async fn acknowledge_connectivity(&self) {
        self.inner.workspace.write().await.degraded = false;
    }

    /// Wait for retraining requests started by the edit trigger.
    pub async fn join_background(&self) {
        let mut tasks = std::mem::take(&mut *self.inner.background.lock().await);
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(%err, "background task failed");
            }
        }
    }

    // ── Plumbing ──

    pub(crate) async fn bearer(&self) -> Result<BearerToken, SessionError> {
        Ok(self.inner.credentials.read().await.bearer()?)
    }

    /// Ticket of the selected document plus the token to use, both checked
    /// before anything goes out.
    pub(crate) async fn prepare(&self) -> Result<(Ticket, BearerToken), SessionError> {
        let ticket = self
            .inner
            .workspace
            .read()
            .await
            .ticket()
            .ok_or(SessionError::NoDocument)?;
        Ok((ticket, self.bearer().await?))
    }

    /// Apply `f` if `ticket` is still current, otherwise discard.
    pub(crate) async fn commit<R>(
        &self,
        ticket: Ticket,
        f: impl FnOnce(&mut Workspace) -> R,
    ) -> Result<R, SessionError> {
        let mut ws = self.inner.workspace.write().await;
        if !ws.is_current(ticket) {
            debug!(doc = ticket.document, epoch = ticket.epoch, "discarding stale response");
            return Err(SessionError::Stale {
                document: ticket.document,
            });
        }
        Ok(f(&mut ws))
    }

    /// Mutate state that is not tied to one document.
    pub(crate) async fn update<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        f(&mut *self.inner.workspace.write().await)
    }

    /// Await a remote read. Failures degrade connectivity.
    pub(crate) async fn fetch<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SessionError> {
        self.checked(op, call.await).await
    }

    pub(crate) async fn checked<T>(
        &self,
        op: &'static str,
        result: Result<T, SyncError>,
    ) -> Result<T, SessionError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(op, %err, "remote read failed");
                self.update(|ws| ws.degraded = true).await;
                Err(err.into())
            }
        }
    }

    /// Await a remote write and record its outcome.
    pub(crate) async fn write(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<(), SyncError>>,
    ) -> Result<(), SessionError> {
        let result = call.await;
        let mut ws = self.inner.workspace.write().await;
        match result {
            Ok(()) => {
                info!(op, "write saved");
                ws.last_write = Some(WriteOutcome::Saved);
                Ok(())
            }
            Err(err) => {
                warn!(op, %err, "remote write failed");
                ws.degraded = true;
                ws.last_write = Some(WriteOutcome::Failed);
                Err(err.into())
            }
        }
    }

    pub(crate) async fn engine_started(&self, source: Recommender) {
        self.update(|ws| ws.engine_started(source)).await;
    }

    pub(crate) async fn engine_finished(&self, source: Recommender) {
        self.update(|ws| ws.engine_finished(source)).await;
    }

    /// Start model retraining without waiting for it.
    pub(crate) async fn spawn_retrain(&self, ticket: Ticket) {
        let session = self.clone();
        info!(doc = ticket.document, "scheduling model retraining");
        let mut tasks = self.inner.background.lock().await;
        reap(&mut tasks);
        tasks.spawn(async move {
            match session.suggest_model(ticket).await {
                Ok(outcome) => debug!(added = outcome.added, "retraining merged"),
                Err(err) if err.is_stale() => {}
                Err(err) => warn!(%err, "retraining failed"),
            }
        });
    }
}

/// Drop tasks that have already finished, logging any that panicked.
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        if let Err(err) = joined {
            warn!(%err, "background task failed");
        }
    }
}
