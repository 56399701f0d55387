use cody_core::{DocumentId, WireError};
use cody_store::StoreError;
use cody_sync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("remote call failed: {0}")]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no document selected")]
    NoDocument,

    /// The answer arrived after the session moved to another document.
    #[error("document {document} is no longer current, response discarded")]
    Stale { document: DocumentId },
}

impl From<WireError> for SessionError {
    fn from(err: WireError) -> Self {
        Self::Store(StoreError::Wire(err))
    }
}

impl SessionError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Sync(SyncError::Unauthorized))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}
