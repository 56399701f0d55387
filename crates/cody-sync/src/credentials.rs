//! Session credentials: the server-issued JWT and its persisted copy.
//!
//! Only the `exp` claim is inspected. The signature is the server's business.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::SyncError;

/// The token attached to every remote call.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    token: Option<BearerToken>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(BearerToken(token.into())),
        }
    }

    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    /// The `exp` claim, if the token is a readable JWT.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.as_ref().and_then(|t| jwt_expiry(t.as_str()))
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| now < exp)
    }

    /// The token to send, or [`SyncError::Unauthorized`] without it.
    pub fn bearer(&self) -> Result<BearerToken, SyncError> {
        match &self.token {
            Some(token) if self.is_valid() => Ok(token.clone()),
            _ => Err(SyncError::Unauthorized),
        }
    }
}

fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_f64()?;
    DateTime::from_timestamp(exp as i64, 0)
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

/// JSON file holding the token across restarts.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means nobody has logged in yet.
    pub fn load(&self) -> Result<Credentials, SyncError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            return Ok(Credentials::anonymous());
        }
        let raw = fs::read_to_string(&self.path)?;
        let stored: StoredToken = serde_json::from_str(&raw)?;
        Ok(Credentials::new(stored.token))
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), SyncError> {
        let Some(token) = credentials.token() else {
            return self.clear();
        };
        let stored = StoredToken {
            token: token.as_str().to_string(),
        };
        fs::write(&self.path, serde_json::to_string(&stored)?)?;
        info!(path = %self.path.display(), "saved token");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SyncError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
