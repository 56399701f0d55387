use thiserror::Error;

/// Failure of a remote call. Every variant counts as a transport failure for
/// the session's connectivity indicator.
#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("server rejected the write: {0}")]
    Rejected(String),

    #[error("missing or expired credentials")]
    Unauthorized,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Login and registration failures, split the way the annotator is told
/// about them.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("the server cannot be reached right now: {0}")]
    Unreachable(String),

    #[error("email or password is wrong")]
    BadCredentials,

    #[error("the server failed to answer the login (HTTP {0})")]
    Server(u16),

    #[error("account could not be created, or an account with this email already exists")]
    RegistrationFailed,

    #[error("unexpected login response: {0}")]
    Malformed(String),
}
