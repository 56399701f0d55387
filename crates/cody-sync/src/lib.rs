//! Remote side of a Cody session: the backend contract, bearer credentials
//! and (behind the `http` feature) the REST client.

mod backend;
mod credentials;
mod error;

#[cfg(feature = "http")]
pub mod http;

pub use backend::Backend;
pub use credentials::{BearerToken, Credentials, TokenFile};
pub use error::{AuthError, SyncError};

#[cfg(feature = "http")]
pub use http::HttpBackend;
