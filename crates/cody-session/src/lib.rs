//! Document session for the Cody annotator.
//!
//! A [`Session`] owns the client-side state of the selected document and is
//! the only way to change it: switching documents, annotator edits, and
//! requests to the rule and model recommenders. Responses for a document that
//! is no longer selected are discarded.

mod config;
mod controller;
mod error;
mod gateway;
mod recommender;
mod session;
mod state;
mod trigger;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use controller::SwitchOutcome;
pub use error::SessionError;
pub use session::Session;
pub use state::{SessionFlags, Ticket, Workspace, WriteOutcome};
pub use trigger::{EditTrigger, RETRAIN_THRESHOLD};
