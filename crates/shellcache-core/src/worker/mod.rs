//! The cache reconciler and its host-facing pieces.

pub mod error;
pub mod host;
pub mod keys;
pub mod reconciler;

pub use error::ReconcileError;
pub use host::{LoggingHost, WorkerHost};
pub use keys::{request_key, stored_key};
pub use reconciler::{
    ActivationOutcome, ControlMessage, FetchDecision, MessageOutcome, Reconciler, Route,
};
