//! Engine error types.
//!
//! Dependent-level errors are converted to conditions at the status
//! aggregation boundary; primary-resource-level errors (fetch, validation)
//! short-circuit the reconcile pass and are persisted to status directly.

use thiserror::Error;

use crate::cluster::ClusterError;

/// Errors that can occur while reconciling a primary resource.
#[derive(Debug, Error)]
pub enum Error {
    /// Cluster API error (fetch, create, update, watch registration)
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// The primary resource's spec failed semantic validation; terminal
    /// until the spec changes
    #[error("invalid specification: {0}")]
    Validation(String),

    /// A dependent resource could not be brought into alignment with its
    /// desired state; retried via requeue, never internally
    #[error("failed to create or update '{name}' {type_name}: {message}")]
    Convergence {
        /// Name of the failing dependent
        name: String,
        /// Human-readable type of the failing dependent
        type_name: String,
        /// Underlying failure
        message: String,
    },

    /// Plugin handshake, RPC or routing failure; fatal for the pass
    #[error("plugin transport error: {0}")]
    PluginTransport(String),

    /// Programming or deployment defect (e.g. an ownerless dependent);
    /// aborts loudly rather than being recovered
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Object (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
