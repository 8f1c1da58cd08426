//! Cluster API client abstraction.
//!
//! The engine consumes the cluster through this trait so that the actual
//! client (and the watch/informer machinery) stay external collaborators.
//! A kube-backed implementation lives in [`crate::kube_client`]; an
//! in-memory mock for unit tests lives in [`crate::mock`].

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::{OwnerRef, TypeIdentifier, attach_owner_reference};

/// Errors surfaced by a [`ClusterClient`].
///
/// `NotFound` and `AlreadyExists` are first-class kinds because the
/// convergence algorithm branches on them: not-found is the expected
/// transient state of an object still being created, and already-exists is
/// how a lost create race presents itself.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The requested object does not exist
    #[error("{type_name} '{name}' not found")]
    NotFound {
        /// Human-readable type of the missing object
        type_name: String,
        /// Name of the missing object
        name: String,
    },

    /// The object to create already exists
    #[error("{type_name} '{name}' already exists")]
    AlreadyExists {
        /// Human-readable type of the existing object
        type_name: String,
        /// Name of the existing object
        name: String,
    },

    /// Any other cluster API failure (auth, transport, server-side)
    #[error("cluster API error: {0}")]
    Api(String),
}

impl ClusterError {
    /// Whether this error is the distinguishable "not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    /// Whether this error states that the object already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }
}

/// Delivery-target seam for watch registration.
///
/// The engine only asks for "please also watch resource type Y"; wiring the
/// resulting events back into reconcile-request delivery belongs to the
/// external controller machinery implementing this trait.
pub trait WatchRegistrar: Send + Sync {
    /// Registers a watch for the given resource type.
    fn register(&self, type_id: &TypeIdentifier) -> Result<(), ClusterError>;
}

/// Operations the engine consumes from the cluster API client.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Retrieves the object of the given type, name and namespace.
    /// Absence must surface as [`ClusterError::NotFound`], never as a
    /// generic error.
    async fn fetch(
        &self,
        name: &str,
        namespace: &str,
        type_id: &TypeIdentifier,
    ) -> Result<Value, ClusterError>;

    /// Submits a new object for creation.
    async fn create(&self, object: &Value) -> Result<(), ClusterError>;

    /// Submits an updated object.
    async fn update(&self, object: &Value) -> Result<(), ClusterError>;

    /// Persists the object's status subresource.
    async fn update_status(&self, object: &Value) -> Result<(), ClusterError>;

    /// Registers a watch for the given resource type. Deduplication is the
    /// caller's job (see [`crate::watches::WatchRegistry`]).
    async fn register_watch(&self, type_id: &TypeIdentifier) -> Result<(), ClusterError>;

    /// Ties the object's lifecycle to its owner by attaching a controlling
    /// owner reference.
    fn set_owner_reference(&self, owner: &OwnerRef, object: &mut Value) -> Result<(), ClusterError> {
        attach_owner_reference(owner, object);
        Ok(())
    }
}
