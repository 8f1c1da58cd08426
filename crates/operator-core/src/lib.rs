//! Reconciliation engine for cluster-managed custom resources.
//!
//! Given a declarative primary resource, the engine drives actual cluster
//! state toward the desired state by creating, updating and monitoring a set
//! of dependent resources, and aggregates their readiness into a single
//! status on the primary resource.
//!
//! The engine is deliberately schema-agnostic: objects move through it as
//! `serde_json::Value` trees so that dependent-resource implementations can
//! live out of process (see the `capability-plugin` crate) without sharing
//! the host's type catalog. The cluster API itself is consumed through the
//! [`ClusterClient`] trait; a kube-backed implementation lives in
//! [`kube_client`] and an in-memory mock (behind the `test-util` feature)
//! in [`mock`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use operator_core::{Reconciler, ResourceKey, WatchRegistry};
//! # use operator_core::{PrimaryResource, Error};
//! # async fn example<MyResource: PrimaryResource + 'static>(
//! #     cluster: Arc<dyn operator_core::ClusterClient>,
//! # ) -> Result<(), Error> {
//! let watches = Arc::new(WatchRegistry::new());
//! let reconciler: Reconciler<MyResource> = Reconciler::new(cluster, watches);
//!
//! // Invoked by the external delivery mechanism for each (name, namespace) key.
//! let outcome = reconciler
//!     .reconcile(&ResourceKey::new("my-resource", "default"))
//!     .await?;
//! if outcome.requeue {
//!     // hand the key back to the delivery mechanism
//! }
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod condition;
pub mod config;
pub mod convergence;
pub mod dependent;
pub mod dependents;
pub mod error;
pub mod kube_client;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod reconciler;
mod reconciler_test;
pub mod registry;
mod registry_test;
pub mod status;
mod status_test;
#[cfg(test)]
mod test_support;
pub mod types;
pub mod watches;

pub use cluster::{ClusterClient, ClusterError, WatchRegistrar};
pub use condition::{ConditionKind, DependentCondition};
pub use config::DependentConfig;
pub use convergence::create_or_update;
pub use dependent::{BaseDependent, DependentResource, UpdateOutcome};
pub use error::Error;
pub use kube_client::KubeClusterClient;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockCluster;
pub use reconciler::{PrimaryResource, ReconcileOutcome, Reconciler};
pub use registry::{DependentRegistry, Predicate, TypePredicate};
pub use status::{AggregateStatus, FieldUpdate, compute_status};
pub use types::{OwnerRef, ResourceKey, TypeIdentifier};
pub use watches::WatchRegistry;
