//! The per-request reconciliation state machine.
//!
//! Each invocation is stateless across calls except via persisted resource
//! state: the machine is re-entered from the fetch step on every delivered
//! key, with the resource's status acting as the durable state carrier.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::cluster::ClusterClient;
use crate::error::Error;
use crate::registry::DependentRegistry;
use crate::status::{AggregateStatus, compute_status};
use crate::types::{OwnerRef, ResourceKey, TypeIdentifier};
use crate::watches::WatchRegistry;

/// The user-declared desired-state object a controller reconciles.
///
/// Implementations wrap the raw cluster object, expose the spec-level
/// predicates the reconciler needs (defaults, validity, deletion marking)
/// and produce the dependent registry realizing the resource.
#[async_trait]
pub trait PrimaryResource: Send + Sync {
    /// The resource type reconciled by this implementation.
    fn type_id() -> TypeIdentifier
    where
        Self: Sized;

    /// Creates an empty, not-yet-fetched instance for the given key.
    fn new_empty(key: &ResourceKey) -> Self
    where
        Self: Sized;

    /// Resource name.
    fn name(&self) -> String;

    /// Resource namespace.
    fn namespace(&self) -> String;

    /// Spec generation as recorded by the cluster; 0 when unknown.
    fn generation(&self) -> i64 {
        0
    }

    /// Reduced identity handed to dependents as their owner.
    fn owner_ref(&self) -> OwnerRef;

    /// Populates this instance from the fetched cluster object.
    fn load(&mut self, object: Value) -> Result<(), Error>;

    /// Serializes this instance (including status) back to an object.
    fn as_object(&self) -> Result<Value, Error>;

    /// Printable form of the current status, used for change detection and
    /// logging; empty when no status has been recorded yet.
    fn status_as_string(&self) -> String;

    /// Records an initial status message. Returns whether status changed.
    fn set_initial_status(&mut self, message: &str) -> bool;

    /// Whether the (absent) resource was marked for deletion, in which case
    /// cleanup runs before the controller stops reconciling it.
    fn marked_for_deletion(&self) -> bool {
        false
    }

    /// Cleanup hook run when a deleted resource is reconciled one last time.
    async fn cleanup(&mut self, _cluster: &dyn ClusterClient) -> Result<(), Error> {
        Ok(())
    }

    /// Populates default values if any are missing. Returns whether the
    /// spec was mutated and therefore needs to be persisted; the persisted
    /// mutation triggers a fresh reconcile on its own.
    fn provision_defaults(&mut self) -> bool {
        false
    }

    /// Semantic validation of the spec. A failure records an error status
    /// and stops the pass; no convergence is attempted against an invalid
    /// spec.
    fn check_validity(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Produces the dependent registry for this resource, in dependency
    /// order.
    async fn dependents(&self) -> Result<DependentRegistry, Error>;

    /// Records an error on status. Returns whether status changed.
    fn set_error_status(&mut self, err: &Error) -> bool;

    /// Applies the aggregate readiness decision (message and any status
    /// field updates) to status. Returns whether status changed, so that
    /// recomputing over unchanged cluster state suppresses the persistence
    /// call.
    fn apply_aggregate(&mut self, aggregate: &AggregateStatus) -> bool;

    /// Whether the resource itself asks to be requeued, independent of the
    /// aggregate decision.
    fn needs_requeue(&self) -> bool {
        false
    }
}

/// Outcome handed back to the external reconcile-delivery mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Explicit request for re-delivery of the same key
    pub requeue: bool,
}

/// Drives one primary-resource type through the reconciliation state
/// machine. Safe to share across worker tasks; all per-pass state lives on
/// the stack.
pub struct Reconciler<R: PrimaryResource> {
    cluster: Arc<dyn ClusterClient>,
    watches: Arc<WatchRegistry>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: PrimaryResource> std::fmt::Debug for Reconciler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("resource", &R::type_id().to_string())
            .finish()
    }
}

impl<R: PrimaryResource> Reconciler<R> {
    /// Creates a reconciler backed by the given cluster client and the
    /// process-wide watch registry.
    pub fn new(cluster: Arc<dyn ClusterClient>, watches: Arc<WatchRegistry>) -> Self {
        Self {
            cluster,
            watches,
            _resource: PhantomData,
        }
    }

    /// Runs one reconcile pass for the delivered key.
    pub async fn reconcile(&self, key: &ResourceKey) -> Result<ReconcileOutcome, Error> {
        let type_name = R::type_id().kind;
        let mut resource = R::new_empty(key);

        // Fetch-or-init
        match self
            .cluster
            .fetch(&key.name, &key.namespace, &R::type_id())
            .await
        {
            Err(err) if err.is_not_found() => {
                if resource.marked_for_deletion() {
                    info!("'{}' {} is marked for deletion, running clean-up", key.name, type_name);
                    resource.cleanup(self.cluster.as_ref()).await?;
                    return Ok(ReconcileOutcome {
                        requeue: resource.needs_requeue(),
                    });
                }
                // genuinely absent, nothing to do
                return Ok(ReconcileOutcome { requeue: false });
            }
            Err(err) => {
                error!("failed to initialize '{}' {}: {}", key.name, type_name, err);
                let err = Error::from(err);
                if resource.set_error_status(&err) {
                    self.persist_status(&resource).await;
                }
                return Ok(ReconcileOutcome { requeue: false });
            }
            Ok(object) => resource.load(object)?,
        }

        let initial_status = resource.status_as_string();
        if resource.generation() == 1 && initial_status.is_empty() {
            resource.set_initial_status("Initializing");
        }

        // Default-provisioning: persist and stop; the spec mutation itself
        // triggers the next pass
        if resource.provision_defaults() {
            let object = resource.as_object()?;
            if let Err(e) = self.cluster.update(&object).await {
                error!("failed to update '{}' {}: {}", resource.name(), type_name, e);
            }
            return Ok(ReconcileOutcome { requeue: false });
        }

        // Validity check
        if let Err(err) = resource.check_validity() {
            error!("'{}' {} has an error: {}", resource.name(), type_name, err);
            if resource.set_error_status(&err) {
                self.persist_status(&resource).await;
            }
            return Ok(ReconcileOutcome { requeue: false });
        }

        info!("-> {} '{}' (status: {})", type_name, resource.name(), initial_status);

        // Dependent initialization + watch registration; a failure here is
        // recorded on status before surfacing, the redelivered key retries
        let registry = match self.init_dependents(&resource).await {
            Ok(registry) => registry,
            Err(err) => {
                error!("'{}' {} has an error: {}", resource.name(), type_name, err);
                if resource.set_error_status(&err) {
                    self.persist_status(&resource).await;
                }
                return Err(err);
            }
        };

        // Convergence, then status computation
        let mut requeue = resource.needs_requeue();
        match registry.converge(self.cluster.as_ref()).await {
            Ok(()) => {
                let aggregate = compute_status(&registry, self.cluster.as_ref()).await;
                requeue = requeue || aggregate.requeue;
                if resource.apply_aggregate(&aggregate) {
                    self.persist_status(&resource).await;
                }
            }
            Err(err) => {
                error!("'{}' {} has an error: {}", resource.name(), type_name, err);
                requeue = true;
                if resource.set_error_status(&err) {
                    self.persist_status(&resource).await;
                }
            }
        }

        // Only log exit when status changed to avoid being too verbose
        let new_status = resource.status_as_string();
        if new_status != initial_status {
            let suffix = if requeue { " (requeued)" } else { "" };
            info!("<- {} '{}'{} (status: {})", type_name, resource.name(), suffix, new_status);
        }
        Ok(ReconcileOutcome { requeue })
    }

    /// Produces the resource's dependent registry and registers a cluster
    /// watch for every watched type not already covered. A type counts as
    /// watched only once the cluster accepted the registration; on failure
    /// the claim is rolled back so a later pass can retry it.
    async fn init_dependents(&self, resource: &R) -> Result<DependentRegistry, Error> {
        let registry = resource.dependents().await?;
        for dep in registry.iter() {
            let config = dep.config();
            if config.watched && self.watches.register_if_absent(&config.type_id) {
                if let Err(err) = self.cluster.register_watch(&config.type_id).await {
                    self.watches.unregister(&config.type_id);
                    return Err(err.into());
                }
            }
        }
        Ok(registry)
    }

    /// Persists the resource's status, logging rather than failing the pass
    /// when persistence itself errors; the next pass retries.
    async fn persist_status(&self, resource: &R) {
        match resource.as_object() {
            Ok(object) => {
                if let Err(e) = self.cluster.update_status(&object).await {
                    error!("failed to update status for '{}': {}", resource.name(), e);
                }
            }
            Err(e) => error!("failed to serialize '{}' for status update: {}", resource.name(), e),
        }
    }
}
