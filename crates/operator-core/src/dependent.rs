//! The dependent-resource contract.
//!
//! A dependent resource describes one subordinate object a primary resource
//! needs, plus the behavior to realize it. Variants supply domain-specific
//! build/update logic; [`BaseDependent`] carries the owner and policy shared
//! by all of them. See [`crate::dependents`] for reusable variants and the
//! `capability-plugin` crate for plugin-backed ones.

use async_trait::async_trait;
use serde_json::Value;

use crate::cluster::{ClusterClient, ClusterError};
use crate::condition::{DependentCondition, default_condition};
use crate::config::DependentConfig;
use crate::error::Error;
use crate::types::OwnerRef;

/// Result of asking a dependent whether the live object needs mutation.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// Whether a mutation is needed
    pub changed: bool,
    /// The (possibly mutated) object
    pub object: Value,
}

impl UpdateOutcome {
    /// No mutation needed; the object is returned untouched.
    pub fn unchanged(object: Value) -> Self {
        Self { changed: false, object }
    }

    /// A mutation is needed and `object` is the desired state.
    pub fn changed(object: Value) -> Self {
        Self { changed: true, object }
    }
}

/// A subordinate object managed on behalf of a primary resource.
#[async_trait]
pub trait DependentResource: std::fmt::Debug + Send + Sync {
    /// The dependent's name on the cluster; may be static or computed.
    fn name(&self) -> String;

    /// The owning primary resource's reduced identity.
    fn owner(&self) -> &OwnerRef;

    /// This dependent's policy.
    fn config(&self) -> &DependentConfig;

    /// Retrieves the current cluster state of the underlying object.
    /// Absence surfaces as [`ClusterError::NotFound`].
    async fn fetch(&self, cluster: &dyn ClusterClient) -> Result<Value, ClusterError> {
        let config = self.config();
        cluster
            .fetch(&self.name(), &self.owner().namespace, &config.type_id)
            .await
    }

    /// Constructs the desired-state object. With `empty` set, returns a
    /// zero-value object of the correct type without populating fields.
    async fn build(&self, empty: bool) -> Result<Value, Error>;

    /// Given the live object, decides whether a mutation is needed and
    /// returns the mutated object. Must be side-effect-free when reporting
    /// no change.
    async fn update(&self, current: Value) -> Result<UpdateOutcome, Error>;

    /// Derives this dependent's condition from the fetched object or the
    /// fetch error.
    async fn condition(&self, outcome: Result<&Value, &ClusterError>) -> DependentCondition {
        default_condition(&self.name(), self.config(), outcome)
    }
}

/// Owner and policy shared by dependent-resource variants.
#[derive(Debug, Clone)]
pub struct BaseDependent {
    owner: OwnerRef,
    config: DependentConfig,
}

impl BaseDependent {
    /// Creates the base for a dependent with the given owner and policy.
    ///
    /// # Panics
    ///
    /// Panics if the owner reference is invalid: a dependent without an
    /// owner is a programming error and construction must fail fast.
    pub fn new(owner: OwnerRef, config: DependentConfig) -> Self {
        assert!(
            owner.is_valid(),
            "dependent resource of type {} must have an owner",
            config.type_name,
        );
        Self { owner, config }
    }

    /// The owning primary resource's identity.
    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    /// The dependent's policy.
    pub fn config(&self) -> &DependentConfig {
        &self.config
    }

    /// Default dependent name: the owner's name.
    pub fn default_name(&self) -> String {
        self.owner.name.clone()
    }
}
