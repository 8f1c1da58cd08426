//! Ordered collection of the dependents owned by a primary resource.
//!
//! Registration order is semantically significant: dependents referencing
//! each other (e.g. a binding referencing a role) must be added in
//! dependency order because nothing else enforces that ordering.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::cluster::ClusterClient;
use crate::convergence::create_or_update;
use crate::dependent::DependentResource;
use crate::error::Error;
use crate::types::TypeIdentifier;

/// Criterion for selecting a dependent out of a registry. The `Display`
/// form is used in lookup error messages.
pub trait Predicate: fmt::Display {
    /// Whether the given dependent matches.
    fn matches(&self, dep: &dyn DependentResource) -> bool;
}

/// Matches dependents whose configured target type equals the given one.
#[derive(Debug, Clone)]
pub struct TypePredicate {
    type_id: TypeIdentifier,
}

impl TypePredicate {
    /// Creates a predicate for the given target type.
    pub fn new(type_id: TypeIdentifier) -> Self {
        Self { type_id }
    }
}

impl Predicate for TypePredicate {
    fn matches(&self, dep: &dyn DependentResource) -> bool {
        dep.config().type_id == self.type_id
    }
}

impl fmt::Display for TypePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config().type_id == {}", self.type_id)
    }
}

/// Append-only, ordered collection of dependents, rebuilt on every
/// reconcile pass and never shared across passes.
#[derive(Default)]
pub struct DependentRegistry {
    dependents: Vec<Arc<dyn DependentResource>>,
}

impl DependentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a dependent, preserving registration order.
    ///
    /// # Panics
    ///
    /// Panics if the dependent has no valid owner; that is a programming
    /// error that must fail fast rather than surface later as a confusing
    /// cluster-side failure.
    pub fn add(&mut self, dep: Arc<dyn DependentResource>) {
        assert!(
            dep.owner().is_valid(),
            "dependent resource '{}' must have an owner",
            dep.name(),
        );
        self.dependents.push(dep);
    }

    /// Number of registered dependents.
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }

    /// Iterates the dependents in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DependentResource>> {
        self.dependents.iter()
    }

    /// Returns the single dependent matching the predicate. Zero matches or
    /// more than one are both configuration errors: a primary resource
    /// declares at most one dependent per matched criterion.
    pub fn get(&self, predicate: &dyn Predicate) -> Result<&Arc<dyn DependentResource>, Error> {
        let mut matching = self.dependents.iter().filter(|d| predicate.matches(d.as_ref()));
        match (matching.next(), matching.next()) {
            (Some(dep), None) => Ok(dep),
            (None, _) => Err(Error::Configuration(format!(
                "couldn't find any dependent resource matching {predicate}"
            ))),
            (Some(_), Some(_)) => {
                let total = self
                    .dependents
                    .iter()
                    .filter(|d| predicate.matches(d.as_ref()))
                    .count();
                Err(Error::Configuration(format!(
                    "found {total} dependent resources matching {predicate}"
                )))
            }
        }
    }

    /// Fetches the current cluster state of the single dependent matching
    /// the predicate.
    pub async fn fetch_updated(
        &self,
        predicate: &dyn Predicate,
        cluster: &dyn ClusterClient,
    ) -> Result<Value, Error> {
        let dep = self.get(predicate)?;
        Ok(dep.fetch(cluster).await?)
    }

    /// Runs the convergence algorithm over every dependent in registration
    /// order. The first failure aborts the remaining convergence for this
    /// pass and is surfaced as the pass's error.
    pub async fn converge(&self, cluster: &dyn ClusterClient) -> Result<(), Error> {
        for dep in &self.dependents {
            if let Err(e) = create_or_update(dep.as_ref(), cluster).await {
                return Err(Error::Convergence {
                    name: dep.name(),
                    type_name: dep.config().type_name.clone(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DependentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.dependents.iter().map(|d| d.name()))
            .finish()
    }
}
