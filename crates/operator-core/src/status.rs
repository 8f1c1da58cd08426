//! Status aggregation.
//!
//! Turns per-dependent readiness signals into one aggregate decision for
//! the primary resource. Deterministic: given the same set of dependent
//! conditions, the message and requeue decision are identical across
//! recomputations (not-ready messages concatenate in registration order).

use tracing::debug;

use crate::cluster::ClusterClient;
use crate::registry::DependentRegistry;

/// Prefix of the aggregate message while dependents are not ready.
pub const WAITING_PREFIX: &str = "Waiting for the following resources: ";

/// A named field on the primary resource's status to populate with a value
/// derived from a ready dependent (e.g. a generated credential name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    /// Status field name
    pub field: String,
    /// Value to publish
    pub value: String,
}

/// Aggregate readiness decision over a primary resource's dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateStatus {
    /// Whether every readiness-checked dependent is ready; callers must not
    /// proceed to stages gated on "fully ready" until this holds
    pub ready: bool,
    /// Printable aggregate state
    pub message: String,
    /// Whether the primary resource should be requeued
    pub requeue: bool,
    /// Status-field updates contributed by ready dependents; empty unless
    /// everything is ready
    pub fields: Vec<FieldUpdate>,
}

/// Computes the aggregate status over every dependent marked
/// `checked_for_readiness`, in registration order.
pub async fn compute_status(
    registry: &DependentRegistry,
    cluster: &dyn ClusterClient,
) -> AggregateStatus {
    let mut waiting = Vec::new();
    let mut fields = Vec::new();

    for dep in registry.iter() {
        if !dep.config().checked_for_readiness {
            continue;
        }
        let fetched = dep.fetch(cluster).await;
        let condition = dep.condition(fetched.as_ref()).await;
        if condition.is_ready() {
            if !condition.owner_status_field.is_empty() {
                fields.push(FieldUpdate {
                    field: condition.owner_status_field.clone(),
                    value: condition.dependent_name.clone(),
                });
            }
        } else {
            debug!(
                "dependent '{}' is not ready: {}",
                condition.dependent_name, condition.message
            );
            let message = if condition.message.is_empty() {
                condition.reason.clone()
            } else {
                condition.message.clone()
            };
            waiting.push(format!("{} => {}", condition.dependent_name, message));
        }
    }

    if waiting.is_empty() {
        AggregateStatus {
            ready: true,
            message: "Ready".to_owned(),
            requeue: false,
            fields,
        }
    } else {
        AggregateStatus {
            ready: false,
            message: format!("{WAITING_PREFIX}{}", waiting.join(" / ")),
            requeue: true,
            fields: Vec::new(),
        }
    }
}
