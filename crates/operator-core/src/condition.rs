//! Dependent readiness conditions.
//!
//! A condition is the evaluated state of one dependent at a point in time.
//! Conditions are created fresh on every reconcile pass and never persisted
//! on their own; only the aggregate primary-resource status is.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cluster::ClusterError;
use crate::config::DependentConfig;
use crate::types::TypeIdentifier;

/// Readiness classification of a dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    /// The dependent exists and is usable
    Ready,
    /// Expected transient state, e.g. the object has not been created yet
    Pending,
    /// The dependent is in error
    Failed,
}

impl ConditionKind {
    /// Stable string form, also used as the default reason code.
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::Ready => "Ready",
            ConditionKind::Pending => "Pending",
            ConditionKind::Failed => "Failed",
        }
    }
}

/// The evaluated state of one dependent resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentCondition {
    /// Readiness classification
    pub kind: ConditionKind,
    /// Name of the evaluated dependent
    pub dependent_name: String,
    /// Type of the evaluated dependent
    pub dependent_type: TypeIdentifier,
    /// Reason code
    pub reason: String,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// If ready, name of a primary-status field to populate with the
    /// dependent's name; empty for none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_status_field: String,
}

impl DependentCondition {
    fn new(kind: ConditionKind, name: &str, type_id: &TypeIdentifier, message: String) -> Self {
        Self {
            kind,
            dependent_name: name.to_owned(),
            dependent_type: type_id.clone(),
            reason: kind.as_str().to_owned(),
            message,
            owner_status_field: String::new(),
        }
    }

    /// A `Ready` condition.
    pub fn ready(name: &str, type_id: &TypeIdentifier) -> Self {
        Self::new(ConditionKind::Ready, name, type_id, String::new())
    }

    /// A `Pending` condition with the given message.
    pub fn pending(name: &str, type_id: &TypeIdentifier, message: impl Into<String>) -> Self {
        Self::new(ConditionKind::Pending, name, type_id, message.into())
    }

    /// A `Failed` condition with the given message.
    pub fn failed(name: &str, type_id: &TypeIdentifier, message: impl Into<String>) -> Self {
        Self::new(ConditionKind::Failed, name, type_id, message.into())
    }

    /// Whether this condition reports readiness.
    pub fn is_ready(&self) -> bool {
        self.kind == ConditionKind::Ready
    }
}

/// Classifies a fetch error into the most appropriate condition: not-found
/// is the expected transient state of an object being created elsewhere and
/// maps to `Pending`; anything else maps to `Failed`.
pub fn error_condition(name: &str, config: &DependentConfig, err: &ClusterError) -> DependentCondition {
    if err.is_not_found() {
        DependentCondition::pending(
            name,
            &config.type_id,
            format!("{} '{}' was not found: {}", config.type_name, name, err),
        )
    } else {
        DependentCondition::failed(name, &config.type_id, err.to_string())
    }
}

/// Default condition derivation: errors go through [`error_condition`],
/// a successfully fetched object yields `Ready` carrying the configured
/// owner status field.
pub fn default_condition(
    name: &str,
    config: &DependentConfig,
    outcome: Result<&Value, &ClusterError>,
) -> DependentCondition {
    match outcome {
        Err(err) => error_condition(name, config, err),
        Ok(_) => {
            let mut condition = DependentCondition::ready(name, &config.type_id);
            condition.owner_status_field = config.owner_status_field.clone();
            condition
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DependentConfig {
        DependentConfig::new(TypeIdentifier::core("v1", "Secret"))
    }

    #[test]
    fn not_found_classifies_as_pending() {
        let err = ClusterError::NotFound {
            type_name: "Secret".into(),
            name: "creds".into(),
        };
        let condition = error_condition("creds", &config(), &err);
        assert_eq!(condition.kind, ConditionKind::Pending);
        assert!(condition.message.contains("'creds' was not found"));
    }

    #[test]
    fn other_errors_classify_as_failed() {
        let err = ClusterError::Api("connection refused".into());
        let condition = error_condition("creds", &config(), &err);
        assert_eq!(condition.kind, ConditionKind::Failed);
        assert_eq!(condition.message, "cluster API error: connection refused");
    }

    #[test]
    fn successful_fetch_classifies_as_ready() {
        let object = serde_json::json!({});
        let mut config = config();
        config.owner_status_field = "secretName".into();
        let condition = default_condition("creds", &config, Ok(&object));
        assert!(condition.is_ready());
        assert_eq!(condition.owner_status_field, "secretName");
    }
}
