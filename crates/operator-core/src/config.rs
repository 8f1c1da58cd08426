//! Per-dependent policy configuration.

use serde::{Deserialize, Serialize};

use crate::types::TypeIdentifier;

/// Policy flags governing how the engine treats one dependent resource.
///
/// Treated as immutable once the dependent is registered; adjust fields
/// right after [`DependentConfig::new`] if the defaults don't fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentConfig {
    /// Should changes to this type trigger reconciliation of the owner
    pub watched: bool,
    /// Should an owner reference be set, tying lifecycle to the primary
    /// resource via the cluster's garbage collector
    pub owned: bool,
    /// Should the engine create the object if absent
    pub created: bool,
    /// Should the engine update the object if present and changed
    pub updated: bool,
    /// Should this dependent's condition feed the aggregate status
    pub checked_for_readiness: bool,
    /// Name of a field on the primary resource's status to populate with
    /// this dependent's name once it is ready; empty for none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_status_field: String,
    /// Target resource type
    pub type_id: TypeIdentifier,
    /// Human-readable type name used in messages and logs
    pub type_name: String,
}

impl DependentConfig {
    /// Creates a configuration for the given target type with the default
    /// policy: watched and owned, created if absent, never updated, not
    /// checked for readiness.
    pub fn new(type_id: TypeIdentifier) -> Self {
        let type_name = type_id.kind.clone();
        Self {
            watched: true,
            owned: true,
            created: true,
            updated: false,
            checked_for_readiness: false,
            owner_status_field: String::new(),
            type_id,
            type_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = DependentConfig::new(TypeIdentifier::core("v1", "Secret"));
        assert!(config.watched);
        assert!(config.owned);
        assert!(config.created);
        assert!(!config.updated);
        assert!(!config.checked_for_readiness);
        assert_eq!(config.type_name, "Secret");
    }
}
