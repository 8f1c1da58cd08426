//! Role dependent: a namespaced RBAC role with a fixed rule set.

use async_trait::async_trait;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use crate::cluster::ClusterError;
use crate::condition::DependentCondition;
use crate::config::DependentConfig;
use crate::dependent::{BaseDependent, DependentResource, UpdateOutcome};
use crate::error::Error;
use crate::types::{self, OwnerRef, TypeIdentifier};

/// The RBAC group/version roles and bindings live in.
pub(crate) fn rbac_type(kind: &str) -> TypeIdentifier {
    TypeIdentifier::new("rbac.authorization.k8s.io", "v1", kind)
}

/// A Role granting a fixed set of rules, created once and left alone. Rules
/// are static for the owner's lifetime, so the role is neither watched nor
/// updated.
#[derive(Debug)]
pub struct RoleDependent {
    base: BaseDependent,
    name: String,
    rules: Vec<PolicyRule>,
}

impl RoleDependent {
    /// Creates a role dependent named `name` carrying `rules`.
    pub fn new(owner: OwnerRef, name: impl Into<String>, rules: Vec<PolicyRule>) -> Self {
        let mut config = DependentConfig::new(rbac_type("Role"));
        config.watched = false;
        Self {
            base: BaseDependent::new(owner, config),
            name: name.into(),
            rules,
        }
    }
}

#[async_trait]
impl DependentResource for RoleDependent {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn owner(&self) -> &OwnerRef {
        self.base.owner()
    }

    fn config(&self) -> &DependentConfig {
        self.base.config()
    }

    async fn build(&self, empty: bool) -> Result<Value, Error> {
        let type_id = &self.config().type_id;
        if empty {
            return Ok(types::new_object(type_id, &self.name, &self.owner().namespace));
        }
        let role = Role {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.owner().namespace.clone()),
                ..Default::default()
            },
            rules: Some(self.rules.clone()),
        };
        let mut object = serde_json::to_value(&role)?;
        types::tag_object(&mut object, type_id);
        Ok(object)
    }

    async fn update(&self, current: Value) -> Result<UpdateOutcome, Error> {
        Ok(UpdateOutcome::unchanged(current))
    }

    async fn condition(&self, _outcome: Result<&Value, &ClusterError>) -> DependentCondition {
        DependentCondition::ready(&self.name, &self.config().type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerRef {
        OwnerRef::new("parent", "default", TypeIdentifier::new("example.com", "v1", "Parent"))
    }

    fn rules() -> Vec<PolicyRule> {
        vec![PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["secrets".into()]),
            verbs: vec!["get".into(), "list".into()],
            ..Default::default()
        }]
    }

    #[tokio::test]
    async fn builds_a_tagged_role() {
        let dep = RoleDependent::new(owner(), "reader", rules());
        let object = dep.build(false).await.expect("build failed");
        assert_eq!(object["apiVersion"], "rbac.authorization.k8s.io/v1");
        assert_eq!(object["kind"], "Role");
        assert_eq!(object["metadata"]["name"], "reader");
        assert_eq!(object["rules"][0]["resources"][0], "secrets");
    }

    #[tokio::test]
    async fn never_reports_a_needed_update() {
        let dep = RoleDependent::new(owner(), "reader", rules());
        let current = dep.build(false).await.expect("build failed");
        let outcome = dep.update(current).await.expect("update failed");
        assert!(!outcome.changed);
    }

    #[test]
    fn is_not_watched() {
        let dep = RoleDependent::new(owner(), "reader", rules());
        assert!(!dep.config().watched);
        assert!(!dep.config().updated);
    }
}
