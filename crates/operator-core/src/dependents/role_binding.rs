//! RoleBinding dependent: binds a role to a service account, keeping the
//! subject list converged when other actors strip it.

use async_trait::async_trait;
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use crate::cluster::ClusterError;
use crate::condition::DependentCondition;
use crate::config::DependentConfig;
use crate::dependent::{BaseDependent, DependentResource, UpdateOutcome};
use crate::dependents::role::rbac_type;
use crate::error::Error;
use crate::types::{self, OwnerRef};

/// A RoleBinding tying a [`super::RoleDependent`]'s role to a service
/// account in the owner's namespace. Updated (but not watched): a
/// convergence pass re-adds the subject if it went missing.
#[derive(Debug)]
pub struct RoleBindingDependent {
    base: BaseDependent,
    name: String,
    role_name: String,
    service_account: String,
}

impl RoleBindingDependent {
    /// Creates a binding named `name` granting `role_name` to
    /// `service_account`.
    pub fn new(
        owner: OwnerRef,
        name: impl Into<String>,
        role_name: impl Into<String>,
        service_account: impl Into<String>,
    ) -> Self {
        let mut config = DependentConfig::new(rbac_type("RoleBinding"));
        config.watched = false;
        config.updated = true;
        Self {
            base: BaseDependent::new(owner, config),
            name: name.into(),
            role_name: role_name.into(),
            service_account: service_account.into(),
        }
    }

    fn subject(&self) -> Subject {
        Subject {
            kind: "ServiceAccount".into(),
            name: self.service_account.clone(),
            namespace: Some(self.owner().namespace.clone()),
            ..Default::default()
        }
    }

    fn subject_matches(&self, subject: &Subject) -> bool {
        subject.name == self.service_account
            && subject.namespace.as_deref() == Some(self.owner().namespace.as_str())
    }
}

#[async_trait]
impl DependentResource for RoleBindingDependent {
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
        let binding = RoleBinding {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.owner().namespace.clone()),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".into(),
                kind: "Role".into(),
                name: self.role_name.clone(),
            },
            subjects: Some(vec![self.subject()]),
        };
        let mut object = serde_json::to_value(&binding)?;
        types::tag_object(&mut object, type_id);
        Ok(object)
    }

    async fn update(&self, current: Value) -> Result<UpdateOutcome, Error> {
        let mut binding: RoleBinding = serde_json::from_value(current.clone())?;
        let subjects = binding.subjects.get_or_insert_with(Vec::new);
        if subjects.iter().any(|s| self.subject_matches(s)) {
            return Ok(UpdateOutcome::unchanged(current));
        }
        subjects.push(self.subject());
        let mut object = serde_json::to_value(&binding)?;
        types::tag_object(&mut object, &self.config().type_id);
        Ok(UpdateOutcome::changed(object))
    }

    async fn condition(&self, _outcome: Result<&Value, &ClusterError>) -> DependentCondition {
        DependentCondition::ready(&self.name, &self.config().type_id)
    }
}
