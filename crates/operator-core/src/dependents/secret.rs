//! Secret dependent: owner-scoped configuration material kept in sync with
//! the desired key/value set.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use crate::config::DependentConfig;
use crate::dependent::{BaseDependent, DependentResource, UpdateOutcome};
use crate::error::Error;
use crate::types::{self, OwnerRef, TypeIdentifier};

/// A Secret whose `stringData` mirrors a desired key/value set. Watched and
/// updated: drift in the desired entries is converged back, while keys added
/// by other actors are left in place.
#[derive(Debug)]
pub struct SecretDependent {
    base: BaseDependent,
    name: String,
    data: BTreeMap<String, String>,
}

impl SecretDependent {
    /// Creates a secret dependent named `name` carrying `data`.
    pub fn new(owner: OwnerRef, name: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        let mut config = DependentConfig::new(TypeIdentifier::core("v1", "Secret"));
        config.updated = true;
        Self {
            base: BaseDependent::new(owner, config),
            name: name.into(),
            data,
        }
    }

    fn desired_entries_present(&self, current: &Secret) -> bool {
        let Some(string_data) = &current.string_data else {
            return self.data.is_empty();
        };
        self.data
            .iter()
            .all(|(key, value)| string_data.get(key) == Some(value))
    }
}

#[async_trait]
impl DependentResource for SecretDependent {
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
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.owner().namespace.clone()),
                ..Default::default()
            },
            string_data: Some(self.data.clone()),
            ..Default::default()
        };
        let mut object = serde_json::to_value(&secret)?;
        types::tag_object(&mut object, type_id);
        Ok(object)
    }

    async fn update(&self, current: Value) -> Result<UpdateOutcome, Error> {
        let mut secret: Secret = serde_json::from_value(current.clone())?;
        if self.desired_entries_present(&secret) {
            return Ok(UpdateOutcome::unchanged(current));
        }
        secret
            .string_data
            .get_or_insert_with(BTreeMap::new)
            .extend(self.data.clone());
        let mut object = serde_json::to_value(&secret)?;
        types::tag_object(&mut object, &self.config().type_id);
        Ok(UpdateOutcome::changed(object))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn secret() -> SecretDependent {
        let owner = OwnerRef::new("parent", "default", TypeIdentifier::new("example.com", "v1", "Parent"));
        let mut data = BTreeMap::new();
        data.insert("endpoint".to_owned(), "http://parent.default.svc".to_owned());
        SecretDependent::new(owner, "parent-config", data)
    }

    #[tokio::test]
    async fn builds_secret_with_string_data() {
        let object = secret().build(false).await.expect("build failed");
        assert_eq!(object["kind"], "Secret");
        assert_eq!(object["metadata"]["name"], "parent-config");
        assert_eq!(object["stringData"]["endpoint"], "http://parent.default.svc");
    }

    #[tokio::test]
    async fn update_is_a_no_op_when_entries_match() {
        let dep = secret();
        let current = dep.build(false).await.expect("build failed");
        let outcome = dep.update(current).await.expect("update failed");
        assert!(!outcome.changed);
    }

    #[tokio::test]
    async fn update_converges_drifted_entries() {
        let dep = secret();
        let current = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": "parent-config", "namespace": "default" },
            "stringData": { "endpoint": "http://stale", "extra": "kept" },
        });

        let outcome = dep.update(current).await.expect("update failed");
        assert!(outcome.changed);
        assert_eq!(outcome.object["stringData"]["endpoint"], "http://parent.default.svc");
        assert_eq!(outcome.object["stringData"]["extra"], "kept");
    }

    #[test]
    fn is_watched_and_updated() {
        let dep = secret();
        assert!(dep.config().watched);
        assert!(dep.config().updated);
    }
}
