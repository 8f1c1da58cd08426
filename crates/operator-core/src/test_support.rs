//! Shared fixtures for engine tests.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::DependentConfig;
use crate::dependent::{BaseDependent, DependentResource, UpdateOutcome};
use crate::error::Error;
use crate::types::{self, OwnerRef, TypeIdentifier};

pub fn owner() -> OwnerRef {
    OwnerRef::new("parent", "default", TypeIdentifier::new("example.com", "v1", "Parent"))
}

/// A dependent with a single `data` payload field, enough to exercise the
/// create/update/condition paths without dragging real resource schemas in.
#[derive(Debug)]
pub struct TestDependent {
    base: BaseDependent,
    name: String,
    data: Value,
}

impl TestDependent {
    pub fn type_id() -> TypeIdentifier {
        TypeIdentifier::new("example.com", "v1", "Gadget")
    }

    pub fn new(owner: OwnerRef, name: &str, data: Value) -> Self {
        Self::configured(owner, name, data, |_| {})
    }

    pub fn configured(
        owner: OwnerRef,
        name: &str,
        data: Value,
        configure: impl FnOnce(&mut DependentConfig),
    ) -> Self {
        let mut config = DependentConfig::new(Self::type_id());
        configure(&mut config);
        Self {
            base: BaseDependent::new(owner, config),
            name: name.to_owned(),
            data,
        }
    }
}

#[async_trait]
impl DependentResource for TestDependent {
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
        let mut object = types::new_object(&self.config().type_id, &self.name, &self.owner().namespace);
        if !empty {
            object["data"] = self.data.clone();
        }
        Ok(object)
    }

    async fn update(&self, mut current: Value) -> Result<UpdateOutcome, Error> {
        if current.get("data") == Some(&self.data) {
            return Ok(UpdateOutcome::unchanged(current));
        }
        current["data"] = self.data.clone();
        Ok(UpdateOutcome::changed(current))
    }
}
