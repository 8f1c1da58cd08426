//! Host-side adapters turning a running plugin into engine contracts.
//!
//! [`PluginDependentResource`] implements the engine's dependent contract
//! over RPC; [`CapabilityPlugin`] exposes the plugin-scoped queries and
//! builds the dependents for an owner.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::warn;

use operator_core::cluster::ClusterError;
use operator_core::condition::{DependentCondition, error_condition};
use operator_core::{DependentConfig, DependentResource, Error, OwnerRef, TypeIdentifier, UpdateOutcome};

use crate::client::PluginClient;
use crate::error::PluginError;
use crate::protocol::{
    CapabilityCategory, CapabilityOwner, PluginRequest, TypeInfo, UpdateResponse, method,
};

/// A dependent resource whose behavior lives in a plugin process.
///
/// `Name` and `GetConfig` are fetched once at initialization: both are
/// immutable for the dependent's lifetime and the engine consults the config
/// on every pass, which must not cost an RPC each time.
pub struct PluginDependentResource {
    client: Arc<PluginClient>,
    capability_owner: CapabilityOwner,
    owner: OwnerRef,
    name: String,
    config: DependentConfig,
}

impl std::fmt::Debug for PluginDependentResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDependentResource")
            .field("name", &self.name)
            .field("type", &self.config.type_id.to_string())
            .finish_non_exhaustive()
    }
}

impl PluginDependentResource {
    /// Binds a dependent of type `target` for `owner`, caching its name and
    /// config from the plugin.
    pub async fn init(
        client: Arc<PluginClient>,
        owner: CapabilityOwner,
        target: TypeIdentifier,
    ) -> Result<Self, PluginError> {
        let request = PluginRequest::for_target(owner.clone(), target);
        let name: String = client.call(method::NAME, Some(request.clone())).await?;
        let config: DependentConfig = client.call(method::GET_CONFIG, Some(request)).await?;
        Ok(Self {
            client,
            owner: owner.reference.clone(),
            capability_owner: owner,
            name,
            config,
        })
    }

    fn request(&self) -> PluginRequest {
        PluginRequest::for_target(self.capability_owner.clone(), self.config.type_id.clone())
    }
}

#[async_trait]
impl DependentResource for PluginDependentResource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    fn config(&self) -> &DependentConfig {
        &self.config
    }

    async fn build(&self, empty: bool) -> Result<Value, Error> {
        let request = self.request().with_arg(json!(empty));
        Ok(self.client.call(method::BUILD, Some(request)).await.map_err(Error::from)?)
    }

    async fn update(&self, current: Value) -> Result<UpdateOutcome, Error> {
        let request = self.request().with_arg(current);
        let response: UpdateResponse = self
            .client
            .call(method::UPDATE, Some(request))
            .await
            .map_err(Error::from)?;
        Ok(UpdateOutcome {
            changed: response.changed,
            object: response.object,
        })
    }

    /// Fetch errors are classified locally (they never cross the wire); the
    /// fetched object goes to the plugin. A transport failure on the way is
    /// a `Failed` condition for this pass, never a crash.
    async fn condition(&self, outcome: Result<&Value, &ClusterError>) -> DependentCondition {
        let object = match outcome {
            Err(err) => return error_condition(&self.name, &self.config, err),
            Ok(object) => object,
        };
        let request = self.request().with_arg(object.clone());
        match self.client.call(method::GET_CONDITION, Some(request)).await {
            Ok(condition) => condition,
            Err(err) => {
                warn!("condition call for '{}' failed: {}", self.name, err);
                DependentCondition::failed(&self.name, &self.config.type_id, err.to_string())
            }
        }
    }
}

/// Plugin-scoped queries over one running plugin, plus construction of the
/// dependents realizing an owner.
#[derive(Debug, Clone)]
pub struct CapabilityPlugin {
    client: Arc<PluginClient>,
}

impl CapabilityPlugin {
    /// Wraps a connected plugin client.
    pub fn new(client: Arc<PluginClient>) -> Self {
        Self { client }
    }

    /// The category this plugin serves.
    pub async fn category(&self) -> Result<CapabilityCategory, PluginError> {
        self.client.call(method::GET_CATEGORY, None).await
    }

    /// The capability types this plugin serves.
    pub async fn supported_types(&self) -> Result<Vec<TypeInfo>, PluginError> {
        self.client.call(method::GET_SUPPORTED_TYPES, None).await
    }

    /// The dependent types the plugin would realize the owner with.
    pub async fn dependent_resource_types(
        &self,
        owner: &CapabilityOwner,
    ) -> Result<Vec<TypeIdentifier>, PluginError> {
        let request = PluginRequest::for_owner(owner.clone());
        self.client
            .call(method::GET_DEPENDENT_RESOURCE_TYPES, Some(request))
            .await
    }

    /// Plugin-side validation failures for the owner; empty means valid.
    pub async fn check_validity(&self, owner: &CapabilityOwner) -> Result<Vec<String>, PluginError> {
        let request = PluginRequest::for_owner(owner.clone());
        self.client.call(method::CHECK_VALIDITY, Some(request)).await
    }

    /// Binds one [`PluginDependentResource`] per dependent type the plugin
    /// declares for the owner, in the plugin's declared order.
    pub async fn dependents_for(
        &self,
        owner: &CapabilityOwner,
    ) -> Result<Vec<PluginDependentResource>, PluginError> {
        let mut dependents = Vec::new();
        for target in self.dependent_resource_types(owner).await? {
            let dependent =
                PluginDependentResource::init(Arc::clone(&self.client), owner.clone(), target).await?;
            dependents.push(dependent);
        }
        Ok(dependents)
    }
}
