//! Kube-backed cluster client.
//!
//! Implements [`ClusterClient`] over kube's dynamic API so the engine can
//! operate on arbitrary resource types without compiling their schemas in.
//! Watch registration is delegated to an injected [`WatchRegistrar`]; the
//! informer machinery itself lives with the external controller runtime.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, GroupVersionKind};
use serde_json::{Value, json};
use tracing::debug;

use crate::cluster::{ClusterClient, ClusterError, WatchRegistrar};
use crate::types::{self, OwnerRef, TypeIdentifier, attach_owner_reference};

/// [`ClusterClient`] implementation over a kube client.
pub struct KubeClusterClient {
    client: kube::Client,
    registrar: Arc<dyn WatchRegistrar>,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Creates a cluster client over the given kube client, delegating
    /// watch registration to `registrar`.
    pub fn new(client: kube::Client, registrar: Arc<dyn WatchRegistrar>) -> Self {
        Self { client, registrar }
    }

    fn api_for(&self, namespace: &str, type_id: &TypeIdentifier) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(&type_id.group, &type_id.version, &type_id.kind);
        let resource = ApiResource::from_gvk(&gvk);
        Api::namespaced_with(self.client.clone(), namespace, &resource)
    }

    fn identify(object: &Value) -> Result<(String, String, TypeIdentifier), ClusterError> {
        let name = types::name_of(object)
            .ok_or_else(|| ClusterError::Api("object has no metadata.name".into()))?
            .to_owned();
        let namespace = types::namespace_of(object)
            .ok_or_else(|| ClusterError::Api(format!("object '{name}' has no metadata.namespace")))?
            .to_owned();
        let type_id = types::type_id_of(object)
            .ok_or_else(|| ClusterError::Api(format!("object '{name}' has no apiVersion/kind")))?;
        Ok((name, namespace, type_id))
    }
}

/// Maps kube API errors onto the engine's error kinds, keeping not-found
/// and already-exists distinguishable.
fn map_kube_error(type_name: &str, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(e) if e.code == 404 => ClusterError::NotFound {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
        },
        kube::Error::Api(e) if e.reason == "AlreadyExists" => ClusterError::AlreadyExists {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
        },
        other => ClusterError::Api(other.to_string()),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn fetch(
        &self,
        name: &str,
        namespace: &str,
        type_id: &TypeIdentifier,
    ) -> Result<Value, ClusterError> {
        let api = self.api_for(namespace, type_id);
        let object = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(&type_id.kind, name, e))?;
        serde_json::to_value(&object).map_err(|e| ClusterError::Api(e.to_string()))
    }

    async fn create(&self, object: &Value) -> Result<(), ClusterError> {
        let (name, namespace, type_id) = Self::identify(object)?;
        let api = self.api_for(&namespace, &type_id);
        let dynamic: DynamicObject =
            serde_json::from_value(object.clone()).map_err(|e| ClusterError::Api(e.to_string()))?;
        api.create(&PostParams::default(), &dynamic)
            .await
            .map_err(|e| map_kube_error(&type_id.kind, &name, e))?;
        debug!("created {} '{}/{}'", type_id.kind, namespace, name);
        Ok(())
    }

    async fn update(&self, object: &Value) -> Result<(), ClusterError> {
        let (name, namespace, type_id) = Self::identify(object)?;
        let api = self.api_for(&namespace, &type_id);
        api.patch(&name, &PatchParams::default(), &Patch::Merge(object))
            .await
            .map_err(|e| map_kube_error(&type_id.kind, &name, e))?;
        Ok(())
    }

    async fn update_status(&self, object: &Value) -> Result<(), ClusterError> {
        let (name, namespace, type_id) = Self::identify(object)?;
        let status = object.get("status").cloned().unwrap_or(Value::Null);
        let api = self.api_for(&namespace, &type_id);
        api.patch_status(
            &name,
            &PatchParams::default(),
            &Patch::Merge(&json!({ "status": status })),
        )
        .await
        .map_err(|e| map_kube_error(&type_id.kind, &name, e))?;
        Ok(())
    }

    async fn register_watch(&self, type_id: &TypeIdentifier) -> Result<(), ClusterError> {
        self.registrar.register(type_id)
    }

    fn set_owner_reference(&self, owner: &OwnerRef, object: &mut Value) -> Result<(), ClusterError> {
        attach_owner_reference(owner, object);
        Ok(())
    }
}
