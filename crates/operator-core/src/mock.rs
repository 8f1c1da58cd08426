//! In-memory cluster client for unit testing.
//!
//! Stores objects in memory, counts the mutating calls so tests can assert
//! on convergence idempotence, and supports one-shot failure injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::cluster::{ClusterClient, ClusterError};
use crate::types::{self, TypeIdentifier};

type ObjectKey = (TypeIdentifier, String, String);

#[derive(Debug, Default)]
struct Counters {
    creates: usize,
    updates: usize,
    status_updates: usize,
}

/// Mock [`ClusterClient`] backed by an in-memory object store.
#[derive(Clone, Default)]
pub struct MockCluster {
    objects: Arc<Mutex<HashMap<ObjectKey, Value>>>,
    counters: Arc<Mutex<Counters>>,
    watches: Arc<Mutex<Vec<TypeIdentifier>>>,
    fail_next_create: Arc<Mutex<Option<ClusterError>>>,
    fail_next_update: Arc<Mutex<Option<ClusterError>>>,
    fail_next_watch: Arc<Mutex<Option<ClusterError>>>,
}

impl std::fmt::Debug for MockCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCluster").finish_non_exhaustive()
    }
}

impl MockCluster {
    /// Creates an empty mock cluster.
    pub fn new() -> Self {
        Self::default()
    }

    fn key_of(object: &Value) -> Result<ObjectKey, ClusterError> {
        let type_id = types::type_id_of(object)
            .ok_or_else(|| ClusterError::Api("object has no apiVersion/kind".into()))?;
        let name = types::name_of(object)
            .ok_or_else(|| ClusterError::Api("object has no metadata.name".into()))?;
        let namespace = types::namespace_of(object).unwrap_or("default");
        Ok((type_id, namespace.to_owned(), name.to_owned()))
    }

    /// Seeds an object into the store without counting it as a create.
    pub fn seed(&self, object: Value) {
        let key = Self::key_of(&object).expect("seed object must carry type and name");
        self.objects.lock().expect("mock store poisoned").insert(key, object);
    }

    /// Returns the stored object, if any.
    pub fn stored(&self, type_id: &TypeIdentifier, namespace: &str, name: &str) -> Option<Value> {
        let key = (type_id.clone(), namespace.to_owned(), name.to_owned());
        self.objects.lock().expect("mock store poisoned").get(&key).cloned()
    }

    /// Removes the stored object, if any.
    pub fn remove(&self, type_id: &TypeIdentifier, namespace: &str, name: &str) -> Option<Value> {
        let key = (type_id.clone(), namespace.to_owned(), name.to_owned());
        self.objects.lock().expect("mock store poisoned").remove(&key)
    }

    /// Number of `create` calls seen so far.
    pub fn create_count(&self) -> usize {
        self.counters.lock().expect("mock counters poisoned").creates
    }

    /// Number of `update` calls seen so far.
    pub fn update_count(&self) -> usize {
        self.counters.lock().expect("mock counters poisoned").updates
    }

    /// Number of `update_status` calls seen so far.
    pub fn status_update_count(&self) -> usize {
        self.counters.lock().expect("mock counters poisoned").status_updates
    }

    /// Types passed to `register_watch`, in call order.
    pub fn registered_watches(&self) -> Vec<TypeIdentifier> {
        self.watches.lock().expect("mock watches poisoned").clone()
    }

    /// Makes the next `create` call fail with the given error.
    pub fn fail_next_create(&self, err: ClusterError) {
        *self.fail_next_create.lock().expect("mock failure slot poisoned") = Some(err);
    }

    /// Makes the next `update` call fail with the given error.
    pub fn fail_next_update(&self, err: ClusterError) {
        *self.fail_next_update.lock().expect("mock failure slot poisoned") = Some(err);
    }

    /// Makes the next `register_watch` call fail with the given error.
    pub fn fail_next_register_watch(&self, err: ClusterError) {
        *self.fail_next_watch.lock().expect("mock failure slot poisoned") = Some(err);
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn fetch(
        &self,
        name: &str,
        namespace: &str,
        type_id: &TypeIdentifier,
    ) -> Result<Value, ClusterError> {
        self.stored(type_id, namespace, name)
            .ok_or_else(|| ClusterError::NotFound {
                type_name: type_id.kind.clone(),
                name: name.to_owned(),
            })
    }

    async fn create(&self, object: &Value) -> Result<(), ClusterError> {
        self.counters.lock().expect("mock counters poisoned").creates += 1;
        if let Some(err) = self.fail_next_create.lock().expect("mock failure slot poisoned").take() {
            return Err(err);
        }
        let key = Self::key_of(object)?;
        let mut objects = self.objects.lock().expect("mock store poisoned");
        if objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                type_name: key.0.kind,
                name: key.2,
            });
        }
        objects.insert(key, object.clone());
        Ok(())
    }

    async fn update(&self, object: &Value) -> Result<(), ClusterError> {
        self.counters.lock().expect("mock counters poisoned").updates += 1;
        if let Some(err) = self.fail_next_update.lock().expect("mock failure slot poisoned").take() {
            return Err(err);
        }
        let key = Self::key_of(object)?;
        let mut objects = self.objects.lock().expect("mock store poisoned");
        if !objects.contains_key(&key) {
            return Err(ClusterError::NotFound {
                type_name: key.0.kind,
                name: key.2,
            });
        }
        objects.insert(key, object.clone());
        Ok(())
    }

    async fn update_status(&self, object: &Value) -> Result<(), ClusterError> {
        self.counters.lock().expect("mock counters poisoned").status_updates += 1;
        let key = Self::key_of(object)?;
        let status = object.get("status").cloned().unwrap_or(Value::Null);
        let mut objects = self.objects.lock().expect("mock store poisoned");
        if let Some(stored) = objects.get_mut(&key) {
            if let Some(map) = stored.as_object_mut() {
                map.insert("status".into(), status);
            }
        }
        Ok(())
    }

    async fn register_watch(&self, type_id: &TypeIdentifier) -> Result<(), ClusterError> {
        if let Some(err) = self.fail_next_watch.lock().expect("mock failure slot poisoned").take() {
            return Err(err);
        }
        self.watches.lock().expect("mock watches poisoned").push(type_id.clone());
        Ok(())
    }
}
