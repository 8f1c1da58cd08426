//! Identity types and helpers for schema-agnostic objects.
//!
//! Objects cross the engine (and the plugin boundary) as `serde_json::Value`
//! trees carrying `apiVersion`/`kind`/`metadata` the way cluster objects do;
//! the helpers here read and write the handful of fields the engine cares
//! about.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Namespaced-kind identifier of a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeIdentifier {
    /// API group; empty for the core group
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Kind name
    pub kind: String,
}

impl TypeIdentifier {
    /// Creates a type identifier for the given group, version and kind.
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Creates a core-group type identifier (e.g. `v1` `Secret`).
    pub fn core(version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new("", version, kind)
    }

    /// The `apiVersion` form of this identifier (`group/version`, or just
    /// `version` for the core group).
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

/// Reduced identity of a primary resource, used as the back-pointer from a
/// dependent to its owner. Non-owning: deletion propagation is delegated to
/// the cluster's garbage collector via the owner-reference mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Owner name
    pub name: String,
    /// Owner namespace
    pub namespace: String,
    /// Owner UID as known to the cluster; may be empty before first fetch
    #[serde(default)]
    pub uid: String,
    /// Owner type
    pub type_id: TypeIdentifier,
}

impl OwnerRef {
    /// Creates an owner reference.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, type_id: TypeIdentifier) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            uid: String::new(),
            type_id,
        }
    }

    /// A usable owner reference at minimum names its owner.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}

/// The key delivered by the external reconcile-delivery mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
}

impl ResourceKey {
    /// Creates a reconcile key.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reads `metadata.name` from an object.
pub fn name_of(object: &Value) -> Option<&str> {
    object.pointer("/metadata/name").and_then(Value::as_str)
}

/// Reads `metadata.namespace` from an object.
pub fn namespace_of(object: &Value) -> Option<&str> {
    object.pointer("/metadata/namespace").and_then(Value::as_str)
}

/// Reads the type identifier (`apiVersion` + `kind`) from an object.
pub fn type_id_of(object: &Value) -> Option<TypeIdentifier> {
    let api_version = object.get("apiVersion")?.as_str()?;
    let kind = object.get("kind")?.as_str()?;
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };
    Some(TypeIdentifier::new(group, version, kind))
}

/// Creates a minimal object skeleton of the given type.
pub fn new_object(type_id: &TypeIdentifier, name: &str, namespace: &str) -> Value {
    json!({
        "apiVersion": type_id.api_version(),
        "kind": type_id.kind,
        "metadata": {
            "name": name,
            "namespace": namespace,
        },
    })
}

/// Stamps `apiVersion` and `kind` onto an object, e.g. one serialized from a
/// typed struct that does not carry them as fields.
pub fn tag_object(object: &mut Value, type_id: &TypeIdentifier) {
    if let Value::Object(map) = object {
        map.insert("apiVersion".into(), Value::String(type_id.api_version()));
        map.insert("kind".into(), Value::String(type_id.kind.clone()));
    }
}

/// Appends a controlling owner reference to the object's metadata if no
/// reference to the same owner is present yet. Returns whether the object
/// was modified.
pub fn attach_owner_reference(owner: &OwnerRef, object: &mut Value) -> bool {
    let reference = json!({
        "apiVersion": owner.type_id.api_version(),
        "kind": owner.type_id.kind,
        "name": owner.name,
        "uid": owner.uid,
        "controller": true,
    });

    let metadata = object
        .as_object_mut()
        .map(|map| map.entry("metadata").or_insert_with(|| json!({})));
    let Some(Value::Object(metadata)) = metadata else {
        return false;
    };
    let references = metadata
        .entry("ownerReferences")
        .or_insert_with(|| json!([]));
    let Some(references) = references.as_array_mut() else {
        return false;
    };

    let already_owned = references.iter().any(|r| {
        r.get("name").and_then(Value::as_str) == Some(owner.name.as_str())
            && r.get("kind").and_then(Value::as_str) == Some(owner.type_id.kind.as_str())
    });
    if already_owned {
        return false;
    }
    references.push(reference);
    true
}
