//! Wire protocol shared by host and plugin.
//!
//! The handshake is a single `version|cookie` line on the plugin's stdout,
//! verified exactly by the host before any RPC. After that, each call is one
//! JSON document per line on stdin, answered by one JSON document per line
//! on stdout, correlated by id. Both constants are part of the protocol:
//! bump [`PROTOCOL_VERSION`] on any incompatible wire change.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use operator_core::{OwnerRef, TypeIdentifier};

use crate::error::PluginError;

/// Protocol version negotiated during the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable the host sets for the plugin process.
pub const MAGIC_COOKIE_KEY: &str = "OPERATOR_CAPABILITY_PLUGIN";

/// Value of the magic cookie; also echoed back in the handshake line.
pub const MAGIC_COOKIE_VALUE: &str = "io.operator.capability.plugin";

/// The handshake line a plugin emits on stdout before serving calls.
pub fn handshake_line() -> String {
    format!("{PROTOCOL_VERSION}|{MAGIC_COOKIE_VALUE}")
}

/// Verifies a received handshake line, rejecting version or cookie
/// mismatches before any RPC is attempted.
pub fn verify_handshake(line: &str) -> Result<(), PluginError> {
    let Some((version, cookie)) = line.trim().split_once('|') else {
        return Err(PluginError::Handshake(format!("malformed handshake line '{line}'")));
    };
    if version.parse() != Ok(PROTOCOL_VERSION) {
        return Err(PluginError::Handshake(format!(
            "protocol version mismatch: expected {PROTOCOL_VERSION}, got '{version}'"
        )));
    }
    if cookie != MAGIC_COOKIE_VALUE {
        return Err(PluginError::Handshake("magic cookie mismatch".to_owned()));
    }
    Ok(())
}

/// Category a plugin belongs to (e.g. `database`); one plugin serves exactly
/// one category. Matching is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCategory(String);

impl CapabilityCategory {
    /// Creates a category.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Case-insensitive equality.
    pub fn matches(&self, other: &CapabilityCategory) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concrete capability type within a category (e.g. `postgres`), declared by
/// the primary resource's spec and used to route requests to the matching
/// handler. Matching is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityType(String);

impl CapabilityType {
    /// Creates a capability type.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Case-insensitive match against a declared type name.
    pub fn matches(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One capability type a plugin supports, with the versions it can provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Capability type name
    pub name: String,
    /// Supported versions, newest first
    pub versions: Vec<String>,
}

/// The primary resource as it crosses the process boundary: reduced to its
/// identity plus the capability type its spec declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityOwner {
    /// Owner identity
    pub reference: OwnerRef,
    /// Capability type declared by the owner's spec
    pub capability_type: CapabilityType,
}

/// Request payload of one RPC call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// The owning primary resource
    pub owner: CapabilityOwner,
    /// Target dependent type, for dependent-scoped methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TypeIdentifier>,
    /// Method-specific payload (e.g. the current object for `Update`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<Value>,
}

impl PluginRequest {
    /// An owner-scoped request (validity checks, type listings).
    pub fn for_owner(owner: CapabilityOwner) -> Self {
        Self { owner, target: None, arg: None }
    }

    /// A dependent-scoped request.
    pub fn for_target(owner: CapabilityOwner, target: TypeIdentifier) -> Self {
        Self { owner, target: Some(target), arg: None }
    }

    /// Attaches a method-specific payload.
    pub fn with_arg(mut self, arg: Value) -> Self {
        self.arg = Some(arg);
        self
    }
}

/// RPC method names.
pub mod method {
    pub const NAME: &str = "Name";
    pub const BUILD: &str = "Build";
    pub const UPDATE: &str = "Update";
    pub const GET_CONDITION: &str = "GetCondition";
    pub const GET_CONFIG: &str = "GetConfig";
    pub const GET_CATEGORY: &str = "GetCategory";
    pub const GET_SUPPORTED_TYPES: &str = "GetSupportedTypes";
    pub const GET_DEPENDENT_RESOURCE_TYPES: &str = "GetDependentResourceTypes";
    pub const CHECK_VALIDITY: &str = "CheckValidity";
}

/// One call as serialized on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCall {
    /// Correlation id, strictly increasing per connection
    pub id: u64,
    /// Method name (see [`method`])
    pub method: String,
    /// Request payload; absent for plugin-scoped methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<PluginRequest>,
}

/// One reply as serialized on the wire; carries either a result or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcReply {
    /// Correlation id of the answered call
    pub id: u64,
    /// Successful result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Plugin-side failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of an `Update` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Whether a mutation is needed
    pub changed: bool,
    /// The (possibly mutated) object
    pub object: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_line_round_trips() {
        verify_handshake(&handshake_line()).expect("own handshake must verify");
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let err = verify_handshake("0|io.operator.capability.plugin").expect_err("must reject");
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn cookie_mismatch_is_rejected() {
        let err = verify_handshake("1|nope").expect_err("must reject");
        assert!(err.to_string().contains("magic cookie mismatch"));
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(verify_handshake("hello").is_err());
        assert!(verify_handshake("").is_err());
    }

    #[test]
    fn capability_type_matching_ignores_case() {
        let postgres = CapabilityType::new("Postgres");
        assert!(postgres.matches("postgres"));
        assert!(postgres.matches("POSTGRES"));
        assert!(!postgres.matches("mysql"));
    }

    #[test]
    fn calls_serialize_one_document_per_line() {
        let call = RpcCall {
            id: 7,
            method: method::GET_CATEGORY.to_owned(),
            request: None,
        };
        let wire = serde_json::to_string(&call).expect("encode failed");
        assert!(!wire.contains('\n'));
        let decoded: RpcCall = serde_json::from_str(&wire).expect("decode failed");
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.method, method::GET_CATEGORY);
        assert!(decoded.request.is_none());
    }
}
