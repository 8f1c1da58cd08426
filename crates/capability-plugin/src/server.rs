//! Plugin-side serving: traits a plugin implements, the aggregate router,
//! and the stdio serve loop.
//!
//! A plugin binary bundles one or more [`PluginResource`]s of one category
//! into an [`AggregatePluginResource`] and hands it to [`serve`]. Stdout is
//! reserved for the protocol; all logging goes to stderr.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error};

use operator_core::condition::DependentCondition;
use operator_core::{DependentConfig, TypeIdentifier};

use crate::error::PluginError;
use crate::protocol::{
    CapabilityCategory, CapabilityOwner, MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE, PluginRequest,
    RpcCall, RpcReply, TypeInfo, UpdateResponse, handshake_line, method,
};

/// One dependent resource as served by a plugin: the subset of the engine's
/// dependent contract a plugin can answer without cluster access (fetching
/// and persisting stay on the host side).
#[async_trait]
pub trait ServedDependent: Send + Sync {
    /// The dependent's name on the cluster.
    fn name(&self) -> String;

    /// The dependent's policy, as the host should apply it.
    fn config(&self) -> DependentConfig;

    /// Constructs the desired-state object; with `empty` set, a zero-value
    /// object of the correct type.
    async fn build(&self, empty: bool) -> Result<Value, PluginError>;

    /// Given the live object, decides whether a mutation is needed.
    async fn update(&self, current: Value) -> Result<UpdateResponse, PluginError>;

    /// Derives the condition from the fetched object. Fetch errors never
    /// cross the wire; the host classifies those itself.
    fn condition(&self, _object: &Value) -> DependentCondition {
        DependentCondition::ready(&self.name(), &self.config().type_id)
    }
}

/// One capability type handler within a plugin.
pub trait PluginResource: Send + Sync {
    /// The category this handler belongs to.
    fn category(&self) -> CapabilityCategory;

    /// The capability types this handler answers for.
    fn supported_types(&self) -> Vec<TypeInfo>;

    /// The dependents realizing the given owner, in dependency order.
    fn dependents_for(&self, owner: &CapabilityOwner) -> Vec<Box<dyn ServedDependent>>;

    /// Plugin-side validation of the owner's declared capability; returned
    /// strings are surfaced as validation errors on the host.
    fn check_validity(&self, _owner: &CapabilityOwner) -> Vec<String> {
        Vec::new()
    }
}

/// Routes requests to the handler matching the owner's declared capability
/// type. All bundled handlers must share one category; a routing miss is a
/// deployment mismatch and aborts the plugin process.
pub struct AggregatePluginResource {
    category: CapabilityCategory,
    resources: Vec<Box<dyn PluginResource>>,
}

impl std::fmt::Debug for AggregatePluginResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatePluginResource")
            .field("category", &self.category.to_string())
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl AggregatePluginResource {
    /// Bundles handlers of one category. Mixing categories (or bundling
    /// nothing) is a construction error.
    pub fn new(resources: Vec<Box<dyn PluginResource>>) -> Result<Self, PluginError> {
        let Some(first) = resources.first() else {
            return Err(PluginError::Configuration(
                "an aggregate plugin resource needs at least one handler".into(),
            ));
        };
        let category = first.category();
        for resource in &resources {
            if !category.matches(&resource.category()) {
                return Err(PluginError::Configuration(format!(
                    "cannot mix categories '{}' and '{}' in one plugin",
                    category,
                    resource.category(),
                )));
            }
        }
        Ok(Self { category, resources })
    }

    /// The single category served by this plugin.
    pub fn category(&self) -> &CapabilityCategory {
        &self.category
    }

    /// Every capability type served by this plugin.
    pub fn supported_types(&self) -> Vec<TypeInfo> {
        self.resources
            .iter()
            .flat_map(|r| r.supported_types())
            .collect()
    }

    /// # Panics
    ///
    /// Panics when no handler supports the owner's declared capability type:
    /// the host launched this plugin for a capability it does not provide,
    /// which is a deployment mismatch rather than a recoverable condition.
    fn route(&self, owner: &CapabilityOwner) -> &dyn PluginResource {
        self.resources
            .iter()
            .find(|r| {
                r.supported_types()
                    .iter()
                    .any(|t| owner.capability_type.matches(&t.name))
            })
            .unwrap_or_else(|| {
                panic!(
                    "no handler for capability type '{}' in category '{}'",
                    owner.capability_type, self.category,
                )
            })
            .as_ref()
    }

    fn dependent(&self, request: &PluginRequest) -> Result<Box<dyn ServedDependent>, PluginError> {
        let target = request.target.as_ref().ok_or_else(|| {
            PluginError::Configuration("dependent-scoped call without a target type".into())
        })?;
        self.route(&request.owner)
            .dependents_for(&request.owner)
            .into_iter()
            .find(|d| d.config().type_id == *target)
            .ok_or_else(|| {
                PluginError::Configuration(format!(
                    "no dependent of type {} for capability type '{}'",
                    target, request.owner.capability_type,
                ))
            })
    }

    /// Handles one call, turning any failure into an error reply.
    pub async fn handle_call(&self, call: RpcCall) -> RpcReply {
        debug!("handling '{}' (id {})", call.method, call.id);
        match self.dispatch(&call.method, call.request).await {
            Ok(result) => RpcReply {
                id: call.id,
                result: Some(result),
                error: None,
            },
            Err(err) => RpcReply {
                id: call.id,
                result: None,
                error: Some(err.to_string()),
            },
        }
    }

    async fn dispatch(
        &self,
        method_name: &str,
        request: Option<PluginRequest>,
    ) -> Result<Value, PluginError> {
        match method_name {
            method::GET_CATEGORY => Ok(serde_json::to_value(&self.category)?),
            method::GET_SUPPORTED_TYPES => Ok(serde_json::to_value(self.supported_types())?),
            _ => {
                let request = request.ok_or_else(|| {
                    PluginError::Configuration(format!("'{method_name}' requires a request"))
                })?;
                self.dispatch_scoped(method_name, request).await
            }
        }
    }

    async fn dispatch_scoped(
        &self,
        method_name: &str,
        request: PluginRequest,
    ) -> Result<Value, PluginError> {
        match method_name {
            method::CHECK_VALIDITY => {
                let failures = self.route(&request.owner).check_validity(&request.owner);
                Ok(serde_json::to_value(failures)?)
            }
            method::GET_DEPENDENT_RESOURCE_TYPES => {
                let types: Vec<TypeIdentifier> = self
                    .route(&request.owner)
                    .dependents_for(&request.owner)
                    .iter()
                    .map(|d| d.config().type_id)
                    .collect();
                Ok(serde_json::to_value(types)?)
            }
            method::NAME => {
                let dependent = self.dependent(&request)?;
                Ok(serde_json::to_value(dependent.name())?)
            }
            method::GET_CONFIG => {
                let dependent = self.dependent(&request)?;
                Ok(serde_json::to_value(dependent.config())?)
            }
            method::BUILD => {
                let dependent = self.dependent(&request)?;
                let empty = request.arg.as_ref().and_then(Value::as_bool).unwrap_or(false);
                Ok(dependent.build(empty).await?)
            }
            method::UPDATE => {
                let dependent = self.dependent(&request)?;
                let current = request.arg.ok_or_else(|| {
                    PluginError::Configuration("'Update' requires the current object".into())
                })?;
                Ok(serde_json::to_value(dependent.update(current).await?)?)
            }
            method::GET_CONDITION => {
                let dependent = self.dependent(&request)?;
                let object = request.arg.ok_or_else(|| {
                    PluginError::Configuration("'GetCondition' requires the fetched object".into())
                })?;
                Ok(serde_json::to_value(dependent.condition(&object))?)
            }
            other => Err(PluginError::Call {
                method: other.to_owned(),
                message: "unsupported method".to_owned(),
            }),
        }
    }
}

/// Plugin-binary entry point: verifies the environment, emits the handshake
/// and serves calls from stdin until the host closes the pipe.
///
/// Installs a stderr logger; stdout carries nothing but the protocol.
pub async fn serve(aggregate: AggregatePluginResource) -> Result<(), PluginError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if std::env::var(MAGIC_COOKIE_KEY).as_deref() != Ok(MAGIC_COOKIE_VALUE) {
        return Err(PluginError::BadEnvironment);
    }

    let mut stdout = tokio::io::stdout();
    stdout.write_all(handshake_line().as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let call: RpcCall = match serde_json::from_str(&line) {
            Ok(call) => call,
            Err(err) => {
                error!("discarding undecodable call: {}", err);
                continue;
            }
        };
        let reply = aggregate.handle_call(call).await;
        let mut wire = serde_json::to_string(&reply)?;
        wire.push('\n');
        stdout.write_all(wire.as_bytes()).await?;
        stdout.flush().await?;
    }
    debug!("host closed the transport, shutting down");
    Ok(())
}
