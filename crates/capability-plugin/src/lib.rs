//! Out-of-process capability plugin protocol.
//!
//! Lets external plugin binaries supply dependent-resource implementations
//! without being compiled into the controller. The host launches the plugin
//! executable, verifies a version/cookie handshake, then drives it over a
//! line-oriented JSON RPC on stdin/stdout; objects cross the boundary as
//! schema-agnostic `serde_json::Value` trees.
//!
//! Host side: [`PluginClient`] owns the transport, [`CapabilityPlugin`] and
//! [`PluginDependentResource`] adapt it to the engine's
//! [`operator_core::DependentResource`] contract.
//!
//! Plugin side: implement [`PluginResource`] (and [`ServedDependent`] for
//! each dependent it contributes), bundle the implementations into an
//! [`AggregatePluginResource`] and hand it to [`serve`] from the plugin
//! binary's `main`.

pub mod client;
pub mod dependent;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::PluginClient;
pub use dependent::{CapabilityPlugin, PluginDependentResource};
pub use error::PluginError;
pub use protocol::{
    CapabilityCategory, CapabilityOwner, CapabilityType, MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE,
    PROTOCOL_VERSION, PluginRequest, RpcCall, RpcReply, TypeInfo, UpdateResponse,
};
pub use server::{AggregatePluginResource, PluginResource, ServedDependent, serve};
