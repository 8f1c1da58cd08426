//! Plugin boundary error types.
//!
//! Everything that can go wrong between host and plugin lands here; at the
//! engine boundary it collapses into [`operator_core::Error::PluginTransport`]
//! so a plugin failure fails the reconcile pass without crashing the loop.

use thiserror::Error;

/// Errors surfaced by the plugin transport and protocol.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin's handshake line did not match the expected protocol
    /// version and magic cookie; the connection is rejected before any RPC
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// Transport-level I/O failure (spawn, pipe read/write)
    #[error("plugin I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be encoded or decoded
    #[error("plugin codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The plugin answered a call with an error, or answered the wrong call
    #[error("plugin call '{method}' failed: {message}")]
    Call {
        /// The RPC method that failed
        method: String,
        /// The plugin-reported or transport-derived failure
        message: String,
    },

    /// The plugin process closed its end of the transport
    #[error("plugin process terminated")]
    Terminated,

    /// The plugin was started outside a host (magic cookie missing from the
    /// environment)
    #[error(
        "this binary is a capability plugin and is not meant to be executed directly; \
         it must be launched by the controller host"
    )]
    BadEnvironment,

    /// Programming or deployment defect on either side of the boundary
    #[error("plugin configuration error: {0}")]
    Configuration(String),
}

impl From<PluginError> for operator_core::Error {
    fn from(err: PluginError) -> Self {
        operator_core::Error::PluginTransport(err.to_string())
    }
}
