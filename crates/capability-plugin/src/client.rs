//! Host-side plugin transport.
//!
//! Owns the plugin child process and serves strictly sequential
//! request/response pairs over its stdin/stdout. Plugin RPC is a synchronous
//! foreign-process call from the engine's perspective: one outstanding call
//! at a time, awaited to completion, with failures surfaced as
//! [`PluginError`] rather than crashing the reconcile loop.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::PluginError;
use crate::protocol::{
    MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE, PluginRequest, RpcCall, RpcReply, verify_handshake,
};

struct Transport {
    // held so the process is killed when the client is dropped
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A connection to one running plugin process.
pub struct PluginClient {
    transport: Mutex<Transport>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginClient").finish_non_exhaustive()
    }
}

impl PluginClient {
    /// Launches the plugin executable at `path` and performs the handshake.
    pub async fn launch(path: impl AsRef<Path>) -> Result<Self, PluginError> {
        Self::launch_with(Command::new(path.as_ref())).await
    }

    /// Launches a plugin from a prepared command (extra args, env,
    /// working directory) and performs the handshake. The magic cookie and
    /// pipe setup are applied on top of the given command.
    pub async fn launch_with(mut command: Command) -> Result<Self, PluginError> {
        command
            .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PluginError::Configuration("plugin stdin was not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginError::Configuration("plugin stdout was not captured".into()))?;
        let mut stdout = BufReader::new(stdout).lines();

        let line = stdout.next_line().await?.ok_or(PluginError::Terminated)?;
        verify_handshake(&line)?;
        debug!("plugin handshake accepted");

        Ok(Self {
            transport: Mutex::new(Transport {
                _child: child,
                stdin,
                stdout,
            }),
            next_id: AtomicU64::new(1),
        })
    }

    /// Performs one RPC call, decoding the result into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: Option<PluginRequest>,
    ) -> Result<T, PluginError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let call = RpcCall {
            id,
            method: method.to_owned(),
            request,
        };
        let mut wire = serde_json::to_string(&call)?;
        wire.push('\n');

        // one outstanding call at a time; the lock spans request and reply
        let mut transport = self.transport.lock().await;
        transport.stdin.write_all(wire.as_bytes()).await?;
        transport.stdin.flush().await?;

        let line = transport
            .stdout
            .next_line()
            .await?
            .ok_or(PluginError::Terminated)?;
        drop(transport);

        let reply: RpcReply = serde_json::from_str(&line)?;
        if reply.id != id {
            return Err(PluginError::Call {
                method: method.to_owned(),
                message: format!("out-of-order reply: expected id {id}, got {}", reply.id),
            });
        }
        if let Some(message) = reply.error {
            return Err(PluginError::Call {
                method: method.to_owned(),
                message,
            });
        }
        let result = reply.result.ok_or_else(|| PluginError::Call {
            method: method.to_owned(),
            message: "reply carried neither result nor error".to_owned(),
        })?;
        Ok(serde_json::from_value(result)?)
    }
}
