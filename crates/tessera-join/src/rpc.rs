//! JSON-RPC client for the group service daemon.
//!
//! Speaks newline-delimited JSON-RPC 2.0 over a Unix domain socket, one
//! request per connection. The API is blocking: each call drives a private
//! current-thread tokio runtime to completion, so it must not be invoked
//! from inside another async runtime.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_invite::GroupInviteLink;
use tessera_types::GroupId;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use crate::service::{GroupService, GroupState, JoinCallResult, ServiceError};

/// Method joining a group through an invite link.
pub const METHOD_JOIN: &str = "join_group_via_link";

/// Method reading a group's membership lists.
pub const METHOD_GET_STATE: &str = "get_group_state";

/// Longest response line the client accepts, newline included.
pub const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Error codes returned by the daemon.
pub mod codes {
    pub const LINK_NOT_ACTIVE: i32 = -32070;
    pub const JOIN_REQUEST_REJECTED: i32 = -32071;
    pub const GROUP_NOT_FOUND: i32 = -32072;
}

/// JSON-RPC request.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    /// Error name.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    fn detail(&self) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.get("detail"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.message.clone())
    }

    /// Map a daemon error object onto the service error taxonomy.
    fn into_service_error(self, group_id: &GroupId) -> ServiceError {
        match self.code {
            codes::LINK_NOT_ACTIVE => ServiceError::LinkNotActive(self.detail()),
            codes::JOIN_REQUEST_REJECTED => ServiceError::RequestRejected,
            codes::GROUP_NOT_FOUND => ServiceError::GroupNotFound(*group_id),
            code => ServiceError::InvalidResponse(format!(
                "daemon error {code} {}: {}",
                self.message,
                self.detail()
            )),
        }
    }
}

/// [`GroupService`] backed by the daemon's JSON-RPC socket.
pub struct RpcGroupService {
    socket_path: PathBuf,
    timeout: Duration,
    runtime: tokio::runtime::Runtime,
    next_id: AtomicU64,
}

impl RpcGroupService {
    /// Create a client for the daemon listening on `socket_path`.
    ///
    /// No connection is made until the first call. Every call, including
    /// connecting, is bounded by `timeout`.
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Result<Self, ServiceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to start runtime: {e}")))?;
        Ok(Self {
            socket_path: socket_path.into(),
            timeout,
            runtime,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Perform one request/response exchange.
    fn call(&self, method: &str, params: Value, group_id: &GroupId) -> Result<Value, ServiceError> {
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params,
        };
        debug!(method, id = request.id, "sending RPC request");

        let response = self.runtime.block_on(async {
            tokio::time::timeout(self.timeout, exchange(&self.socket_path, &request))
                .await
                .map_err(|_| {
                    ServiceError::Transport(format!(
                        "{method} timed out after {} ms",
                        self.timeout.as_millis()
                    ))
                })?
        })?;

        if response.id != Value::from(request.id) {
            return Err(ServiceError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        match (response.result, response.error) {
            (_, Some(error)) => Err(error.into_service_error(group_id)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ServiceError::InvalidResponse(
                "response carries neither result nor error".to_string(),
            )),
        }
    }
}

/// Send one request line and read one response line.
async fn exchange(socket_path: &Path, request: &RpcRequest) -> Result<RpcResponse, ServiceError> {
    let transport = |e: std::io::Error| ServiceError::Transport(e.to_string());

    let stream = UnixStream::connect(socket_path).await.map_err(|e| {
        ServiceError::Transport(format!("cannot connect to {}: {e}", socket_path.display()))
    })?;
    let (reader, mut writer) = stream.into_split();

    let mut request_json = serde_json::to_string(request)
        .map_err(|e| ServiceError::Transport(format!("failed to encode request: {e}")))?;
    request_json.push('\n');
    writer
        .write_all(request_json.as_bytes())
        .await
        .map_err(transport)?;
    writer.flush().await.map_err(transport)?;

    let mut reader = BufReader::new(reader.take(MAX_RESPONSE_BYTES));
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await.map_err(transport)?;
    if bytes_read == 0 {
        return Err(ServiceError::Transport(
            "connection closed before a response arrived".to_string(),
        ));
    }
    if !line.ends_with('\n') {
        if bytes_read as u64 >= MAX_RESPONSE_BYTES {
            return Err(ServiceError::InvalidResponse(format!(
                "response exceeds {MAX_RESPONSE_BYTES} bytes"
            )));
        }
        return Err(ServiceError::Transport(
            "connection closed mid-response".to_string(),
        ));
    }

    serde_json::from_str(&line)
        .map_err(|e| ServiceError::InvalidResponse(format!("malformed response: {e}")))
}

fn decode_result<T: serde::de::DeserializeOwned>(result: Value) -> Result<T, ServiceError> {
    serde_json::from_value(result).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}

impl GroupService for RpcGroupService {
    fn join(&self, link: &GroupInviteLink) -> Result<JoinCallResult, ServiceError> {
        let params = serde_json::json!({
            "group_id": link.group_id().to_base64(),
            "link_version": link.version().number(),
            "join_secret": URL_SAFE_NO_PAD.encode(link.join_secret().as_bytes()),
        });
        let result = self.call(METHOD_JOIN, params, link.group_id())?;
        decode_result(result)
    }

    fn fetch_group_state(&self, group_id: &GroupId) -> Result<GroupState, ServiceError> {
        let params = serde_json::json!({ "group_id": group_id.to_base64() });
        let result = self.call(METHOD_GET_STATE, params, group_id)?;
        decode_result(result)
    }
}
