//! Integration test support for the Tessera join flow.
//!
//! Provides [`TestDaemon`], a JSON-RPC group service daemon backed by an
//! in-memory [`GroupDirectory`], so the whole path from invite URI through
//! the socket client to stored group state can be exercised in one process.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p tessera-integration-tests
//! ```

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use tessera_invite::{GroupInviteLink, JoinSecret, LinkVersion};
use tessera_join::memory::{GroupDirectory, MemoryGroupService};
use tessera_join::rpc::{codes, RpcError, RpcRequest, RpcResponse, METHOD_GET_STATE, METHOD_JOIN};
use tessera_join::{GroupService, ServiceError};
use tessera_types::{GroupId, Identity};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Build an identity, panicking on invalid test input.
pub fn identity(name: &str) -> Identity {
    Identity::new(name).expect("valid test identity")
}

/// Build a group id filled with `seed`.
pub fn group_id(seed: u8) -> GroupId {
    GroupId::from_bytes([seed; 32])
}

/// A daemon serving one account's session over a Unix socket.
///
/// Stops and removes its socket when dropped.
pub struct TestDaemon {
    socket_path: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TestDaemon {
    /// Start serving `session` on `socket_path`.
    ///
    /// Requests for `drop_method` are read and then the connection is
    /// closed without a reply, simulating a daemon that dies mid-call.
    pub fn start(
        session: MemoryGroupService,
        socket_path: &Path,
        drop_method: Option<&'static str>,
    ) -> Self {
        let listener =
            std::os::unix::net::UnixListener::bind(socket_path).expect("bind daemon socket");
        listener
            .set_nonblocking(true)
            .expect("nonblocking daemon socket");
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("daemon runtime");
            runtime.block_on(serve(session, listener, drop_method, shutdown_rx));
        });

        Self {
            socket_path: socket_path.to_path_buf(),
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn serve(
    session: MemoryGroupService,
    listener: std::os::unix::net::UnixListener,
    drop_method: Option<&'static str>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let listener = UnixListener::from_std(listener).expect("tokio listener");
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    if let Err(e) = handle_connection(&session, stream, drop_method).await {
                        warn!("connection error: {}", e);
                    }
                }
                Err(e) => warn!("accept error: {}", e),
            },
            _ = &mut shutdown => break,
        }
    }
}

async fn handle_connection(
    session: &MemoryGroupService,
    stream: UnixStream,
    drop_method: Option<&'static str>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => {
                if drop_method == Some(request.method.as_str()) {
                    debug!(method = %request.method, "dropping connection");
                    return Ok(());
                }
                dispatch(session, request)
            }
            Err(_) => error_response(Value::Null, -32700, "PARSE_ERROR", None),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

fn dispatch(session: &MemoryGroupService, request: RpcRequest) -> RpcResponse {
    let id = Value::from(request.id);
    let result = match request.method.as_str() {
        METHOD_JOIN => link_from_params(&request.params).and_then(|link| {
            session
                .join(&link)
                .map_err(service_error)
                .and_then(|reply| to_value(&reply))
        }),
        METHOD_GET_STATE => group_from_params(&request.params).and_then(|group| {
            session
                .fetch_group_state(&group)
                .map_err(service_error)
                .and_then(|state| to_value(&state))
        }),
        other => Err(RpcError {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({ "method": other })),
        }),
    };

    match result {
        Ok(result) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        },
        Err(error) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        },
    }
}

fn error_response(id: Value, code: i32, message: &str, detail: Option<String>) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(rpc_error(code, message, detail)),
    }
}

fn rpc_error(code: i32, message: &str, detail: Option<String>) -> RpcError {
    RpcError {
        code,
        message: message.to_string(),
        data: detail.map(|d| serde_json::json!({ "detail": d })),
    }
}

fn invalid_params(detail: &str) -> RpcError {
    rpc_error(-32602, "INVALID_PARAMS", Some(detail.to_string()))
}

fn service_error(err: ServiceError) -> RpcError {
    match err {
        ServiceError::LinkNotActive(reason) => {
            rpc_error(codes::LINK_NOT_ACTIVE, "LINK_NOT_ACTIVE", Some(reason))
        }
        ServiceError::RequestRejected => {
            rpc_error(codes::JOIN_REQUEST_REJECTED, "JOIN_REQUEST_REJECTED", None)
        }
        ServiceError::GroupNotFound(_) => rpc_error(codes::GROUP_NOT_FOUND, "GROUP_NOT_FOUND", None),
        other => rpc_error(-32603, "INTERNAL_ERROR", Some(other.to_string())),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| rpc_error(-32603, "INTERNAL_ERROR", Some(e.to_string())))
}

fn group_from_params(params: &Value) -> Result<GroupId, RpcError> {
    let encoded = params
        .get("group_id")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_params("group_id required"))?;
    GroupId::from_base64(encoded).map_err(|e| invalid_params(&e.to_string()))
}

fn link_from_params(params: &Value) -> Result<GroupInviteLink, RpcError> {
    let group = group_from_params(params)?;
    let version = params
        .get("link_version")
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| invalid_params("link_version required"))?;
    let version = LinkVersion::from_number(version).map_err(|e| invalid_params(&e.to_string()))?;
    let secret = params
        .get("join_secret")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_params("join_secret required"))
        .and_then(|s| {
            URL_SAFE_NO_PAD
                .decode(s)
                .map_err(|e| invalid_params(&e.to_string()))
        })?;
    GroupInviteLink::new(version, group, JoinSecret::from_bytes(secret))
        .map_err(|e| invalid_params(&e.to_string()))
}

/// Create a group in `directory` owned by `admin` and return its link.
pub fn create_group(
    directory: &GroupDirectory,
    seed: u8,
    admin: &str,
    requires_approval: bool,
) -> GroupInviteLink {
    let link = GroupInviteLink::generate(group_id(seed));
    directory
        .create_group(&link, identity(admin), requires_approval)
        .expect("create group");
    link
}
