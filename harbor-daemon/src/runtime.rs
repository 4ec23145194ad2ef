use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use harbor_core::config::{self, LogFormat};
use harbor_core::paths::{run_dir, socket_path, transition_locks_dir};
use harbor_core::store::INDEX_KEY;
use harbor_core::{BerthRegistry, HarborConfig, StoreError, VesselRegistry};
use harbor_workflow::{
    blocking, reconcile, AllocationCoordinator, BerthPort, Command, TransitionLocks, VesselPort,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use crate::error::{io_err, DaemonError};
use crate::protocol::{DaemonRequest, DaemonResponse, ErrorBody};

/// Everything a request handler needs. Shared by every client connection.
pub struct DaemonState {
    coordinator: AllocationCoordinator<VesselRegistry, BerthRegistry>,
    config: HarborConfig,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
}

impl DaemonState {
    pub fn new(
        vessels: VesselRegistry,
        berths: BerthRegistry,
        config: HarborConfig,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let coordinator =
            AllocationCoordinator::new(vessels, berths).with_call_timeout(config.call_timeout());
        Self {
            coordinator,
            config,
            shutdown_tx,
            started_at_unix: unix_seconds_now(),
        }
    }

    /// File-backed registries under `home`, with transition locks shared by
    /// every process on the same home.
    pub fn open_at(home: &Path, config: HarborConfig, shutdown_tx: broadcast::Sender<()>) -> Self {
        let mut state = Self::new(
            VesselRegistry::open_at(home),
            BerthRegistry::open_at(home),
            config,
            shutdown_tx,
        );
        state.coordinator = state
            .coordinator
            .with_locks(TransitionLocks::across_processes(transition_locks_dir(home)));
        state
    }

    pub fn coordinator(&self) -> &AllocationCoordinator<VesselRegistry, BerthRegistry> {
        &self.coordinator
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    let config = config::load_at(home)?;
    init_tracing(config.log_format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon until a `stop` request or ctrl-c.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    let config = config::load_at(&home)?;

    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    let state = DaemonState::open_at(&home, config, shutdown_tx.clone());
    state.coordinator.vessels().provision()?;
    state.coordinator.berths().provision()?;
    let state = Arc::new(state);
    tracing::info!(
        home = %home.display(),
        call_timeout_ms = state.config.call_timeout().as_millis() as u64,
        "daemon starting"
    );

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(home, state, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    state: Arc<DaemonState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(stream: UnixStream, state: Arc<DaemonState>) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                let body = ErrorBody::new("invalid_request", format!("invalid request JSON: {err}"));
                write_response(&mut writer, &DaemonResponse::error(body)).await?;
                continue;
            }
        };

        let stop = request == DaemonRequest::Stop;
        let response = dispatch(&state, request).await;
        write_response(&mut writer, &response).await?;
        if stop {
            break;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Request dispatch
// ---------------------------------------------------------------------------

/// Serve one request. Never fails: every error becomes an error response.
pub async fn dispatch(state: &DaemonState, request: DaemonRequest) -> DaemonResponse {
    let coordinator = &state.coordinator;
    match request {
        DaemonRequest::Status => status_payload(state).await,
        DaemonRequest::Stop => {
            let _ = state.shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        DaemonRequest::RequestAllocation { vessel_id } => {
            allocation(coordinator.apply(&vessel_id, &Command::Request).await)
        }
        DaemonRequest::ApproveAllocation {
            vessel_id,
            approver_id,
        } => allocation(
            coordinator
                .apply(&vessel_id, &Command::Approve(approver_id))
                .await,
        ),
        DaemonRequest::RejectAllocation {
            vessel_id,
            approver_id,
        } => allocation(
            coordinator
                .apply(&vessel_id, &Command::Reject(approver_id))
                .await,
        ),
        DaemonRequest::CancelAllocation { vessel_id } => {
            allocation(coordinator.apply(&vessel_id, &Command::Cancel).await)
        }
        DaemonRequest::GetVessel { vessel_id } => {
            stored(coordinator.vessels().get_vessel(&vessel_id).await)
        }
        DaemonRequest::GetBerth { vessel_id } => {
            stored(coordinator.berths().get_berth(&vessel_id).await)
        }
        DaemonRequest::ListVessels => {
            let vessels = coordinator.vessels().clone();
            stored(blocking(INDEX_KEY, move || vessels.list_all()).await)
        }
        DaemonRequest::ListBerths => {
            let berths = coordinator.berths().clone();
            stored(blocking(INDEX_KEY, move || berths.list_all()).await)
        }
        DaemonRequest::Divergent => {
            let vessels = coordinator.vessels().clone();
            let berths = coordinator.berths().clone();
            stored(
                blocking(INDEX_KEY, move || reconcile::find_divergent(&vessels, &berths)).await,
            )
        }
        DaemonRequest::Repair { vessel_id } => match coordinator.repair(&vessel_id).await {
            Ok(snapshot) => DaemonResponse::ok(json!(snapshot)),
            Err(err) => DaemonResponse::error(&err),
        },
    }
}

fn allocation(
    result: Result<harbor_workflow::Allocation, harbor_workflow::WorkflowError>,
) -> DaemonResponse {
    match result {
        Ok(allocation) => DaemonResponse::ok(json!(allocation)),
        Err(err) => DaemonResponse::error(&err),
    }
}

fn stored<T: serde::Serialize>(result: Result<T, StoreError>) -> DaemonResponse {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(data) => DaemonResponse::ok(data),
            Err(err) => DaemonResponse::error(ErrorBody::new("encode", err.to_string())),
        },
        Err(err) => DaemonResponse::error(&err),
    }
}

async fn status_payload(state: &DaemonState) -> DaemonResponse {
    let vessels = state.coordinator.vessels().clone();
    let berths = state.coordinator.berths().clone();
    let counts = blocking(INDEX_KEY, move || {
        Ok((vessels.store().len()?, berths.store().len()?))
    })
    .await;
    let (vessel_count, berth_count): (Value, Value) = match counts {
        Ok((v, b)) => (json!(v), json!(b)),
        Err(err) => {
            tracing::warn!(error = %err, "status: could not count records");
            (Value::Null, Value::Null)
        }
    };

    let now = unix_seconds_now();
    DaemonResponse::ok(json!({
        "running": true,
        "pid": std::process::id(),
        "started_at_unix": state.started_at_unix,
        "uptime_secs": now.saturating_sub(state.started_at_unix),
        "vessels": vessel_count,
        "berths": berth_count,
        "transitions_in_flight": state.coordinator.locks().in_use(),
        "call_timeout_ms": state.config.call_timeout().as_millis() as u64,
        "log_format": state.config.log_format.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match format {
        LogFormat::Compact => fmt().with_env_filter(filter).with_target(false).try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
