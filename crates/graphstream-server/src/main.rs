// SPDX-License-Identifier: Apache-2.0
//! WebSocket server for the graph streaming engine.
//!
//! One task pair (reader/writer) per connection, per `spec.md` §5's
//! reader/writer split; the simulation itself lives in a single task
//! driven by `graphstream-sim`, reached only through [`SimCommand`] so no
//! session ever locks the graph directly. Binary position frames and the
//! JSON control channel share the one socket, exactly as the wire format
//! describes it.

mod error;
mod metrics;
mod session;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::ws::{Message, WebSocket},
    extract::{ConnectInfo, State, WebSocketUpgrade},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use error::SessionError;
use futures_util::{SinkExt, StreamExt};
use graphstream_config::config::ConfigService;
use graphstream_config::settings::EngineSettings;
use graphstream_config_fs::FsConfigStore;
use graphstream_graph::{Edge, ExternalId, GraphSnapshot, Slot};
use graphstream_proto::{
    compress_frame, decode_record_frame, decompress_frame, encode_record_frame, ControlMessage,
    NodeRecord,
};
use graphstream_sim::{SimCommand, SimulationEngine};
use metrics::ServerMetrics;
use serde_json::Value;
use session::{SessionCommand, SessionState, DEFAULT_QUEUE_CAPACITY};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Consecutive broadcast-lag events on one session's snapshot stream
/// tolerated before the session is closed as unrecoverable, the server's
/// side of `spec.md` §4.8's "one slow session cannot starve any other".
const CONSECUTIVE_LAG_CLOSE_THRESHOLD: u32 = 20;

/// Edge weight used for the `--seed-nodes` ring.
const SEED_EDGE_WEIGHT: f32 = 1.0;

/// Config key the engine settings are stored under.
const SETTINGS_KEY: &str = "engine";

/// Fallback compression threshold for the broadcast path; session-specific
/// overrides apply only to the `requestInitialData` one-shot reply. See
/// `DESIGN.md` for why the broadcast path doesn't track a live per-session
/// override.
const DEFAULT_COMPRESSION_THRESHOLD_FALLBACK: usize = graphstream_proto::DEFAULT_COMPRESSION_THRESHOLD;

#[derive(Parser, Debug)]
#[command(author, version, about = "Graph streaming engine WebSocket server")]
struct Args {
    /// TCP listener for clients (e.g. 0.0.0.0:8787).
    #[arg(long, default_value = "0.0.0.0:8787")]
    listen: SocketAddr,
    /// Overrides the platform config directory the settings store would
    /// otherwise resolve.
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// TLS certificate (PEM). If provided, `--tls-key` must be too.
    #[arg(long)]
    tls_cert: Option<PathBuf>,
    /// TLS private key (PEM). If provided, `--tls-cert` must be too.
    #[arg(long)]
    tls_key: Option<PathBuf>,
    /// Synthesizes this many demo nodes (numeric external ids, so identity
    /// promotion gives them slots `0..N`) wired into a ring and starts the
    /// simulation running, for exercising the server without a real
    /// ingestion collaborator.
    #[arg(long, default_value_t = 0)]
    seed_nodes: u32,
}

#[derive(Clone)]
struct AppState {
    sim_commands: mpsc::Sender<SimCommand>,
    snapshots: broadcast::Sender<Arc<GraphSnapshot>>,
    control: broadcast::Sender<ControlMessage>,
    settings: Arc<Mutex<EngineSettings>>,
    started_at_unix_ms: u64,
    start_instant: Instant,
    metrics: Arc<Mutex<ServerMetrics>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let settings = load_settings(args.config_dir.clone())?;

    let mut engine = SimulationEngine::new(settings.physics, settings.simulation.randomize_radius);
    if args.seed_nodes > 0 {
        seed_demo_graph(&mut engine, args.seed_nodes);
        engine.set_running(true);
    }

    let (sim_tx, sim_rx) = mpsc::channel(256);
    let (snap_tx, _snap_rx) = broadcast::channel(graphstream_sim::DEFAULT_SNAPSHOT_CAPACITY);
    let (control_tx, _control_rx) = broadcast::channel(64);

    tokio::spawn(graphstream_sim::run(
        engine,
        sim_rx,
        snap_tx.clone(),
        settings.simulation.update_rate_hz,
    ));

    let started_at_unix_ms = unix_ms_now();

    let state = Arc::new(AppState {
        sim_commands: sim_tx,
        snapshots: snap_tx,
        control: control_tx,
        settings: Arc::new(Mutex::new(settings)),
        started_at_unix_ms,
        start_instant: Instant::now(),
        metrics: Arc::new(Mutex::new(ServerMetrics::default())),
    });

    let app = Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let handle = Handle::new();
    // graceful shutdown on Ctrl+C
    let shutdown = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
        shutdown.shutdown();
    });

    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            let tls_config = load_tls(cert, key).await.context("load tls config")?;
            info!("graphstream server listening (TLS) on {}", args.listen);
            axum_server::bind_rustls(args.listen, tls_config)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        (None, None) => {
            info!("graphstream server listening on {}", args.listen);
            axum_server::bind(args.listen)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        _ => {
            return Err(anyhow!(
                "must provide both --tls-cert and --tls-key or neither"
            ))
        }
    }

    Ok(())
}

/// Loads engine settings from the config store, falling back to defaults
/// (with a warning) if nothing is persisted yet or the persisted value no
/// longer validates.
fn load_settings(config_dir: Option<PathBuf>) -> Result<EngineSettings> {
    let store = match config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    }
    .context("open config store")?;
    let service = ConfigService::new(store);

    let settings = match service.load::<EngineSettings>(SETTINGS_KEY) {
        Ok(Some(settings)) => settings,
        Ok(None) => EngineSettings::default(),
        Err(err) => {
            warn!(%err, "failed to load engine settings; using defaults");
            EngineSettings::default()
        }
    };

    if let Err(err) = settings.validate() {
        warn!(%err, "persisted engine settings failed validation; using defaults");
        return Ok(EngineSettings::default());
    }
    Ok(settings)
}

/// Synthesizes `count` numeric-named nodes in a ring, for `--seed-nodes`.
fn seed_demo_graph(engine: &mut SimulationEngine, count: u32) {
    let slots: Vec<Slot> = (0..count)
        .map(|i| engine.ensure_node(ExternalId::from(i.to_string())))
        .collect();
    for pair in slots.windows(2) {
        engine.add_edge(Edge::new(pair[0], pair[1], SEED_EDGE_WEIGHT));
    }
    if let (Some(&first), Some(&last)) = (slots.first(), slots.last()) {
        if slots.len() > 2 {
            engine.add_edge(Edge::new(last, first, SEED_EDGE_WEIGHT));
        }
    }
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime_ms: u64 = state
        .start_instant
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX);

    let snapshot = {
        let metrics = state.metrics.lock().await;
        metrics.snapshot(state.started_at_unix_ms, uptime_ms)
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, max-age=0"),
    );
    (headers, Json(snapshot))
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, peer: SocketAddr) {
    let queue_capacity = {
        let guard = state.settings.lock().await;
        if guard.session.max_queue_size == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            guard.session.max_queue_size
        }
    };

    let conn_id = {
        let mut metrics = state.metrics.lock().await;
        metrics.alloc_conn(peer, unix_ms_now())
    };

    let (ws_tx, mut ws_rx) = socket.split();
    let (session_tx, session_rx) = mpsc::channel::<SessionCommand>(queue_capacity);
    let snap_rx = state.snapshots.subscribe();
    let control_rx = state.control.subscribe();
    let streaming = Arc::new(AtomicBool::new(false));
    let session_state = Arc::new(Mutex::new(SessionState::Connected));

    if let Ok(text) = (ControlMessage::ConnectionEstablished {
        timestamp: i64::try_from(unix_ms_now()).unwrap_or(i64::MAX),
    }
    .to_text())
    {
        enqueue(&session_tx, &state.metrics, SessionCommand::Control(text)).await;
        *session_state.lock().await = SessionState::Ready;
    }

    let writer = tokio::spawn(run_writer(
        ws_tx,
        session_rx,
        snap_rx,
        control_rx,
        streaming.clone(),
        state.metrics.clone(),
        conn_id,
    ));

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                if *session_state.lock().await != SessionState::Ready {
                    debug!(?peer, "discarding binary frame received before READY");
                    continue;
                }
                state
                    .metrics
                    .lock()
                    .await
                    .observe_inbound(conn_id, data.len(), unix_ms_now());
                let raw = decompress_frame(&data);
                match decode_record_frame(&raw) {
                    Ok((records, report)) => {
                        if report.clamped {
                            state.metrics.lock().await.observe_clamped();
                        }
                        for record in records {
                            let cmd = SimCommand::Nudge {
                                slot: record.slot,
                                position: record.position,
                            };
                            if state.sim_commands.send(cmd).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        state.metrics.lock().await.observe_decode_error();
                        let session_err = SessionError::from(err);
                        debug!(%session_err, ?peer, "dropping malformed binary frame");
                    }
                }
            }
            Ok(Message::Text(text)) => match ControlMessage::from_text(&text) {
                Ok(control_msg) => {
                    handle_control_message(&state, &session_tx, &streaming, control_msg).await;
                }
                Err(err) => {
                    let session_err = SessionError::from(err);
                    debug!(%session_err, ?peer, "ignoring malformed control message");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(err) => {
                let session_err = SessionError::TransportClosed(err.to_string());
                debug!(%session_err, ?peer, "websocket error; ending session");
                break;
            }
        }
    }

    *session_state.lock().await = SessionState::Closed;
    drop(session_tx);
    let _ = writer.await;
    state.metrics.lock().await.remove_conn(conn_id);
}

#[allow(clippy::too_many_arguments)]
async fn run_writer(
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut session_rx: mpsc::Receiver<SessionCommand>,
    mut snap_rx: broadcast::Receiver<Arc<GraphSnapshot>>,
    mut control_rx: broadcast::Receiver<ControlMessage>,
    streaming: Arc<AtomicBool>,
    metrics: Arc<Mutex<ServerMetrics>>,
    conn_id: u64,
) {
    let mut consecutive_lag = 0u32;
    loop {
        tokio::select! {
            cmd = session_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Control(text)) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(SessionCommand::Binary(bytes)) => {
                        let len = bytes.len();
                        if ws_tx.send(Message::Binary(bytes.into())).await.is_err() {
                            break;
                        }
                        metrics.lock().await.observe_outbound(conn_id, len);
                    }
                    Some(SessionCommand::Close) | None => break,
                }
            }
            control = control_rx.recv() => {
                match control {
                    Ok(msg) => {
                        if let Ok(text) = msg.to_text() {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            snapshot = snap_rx.recv(), if streaming.load(Ordering::Relaxed) => {
                match snapshot {
                    Ok(snap) => {
                        consecutive_lag = 0;
                        let frame = encode_snapshot_frame(&snap, DEFAULT_COMPRESSION_THRESHOLD_FALLBACK);
                        let len = frame.len();
                        if ws_tx.send(Message::Binary(frame.into())).await.is_err() {
                            break;
                        }
                        metrics.lock().await.observe_outbound(conn_id, len);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        consecutive_lag += 1;
                        if consecutive_lag > CONSECUTIVE_LAG_CLOSE_THRESHOLD {
                            metrics.lock().await.observe_graceful_close();
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;
}

fn encode_snapshot_frame(snapshot: &GraphSnapshot, threshold: usize) -> Vec<u8> {
    let records: Vec<NodeRecord> = snapshot
        .entries
        .iter()
        .map(|e| NodeRecord {
            slot: e.slot,
            position: e.position,
            velocity: e.velocity,
        })
        .collect();
    compress_frame(&encode_record_frame(&records), threshold)
}

async fn handle_control_message(
    state: &Arc<AppState>,
    session_tx: &mpsc::Sender<SessionCommand>,
    streaming: &Arc<AtomicBool>,
    msg: ControlMessage,
) {
    match msg {
        ControlMessage::RequestInitialData => {
            streaming.store(true, Ordering::Relaxed);
            let (reply_tx, reply_rx) = oneshot::channel();
            if state
                .sim_commands
                .send(SimCommand::RequestSnapshot { reply: reply_tx })
                .await
                .is_err()
            {
                return;
            }
            let Ok(snapshot) = reply_rx.await else {
                return;
            };
            let threshold = state.settings.lock().await.session.compression_threshold;
            let frame = encode_snapshot_frame(&snapshot, threshold);
            enqueue(session_tx, &state.metrics, SessionCommand::Binary(frame)).await;

            if let Ok(text) = (ControlMessage::UpdatesStarted {
                timestamp: i64::try_from(unix_ms_now()).unwrap_or(i64::MAX),
            }
            .to_text())
            {
                enqueue(session_tx, &state.metrics, SessionCommand::Control(text)).await;
            }
        }
        ControlMessage::EnableRandomization { enabled } => {
            if enabled {
                let _ = state.sim_commands.send(SimCommand::RequestRandomize).await;
            }
        }
        ControlMessage::PauseSimulation { enabled } => {
            let _ = state
                .sim_commands
                .send(SimCommand::SetRunning(!enabled))
                .await;
        }
        ControlMessage::ApplyForces { .. } => {
            let _ = state.sim_commands.send(SimCommand::ApplyForcesOnce).await;
        }
        ControlMessage::SettingsUpdate {
            category,
            setting,
            value,
        } => {
            handle_settings_update(state, session_tx, category, setting, value).await;
        }
        ControlMessage::ConnectionEstablished { .. }
        | ControlMessage::Loading { .. }
        | ControlMessage::UpdatesStarted { .. }
        | ControlMessage::Settings { .. } => {
            debug!("ignoring server-originated control message type received from a client");
        }
        ControlMessage::Unknown => {
            debug!("ignoring unrecognised control message type");
        }
    }
}

async fn handle_settings_update(
    state: &Arc<AppState>,
    session_tx: &mpsc::Sender<SessionCommand>,
    category: String,
    setting: String,
    value: Value,
) {
    let mut guard = state.settings.lock().await;
    let mut candidate = *guard;
    match candidate.apply_update(&category, &setting, &value) {
        Ok(()) => {
            *guard = candidate;
            drop(guard);
            if category == "physics" {
                let (reply_tx, reply_rx) = oneshot::channel();
                if state
                    .sim_commands
                    .send(SimCommand::SetParams {
                        params: candidate.physics,
                        reply: reply_tx,
                    })
                    .await
                    .is_ok()
                {
                    if let Ok(Err(err)) = reply_rx.await {
                        warn!(%err, "simulation task rejected a value the config layer already validated");
                    }
                }
            } else if category == "simulation" && setting == "randomize_radius" {
                let _ = state
                    .sim_commands
                    .send(SimCommand::SetRandomizeRadius(candidate.simulation.randomize_radius))
                    .await;
            }
            let broadcast_msg = ControlMessage::Settings {
                category,
                setting,
                value,
            };
            let _ = state.control.send(broadcast_msg);
        }
        Err(err) => {
            let session_err = SessionError::from(err.clone());
            warn!(%session_err, category, setting, "settings_update rejected; previous value retained");
            if let Some(current) = current_value(&guard, &category, &setting) {
                if let Ok(text) = (ControlMessage::Settings {
                    category,
                    setting,
                    value: current,
                }
                .to_text())
                {
                    enqueue(session_tx, &state.metrics, SessionCommand::Control(text)).await;
                }
            }
        }
    }
}

/// Reads back the current value of `category.setting`, for re-confirming
/// it to the caller after a rejected `settings_update`.
fn current_value(settings: &EngineSettings, category: &str, setting: &str) -> Option<Value> {
    let sub = match category {
        "physics" => serde_json::to_value(settings.physics).ok()?,
        "session" => serde_json::to_value(settings.session).ok()?,
        "simulation" => serde_json::to_value(settings.simulation).ok()?,
        _ => return None,
    };
    sub.get(setting).cloned()
}

/// Non-blocking enqueue onto a session's outbound channel. A full queue
/// means the session is behind; the frame is dropped and counted rather
/// than blocking the reader task, per `spec.md` §7's `QueueSaturated`.
async fn enqueue(
    session_tx: &mpsc::Sender<SessionCommand>,
    metrics: &Arc<Mutex<ServerMetrics>>,
    cmd: SessionCommand,
) {
    if let Err(TrySendError::Full(_)) = session_tx.try_send(cmd) {
        metrics.lock().await.observe_queue_saturation();
        let err = SessionError::QueueSaturated;
        warn!(%err, "dropping outbound frame for a saturated session");
    }
}

async fn load_tls(cert_path: PathBuf, key_path: PathBuf) -> Result<RustlsConfig> {
    let cfg = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    Ok(cfg)
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
