// SPDX-License-Identifier: Apache-2.0
//! The real WebSocket transport: a reconnect loop around
//! [`ConnectionStateMachine`] that drives one [`ClientSession`] per attempt,
//! following the reader/writer task split the server side uses in
//! `graphstream-server`'s own socket handler.

use crate::debounce::DEBOUNCE_INTERVAL;
use crate::queue::OutboundItem;
use crate::session::{ClientEvent, ClientSession};
use crate::state::ConnectionState;
use futures_util::{SinkExt, StreamExt};
use graphstream_graph::{Slot, Vec3};
use graphstream_proto::ControlMessage;
use rand::thread_rng;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

/// A command accepted from the caller while a connection is live.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Nudge a node toward a new position.
    Nudge {
        /// The node being nudged.
        slot: Slot,
        /// Proposed new position.
        position: Vec3,
    },
    /// Send a control-channel message as-is.
    Control(ControlMessage),
}

/// Something the caller should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNotification {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// The server sent a decoded event.
    Event(ClientEvent),
}

/// Runs the reconnect loop against `url` until the caller drops `commands`
/// or the state machine gives up after exhausting its reconnect budget.
///
/// Each connection attempt opens a fresh WebSocket, replays the session's
/// handshake (`requestInitialData`), and forwards traffic both ways until
/// the socket closes, at which point the loop waits out the computed
/// backoff and tries again.
pub async fn run(
    url: String,
    mut commands: mpsc::Receiver<ClientCommand>,
    notifications: mpsc::Sender<ClientNotification>,
) {
    let mut session = ClientSession::new();
    let mut rng = thread_rng();

    loop {
        session.state_machine_mut().begin_connecting();
        let _ = notifications
            .send(ClientNotification::StateChanged(session.state()))
            .await;

        match tokio_tungstenite::connect_async(&url).await {
            Ok((stream, _response)) => {
                session.state_machine_mut().mark_connected();
                let _ = notifications
                    .send(ClientNotification::StateChanged(session.state()))
                    .await;
                info!(url, "connected");

                run_connection(stream, &mut session, &mut commands, &notifications).await;
            }
            Err(err) => {
                warn!(url, error = %err, "connect attempt failed");
            }
        }

        let Some(backoff) = session.state_machine_mut().report_disconnect(&mut rng) else {
            let _ = notifications
                .send(ClientNotification::StateChanged(session.state()))
                .await;
            info!("reconnect budget exhausted; giving up");
            return;
        };
        let _ = notifications
            .send(ClientNotification::StateChanged(session.state()))
            .await;
        debug!(backoff_ms = backoff.as_millis(), "waiting to reconnect");
        tokio::time::sleep(backoff).await;
    }
}

async fn run_connection(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    session: &mut ClientSession,
    commands: &mut mpsc::Receiver<ClientCommand>,
    notifications: &mpsc::Sender<ClientNotification>,
) {
    let (mut sink, mut stream) = stream.split();

    let request = ControlMessage::RequestInitialData;
    if let Ok(text) = request.to_text() {
        let _ = sink.send(WsMessage::Text(text.into())).await;
    }

    let mut debounce_tick = interval(DEBOUNCE_INTERVAL);
    debounce_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            maybe_command = commands.recv() => {
                match maybe_command {
                    Some(ClientCommand::Nudge { slot, position }) => session.nudge(slot, position),
                    Some(ClientCommand::Control(message)) => session.send_control(message),
                    None => {
                        session.state_machine_mut().close();
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return;
                    }
                }
            }

            _ = debounce_tick.tick() => {
                session.flush_debounce();
            }

            maybe_message = stream.next() => {
                match maybe_message {
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        if session.state() != ConnectionState::Ready {
                            debug!("discarding binary frame received before connection_established");
                        } else {
                            match ClientSession::handle_binary(&bytes) {
                                Ok(event) => {
                                    let _ = notifications
                                        .send(ClientNotification::Event(event))
                                        .await;
                                }
                                Err(err) => warn!(error = %err, "dropping malformed binary frame"),
                            }
                        }
                    }
                    Some(Ok(WsMessage::Text(text))) => {
                        match session.handle_text(&text) {
                            Ok(event) => {
                                let _ = notifications
                                    .send(ClientNotification::StateChanged(session.state()))
                                    .await;
                                let _ = notifications
                                    .send(ClientNotification::Event(event))
                                    .await;
                            }
                            Err(err) => warn!(error = %err, "dropping malformed control message"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("server closed the connection");
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "transport error; reconnecting");
                        return;
                    }
                }
            }
        }

        while let Some(item) = session.poll_outbound(Instant::now()) {
            let message = match item {
                OutboundItem::Nudge { slot, position } => {
                    let frame = graphstream_proto::encode_record_frame(&[graphstream_proto::NodeRecord {
                        slot,
                        position,
                        velocity: Vec3::new(0.0, 0.0, 0.0),
                    }]);
                    WsMessage::Binary(frame.into())
                }
                OutboundItem::Control(control) => match control.to_text() {
                    Ok(text) => WsMessage::Text(text.into()),
                    Err(err) => {
                        warn!(error = %err, "dropping unserializable control message");
                        continue;
                    }
                },
            };
            if sink.send(message).await.is_err() {
                warn!("write failed; reconnecting");
                return;
            }
        }
    }
}
