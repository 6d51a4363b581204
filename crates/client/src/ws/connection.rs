//! Managed WebSocket connection with bounded auto-reconnect.
//!
//! One [`WsConnection`] owns one actor task, which owns at most one live
//! socket. All transitions happen inside the actor; callers interact through
//! commands, the outbound send handle, the state watch channel, and the event
//! stream.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tradeline_shared::{ClientCommand, ServerEvent, WsEnvelope};

use super::config::ConnectionConfig;
use super::state::{ConnectionState, RetryDecision, CLOSE_NORMAL, CLOSE_POLICY};
use super::transport::{Frame, Socket, Transport, TungsteniteTransport};
use crate::{log_debug, log_error, log_info, log_warn};

/// Terminal and transient connection failures surfaced to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
    /// Close code 1008: the server rejected the credentials embedded in the
    /// connection URL. Re-authentication is required; no reconnect happens.
    #[error("server rejected realtime credentials: {reason}")]
    AuthRejected { reason: String },
    /// The attempt budget is spent. `connect()` may be called manually, but
    /// the budget stays spent until `disconnect()` resets it.
    #[error("reconnect budget exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// A parsed inbound frame, stamped on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub envelope: WsEnvelope<ServerEvent>,
    pub received_at: DateTime<Utc>,
}

/// Lifecycle and message events, delivered in transport order.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    Connected,
    Disconnected { code: u16, reason: String },
    Message(InboundMessage),
    Error(ConnectionError),
}

enum Command {
    Connect,
    Disconnect,
}

/// Handle for sending commands through a connection.
///
/// `send` transmits only while the connection is `Connected`; there is no
/// outbound queue. A `false` return means the message was not handed to the
/// socket and the caller must retry or buffer itself.
#[derive(Clone)]
pub struct WsHandle {
    outbound: UnboundedSender<WsEnvelope<ClientCommand>>,
    state: watch::Receiver<ConnectionState>,
}

impl WsHandle {
    pub fn send(&self, command: ClientCommand) -> bool {
        self.send_envelope(WsEnvelope::new(command))
    }

    /// Send a command with a correlation ID for tracking responses
    pub fn send_with_correlation(&self, command: ClientCommand, correlation_id: String) -> bool {
        self.send_envelope(WsEnvelope::new(command).with_correlation(correlation_id))
    }

    /// Subscribe to a negotiation thread
    pub fn subscribe_thread(&self, thread_id: &str) -> bool {
        self.send(ClientCommand::Subscribe {
            thread_id: thread_id.to_string(),
        })
    }

    /// Unsubscribe from a negotiation thread
    pub fn unsubscribe_thread(&self, thread_id: &str) -> bool {
        self.send(ClientCommand::Unsubscribe {
            thread_id: thread_id.to_string(),
        })
    }

    /// Send a message to a negotiation thread
    pub fn send_thread_message(&self, thread_id: &str, body: &str, nonce: &str) -> bool {
        self.send(ClientCommand::MessageCreate {
            thread_id: thread_id.to_string(),
            body: body.to_string(),
            nonce: nonce.to_string(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    fn send_envelope(&self, envelope: WsEnvelope<ClientCommand>) -> bool {
        if !self.state.borrow().status.is_connected() {
            return false;
        }
        self.outbound.unbounded_send(envelope).is_ok()
    }
}

/// A managed connection to the marketplace realtime endpoint.
///
/// Construct one per signed-in identity; when the identity changes,
/// `disconnect()` and drop this instance, then build a new one. Dropping the
/// instance tears down the socket and any pending reconnect timer.
pub struct WsConnection {
    config: ConnectionConfig,
    commands: UnboundedSender<Command>,
    outbound: UnboundedSender<WsEnvelope<ClientCommand>>,
    state_rx: watch::Receiver<ConnectionState>,
    events: Mutex<Option<UnboundedReceiver<WsEvent>>>,
    task: JoinHandle<()>,
}

impl WsConnection {
    /// Create a connection over the production transport. Requires a running
    /// tokio runtime. The connection starts `Disconnected`; call [`connect`].
    ///
    /// [`connect`]: WsConnection::connect
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_transport(config, TungsteniteTransport)
    }

    /// Create a connection over a caller-supplied transport.
    pub fn with_transport(config: ConnectionConfig, transport: impl Transport) -> Self {
        let (commands_tx, commands_rx) = unbounded();
        let (outbound_tx, outbound_rx) = unbounded();
        let (events_tx, events_rx) = unbounded();
        let (state_tx, state_rx) = watch::channel(ConnectionState::new());

        let task = tokio::spawn(run_connection(
            config.clone(),
            Box::new(transport),
            commands_rx,
            outbound_rx,
            events_tx,
            state_tx,
        ));

        Self {
            config,
            commands: commands_tx,
            outbound: outbound_tx,
            state_rx,
            events: Mutex::new(Some(events_rx)),
            task,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Ask the actor to open the socket. Idempotent: a no-op while a connect
    /// is in flight or established.
    pub fn connect(&self) {
        let _ = self.commands.unbounded_send(Command::Connect);
    }

    /// Close the socket with a normal-closure code, cancel any pending
    /// reconnect, and reset the attempt budget. Safe to call when already
    /// disconnected.
    pub fn disconnect(&self) {
        let _ = self.commands.unbounded_send(Command::Disconnect);
    }

    /// Send a command if currently connected. See [`WsHandle::send`].
    pub fn send(&self, command: ClientCommand) -> bool {
        self.handle().send(command)
    }

    /// Get a clonable handle for sending commands
    pub fn handle(&self) -> WsHandle {
        WsHandle {
            outbound: self.outbound.clone(),
            state: self.state_rx.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Take the event stream. Subscribe once and keep the receiver for the
    /// lifetime of the connection; returns `None` on subsequent calls.
    pub fn events(&self) -> Option<UnboundedReceiver<WsEvent>> {
        self.events.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        let _ = self.commands.unbounded_send(Command::Disconnect);
        self.task.abort();
    }
}

/// How one connected socket ended.
enum LinkEnd {
    /// Explicit `disconnect()`.
    Stopped,
    /// Owner dropped; the actor shuts down.
    Gone,
    Closed { code: u16, reason: String },
    Broken { detail: String },
}

/// The connection actor. Commands are polled first in every select so a
/// `disconnect()` always wins over a pending reconnect timer or inbound
/// traffic.
async fn run_connection(
    config: ConnectionConfig,
    transport: Box<dyn Transport>,
    mut commands: UnboundedReceiver<Command>,
    mut outbound: UnboundedReceiver<WsEnvelope<ClientCommand>>,
    events: UnboundedSender<WsEvent>,
    state: watch::Sender<ConnectionState>,
) {
    'idle: loop {
        // Wait for the caller to ask for a connection. Sends racing a close
        // are discarded here, not queued.
        let cmd = tokio::select! {
            biased;
            cmd = commands.next() => cmd,
            env = outbound.next() => match env {
                Some(envelope) => {
                    log_debug!("discarding outbound frame {} while not connected", envelope.id);
                    continue 'idle;
                }
                None => return,
            },
        };
        match cmd {
            None => return,
            Some(Command::Disconnect) => {
                state.send_modify(|s| s.mark_disconnected());
                continue 'idle;
            }
            Some(Command::Connect) => {}
        }

        let mut allowed = false;
        state.send_modify(|s| allowed = s.begin_connect());
        if !allowed {
            continue 'idle;
        }

        // Connect-and-retry loop for one logical session.
        'session: loop {
            log_info!("connecting to {}", config.endpoint_url);
            let connect_fut = transport.connect(&config.endpoint_url);
            tokio::pin!(connect_fut);
            let result = loop {
                tokio::select! {
                    biased;
                    cmd = commands.next() => match cmd {
                        Some(Command::Connect) => {} // already connecting
                        Some(Command::Disconnect) | None => {
                            state.send_modify(|s| s.mark_disconnected());
                            continue 'idle;
                        }
                    },
                    res = &mut connect_fut => break res,
                }
            };

            let failure = match result {
                Ok(mut socket) => {
                    state.send_modify(|s| s.mark_connected());
                    let _ = events.unbounded_send(WsEvent::Connected);
                    log_info!("connected to {}", config.endpoint_url);

                    let end =
                        drive_socket(socket.as_mut(), &mut commands, &mut outbound, &events).await;
                    match end {
                        LinkEnd::Stopped => {
                            socket.close().await;
                            state.send_modify(|s| s.mark_disconnected());
                            let _ = events.unbounded_send(WsEvent::Disconnected {
                                code: CLOSE_NORMAL,
                                reason: "client disconnect".into(),
                            });
                            continue 'idle;
                        }
                        LinkEnd::Gone => {
                            socket.close().await;
                            return;
                        }
                        LinkEnd::Closed { code, reason } if code == CLOSE_NORMAL => {
                            log_info!("connection to {} closed cleanly", config.endpoint_url);
                            state.send_modify(|s| s.mark_closed());
                            let _ = events.unbounded_send(WsEvent::Disconnected { code, reason });
                            continue 'idle;
                        }
                        LinkEnd::Closed { code, reason } if code == CLOSE_POLICY => {
                            let err = ConnectionError::AuthRejected {
                                reason: reason.clone(),
                            };
                            state.send_modify(|s| s.mark_errored(err.to_string()));
                            let _ = events.unbounded_send(WsEvent::Disconnected { code, reason });
                            let _ = events.unbounded_send(WsEvent::Error(err));
                            continue 'idle;
                        }
                        LinkEnd::Closed { code, reason } => {
                            let _ = events.unbounded_send(WsEvent::Disconnected {
                                code,
                                reason: reason.clone(),
                            });
                            format!("closed abnormally: code {code} {reason}")
                        }
                        LinkEnd::Broken { detail } => {
                            let _ = events.unbounded_send(WsEvent::Error(
                                ConnectionError::Transport(detail.clone()),
                            ));
                            detail
                        }
                    }
                }
                Err(err) => {
                    let _ = events.unbounded_send(WsEvent::Error(ConnectionError::ConnectFailed(
                        err.to_string(),
                    )));
                    err.to_string()
                }
            };

            // Abnormal path: consume budget or give up.
            let mut verdict = RetryDecision::GiveUp;
            state.send_modify(|s| {
                verdict = s.record_failure(failure.as_str(), config.max_reconnect_attempts)
            });
            match verdict {
                RetryDecision::GiveUp => {
                    let attempts = state.borrow().attempt_count;
                    log_error!(
                        "reconnect budget exhausted for {}: {}",
                        config.endpoint_url,
                        failure
                    );
                    let _ = events
                        .unbounded_send(WsEvent::Error(ConnectionError::RetriesExhausted {
                            attempts,
                        }));
                    continue 'idle;
                }
                RetryDecision::Retry { attempt } => {
                    log_warn!(
                        "reconnecting to {} in {}ms (attempt {})",
                        config.endpoint_url,
                        config.reconnect_delay_ms,
                        attempt
                    );
                    let delay = tokio::time::sleep(config.reconnect_delay());
                    tokio::pin!(delay);
                    loop {
                        tokio::select! {
                            biased;
                            cmd = commands.next() => match cmd {
                                Some(Command::Connect) => {} // already reconnecting
                                Some(Command::Disconnect) | None => {
                                    state.send_modify(|s| s.mark_disconnected());
                                    continue 'idle;
                                }
                            },
                            _ = &mut delay => continue 'session,
                        }
                    }
                }
            }
        }
    }
}

async fn drive_socket<S: Socket + ?Sized>(
    socket: &mut S,
    commands: &mut UnboundedReceiver<Command>,
    outbound: &mut UnboundedReceiver<WsEnvelope<ClientCommand>>,
    events: &UnboundedSender<WsEvent>,
) -> LinkEnd {
    loop {
        tokio::select! {
            biased;
            cmd = commands.next() => match cmd {
                Some(Command::Connect) => {} // already connected
                Some(Command::Disconnect) => return LinkEnd::Stopped,
                None => return LinkEnd::Gone,
            },
            env = outbound.next() => match env {
                Some(envelope) => match serde_json::to_string(&envelope) {
                    Ok(json) => {
                        log_debug!("sending frame {}", envelope.id);
                        if let Err(err) = socket.send_text(json).await {
                            return LinkEnd::Broken { detail: format!("send failed: {err}") };
                        }
                    }
                    Err(err) => log_error!("serialize failed: {}", err),
                },
                None => return LinkEnd::Gone,
            },
            frame = socket.next_frame() => match frame {
                Some(Ok(Frame::Text(text))) => {
                    match serde_json::from_str::<WsEnvelope<ServerEvent>>(&text) {
                        Ok(envelope) => {
                            let _ = events.unbounded_send(WsEvent::Message(InboundMessage {
                                envelope,
                                received_at: Utc::now(),
                            }));
                        }
                        // A corrupt frame is dropped; it never tears down the link.
                        Err(err) => log_warn!("dropping malformed frame: {}", err),
                    }
                }
                Some(Ok(Frame::Close { code, reason })) => return LinkEnd::Closed { code, reason },
                Some(Err(err)) => return LinkEnd::Broken { detail: err.to_string() },
                None => return LinkEnd::Closed {
                    code: 1006,
                    reason: "connection dropped".into(),
                },
            },
        }
    }
}
