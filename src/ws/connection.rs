#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::Arc;

use backoff::backoff::{Backoff as _, Constant};
use bytes::Bytes;
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval, sleep, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use super::config::{Config, Endpoint};
use super::error::WsError;
use super::message::Message;
use super::state::{Action, ConnectionState, Event, Lifecycle};
use super::traits::{Handler, ReExec, Restart};
use crate::Result;
use crate::error::{Error, Kind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Live handle for one connection attempt.
///
/// Handed to [`Handler::on_connect`] and [`Handler::on_message`] so the
/// collaborator can write to the server. Every attempt gets a fresh handle; once
/// the attempt's transport is gone, [`Connection::send`] fails with
/// [`WsError::ConnectionClosed`] and nothing reaches the next transport.
#[derive(Debug, Clone)]
pub struct Connection {
    attempt: u32,
    endpoint: Arc<Endpoint>,
    sender_tx: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Attempt number this handle belongs to.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the transport behind this handle is still accepting messages.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.sender_tx.is_closed()
    }

    /// Queue a message for the server. Messages are written in the order sent.
    pub fn send<M: Into<Message>>(&self, message: M) -> Result<()> {
        self.sender_tx
            .send(message.into())
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    /// Serialize `payload` as JSON and send it as a text message.
    pub fn send_json<R: Serialize>(&self, payload: &R) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        self.send(json)
    }
}

/// Keeps one WebSocket channel alive for as long as the process runs.
///
/// The manager connects as soon as it is constructed, calls the [`Handler`] for
/// each established connection and each inbound message, and on any transport
/// failure waits the configured fixed delay before either reconnecting or, with
/// `reload_on_disconnect`, invoking the [`Restart`] capability.
///
/// Transport errors never reach the caller. They are logged and always lead to
/// the same recovery path.
///
/// # Example
///
/// ```ignore
/// let config = Config::for_origin("http://localhost:8080")?;
/// let manager = ConnectionManager::new(config, LoggingHandler);
///
/// let mut states = manager.state_receiver();
/// while states.changed().await.is_ok() {
///     println!("state: {}", *states.borrow());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    /// Endpoint every attempt connects to
    endpoint: Arc<Endpoint>,
    /// Watch channel receiver for state changes (for use in checking the current state)
    state_rx: watch::Receiver<ConnectionState>,
    /// Cancels the manager task
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop.
    ///
    /// Loss of connectivity with `reload_on_disconnect` set re-executes the current
    /// process; use [`ConnectionManager::with_restart`] to choose otherwise.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<H: Handler>(config: Config, handler: H) -> Self {
        Self::with_restart(config, handler, ReExec)
    }

    /// Create a new connection manager with an explicit restart capability.
    pub fn with_restart<H: Handler, R: Restart>(config: Config, handler: H, restart: R) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let shutdown = CancellationToken::new();
        let endpoint = Arc::new(config.endpoint.clone());

        let driver = Driver {
            lifecycle: Lifecycle::new(config.reload_on_disconnect),
            endpoint: Arc::clone(&endpoint),
            config,
            handler,
            restart,
            state_tx,
            shutdown: shutdown.clone(),
        };

        tokio::spawn(driver.run());

        Self {
            endpoint,
            state_rx,
            shutdown,
        }
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    ///
    /// Returns a receiver that notifies on every lifecycle transition.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Stop the manager.
    ///
    /// Any live transport is closed, no further callbacks fire and the state
    /// settles on [`ConnectionState::Idle`]. A manager that already requested a
    /// restart stays in [`ConnectionState::Reloading`]. Affects every clone.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Owns the lifecycle, the transport and the handler inside the manager task.
struct Driver<H, R> {
    lifecycle: Lifecycle,
    endpoint: Arc<Endpoint>,
    config: Config,
    handler: H,
    restart: R,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl<H: Handler, R: Restart> Driver<H, R> {
    /// Main connection loop with automatic reconnection.
    async fn run(mut self) {
        let mut delay: Constant = self.config.reconnect.clone().into();
        let mut next = self.apply(Event::Start);

        while let Some(action) = next {
            next = match action {
                Action::Open { attempt } => self.open(attempt).await,
                Action::ArmTimer => self.wait(&mut delay).await,
                Action::Restart => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(endpoint = %self.endpoint, "Channel lost, restarting application");
                    self.restart.restart();
                    None
                }
                Action::Stop => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(endpoint = %self.endpoint, "Connection manager stopped");
                    None
                }
                unexpected @ (Action::NotifyConnect | Action::Dispatch) => {
                    self.halt(Some(unexpected))
                }
            };
        }
    }

    /// Feed `event` to the lifecycle and publish the resulting state.
    fn apply(&mut self, event: Event) -> Option<Action> {
        let action = self.lifecycle.apply(event);
        let state = self.lifecycle.state();

        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        action
    }

    /// Stop the task after the lifecycle handed back an action the driver cannot
    /// perform at this point, so the published state settles on `Idle`.
    fn halt(&mut self, unexpected: Option<Action>) -> Option<Action> {
        #[cfg(feature = "tracing")]
        tracing::error!(
            ?unexpected,
            state = %self.lifecycle.state(),
            "Lifecycle out of step with the transport, stopping"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = unexpected;

        self.shutdown.cancel();
        self.apply(Event::Shutdown)
    }

    /// Open the transport for `attempt` and serve it until it goes away.
    async fn open(&mut self, attempt: u32) -> Option<Action> {
        #[cfg(feature = "tracing")]
        tracing::info!(attempt, "connecting to {}", self.endpoint);

        let connect_timeout = self.config.reconnect.connect_timeout;
        let connected = tokio::select! {
            biased;

            () = self.shutdown.cancelled() => return self.apply(Event::Shutdown),
            result = timeout(connect_timeout, connect_async(self.endpoint.as_str())) => result,
        };

        let ws_stream = match connected {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => return self.fail(attempt, WsError::Connection(e)),
            Err(_elapsed) => {
                return self.fail(attempt, WsError::HandshakeTimeout(connect_timeout));
            }
        };

        match self.apply(Event::Opened) {
            Some(Action::NotifyConnect) => {}
            unexpected => return self.halt(unexpected),
        }

        #[cfg(feature = "tracing")]
        tracing::info!(attempt, "connected to {}", self.endpoint);

        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let connection = Connection {
            attempt,
            endpoint: Arc::clone(&self.endpoint),
            sender_tx,
        };

        self.handler.on_connect(&connection);

        match self
            .handle_connection(ws_stream, sender_rx, &connection)
            .await
        {
            Ok(()) => self.apply(Event::Shutdown),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(attempt, "disconnected: {e}");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                self.apply(Event::Closed)
            }
        }
    }

    /// Record a failed attempt and move on to the reconnect delay.
    fn fail(&mut self, attempt: u32, e: WsError) -> Option<Action> {
        let error = Error::with_source(Kind::WebSocket, e);
        #[cfg(feature = "tracing")]
        tracing::warn!(attempt, "Unable to connect: {error:?}");
        #[cfg(not(feature = "tracing"))]
        let _ = (attempt, &error);

        self.apply(Event::Failed)
    }

    /// Handle an active WebSocket connection.
    ///
    /// Returns `Ok` only when shutdown was requested; every other exit is a lost
    /// transport.
    async fn handle_connection(
        &mut self,
        ws_stream: WsStream,
        mut sender_rx: mpsc::UnboundedReceiver<Message>,
        connection: &Connection,
    ) -> Result<()> {
        let (mut write, mut read) = ws_stream.split();

        let heartbeat_timeout = self.config.heartbeat.as_ref().map(|h| h.timeout);
        let mut ping_interval = self.config.heartbeat.as_ref().map(|h| {
            let mut ticker = interval(h.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut pong_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    _ = write.send(WsFrame::Close(None)).await;
                    return Ok(());
                }

                // Handle incoming messages
                frame = read.next() => {
                    match frame {
                        Some(Ok(WsFrame::Pong(_))) => {
                            pong_deadline = None;
                        }
                        Some(Ok(WsFrame::Close(_))) | None => {
                            return Err(WsError::ConnectionClosed.into());
                        }
                        Some(Ok(frame)) => {
                            let Some(message) = Message::from_frame(frame) else {
                                continue;
                            };

                            #[cfg(feature = "tracing")]
                            tracing::trace!(len = message.len(), "Received WebSocket message");

                            if self.lifecycle.apply(Event::Inbound) == Some(Action::Dispatch) {
                                self.handler.on_message(message, connection);
                            }
                        }
                        Some(Err(e)) => {
                            return Err(WsError::Connection(e).into());
                        }
                    }
                }

                // Handle outgoing messages from the connection handle
                Some(message) = sender_rx.recv() => {
                    write.send(message.into_frame()).await?;
                }

                // The outstanding PING went unanswered
                () = deadline(pong_deadline) => {
                    let limit = heartbeat_timeout.unwrap_or_default();
                    return Err(WsError::HeartbeatTimeout(limit).into());
                }

                // Send PING frames, one outstanding at a time
                () = next_ping(ping_interval.as_mut()) => {
                    if pong_deadline.is_none() {
                        write.send(WsFrame::Ping(Bytes::new())).await?;
                        pong_deadline = heartbeat_timeout.map(|limit| Instant::now() + limit);
                    }
                }
            }
        }
    }

    /// Run the fixed reconnect delay.
    async fn wait(&mut self, delay: &mut Constant) -> Option<Action> {
        let duration = delay
            .next_backoff()
            .unwrap_or(self.config.reconnect.delay);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            reload = self.lifecycle.reload_on_disconnect(),
            "retrying in {duration:?}"
        );

        tokio::select! {
            biased;

            () = self.shutdown.cancelled() => self.apply(Event::Shutdown),
            () = sleep(duration) => self.apply(Event::TimerFired),
        }
    }
}

/// Resolves on the next heartbeat tick, or never when heartbeats are disabled.
async fn next_ping(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves once `at` has passed, or never when nothing is outstanding.
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
