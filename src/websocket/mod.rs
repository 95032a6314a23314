//! Notification channel for the MedCart client
//!
//! Keeps one live WebSocket connection to the server's notification
//! endpoint, hands every inbound event to a caller-supplied handler and
//! reconnects after a fixed delay whenever the connection closes.
//!
//! A background supervisor task owns both the socket and the reconnect
//! timer, so [`NotificationChannel::disconnect`] cancels whichever of the two
//! is pending. There is no backoff and no retry cap: an unreachable server is
//! retried every `reconnect_delay` until the channel is disconnected.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::models::NotificationEvent;
use crate::stores::Observable;

pub type NotificationHandler = Arc<dyn Fn(NotificationEvent) + Send + Sync>;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The live connection, as seen from outside the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub url: Url,
    /// 1 for the first successful connect, counting every attempt since `connect`.
    pub attempt: u64,
    pub connected_at: DateTime<Utc>,
}

struct Shared {
    url: Url,
    reconnect_delay: Duration,
    handler: NotificationHandler,
    connected: Observable<bool>,
    connection: Observable<Option<ConnectionInfo>>,
}

struct Supervisor {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct NotificationChannel {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<Supervisor>>,
}

/// How a single connection ended.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Closed,
    Shutdown,
}

impl NotificationChannel {
    pub fn new<F>(url: Url, reconnect_delay: Duration, handler: F) -> Self
    where
        F: Fn(NotificationEvent) + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                url,
                reconnect_delay,
                handler: Arc::new(handler),
                connected: Observable::new(false),
                connection: Observable::new(None),
            }),
            supervisor: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.get()
    }

    pub fn connection(&self) -> Option<ConnectionInfo> {
        self.shared.connection.get()
    }

    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.shared.connected.subscribe()
    }

    /// Start the supervisor. Must be called from within a Tokio runtime.
    ///
    /// Calling `connect` while a supervisor is still running does nothing.
    pub fn connect(&self) {
        let mut slot = self.supervisor.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|s| !s.task.is_finished()) {
            warn!(url = %self.shared.url, "notification channel already running");
            return;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(Arc::clone(&self.shared), shutdown_rx));
        *slot = Some(Supervisor { shutdown, task });
    }

    /// Cancel any pending reconnect, close the live connection and wait for
    /// the supervisor to finish. No reconnect happens until `connect` again.
    pub async fn disconnect(&self) {
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(Supervisor { shutdown, task }) = supervisor {
            let _ = shutdown.send(true);
            if let Err(e) = task.await {
                error!(error = %e, "notification supervisor panicked");
            }
        }
        self.shared.mark_closed();
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        let supervisor = self
            .supervisor
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(supervisor) = supervisor {
            let _ = supervisor.shutdown.send(true);
        }
    }
}

async fn supervise(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut attempt = 0u64;

    loop {
        attempt += 1;
        info!(url = %shared.url, attempt, "connecting to notifications");

        let exit = tokio::select! {
            _ = shutdown.changed() => Exit::Shutdown,
            result = connect_async(shared.url.as_str()) => match result {
                Ok((socket, _response)) => {
                    shared.mark_open(attempt);
                    shared.pump(socket, &mut shutdown).await
                }
                Err(e) => {
                    // A failed handshake counts as error followed by close.
                    warn!(error = %e, "notification connection failed");
                    shared.mark_closed();
                    Exit::Closed
                }
            },
        };

        if exit == Exit::Shutdown {
            break;
        }

        info!(delay_ms = shared.reconnect_delay.as_millis() as u64, "scheduling reconnect");
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(shared.reconnect_delay) => {}
        }
    }

    shared.mark_closed();
    debug!(url = %shared.url, "notification supervisor stopped");
}

impl Shared {
    fn mark_open(&self, attempt: u64) {
        info!(url = %self.url, "notifications connected");
        self.connection.set(Some(ConnectionInfo {
            url: self.url.clone(),
            attempt,
            connected_at: Utc::now(),
        }));
        self.connected.set(true);
    }

    fn mark_closed(&self) {
        self.connected.set(false);
        self.connection.set(None);
    }

    /// Deliver frames until the connection ends or shutdown is requested.
    async fn pump(&self, socket: Socket, shutdown: &mut watch::Receiver<bool>) -> Exit {
        let (mut sink, mut frames) = socket.split();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!(error = %e, "close frame not sent");
                    }
                    return Exit::Shutdown;
                }
                frame = frames.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.deliver(&text),
                    Some(Ok(Message::Binary(bytes))) => self.deliver(&String::from_utf8_lossy(&bytes)),
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "notifications closed by server");
                        self.mark_closed();
                        return Exit::Closed;
                    }
                    // ping/pong are answered by the transport
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "notification transport error");
                        self.mark_closed();
                        return Exit::Closed;
                    }
                    None => {
                        info!("notification stream ended");
                        self.mark_closed();
                        return Exit::Closed;
                    }
                },
            }
        }
    }

    /// Hand one frame to the handler. A panicking handler loses that event
    /// only; the connection and the reconnect loop keep running.
    fn deliver(&self, raw: &str) {
        let event = NotificationEvent::from_frame(raw);
        let event_type = event.event_type.clone();
        debug!(event_type = %event_type, cart_id = ?event.cart_id, "notification received");

        let handler = &self.handler;
        if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
            error!(event_type = %event_type, "notification handler panicked");
        }
    }
}
