//! Realtime channel lifecycle
//!
//! One WebSocket per [`Channel`], opened with the session credential in the
//! `initData` query parameter. Whatever ends the connection (close frame,
//! stream end, read/write error, local close or drop), the channel emits a
//! single [`ChannelSignal::Closed`] and its task exits. Reconnecting is not
//! the channel's job: the supervisor re-bootstraps the whole session.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;
use uuid::Uuid;

use crate::core::config::{network, ClientConfig};
use crate::core::error::{AppError, AppResult};
use crate::realtime::events::{ClientCommand, ServerEvent};
use crate::telegram::Credential;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle message delivered to whoever supervises the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSignal {
    Closed { channel_id: Uuid },
}

impl ChannelSignal {
    pub fn channel_id(&self) -> Uuid {
        match self {
            ChannelSignal::Closed { channel_id } => *channel_id,
        }
    }
}

/// Why the driver loop stopped. Logged only; the signal does not carry it.
enum CloseReason {
    Local,
    Remote,
    Ended,
    Error(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Local => f.write_str("closed locally"),
            CloseReason::Remote => f.write_str("close frame from server"),
            CloseReason::Ended => f.write_str("stream ended"),
            CloseReason::Error(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// Opens channels against the configured WebSocket endpoint.
///
/// Decoded server events from every channel it opens are fanned out to
/// [`ChannelManager::subscribe`] receivers, so subscribers survive channel
/// replacement.
#[derive(Debug, Clone)]
pub struct ChannelManager {
    base: String,
    connect_timeout: Duration,
    events: broadcast::Sender<ServerEvent>,
}

impl ChannelManager {
    pub fn new(config: &ClientConfig) -> AppResult<Self> {
        let base = Url::parse(&config.websocket_url)?;
        let (events, _) = broadcast::channel(network::EVENT_BUFFER);
        Ok(Self {
            base: base.as_str().trim_end_matches('/').to_string(),
            connect_timeout: config.connect_timeout(),
            events,
        })
    }

    /// `<base>/ws?initData=<url-encoded credential>`
    pub fn channel_url(&self, credential: &Credential) -> String {
        format!(
            "{}{}?{}={}",
            self.base,
            network::WS_PATH,
            network::WS_INIT_DATA_PARAM,
            credential.url_encoded()
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Opens exactly one connection. `on_close` receives the channel's single
    /// [`ChannelSignal::Closed`].
    pub async fn open_channel(
        &self,
        credential: &Credential,
        on_close: mpsc::UnboundedSender<ChannelSignal>,
    ) -> AppResult<Channel> {
        let url = self.channel_url(credential);
        let (socket, response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| AppError::Timeout(format!("WebSocket connect after {:?}", self.connect_timeout)))??;

        let id = Uuid::new_v4();
        tracing::info!(channel_id = %id, status = %response.status(), "Realtime channel open");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (open_tx, open_rx) = watch::channel(true);

        let driver = Driver {
            id,
            close_timeout: self.connect_timeout,
            events: self.events.clone(),
            on_close,
            open: open_tx,
        };
        let task = tokio::spawn(driver.run(socket, outbound_rx, shutdown_rx));

        Ok(Channel {
            id,
            outbound: outbound_tx,
            open: open_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Handle to one open realtime connection.
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct Channel {
    id: Uuid,
    outbound: mpsc::UnboundedSender<WsMessage>,
    open: watch::Receiver<bool>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Channel {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Queues a command for the server.
    pub fn send(&self, command: &ClientCommand) -> AppResult<()> {
        if !self.is_open() {
            return Err(AppError::ChannelGone(self.id));
        }
        let text = command.encode()?;
        self.outbound
            .send(WsMessage::Text(text))
            .map_err(|_| AppError::ChannelGone(self.id))
    }

    /// Resolves once the connection is gone, for whatever reason.
    pub async fn closed(&self) {
        let mut open = self.open.clone();
        let _ = open.wait_for(|is_open| !*is_open).await;
    }

    /// Closes the connection and waits for the driver task to finish.
    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(channel_id = %self.id, "Channel task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

struct Driver {
    id: Uuid,
    close_timeout: Duration,
    events: broadcast::Sender<ServerEvent>,
    on_close: mpsc::UnboundedSender<ChannelSignal>,
    open: watch::Sender<bool>,
}

impl Driver {
    async fn run(
        self,
        socket: Socket,
        mut outbound: mpsc::UnboundedReceiver<WsMessage>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let (mut write, mut read) = socket.split();

        let reason = loop {
            tokio::select! {
                // Fires on explicit close and when the handle is dropped.
                _ = &mut shutdown => {
                    // A peer that stops reading must not stall the close.
                    if tokio::time::timeout(self.close_timeout, write.send(WsMessage::Close(None)))
                        .await
                        .is_err()
                    {
                        tracing::debug!(channel_id = %self.id, "Close frame not delivered in time");
                    }
                    break CloseReason::Local;
                }
                Some(message) = outbound.recv() => {
                    if let Err(e) = write.send(message).await {
                        break CloseReason::Error(e.to_string());
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.dispatch(&text),
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => self.dispatch(&text),
                        Err(_) => tracing::warn!(channel_id = %self.id, "Dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(WsMessage::Close(_))) => break CloseReason::Remote,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break CloseReason::Error(e.to_string()),
                    None => break CloseReason::Ended,
                },
            }
        };

        let _ = self.open.send(false);
        tracing::warn!(channel_id = %self.id, %reason, "Realtime channel closed");
        let _ = self.on_close.send(ChannelSignal::Closed { channel_id: self.id });
    }

    fn dispatch(&self, text: &str) {
        match ServerEvent::decode(text) {
            Ok(event) => {
                tracing::debug!(channel_id = %self.id, kind = event.kind(), "Realtime event");
                // No subscribers is fine.
                let _ = self.events.send(event);
            }
            Err(e) => tracing::warn!(channel_id = %self.id, "Undecodable realtime frame: {}", e),
        }
    }
}
