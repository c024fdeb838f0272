//! Supervising task for the session + channel pair.
//!
//! The realtime channel never reconnects by itself. When it reports
//! [`ChannelSignal::Closed`], the supervisor invalidates the session, tears
//! down the old channel, runs a full bootstrap and opens a new channel bound
//! to the new credential. Signals are handled one at a time and signals from
//! channels that are no longer current are dropped, so a closure causes
//! exactly one re-bootstrap.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core::error::{AppError, AppResult};
use crate::realtime::{Channel, ChannelManager, ChannelSignal, ClientCommand, ServerEvent};
use crate::session::bootstrap::{Bootstrapper, Session};
use crate::session::context::AppContext;

enum Control {
    Rebootstrap,
    Send(ClientCommand, oneshot::Sender<AppResult<()>>),
    Stop,
}

pub struct Supervisor {
    bootstrapper: Bootstrapper,
    channels: ChannelManager,
    ctx: AppContext,
    signals_tx: mpsc::UnboundedSender<ChannelSignal>,
    signals_rx: mpsc::UnboundedReceiver<ChannelSignal>,
    current: Option<Channel>,
}

impl Supervisor {
    pub fn new(bootstrapper: Bootstrapper, channels: ChannelManager) -> Self {
        let ctx = AppContext::new(Arc::clone(bootstrapper.api()));
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            bootstrapper,
            channels,
            ctx,
            signals_tx,
            signals_rx,
            current: None,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Bootstraps, spawns the supervising task and returns the context for
    /// page loaders. A failed first bootstrap is returned to the caller; an
    /// `Auth` error there should end the app load.
    pub async fn launch(bootstrapper: Bootstrapper, channels: ChannelManager) -> AppResult<(AppContext, SupervisorHandle)> {
        let mut supervisor = Supervisor::new(bootstrapper, channels);
        supervisor.start().await?;
        let ctx = supervisor.context().clone();
        Ok((ctx, supervisor.spawn()))
    }

    /// First bootstrap: session, then channel, then publish.
    pub async fn start(&mut self) -> AppResult<Arc<Session>> {
        let (session, channel) = match self.establish().await {
            Ok(pair) => pair,
            Err(err) => {
                self.ctx.fail(err.to_string());
                return Err(err);
            }
        };
        self.current = Some(channel);
        Ok(self.ctx.init(session))
    }

    /// Moves the supervisor onto its own task.
    pub fn spawn(self) -> SupervisorHandle {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let events = self.channels.clone();
        let task = tokio::spawn(self.run(control_rx));
        SupervisorHandle {
            control: control_tx,
            channels: events,
            task,
        }
    }

    async fn establish(&self) -> AppResult<(Session, Channel)> {
        let session = self.bootstrapper.bootstrap().await?;
        let channel = self
            .channels
            .open_channel(session.credential(), self.signals_tx.clone())
            .await?;
        Ok((session, channel))
    }

    async fn run(mut self, mut control: mpsc::UnboundedReceiver<Control>) {
        loop {
            tokio::select! {
                Some(signal) = self.signals_rx.recv() => self.on_signal(signal).await,
                command = control.recv() => match command {
                    Some(Control::Rebootstrap) => self.rebootstrap().await,
                    Some(Control::Send(command, reply)) => {
                        let _ = reply.send(self.send(&command));
                    }
                    Some(Control::Stop) | None => break,
                },
            }
        }
        self.shutdown().await;
    }

    async fn on_signal(&mut self, signal: ChannelSignal) {
        let closed = signal.channel_id();
        if self.current.as_ref().map(Channel::id) != Some(closed) {
            tracing::debug!(channel_id = %closed, "Ignoring close of a retired channel");
            return;
        }
        tracing::warn!(channel_id = %closed, "Realtime channel dropped, re-bootstrapping session");
        self.rebootstrap().await;
    }

    async fn rebootstrap(&mut self) {
        self.ctx.invalidate();
        // Retire the old channel before a new credential exists.
        if let Some(mut old) = self.current.take() {
            old.close().await;
        }
        match self.establish().await {
            Ok((session, channel)) => {
                self.current = Some(channel);
                self.ctx.replace(session);
                tracing::info!(generation = self.ctx.generation(), "Session re-established");
            }
            Err(err) => {
                tracing::error!("Re-bootstrap failed: {}", err);
                self.ctx.fail(err.to_string());
            }
        }
    }

    fn send(&self, command: &ClientCommand) -> AppResult<()> {
        match &self.current {
            Some(channel) => channel.send(command),
            None => Err(AppError::SessionInvalid),
        }
    }

    async fn shutdown(&mut self) {
        if let Some(mut channel) = self.current.take() {
            channel.close().await;
        }
        self.ctx.stop();
        tracing::info!("Supervisor stopped");
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("ctx", &self.ctx)
            .field("current", &self.current.as_ref().map(Channel::id))
            .finish_non_exhaustive()
    }
}

/// Control handle for a spawned [`Supervisor`].
#[derive(Debug)]
pub struct SupervisorHandle {
    control: mpsc::UnboundedSender<Control>,
    channels: ChannelManager,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Server events from the current channel and every later one.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.channels.subscribe()
    }

    /// Sends a command over the current channel.
    pub async fn send(&self, command: ClientCommand) -> AppResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(Control::Send(command, reply_tx))
            .map_err(|_| AppError::SessionInvalid)?;
        reply_rx.await.map_err(|_| AppError::SessionInvalid)?
    }

    /// Forces a full re-bootstrap (e.g. the user tapped "retry" after a failure).
    pub fn rebootstrap(&self) -> AppResult<()> {
        self.control
            .send(Control::Rebootstrap)
            .map_err(|_| AppError::SessionInvalid)
    }

    /// Closes the channel and waits for the supervising task to exit.
    pub async fn stop(self) {
        let _ = self.control.send(Control::Stop);
        if let Err(e) = self.task.await {
            tracing::warn!("Supervisor task ended abnormally: {}", e);
        }
    }
}
