//! Server network layer: accepts the two players and runs their sessions
//!
//! Every connection is split in two. The read half goes to the player's
//! [`PlayerSession`]; the write half is owned by a writer task that drains
//! the connection's outbox. Once both players are accepted the listener is
//! closed, and further connection attempts are refused.

use crate::game::GameParameters;
use crate::rng::Draw;
use crate::session::{PlayerSession, SessionContext, SessionError};
use log::{debug, error, info, warn};
use shared::{Outcome, PlayerSlot, ServerMessage, PLAYER_COUNT};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Cooperative stop signal shared by the acceptor and both sessions.
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                sender: Arc::new(sender),
            },
            receiver,
        )
    }

    pub fn trigger(&self) {
        // Only fails when every receiver is gone, i.e. nothing left to stop.
        let _ = self.sender.send(true);
    }
}

/// Resolves once shutdown has been requested. Never resolves if the handle
/// is dropped without triggering.
async fn shutdown_requested(receiver: &mut watch::Receiver<bool>) {
    loop {
        let requested = *receiver.borrow();
        if requested {
            return;
        }
        if receiver.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connection acceptor and owner of one game.
pub struct Server {
    listener: TcpListener,
    context: SessionContext,
    shutdown: ShutdownHandle,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Binds the listener and fixes the game parameters.
    ///
    /// Parameters are drawn from `rng` unless given explicitly.
    pub async fn bind(
        addr: &str,
        rng: Arc<dyn Draw>,
        params: Option<GameParameters>,
    ) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let params = params.unwrap_or_else(|| GameParameters::generate(rng.as_ref()));
        info!("Target: {} | Turns: {}", params.target_score, params.max_turns);

        let (shutdown, shutdown_rx) = ShutdownHandle::new();
        Ok(Server {
            listener,
            context: SessionContext::new(params, rng),
            shutdown,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn params(&self) -> GameParameters {
        self.context.params
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accepts exactly two players and plays the game to the end.
    ///
    /// Returns the announced outcome, or `None` if no session reached the
    /// announcement (disconnect or shutdown). An accept failure is returned
    /// as an error.
    pub async fn run(self) -> Result<Option<Outcome>, BoxError> {
        let Server {
            listener,
            context,
            shutdown: _shutdown,
            mut shutdown_rx,
        } = self;

        info!("Waiting for players...");
        let mut sessions = Vec::with_capacity(PLAYER_COUNT);
        let mut writers = Vec::with_capacity(PLAYER_COUNT);

        for _ in 0..PLAYER_COUNT {
            let accepted = tokio::select! {
                accepted = listener.accept() => Some(accepted?),
                _ = shutdown_requested(&mut shutdown_rx) => None,
            };
            let Some((stream, addr)) = accepted else {
                info!("Shutdown requested while waiting for players");
                break;
            };

            let (session, writer) =
                admit_player(&context, stream, addr, shutdown_rx.clone()).await?;
            sessions.push(session);
            writers.push(writer);
        }

        drop(listener);
        if sessions.len() == PLAYER_COUNT {
            info!("Both players connected, no longer accepting connections");
        }

        let mut outcome = None;
        for session in sessions {
            match session.await {
                Ok((_, Ok(announced))) => outcome = Some(announced),
                Ok((slot, Err(SessionError::Disconnected(_)))) => {
                    info!("{} disconnected.", slot);
                }
                Ok((slot, Err(SessionError::Shutdown))) => {
                    debug!("{} session stopped by shutdown", slot);
                }
                Ok((slot, Err(e))) => warn!("{} session ended: {}", slot, e),
                Err(e) => error!("Session task panicked: {}", e),
            }
        }

        // Sessions have dropped their outboxes; close the roster's copies so
        // each writer flushes what is queued and shuts its socket down.
        context.clients.write().await.close_outboxes();
        for writer in writers {
            if let Err(e) = writer.await {
                error!("Writer task panicked: {}", e);
            }
        }

        if let Some(outcome) = outcome {
            info!("Game over: {}", outcome);
        }
        Ok(outcome)
    }
}

type SessionHandle = JoinHandle<(PlayerSlot, Result<Outcome, SessionError>)>;

/// Registers a connection, counts it, and spawns its writer and session.
async fn admit_player(
    context: &SessionContext,
    stream: TcpStream,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(SessionHandle, JoinHandle<()>), BoxError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let (read_half, write_half) = stream.into_split();
    let (outbox, inbox) = mpsc::unbounded_channel();

    let slot = context
        .clients
        .write()
        .await
        .add_client(addr, outbox.clone())
        .ok_or("no free player slot")?;
    let writer = spawn_connection_writer(slot, write_half, inbox);
    context.game.player_connected();

    let session = PlayerSession::new(slot, context.clone(), BufReader::new(read_half), outbox);
    let handle = tokio::spawn(async move {
        let result = tokio::select! {
            result = session.run() => result,
            _ = shutdown_requested(&mut shutdown) => Err(SessionError::Shutdown),
        };
        (slot, result)
    });

    Ok((handle, writer))
}

/// Spawns the task that owns a connection's write half.
///
/// Writes each queued message as one line, and shuts the stream down once
/// the outbox is closed or a write fails.
pub fn spawn_connection_writer<W>(
    slot: PlayerSlot,
    mut writer: W,
    mut inbox: mpsc::UnboundedReceiver<ServerMessage>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            let line = format!("{}\n", message);
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                warn!("Failed to write to {}: {}", slot, e);
                break;
            }
        }
        if let Err(e) = writer.shutdown().await {
            debug!("Failed to shut down connection of {}: {}", slot, e);
        }
    })
}
