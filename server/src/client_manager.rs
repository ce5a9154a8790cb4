//! Player connection registry for the dice duel server
//!
//! Assigns each accepted connection the next free slot in arrival order and
//! keeps the connection's outbox, the channel feeding that connection's
//! writer task. Sessions use the registry to reach their opponent and to
//! broadcast the final result to both players.

use log::{debug, info};
use shared::{PlayerSlot, ServerMessage, PLAYER_COUNT};
use std::net::SocketAddr;
use tokio::sync::mpsc;

pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// A connected player
#[derive(Debug)]
pub struct Client {
    /// Seat assigned at connection time, never reused
    pub slot: PlayerSlot,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Queue drained by this connection's writer task
    pub outbox: Outbox,
}

impl Client {
    pub fn new(slot: PlayerSlot, addr: SocketAddr, outbox: Outbox) -> Self {
        Self { slot, addr, outbox }
    }

    /// Queues a line for this player. Returns false once the writer has gone away.
    pub fn send(&self, message: &ServerMessage) -> bool {
        self.outbox.send(message.clone()).is_ok()
    }
}

/// Tracks the (at most two) players of a game.
///
/// Slots are handed out strictly in the order `add_client` is called and
/// are never released, so a slot is never reassigned within one run.
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: Vec<Client>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: Vec::with_capacity(PLAYER_COUNT),
        }
    }

    /// Registers a new connection.
    ///
    /// Returns the assigned slot, or `None` when both slots are taken.
    pub fn add_client(&mut self, addr: SocketAddr, outbox: Outbox) -> Option<PlayerSlot> {
        let slot = PlayerSlot::from_index(self.clients.len())?;
        info!("{} connected from {}", slot, addr);
        self.clients.push(Client::new(slot, addr, outbox));
        Some(slot)
    }

    pub fn get_client(&self, slot: PlayerSlot) -> Option<&Client> {
        self.clients.get(slot.index())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() == PLAYER_COUNT
    }

    /// Queues a line for one player. Returns false if the player is unknown
    /// or their connection is gone.
    pub fn send_to(&self, slot: PlayerSlot, message: &ServerMessage) -> bool {
        match self.get_client(slot) {
            Some(client) => client.send(message),
            None => false,
        }
    }

    /// Queues a line for every player except `exclude`.
    ///
    /// Delivery failures are logged and otherwise ignored.
    pub fn broadcast(&self, message: &ServerMessage, exclude: Option<PlayerSlot>) {
        for client in &self.clients {
            if Some(client.slot) == exclude {
                continue;
            }
            if !client.send(message) {
                debug!("Dropped line for {} ({}): connection closed", client.slot, client.addr);
            }
        }
    }

    /// Drops every registered outbox so writer tasks can drain and exit.
    ///
    /// The slots stay assigned.
    pub fn close_outboxes(&mut self) {
        for client in &mut self.clients {
            // Swap in a sender whose receiver is already gone.
            client.outbox = mpsc::unbounded_channel().0;
        }
    }
}
