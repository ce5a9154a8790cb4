//! # Dice Duel Server Library
//!
//! Authoritative server for a two-player dice game played over plain TCP
//! text lines. Two players connect, each rolls a fixed number of times, and
//! whoever ends closest to a randomly chosen target score wins.
//!
//! ## Core Responsibilities
//!
//! ### Player Admission
//! The server accepts exactly two connections. The first is Player 1, the
//! second Player 2; after that the listener is closed. Slots are never
//! reused within a run.
//!
//! ### Turn Coordination
//! Each player is served by its own session task running in parallel with
//! the other. No prompt is sent before both players are connected, invalid
//! commands re-prompt without costing a turn, and every roll is reported to
//! the roller and to the opponent.
//!
//! ### Result Announcement
//! When a session has finished its own turns it waits for the opponent, then
//! computes the winner and sends the game-over block to both players. Both
//! sessions do this, so each player receives the identical block twice.
//!
//! ## Module Organization
//!
//! ### RNG Module (`rng`)
//! The single shared random source, behind one mutex. Used for the game
//! parameters at startup and for every die roll.
//!
//! ### Game Module (`game`)
//! Game parameters, the winner rule, and [`game::GameState`]: per-player
//! scores, completed rolls and the connected count, all atomics, plus a
//! notifier that wakes waiting sessions on every change.
//!
//! ### Client Manager Module (`client_manager`)
//! Slot assignment and the per-connection outboxes used to reach a player
//! from either session.
//!
//! ### Session Module (`session`)
//! The per-player state machine: waiting for the peer, rolling, awaiting the
//! opponent, announced.
//!
//! ### Network Module (`network`)
//! The TCP acceptor, connection writer tasks and the cooperative shutdown
//! signal.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::rng::SharedRng;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = Server::bind("127.0.0.1:1014", Arc::new(SharedRng::from_entropy()), None).await?;
//!
//!     // Accepts two players, plays every turn and announces the winner.
//!     if let Some(outcome) = server.run().await? {
//!         println!("{}", outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Handling
//!
//! A failed bind or accept is fatal and returned to the caller. A player
//! disconnecting ends only that player's session; the opponent's session
//! keeps waiting for turns that will never be played until the server is
//! shut down.

pub mod client_manager;
pub mod game;
pub mod network;
pub mod rng;
pub mod session;
