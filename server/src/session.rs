//! Per-player session: welcome, wait for the peer, play every turn, wait
//! for the opponent, then announce the result to both players.
//!
//! Each session announces independently once it sees both players finished,
//! so every player receives the game-over block twice, once from each
//! session. Both copies are built from the same finished [`GameState`] and
//! are identical.

use crate::client_manager::{ClientManager, Outbox};
use crate::game::{decide_outcome, GameError, GameParameters, GameState};
use crate::rng::Draw;
use log::{debug, info};
use shared::{is_roll_command, Outcome, PlayerSlot, ServerMessage};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::RwLock;

/// Longest input line kept, in bytes. The rest of an overlong line is
/// discarded and the kept part is answered as an invalid command.
pub const MAX_LINE_BYTES: u64 = 256;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} disconnected")]
    Disconnected(PlayerSlot),
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("server shutting down")]
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    WaitingForPeer,
    Rolling { turn: u32 },
    AwaitingOpponent,
    Announced,
}

/// Handles shared by both sessions of one game.
#[derive(Clone)]
pub struct SessionContext {
    pub params: GameParameters,
    pub game: Arc<GameState>,
    pub rng: Arc<dyn Draw>,
    pub clients: Arc<RwLock<ClientManager>>,
}

impl SessionContext {
    pub fn new(params: GameParameters, rng: Arc<dyn Draw>) -> Self {
        Self {
            params,
            game: Arc::new(GameState::new(params.max_turns)),
            rng,
            clients: Arc::new(RwLock::new(ClientManager::new())),
        }
    }
}

pub struct PlayerSession<R> {
    slot: PlayerSlot,
    context: SessionContext,
    outbox: Outbox,
    reader: R,
    phase: SessionPhase,
}

impl<R> PlayerSession<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Binds a session to one player's connection.
    ///
    /// `reader` is the player's inbound stream and `outbox` the queue for
    /// lines sent back to the same player.
    pub fn new(slot: PlayerSlot, context: SessionContext, reader: R, outbox: Outbox) -> Self {
        Self {
            slot,
            context,
            outbox,
            reader,
            phase: SessionPhase::WaitingForPeer,
        }
    }

    pub fn slot(&self) -> PlayerSlot {
        self.slot
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Runs the session to its terminal state and returns the outcome it
    /// announced.
    pub async fn run(mut self) -> Result<Outcome, SessionError> {
        let params = self.context.params;
        self.send(ServerMessage::Welcome {
            player: self.slot,
            target: params.target_score,
            max_rolls: params.max_turns,
        })?;

        self.phase = SessionPhase::WaitingForPeer;
        self.context.game.wait_for_players().await;

        for turn in 1..=params.max_turns {
            self.phase = SessionPhase::Rolling { turn };
            self.play_turn(turn).await?;
        }

        self.phase = SessionPhase::AwaitingOpponent;
        let opponent = self.slot.opponent();
        if !self.context.game.has_finished(opponent) {
            debug!("{} finished, waiting for {}", self.slot, opponent);
            self.context.game.wait_for_player_finished(opponent).await;
        }

        let outcome = self.announce().await;
        self.phase = SessionPhase::Announced;
        Ok(outcome)
    }

    /// Prompts until the player sends the roll command, then rolls once.
    ///
    /// Invalid input re-prompts for the same turn without touching the score.
    async fn play_turn(&mut self, turn: u32) -> Result<u32, SessionError> {
        loop {
            self.send(ServerMessage::RollPrompt)?;
            let line = self.read_line().await?;

            if is_roll_command(&line) {
                return self.roll().await;
            }

            debug!("{} sent {:?} on turn {}", self.slot, line, turn);
            self.send(ServerMessage::InvalidCommand)?;
        }
    }

    async fn roll(&mut self) -> Result<u32, SessionError> {
        let roll = self.context.rng.roll_die();

        // Announcing takes the roster exclusively, so holding it here keeps
        // any game-over block behind this roll's reports.
        let clients = self.context.clients.read().await;
        let total = self.context.game.record_roll(self.slot, roll)?;

        info!("{} rolled {}. Total Score: {}", self.slot, roll, total);
        self.send(ServerMessage::RollResult { roll, total })?;

        let notice = ServerMessage::OpponentRoll {
            player: self.slot,
            roll,
            total,
        };
        clients.broadcast(&notice, Some(self.slot));

        Ok(roll)
    }

    /// Sends the game-over block to both players.
    async fn announce(&self) -> Outcome {
        let scores = self.context.game.scores();
        let outcome = decide_outcome(scores, self.context.params.target_score);

        // Exclusive, so the two sessions' blocks never interleave.
        let clients = self.context.clients.write().await;
        for message in ServerMessage::game_over(scores, outcome) {
            clients.broadcast(&message, None);
        }

        debug!("{} announced: {}", self.slot, outcome);
        outcome
    }

    /// Reads one line from the player, without its terminator.
    ///
    /// Bytes that are not UTF-8 are replaced, so malformed input reaches
    /// the command check instead of ending the session. Only end of stream
    /// or a failed read counts as a disconnect.
    async fn read_line(&mut self) -> Result<String, SessionError> {
        let mut buf = Vec::new();
        let read = (&mut self.reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Err(SessionError::Disconnected(self.slot));
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if read as u64 == MAX_LINE_BYTES {
            debug!("{} sent an overlong line, discarding the rest", self.slot);
            self.skip_rest_of_line().await?;
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    async fn skip_rest_of_line(&mut self) -> Result<(), SessionError> {
        loop {
            let (used, done) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    return Ok(());
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(end) => (end + 1, true),
                    None => (available.len(), false),
                }
            };
            self.reader.consume(used);
            if done {
                return Ok(());
            }
        }
    }

    fn send(&self, message: ServerMessage) -> Result<(), SessionError> {
        self.outbox
            .send(message)
            .map_err(|_| SessionError::Disconnected(self.slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Hands out a fixed sequence of rolls.
    struct ScriptedDice(Mutex<VecDeque<u32>>);

    impl ScriptedDice {
        fn new(rolls: &[u32]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(rolls.iter().copied().collect())))
        }
    }

    impl Draw for ScriptedDice {
        fn draw(&self, low: u32, _high: u32) -> u32 {
            self.0.lock().unwrap().pop_front().unwrap_or(low)
        }
    }

    struct Table {
        context: SessionContext,
        outboxes: Vec<Outbox>,
        inboxes: Vec<mpsc::UnboundedReceiver<ServerMessage>>,
    }

    /// Registers both players (without marking them connected).
    async fn table(params: GameParameters, rolls: &[u32]) -> Table {
        let context = SessionContext::new(params, ScriptedDice::new(rolls));
        let mut outboxes = Vec::new();
        let mut inboxes = Vec::new();
        {
            let mut clients = context.clients.write().await;
            for port in [6001, 6002] {
                let (tx, rx) = mpsc::unbounded_channel();
                let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
                clients.add_client(addr, tx.clone());
                outboxes.push(tx);
                inboxes.push(rx);
            }
        }
        Table {
            context,
            outboxes,
            inboxes,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_full_session_with_invalid_command() {
        let mut t = table(GameParameters::new(8, 2), &[3, 4]).await;
        t.context.game.player_connected();
        t.context.game.player_connected();
        t.context.game.record_roll(PlayerSlot::SECOND, 5).unwrap();
        t.context.game.record_roll(PlayerSlot::SECOND, 6).unwrap();

        let input: &[u8] = b"quit\nroll\nROLL\n";
        let session = PlayerSession::new(
            PlayerSlot::FIRST,
            t.context.clone(),
            input,
            t.outboxes[0].clone(),
        );
        let outcome = session.run().await.unwrap();
        assert_eq!(outcome, Outcome::Winner(PlayerSlot::FIRST));

        let own = drain(&mut t.inboxes[0]);
        assert_eq!(
            own,
            vec![
                ServerMessage::Welcome {
                    player: PlayerSlot::FIRST,
                    target: 8,
                    max_rolls: 2
                },
                ServerMessage::RollPrompt,
                ServerMessage::InvalidCommand,
                ServerMessage::RollPrompt,
                ServerMessage::RollResult { roll: 3, total: 3 },
                ServerMessage::RollPrompt,
                ServerMessage::RollResult { roll: 4, total: 7 },
                ServerMessage::FinalScores { scores: [7, 11] },
                ServerMessage::ClosestWins,
                ServerMessage::Result(Outcome::Winner(PlayerSlot::FIRST)),
            ]
        );

        let opponent = drain(&mut t.inboxes[1]);
        assert_eq!(
            opponent,
            vec![
                ServerMessage::OpponentRoll {
                    player: PlayerSlot::FIRST,
                    roll: 3,
                    total: 3
                },
                ServerMessage::OpponentRoll {
                    player: PlayerSlot::FIRST,
                    roll: 4,
                    total: 7
                },
                ServerMessage::FinalScores { scores: [7, 11] },
                ServerMessage::ClosestWins,
                ServerMessage::Result(Outcome::Winner(PlayerSlot::FIRST)),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_command_does_not_consume_turn() {
        let t = table(GameParameters::new(20, 3), &[6]).await;
        t.context.game.player_connected();
        t.context.game.player_connected();

        let input: &[u8] = b"quit\nhelp\n\nROLL\n";
        let session = PlayerSession::new(
            PlayerSlot::SECOND,
            t.context.clone(),
            input,
            t.outboxes[1].clone(),
        );
        // Input ends after one valid roll, so the session stops on turn 2.
        let result = session.run().await;
        assert!(matches!(
            result,
            Err(SessionError::Disconnected(PlayerSlot::SECOND))
        ));
        assert_eq!(t.context.game.rolls_completed(PlayerSlot::SECOND), 1);
        assert_eq!(t.context.game.score(PlayerSlot::SECOND), 6);
    }

    /// Plays a one-turn session for Player 1 against a finished opponent.
    async fn one_turn_with_input(
        input: &'static [u8],
    ) -> (Table, Result<Outcome, SessionError>) {
        let t = table(GameParameters::new(20, 1), &[4]).await;
        t.context.game.player_connected();
        t.context.game.player_connected();
        t.context.game.record_roll(PlayerSlot::SECOND, 2).unwrap();

        let session = PlayerSession::new(
            PlayerSlot::FIRST,
            t.context.clone(),
            input,
            t.outboxes[0].clone(),
        );
        let result = session.run().await;
        (t, result)
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_invalid_command() {
        let (mut t, result) = one_turn_with_input(b"r\xf4ll\nROLL\n").await;

        assert_eq!(result.unwrap(), Outcome::Winner(PlayerSlot::FIRST));
        assert_eq!(t.context.game.rolls_completed(PlayerSlot::FIRST), 1);
        assert_eq!(
            drain(&mut t.inboxes[0])[1..5],
            [
                ServerMessage::RollPrompt,
                ServerMessage::InvalidCommand,
                ServerMessage::RollPrompt,
                ServerMessage::RollResult { roll: 4, total: 4 },
            ]
        );
    }

    #[tokio::test]
    async fn test_crlf_lines() {
        let (mut t, result) = one_turn_with_input(b"\r\nroll\r\n").await;

        assert!(result.is_ok());
        let own = drain(&mut t.inboxes[0]);
        assert_eq!(
            own[1..5],
            [
                ServerMessage::RollPrompt,
                ServerMessage::InvalidCommand,
                ServerMessage::RollPrompt,
                ServerMessage::RollResult { roll: 4, total: 4 },
            ]
        );
    }

    #[tokio::test]
    async fn test_padded_command_is_rejected() {
        let (mut t, result) = one_turn_with_input(b"  roll  \nROLL\n").await;

        assert!(result.is_ok());
        let own = drain(&mut t.inboxes[0]);
        assert_eq!(own[2], ServerMessage::InvalidCommand);
        assert_eq!(count_invalid(&own), 1);
    }

    #[tokio::test]
    async fn test_overlong_line_is_one_invalid_command() {
        let mut input = vec![b'x'; 3 * MAX_LINE_BYTES as usize];
        input.extend_from_slice(b"\nROLL\n");
        let input: &'static [u8] = Box::leak(input.into_boxed_slice());

        let (mut t, result) = one_turn_with_input(input).await;

        assert!(result.is_ok());
        assert_eq!(t.context.game.score(PlayerSlot::FIRST), 4);
        assert_eq!(count_invalid(&drain(&mut t.inboxes[0])), 1);
    }

    fn count_invalid(messages: &[ServerMessage]) -> usize {
        messages
            .iter()
            .filter(|m| **m == ServerMessage::InvalidCommand)
            .count()
    }

    #[tokio::test]
    async fn test_no_prompt_before_peer_connects() {
        let mut t = table(GameParameters::new(20, 1), &[2, 2]).await;
        t.context.game.player_connected();

        let input: &'static [u8] = b"ROLL\n";
        let session = PlayerSession::new(
            PlayerSlot::FIRST,
            t.context.clone(),
            input,
            t.outboxes[0].clone(),
        );
        let handle = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let early = drain(&mut t.inboxes[0]);
        assert_eq!(early.len(), 1);
        assert!(matches!(early[0], ServerMessage::Welcome { .. }));
        assert_eq!(t.context.game.rolls_completed(PlayerSlot::FIRST), 0);

        t.context.game.player_connected();
        t.context.game.record_roll(PlayerSlot::SECOND, 2).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("session should finish")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Outcome::Tie);
        assert_eq!(t.context.game.scores(), [2, 2]);
    }

    #[tokio::test]
    async fn test_waits_for_opponent_before_announcing() {
        let mut t = table(GameParameters::new(8, 1), &[5]).await;
        t.context.game.player_connected();
        t.context.game.player_connected();

        let input: &'static [u8] = b"roll\n";
        let session = PlayerSession::new(
            PlayerSlot::FIRST,
            t.context.clone(),
            input,
            t.outboxes[0].clone(),
        );
        let handle = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        let before = drain(&mut t.inboxes[1]);
        assert!(!before
            .iter()
            .any(|m| matches!(m, ServerMessage::FinalScores { .. })));

        t.context.game.record_roll(PlayerSlot::SECOND, 1).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("session should finish")
            .unwrap()
            .unwrap();
        // target 8: diffs 3 and 7
        assert_eq!(outcome, Outcome::Winner(PlayerSlot::FIRST));
        let after = drain(&mut t.inboxes[1]);
        assert_eq!(
            after,
            ServerMessage::game_over([5, 1], Outcome::Winner(PlayerSlot::FIRST)).to_vec()
        );
    }

    #[tokio::test]
    async fn test_closed_outbox_ends_session() {
        let t = table(GameParameters::new(20, 5), &[]).await;
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let input: &[u8] = b"ROLL\n";
        let session = PlayerSession::new(PlayerSlot::FIRST, t.context.clone(), input, tx);
        assert_eq!(session.phase(), SessionPhase::WaitingForPeer);
        assert!(matches!(
            session.run().await,
            Err(SessionError::Disconnected(PlayerSlot::FIRST))
        ));
    }
}
