//! Game parameters and the shared per-player progress record.
//!
//! [`GameState`] is created once per server run and handed to both player
//! sessions behind an `Arc`. Each session only ever writes its own slot's
//! counters; reads of the opponent's counters go through the same atomics,
//! and every change wakes tasks parked in [`GameState::wait_for_players`] or
//! [`GameState::wait_for_player_finished`].

use crate::rng::Draw;
use log::debug;
use shared::{Outcome, PlayerSlot, PLAYER_COUNT};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

pub const TURN_RANGE: RangeInclusive<u32> = 5..=10;
pub const TARGET_RANGE: RangeInclusive<u32> = 20..=50;

/// Upper bound on a single wait for a counter change.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("{0} has already completed all turns")]
    TurnsExhausted(PlayerSlot),
}

/// Target score and number of turns, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameParameters {
    pub target_score: u32,
    pub max_turns: u32,
}

impl GameParameters {
    pub fn new(target_score: u32, max_turns: u32) -> Self {
        Self {
            target_score,
            max_turns,
        }
    }

    /// Draws the turn count, then the target, from the shared source.
    pub fn generate(rng: &dyn Draw) -> Self {
        let max_turns = rng.draw(*TURN_RANGE.start(), *TURN_RANGE.end());
        let target_score = rng.draw(*TARGET_RANGE.start(), *TARGET_RANGE.end());
        Self {
            target_score,
            max_turns,
        }
    }
}

/// Closest final score to the target wins; equal distance is a tie.
pub fn decide_outcome(scores: [u32; PLAYER_COUNT], target: u32) -> Outcome {
    let first = scores[0].abs_diff(target);
    let second = scores[1].abs_diff(target);

    if first < second {
        Outcome::Winner(PlayerSlot::FIRST)
    } else if second < first {
        Outcome::Winner(PlayerSlot::SECOND)
    } else {
        Outcome::Tie
    }
}

#[derive(Debug)]
pub struct GameState {
    max_turns: u32,
    scores: [AtomicU32; PLAYER_COUNT],
    rolls_completed: [AtomicU32; PLAYER_COUNT],
    connected: AtomicUsize,
    progress: Notify,
}

impl GameState {
    pub fn new(max_turns: u32) -> Self {
        Self {
            max_turns,
            scores: [AtomicU32::new(0), AtomicU32::new(0)],
            rolls_completed: [AtomicU32::new(0), AtomicU32::new(0)],
            connected: AtomicUsize::new(0),
            progress: Notify::new(),
        }
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Counts one more connected player and returns the new total.
    ///
    /// The count saturates at [`PLAYER_COUNT`].
    pub fn player_connected(&self) -> usize {
        let previous = self
            .connected
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < PLAYER_COUNT).then_some(count + 1)
            })
            .unwrap_or(PLAYER_COUNT);
        self.progress.notify_waiters();
        (previous + 1).min(PLAYER_COUNT)
    }

    pub fn connected_count(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn all_players_connected(&self) -> bool {
        self.connected_count() == PLAYER_COUNT
    }

    /// Adds a roll to the player's score and counts the turn.
    ///
    /// Returns the new running total. Only the session owning `slot` calls
    /// this. The score is published before the turn counter, so a reader that
    /// sees the final turn count also sees the final score.
    pub fn record_roll(&self, slot: PlayerSlot, roll: u32) -> Result<u32, GameError> {
        let i = slot.index();
        if self.rolls_completed[i].load(Ordering::SeqCst) >= self.max_turns {
            return Err(GameError::TurnsExhausted(slot));
        }

        let total = self.scores[i].fetch_add(roll, Ordering::SeqCst) + roll;
        let rolls = self.rolls_completed[i].fetch_add(1, Ordering::SeqCst) + 1;
        debug!("{} completed roll {}/{}", slot, rolls, self.max_turns);

        self.progress.notify_waiters();
        Ok(total)
    }

    pub fn score(&self, slot: PlayerSlot) -> u32 {
        self.scores[slot.index()].load(Ordering::SeqCst)
    }

    pub fn rolls_completed(&self, slot: PlayerSlot) -> u32 {
        self.rolls_completed[slot.index()].load(Ordering::SeqCst)
    }

    pub fn has_finished(&self, slot: PlayerSlot) -> bool {
        self.rolls_completed(slot) == self.max_turns
    }

    pub fn is_complete(&self) -> bool {
        PlayerSlot::all()
            .into_iter()
            .all(|slot| self.has_finished(slot))
    }

    pub fn scores(&self) -> [u32; PLAYER_COUNT] {
        PlayerSlot::all().map(|slot| self.score(slot))
    }

    /// The result of the game, once both players have completed every turn.
    pub fn outcome(&self, target: u32) -> Option<Outcome> {
        self.is_complete()
            .then(|| decide_outcome(self.scores(), target))
    }

    pub async fn wait_for_players(&self) {
        self.wait_until(|state| state.all_players_connected()).await;
    }

    pub async fn wait_for_player_finished(&self, slot: PlayerSlot) {
        self.wait_until(|state| state.has_finished(slot)).await;
    }

    async fn wait_until(&self, ready: impl Fn(&GameState) -> bool) {
        loop {
            let notified = self.progress.notified();
            tokio::pin!(notified);
            // Register before checking so a change between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            if ready(self) {
                return;
            }

            let _ = tokio::time::timeout(POLL_INTERVAL, notified).await;
        }
    }
}
