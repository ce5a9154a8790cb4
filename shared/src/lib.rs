//! Line protocol spoken between the dice duel server and its players.
//!
//! Every message is a single newline-terminated line of text. The server
//! renders [`ServerMessage`] values through their `Display` impl; players
//! answer a roll prompt with any line, of which only [`ROLL_COMMAND`]
//! (case-insensitive) is accepted.

use std::fmt;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 1014;
pub const PLAYER_COUNT: usize = 2;
pub const ROLL_COMMAND: &str = "ROLL";
pub const DIE_MIN: u32 = 1;
pub const DIE_MAX: u32 = 6;

/// Seat assigned to a player for the whole game, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerSlot(usize);

impl PlayerSlot {
    pub const FIRST: PlayerSlot = PlayerSlot(0);
    pub const SECOND: PlayerSlot = PlayerSlot(1);

    pub fn from_index(index: usize) -> Option<Self> {
        (index < PLAYER_COUNT).then_some(PlayerSlot(index))
    }

    /// Zero-based index into per-player arrays.
    pub fn index(self) -> usize {
        self.0
    }

    /// One-based number shown to players ("Player 1", "Player 2").
    pub fn number(self) -> usize {
        self.0 + 1
    }

    pub fn opponent(self) -> Self {
        PlayerSlot(PLAYER_COUNT - 1 - self.0)
    }

    pub fn all() -> [PlayerSlot; PLAYER_COUNT] {
        [Self::FIRST, Self::SECOND]
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.number())
    }
}

/// Result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(PlayerSlot),
    Tie,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Winner(slot) => write!(f, "{} WINS!", slot),
            Outcome::Tie => write!(f, "It's a TIE!"),
        }
    }
}

/// Lines the server sends to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Welcome {
        player: PlayerSlot,
        target: u32,
        max_rolls: u32,
    },
    RollPrompt,
    InvalidCommand,
    RollResult {
        roll: u32,
        total: u32,
    },
    /// Progress notice sent to the opponent of the rolling player only.
    OpponentRoll {
        player: PlayerSlot,
        roll: u32,
        total: u32,
    },
    FinalScores {
        scores: [u32; PLAYER_COUNT],
    },
    ClosestWins,
    Result(Outcome),
}

impl ServerMessage {
    /// The three-line block announcing the end of the game.
    pub fn game_over(scores: [u32; PLAYER_COUNT], outcome: Outcome) -> [ServerMessage; 3] {
        [
            ServerMessage::FinalScores { scores },
            ServerMessage::ClosestWins,
            ServerMessage::Result(outcome),
        ]
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Welcome {
                player,
                target,
                max_rolls,
            } => write!(
                f,
                "Welcome, {}! Target: {} | Max Rolls: {}",
                player, target, max_rolls
            ),
            ServerMessage::RollPrompt => write!(f, "Type '{}' to roll the dice.", ROLL_COMMAND),
            ServerMessage::InvalidCommand => {
                write!(f, "Invalid command. Type '{}' to play.", ROLL_COMMAND)
            }
            ServerMessage::RollResult { roll, total } => {
                write!(f, "You rolled {}. Total Score: {}", roll, total)
            }
            ServerMessage::OpponentRoll {
                player,
                roll,
                total,
            } => write!(f, "{} rolled {} | Total Score: {}", player, roll, total),
            ServerMessage::FinalScores { scores } => write!(
                f,
                "Game Over! Final Scores: Player 1: {} | Player 2: {}",
                scores[0], scores[1]
            ),
            ServerMessage::ClosestWins => write!(f, "Closest to the target wins!"),
            ServerMessage::Result(outcome) => write!(f, "{}", outcome),
        }
    }
}

/// Whether a line received from a player is the roll command.
///
/// A trailing line terminator is ignored; any other padding makes the line
/// invalid. The comparison is ASCII case-insensitive.
pub fn is_roll_command(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n'])
        .eq_ignore_ascii_case(ROLL_COMMAND)
}

/// Whether a server line asks the player to roll.
///
/// The invalid-command notice also mentions the command, but it is always
/// followed by a fresh prompt, so only the prompt itself counts.
pub fn is_roll_prompt(line: &str) -> bool {
    line.starts_with("Type 'ROLL'")
}

/// Whether a server line is the last line of the game-over block.
pub fn is_final_line(line: &str) -> bool {
    line.contains("WINS") || line.contains("TIE")
}
