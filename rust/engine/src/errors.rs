use thiserror::Error;

use crate::deck::DeckError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("It's not {player}'s turn (waiting for {expected:?})")]
    OutOfTurn {
        player: String,
        expected: Option<String>,
    },
    #[error("Unknown player: {0}")]
    UnknownPlayer(String),
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Deck unavailable: {0}")]
    DeckUnavailable(String),
    #[error("A game needs at least one player besides the dealer")]
    EmptyRoster,
    #[error("Player name {0} is already taken")]
    DuplicatePlayer(String),
    #[error("Game already started")]
    AlreadyStarted,
}

impl From<DeckError> for GameError {
    fn from(err: DeckError) -> Self {
        GameError::DeckUnavailable(err.to_string())
    }
}
