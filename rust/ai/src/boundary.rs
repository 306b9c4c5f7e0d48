//! The game surface an automated player talks to.
//!
//! The agent never touches a `Game` directly; it sees the same redacted
//! views a remote client would, through [`GameBoundary`].

use std::time::Duration;

use async_trait::async_trait;
use blackjack_engine::game::GameId;
use blackjack_engine::player::TurnAction;
use blackjack_engine::view::GameView;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error("Game not found: {0}")]
    NotFound(GameId),
    #[error("Turn rejected: {0}")]
    Rejected(String),
    #[error("Game service unavailable: {0}")]
    Unavailable(String),
    #[error("Game service did not answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait GameBoundary: Send + Sync {
    /// Current state of `game_id` as `caller` is allowed to see it.
    async fn get_game(&self, game_id: &str, caller: &str) -> Result<GameView, BoundaryError>;

    /// Submits `action` for `player` and returns the resulting view for that player.
    async fn play_turn(
        &self,
        game_id: &str,
        player: &str,
        action: TurnAction,
    ) -> Result<GameView, BoundaryError>;
}
