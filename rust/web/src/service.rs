use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use blackjack_ai::{
    create_strategy, AgentError, AgentHandle, AutoPlayer, BoundaryError, GameBoundary, Strategy,
    StrategyError,
};
use blackjack_engine::deck::DeckProvider;
use blackjack_engine::errors::GameError;
use blackjack_engine::game::{Game, GameId, TurnOutcome};
use blackjack_engine::player::{Turn, TurnAction, DEALER_NAME};
use blackjack_engine::view::GameView;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warp::http::StatusCode;

use crate::errors::{ErrorSeverity, IntoErrorResponse};
use crate::store::{GameStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("Game not found: {0}")]
    NotFound(GameId),
    #[error("Game {0} already has an automated player")]
    DuplicateGame(GameId),
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("Game id already in use: {0}")]
    IdConflict(GameId),
    #[error("Automated players are not available")]
    AgentUnavailable,
    #[error("Game storage poisoned")]
    StoragePoisoned,
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            StoreError::AlreadyExists(id) => ServiceError::IdConflict(id),
            StoreError::Poisoned => ServiceError::StoragePoisoned,
        }
    }
}

impl From<StrategyError> for ServiceError {
    fn from(err: StrategyError) -> Self {
        match err {
            StrategyError::UnknownStrategy(name) => ServiceError::UnknownStrategy(name),
        }
    }
}

impl From<AgentError> for ServiceError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::DuplicateGame(id) => ServiceError::DuplicateGame(id),
            AgentError::Stopped => ServiceError::AgentUnavailable,
        }
    }
}

impl IntoErrorResponse for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Game(err) => match err {
                GameError::OutOfTurn { .. } | GameError::AlreadyStarted => StatusCode::CONFLICT,
                GameError::UnknownPlayer(_) => StatusCode::NOT_FOUND,
                GameError::InvalidAction(_)
                | GameError::EmptyRoster
                | GameError::DuplicatePlayer(_) => StatusCode::BAD_REQUEST,
                GameError::DeckUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::DuplicateGame(_) | ServiceError::IdConflict(_) => StatusCode::CONFLICT,
            ServiceError::UnknownStrategy(_) => StatusCode::BAD_REQUEST,
            ServiceError::AgentUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Game(err) => match err {
                GameError::OutOfTurn { .. } => "out_of_turn",
                GameError::UnknownPlayer(_) => "unknown_player",
                GameError::InvalidAction(_) => "invalid_action",
                GameError::DeckUnavailable(_) => "deck_unavailable",
                GameError::EmptyRoster => "empty_roster",
                GameError::DuplicatePlayer(_) => "duplicate_player",
                GameError::AlreadyStarted => "already_started",
            },
            ServiceError::NotFound(_) => "game_not_found",
            ServiceError::DuplicateGame(_) => "duplicate_game",
            ServiceError::UnknownStrategy(_) => "unknown_strategy",
            ServiceError::IdConflict(_) => "game_id_conflict",
            ServiceError::AgentUnavailable => "agent_unavailable",
            ServiceError::StoragePoisoned => "game_storage_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::NotFound(id) | ServiceError::DuplicateGame(id) => {
                Some(json!({ "game_id": id }))
            }
            ServiceError::Game(GameError::OutOfTurn { player, expected }) => Some(json!({
                "player": player,
                "expected": expected,
            })),
            ServiceError::UnknownStrategy(_) => Some(json!({
                "supported": [Strategy::Dealer.name(), Strategy::Greedy.name()],
            })),
            _ => None,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            ServiceError::StoragePoisoned => ErrorSeverity::Critical,
            ServiceError::Game(GameError::DeckUnavailable(_)) | ServiceError::AgentUnavailable => {
                ErrorSeverity::Server
            }
            _ => ErrorSeverity::Client,
        }
    }
}

/// The game-facing operations of the server.
///
/// Every mutation runs inside a store checkout, so turns for one game are
/// applied one at a time while other games proceed independently. Views
/// returned to callers are always redacted for the named caller.
pub struct GameService {
    store: Arc<GameStore>,
    deck: Arc<dyn DeckProvider>,
    agent: OnceLock<AgentHandle>,
}

impl GameService {
    pub fn new(store: Arc<GameStore>, deck: Arc<dyn DeckProvider>) -> Self {
        Self {
            store,
            deck,
            agent: OnceLock::new(),
        }
    }

    pub fn store(&self) -> Arc<GameStore> {
        Arc::clone(&self.store)
    }

    /// Connects the running agent. Returns `false` if one was already attached.
    pub fn attach_agent(&self, handle: AgentHandle) -> bool {
        self.agent.set(handle).is_ok()
    }

    pub fn agent(&self) -> Option<&AgentHandle> {
        self.agent.get()
    }

    /// Deals a new game for `players` and stores it.
    ///
    /// With `auto_dealer` the dealer seat is handed to the agent right away.
    /// If the agent refuses it the game is dropped again and the agent's
    /// error is returned. The returned view is the anonymous one: only the dealer's up card is
    /// shown.
    pub async fn new_game(
        &self,
        players: Vec<String>,
        auto_dealer: bool,
    ) -> Result<GameView, ServiceError> {
        let agent = match (auto_dealer, self.agent()) {
            (true, None) => return Err(ServiceError::AgentUnavailable),
            (true, Some(agent)) => Some(agent),
            (false, _) => None,
        };

        let id = Uuid::new_v4().to_string();
        let mut game = Game::new(id.clone());
        game.start(self.deck.as_ref(), players).await?;
        let view = game.view_for("");
        self.store.insert_new(game)?;

        if let Some(agent) = agent {
            if let Err(err) = agent.register(id.as_str(), DEALER_NAME, Strategy::Dealer).await {
                // Nobody would ever play the dealer's first turn
                warn!(game_id = %id, error = %err, "Could not hand the dealer seat to the agent");
                self.store.remove(&id)?;
                return Err(err.into());
            }
        }

        info!(game_id = %id, players = ?view.turn_order, auto_dealer, "Game created");
        Ok(view)
    }

    pub async fn get_game(&self, id: &str, caller: &str) -> Result<GameView, ServiceError> {
        let game = self.store.get(id).await?;
        Ok(game.view_for(caller))
    }

    /// Plays `action` for `player`.
    ///
    /// The action text is only looked at once `player` is known to be next,
    /// so an out-of-turn caller gets `OutOfTurn` whatever it sent.
    pub async fn play_turn(
        &self,
        id: &str,
        player: &str,
        action: &str,
    ) -> Result<GameView, ServiceError> {
        self.apply_turn(id, player, action.parse()).await
    }

    /// Hands `player`'s seat in game `id` to the agent.
    pub async fn register_auto_player(
        &self,
        id: &str,
        player: &str,
        strategy: &str,
    ) -> Result<AutoPlayer, ServiceError> {
        let strategy = create_strategy(strategy)?;
        let game = self.store.get(id).await?;
        if game.player(player).is_none() {
            return Err(GameError::UnknownPlayer(player.to_string()).into());
        }
        let agent = self.agent().ok_or(ServiceError::AgentUnavailable)?;
        agent.register(id, player, strategy).await?;

        Ok(AutoPlayer {
            game_id: id.to_string(),
            player_name: player.to_string(),
            strategy,
            fetch_failures: 0,
        })
    }

    pub async fn auto_players(&self) -> Result<Vec<AutoPlayer>, ServiceError> {
        let agent = self.agent().ok_or(ServiceError::AgentUnavailable)?;
        Ok(agent.entries().await?)
    }

    async fn apply_turn(
        &self,
        id: &str,
        player: &str,
        action: Result<TurnAction, GameError>,
    ) -> Result<GameView, ServiceError> {
        let mut game = self.store.checkout(id).await?;

        let action = match game.ensure_turn_of(player).and(action) {
            Ok(action) => action,
            Err(err) => {
                debug!(game_id = id, player, error = %err, "Turn rejected");
                return Err(err.into());
            }
        };
        let turn = Turn::new(action, player);

        let outcome = match game.play_turn(self.deck.as_ref(), &turn).await {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(game_id = id, player, %action, error = %err, "Turn rejected");
                return Err(err.into());
            }
        };

        if outcome.winner().is_some() {
            if let Some(deck) = game.deck_handle() {
                if let Err(err) = self.deck.release_deck(deck).await {
                    debug!(game_id = id, deck = %deck, error = %err, "Deck not released");
                }
            }
        }

        match &outcome {
            TurnOutcome::Blackjack { winner } => {
                info!(game_id = id, winner = %winner, "Game won with 21");
            }
            TurnOutcome::LastStanding { winner, busted } => {
                info!(game_id = id, winner = %winner, busted = %busted, "Game won by last player standing");
            }
            TurnOutcome::Continue {
                next_player,
                busted,
            } => {
                debug!(game_id = id, player, %action, next_player = %next_player, busted, "Turn played");
            }
        }
        Ok(game.view_for(player))
    }
}

#[async_trait]
impl GameBoundary for GameService {
    async fn get_game(&self, game_id: &str, caller: &str) -> Result<GameView, BoundaryError> {
        GameService::get_game(self, game_id, caller)
            .await
            .map_err(boundary_error)
    }

    async fn play_turn(
        &self,
        game_id: &str,
        player: &str,
        action: TurnAction,
    ) -> Result<GameView, BoundaryError> {
        self.apply_turn(game_id, player, Ok(action))
            .await
            .map_err(boundary_error)
    }
}

fn boundary_error(err: ServiceError) -> BoundaryError {
    match err {
        ServiceError::NotFound(id) => BoundaryError::NotFound(id),
        ServiceError::Game(GameError::DeckUnavailable(reason)) => BoundaryError::Unavailable(reason),
        ServiceError::StoragePoisoned => BoundaryError::Unavailable("game storage poisoned".into()),
        other => BoundaryError::Rejected(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackjack_engine::cards::{Card, Rank, Suit};
    use blackjack_engine::deck::{LocalDeckService, ScriptedDeck};

    fn service(ranks: &[Rank]) -> (GameService, Arc<ScriptedDeck>) {
        let deck = Arc::new(ScriptedDeck::new(
            ranks.iter().map(|&r| Card::new(Suit::Clubs, r)),
        ));
        let service = GameService::new(Arc::new(GameStore::new()), deck.clone());
        (service, deck)
    }

    #[tokio::test]
    async fn auto_dealer_needs_an_agent() {
        let (service, _) = service(&[Rank::Two; 4]);
        let err = service
            .new_game(vec!["Ann".into()], true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AgentUnavailable));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn invalid_action_is_rejected_for_the_next_player() {
        let (service, deck) = service(&[Rank::Two; 4]);
        let view = service.new_game(vec!["Ann".into()], false).await.unwrap();

        let err = service
            .play_turn(&view.game_id, DEALER_NAME, "split")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::InvalidAction(_))));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(deck.remaining(), 0);
    }

    #[tokio::test]
    async fn turn_order_is_checked_before_the_action_text() {
        let (service, _) = service(&[Rank::Two; 4]);
        let id = service
            .new_game(vec!["Ann".into()], false)
            .await
            .unwrap()
            .game_id;

        let err = service.play_turn(&id, "Ann", "split").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Game(GameError::OutOfTurn { ref expected, .. })
                if expected.as_deref() == Some(DEALER_NAME)
        ));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = service.play_turn(&id, "Zed", "split").await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::UnknownPlayer(_))));
    }

    #[tokio::test]
    async fn finished_games_give_their_deck_back() {
        let deck = Arc::new(LocalDeckService::with_seed(11));
        let service = GameService::new(Arc::new(GameStore::new()), deck.clone());
        let id = service
            .new_game(vec!["Ann".into()], false)
            .await
            .unwrap()
            .game_id;
        assert_eq!(deck.deck_count(), 1);

        // Keep hitting until someone wins with 21 or by outlasting a bust
        let mut view = service.get_game(&id, DEALER_NAME).await.unwrap();
        while let Some(next) = view.next_player.clone() {
            view = service.play_turn(&id, &next, "hit").await.unwrap();
        }
        assert!(view.winner.is_some());
        assert_eq!(deck.deck_count(), 0);
    }

    #[test]
    fn boundary_errors_keep_not_found_distinct() {
        assert_eq!(
            boundary_error(ServiceError::NotFound("x".into())),
            BoundaryError::NotFound("x".into())
        );
        assert!(matches!(
            boundary_error(GameError::UnknownPlayer("Zed".into()).into()),
            BoundaryError::Rejected(_)
        ));
        assert!(matches!(
            boundary_error(GameError::DeckUnavailable("down".into()).into()),
            BoundaryError::Unavailable(_)
        ));
    }

    #[test]
    fn error_codes_follow_the_game_error() {
        let err = ServiceError::from(GameError::OutOfTurn {
            player: "Ann".into(),
            expected: Some("Dealer".into()),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "out_of_turn");
        let details = err.error_details().unwrap();
        assert_eq!(details["expected"], "Dealer");
    }
}
