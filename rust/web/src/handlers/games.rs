use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

use crate::errors::IntoErrorResponse;
use crate::service::{GameService, ServiceError};

fn default_auto_dealer() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateGameRequest {
    pub players: Vec<String>,
    /// Hand the dealer seat to the agent
    #[serde(default = "default_auto_dealer")]
    pub auto_dealer: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    pub player: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TurnRequest {
    pub player: String,
    pub action: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutoPlayerRequest {
    pub player: String,
    pub strategy: String,
}

/// `POST /api/games`
///
/// Deals a new table and answers `201 Created` with the anonymous view, in
/// which only the dealer's up card is visible.
///
/// # Errors
/// - `400 empty_roster` / `400 duplicate_player` for a bad player list
/// - `503 deck_unavailable` when no cards could be dealt; nothing is stored
/// - `503 agent_unavailable` when `auto_dealer` is set but no agent runs
pub async fn create_game(service: Arc<GameService>, request: CreateGameRequest) -> Response {
    match service.new_game(request.players, request.auto_dealer).await {
        Ok(view) => reply::with_status(reply::json(&view), StatusCode::CREATED).into_response(),
        Err(err) => error_response(err),
    }
}

/// `GET /api/games/{id}?player=NAME`
///
/// The view is redacted for `player`; without it every player hand is hidden.
pub async fn get_game(service: Arc<GameService>, game_id: String, query: ViewQuery) -> Response {
    let caller = query.player.unwrap_or_default();
    match service.get_game(&game_id, &caller).await {
        Ok(view) => reply::json(&view).into_response(),
        Err(err) => error_response(err),
    }
}

/// `POST /api/games/{id}/turns`
///
/// Plays `hit` or `stand` for `player`. A rejected turn leaves the game
/// exactly as it was, so the caller may simply retry.
pub async fn play_turn(service: Arc<GameService>, game_id: String, request: TurnRequest) -> Response {
    match service
        .play_turn(&game_id, &request.player, &request.action)
        .await
    {
        Ok(view) => reply::json(&view).into_response(),
        Err(err) => error_response(err),
    }
}

/// `POST /api/games/{id}/auto-players` answers `202 Accepted`: the agent
/// acts on its next polling pass, not during this request.
pub async fn register_auto_player(
    service: Arc<GameService>,
    game_id: String,
    request: AutoPlayerRequest,
) -> Response {
    match service
        .register_auto_player(&game_id, &request.player, &request.strategy)
        .await
    {
        Ok(entry) => reply::with_status(reply::json(&entry), StatusCode::ACCEPTED).into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn list_auto_players(service: Arc<GameService>) -> Response {
    match service.auto_players().await {
        Ok(entries) => reply::json(&entries).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ServiceError) -> Response {
    err.into_http_response()
}
