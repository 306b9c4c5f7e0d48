pub mod games;
pub mod health;

pub use games::{
    create_game, get_game, list_auto_players, play_turn, register_auto_player, AutoPlayerRequest,
    CreateGameRequest, TurnRequest, ViewQuery,
};
pub use health::health;
