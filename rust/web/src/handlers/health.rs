use serde::Serialize;
use warp::reply::Json;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    games: usize,
}

pub fn health(games: usize) -> Json {
    warp::reply::json(&HealthBody {
        status: "ok",
        games,
    })
}
