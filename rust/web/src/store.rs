//! In-memory game storage.
//!
//! The outer map lock is only held long enough to find or insert a slot;
//! each game then sits behind its own async mutex. Work on different games
//! never contends, and [`GameStore::checkout`] gives a caller the whole
//! fetch, mutate and write-back cycle on one game to itself.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use blackjack_engine::game::{Game, GameId};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Game not found: {0}")]
    NotFound(GameId),
    #[error("Game already exists: {0}")]
    AlreadyExists(GameId),
    #[error("Game storage poisoned")]
    Poisoned,
}

type Slot = Arc<Mutex<Game>>;

/// Exclusive access to one stored game. Changes made through the guard are
/// the stored state; dropping it releases the game.
pub type GameGuard = OwnedMutexGuard<Game>;

#[derive(Debug, Default)]
pub struct GameStore {
    games: RwLock<HashMap<GameId, Slot>>,
}

impl GameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored game.
    pub async fn get(&self, id: &str) -> Result<Game, StoreError> {
        let slot = self.slot(id)?;
        let game = slot.lock().await;
        Ok(game.clone())
    }

    /// Stores `game` under `id`, replacing whatever was there.
    ///
    /// Nothing stops a caller from writing back a stale snapshot taken with
    /// [`get`](Self::get); use [`checkout`](Self::checkout) when the write
    /// depends on the current state.
    pub async fn put(&self, id: &str, game: Game) -> Result<(), StoreError> {
        let slot = {
            let mut games = self.games.write().map_err(|_| StoreError::Poisoned)?;
            match games.get(id).cloned() {
                Some(slot) => slot,
                None => {
                    games.insert(id.to_string(), Arc::new(Mutex::new(game)));
                    return Ok(());
                }
            }
        };
        *slot.lock().await = game;
        Ok(())
    }

    /// Inserts a new game under its own id. Fails if the id is taken.
    pub fn insert_new(&self, game: Game) -> Result<(), StoreError> {
        let mut games = self.games.write().map_err(|_| StoreError::Poisoned)?;
        let id = game.id().to_string();
        if games.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        games.insert(id, Arc::new(Mutex::new(game)));
        Ok(())
    }

    /// Drops the game stored under `id`. Holders of an earlier checkout keep
    /// their guard, but the game can no longer be looked up.
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut games = self.games.write().map_err(|_| StoreError::Poisoned)?;
        games
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Locks the game for a read-modify-write cycle.
    ///
    /// Other checkouts and reads of the same id wait until the guard is
    /// dropped. Other ids are unaffected.
    pub async fn checkout(&self, id: &str) -> Result<GameGuard, StoreError> {
        let slot = self.slot(id)?;
        Ok(slot.lock_owned().await)
    }

    pub fn ids(&self) -> Result<Vec<GameId>, StoreError> {
        let games = self.games.read().map_err(|_| StoreError::Poisoned)?;
        let mut ids: Vec<GameId> = games.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn len(&self) -> usize {
        self.games.read().map(|games| games.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: &str) -> Result<Slot, StoreError> {
        let games = self.games.read().map_err(|_| StoreError::Poisoned)?;
        games
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_is_visible_to_later_get() {
        let store = GameStore::new();
        assert_eq!(
            store.get("a").await,
            Err(StoreError::NotFound("a".into()))
        );

        store.put("a", Game::new("a")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().id(), "a");

        store.put("a", Game::new("renamed")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().id(), "renamed");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_new_rejects_taken_ids() {
        let store = GameStore::new();
        store.insert_new(Game::new("b")).unwrap();
        store.insert_new(Game::new("a")).unwrap();
        assert_eq!(
            store.insert_new(Game::new("a")),
            Err(StoreError::AlreadyExists("a".into()))
        );
        assert_eq!(store.ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn removed_games_are_gone() {
        let store = GameStore::new();
        store.insert_new(Game::new("a")).unwrap();
        store.remove("a").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.remove("a"), Err(StoreError::NotFound("a".into())));
    }
}
