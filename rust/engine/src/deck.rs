//! The deck collaborator boundary.
//!
//! Games never own a deck. They hold a [`DeckHandle`] obtained from a
//! [`DeckProvider`] and ask the provider for one card at a time, exactly the
//! way a remote deck service is consumed. [`LocalDeckService`] is the
//! in-process provider used by the server, [`ScriptedDeck`] deals a fixed
//! sequence for replays and tests, and [`TimedDeck`] bounds every call so a
//! stalled provider cannot stall a turn.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cards::{full_deck, Card};

/// Opaque identifier of a deck living inside a [`DeckProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckHandle(String);

impl DeckHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeckError {
    #[error("unknown deck {0}")]
    UnknownDeck(DeckHandle),
    #[error("deck {0} has no cards left")]
    Exhausted(DeckHandle),
    #[error("deck provider unavailable: {0}")]
    Unavailable(String),
    #[error("deck provider did not answer within {0:?}")]
    Timeout(Duration),
}

/// Creates decks and deals single cards from them.
#[async_trait]
pub trait DeckProvider: Send + Sync {
    /// Creates a new deck, shuffled when `shuffle` is set.
    async fn create_deck(&self, shuffle: bool) -> Result<DeckHandle, DeckError>;

    /// Deals exactly one card from the given deck.
    async fn fetch_card(&self, deck: &DeckHandle) -> Result<Card, DeckError>;

    /// Forgets a deck that no game will draw from again.
    async fn release_deck(&self, _deck: &DeckHandle) -> Result<(), DeckError> {
        Ok(())
    }
}

/// A single 52-card deck with its own deterministic RNG.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
    position: usize,
    rng: ChaCha20Rng,
}

impl Deck {
    pub fn new_with_seed(seed: u64) -> Self {
        let rng = ChaCha20Rng::seed_from_u64(seed);
        // Keep initial order until shuffle is called explicitly
        Self {
            cards: full_deck(),
            position: 0,
            rng,
        }
    }

    pub fn shuffle(&mut self) {
        self.cards = full_deck();
        self.cards.shuffle(&mut self.rng);
        self.position = 0;
    }

    pub fn deal_card(&mut self) -> Option<Card> {
        let card = self.cards.get(self.position).copied()?;
        self.position += 1;
        Some(card)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.position)
    }
}

/// In-process deck service.
///
/// With a base seed every deck it creates is reproducible: deck `n` is
/// shuffled with `base_seed + n`. Without one each deck draws a fresh seed.
#[derive(Debug, Default)]
pub struct LocalDeckService {
    decks: Mutex<HashMap<DeckHandle, Deck>>,
    next_id: AtomicU64,
    base_seed: Option<u64>,
}

impl LocalDeckService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            base_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Number of decks currently tracked.
    pub fn deck_count(&self) -> usize {
        self.decks.lock().map(|decks| decks.len()).unwrap_or(0)
    }

    pub fn remaining(&self, deck: &DeckHandle) -> Option<usize> {
        let decks = self.decks.lock().ok()?;
        decks.get(deck).map(Deck::remaining)
    }

    fn poisoned() -> DeckError {
        DeckError::Unavailable("deck storage poisoned".into())
    }
}

#[async_trait]
impl DeckProvider for LocalDeckService {
    async fn create_deck(&self, shuffle: bool) -> Result<DeckHandle, DeckError> {
        let n = self.next_id.fetch_add(1, Ordering::AcqRel);
        let seed = match self.base_seed {
            Some(base) => base.wrapping_add(n),
            None => rand::random(),
        };
        let mut deck = Deck::new_with_seed(seed);
        if shuffle {
            deck.shuffle();
        }

        let handle = DeckHandle::new(format!("deck-{n}"));
        self.decks
            .lock()
            .map_err(|_| Self::poisoned())?
            .insert(handle.clone(), deck);
        Ok(handle)
    }

    async fn fetch_card(&self, deck: &DeckHandle) -> Result<Card, DeckError> {
        let mut decks = self.decks.lock().map_err(|_| Self::poisoned())?;
        let entry = decks
            .get_mut(deck)
            .ok_or_else(|| DeckError::UnknownDeck(deck.clone()))?;
        entry
            .deal_card()
            .ok_or_else(|| DeckError::Exhausted(deck.clone()))
    }

    async fn release_deck(&self, deck: &DeckHandle) -> Result<(), DeckError> {
        self.decks
            .lock()
            .map_err(|_| Self::poisoned())?
            .remove(deck)
            .map(|_| ())
            .ok_or_else(|| DeckError::UnknownDeck(deck.clone()))
    }
}

/// Deals a predetermined card sequence, shared by every deck it creates.
///
/// Can be flipped into a failing mode to simulate an unreachable provider.
#[derive(Debug, Default)]
pub struct ScriptedDeck {
    cards: Mutex<VecDeque<Card>>,
    failing: AtomicBool,
    created: AtomicU64,
}

impl ScriptedDeck {
    pub fn new(cards: impl IntoIterator<Item = Card>) -> Self {
        Self {
            cards: Mutex::new(cards.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Appends more cards to the end of the script.
    pub fn push_cards(&self, cards: impl IntoIterator<Item = Card>) {
        if let Ok(mut queue) = self.cards.lock() {
            queue.extend(cards);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub fn remaining(&self) -> usize {
        self.cards.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), DeckError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(DeckError::Unavailable("scripted outage".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeckProvider for ScriptedDeck {
    async fn create_deck(&self, _shuffle: bool) -> Result<DeckHandle, DeckError> {
        self.check_available()?;
        let n = self.created.fetch_add(1, Ordering::AcqRel);
        Ok(DeckHandle::new(format!("scripted-{n}")))
    }

    async fn fetch_card(&self, deck: &DeckHandle) -> Result<Card, DeckError> {
        self.check_available()?;
        let mut queue = self
            .cards
            .lock()
            .map_err(|_| DeckError::Unavailable("script poisoned".into()))?;
        queue
            .pop_front()
            .ok_or_else(|| DeckError::Exhausted(deck.clone()))
    }
}

/// Bounds every call to the wrapped provider with `timeout`.
#[derive(Debug)]
pub struct TimedDeck<D> {
    inner: D,
    timeout: Duration,
}

impl<D> TimedDeck<D> {
    pub fn new(inner: D, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: DeckProvider> DeckProvider for TimedDeck<D> {
    async fn create_deck(&self, shuffle: bool) -> Result<DeckHandle, DeckError> {
        tokio::time::timeout(self.timeout, self.inner.create_deck(shuffle))
            .await
            .map_err(|_| DeckError::Timeout(self.timeout))?
    }

    async fn fetch_card(&self, deck: &DeckHandle) -> Result<Card, DeckError> {
        tokio::time::timeout(self.timeout, self.inner.fetch_card(deck))
            .await
            .map_err(|_| DeckError::Timeout(self.timeout))?
    }

    async fn release_deck(&self, deck: &DeckHandle) -> Result<(), DeckError> {
        tokio::time::timeout(self.timeout, self.inner.release_deck(deck))
            .await
            .map_err(|_| DeckError::Timeout(self.timeout))?
    }
}
