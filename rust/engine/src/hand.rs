use serde::{Deserialize, Serialize};

use crate::cards::{Card, Rank};
use crate::deck::{DeckHandle, DeckProvider};
use crate::errors::GameError;

/// Best possible score; reaching it exactly wins the game outright.
pub const BLACKJACK: u32 = 21;

/// An ordered, append-only run of cards dealt from one deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    cards: Vec<Card>,
    deck: DeckHandle,
}

impl Hand {
    pub fn new(deck: DeckHandle) -> Self {
        Self {
            cards: Vec::new(),
            deck,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn deck(&self) -> &DeckHandle {
        &self.deck
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Pulls one card from the hand's deck. On failure the hand is untouched.
    pub async fn pull_card<D>(&mut self, deck: &D) -> Result<Card, GameError>
    where
        D: DeckProvider + ?Sized,
    {
        let card = deck.fetch_card(&self.deck).await?;
        self.cards.push(card);
        Ok(card)
    }
}

/// Scores cards left to right.
///
/// Court cards count 10. An ace counts 11 unless that would take the running
/// total past 21, in which case it counts 1. An ace is never revalued once a
/// later card arrives, so `[A, 9, 5]` scores 25 rather than 15; this greedy
/// reading is the house rule.
pub fn score_cards(cards: &[Card]) -> u32 {
    cards.iter().fold(0, |total, card| {
        let value = match card.rank {
            Rank::Ace if total + 11 <= BLACKJACK => 11,
            Rank::Ace => 1,
            other => u32::from(other.value()).min(10),
        };
        total + value
    })
}
