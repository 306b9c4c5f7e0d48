use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cards::Card;
use crate::deck::{DeckHandle, DeckProvider};
use crate::errors::GameError;
use crate::hand::{score_cards, Hand, BLACKJACK};

/// Name the dealer always plays under. The dealer acts first.
pub const DEALER_NAME: &str = "Dealer";

/// What a participant does on their turn.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    /// Pull another card into the hand
    Hit,
    /// Keep the current hand
    Stand,
}

impl TurnAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnAction::Hit => "hit",
            TurnAction::Stand => "stand",
        }
    }
}

impl fmt::Display for TurnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnAction {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hit" => Ok(TurnAction::Hit),
            "stand" => Ok(TurnAction::Stand),
            _ => Err(GameError::InvalidAction(s.to_string())),
        }
    }
}

/// A turn submitted by `player_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub action: TurnAction,
    pub player_name: String,
}

impl Turn {
    pub fn new(action: TurnAction, player_name: impl Into<String>) -> Self {
        Self {
            action,
            player_name: player_name.into(),
        }
    }

    pub fn hit(player_name: impl Into<String>) -> Self {
        Self::new(TurnAction::Hit, player_name)
    }

    pub fn stand(player_name: impl Into<String>) -> Self {
        Self::new(TurnAction::Stand, player_name)
    }
}

/// Represents a participant's hand together with its derived score.
/// `score` and `bust` are refreshed on every hand mutation, so a player is
/// never observed with a stale score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    hand: Hand,
    score: u32,
    bust: bool,
}

impl Player {
    pub fn new(deck: DeckHandle) -> Self {
        Self {
            hand: Hand::new(deck),
            score: 0,
            bust: false,
        }
    }

    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    pub fn cards(&self) -> &[Card] {
        self.hand.cards()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_bust(&self) -> bool {
        self.bust
    }

    pub fn has_blackjack(&self) -> bool {
        self.score == BLACKJACK
    }

    /// Draws a card into the hand and rescores.
    pub async fn draw<D>(&mut self, deck: &D) -> Result<Card, GameError>
    where
        D: DeckProvider + ?Sized,
    {
        let card = self.hand.pull_card(deck).await?;
        self.recompute_score();
        Ok(card)
    }

    pub fn recompute_score(&mut self) {
        self.score = score_cards(self.hand.cards());
        self.bust = self.score > BLACKJACK;
    }

    #[cfg(test)]
    pub(crate) fn mark_bust(&mut self) {
        self.bust = true;
    }
}
