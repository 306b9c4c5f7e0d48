//! Per-caller views of a game.
//!
//! Blackjack is a hidden-information game: a caller may see their own hand
//! and the dealer's up card, nothing else. Every view handed out by the
//! service goes through [`Game::view_for`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::game::{Game, GameId, GameStatus};
use crate::player::{Player, DEALER_NAME};

/// One participant's hand as seen by a particular caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandView {
    pub cards: Vec<Card>,
    /// Zero whenever the hand is redacted.
    pub score: u32,
    pub bust: bool,
}

impl HandView {
    fn full(player: &Player) -> Self {
        Self {
            cards: player.cards().to_vec(),
            score: player.score(),
            bust: player.is_bust(),
        }
    }

    fn up_card(player: &Player) -> Self {
        Self {
            cards: player.cards().iter().take(1).copied().collect(),
            score: 0,
            bust: player.is_bust(),
        }
    }

    fn hidden(player: &Player) -> Self {
        Self {
            cards: Vec::new(),
            score: 0,
            bust: player.is_bust(),
        }
    }
}

/// Redacted snapshot of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub game_id: GameId,
    pub status: GameStatus,
    pub turn_order: Vec<String>,
    pub next_player: Option<String>,
    pub winner: Option<String>,
    pub hands: BTreeMap<String, HandView>,
}

impl GameView {
    pub fn hand(&self, name: &str) -> Option<&HandView> {
        self.hands.get(name)
    }

    pub fn is_turn_of(&self, name: &str) -> bool {
        self.next_player.as_deref() == Some(name)
    }
}

impl Game {
    /// Builds the view `caller` is allowed to see. An empty caller sees every
    /// player hand hidden.
    pub fn view_for(&self, caller: &str) -> GameView {
        let hands = self
            .players()
            .iter()
            .map(|(name, player)| {
                let hand = if name == caller {
                    HandView::full(player)
                } else if name == DEALER_NAME {
                    HandView::up_card(player)
                } else {
                    HandView::hidden(player)
                };
                (name.clone(), hand)
            })
            .collect();

        GameView {
            game_id: self.id().to_string(),
            status: self.status(),
            turn_order: self.turn_order().to_vec(),
            next_player: self.next_player().map(str::to_string),
            winner: self.winner().map(str::to_string),
            hands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Rank, Suit};
    use crate::deck::ScriptedDeck;

    async fn dealt_game() -> Game {
        let deck = ScriptedDeck::new(
            [
                Rank::Ten,
                Rank::Five,
                Rank::Two,
                Rank::Three,
                Rank::Four,
                Rank::Six,
            ]
            .map(|r| Card::new(Suit::Hearts, r)),
        );
        let mut game = Game::new("view");
        game.start(&deck, ["Ann", "Bob"]).await.unwrap();
        game
    }

    #[tokio::test]
    async fn player_sees_own_hand_and_dealer_up_card() {
        let view = dealt_game().await.view_for("Ann");

        let dealer = view.hand("Dealer").unwrap();
        assert_eq!(dealer.cards.len(), 1);
        assert_eq!(dealer.cards[0].rank, Rank::Ten);
        assert_eq!(dealer.score, 0);

        let ann = view.hand("Ann").unwrap();
        assert_eq!(ann.cards.len(), 2);
        assert_eq!(ann.score, 5);

        let bob = view.hand("Bob").unwrap();
        assert!(bob.cards.is_empty());
        assert_eq!(bob.score, 0);
    }

    #[tokio::test]
    async fn anonymous_caller_sees_no_player_hands() {
        let view = dealt_game().await.view_for("");
        assert_eq!(view.hand("Dealer").unwrap().cards.len(), 1);
        assert!(view.hand("Ann").unwrap().cards.is_empty());
        assert!(view.hand("Bob").unwrap().cards.is_empty());
        assert!(view.is_turn_of("Dealer"));
    }

    #[tokio::test]
    async fn dealer_sees_its_whole_hand() {
        let view = dealt_game().await.view_for(DEALER_NAME);
        let dealer = view.hand(DEALER_NAME).unwrap();
        assert_eq!(dealer.cards.len(), 2);
        assert_eq!(dealer.score, 15);
    }
}
