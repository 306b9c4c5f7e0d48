use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::deck::{DeckHandle, DeckProvider};
use crate::errors::GameError;
use crate::hand::BLACKJACK;
use crate::player::{Player, Turn, TurnAction, DEALER_NAME};

pub type GameId = String;

/// Lifecycle of a game. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Created but no cards dealt yet
    NotStarted,
    /// Waiting for `next_player` to act
    AwaitingPlayer,
    /// A winner has been decided
    Finished,
}

/// How a successful turn resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The acting player reached exactly 21 and won.
    Blackjack { winner: String },
    /// The acting player busted and only `winner` is left standing.
    LastStanding { winner: String, busted: String },
    /// Play moves on to `next_player`.
    Continue { next_player: String, busted: bool },
}

impl TurnOutcome {
    pub fn winner(&self) -> Option<&str> {
        match self {
            TurnOutcome::Blackjack { winner } | TurnOutcome::LastStanding { winner, .. } => {
                Some(winner)
            }
            TurnOutcome::Continue { .. } => None,
        }
    }
}

/// The blackjack state machine.
///
/// A game owns every participant keyed by name plus a fixed turn order with
/// the dealer first. Busted players are only flagged: the turn order is never
/// rewritten, and "players left" is always counted from the live player set.
///
/// # Examples
///
/// ```
/// use blackjack_engine::cards::{Card, Rank, Suit};
/// use blackjack_engine::deck::ScriptedDeck;
/// use blackjack_engine::game::{Game, GameStatus};
/// use blackjack_engine::player::Turn;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let deck = ScriptedDeck::new([
///     Card::new(Suit::Clubs, Rank::Ten),
///     Card::new(Suit::Clubs, Rank::Six),
///     Card::new(Suit::Hearts, Rank::Ace),
///     Card::new(Suit::Hearts, Rank::King),
/// ]);
/// let mut game = Game::new("table-1");
/// game.start(&deck, ["Alice"]).await.unwrap();
/// assert_eq!(game.next_player(), Some("Dealer"));
///
/// game.play_turn(&deck, &Turn::stand("Dealer")).await.unwrap();
/// game.play_turn(&deck, &Turn::stand("Alice")).await.unwrap();
/// assert_eq!(game.status(), GameStatus::Finished);
/// assert_eq!(game.winner(), Some("Alice"));
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    id: GameId,
    status: GameStatus,
    players: BTreeMap<String, Player>,
    turn_order: Vec<String>,
    next_player: Option<String>,
    winner: Option<String>,
}

impl Game {
    pub fn new(id: impl Into<GameId>) -> Self {
        Self {
            id: id.into(),
            status: GameStatus::NotStarted,
            players: BTreeMap::new(),
            turn_order: Vec::new(),
            next_player: None,
            winner: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    pub fn players(&self) -> &BTreeMap<String, Player> {
        &self.players
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    pub fn turn_order(&self) -> &[String] {
        &self.turn_order
    }

    pub fn next_player(&self) -> Option<&str> {
        self.next_player.as_deref()
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Deals the opening hands and hands the first turn to the dealer.
    ///
    /// A fresh shuffled deck is requested from `deck`, then the dealer and each
    /// named player receive two cards in turn order. Nothing is committed
    /// unless every card was dealt.
    ///
    /// # Errors
    ///
    /// - [`GameError::AlreadyStarted`] if the game left `NotStarted`
    /// - [`GameError::EmptyRoster`] if no players were named
    /// - [`GameError::DuplicatePlayer`] for a repeated name or one that clashes with the dealer
    /// - [`GameError::DeckUnavailable`] if the deck collaborator failed
    pub async fn start<D, I, S>(&mut self, deck: &D, names: I) -> Result<(), GameError>
    where
        D: DeckProvider + ?Sized,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.status != GameStatus::NotStarted {
            return Err(GameError::AlreadyStarted);
        }

        let mut turn_order = vec![DEALER_NAME.to_string()];
        for name in names {
            let name = name.into();
            if turn_order.contains(&name) {
                return Err(GameError::DuplicatePlayer(name));
            }
            turn_order.push(name);
        }
        if turn_order.len() < 2 {
            return Err(GameError::EmptyRoster);
        }

        let handle = deck.create_deck(true).await?;
        let mut players = BTreeMap::new();
        for name in &turn_order {
            let mut player = Player::new(handle.clone());
            for _ in 0..2 {
                player.draw(deck).await?;
            }
            players.insert(name.clone(), player);
        }

        self.players = players;
        self.next_player = Some(DEALER_NAME.to_string());
        self.turn_order = turn_order;
        self.status = GameStatus::AwaitingPlayer;
        Ok(())
    }

    /// Checks that `name` may act right now, without touching the game.
    ///
    /// Errors come in this order: [`GameError::OutOfTurn`] when the game is
    /// not awaiting a player, [`GameError::UnknownPlayer`] for a name outside
    /// the roster, then [`GameError::OutOfTurn`] when someone else is next.
    pub fn ensure_turn_of(&self, name: &str) -> Result<(), GameError> {
        if self.status != GameStatus::AwaitingPlayer {
            return Err(self.out_of_turn(name));
        }
        if !self.players.contains_key(name) {
            return Err(GameError::UnknownPlayer(name.to_string()));
        }
        if self.next_player.as_deref() != Some(name) {
            return Err(self.out_of_turn(name));
        }
        Ok(())
    }

    /// Plays one turn for `turn.player_name`.
    ///
    /// Preconditions are those of [`ensure_turn_of`](Self::ensure_turn_of),
    /// in the same order. A rejected turn leaves every field of the game
    /// unchanged, including when the deck fails halfway through a hit.
    pub async fn play_turn<D>(&mut self, deck: &D, turn: &Turn) -> Result<TurnOutcome, GameError>
    where
        D: DeckProvider + ?Sized,
    {
        let name = turn.player_name.as_str();
        self.ensure_turn_of(name)?;

        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;
        match turn.action {
            TurnAction::Hit => {
                player.draw(deck).await?;
            }
            TurnAction::Stand => player.recompute_score(),
        }

        let score = player.score();
        let busted = player.is_bust();

        if score == BLACKJACK {
            self.finish(name);
            return Ok(TurnOutcome::Blackjack {
                winner: name.to_string(),
            });
        }

        if busted {
            let live: Vec<String> = self.live_players().map(str::to_string).collect();
            if let [winner] = live.as_slice() {
                let winner = winner.clone();
                self.finish(&winner);
                return Ok(TurnOutcome::LastStanding {
                    winner,
                    busted: name.to_string(),
                });
            }
        }

        let next_player = self.player_after(name);
        self.next_player = Some(next_player.clone());
        Ok(TurnOutcome::Continue {
            next_player,
            busted,
        })
    }

    /// Deck the opening hands were dealt from, once the game has started.
    pub fn deck_handle(&self) -> Option<&DeckHandle> {
        self.players.values().next().map(|p| p.hand().deck())
    }

    /// Cards currently held by `name`, if such a player exists.
    pub fn cards_of(&self, name: &str) -> Option<&[Card]> {
        self.players.get(name).map(Player::cards)
    }

    fn live_players(&self) -> impl Iterator<Item = &str> {
        self.players
            .iter()
            .filter(|(_, p)| !p.is_bust())
            .map(|(name, _)| name.as_str())
    }

    /// Next non-bust player after `current` in turn order, wrapping around.
    /// Falls back to `current` when nobody else is still in.
    fn player_after(&self, current: &str) -> String {
        let Some(start) = self.turn_order.iter().position(|n| n == current) else {
            return current.to_string();
        };
        let len = self.turn_order.len();
        (1..=len)
            .map(|step| &self.turn_order[(start + step) % len])
            .find(|name| self.players.get(*name).is_some_and(|p| !p.is_bust()))
            .cloned()
            .unwrap_or_else(|| current.to_string())
    }

    fn finish(&mut self, winner: &str) {
        self.status = GameStatus::Finished;
        self.winner = Some(winner.to_string());
        self.next_player = None;
    }

    fn out_of_turn(&self, player: &str) -> GameError {
        GameError::OutOfTurn {
            player: player.to_string(),
            expected: self.next_player.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Rank, Suit};
    use crate::deck::ScriptedDeck;

    fn card(rank: Rank) -> Card {
        Card::new(Suit::Diamonds, rank)
    }

    fn deck(ranks: &[Rank]) -> ScriptedDeck {
        ScriptedDeck::new(ranks.iter().map(|&r| card(r)))
    }

    #[tokio::test]
    async fn start_rejects_bad_rosters() {
        let d = deck(&[Rank::Two; 12]);
        let mut game = Game::new("g");
        assert_eq!(
            game.start(&d, Vec::<String>::new()).await,
            Err(GameError::EmptyRoster)
        );
        assert_eq!(
            game.start(&d, ["Ann", "Ann"]).await,
            Err(GameError::DuplicatePlayer("Ann".into()))
        );
        assert_eq!(
            game.start(&d, ["Dealer"]).await,
            Err(GameError::DuplicatePlayer("Dealer".into()))
        );
        assert_eq!(game.status(), GameStatus::NotStarted);
        assert_eq!(d.remaining(), 12);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let d = deck(&[Rank::Two; 8]);
        let mut game = Game::new("g");
        game.start(&d, ["Ann"]).await.unwrap();
        assert_eq!(game.start(&d, ["Bob"]).await, Err(GameError::AlreadyStarted));
    }

    #[tokio::test]
    async fn stand_with_everyone_live_moves_to_next_player() {
        let d = deck(&[Rank::Ten, Rank::Seven, Rank::Two, Rank::Three, Rank::Four, Rank::Five]);
        let mut game = Game::new("g");
        game.start(&d, ["Ann", "Bob"]).await.unwrap();

        let outcome = game.play_turn(&d, &Turn::stand("Dealer")).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Continue {
                next_player: "Ann".into(),
                busted: false
            }
        );
        game.play_turn(&d, &Turn::stand("Ann")).await.unwrap();
        game.play_turn(&d, &Turn::stand("Bob")).await.unwrap();
        assert_eq!(game.next_player(), Some("Dealer"));
    }

    #[tokio::test]
    async fn player_after_wraps_and_self_loops() {
        let d = deck(&[Rank::Two; 6]);
        let mut game = Game::new("g");
        game.start(&d, ["Ann", "Bob"]).await.unwrap();
        assert_eq!(game.player_after("Bob"), "Dealer");
        assert_eq!(game.player_after("Dealer"), "Ann");

        for name in ["Dealer", "Ann"] {
            game.players.get_mut(name).unwrap().mark_bust();
        }
        assert_eq!(game.player_after("Bob"), "Bob");
    }

    #[tokio::test]
    async fn turn_checks_run_in_a_fixed_order() {
        let d = deck(&[Rank::Two; 6]);
        let mut game = Game::new("g");
        assert!(game.deck_handle().is_none());
        assert!(matches!(
            game.ensure_turn_of("Zed"),
            Err(GameError::OutOfTurn { expected: None, .. })
        ));

        game.start(&d, ["Ann"]).await.unwrap();
        assert!(game.deck_handle().is_some());
        assert_eq!(
            game.ensure_turn_of("Zed"),
            Err(GameError::UnknownPlayer("Zed".into()))
        );
        assert_eq!(
            game.ensure_turn_of("Ann"),
            Err(GameError::OutOfTurn {
                player: "Ann".into(),
                expected: Some("Dealer".into()),
            })
        );
        assert_eq!(game.ensure_turn_of("Dealer"), Ok(()));
    }
}
