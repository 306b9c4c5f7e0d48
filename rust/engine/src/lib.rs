//! # blackjack-engine: Blackjack Rules Engine Core
//!
//! The authoritative rules for a multiplayer blackjack table: hand scoring,
//! turn order, bust handling and winner determination. Cards come from an
//! external deck collaborator one at a time, so the engine is async at the
//! edges but otherwise a plain state machine.
//!
//! ## Core Modules
//!
//! - [`cards`] - Card representation (Suit, Rank, Card)
//! - [`deck`] - The deck collaborator boundary and its local, scripted and timed providers
//! - [`hand`] - Hands and greedy blackjack scoring
//! - [`player`] - Player state, turn actions
//! - [`game`] - The game state machine
//! - [`view`] - Per-caller redacted views of a game
//! - [`errors`] - Error types for game operations
//!
//! ## Quick Start
//!
//! ```rust
//! use blackjack_engine::cards::{Card, Rank, Suit};
//! use blackjack_engine::hand::score_cards;
//!
//! let cards = [
//!     Card::new(Suit::Hearts, Rank::Ace),
//!     Card::new(Suit::Spades, Rank::Ace),
//!     Card::new(Suit::Clubs, Rank::Nine),
//! ];
//! assert_eq!(score_cards(&cards), 21);
//! ```

pub mod cards;
pub mod deck;
pub mod errors;
pub mod game;
pub mod hand;
pub mod player;
pub mod view;
