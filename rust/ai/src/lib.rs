//! # blackjack-ai: Automated Blackjack Players
//!
//! Lets a table run without a human in every seat. A [`Strategy`] picks hit
//! or stand from the visible hand; the [`Agent`] polls registered games over a
//! [`GameBoundary`] and plays for its entries whenever their turn comes up.
//!
//! ## Core Components
//!
//! - [`strategy`] - The closed set of decision rules and [`create_strategy`]
//! - [`boundary`] - The game surface the agent plays through
//! - [`agent`] - The registry, polling loop and its mailbox handle
//!
//! ## Quick Start
//!
//! ```rust
//! use blackjack_ai::{create_strategy, Strategy};
//! use blackjack_engine::player::TurnAction;
//! use blackjack_engine::view::HandView;
//!
//! let dealer = create_strategy("dealer").unwrap();
//! let hand = HandView { cards: Vec::new(), score: 16, bust: false };
//! assert_eq!(dealer.decide(&hand), TurnAction::Hit);
//! assert_eq!(Strategy::Greedy.decide(&hand), TurnAction::Hit);
//! ```

pub mod agent;
pub mod boundary;
pub mod strategy;

pub use agent::{
    Agent, AgentConfig, AgentError, AgentHandle, AgentRuntime, AutoPlayer, RemovalReason,
    TickReport,
};
pub use boundary::{BoundaryError, GameBoundary};
pub use strategy::{create_strategy, Strategy, StrategyError};
