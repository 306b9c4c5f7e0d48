use std::fmt;
use std::str::FromStr;

use blackjack_engine::player::TurnAction;
use blackjack_engine::view::HandView;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The dealer keeps drawing below this score.
pub const DEALER_STAND_THRESHOLD: u32 = 17;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// Decision rules an automated seat can play with.
///
/// Strategies only ever look at the hand they were dealt, so `decide` is a
/// pure function of the visible cards and score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// House rule: hit below 17, otherwise stand
    Dealer,
    /// Hits no matter what
    Greedy,
}

impl Strategy {
    pub fn decide(&self, hand: &HandView) -> TurnAction {
        match self {
            Strategy::Dealer if hand.score < DEALER_STAND_THRESHOLD => TurnAction::Hit,
            Strategy::Dealer => TurnAction::Stand,
            Strategy::Greedy => TurnAction::Hit,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Dealer => "dealer",
            Strategy::Greedy => "greedy",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dealer" => Ok(Strategy::Dealer),
            "greedy" => Ok(Strategy::Greedy),
            _ => Err(StrategyError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Looks a strategy up by its registration name.
///
/// # Supported names
///
/// - `"dealer"` - [`Strategy::Dealer`]
/// - `"greedy"` - [`Strategy::Greedy`]
///
/// # Example
///
/// ```rust
/// use blackjack_ai::create_strategy;
///
/// let strategy = create_strategy("Dealer").unwrap();
/// assert_eq!(strategy.name(), "dealer");
/// assert!(create_strategy("card-counter").is_err());
/// ```
pub fn create_strategy(name: &str) -> Result<Strategy, StrategyError> {
    name.parse()
}
