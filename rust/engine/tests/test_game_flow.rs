use blackjack_engine::cards::{Card, Rank, Suit};
use blackjack_engine::deck::ScriptedDeck;
use blackjack_engine::errors::GameError;
use blackjack_engine::game::{Game, GameStatus, TurnOutcome};
use blackjack_engine::player::Turn;

fn scripted(ranks: &[Rank]) -> ScriptedDeck {
    ScriptedDeck::new(ranks.iter().map(|&rank| Card::new(Suit::Clubs, rank)))
}

async fn started(deck: &ScriptedDeck, players: &[&str]) -> Game {
    let mut game = Game::new("flow");
    game.start(deck, players.iter().copied())
        .await
        .expect("start game");
    game
}

#[tokio::test]
async fn start_puts_dealer_first_and_waits_for_dealer() {
    let deck = scripted(&[Rank::Two; 6]);
    let game = started(&deck, &["Alice", "Bob"]).await;

    assert_eq!(game.turn_order(), ["Dealer", "Alice", "Bob"]);
    assert_eq!(game.status(), GameStatus::AwaitingPlayer);
    assert_eq!(game.next_player(), Some("Dealer"));
    assert_eq!(game.winner(), None);
    assert!(game.players().values().all(|p| p.cards().len() == 2));
    assert_eq!(deck.remaining(), 0, "two cards dealt to each of three players");
}

#[tokio::test]
async fn out_of_turn_rejection_changes_nothing() {
    let deck = scripted(&[Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven, Rank::Eight]);
    let mut game = started(&deck, &["Alice", "Bob"]).await;
    let before = game.clone();

    for _ in 0..2 {
        let err = game.play_turn(&deck, &Turn::hit("Alice")).await.unwrap_err();
        assert_eq!(
            err,
            GameError::OutOfTurn {
                player: "Alice".into(),
                expected: Some("Dealer".into())
            }
        );
        assert_eq!(game, before);
    }
    assert_eq!(deck.remaining(), 1, "rejected hit must not draw");
}

#[tokio::test]
async fn unknown_player_is_reported() {
    let deck = scripted(&[Rank::Two; 4]);
    let mut game = started(&deck, &["Alice"]).await;
    let before = game.clone();

    let err = game.play_turn(&deck, &Turn::stand("Mallory")).await.unwrap_err();
    assert_eq!(err, GameError::UnknownPlayer("Mallory".into()));
    assert_eq!(game, before);
}

#[tokio::test]
async fn exactly_twenty_one_wins_immediately() {
    // Dealer 10+6, Alice 10+5, Bob 2+3, then Alice draws a 6
    let deck = scripted(&[
        Rank::Ten,
        Rank::Six,
        Rank::Ten,
        Rank::Five,
        Rank::Two,
        Rank::Three,
        Rank::Six,
    ]);
    let mut game = started(&deck, &["Alice", "Bob"]).await;

    game.play_turn(&deck, &Turn::stand("Dealer")).await.unwrap();
    let outcome = game.play_turn(&deck, &Turn::hit("Alice")).await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Blackjack {
            winner: "Alice".into()
        }
    );
    assert_eq!(game.status(), GameStatus::Finished);
    assert_eq!(game.winner(), Some("Alice"));
    assert_eq!(game.next_player(), None);

    // Bob never got to play, and never will
    let err = game.play_turn(&deck, &Turn::stand("Bob")).await.unwrap_err();
    assert!(matches!(err, GameError::OutOfTurn { .. }));
    assert!(game.is_finished());
}

#[tokio::test]
async fn busted_players_are_skipped_until_one_is_left() {
    let deck = scripted(&[
        Rank::Ten,
        Rank::Seven, // Dealer 17
        Rank::Ten,
        Rank::Five, // Alice 15
        Rank::Nine,
        Rank::Eight, // Bob 17
        Rank::King,  // Alice busts
        Rank::Queen, // Bob busts
    ]);
    let mut game = started(&deck, &["Alice", "Bob"]).await;

    game.play_turn(&deck, &Turn::stand("Dealer")).await.unwrap();
    let outcome = game.play_turn(&deck, &Turn::hit("Alice")).await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Continue {
            next_player: "Bob".into(),
            busted: true
        }
    );
    assert!(game.player("Alice").unwrap().is_bust());
    assert_eq!(game.player("Alice").unwrap().score(), 25);
    assert_eq!(game.turn_order(), ["Dealer", "Alice", "Bob"], "turn order is never rewritten");

    game.play_turn(&deck, &Turn::stand("Bob")).await.unwrap();
    assert_eq!(game.next_player(), Some("Dealer"));
    game.play_turn(&deck, &Turn::stand("Dealer")).await.unwrap();
    assert_eq!(game.next_player(), Some("Bob"), "Alice is skipped");

    let outcome = game.play_turn(&deck, &Turn::hit("Bob")).await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::LastStanding {
            winner: "Dealer".into(),
            busted: "Bob".into()
        }
    );
    assert_eq!(game.status(), GameStatus::Finished);
    assert_eq!(game.winner(), Some("Dealer"));
}

#[tokio::test]
async fn deck_outage_during_hit_aborts_only_that_turn() {
    let deck = scripted(&[Rank::Ten, Rank::Two, Rank::Three, Rank::Four, Rank::Five]);
    let mut game = started(&deck, &["Alice"]).await;
    let before = game.clone();

    deck.set_failing(true);
    let err = game.play_turn(&deck, &Turn::hit("Dealer")).await.unwrap_err();
    assert!(matches!(err, GameError::DeckUnavailable(_)));
    assert_eq!(game, before);

    deck.set_failing(false);
    game.play_turn(&deck, &Turn::hit("Dealer")).await.expect("retry succeeds");
    assert_eq!(game.player("Dealer").unwrap().cards().len(), 3);
    assert_eq!(game.next_player(), Some("Alice"));
}

#[tokio::test]
async fn deck_outage_during_start_leaves_game_unstarted() {
    // Only three cards for four required
    let deck = scripted(&[Rank::Two, Rank::Three, Rank::Four]);
    let mut game = Game::new("short");
    let err = game.start(&deck, ["Alice"]).await.unwrap_err();
    assert!(matches!(err, GameError::DeckUnavailable(_)));
    assert_eq!(game.status(), GameStatus::NotStarted);
    assert!(game.players().is_empty());
    assert!(game.turn_order().is_empty());
}

#[tokio::test]
async fn turns_before_start_are_out_of_turn() {
    let deck = scripted(&[]);
    let mut game = Game::new("idle");
    let err = game.play_turn(&deck, &Turn::stand("Dealer")).await.unwrap_err();
    assert_eq!(
        err,
        GameError::OutOfTurn {
            player: "Dealer".into(),
            expected: None
        }
    );
}
