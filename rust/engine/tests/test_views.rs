use blackjack_engine::cards::{Card, Rank, Suit};
use blackjack_engine::deck::ScriptedDeck;
use blackjack_engine::game::{Game, GameStatus};
use blackjack_engine::player::Turn;

#[tokio::test]
async fn finished_game_views_are_byte_identical_across_fetches() {
    let deck = ScriptedDeck::new(
        [
            Rank::Nine,
            Rank::Seven,
            Rank::Four,
            Rank::Five,
            Rank::King,
            Rank::Two,
            Rank::Three,
            Rank::Eight,
        ]
        .map(|rank| Card::new(Suit::Spades, rank)),
    );
    let mut game = Game::new("replay");
    game.start(&deck, ["Alice", "Bob"]).await.unwrap();

    game.play_turn(&deck, &Turn::stand("Dealer")).await.unwrap();
    game.play_turn(&deck, &Turn::hit("Alice")).await.unwrap(); // 9 + 3
    game.play_turn(&deck, &Turn::stand("Bob")).await.unwrap();
    game.play_turn(&deck, &Turn::stand("Dealer")).await.unwrap();
    game.play_turn(&deck, &Turn::hit("Alice")).await.unwrap(); // 12 + 8 = 20
    game.play_turn(&deck, &Turn::stand("Bob")).await.unwrap();
    assert_eq!(game.status(), GameStatus::AwaitingPlayer);

    deck.push_cards([Card::new(Suit::Hearts, Rank::Four)]);
    game.play_turn(&deck, &Turn::hit("Dealer")).await.unwrap(); // 16 + 4 = 20
    game.play_turn(&deck, &Turn::stand("Alice")).await.unwrap();
    deck.push_cards([Card::new(Suit::Hearts, Rank::Nine)]);
    game.play_turn(&deck, &Turn::hit("Bob")).await.unwrap(); // 12 + 9 = 21
    assert_eq!(game.status(), GameStatus::Finished);
    assert_eq!(game.winner(), Some("Bob"));

    let first = serde_json::to_vec(&game.view_for("Alice")).unwrap();
    let second = serde_json::to_vec(&game.view_for("Alice")).unwrap();
    assert_eq!(first, second);

    let view = game.view_for("Alice");
    assert_eq!(view.hand("Alice").unwrap().score, 20);
    assert!(view.hand("Bob").unwrap().cards.is_empty());
    assert_eq!(view.winner.as_deref(), Some("Bob"));
    assert_eq!(view.next_player, None);
}
