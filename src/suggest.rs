/*
Advisory move-suggestion seam. A suggester sees the same view a player
would and proposes one bid or card; the engine re-validates every
proposal through its own legality rules and falls back to a trivially
legal default, so a broken or adversarial oracle can never break a game.
*/

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use thiserror::Error;
use tracing::debug;

use crate::game::{Card, KaaliTeeriGame, Suit, Trick, BASE_BID, BID_STEP, TOTAL_POINTS};

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("the suggestion oracle failed: {0}")]
    Oracle(String),
}

/// What a suggester gets to see when asked for a bid.
pub struct BidView<'a> {
    pub hand: &'a [Card],
    pub current_highest_bid: Option<i32>,
    pub player_count: usize,
}

/// What a suggester gets to see when asked for a card.
pub struct PlayView<'a> {
    pub hand: &'a [Card],
    pub trump_suit: Suit,
    pub current_trick: &'a Trick,
    pub is_bidder_team: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidDecision {
    Bid(i32),
    Pass,
}

pub trait MoveSuggester {
    fn suggest_bid(&self, view: &BidView) -> Result<BidDecision, SuggestError>;
    fn suggest_play(&self, view: &PlayView) -> Result<i32, SuggestError>;
}

/// Reference suggester: uniformly random among legal choices. Useful as
/// a stand-in opponent and as the baseline the validation gate is
/// exercised against.
pub struct RandomSuggester;

impl MoveSuggester for RandomSuggester {
    fn suggest_bid(&self, view: &BidView) -> Result<BidDecision, SuggestError> {
        let min = view.current_highest_bid.unwrap_or(BASE_BID) + BID_STEP;
        if min > TOTAL_POINTS {
            return Ok(BidDecision::Pass);
        }
        if thread_rng().gen_bool(0.5) {
            Ok(BidDecision::Bid(min))
        } else {
            Ok(BidDecision::Pass)
        }
    }

    fn suggest_play(&self, view: &PlayView) -> Result<i32, SuggestError> {
        let mut candidates: Vec<i32> = match view.current_trick.leading_suit {
            Some(lead) => view
                .hand
                .iter()
                .filter(|c| c.suit == lead)
                .map(|c| c.id)
                .collect(),
            None => vec![],
        };
        if candidates.is_empty() {
            candidates = view.hand.iter().map(|c| c.id).collect();
        }
        candidates
            .choose(&mut thread_rng())
            .copied()
            .ok_or_else(|| SuggestError::Oracle("no cards to choose from".to_string()))
    }
}

/// Asks the suggester for a bid and gates the answer: anything that is
/// not a legal raise becomes a pass, the trivially legal default.
pub fn advised_bid(
    game: &KaaliTeeriGame,
    seat: usize,
    suggester: &dyn MoveSuggester,
) -> BidDecision {
    let view = BidView {
        hand: &game.players[seat].hand,
        current_highest_bid: game.highest_bid.as_ref().map(|b| b.amount),
        player_count: game.player_count,
    };
    match suggester.suggest_bid(&view) {
        Ok(BidDecision::Bid(amount))
            if amount % BID_STEP == 0 && amount >= game.min_bid() =>
        {
            BidDecision::Bid(amount)
        }
        Ok(BidDecision::Bid(amount)) => {
            debug!(seat, amount, "oracle bid is illegal, passing instead");
            BidDecision::Pass
        }
        Ok(BidDecision::Pass) => BidDecision::Pass,
        Err(err) => {
            debug!(seat, %err, "oracle failed, passing instead");
            BidDecision::Pass
        }
    }
}

/// Asks the suggester for a card and gates the answer against the same
/// follow-suit rules a human play goes through. Falls back to the first
/// legal card; `None` only when the seat has nothing to play at all.
pub fn advised_play(
    game: &KaaliTeeriGame,
    seat: usize,
    suggester: &dyn MoveSuggester,
) -> Option<i32> {
    let legal = game.legal_plays(seat);
    let first = *legal.first()?;
    let Some(trump) = game.trump_suit else {
        return Some(first);
    };
    let view = PlayView {
        hand: &game.players[seat].hand,
        trump_suit: trump,
        current_trick: &game.current_trick,
        is_bidder_team: game.is_bidder_team(seat),
    };
    match suggester.suggest_play(&view) {
        Ok(card_id) if legal.contains(&card_id) => Some(card_id),
        Ok(card_id) => {
            debug!(seat, card_id, "oracle play is illegal, using first legal card");
            Some(first)
        }
        Err(err) => {
            debug!(seat, %err, "oracle failed, using first legal card");
            Some(first)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{ConnId, Phase, Rank};

    struct Scripted {
        bid: BidDecision,
        play: i32,
    }

    impl MoveSuggester for Scripted {
        fn suggest_bid(&self, _view: &BidView) -> Result<BidDecision, SuggestError> {
            Ok(self.bid)
        }

        fn suggest_play(&self, _view: &PlayView) -> Result<i32, SuggestError> {
            Ok(self.play)
        }
    }

    struct Failing;

    impl MoveSuggester for Failing {
        fn suggest_bid(&self, _view: &BidView) -> Result<BidDecision, SuggestError> {
            Err(SuggestError::Oracle("model timed out".to_string()))
        }

        fn suggest_play(&self, _view: &PlayView) -> Result<i32, SuggestError> {
            Err(SuggestError::Oracle("model timed out".to_string()))
        }
    }

    fn c(rank: Rank, suit: Suit) -> Card {
        Card::new(suit, rank)
    }

    // A forged mid-trick position: hearts led, seat 0 to play holding
    // a heart and a spade
    fn mid_trick_game() -> KaaliTeeriGame {
        let mut game = KaaliTeeriGame::new(4, "Asha", ConnId::new("host"));
        for seat in 1..4 {
            game.add_player(&format!("Peer{}", seat), Some(ConnId::new(format!("c{}", seat))))
                .unwrap();
        }
        game.phase = Phase::Playing;
        game.trump_suit = Some(Suit::Spades);
        game.current_turn = 0;
        game.players[0].hand = vec![c(Rank::Ten, Suit::Hearts), c(Rank::Two, Suit::Spades)];
        game.current_trick = Trick {
            played_cards: vec![(3, c(Rank::Ace, Suit::Hearts))],
            leading_suit: Some(Suit::Hearts),
        };
        game
    }

    #[test]
    fn test_legal_suggestion_is_used() {
        let game = mid_trick_game();
        let heart = c(Rank::Ten, Suit::Hearts).id;
        let oracle = Scripted {
            bid: BidDecision::Pass,
            play: heart,
        };
        assert_eq!(advised_play(&game, 0, &oracle), Some(heart));
    }

    #[test]
    fn test_illegal_suggestion_falls_back_to_first_legal() {
        let game = mid_trick_game();
        // The oracle tries to trump in while still holding a heart
        let oracle = Scripted {
            bid: BidDecision::Pass,
            play: c(Rank::Two, Suit::Spades).id,
        };
        assert_eq!(
            advised_play(&game, 0, &oracle),
            Some(c(Rank::Ten, Suit::Hearts).id)
        );
    }

    #[test]
    fn test_failing_oracle_falls_back_to_first_legal() {
        let game = mid_trick_game();
        assert_eq!(
            advised_play(&game, 0, &Failing),
            Some(c(Rank::Ten, Suit::Hearts).id)
        );
    }

    #[test]
    fn test_illegal_bid_suggestion_becomes_a_pass() {
        let mut game = KaaliTeeriGame::new(4, "Asha", ConnId::new("host"));
        for seat in 1..4 {
            game.add_player(&format!("Peer{}", seat), Some(ConnId::new(format!("c{}", seat))))
                .unwrap();
        }
        game.start().unwrap();
        let not_a_multiple = Scripted {
            bid: BidDecision::Bid(117),
            play: 0,
        };
        assert_eq!(advised_bid(&game, 0, &not_a_multiple), BidDecision::Pass);
        let too_low = Scripted {
            bid: BidDecision::Bid(115),
            play: 0,
        };
        assert_eq!(advised_bid(&game, 0, &too_low), BidDecision::Pass);
        let legal = Scripted {
            bid: BidDecision::Bid(125),
            play: 0,
        };
        assert_eq!(advised_bid(&game, 0, &legal), BidDecision::Bid(125));
    }

    #[test]
    fn test_failing_oracle_passes() {
        let mut game = KaaliTeeriGame::new(4, "Asha", ConnId::new("host"));
        for seat in 1..4 {
            game.add_player(&format!("Peer{}", seat), Some(ConnId::new(format!("c{}", seat))))
                .unwrap();
        }
        game.start().unwrap();
        assert_eq!(advised_bid(&game, 0, &Failing), BidDecision::Pass);
    }

    #[test]
    fn test_random_suggester_always_survives_the_gate() {
        let game = mid_trick_game();
        for _ in 0..50 {
            let card = advised_play(&game, 0, &RandomSuggester).unwrap();
            assert!(game.legal_plays(0).contains(&card));
            // Following suit is possible here, so the gate must never
            // let the spade through
            assert_eq!(card, c(Rank::Ten, Suit::Hearts).id);
        }
    }
}
