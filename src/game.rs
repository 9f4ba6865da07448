/*
Game: Kaali Teeri
A trick-taking game for 4-8 players where the high bidder names trump
and calls hidden partners by card
*/

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use enum_iterator::{all, Sequence};
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_PLAYERS: usize = 4;
pub const MAX_PLAYERS: usize = 8;
// Opening bids must beat the base, so the lowest legal bid is 120
pub const BASE_BID: i32 = 115;
pub const BID_STEP: i32 = 5;
// 3 of spades (30) + twenty honors (10 each) + four fives (5 each)
pub const TOTAL_POINTS: i32 = 250;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Sequence,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "camelCase")]
pub enum Suit {
    Spades = 0,
    Hearts = 1,
    Diamonds = 2,
    Clubs = 3,
}

impl Suit {
    // Hands are displayed spades, hearts, clubs, diamonds
    fn display_order(&self) -> usize {
        match self {
            Suit::Spades => 0,
            Suit::Hearts => 1,
            Suit::Clubs => 2,
            Suit::Diamonds => 3,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Suit::Spades => "spades",
            Suit::Hearts => "hearts",
            Suit::Diamonds => "diamonds",
            Suit::Clubs => "clubs",
        };
        write!(f, "{}", name)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Sequence,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "camelCase")]
pub enum Rank {
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
    Ace = 14,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rank::Jack => "J".to_string(),
            Rank::Queen => "Q".to_string(),
            Rank::King => "K".to_string(),
            Rank::Ace => "A".to_string(),
            other => (*other as i32).to_string(),
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
    pub id: i32,
}

impl Card {
    // The id is a stable function of suit and rank so snapshots and
    // intents agree on card identity regardless of position
    pub fn new(suit: Suit, rank: Rank) -> Self {
        let id = (suit as i32) * 13 + (rank as i32 - 2);
        Card { suit, rank, id }
    }

    pub fn points(&self) -> i32 {
        if self.suit == Suit::Spades && self.rank == Rank::Three {
            return 30;
        }
        match self.rank {
            Rank::Ace | Rank::King | Rank::Queen | Rank::Jack | Rank::Ten => 10,
            Rank::Five => 5,
            _ => 0,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.rank, self.suit)
    }
}

/// Transport endpoint identity for one connected participant. The
/// transport layer hands these out; a seat keeps its `ConnId` until the
/// peer disconnects, at which point the seat's ref goes to `None`
/// without freeing the seat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConnId(pub String);

impl ConnId {
    pub fn new(id: impl Into<String>) -> Self {
        ConnId(id.into())
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: usize,
    pub display_name: String,
    pub conn: Option<ConnId>,
    pub hand: Vec<Card>,
    pub is_bidder: bool,
    pub is_partner: bool,
    pub captured_cards: Vec<Card>,
    pub tricks_won: i32,
}

impl Player {
    fn new(id: usize, display_name: &str, conn: Option<ConnId>) -> Self {
        Player {
            id,
            display_name: display_name.to_string(),
            conn,
            hand: vec![],
            is_bidder: false,
            is_partner: false,
            captured_cards: vec![],
            tricks_won: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub player_id: usize,
    // 0 records a pass
    pub amount: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Trick {
    pub played_cards: Vec<(usize, Card)>,
    pub leading_suit: Option<Suit>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Lobby,
    Bidding,
    PartnerSelection,
    Playing,
    Results,
}

/// Rule violations surfaced to whoever sent the offending intent. The
/// host rejects with one of these and leaves the game untouched.
#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GameError {
    #[error("bid must be a multiple of 5 and at least {min}")]
    InvalidBid { min: i32 },
    #[error("not this player's move in the current phase")]
    OutOfTurn,
    #[error("a card of the leading suit must be played")]
    MustFollowSuit,
    #[error("partner selection is incomplete or names an illegal card")]
    IncompleteSelection,
    #[error("the session has no seat available")]
    SessionFull,
    #[error("the host is no longer reachable")]
    HostUnavailable,
}

pub fn partners_required(player_count: usize) -> usize {
    if player_count <= 5 {
        1
    } else if player_count <= 7 {
        2
    } else {
        3
    }
}

/// The single authoritative game state. Only the host mutates one of
/// these; peers replace their copy wholesale with each snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KaaliTeeriGame {
    pub round_id: u32,
    pub phase: Phase,
    pub players: Vec<Player>,
    // Seats the session was created for; players.len() grows up to this
    pub player_count: usize,
    pub deck: Vec<Card>,
    pub bid_history: Vec<Bid>,
    pub highest_bid: Option<Bid>,
    pub trump_suit: Option<Suit>,
    pub declared_partner_cards: Vec<Card>,
    pub current_turn: usize,
    pub current_trick: Trick,
    pub tricks_played: usize,
    pub team1_score: i32,
    pub team2_score: i32,
    pub event_log: Vec<String>,
}

impl KaaliTeeriGame {
    pub fn new(player_count: usize, host_name: &str, host_conn: ConnId) -> Self {
        assert!(
            (MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count),
            "player count must be between {} and {}",
            MIN_PLAYERS,
            MAX_PLAYERS
        );
        let mut game = KaaliTeeriGame {
            round_id: 1,
            phase: Phase::Lobby,
            players: vec![],
            player_count,
            deck: Self::deck(),
            bid_history: vec![],
            highest_bid: None,
            trump_suit: None,
            declared_partner_cards: vec![],
            current_turn: 0,
            current_trick: Trick::default(),
            tricks_played: 0,
            team1_score: 0,
            team2_score: 0,
            event_log: vec![],
        };
        // The host always takes seat 0
        game.players.push(Player::new(0, host_name, Some(host_conn)));
        game.event_log.push(format!("Game created by {}", host_name));
        game
    }

    pub fn deck() -> Vec<Card> {
        let mut deck = Vec::with_capacity(52);
        for suit in all::<Suit>() {
            for rank in all::<Rank>() {
                deck.push(Card::new(suit, rank));
            }
        }
        deck
    }

    /// Seats a new player in the lobby. Seats are never reassigned, so
    /// once the lobby fills (or play begins) every further join is
    /// answered with `SessionFull`.
    pub fn add_player(
        &mut self,
        display_name: &str,
        conn: Option<ConnId>,
    ) -> Result<usize, GameError> {
        if self.phase != Phase::Lobby || self.players.len() >= self.player_count {
            return Err(GameError::SessionFull);
        }
        let seat = self.players.len();
        self.players.push(Player::new(seat, display_name, conn));
        self.event_log
            .push(format!("{} joined the game.", display_name));
        if self.players.len() == self.player_count {
            self.event_log.push(
                "All players have joined. The host can now start the game.".to_string(),
            );
        }
        Ok(seat)
    }

    /// Deals and opens bidding. Legal only once every seat is filled.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.phase != Phase::Lobby || self.players.len() < self.player_count {
            return Err(GameError::OutOfTurn);
        }
        self.deal();
        self.phase = Phase::Bidding;
        self.current_turn = 0;
        self.event_log
            .push("Cards dealt. Bidding begins.".to_string());
        Ok(())
    }

    // Round-robin over the shuffled deck so every card lands in exactly
    // one hand and hand sizes differ by at most one
    fn deal(&mut self) {
        let mut cards = self.deck.clone();
        cards.shuffle(&mut thread_rng());
        for player in self.players.iter_mut() {
            player.hand.clear();
        }
        let mut seat = 0;
        while let Some(card) = cards.pop() {
            self.players[seat].hand.push(card);
            seat = (seat + 1) % self.player_count;
        }
        for seat in 0..self.players.len() {
            self.sort_hand(seat);
        }
    }

    fn sort_hand(&mut self, seat: usize) {
        self.players[seat].hand.sort_by(|a, b| {
            match a.suit.display_order().cmp(&b.suit.display_order()) {
                Ordering::Equal => b.rank.cmp(&a.rank), // Same suit: high to low
                other => other,
            }
        });
    }

    pub fn tricks_per_round(&self) -> usize {
        self.deck.len() / self.player_count
    }

    pub fn min_bid(&self) -> i32 {
        self.highest_bid.as_ref().map_or(BASE_BID, |b| b.amount) + BID_STEP
    }

    pub fn seat_of_conn(&self, conn: &ConnId) -> Option<usize> {
        self.players
            .iter()
            .position(|p| p.conn.as_ref() == Some(conn))
    }

    pub fn is_bidder_team(&self, seat: usize) -> bool {
        let player = &self.players[seat];
        player.is_bidder || player.is_partner
    }

    fn has_passed(&self, seat: usize) -> bool {
        self.bid_history
            .iter()
            .any(|b| b.player_id == seat && b.amount == 0)
    }

    fn active_bidders(&self) -> usize {
        (0..self.players.len())
            .filter(|&seat| !self.has_passed(seat))
            .count()
    }

    fn next_active_seat(&self, from: usize) -> usize {
        for step in 1..=self.player_count {
            let seat = (from + step) % self.player_count;
            if !self.has_passed(seat) {
                return seat;
            }
        }
        self.highest_bid.as_ref().map_or(from, |b| b.player_id)
    }

    pub fn place_bid(&mut self, player: usize, amount: i32) -> Result<(), GameError> {
        if self.phase != Phase::Bidding || player != self.current_turn {
            return Err(GameError::OutOfTurn);
        }
        let min = self.min_bid();
        if amount % BID_STEP != 0 || amount < min {
            return Err(GameError::InvalidBid { min });
        }
        self.bid_history.push(Bid {
            player_id: player,
            amount,
        });
        self.highest_bid = Some(Bid {
            player_id: player,
            amount,
        });
        self.event_log.push(format!(
            "{} bids {}",
            self.players[player].display_name, amount
        ));
        if self.active_bidders() <= 1 {
            // Everyone else has passed; the bid stands
            self.finish_bidding();
        } else {
            self.current_turn = self.next_active_seat(player);
        }
        Ok(())
    }

    pub fn pass(&mut self, player: usize) -> Result<(), GameError> {
        if self.phase != Phase::Bidding || player != self.current_turn {
            return Err(GameError::OutOfTurn);
        }
        self.bid_history.push(Bid {
            player_id: player,
            amount: 0,
        });
        self.event_log
            .push(format!("{} passes.", self.players[player].display_name));
        let active = self.active_bidders();
        if self.highest_bid.is_some() {
            if active <= 1 {
                self.finish_bidding();
            } else {
                self.current_turn = self.next_active_seat(player);
            }
        } else if active == 0 {
            self.restart_bidding();
        } else {
            // A lone remaining seat with no bid on the table still gets
            // to bid or pass before any restart
            self.current_turn = self.next_active_seat(player);
        }
        Ok(())
    }

    fn restart_bidding(&mut self) {
        self.bid_history.clear();
        self.highest_bid = None;
        self.current_turn = 0;
        self.event_log
            .push("Everyone passed. Bidding restarts.".to_string());
    }

    fn finish_bidding(&mut self) {
        let bid = self
            .highest_bid
            .clone()
            .expect("bidding cannot finish without a bid");
        self.players[bid.player_id].is_bidder = true;
        self.phase = Phase::PartnerSelection;
        self.current_turn = bid.player_id;
        self.event_log.push(format!(
            "{} wins the bidding at {}",
            self.players[bid.player_id].display_name, bid.amount
        ));
    }

    /// The winning bidder names trump and calls partners by card. The
    /// nominated cards must be real, distinct, and outside the bidder's
    /// own hand; whoever holds one joins the bidder's team.
    pub fn declare_trump_and_partners(
        &mut self,
        player: usize,
        trump: Suit,
        partner_card_ids: &[i32],
    ) -> Result<(), GameError> {
        if self.phase != Phase::PartnerSelection
            || player != self.current_turn
            || !self.players[player].is_bidder
        {
            return Err(GameError::OutOfTurn);
        }
        let required = partners_required(self.player_count);
        let unique: HashSet<i32> = partner_card_ids.iter().copied().collect();
        if partner_card_ids.len() != required || unique.len() != required {
            return Err(GameError::IncompleteSelection);
        }
        let mut partner_cards = Vec::with_capacity(required);
        for id in partner_card_ids {
            let card = self
                .deck
                .iter()
                .find(|c| c.id == *id)
                .copied()
                .ok_or(GameError::IncompleteSelection)?;
            if self.players[player].hand.iter().any(|c| c.id == *id) {
                // Calling a card from your own hand would leave the team
                // a partner short; the declaration is refused outright
                return Err(GameError::IncompleteSelection);
            }
            partner_cards.push(card);
        }
        for p in self.players.iter_mut() {
            if p.hand
                .iter()
                .any(|c| partner_cards.iter().any(|pc| pc.id == c.id))
            {
                p.is_partner = true;
            }
        }
        self.trump_suit = Some(trump);
        self.declared_partner_cards = partner_cards;
        self.phase = Phase::Playing;
        // Bidder leads the first trick
        self.current_turn = player;
        self.event_log.push(format!(
            "{} chose {} as trump.",
            self.players[player].display_name, trump
        ));
        Ok(())
    }

    pub fn legal_plays(&self, seat: usize) -> Vec<i32> {
        // Must follow
        if let Some(lead) = self.current_trick.leading_suit {
            let follow: Vec<i32> = self.players[seat]
                .hand
                .iter()
                .filter(|c| c.suit == lead)
                .map(|c| c.id)
                .collect();
            if !follow.is_empty() {
                return follow;
            }
        }
        self.players[seat].hand.iter().map(|c| c.id).collect()
    }

    pub fn play_card(&mut self, player: usize, card_id: i32) -> Result<(), GameError> {
        if self.phase != Phase::Playing || player != self.current_turn {
            return Err(GameError::OutOfTurn);
        }
        let Some(pos) = self.players[player]
            .hand
            .iter()
            .position(|c| c.id == card_id)
        else {
            // The intent names a card this seat does not hold; the
            // sender's view is stale
            return Err(GameError::OutOfTurn);
        };
        let card = self.players[player].hand[pos];
        if let Some(lead) = self.current_trick.leading_suit {
            if card.suit != lead && self.players[player].hand.iter().any(|c| c.suit == lead) {
                return Err(GameError::MustFollowSuit);
            }
        }
        self.players[player].hand.remove(pos);
        if self.current_trick.leading_suit.is_none() {
            self.current_trick.leading_suit = Some(card.suit);
        }
        self.current_trick.played_cards.push((player, card));
        self.current_turn = (self.current_turn + 1) % self.player_count;
        if self.current_trick.played_cards.len() == self.player_count {
            self.resolve_trick();
        }
        Ok(())
    }

    pub fn trick_winner(trick: &Trick, trump: Suit) -> usize {
        let (mut winning_seat, mut winning_card) = trick.played_cards[0];
        for &(seat, card) in &trick.played_cards[1..] {
            // The winning card is always trump or the leading suit, so a
            // card of any other suit can never take over
            let card_wins = if card.suit == trump {
                winning_card.suit != trump || card.rank > winning_card.rank
            } else if winning_card.suit == trump {
                false
            } else if card.suit == winning_card.suit {
                card.rank > winning_card.rank
            } else {
                false
            };
            if card_wins {
                winning_seat = seat;
                winning_card = card;
            }
        }
        winning_seat
    }

    fn resolve_trick(&mut self) {
        let trump = self.trump_suit.expect("trump is declared before play");
        let winner = Self::trick_winner(&self.current_trick, trump);
        let winning_card = self
            .current_trick
            .played_cards
            .iter()
            .find(|(seat, _)| *seat == winner)
            .map(|(_, card)| *card)
            .expect("the winner played a card");
        let captured: Vec<Card> = self
            .current_trick
            .played_cards
            .iter()
            .map(|(_, card)| *card)
            .collect();
        self.players[winner].captured_cards.extend(captured);
        self.players[winner].tricks_won += 1;
        self.tricks_played += 1;
        self.current_trick = Trick::default();
        // Trick winner leads
        self.current_turn = winner;
        self.event_log.push(format!(
            "{} wins the trick with the {}",
            self.players[winner].display_name, winning_card
        ));
        if self.tricks_played == self.tricks_per_round() {
            self.score_round();
        }
    }

    fn score_round(&mut self) {
        let mut team1 = 0;
        let mut team2 = 0;
        for player in &self.players {
            let points: i32 = player.captured_cards.iter().map(Card::points).sum();
            if player.is_bidder || player.is_partner {
                team1 += points;
            } else {
                team2 += points;
            }
        }
        self.team1_score = team1;
        self.team2_score = team2;
        self.phase = Phase::Results;
        let bid = self
            .highest_bid
            .as_ref()
            .expect("a scored round has a winning bid");
        if team1 >= bid.amount {
            self.event_log.push(format!(
                "Bidder team wins the round: {} against a bid of {}.",
                team1, bid.amount
            ));
        } else {
            self.event_log.push(format!(
                "Opponents win the round: bidder team scored {} against a bid of {}.",
                team1, bid.amount
            ));
        }
    }

    /// Starts the next round: re-deals, resets per-round state, and
    /// preserves seats, names, and connection refs.
    pub fn new_round(&mut self) -> Result<(), GameError> {
        if self.phase != Phase::Results {
            return Err(GameError::OutOfTurn);
        }
        self.round_id += 1;
        for player in self.players.iter_mut() {
            player.hand.clear();
            player.captured_cards.clear();
            player.tricks_won = 0;
            player.is_bidder = false;
            player.is_partner = false;
        }
        self.bid_history.clear();
        self.highest_bid = None;
        self.trump_suit = None;
        self.declared_partner_cards.clear();
        self.current_trick = Trick::default();
        self.tricks_played = 0;
        self.team1_score = 0;
        self.team2_score = 0;
        self.event_log.clear();
        self.deal();
        self.phase = Phase::Bidding;
        self.current_turn = 0;
        self.event_log.push(format!("Round {} begins.", self.round_id));
        Ok(())
    }
}
