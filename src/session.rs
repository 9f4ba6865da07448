/*
Replication session state machines. Sans-I/O: the caller owns the
channels and feeds incoming messages in arrival order; every call
returns the outbound messages the transport should deliver. Feeding the
host through `&mut self` is what serializes concurrent peer intents.
*/

use tracing::{debug, info, warn};

use crate::game::{ConnId, GameError, KaaliTeeriGame};
use crate::protocol::{HostMessage, Intent, PeerMessage};

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Let a returning peer whose display name matches a vacated seat
    /// reclaim that seat through the normal join handshake.
    pub allow_rejoin: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions { allow_rejoin: true }
    }
}

/// A message the transport owes to the mesh: either a reply to one
/// channel or a fan-out to every open channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    To(ConnId, HostMessage),
    Broadcast(HostMessage),
}

/// The authoritative end of the session. Exactly one exists per game;
/// its owner is always seat 0.
pub struct HostSession {
    game: KaaliTeeriGame,
    options: SessionOptions,
}

impl HostSession {
    pub fn new(
        player_count: usize,
        host_name: &str,
        host_conn: ConnId,
        options: SessionOptions,
    ) -> Self {
        let game = KaaliTeeriGame::new(player_count, host_name, host_conn);
        info!(player_count, host = host_name, "session created");
        HostSession { game, options }
    }

    pub fn game(&self) -> &KaaliTeeriGame {
        &self.game
    }

    /// Conn ids of every connected peer (the host's own seat has no
    /// channel to itself).
    pub fn connected_peers(&self) -> Vec<ConnId> {
        self.game
            .players
            .iter()
            .skip(1)
            .filter_map(|p| p.conn.clone())
            .collect()
    }

    fn snapshot(&self) -> HostMessage {
        HostMessage::StateSnapshot(Box::new(self.game.clone()))
    }

    /// Single entry point for everything a peer channel delivers.
    pub fn handle_message(&mut self, from: &ConnId, message: PeerMessage) -> Vec<Outbound> {
        match message {
            PeerMessage::JoinRequest { display_name, .. } => self.handle_join(from, &display_name),
            PeerMessage::Intent(intent) => self.handle_intent(from, intent),
        }
    }

    fn handle_join(&mut self, conn: &ConnId, display_name: &str) -> Vec<Outbound> {
        if self.options.allow_rejoin {
            let vacated = self
                .game
                .players
                .iter()
                .position(|p| p.conn.is_none() && p.display_name == display_name);
            if let Some(seat) = vacated {
                self.game.players[seat].conn = Some(conn.clone());
                self.game
                    .event_log
                    .push(format!("{} reconnected.", display_name));
                info!(seat, conn = %conn, "peer reclaimed seat");
                return vec![Outbound::Broadcast(self.snapshot())];
            }
        }
        match self.game.add_player(display_name, Some(conn.clone())) {
            Ok(seat) => {
                info!(seat, conn = %conn, name = display_name, "peer joined");
                vec![Outbound::Broadcast(self.snapshot())]
            }
            Err(_) => {
                warn!(conn = %conn, "join refused: no seat available");
                vec![Outbound::To(conn.clone(), HostMessage::SessionFull)]
            }
        }
    }

    fn handle_intent(&mut self, from: &ConnId, intent: Intent) -> Vec<Outbound> {
        let Some(seat) = self.game.seat_of_conn(from) else {
            debug!(conn = %from, "intent from unseated connection");
            return vec![Outbound::To(
                from.clone(),
                HostMessage::Rejected {
                    reason: GameError::OutOfTurn,
                },
            )];
        };
        match self.apply(seat, intent) {
            Ok(()) => vec![Outbound::Broadcast(self.snapshot())],
            Err(reason) => {
                debug!(seat, %reason, "intent rejected");
                vec![Outbound::To(from.clone(), HostMessage::Rejected { reason })]
            }
        }
    }

    fn apply(&mut self, seat: usize, intent: Intent) -> Result<(), GameError> {
        match intent {
            Intent::PlaceBid { amount } => self.game.place_bid(seat, amount),
            Intent::Pass => self.game.pass(seat),
            Intent::DeclareTrumpAndPartners {
                trump,
                partner_card_ids,
            } => self
                .game
                .declare_trump_and_partners(seat, trump, &partner_card_ids),
            Intent::PlayCard { card_id } => self.game.play_card(seat, card_id),
        }
    }

    /// The host's own moves run through the same legality gates as any
    /// peer's; on success the new state fans out exactly the same way.
    pub fn local_intent(&mut self, intent: Intent) -> Result<Vec<Outbound>, GameError> {
        self.apply(0, intent)?;
        Ok(vec![Outbound::Broadcast(self.snapshot())])
    }

    /// Host-only: deal and open bidding once the lobby is full.
    pub fn start_game(&mut self) -> Result<Vec<Outbound>, GameError> {
        self.game.start()?;
        info!(round = self.game.round_id, "round started");
        Ok(vec![Outbound::Broadcast(self.snapshot())])
    }

    /// Host-only: trigger the next round from the results screen.
    pub fn next_round(&mut self) -> Result<Vec<Outbound>, GameError> {
        self.game.new_round()?;
        info!(round = self.game.round_id, "next round started");
        Ok(vec![Outbound::Broadcast(self.snapshot())])
    }

    /// The transport noticed a peer channel closing. The seat survives
    /// with its hand and captures; only the connection ref is cleared.
    pub fn peer_disconnected(&mut self, conn: &ConnId) -> Vec<Outbound> {
        let Some(seat) = self.game.seat_of_conn(conn) else {
            return vec![];
        };
        self.game.players[seat].conn = None;
        let name = self.game.players[seat].display_name.clone();
        self.game.event_log.push(format!("{} disconnected.", name));
        info!(seat, conn = %conn, "peer disconnected");
        vec![
            Outbound::Broadcast(HostMessage::PeerLeft {
                conn_id: conn.clone(),
            }),
            Outbound::Broadcast(self.snapshot()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Joining,
    Connected,
    /// The host had no seat for us.
    Refused,
    /// The host channel closed. Terminal: the round cannot continue and
    /// the caller must surface this, not retry.
    HostUnavailable,
}

/// The mirroring end of the session. Holds nothing authoritative: its
/// game is whatever the last snapshot said, replaced wholesale.
pub struct PeerSession {
    conn: ConnId,
    display_name: String,
    status: PeerStatus,
    game: Option<KaaliTeeriGame>,
    last_rejection: Option<GameError>,
}

impl PeerSession {
    pub fn new(conn: ConnId, display_name: &str) -> Self {
        PeerSession {
            conn,
            display_name: display_name.to_string(),
            status: PeerStatus::Joining,
            game: None,
            last_rejection: None,
        }
    }

    pub fn status(&self) -> PeerStatus {
        self.status
    }

    pub fn game(&self) -> Option<&KaaliTeeriGame> {
        self.game.as_ref()
    }

    /// This peer's seat in the mirrored state, once a snapshot has
    /// named our connection.
    pub fn seat(&self) -> Option<usize> {
        self.game.as_ref().and_then(|g| g.seat_of_conn(&self.conn))
    }

    pub fn last_rejection(&self) -> Option<GameError> {
        self.last_rejection
    }

    /// The opening handshake message for the host resolved out-of-band
    /// through the session directory.
    pub fn join_request(&self) -> PeerMessage {
        PeerMessage::JoinRequest {
            conn_id: self.conn.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// Wraps a rules intent for the host, refusing once the session is
    /// dead so callers cannot silently talk to nobody.
    pub fn intent(&self, intent: Intent) -> Result<PeerMessage, GameError> {
        match self.status {
            PeerStatus::HostUnavailable => Err(GameError::HostUnavailable),
            PeerStatus::Refused => Err(GameError::SessionFull),
            _ => Ok(PeerMessage::Intent(intent)),
        }
    }

    /// Applies one host message. Snapshots replace the local game
    /// atomically and are idempotent; nothing here ever edits the game
    /// in place.
    pub fn handle_message(&mut self, message: HostMessage) {
        match message {
            HostMessage::StateSnapshot(game) => {
                self.game = Some(*game);
                if self.status == PeerStatus::Joining {
                    self.status = PeerStatus::Connected;
                }
            }
            HostMessage::SessionFull => {
                warn!(conn = %self.conn, "join refused: session full");
                self.status = PeerStatus::Refused;
            }
            HostMessage::PeerLeft { conn_id } => {
                // Informational; the snapshot that follows carries the
                // updated seat state
                debug!(peer = %conn_id, "peer left the mesh");
            }
            HostMessage::Rejected { reason } => {
                debug!(%reason, "host rejected our intent");
                self.last_rejection = Some(reason);
            }
        }
    }

    /// The transport noticed the host channel closing.
    pub fn host_disconnected(&mut self) {
        warn!(conn = %self.conn, "host unreachable, session over");
        self.status = PeerStatus::HostUnavailable;
    }
}
