/*
Wire messages for the host-authoritative mesh. Peers send intents; the
host answers with full snapshots, a seat refusal, or a rejection that
goes only to the offending sender.
*/

use serde::{Deserialize, Serialize};

use crate::game::{ConnId, GameError, KaaliTeeriGame, Suit};

/// A peer's requested mutation. Intents carry no seat claim: the host
/// resolves the seat from the channel the intent arrived on, so a peer
/// cannot act for anyone else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type", content = "payload")]
pub enum Intent {
    PlaceBid { amount: i32 },
    Pass,
    DeclareTrumpAndPartners {
        trump: Suit,
        partner_card_ids: Vec<i32>,
    },
    PlayCard { card_id: i32 },
}

/// Everything a peer may send to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type", content = "payload")]
pub enum PeerMessage {
    JoinRequest {
        conn_id: ConnId,
        display_name: String,
    },
    Intent(Intent),
}

/// Everything the host may send to a peer. `StateSnapshot` is the only
/// way game state ever reaches a peer; it is a complete copy, replaced
/// wholesale on arrival.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type", content = "payload")]
pub enum HostMessage {
    StateSnapshot(Box<KaaliTeeriGame>),
    SessionFull,
    PeerLeft { conn_id: ConnId },
    Rejected { reason: GameError },
}

impl PeerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

impl HostMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
