/*
Session directory seam: maps a short human-readable code to the host's
connection id so peers can find the host out-of-band. The real lookup
service lives outside this crate; the in-memory implementation here
backs tests and single-process play.
*/

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::game::ConnId;

// Omits O, 0, I, L, 1 to reduce confusion when codes are read aloud
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 4;

/// Codes expire so an abandoned session cannot hold one forever.
pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(3 * 60 * 60);

pub trait SessionDirectory {
    /// Registers a host and returns the code peers type in to find it.
    fn register_host(&mut self, conn: ConnId) -> String;
    /// Looks a code up; `None` when unknown or expired.
    fn resolve(&mut self, code: &str) -> Option<ConnId>;
}

pub struct InMemoryDirectory {
    codes: HashMap<String, (ConnId, Instant)>,
    ttl: Duration,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CODE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        InMemoryDirectory {
            codes: HashMap::new(),
            ttl,
        }
    }

    fn prune(&mut self) {
        let ttl = self.ttl;
        let now = Instant::now();
        self.codes
            .retain(|_, (_, registered)| now.duration_since(*registered) < ttl);
    }

    fn fresh_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.codes.contains_key(&code) {
                return code;
            }
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionDirectory for InMemoryDirectory {
    fn register_host(&mut self, conn: ConnId) -> String {
        self.prune();
        let code = self.fresh_code();
        debug!(%conn, code = %code, "host registered");
        self.codes.insert(code.clone(), (conn, Instant::now()));
        code
    }

    fn resolve(&mut self, code: &str) -> Option<ConnId> {
        self.prune();
        self.codes.get(code).map(|(conn, _)| conn.clone())
    }
}
