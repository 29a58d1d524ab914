use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::{Registry, Token};

use crate::http::connection::Connection;

/// Open connections keyed by their poll token.
///
/// Tokens are handed out in increasing order and never reused, so a stale
/// event for a removed connection finds no entry instead of a newer one.
pub struct ConnectionTable {
    entries: HashMap<Token, Connection>,
    next_token: usize,
    capacity: usize,
}

impl ConnectionTable {
    /// `first_token` must be above every token reserved by the loop.
    pub fn new(capacity: usize, first_token: usize) -> Self {
        Self {
            entries: HashMap::new(),
            next_token: first_token,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn contains(&self, token: Token) -> bool {
        self.entries.contains_key(&token)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection> {
        self.entries.get_mut(&token)
    }

    /// Registers the connection for readability and stores it.
    pub fn insert(&mut self, registry: &Registry, mut conn: Connection) -> io::Result<Token> {
        let token = Token(self.next_token);
        conn.register(registry, token)?;
        self.next_token += 1;
        self.entries.insert(token, conn);
        Ok(token)
    }

    /// Removes, deregisters and closes one connection.
    pub fn close(&mut self, registry: &Registry, token: Token) -> Option<SocketAddr> {
        let conn = self.entries.remove(&token)?;
        let peer = conn.peer();
        conn.close(registry);
        Some(peer)
    }

    /// Tokens of connections idle for at least `timeout`.
    pub fn expired(&self, now: Instant, timeout: Duration) -> Vec<Token> {
        self.entries
            .iter()
            .filter(|(_, conn)| conn.idle_for(now) >= timeout)
            .map(|(token, _)| *token)
            .collect()
    }

    /// Evicts every expired connection and returns their peers.
    pub fn sweep(&mut self, registry: &Registry, now: Instant, timeout: Duration) -> Vec<SocketAddr> {
        self.expired(now, timeout)
            .into_iter()
            .filter_map(|token| self.close(registry, token))
            .collect()
    }

    /// Closes everything, returning how many connections were open.
    pub fn drain(&mut self, registry: &Registry) -> usize {
        let count = self.entries.len();
        for (_, conn) in self.entries.drain() {
            conn.close(registry);
        }
        count
    }
}
