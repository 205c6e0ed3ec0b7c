//! Client connection tracking.
//!
//! Maps UDP peers to the user they joined as and the room they are in, and
//! detects peers that have gone quiet. Bots never appear here.

use arena_shared::UserId;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected UDP peer
#[derive(Debug)]
pub struct Client {
    pub user_id: UserId,
    pub addr: SocketAddr,
    /// None until matchmaking has placed the user.
    pub room: Option<String>,
    pub last_seen: Instant,
}

impl Client {
    pub fn new(user_id: UserId, addr: SocketAddr) -> Self {
        Self {
            user_id,
            addr,
            room: None,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    clients: HashMap<UserId, Client>,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
            timeout,
        }
    }

    /// Registers a peer under `user_id`. False when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr, user_id: UserId) -> bool {
        if self.clients.len() >= self.max_clients {
            return false;
        }

        info!("Client {} connected from {}", user_id, addr);
        self.clients.insert(user_id, Client::new(user_id, addr));
        true
    }

    pub fn remove_client(&mut self, user_id: UserId) -> Option<Client> {
        let client = self.clients.remove(&user_id)?;
        info!("Client {} disconnected", client.user_id);
        Some(client)
    }

    pub fn set_room(&mut self, user_id: UserId, room: &str) {
        if let Some(client) = self.clients.get_mut(&user_id) {
            client.room = Some(room.to_string());
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<UserId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.user_id)
    }

    /// Marks the peer at `addr` as alive and returns who it is.
    pub fn touch_client(&mut self, addr: SocketAddr) -> Option<(UserId, Option<String>)> {
        let client = self
            .clients
            .values_mut()
            .find(|client| client.addr == addr)?;
        client.touch();
        Some((client.user_id, client.room.clone()))
    }

    /// Drops every client that has been silent for longer than the timeout
    /// and returns them with the room they were in.
    pub fn check_timeouts(&mut self) -> Vec<(UserId, Option<String>)> {
        let timed_out: Vec<UserId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(self.timeout))
            .map(|client| client.user_id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|user_id| self.remove_client(user_id))
            .map(|client| (client.user_id, client.room))
            .collect()
    }

    /// Addresses of every client placed in `room`.
    pub fn room_addrs(&self, room: &str) -> Vec<(UserId, SocketAddr)> {
        self.clients
            .values()
            .filter(|client| client.room.as_deref() == Some(room))
            .map(|client| (client.user_id, client.addr))
            .collect()
    }

    pub fn user_addr(&self, user_id: UserId) -> Option<SocketAddr> {
        self.clients.get(&user_id).map(|client| client.addr)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
