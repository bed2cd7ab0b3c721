//! Connection registry for the snake server
//!
//! This module tracks every accepted connection from accept to removal:
//! - Session phase (awaiting a name, active, removed)
//! - The write handle used to broadcast world updates
//! - Capacity enforcement against the configured client limit
//!
//! The registry is owned by the server and shared with the session tasks and
//! the tick thread behind one lock. When both the registry and the game are
//! needed, the registry lock is taken first.

use log::info;
use shared::transport::ConnectionHandle;
use std::collections::HashMap;
use std::time::Instant;

/// Protocol phase of one connection
///
/// A connection starts out waiting for the player's name, becomes active once
/// the handshake has been sent, and is removed on the first error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingName,
    Active,
    Removed,
}

/// Represents a connected client and its session state
#[derive(Debug)]
pub struct Client {
    /// Connection id, which is also the id of the client's snake
    pub id: u32,
    /// Write side of the connection
    pub handle: ConnectionHandle,
    /// Display name, known once the first line has arrived
    pub name: Option<String>,
    pub phase: SessionPhase,
    /// When the connection was accepted
    pub connected_at: Instant,
}

impl Client {
    /// Creates a client that has not sent its name yet
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            id: handle.id(),
            handle,
            name: None,
            phase: SessionPhase::AwaitingName,
            connected_at: Instant::now(),
        }
    }

    /// Returns true if world updates should be sent to this client
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }
}

/// Manages all connected clients
///
/// The ClientManager enforces the server's capacity limit and tells the tick
/// loop which connections should receive the per-tick broadcast. Connections
/// that have not finished the handshake count towards capacity but receive
/// nothing until they are activated.
pub struct ClientManager {
    /// Connected clients indexed by connection id
    clients: HashMap<u32, Client>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Registers a freshly accepted connection in the `AwaitingName` phase
    ///
    /// Returns false if the server is at capacity, in which case the caller is
    /// expected to turn the connection away.
    pub fn add_client(&mut self, handle: ConnectionHandle) -> bool {
        if self.clients.len() >= self.max_clients {
            return false;
        }

        let client = Client::new(handle);
        info!("Client {} registered", client.id);
        self.clients.insert(client.id, client);
        true
    }

    /// Moves a client to the `Active` phase once its handshake has been sent
    ///
    /// Returns false if the client is unknown or not waiting for its name.
    pub fn activate(&mut self, client_id: u32, name: &str) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if client.phase == SessionPhase::AwaitingName => {
                client.name = Some(name.to_owned());
                client.phase = SessionPhase::Active;
                info!("Client {} joined as {:?}", client_id, name);
                true
            }
            _ => false,
        }
    }

    /// Removes a client from the server
    ///
    /// Returns the removed record, marked `Removed`, or None if it was
    /// already gone. The connection is closed so no further sends go out.
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        let mut client = self.clients.remove(&client_id)?;
        client.phase = SessionPhase::Removed;
        client.handle.close();
        info!("Client {} disconnected", client_id);
        Some(client)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Returns the phase of a client, `Removed` if it is not registered
    pub fn phase(&self, client_id: u32) -> SessionPhase {
        self.clients
            .get(&client_id)
            .map_or(SessionPhase::Removed, |client| client.phase)
    }

    /// Handles of every active client, ordered by id
    ///
    /// Used by the tick loop to broadcast the world snapshot.
    pub fn active_handles(&self) -> Vec<ConnectionHandle> {
        let mut handles: Vec<ConnectionHandle> = self
            .clients
            .values()
            .filter(|client| client.is_active())
            .map(|client| client.handle.clone())
            .collect();
        handles.sort_by_key(ConnectionHandle::id);
        handles
    }

    /// Returns the number of active clients
    pub fn active_count(&self) -> usize {
        self.clients.values().filter(|c| c.is_active()).count()
    }

    /// Returns the number of currently registered clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently registered
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Closes and forgets every client
    pub fn close_all(&mut self) {
        for (_, client) in self.clients.drain() {
            client.handle.close();
        }
    }
}
