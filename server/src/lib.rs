//! # Snake Server Library
//!
//! This library provides the authoritative server for the multiplayer snake
//! game. It owns the canonical world, applies direction commands from clients
//! and streams the world to every connected player once per tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Snake movement, growth, wrap-around, collisions and respawns all happen
//! here. Clients only send direction changes and render what they receive.
//!
//! ### Session Management
//! Every accepted TCP connection goes through a fixed sequence of phases:
//! - `AwaitingName`: the first line is the player's display name; the server
//!   spawns a snake and replies with the player id, the world size and the walls
//! - `Active`: every further line is a `{"moving": ...}` command
//! - `Removed`: on any error the client is dropped and its snake is flagged as
//!   disconnected, broadcast once more and then purged
//!
//! ### State Broadcasting
//! Each tick serializes all powerups and all relevant snakes into one text
//! blob, one JSON object per line, and sends the same blob to every active
//! client.
//!
//! ## Architecture Design
//!
//! ### Dedicated Tick Thread
//! The simulation runs on its own OS thread that sleeps in one millisecond
//! steps until a frame has elapsed. It starts when the server starts, not when
//! the first player joins.
//!
//! ### Task Per Connection
//! Socket I/O is asynchronous. Each connection is driven by one tokio task that
//! issues one read at a time and dispatches complete lines on the session
//! phase. Writes are queued to a per-connection writer task, so the tick thread
//! never blocks on a slow client.
//!
//! ### Locking
//! The connection registry and the game each sit behind a mutex. When both are
//! needed the registry is locked first. No lock is held across an await or a
//! socket write.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Registry of connections, their session phase and write handles, with the
//! capacity limit.
//!
//! ### Config Module (`config`)
//! Game settings loaded from an optional JSON file.
//!
//! ### Game Module (`game`)
//! The world, the tick step, collision resolution, spawning and the per-tick
//! snapshot.
//!
//! ### Network Module (`network`)
//! The server itself: accept loop, sessions and the tick loop.
//!
//! ### Physics Module (`physics`)
//! Axis-aligned collision geometry for heads, walls and bodies.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameSettings;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = GameSettings::default();
//!     let mut server = Server::start("0.0.0.0:11000", &settings, 64).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.stop();
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod physics;
