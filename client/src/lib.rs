//! # Snake Client Library
//!
//! This library provides a headless terminal client for the multiplayer snake
//! server. It connects over TCP, sends the player's name, keeps a mirror of the
//! server's world and turns keys typed on stdin into direction commands.
//!
//! ## Architecture Overview
//!
//! The server is authoritative; the client never simulates. Everything it knows
//! about the world comes from the line stream:
//!
//! ### Handshake
//! The first two lines are the assigned player id and the world size. A
//! `server full` line instead of an id means the server turned the connection
//! away.
//!
//! ### World Mirror
//! Every later line is a wall, powerup or snake object. Objects replace the
//! previous version with the same id; a snake flagged as disconnected is
//! dropped from the mirror.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The mirrored world and the handshake phase of the stream.
//!
//! ### Input Module (`input`)
//! Mapping of terminal input to `{"moving": ...}` commands.
//!
//! ### Network Module (`network`)
//! The connection, the receive loop and the periodic status line.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1", 11000, "Bob").await?;
//!     client.run().await
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
