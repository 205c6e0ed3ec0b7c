//! # Arena Server Library
//!
//! Authoritative server for a multiplayer arena in which animal avatars roam
//! a shared room, capture roaming NPC groups (stacks of collectible figures)
//! and throw them at each other. Clients only ever send intents; every
//! outcome is decided here and broadcast back to the room.
//!
//! ## Core Responsibilities
//!
//! ### Room Simulation
//! Each room owns its users, NPC groups and in-flight paths. A fixed-rate
//! tick resolves collisions, completes finished paths, despawns strays, makes
//! free groups flee from nearby players, drives bots and tops the room up
//! with fresh figures.
//!
//! ### Matchmaking
//! Players either name a room or are placed in the oldest room that is still
//! open. A room disappears with its last human player.
//!
//! ### State Broadcasting
//! Every committed change is pushed to the room as it happens: user updates,
//! group upserts (an empty figure list marks a deletion) and new paths. A
//! joining player first receives a full snapshot.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! One server task owns the [`world::World`] and multiplexes inbound packets
//! and ticks with `tokio::select!`, so no two mutations ever interleave.
//! Receiving, sending and timeout checking run as separate tasks that talk to
//! the loop over channels.
//!
//! ### Changesets
//! Operations never write to the stores directly. They return a
//! [`changeset::Changeset`] which is committed in one call, users first, then
//! groups, then paths, then the broadcast. A failed operation is logged and
//! leaves the room untouched.
//!
//! ## Module Organization
//!
//! - `world`: per-room state and the entry points request handlers call
//! - `npc_service`: capture, throw, path completion, flee, despawn, spawning
//! - `collision`: merge, bounce and emission arbitration
//! - `bots`: synthetic players driven through the same operations
//! - `tick`: the per-room simulation step
//! - `room_directory`: matchmaking and room lifetime
//! - `network` / `client_manager`: UDP transport and peer tracking
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use arena_server::config::GameConfig;
//! use arena_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", GameConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bots;
pub mod broadcast;
pub mod changeset;
pub mod client_manager;
pub mod collision;
pub mod config;
pub mod error;
pub mod network;
pub mod npc_service;
pub mod paths;
pub mod room_directory;
pub mod terrain;
pub mod tick;
pub mod users;
pub mod utils;
pub mod world;
