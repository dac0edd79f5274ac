//! # Snake Server Library
//!
//! This library provides the authoritative snake simulation and the UDP server
//! that runs it for remote players. The same simulation also drives local
//! single-player games, so nothing in here assumes a network is present.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The [`game::World`] owns the grid, every snake and the food. It advances in
//! discrete ticks: all moves are planned against the state at the start of the
//! tick, collisions are resolved against that snapshot, and only then is the
//! result applied. Simultaneous moves therefore never depend on snake order.
//!
//! ### Session Management
//! Remote players are tracked by transport address in
//! [`sessions::SessionRegistry`]:
//! - Joining spawns a snake and hands out its id
//! - Direction requests and quits are routed to the sender's snake
//! - Sessions silent for longer than the liveness window are swept
//! - Ids are only recycled after their final record has gone out
//!
//! ### Score Broadcasting
//! After every tick each session receives one datagram holding the score
//! records that changed in that tick, with `-1` marking a death.
//!
//! ## Module Organization
//!
//! - `grid`: bounded cell grid with an occupancy index
//! - `game`: snakes, the id pool and the tick algorithm
//! - `sessions`: address to snake mapping and liveness
//! - `render`: projection of the world to an RGB frame
//! - `display`: frame sinks, including the Flaschen-Taschen UDP display
//! - `network`: the tick loop and its UDP receive/send tasks
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::display::NullSink;
//! use server::network::Server;
//! use shared::{GameConfig, Interrupt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind("0.0.0.0:4444", GameConfig::default(), Box::new(NullSink)).await?;
//!
//!     // Runs until every player has left or the interrupt is raised
//!     let reason = server.run(Interrupt::new()).await?;
//!     println!("stopped: {:?}", reason);
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod game;
pub mod grid;
pub mod network;
pub mod render;
pub mod sessions;
