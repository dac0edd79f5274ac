//! # Snake Client Library
//!
//! Player-facing side of the game: keyboard input, the terminal status line
//! and the two ways of playing.
//!
//! ## Playing Remotely
//! [`network::Client`] joins a server, forwards key presses and keeps a
//! [`scoreboard::Scoreboard`] of the score records the server sends back.
//! It never simulates anything itself; the server is the only authority.
//!
//! ## Playing Locally
//! [`local::LocalGame`] runs the server's simulation in-process with a single
//! snake and draws straight to the display. It ends as soon as that snake dies.
//!
//! ## Module Organization
//!
//! - `input`: raw-mode keyboard reader and key mapping
//! - `scoreboard`: local view of the score records
//! - `status`: `MM:SS (score: N)` status line and final message
//! - `network`: remote play over UDP
//! - `local`: single-player play without a network

pub mod input;
pub mod local;
pub mod network;
pub mod scoreboard;
pub mod status;
