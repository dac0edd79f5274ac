//! Types shared by the snake server, the player client and the CLI shell:
//! game constants, the line-based wire protocol, the resolved run
//! configuration and the interrupt handle polled by every tick loop.

pub mod config;
pub mod control;
pub mod protocol;

pub use config::{Capabilities, ConfigError, GameConfig, Geometry, Mode};
pub use control::{Interrupt, LoopControl, StopReason};
pub use protocol::{ClientMessage, Direction, ScoreEvent};

/// Snake ids double as display colour indices.
pub type SnakeId = u8;

pub const MIN_SNAKE_ID: SnakeId = 1;
pub const MAX_SNAKE_ID: SnakeId = 254;

pub const DISPLAY_WIDTH: u16 = 9 * 5;
pub const DISPLAY_HEIGHT: u16 = 8 * 5;
pub const Z_LAYER: u8 = 3;
pub const MAX_LAYER: u8 = 15;
pub const DELAY_MS: u64 = 50;
pub const LIVENESS_SECS: u64 = 5;

pub const MAX_SNAKE_LEN: usize = 1000;
pub const MAX_PLAYERS: usize = 100;
pub const SCORE_INCREMENT: i32 = 1;

/// Score value on the wire that marks a snake as dead.
pub const DEATH_SCORE: i32 = -1;

pub const SERVER_PORT: u16 = 4444;
pub const DISPLAY_PORT: u16 = 1337;
