//! Run configuration as handed to the game loops.
//!
//! The CLI shell parses options into a [`GameConfig`] and calls
//! [`GameConfig::validate`] before anything else runs. The loops never see an
//! unvalidated value.

use crate::{DELAY_MS, DISPLAY_HEIGHT, DISPLAY_WIDTH, LIVENESS_SECS, MAX_LAYER, MAX_PLAYERS, Z_LAYER};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidGeometry(String),
    InvalidLayer(u8),
    InvalidTimeout(f64),
    InvalidDelay(u64),
    InvalidMode(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidGeometry(s) => write!(f, "Invalid size '{}'", s),
            ConfigError::InvalidLayer(l) => write!(f, "Invalid layer '{}'", l),
            ConfigError::InvalidTimeout(t) => write!(f, "Invalid timeout '{}'", t),
            ConfigError::InvalidDelay(d) => write!(f, "Invalid delay '{}'", d),
            ConfigError::InvalidMode(m) => {
                write!(f, "Unknown mode '{}', expected 'local', 'client', or 'server'", m)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which of the three programs to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    Client,
    Server,
}

/// What a mode does each tick. Every mode is one of these combinations over
/// the same tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Owns a `World` and advances it.
    pub simulates: bool,
    /// Exchanges protocol datagrams with a peer.
    pub networked: bool,
    /// Pushes frames to the LED display.
    pub owns_display: bool,
}

impl Mode {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Mode::Local => Capabilities {
                simulates: true,
                networked: false,
                owns_display: true,
            },
            Mode::Server => Capabilities {
                simulates: true,
                networked: true,
                owns_display: true,
            },
            Mode::Client => Capabilities {
                simulates: false,
                networked: true,
                owns_display: false,
            },
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Mode::Local),
            "client" => Ok(Mode::Client),
            "server" => Ok(Mode::Server),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Local => "local",
            Mode::Client => "client",
            Mode::Server => "server",
        };
        f.write_str(name)
    }
}

/// Grid size plus where the grid sits on the display, `WxH[+X+Y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
    pub x_offset: i32,
    pub y_offset: i32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: DISPLAY_WIDTH,
            height: DISPLAY_HEIGHT,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

impl FromStr for Geometry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidGeometry(s.to_string());

        let (width, rest) = s.split_once('x').ok_or_else(invalid)?;
        let width: u16 = width.parse().map_err(|_| invalid())?;

        // Offsets carry their own sign: "45x40+3-2".
        let split = rest.find(['+', '-']).unwrap_or(rest.len());
        let (height, offsets) = rest.split_at(split);
        let height: u16 = height.parse().map_err(|_| invalid())?;

        let (x_offset, y_offset) = if offsets.is_empty() {
            (0, 0)
        } else {
            let second = offsets[1..]
                .find(['+', '-'])
                .map(|i| i + 1)
                .ok_or_else(invalid)?;
            let (x, y) = offsets.split_at(second);
            (
                x.parse::<i32>().map_err(|_| invalid())?,
                y.parse::<i32>().map_err(|_| invalid())?,
            )
        };

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Geometry {
            width,
            height,
            x_offset,
            y_offset,
        })
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}{:+}{:+}",
            self.width, self.height, self.x_offset, self.y_offset
        )
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub geometry: Geometry,
    /// Display z-layer, 0 is the background.
    pub layer: u8,
    /// Tick interval.
    pub delay: Duration,
    /// Wall time after which the loop ends. `None` runs until interrupted.
    pub timeout: Option<Duration>,
    /// Sessions silent for longer than this are treated as having quit.
    pub liveness: Duration,
    pub max_players: usize,
    /// Seed for food and spawn placement.
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            layer: Z_LAYER,
            delay: Duration::from_millis(DELAY_MS),
            timeout: None,
            liveness: Duration::from_secs(LIVENESS_SECS),
            max_players: MAX_PLAYERS,
            seed: 0,
        }
    }
}

impl GameConfig {
    /// Sets the timeout from a seconds value as given on the command line.
    pub fn with_timeout_secs(mut self, secs: f64) -> Result<Self, ConfigError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ConfigError::InvalidTimeout(secs));
        }
        self.timeout = Some(Duration::from_secs_f64(secs));
        Ok(self)
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Result<Self, ConfigError> {
        if ms < 1 {
            return Err(ConfigError::InvalidDelay(ms));
        }
        self.delay = Duration::from_millis(ms);
        Ok(self)
    }

    pub fn with_layer(mut self, layer: u8) -> Result<Self, ConfigError> {
        if layer > MAX_LAYER {
            return Err(ConfigError::InvalidLayer(layer));
        }
        self.layer = layer;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geometry.width == 0 || self.geometry.height == 0 {
            return Err(ConfigError::InvalidGeometry(self.geometry.to_string()));
        }
        if self.layer > MAX_LAYER {
            return Err(ConfigError::InvalidLayer(self.layer));
        }
        if self.delay.is_zero() {
            return Err(ConfigError::InvalidDelay(0));
        }
        Ok(())
    }

    pub fn width(&self) -> u16 {
        self.geometry.width
    }

    pub fn height(&self) -> u16 {
        self.geometry.height
    }
}
