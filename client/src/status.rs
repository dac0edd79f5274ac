//! One-line terminal status view

use shared::StopReason;
use std::io::{self, Write};
use std::time::Duration;

/// How a player's game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub reason: StopReason,
    pub elapsed: Duration,
    pub score: i32,
    pub died: bool,
}

/// `MM:SS`, with minutes allowed past 99.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn final_message(outcome: &Outcome) -> String {
    let clock = format_elapsed(outcome.elapsed);
    if outcome.died {
        format!("You Died at {} (score: {})", clock, outcome.score)
    } else {
        format!("Game Over at {} (score: {})", clock, outcome.score)
    }
}

/// Rewrites a single terminal line in place.
///
/// Lines end with `\r\n` because the terminal is in raw mode.
pub struct StatusLine<W: Write> {
    out: W,
}

impl<W: Write> StatusLine<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn update(&mut self, elapsed: Duration, score: i32) -> io::Result<()> {
        write!(self.out, "\r{} (score: {})", format_elapsed(elapsed), score)?;
        self.out.flush()
    }

    pub fn finish(&mut self, outcome: &Outcome) -> io::Result<()> {
        write!(self.out, "\r\n{}\r\n", final_message(outcome))?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
