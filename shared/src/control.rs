//! Loop termination: the interrupt handle and the timeout clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation handle passed into each game loop and polled once per tick.
///
/// Clones share the same flag. Raising it never stops a tick halfway.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Why a loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TimedOut,
    Interrupted,
    /// The solo snake died, or every remote player left.
    GameOver,
}

impl StopReason {
    pub fn exit_code(self) -> u8 {
        match self {
            StopReason::Interrupted => 1,
            StopReason::TimedOut | StopReason::GameOver => 0,
        }
    }
}

/// Checks the exit conditions shared by all modes at a tick boundary.
#[derive(Debug, Clone)]
pub struct LoopControl {
    started: Instant,
    timeout: Option<Duration>,
    interrupt: Interrupt,
}

impl LoopControl {
    pub fn new(timeout: Option<Duration>, interrupt: Interrupt) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            interrupt,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// An interrupt wins over an expired timeout.
    pub fn check(&self) -> Option<StopReason> {
        if self.interrupt.is_raised() {
            return Some(StopReason::Interrupted);
        }
        match self.timeout {
            Some(timeout) if self.elapsed() > timeout => Some(StopReason::TimedOut),
            _ => None,
        }
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_shared_between_clones() {
        let interrupt = Interrupt::new();
        let other = interrupt.clone();
        assert!(!other.is_raised());
        interrupt.raise();
        assert!(other.is_raised());
    }

    #[test]
    fn test_loop_control_no_timeout() {
        let control = LoopControl::new(None, Interrupt::new());
        assert_eq!(control.check(), None);
    }

    #[test]
    fn test_loop_control_timeout() {
        let control = LoopControl::new(Some(Duration::from_millis(0)), Interrupt::new());
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(control.check(), Some(StopReason::TimedOut));
    }

    #[test]
    fn test_interrupt_takes_precedence() {
        let interrupt = Interrupt::new();
        let control = LoopControl::new(Some(Duration::from_millis(0)), interrupt.clone());
        std::thread::sleep(Duration::from_millis(2));
        interrupt.raise();
        assert_eq!(control.check(), Some(StopReason::Interrupted));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(StopReason::TimedOut.exit_code(), 0);
        assert_eq!(StopReason::GameOver.exit_code(), 0);
        assert_ne!(StopReason::Interrupted.exit_code(), 0);
    }
}
