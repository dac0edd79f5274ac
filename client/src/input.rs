//! Keyboard input in terminal raw mode

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, error};
use shared::{ClientMessage, Interrupt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a single key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Send(ClientMessage),
    /// Ctrl+C. Raw mode swallows SIGINT, so the reader raises it instead.
    Interrupt,
}

/// Maps a key press to an action. Join is never typed by the player.
pub fn map_key(key: &KeyEvent) -> Option<KeyAction> {
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(KeyAction::Interrupt)
        }
        KeyCode::Char(c) if c.is_ascii() => match ClientMessage::from_key(c as u8)? {
            ClientMessage::Join => None,
            message => Some(KeyAction::Send(message)),
        },
        _ => None,
    }
}

/// Puts the terminal in raw mode for as long as it lives.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            error!("Failed to restore terminal: {}", e);
        }
    }
}

/// Reads the keyboard on a blocking thread and forwards player messages.
///
/// The reader stops once the interrupt is raised or the receiver is dropped.
pub fn spawn_keyboard_reader(
    interrupt: Interrupt,
) -> (mpsc::UnboundedReceiver<ClientMessage>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::task::spawn_blocking(move || {
        while !interrupt.is_raised() && !tx.is_closed() {
            match event::poll(POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!("Keyboard poll failed: {}", e);
                    break;
                }
            }

            let key = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                Ok(_) => continue,
                Err(e) => {
                    error!("Keyboard read failed: {}", e);
                    break;
                }
            };

            match map_key(&key) {
                Some(KeyAction::Send(message)) => {
                    if tx.send(message).is_err() {
                        break;
                    }
                }
                Some(KeyAction::Interrupt) => {
                    debug!("Ctrl+C pressed");
                    interrupt.raise();
                    break;
                }
                None => {}
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Direction;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_movement_keys() {
        assert_eq!(
            map_key(&press(KeyCode::Char('w'))),
            Some(KeyAction::Send(ClientMessage::Move(Direction::Up)))
        );
        assert_eq!(
            map_key(&press(KeyCode::Char('A'))),
            Some(KeyAction::Send(ClientMessage::Move(Direction::Left)))
        );
        assert_eq!(
            map_key(&press(KeyCode::Char('s'))),
            Some(KeyAction::Send(ClientMessage::Move(Direction::Down)))
        );
        assert_eq!(
            map_key(&press(KeyCode::Char('d'))),
            Some(KeyAction::Send(ClientMessage::Move(Direction::Right)))
        );
    }

    #[test]
    fn test_quit_key() {
        assert_eq!(
            map_key(&press(KeyCode::Char('0'))),
            Some(KeyAction::Send(ClientMessage::Quit))
        );
    }

    #[test]
    fn test_ctrl_c_interrupts() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(&key), Some(KeyAction::Interrupt));
    }

    #[test]
    fn test_other_keys_ignored() {
        assert_eq!(map_key(&press(KeyCode::Char('j'))), None);
        assert_eq!(map_key(&press(KeyCode::Char('c'))), None);
        assert_eq!(map_key(&press(KeyCode::Char('é'))), None);
        assert_eq!(map_key(&press(KeyCode::Up)), None);
        assert_eq!(map_key(&press(KeyCode::Enter)), None);
    }
}
