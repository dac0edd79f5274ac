//! Line-based ASCII wire protocol.
//!
//! Client to server, one key per line:
//! `J` join (also a heartbeat), `W`/`A`/`S`/`D` move, `0` quit.
//!
//! Server to client, one record per line: `<id> <score>`, where a score of
//! `-1` means the snake died and should be dropped from the local view.
//!
//! A join acknowledgement opens with `<id> 0`, followed by the snake's
//! current record if it has scored or died since. Tick records only ever
//! carry a positive score or `-1`, so a datagram whose first record scores
//! `0` is always an acknowledgement, even when earlier datagrams were lost.
//!
//! Anything that does not decode is skipped. There is no negative
//! acknowledgement on either side.

use crate::{SnakeId, DEATH_SCORE, MAX_SNAKE_ID, MIN_SNAKE_ID};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Unit step as `(dx, dy)`, with y growing downwards like the display.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    Join,
    Move(Direction),
    Quit,
}

impl ClientMessage {
    /// Maps a key byte to a message. Lowercase movement keys are accepted so
    /// a plain terminal can drive the protocol.
    pub fn from_key(key: u8) -> Option<ClientMessage> {
        match key.to_ascii_uppercase() {
            b'W' => Some(ClientMessage::Move(Direction::Up)),
            b'A' => Some(ClientMessage::Move(Direction::Left)),
            b'S' => Some(ClientMessage::Move(Direction::Down)),
            b'D' => Some(ClientMessage::Move(Direction::Right)),
            b'0' => Some(ClientMessage::Quit),
            b'J' => Some(ClientMessage::Join),
            _ => None,
        }
    }

    pub fn key(self) -> u8 {
        match self {
            ClientMessage::Join => b'J',
            ClientMessage::Move(Direction::Up) => b'W',
            ClientMessage::Move(Direction::Left) => b'A',
            ClientMessage::Move(Direction::Down) => b'S',
            ClientMessage::Move(Direction::Right) => b'D',
            ClientMessage::Quit => b'0',
        }
    }

    pub fn encode(self) -> Vec<u8> {
        vec![self.key(), b'\n']
    }
}

/// Decodes every well-formed record in a client datagram, in order.
pub fn decode_client_datagram(data: &[u8]) -> Vec<ClientMessage> {
    data.split(|b| *b == b'\n')
        .filter_map(|record| match record.trim_ascii() {
            [key] => ClientMessage::from_key(*key),
            _ => None,
        })
        .collect()
}

/// Score change for one snake in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEvent {
    pub id: SnakeId,
    pub score: i32,
}

impl ScoreEvent {
    pub fn new(id: SnakeId, score: i32) -> Self {
        Self { id, score }
    }

    pub fn death(id: SnakeId) -> Self {
        Self {
            id,
            score: DEATH_SCORE,
        }
    }

    pub fn is_death(&self) -> bool {
        self.score == DEATH_SCORE
    }
}

pub fn encode_score_events(events: &[ScoreEvent]) -> Vec<u8> {
    let mut out = String::with_capacity(events.len() * 8);
    for event in events {
        let _ = writeln!(out, "{} {}", event.id, event.score);
    }
    out.into_bytes()
}

/// Records acknowledging a join of snake `id` whose latest record is `current`.
pub fn join_ack(id: SnakeId, current: ScoreEvent) -> Vec<ScoreEvent> {
    let mut records = vec![ScoreEvent::new(id, 0)];
    if current.score != 0 {
        records.push(current);
    }
    records
}

/// The snake id a datagram acknowledges, if it is a join acknowledgement.
pub fn join_ack_id(records: &[ScoreEvent]) -> Option<SnakeId> {
    match records.first() {
        Some(first) if first.score == 0 => Some(first.id),
        _ => None,
    }
}

pub fn decode_score_datagram(data: &[u8]) -> Vec<ScoreEvent> {
    let Ok(text) = std::str::from_utf8(data) else {
        return Vec::new();
    };
    text.lines().filter_map(decode_score_record).collect()
}

fn decode_score_record(line: &str) -> Option<ScoreEvent> {
    let mut fields = line.split_ascii_whitespace();
    let id: SnakeId = fields.next()?.parse().ok()?;
    let score: i32 = fields.next()?.parse().ok()?;
    if fields.next().is_some() || !(MIN_SNAKE_ID..=MAX_SNAKE_ID).contains(&id) {
        return None;
    }
    if score < DEATH_SCORE {
        return None;
    }
    Some(ScoreEvent { id, score })
}
