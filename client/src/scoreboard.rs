//! Client-side view of the score records sent by the server.

use log::info;
use shared::protocol::join_ack_id;
use shared::{ScoreEvent, SnakeId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStatus {
    pub score: i32,
    pub alive: bool,
}

/// Scores of every snake this client has heard about.
///
/// The client's own snake is named by the first join acknowledgement, so
/// tick records that arrive before it never claim ownership.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    own_id: Option<SnakeId>,
    players: BTreeMap<SnakeId, PlayerStatus>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the records of one server datagram.
    pub fn apply(&mut self, events: &[ScoreEvent]) {
        let mut records = events;
        if let Some(id) = join_ack_id(events) {
            if self.own_id.is_none() {
                info!("Playing as snake {}", id);
                self.own_id = Some(id);
            }
            // The leading record only names the snake, its state follows.
            self.players.entry(id).or_insert(PlayerStatus {
                score: 0,
                alive: true,
            });
            records = &events[1..];
        }

        for event in records {
            let status = self.players.entry(event.id).or_insert(PlayerStatus {
                score: 0,
                alive: true,
            });
            if event.is_death() {
                // Keep the last score so the final message can show it.
                status.alive = false;
            } else {
                status.score = event.score;
                status.alive = true;
            }
        }
    }

    pub fn own_id(&self) -> Option<SnakeId> {
        self.own_id
    }

    pub fn own_score(&self) -> i32 {
        self.own_id
            .and_then(|id| self.players.get(&id))
            .map_or(0, |status| status.score)
    }

    pub fn own_dead(&self) -> bool {
        self.own_id
            .and_then(|id| self.players.get(&id))
            .is_some_and(|status| !status.alive)
    }

    pub fn get(&self, id: SnakeId) -> Option<PlayerStatus> {
        self.players.get(&id).copied()
    }

    /// Live snakes, best score first.
    pub fn standings(&self) -> Vec<(SnakeId, i32)> {
        let mut standings: Vec<(SnakeId, i32)> = self
            .players
            .iter()
            .filter(|(_, status)| status.alive)
            .map(|(id, status)| (*id, status.score))
            .collect();
        standings.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        standings
    }
}
