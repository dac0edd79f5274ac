//! Remote player sessions for the authoritative server
//!
//! This module maps transport addresses to snakes and tracks their liveness:
//! - Joining spawns a snake in the world and hands out its id
//! - Moves and quits are routed to the snake owned by the sender
//! - Silent sessions are swept after the liveness window, as if they quit
//!
//! All methods are called by the tick loop at a tick boundary, never from the
//! network receive path, so the world only has one writer.

use crate::game::{JoinError, World};
use log::{info, warn};
use shared::protocol::join_ack;
use shared::{Direction, ScoreEvent, SnakeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A registered remote player
#[derive(Debug, Clone)]
pub struct Session {
    /// Where datagrams for this player go
    pub addr: SocketAddr,
    /// Snake owned by this player, also its colour index
    pub snake_id: SnakeId,
    /// Last time any valid record arrived from this address
    pub last_seen: Instant,
    /// False once the snake has died; the session stays until quit/timeout
    pub alive: bool,
}

impl Session {
    pub fn new(addr: SocketAddr, snake_id: SnakeId, now: Instant) -> Self {
        Self {
            addr,
            snake_id,
            last_seen: now,
            alive: true,
        }
    }

    pub fn is_timed_out(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > window
    }
}

/// All sessions of one server, keyed by address
pub struct SessionRegistry {
    sessions: HashMap<SocketAddr, Session>,
    max_players: usize,
    liveness: Duration,
    had_players: bool,
    /// Ids whose final record goes out with the next tick
    pending_release: Vec<SnakeId>,
}

impl SessionRegistry {
    pub fn new(max_players: usize, liveness: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            max_players,
            liveness,
            had_players: false,
            pending_release: Vec::new(),
        }
    }

    /// Registers `addr` and spawns its snake.
    ///
    /// A join from an address that already has a session only refreshes it
    /// and returns the existing id, so a lost acknowledgement can be re-sent.
    pub fn join(
        &mut self,
        world: &mut World,
        addr: SocketAddr,
        now: Instant,
    ) -> Result<SnakeId, JoinError> {
        if let Some(session) = self.sessions.get_mut(&addr) {
            session.last_seen = now;
            return Ok(session.snake_id);
        }

        let playing = self.sessions.values().filter(|s| s.alive).count();
        if playing >= self.max_players {
            warn!("Rejected join from {}: server full", addr);
            return Err(JoinError::ServerFull);
        }

        let snake_id = world.spawn_snake().map_err(|e| {
            warn!("Rejected join from {}: {}", addr, e);
            e
        })?;

        info!("Player {} joined from {}", snake_id, addr);
        self.sessions
            .insert(addr, Session::new(addr, snake_id, now));
        self.had_players = true;
        Ok(snake_id)
    }

    /// Applies a direction request from `addr`. Unknown senders are ignored.
    pub fn move_snake(
        &mut self,
        world: &mut World,
        addr: SocketAddr,
        direction: Direction,
        now: Instant,
    ) -> bool {
        match self.sessions.get_mut(&addr) {
            Some(session) => {
                session.last_seen = now;
                session.alive && world.set_direction(session.snake_id, direction)
            }
            None => false,
        }
    }

    /// Destroys the session of `addr` and removes its snake from the world.
    pub fn quit(&mut self, world: &mut World, addr: SocketAddr) -> Option<SnakeId> {
        let session = self.sessions.remove(&addr)?;
        info!("Player {} quit from {}", session.snake_id, addr);
        self.drop_snake(world, &session);
        Some(session.snake_id)
    }

    /// Treats every session silent for longer than the liveness window as a
    /// quit. Returns the ids of the swept sessions.
    pub fn sweep_timeouts(&mut self, world: &mut World, now: Instant) -> Vec<SnakeId> {
        let timed_out: Vec<SocketAddr> = self
            .sessions
            .values()
            .filter(|s| s.is_timed_out(now, self.liveness))
            .map(|s| s.addr)
            .collect();

        let mut swept = Vec::with_capacity(timed_out.len());
        for addr in timed_out {
            if let Some(session) = self.sessions.remove(&addr) {
                info!("Player {} timed out ({})", session.snake_id, addr);
                self.drop_snake(world, &session);
                swept.push(session.snake_id);
            }
        }
        swept
    }

    /// Flags sessions whose snakes died this tick.
    pub fn mark_dead(&mut self, ids: impl IntoIterator<Item = SnakeId>) {
        for id in ids {
            if let Some(session) = self
                .sessions
                .values_mut()
                .find(|s| s.snake_id == id && s.alive)
            {
                session.alive = false;
            }
        }
    }

    /// Returns ids to the pool once their final record has been sent.
    pub fn release_ids(&mut self, world: &mut World) {
        for id in self.pending_release.drain(..) {
            world.release_id(id);
        }
    }

    /// The latest record for the snake owned by `addr`.
    pub fn status_record(&self, world: &World, addr: SocketAddr) -> Option<ScoreEvent> {
        let session = self.sessions.get(&addr)?;
        match world.snake(session.snake_id) {
            Some(snake) if session.alive => Some(ScoreEvent::new(snake.id, snake.score)),
            _ => Some(ScoreEvent::death(session.snake_id)),
        }
    }

    /// The acknowledgement that tells `addr` which snake it owns.
    pub fn ack_records(&self, world: &World, addr: SocketAddr) -> Option<Vec<ScoreEvent>> {
        let current = self.status_record(world, addr)?;
        Some(join_ack(current.id, current))
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<&Session> {
        self.sessions.get(&addr)
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.sessions.keys().copied().collect()
    }

    /// True once every player that ever joined has gone.
    pub fn all_left(&self) -> bool {
        self.had_players && self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn drop_snake(&mut self, world: &mut World, session: &Session) {
        // A dead snake already had its final record sent.
        if session.alive {
            world.remove_snake(session.snake_id);
        }
        self.pending_release.push(session.snake_id);
    }
}
