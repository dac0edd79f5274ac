//! Authoritative world state and the per-tick simulation.

use crate::grid::{Cell, CellContents, Grid};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::{
    Direction, ScoreEvent, SnakeId, MAX_SNAKE_ID, MAX_SNAKE_LEN, MIN_SNAKE_ID, SCORE_INCREMENT,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Spawns keep at least this many king moves away from any snake when the
/// board allows it.
pub const SPAWN_CLEARANCE: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// No free cell to place a new snake on.
    GridFull,
    /// Player limit reached or no snake id left.
    ServerFull,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::GridFull => f.write_str("Grid full"),
            JoinError::ServerFull => f.write_str("Server full"),
        }
    }
}

impl std::error::Error for JoinError {}

#[derive(Debug, Clone)]
pub struct Snake {
    pub id: SnakeId,
    /// Head first, tail last.
    pub body: VecDeque<Cell>,
    pub heading: Direction,
    pub pending_direction: Direction,
    pub alive: bool,
    pub score: i32,
}

impl Snake {
    pub fn new(id: SnakeId, body: VecDeque<Cell>, heading: Direction) -> Self {
        Self {
            id,
            body,
            heading,
            pending_direction: heading,
            alive: true,
            score: 0,
        }
    }

    pub fn head(&self) -> Cell {
        self.body[0]
    }

    pub fn tail(&self) -> Cell {
        self.body[self.body.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Records a turn request. A request to reverse into the neck is dropped.
    pub fn request_direction(&mut self, direction: Direction) {
        if direction != self.heading.opposite() {
            self.pending_direction = direction;
        }
    }

    /// Direction the snake moves this tick.
    pub fn committed_direction(&self) -> Direction {
        if self.pending_direction == self.heading.opposite() {
            self.heading
        } else {
            self.pending_direction
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Vacant,
    Live(Snake),
    /// Dead, but the id is still referenced by a session.
    Retired,
}

/// Id-addressed arena of snakes. Slot `i` holds id `i + 1`.
///
/// Fresh ids are handed out first. Released ids are recycled only once the
/// fresh range is used up.
#[derive(Debug, Clone)]
pub struct SnakePool {
    slots: Vec<Slot>,
    next_fresh: usize,
    recycled: VecDeque<SnakeId>,
}

impl SnakePool {
    pub fn new() -> Self {
        let capacity = (MAX_SNAKE_ID - MIN_SNAKE_ID) as usize + 1;
        Self {
            slots: vec![Slot::Vacant; capacity],
            next_fresh: 0,
            recycled: VecDeque::new(),
        }
    }

    fn allocate(&mut self) -> Option<SnakeId> {
        if self.next_fresh < self.slots.len() {
            let id = self.next_fresh as SnakeId + MIN_SNAKE_ID;
            self.next_fresh += 1;
            return Some(id);
        }
        self.recycled.pop_front()
    }

    fn slot_mut(&mut self, id: SnakeId) -> Option<&mut Slot> {
        let index = id.checked_sub(MIN_SNAKE_ID)? as usize;
        self.slots.get_mut(index)
    }

    fn insert(&mut self, snake: Snake) {
        if let Some(slot) = self.slot_mut(snake.id) {
            *slot = Slot::Live(snake);
        }
    }

    fn retire(&mut self, id: SnakeId) -> Option<Snake> {
        let slot = self.slot_mut(id)?;
        match std::mem::replace(slot, Slot::Retired) {
            Slot::Live(snake) => Some(snake),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Makes a retired id available again. Live ids are left alone.
    fn release(&mut self, id: SnakeId) -> bool {
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        if matches!(slot, Slot::Retired) {
            *slot = Slot::Vacant;
            self.recycled.push_back(id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: SnakeId) -> Option<&Snake> {
        let index = id.checked_sub(MIN_SNAKE_ID)? as usize;
        match self.slots.get(index)? {
            Slot::Live(snake) => Some(snake),
            _ => None,
        }
    }

    fn get_mut(&mut self, id: SnakeId) -> Option<&mut Snake> {
        match self.slot_mut(id)? {
            Slot::Live(snake) => Some(snake),
            _ => None,
        }
    }

    /// Live snakes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Snake> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Live(snake) => Some(snake),
            _ => None,
        })
    }

    pub fn live_count(&self) -> usize {
        self.iter().count()
    }
}

impl Default for SnakePool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Running,
    Ended,
}

/// Outcome of one tick: every score change and death, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<ScoreEvent>,
}

impl TickReport {
    pub fn deaths(&self) -> impl Iterator<Item = SnakeId> + '_ {
        self.events.iter().filter(|e| e.is_death()).map(|e| e.id)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// One snake's planned move, computed before anything is mutated.
#[derive(Debug, Clone, Copy)]
struct PlannedMove {
    id: SnakeId,
    direction: Direction,
    new_head: Option<Cell>,
    eats: bool,
    grows: bool,
}

/// The single source of truth for a game: board, snakes, food and tick count.
pub struct World {
    grid: Grid,
    snakes: SnakePool,
    food: Option<Cell>,
    tick: u64,
    phase: GamePhase,
    rng: StdRng,
    /// Removals between ticks, reported with the next tick.
    departures: Vec<ScoreEvent>,
}

impl World {
    pub fn new(width: u16, height: u16, seed: u64) -> Self {
        let mut world = Self {
            grid: Grid::new(width, height),
            snakes: SnakePool::new(),
            food: None,
            tick: 0,
            phase: GamePhase::Running,
            rng: StdRng::seed_from_u64(seed),
            departures: Vec::new(),
        };
        world.respawn_food();
        world
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn food(&self) -> Option<Cell> {
        self.food
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == GamePhase::Running
    }

    pub fn end(&mut self) {
        if self.phase == GamePhase::Running {
            info!("Game ended at tick {}", self.tick);
            self.phase = GamePhase::Ended;
        }
    }

    pub fn snake(&self, id: SnakeId) -> Option<&Snake> {
        self.snakes.get(id)
    }

    pub fn snakes(&self) -> impl Iterator<Item = &Snake> {
        self.snakes.iter()
    }

    pub fn alive_count(&self) -> usize {
        self.snakes.live_count()
    }

    /// Sets the direction a snake takes at the next tick. Later requests in
    /// the same tick replace earlier ones.
    pub fn set_direction(&mut self, id: SnakeId, direction: Direction) -> bool {
        match self.snakes.get_mut(id) {
            Some(snake) => {
                snake.request_direction(direction);
                true
            }
            None => false,
        }
    }

    /// Places a new length-1 snake on a random free cell, preferring cells
    /// with [`SPAWN_CLEARANCE`] around them.
    pub fn spawn_snake(&mut self) -> Result<SnakeId, JoinError> {
        let free: Vec<Cell> = self.grid.free_cells().collect();
        if free.is_empty() {
            return Err(JoinError::GridFull);
        }

        let clear: Vec<Cell> = free
            .iter()
            .copied()
            .filter(|cell| !self.grid.snake_within(*cell, SPAWN_CLEARANCE))
            .collect();
        let candidates = if clear.is_empty() { &free } else { &clear };

        let cell = *candidates
            .choose(&mut self.rng)
            .ok_or(JoinError::GridFull)?;
        let heading = Direction::ALL
            .into_iter()
            .max_by_key(|dir| self.grid.free_run(cell, *dir))
            .unwrap_or(Direction::Right);

        self.spawn_snake_at(&[cell], heading)
    }

    /// Places a snake with the given body (head first). Every cell must be on
    /// the board and unoccupied.
    pub fn spawn_snake_at(
        &mut self,
        body: &[Cell],
        heading: Direction,
    ) -> Result<SnakeId, JoinError> {
        if body.is_empty() || body.len() > MAX_SNAKE_LEN {
            return Err(JoinError::GridFull);
        }
        let unique: HashSet<Cell> = body.iter().copied().collect();
        let fits = unique.len() == body.len()
            && body.iter().all(|cell| {
                cell.x < self.grid.width()
                    && cell.y < self.grid.height()
                    && !self.grid.is_occupied(*cell)
            });
        if !fits {
            return Err(JoinError::GridFull);
        }

        let id = self.snakes.allocate().ok_or(JoinError::ServerFull)?;
        let snake = Snake::new(id, body.iter().copied().collect(), heading);
        self.paint_snake(&snake);
        info!(
            "Spawned snake {} at ({}, {}) heading {:?}",
            id,
            snake.head().x,
            snake.head().y,
            heading
        );
        self.snakes.insert(snake);
        Ok(id)
    }

    /// Removes a live snake outside a tick, e.g. when its player quits. The
    /// death is reported with the next tick.
    pub fn remove_snake(&mut self, id: SnakeId) -> bool {
        match self.snakes.retire(id) {
            Some(snake) => {
                self.erase_snake(&snake);
                self.departures.push(ScoreEvent::death(id));
                info!("Removed snake {} (score {})", id, snake.score);
                true
            }
            None => false,
        }
    }

    /// Returns a dead snake's id to the pool once nobody refers to it.
    pub fn release_id(&mut self, id: SnakeId) -> bool {
        self.snakes.release(id)
    }

    /// Moves the food to `cell`. Fails if the cell is taken.
    pub fn place_food(&mut self, cell: Cell) -> bool {
        if cell.x >= self.grid.width() || cell.y >= self.grid.height() {
            return false;
        }
        if self.grid.is_occupied(cell) && self.food != Some(cell) {
            return false;
        }
        if let Some(old) = self.food.take() {
            self.grid.clear(old);
        }
        self.grid.set(cell, CellContents::Food);
        self.food = Some(cell);
        true
    }

    /// Advances every live snake one cell.
    ///
    /// All moves are planned against the pre-tick board, then collisions are
    /// resolved, then survivors are applied together. The order snakes are
    /// stored in never changes the outcome.
    pub fn tick(&mut self) -> TickReport {
        let mut events = std::mem::take(&mut self.departures);
        if self.phase == GamePhase::Ended {
            return TickReport {
                tick: self.tick,
                events,
            };
        }

        let plans = self.plan_moves();
        let dead = self.resolve_collisions(&plans);
        let food_eaten = self.apply_moves(&plans, &dead, &mut events);

        if food_eaten || self.food.is_none() {
            self.respawn_food();
        }

        self.tick += 1;
        events.sort_by_key(|e| e.id);

        if self.tick % 100 == 0 {
            debug!(
                "Tick {}: {} snakes, food at {:?}",
                self.tick,
                self.alive_count(),
                self.food
            );
        }

        TickReport {
            tick: self.tick,
            events,
        }
    }

    fn plan_moves(&self) -> Vec<PlannedMove> {
        self.snakes
            .iter()
            .map(|snake| {
                let direction = snake.committed_direction();
                let new_head = self.grid.step(snake.head(), direction);
                let eats = new_head.is_some() && new_head == self.food;
                PlannedMove {
                    id: snake.id,
                    direction,
                    new_head,
                    eats,
                    grows: eats && snake.len() < MAX_SNAKE_LEN,
                }
            })
            .collect()
    }

    fn resolve_collisions(&self, plans: &[PlannedMove]) -> HashSet<SnakeId> {
        // Tails that leave this tick are free to move into.
        let vacating: HashSet<Cell> = plans
            .iter()
            .filter(|plan| !plan.grows)
            .filter_map(|plan| self.snakes.get(plan.id).map(Snake::tail))
            .collect();

        let mut heads: HashMap<Cell, usize> = HashMap::new();
        for head in plans.iter().filter_map(|plan| plan.new_head) {
            *heads.entry(head).or_default() += 1;
        }

        plans
            .iter()
            .filter(|plan| match plan.new_head {
                None => true,
                Some(head) => {
                    heads.get(&head).copied().unwrap_or(0) > 1
                        || (self.grid.is_snake(head) && !vacating.contains(&head))
                }
            })
            .map(|plan| plan.id)
            .collect()
    }

    /// Returns whether the food was eaten.
    fn apply_moves(
        &mut self,
        plans: &[PlannedMove],
        dead: &HashSet<SnakeId>,
        events: &mut Vec<ScoreEvent>,
    ) -> bool {
        // Vacate tails first so a head may take a cell another snake leaves.
        for plan in plans.iter().filter(|p| !dead.contains(&p.id) && !p.grows) {
            if let Some(snake) = self.snakes.get_mut(plan.id) {
                if let Some(tail) = snake.body.pop_back() {
                    self.grid.clear(tail);
                }
            }
        }

        for id in dead {
            if let Some(mut snake) = self.snakes.retire(*id) {
                snake.alive = false;
                self.erase_snake(&snake);
                info!(
                    "Snake {} died at tick {} (score {})",
                    id,
                    self.tick + 1,
                    snake.score
                );
                events.push(ScoreEvent::death(*id));
            }
        }

        let mut food_eaten = false;
        for plan in plans.iter().filter(|p| !dead.contains(&p.id)) {
            let Some(new_head) = plan.new_head else {
                continue;
            };
            let Some(snake) = self.snakes.get_mut(plan.id) else {
                continue;
            };

            if let Some(neck) = snake.body.front().copied() {
                self.grid.set(neck, CellContents::SnakeBody(snake.id));
            }
            snake.body.push_front(new_head);
            snake.heading = plan.direction;
            snake.pending_direction = plan.direction;
            self.grid.set(new_head, CellContents::SnakeHead(snake.id));

            if plan.eats {
                snake.score += SCORE_INCREMENT;
                events.push(ScoreEvent::new(snake.id, snake.score));
                food_eaten = true;
            }
        }

        if food_eaten {
            self.food = None;
        }
        food_eaten
    }

    fn respawn_food(&mut self) {
        let free: Vec<Cell> = self.grid.free_cells().collect();
        match free.choose(&mut self.rng) {
            Some(cell) => {
                self.grid.set(*cell, CellContents::Food);
                self.food = Some(*cell);
            }
            None => {
                debug!("No free cell for food, retrying next tick");
                self.food = None;
            }
        }
    }

    fn paint_snake(&mut self, snake: &Snake) {
        for (i, cell) in snake.body.iter().enumerate() {
            let contents = if i == 0 {
                CellContents::SnakeHead(snake.id)
            } else {
                CellContents::SnakeBody(snake.id)
            };
            self.grid.set(*cell, contents);
        }
    }

    fn erase_snake(&mut self, snake: &Snake) {
        for cell in &snake.body {
            if self.grid.cell_contents(*cell).snake_id() == Some(snake.id) {
                self.grid.clear(*cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cells(coords: &[(u16, u16)]) -> Vec<Cell> {
        coords.iter().map(|&(x, y)| Cell::new(x, y)).collect()
    }

    /// World with the food parked in a corner out of the way.
    fn world(width: u16, height: u16) -> World {
        let mut world = World::new(width, height, 7);
        assert!(world.place_food(Cell::new(width - 1, height - 1)));
        world
    }

    fn assert_consistent(world: &World) {
        let mut seen = HashSet::new();
        for snake in world.snakes() {
            assert!(snake.len() >= 1 && snake.len() <= MAX_SNAKE_LEN);
            for (i, cell) in snake.body.iter().enumerate() {
                assert!(seen.insert(*cell), "cell {:?} occupied twice", cell);
                let expected = if i == 0 {
                    CellContents::SnakeHead(snake.id)
                } else {
                    CellContents::SnakeBody(snake.id)
                };
                assert_eq!(world.grid().cell_contents(*cell), expected);
            }
        }
        if let Some(food) = world.food() {
            assert!(!seen.contains(&food), "food under a snake");
            assert_eq!(world.grid().cell_contents(food), CellContents::Food);
        }
        let painted = world
            .grid()
            .cells()
            .filter(|(_, c)| c.snake_id().is_some())
            .count();
        assert_eq!(painted, seen.len());
    }

    #[test]
    fn test_world_creation() {
        let world = World::new(10, 8, 1);
        assert_eq!(world.tick_count(), 0);
        assert_eq!(world.alive_count(), 0);
        assert!(world.is_running());
        assert!(world.food().is_some());
        assert_consistent(&world);
    }

    #[test]
    fn test_snake_moves_forward() {
        let mut world = world(10, 10);
        let id = world
            .spawn_snake_at(&cells(&[(3, 3), (2, 3), (1, 3)]), Direction::Right)
            .unwrap();

        let report = world.tick();
        assert!(report.is_empty());
        assert_eq!(report.tick, 1);

        let snake = world.snake(id).unwrap();
        assert_eq!(Vec::from(snake.body.clone()), cells(&[(4, 3), (3, 3), (2, 3)]));
        assert_eq!(world.grid().cell_contents(Cell::new(1, 3)), CellContents::Empty);
        assert_consistent(&world);
    }

    #[test]
    fn test_reverse_is_ignored() {
        let mut world = world(10, 10);
        let id = world
            .spawn_snake_at(&cells(&[(3, 3), (2, 3), (1, 3)]), Direction::Right)
            .unwrap();

        world.set_direction(id, Direction::Left);
        world.tick();

        let snake = world.snake(id).unwrap();
        assert!(snake.alive);
        assert_eq!(snake.head(), Cell::new(4, 3));
        assert_eq!(snake.heading, Direction::Right);
    }

    #[test]
    fn test_reverse_does_not_replace_pending_turn() {
        let mut world = world(10, 10);
        let id = world
            .spawn_snake_at(&cells(&[(3, 3), (2, 3)]), Direction::Right)
            .unwrap();

        world.set_direction(id, Direction::Up);
        world.set_direction(id, Direction::Left);
        world.tick();

        assert_eq!(world.snake(id).unwrap().head(), Cell::new(3, 2));
    }

    #[test]
    fn test_repeated_intent_is_idempotent() {
        let mut once = world(10, 10);
        let mut twice = world(10, 10);
        let a = once
            .spawn_snake_at(&cells(&[(3, 3), (2, 3)]), Direction::Right)
            .unwrap();
        let b = twice
            .spawn_snake_at(&cells(&[(3, 3), (2, 3)]), Direction::Right)
            .unwrap();

        once.set_direction(a, Direction::Down);
        twice.set_direction(b, Direction::Down);
        twice.set_direction(b, Direction::Down);
        once.tick();
        twice.tick();

        assert_eq!(once.snake(a).unwrap().body, twice.snake(b).unwrap().body);
    }

    #[test]
    fn test_wall_collision_kills() {
        let mut world = world(10, 10);
        let id = world
            .spawn_snake_at(&cells(&[(9, 3), (8, 3)]), Direction::Right)
            .unwrap();

        let report = world.tick();
        assert_eq!(report.events, vec![ScoreEvent::death(id)]);
        assert!(world.snake(id).is_none());
        assert_eq!(world.grid().cell_contents(Cell::new(9, 3)), CellContents::Empty);
        assert_consistent(&world);
    }

    #[test]
    fn test_head_on_collision_kills_both() {
        let mut world = world(12, 12);
        let a = world
            .spawn_snake_at(&cells(&[(4, 5), (3, 5)]), Direction::Right)
            .unwrap();
        let b = world
            .spawn_snake_at(&cells(&[(6, 5), (7, 5)]), Direction::Left)
            .unwrap();
        let c = world
            .spawn_snake_at(&cells(&[(1, 10), (0, 10)]), Direction::Right)
            .unwrap();

        let report = world.tick();
        let deaths: Vec<SnakeId> = report.deaths().collect();
        assert_eq!(deaths, vec![a, b]);
        assert!(world.snake(a).is_none());
        assert!(world.snake(b).is_none());
        assert_eq!(world.snake(c).unwrap().head(), Cell::new(2, 10));
        assert_consistent(&world);
    }

    #[test]
    fn test_body_collision_kills_mover_only() {
        let mut world = world(10, 10);
        let wall = world
            .spawn_snake_at(&cells(&[(5, 2), (5, 3), (5, 4), (5, 5)]), Direction::Up)
            .unwrap();
        let runner = world
            .spawn_snake_at(&cells(&[(4, 4), (3, 4)]), Direction::Right)
            .unwrap();

        let report = world.tick();
        assert_eq!(report.events, vec![ScoreEvent::death(runner)]);
        assert_eq!(world.snake(wall).unwrap().head(), Cell::new(5, 1));
        assert_consistent(&world);
    }

    #[test]
    fn test_moving_into_vacating_tail_is_safe() {
        let mut world = world(10, 10);
        // Tail of the square loop vacates as the head takes it.
        let id = world
            .spawn_snake_at(&cells(&[(2, 2), (2, 3), (3, 3), (3, 2)]), Direction::Up)
            .unwrap();
        world.set_direction(id, Direction::Right);

        let report = world.tick();
        assert!(report.is_empty());
        assert_eq!(world.snake(id).unwrap().head(), Cell::new(3, 2));
        assert_consistent(&world);
    }

    #[test]
    fn test_following_another_tail_is_safe() {
        let mut world = world(10, 10);
        let leader = world
            .spawn_snake_at(&cells(&[(5, 5), (4, 5)]), Direction::Right)
            .unwrap();
        let follower = world
            .spawn_snake_at(&cells(&[(3, 5), (2, 5)]), Direction::Right)
            .unwrap();

        let report = world.tick();
        assert!(report.is_empty());
        assert_eq!(world.snake(leader).unwrap().head(), Cell::new(6, 5));
        assert_eq!(world.snake(follower).unwrap().head(), Cell::new(4, 5));
        assert_consistent(&world);
    }

    #[test]
    fn test_single_cell_snakes_may_swap() {
        let mut world = world(10, 10);
        let a = world
            .spawn_snake_at(&cells(&[(4, 4)]), Direction::Right)
            .unwrap();
        let b = world
            .spawn_snake_at(&cells(&[(5, 4)]), Direction::Left)
            .unwrap();

        let report = world.tick();
        assert!(report.is_empty());
        assert_eq!(world.snake(a).unwrap().head(), Cell::new(5, 4));
        assert_eq!(world.snake(b).unwrap().head(), Cell::new(4, 4));
        assert_consistent(&world);
    }

    #[test]
    fn test_eating_food_grows_and_scores() {
        let mut world = world(10, 10);
        let id = world
            .spawn_snake_at(&cells(&[(3, 3), (2, 3), (1, 3)]), Direction::Right)
            .unwrap();
        assert!(world.place_food(Cell::new(4, 3)));

        let report = world.tick();
        assert_eq!(report.events, vec![ScoreEvent::new(id, SCORE_INCREMENT)]);

        let snake = world.snake(id).unwrap();
        assert_eq!(snake.len(), 4);
        assert_eq!(snake.score, SCORE_INCREMENT);
        assert_eq!(snake.head(), Cell::new(4, 3));
        assert_ne!(world.food(), Some(Cell::new(4, 3)));
        assert!(world.food().is_some());
        assert_consistent(&world);
    }

    #[test]
    fn test_growth_is_capped() {
        let mut world = World::new(MAX_SNAKE_LEN as u16 + 2, 2, 3);
        assert!(world.place_food(Cell::new(MAX_SNAKE_LEN as u16 + 1, 1)));
        let body: Vec<Cell> = (0..MAX_SNAKE_LEN as u16).rev().map(|x| Cell::new(x, 0)).collect();
        let id = world.spawn_snake_at(&body, Direction::Right).unwrap();
        assert!(world.place_food(Cell::new(MAX_SNAKE_LEN as u16, 0)));

        let report = world.tick();
        assert_eq!(report.events, vec![ScoreEvent::new(id, SCORE_INCREMENT)]);
        let snake = world.snake(id).unwrap();
        assert_eq!(snake.len(), MAX_SNAKE_LEN);
        assert_eq!(snake.head(), Cell::new(MAX_SNAKE_LEN as u16, 0));
        assert_eq!(world.grid().cell_contents(Cell::new(0, 0)), CellContents::Empty);
    }

    #[test]
    fn test_both_heads_on_food_die_and_food_stays() {
        let mut world = world(10, 10);
        let a = world
            .spawn_snake_at(&cells(&[(4, 5), (3, 5)]), Direction::Right)
            .unwrap();
        let b = world
            .spawn_snake_at(&cells(&[(6, 5), (7, 5)]), Direction::Left)
            .unwrap();
        assert!(world.place_food(Cell::new(5, 5)));

        let report = world.tick();
        assert_eq!(report.events, vec![ScoreEvent::death(a), ScoreEvent::death(b)]);
        assert_eq!(world.food(), Some(Cell::new(5, 5)));
        assert_consistent(&world);
    }

    #[test]
    fn test_food_skipped_when_grid_full() {
        let mut world = World::new(2, 1, 5);
        let food = world.food().unwrap();
        let other = if food.x == 0 { Cell::new(1, 0) } else { Cell::new(0, 0) };
        let direction = if food.x == 0 { Direction::Left } else { Direction::Right };
        let id = world.spawn_snake_at(&[other], direction).unwrap();

        world.tick();
        assert_eq!(world.snake(id).unwrap().len(), 2);
        assert_eq!(world.food(), None);
        assert_eq!(world.grid().free_cells().count(), 0);
    }

    #[test]
    fn test_spawn_rejected_when_grid_full() {
        let mut world = World::new(2, 1, 5);
        assert!(world.spawn_snake().is_ok());
        assert_eq!(world.spawn_snake(), Err(JoinError::GridFull));
        assert_eq!(world.alive_count(), 1);
    }

    #[test]
    fn test_spawn_keeps_clearance() {
        let mut world = World::new(20, 20, 11);
        let first = world.spawn_snake().unwrap();
        let second = world.spawn_snake().unwrap();
        let a = world.snake(first).unwrap().head();
        let b = world.snake(second).unwrap().head();
        assert!(a.distance(b) > SPAWN_CLEARANCE);
    }

    #[test]
    fn test_spawn_heads_toward_open_space() {
        let mut world = World::new(15, 9, 2);
        let id = world.spawn_snake().unwrap();
        let snake = world.snake(id).unwrap();
        let best = Direction::ALL
            .iter()
            .map(|dir| world.grid().free_run(snake.head(), *dir))
            .max()
            .unwrap();
        assert_eq!(world.grid().free_run(snake.head(), snake.heading), best);
    }

    #[test]
    fn test_ids_are_not_reused_until_exhausted() {
        let mut world = World::new(40, 40, 9);
        let first = world.spawn_snake().unwrap();
        assert!(world.remove_snake(first));
        assert!(world.release_id(first));

        let second = world.spawn_snake().unwrap();
        assert_ne!(first, second);
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_ids_recycled_after_exhaustion() {
        let mut pool = SnakePool::new();
        let mut ids = Vec::new();
        while let Some(id) = pool.allocate() {
            pool.insert(Snake::new(id, VecDeque::from(vec![Cell::new(0, 0)]), Direction::Up));
            ids.push(id);
        }
        assert_eq!(ids.len(), 254);
        assert_eq!(ids[0], MIN_SNAKE_ID);
        assert_eq!(ids[253], MAX_SNAKE_ID);

        assert!(pool.retire(42).is_some());
        assert_eq!(pool.allocate(), None);
        assert!(pool.release(42));
        assert_eq!(pool.allocate(), Some(42));
    }

    #[test]
    fn test_release_ignores_live_ids() {
        let mut world = world(10, 10);
        let id = world.spawn_snake_at(&cells(&[(1, 1)]), Direction::Right).unwrap();
        assert!(!world.release_id(id));
        assert!(world.snake(id).is_some());
    }

    #[test]
    fn test_removal_reported_with_next_tick() {
        let mut world = world(10, 10);
        let id = world.spawn_snake_at(&cells(&[(1, 1)]), Direction::Right).unwrap();
        assert!(world.remove_snake(id));
        assert!(!world.grid().is_occupied(Cell::new(1, 1)));

        let report = world.tick();
        assert_eq!(report.events, vec![ScoreEvent::death(id)]);
        assert!(world.tick().is_empty());
    }

    #[test]
    fn test_ended_world_does_not_advance() {
        let mut world = world(10, 10);
        let id = world.spawn_snake_at(&cells(&[(1, 1)]), Direction::Right).unwrap();
        world.end();
        let report = world.tick();
        assert!(report.is_empty());
        assert_eq!(world.tick_count(), 0);
        assert_eq!(world.snake(id).unwrap().head(), Cell::new(1, 1));
    }

    #[test]
    fn test_same_seed_same_game() {
        let run = |seed| {
            let mut world = World::new(16, 16, seed);
            let ids: Vec<SnakeId> = (0..4).filter_map(|_| world.spawn_snake().ok()).collect();
            let mut log = Vec::new();
            for step in 0..50u32 {
                for (i, id) in ids.iter().enumerate() {
                    world.set_direction(*id, Direction::ALL[(step as usize + i) / 3 % 4]);
                }
                log.push((world.tick().events, world.food()));
            }
            log
        };
        assert_eq!(run(1234), run(1234));
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_under_random_input(
            seed in any::<u64>(),
            players in 1usize..8,
            turns in proptest::collection::vec((0usize..8, 0usize..4), 0..200),
        ) {
            let mut world = World::new(12, 10, seed);
            let ids: Vec<SnakeId> = (0..players).filter_map(|_| world.spawn_snake().ok()).collect();
            prop_assert!(!ids.is_empty());

            for (who, dir) in turns {
                if let Some(id) = ids.get(who % ids.len()) {
                    world.set_direction(*id, Direction::ALL[dir]);
                }
                let before: HashMap<SnakeId, i32> =
                    world.snakes().map(|s| (s.id, s.score)).collect();
                let report = world.tick();

                for event in &report.events {
                    if !event.is_death() {
                        prop_assert!(event.score > before[&event.id]);
                    }
                }
                for snake in world.snakes() {
                    prop_assert!(snake.len() <= MAX_SNAKE_LEN);
                    prop_assert!(snake.score >= before.get(&snake.id).copied().unwrap_or(0));
                }
                assert_consistent(&world);
            }
        }
    }
}
