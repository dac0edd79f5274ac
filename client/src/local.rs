//! Single-player game: the simulation runs in-process with no network.

use crate::status::{Outcome, StatusLine};
use log::{error, info};
use server::display::RenderSink;
use server::game::{JoinError, TickReport, World};
use server::render::project;
use shared::{ClientMessage, GameConfig, Interrupt, LoopControl, SnakeId, StopReason};
use std::io::Write;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

pub struct LocalGame {
    world: World,
    snake_id: SnakeId,
    config: GameConfig,
    display: Box<dyn RenderSink + Send>,
    score: i32,
    quit: bool,
}

impl LocalGame {
    pub fn new(config: GameConfig, display: Box<dyn RenderSink + Send>) -> Result<Self, JoinError> {
        let mut world = World::new(config.width(), config.height(), config.seed);
        let snake_id = world.spawn_snake()?;

        Ok(LocalGame {
            world,
            snake_id,
            config,
            display,
            score: 0,
            quit: false,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn snake_id(&self) -> SnakeId {
        self.snake_id
    }

    /// Last score reported for the snake. Survives its death.
    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn is_alive(&self) -> bool {
        self.world.snake(self.snake_id).is_some()
    }

    pub fn handle_input(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Move(direction) => {
                self.world.set_direction(self.snake_id, direction);
            }
            ClientMessage::Quit => self.quit = true,
            ClientMessage::Join => {}
        }
    }

    pub fn step(&mut self) -> TickReport {
        let report = self.world.tick();
        for event in &report.events {
            if event.id == self.snake_id && !event.is_death() {
                self.score = event.score;
            }
        }

        let frame = project(&self.world);
        if let Err(e) = self.display.draw(&frame, self.config.layer) {
            error!("Failed to draw frame: {}", e);
        }
        report
    }

    /// Ticks until the snake dies, the player quits, the timeout expires or
    /// the interrupt is raised.
    pub async fn run<W: Write>(
        &mut self,
        mut inputs: mpsc::UnboundedReceiver<ClientMessage>,
        interrupt: Interrupt,
        status: &mut StatusLine<W>,
    ) -> Result<Outcome, Box<dyn std::error::Error>> {
        let control = LoopControl::new(self.config.timeout, interrupt);
        let mut tick_interval = interval(self.config.delay);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Local game started as snake {}", self.snake_id);

        let reason = loop {
            tick_interval.tick().await;

            if let Some(reason) = control.check() {
                break reason;
            }

            while let Ok(message) = inputs.try_recv() {
                self.handle_input(message);
            }
            if self.quit {
                break StopReason::GameOver;
            }

            self.step();
            if !self.is_alive() {
                info!("Snake died with score {}", self.score);
                break StopReason::GameOver;
            }
            status.update(control.elapsed(), self.score())?;
        };

        self.world.end();
        if let Err(e) = self.display.clear() {
            error!("Failed to clear display: {}", e);
        }

        let outcome = Outcome {
            reason,
            elapsed: control.elapsed(),
            score: self.score,
            died: !self.is_alive(),
        };
        status.finish(&outcome)?;
        Ok(outcome)
    }
}
