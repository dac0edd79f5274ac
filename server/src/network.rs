//! Server network layer handling UDP communications and tick loop coordination

use crate::display::RenderSink;
use crate::game::{TickReport, World};
use crate::render::project;
use crate::sessions::SessionRegistry;
use log::{debug, error, info, warn};
use shared::protocol::{decode_client_datagram, encode_score_events};
use shared::{ClientMessage, GameConfig, Interrupt, LoopControl, ScoreEvent, StopReason};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from the receive task to the tick loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        messages: Vec<ClientMessage>,
        addr: SocketAddr,
    },
}

/// Messages sent from the tick loop to the send task
#[derive(Debug)]
pub enum GameMessage {
    SendDatagram { payload: Vec<u8>, addr: SocketAddr },
    /// Everything queued before this has been handed to the socket.
    Flushed,
}

/// Authoritative game server: owns the world and is its only writer
pub struct Server {
    socket: Arc<UdpSocket>,
    config: GameConfig,
    world: World,
    sessions: SessionRegistry,
    display: Box<dyn RenderSink + Send>,
    outbox: Vec<(SocketAddr, Vec<u8>)>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn bind(
        addr: &str,
        config: GameConfig,
        display: Box<dyn RenderSink + Send>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Server listening on {}", socket.local_addr()?);
        Ok(Self::new(socket, config, display))
    }

    pub fn new(socket: UdpSocket, config: GameConfig, display: Box<dyn RenderSink + Send>) -> Self {
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Server {
            socket: Arc::new(socket),
            world: World::new(config.width(), config.height(), config.seed),
            sessions: SessionRegistry::new(config.max_players, config.liveness),
            config,
            display,
            outbox: Vec::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let messages = decode_client_datagram(&buffer[..len]);
                        if messages.is_empty() {
                            debug!("Dropped {} byte datagram from {}", len, addr);
                            continue;
                        }
                        if let Err(e) = server_tx.send(ServerMessage::PacketReceived { messages, addr })
                        {
                            error!("Failed to send packet to tick loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        // ICMP errors from one peer surface here; keep serving the rest.
                        warn!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Spawns task that processes the outgoing datagram queue
    fn spawn_network_sender(&mut self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendDatagram { payload, addr } => {
                        if let Err(e) = socket.send_to(&payload, addr).await {
                            error!("Failed to send to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Flushed => break,
                }
            }
        })
    }

    /// Applies everything received since the previous tick boundary.
    fn drain_inbound(&mut self, now: Instant) {
        while let Ok(ServerMessage::PacketReceived { messages, addr }) = self.server_rx.try_recv() {
            for message in messages {
                self.handle_message(addr, message, now);
            }
        }
    }

    pub fn handle_message(&mut self, addr: SocketAddr, message: ClientMessage, now: Instant) {
        match message {
            ClientMessage::Join => match self.sessions.join(&mut self.world, addr, now) {
                Ok(_) => {
                    if let Some(records) = self.sessions.ack_records(&self.world, addr) {
                        self.queue(addr, encode_score_events(&records));
                    }
                }
                Err(e) => debug!("Join from {} not accepted: {}", addr, e),
            },
            ClientMessage::Move(direction) => {
                self.sessions
                    .move_snake(&mut self.world, addr, direction, now);
            }
            ClientMessage::Quit => {
                self.sessions.quit(&mut self.world, addr);
            }
        }
    }

    /// Runs one tick and queues its score records for every session.
    pub fn step(&mut self, now: Instant) -> TickReport {
        self.sessions.sweep_timeouts(&mut self.world, now);

        let report = self.world.tick();
        self.sessions.mark_dead(report.deaths());

        if !report.is_empty() {
            self.broadcast(&report.events);
        }
        self.render();

        self.sessions.release_ids(&mut self.world);
        if self.sessions.all_left() {
            info!("All players left");
            self.world.end();
        }

        if report.tick % 100 == 0 && !self.sessions.is_empty() {
            debug!(
                "Tick {}: {} sessions, {} snakes",
                report.tick,
                self.sessions.len(),
                self.world.alive_count()
            );
        }
        report
    }

    /// Reports every snake still alive as dead and blanks the display.
    pub fn shutdown(&mut self) -> Vec<ScoreEvent> {
        let finals: Vec<ScoreEvent> = self
            .world
            .snakes()
            .map(|snake| ScoreEvent::death(snake.id))
            .collect();
        self.world.end();

        if !finals.is_empty() {
            self.broadcast(&finals);
        }
        if let Err(e) = self.display.clear() {
            error!("Failed to clear display: {}", e);
        }
        finals
    }

    fn broadcast(&mut self, events: &[ScoreEvent]) {
        let payload = encode_score_events(events);
        for addr in self.sessions.addrs() {
            self.queue(addr, payload.clone());
        }
    }

    fn render(&mut self) {
        let frame = project(&self.world);
        if let Err(e) = self.display.draw(&frame, self.config.layer) {
            error!("Failed to draw frame: {}", e);
        }
    }

    fn queue(&mut self, addr: SocketAddr, payload: Vec<u8>) {
        self.outbox.push((addr, payload));
    }

    fn flush(&mut self) {
        for (addr, payload) in self.outbox.drain(..) {
            if let Err(e) = self.game_tx.send(GameMessage::SendDatagram { payload, addr }) {
                error!("Failed to queue datagram for {}: {}", addr, e);
            }
        }
    }

    /// Main server loop: one tick per configured delay until the timeout
    /// expires, the interrupt is raised or every player has left.
    pub async fn run(&mut self, interrupt: Interrupt) -> Result<StopReason, Box<dyn std::error::Error>> {
        let receiver = self.spawn_network_receiver();
        let sender = self.spawn_network_sender();

        let control = LoopControl::new(self.config.timeout, interrupt);
        let mut tick_interval = interval(self.config.delay);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started: {}x{} grid, {:?} per tick",
            self.config.width(),
            self.config.height(),
            self.config.delay
        );

        let reason = loop {
            tick_interval.tick().await;

            if let Some(reason) = control.check() {
                break reason;
            }

            let now = Instant::now();
            self.drain_inbound(now);
            self.step(now);
            self.flush();

            if !self.world.is_running() {
                break StopReason::GameOver;
            }
        };

        info!("Server stopping ({:?}) after {} ticks", reason, self.world.tick_count());
        self.shutdown();
        self.flush();

        if let Err(e) = self.game_tx.send(GameMessage::Flushed) {
            warn!("Send task already stopped: {}", e);
        }
        if tokio::time::timeout(Duration::from_secs(1), sender).await.is_err() {
            warn!("Timed out flushing final datagrams");
        }
        receiver.abort();

        Ok(reason)
    }
}
