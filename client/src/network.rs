use crate::scoreboard::Scoreboard;
use crate::status::{Outcome, StatusLine};
use log::{debug, error, info, warn};
use shared::protocol::decode_score_datagram;
use shared::{ClientMessage, GameConfig, Interrupt, LoopControl, StopReason};
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

/// How often the join record is repeated to keep the session alive.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: GameConfig,
    scoreboard: Scoreboard,
}

impl Client {
    pub async fn connect(
        server_addr: &str,
        config: GameConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr = tokio::net::lookup_host(server_addr)
            .await?
            .next()
            .ok_or("server address did not resolve")?;
        let bind_addr = if server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;

        Ok(Self::new(socket, server_addr, config))
    }

    pub fn new(socket: UdpSocket, server_addr: SocketAddr, config: GameConfig) -> Self {
        Client {
            socket,
            server_addr,
            config,
            scoreboard: Scoreboard::new(),
        }
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    async fn send(&self, message: ClientMessage) {
        if let Err(e) = self.socket.send_to(&message.encode(), self.server_addr).await {
            error!("Failed to send {:?} to {}: {}", message, self.server_addr, e);
        }
    }

    /// Plays until the own snake dies, the player quits, the timeout expires
    /// or the interrupt is raised. The session is always closed with a quit.
    pub async fn run<W: Write>(
        &mut self,
        mut inputs: mpsc::UnboundedReceiver<ClientMessage>,
        interrupt: Interrupt,
        status: &mut StatusLine<W>,
    ) -> Result<Outcome, Box<dyn std::error::Error>> {
        info!("Joining server at {}", self.server_addr);

        let control = LoopControl::new(self.config.timeout, interrupt);
        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut status_interval = interval(self.config.delay);
        let mut inputs_open = true;
        let mut buffer = [0u8; 2048];

        let reason = loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => {
                            let events = decode_score_datagram(&buffer[..len]);
                            if events.is_empty() {
                                debug!("Dropped {} byte datagram from server", len);
                            }
                            self.scoreboard.apply(&events);

                            if self.scoreboard.own_dead() {
                                info!("Snake died with score {}", self.scoreboard.own_score());
                                break StopReason::GameOver;
                            }
                        }
                        Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
                        Err(e) => warn!("Error receiving datagram: {}", e),
                    }
                },

                message = inputs.recv(), if inputs_open => {
                    match message {
                        Some(ClientMessage::Quit) => break StopReason::GameOver,
                        Some(message) => self.send(message).await,
                        None => inputs_open = false,
                    }
                },

                _ = heartbeat_interval.tick() => {
                    self.send(ClientMessage::Join).await;
                },

                _ = status_interval.tick() => {
                    if let Some(reason) = control.check() {
                        break reason;
                    }
                    status.update(control.elapsed(), self.scoreboard.own_score())?;
                },
            }
        };

        self.send(ClientMessage::Quit).await;

        let standings = self.scoreboard.standings();
        if !standings.is_empty() {
            debug!("Final standings: {:?}", standings);
        }

        let outcome = Outcome {
            reason,
            elapsed: control.elapsed(),
            score: self.scoreboard.own_score(),
            died: self.scoreboard.own_dead(),
        };
        status.finish(&outcome)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Direction;

    async fn fake_server() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn recv_text(socket: &UdpSocket) -> (String, SocketAddr) {
        let mut buf = [0u8; 64];
        let (len, addr) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        (String::from_utf8_lossy(&buf[..len]).into_owned(), addr)
    }

    #[test]
    fn test_connect_resolves_address() {
        let client =
            tokio_test::block_on(Client::connect("127.0.0.1:4444", GameConfig::default())).unwrap();
        assert_eq!(client.server_addr.port(), 4444);
        assert!(client.scoreboard().own_id().is_none());

        let unresolvable = tokio_test::block_on(Client::connect("not an address", GameConfig::default()));
        assert!(unresolvable.is_err());
    }

    #[tokio::test]
    async fn test_client_joins_and_ends_on_death() {
        let (server, server_addr) = fake_server().await;
        let mut client = Client::connect(&server_addr.to_string(), GameConfig::default())
            .await
            .unwrap();
        let (_tx, rx) = mpsc::unbounded_channel();

        let script = tokio::spawn(async move {
            let (join, client_addr) = recv_text(&server).await;
            server.send_to(b"3 0\n", client_addr).await.unwrap();
            server.send_to(b"9 2\n3 1\n", client_addr).await.unwrap();
            server.send_to(b"3 -1\n", client_addr).await.unwrap();
            let (quit, _) = recv_text(&server).await;
            (join, quit)
        });

        let mut status = StatusLine::new(Vec::new());
        let outcome = client.run(rx, Interrupt::new(), &mut status).await.unwrap();

        assert_eq!(outcome.reason, StopReason::GameOver);
        assert!(outcome.died);
        assert_eq!(outcome.score, 1);
        assert_eq!(client.scoreboard().own_id(), Some(3));

        let (join, quit) = script.await.unwrap();
        assert_eq!(join, "J\n");
        assert_eq!(quit, "0\n");

        let text = String::from_utf8(status.into_inner()).unwrap();
        assert!(text.ends_with("(score: 1)\r\n"));
        assert!(text.contains("You Died at"));
    }

    #[tokio::test]
    async fn test_client_ignores_other_deaths_before_ack() {
        let (server, server_addr) = fake_server().await;
        let mut client = Client::connect(&server_addr.to_string(), GameConfig::default())
            .await
            .unwrap();
        let (_tx, rx) = mpsc::unbounded_channel();

        let script = tokio::spawn(async move {
            let (_, client_addr) = recv_text(&server).await;
            // A tick broadcast overtakes the acknowledgement.
            server.send_to(b"9 -1\n", client_addr).await.unwrap();
            server.send_to(b"3 0\n", client_addr).await.unwrap();
            server.send_to(b"3 -1\n", client_addr).await.unwrap();
            let (quit, _) = recv_text(&server).await;
            quit
        });

        let mut status = StatusLine::new(Vec::new());
        let outcome = client.run(rx, Interrupt::new(), &mut status).await.unwrap();

        assert_eq!(outcome.reason, StopReason::GameOver);
        assert!(outcome.died);
        assert_eq!(client.scoreboard().own_id(), Some(3));
        assert_eq!(client.scoreboard().get(9).map(|s| s.alive), Some(false));
        assert_eq!(script.await.unwrap(), "0\n");
    }

    #[tokio::test]
    async fn test_client_forwards_moves_and_quit() {
        let (server, server_addr) = fake_server().await;
        let mut client = Client::connect(&server_addr.to_string(), GameConfig::default())
            .await
            .unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        let script = tokio::spawn(async move {
            let (join, client_addr) = recv_text(&server).await;
            server.send_to(b"1 0\n", client_addr).await.unwrap();
            tx.send(ClientMessage::Move(Direction::Left)).unwrap();
            let (movement, _) = recv_text(&server).await;
            tx.send(ClientMessage::Quit).unwrap();
            let (quit, _) = recv_text(&server).await;
            (join, movement, quit)
        });

        let mut status = StatusLine::new(Vec::new());
        let outcome = client.run(rx, Interrupt::new(), &mut status).await.unwrap();
        assert_eq!(outcome.reason, StopReason::GameOver);
        assert!(!outcome.died);

        let (join, movement, quit) = script.await.unwrap();
        assert_eq!(join, "J\n");
        assert_eq!(movement, "A\n");
        assert_eq!(quit, "0\n");
    }

    #[tokio::test]
    async fn test_client_stops_on_timeout() {
        let (_server, server_addr) = fake_server().await;
        let config = GameConfig {
            delay: Duration::from_millis(5),
            timeout: Some(Duration::from_millis(30)),
            ..GameConfig::default()
        };
        let mut client = Client::connect(&server_addr.to_string(), config).await.unwrap();
        let (_tx, rx) = mpsc::unbounded_channel();

        let mut status = StatusLine::new(Vec::new());
        let outcome = client.run(rx, Interrupt::new(), &mut status).await.unwrap();
        assert_eq!(outcome.reason, StopReason::TimedOut);
        assert!(!outcome.died);
        assert_eq!(client.scoreboard().own_id(), None);
    }
}
