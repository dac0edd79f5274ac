//! LED display transports.
//!
//! The game only ever draws a finished [`Frame`] or clears the canvas; the
//! connection itself is owned by the sink.

use crate::render::Frame;
use log::debug;
use shared::DISPLAY_PORT;
use std::io;
use std::net::UdpSocket;

pub trait RenderSink {
    /// Pushes a frame on the given z-layer (0 is the background).
    fn draw(&mut self, frame: &Frame, layer: u8) -> io::Result<()>;

    /// Blanks the area this sink draws to.
    fn clear(&mut self) -> io::Result<()>;
}

/// Discards every frame. Used when no display is wanted.
#[derive(Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn draw(&mut self, _frame: &Frame, _layer: u8) -> io::Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Flaschen-Taschen display over UDP: one binary PPM image per datagram,
/// followed by the offset/layer footer the display understands.
pub struct FlaschenTaschenSink {
    socket: UdpSocket,
    x_offset: i32,
    y_offset: i32,
    last_size: Option<(u16, u16)>,
    last_layer: u8,
}

impl FlaschenTaschenSink {
    pub fn connect(host: &str, x_offset: i32, y_offset: i32) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect((host, DISPLAY_PORT))?;
        debug!("Display socket connected to {}:{}", host, DISPLAY_PORT);
        Ok(Self {
            socket,
            x_offset,
            y_offset,
            last_size: None,
            last_layer: 0,
        })
    }
}

impl RenderSink for FlaschenTaschenSink {
    fn draw(&mut self, frame: &Frame, layer: u8) -> io::Result<()> {
        self.last_size = Some((frame.width(), frame.height()));
        self.last_layer = layer;
        let packet = encode_ppm(frame, self.x_offset, self.y_offset, layer);
        self.socket.send(&packet)?;
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        let Some((width, height)) = self.last_size else {
            return Ok(());
        };
        let packet = encode_ppm(
            &Frame::new(width, height),
            self.x_offset,
            self.y_offset,
            self.last_layer,
        );
        self.socket.send(&packet)?;
        Ok(())
    }
}

/// `P6` header, raw RGB rows, then `x`, `y` and `z` each on their own line.
pub fn encode_ppm(frame: &Frame, x_offset: i32, y_offset: i32, layer: u8) -> Vec<u8> {
    let header = format!("P6\n{} {}\n255\n", frame.width(), frame.height());
    let footer = format!("\n{}\n{}\n{}\n", x_offset, y_offset, layer);

    let mut packet = Vec::with_capacity(header.len() + frame.pixels().len() * 3 + footer.len());
    packet.extend_from_slice(header.as_bytes());
    for pixel in frame.pixels() {
        packet.extend_from_slice(&[pixel.r, pixel.g, pixel.b]);
    }
    packet.extend_from_slice(footer.as_bytes());
    packet
}
