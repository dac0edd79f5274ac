//! Projection of the world onto a flat pixel buffer.

use crate::game::World;
use crate::grid::CellContents;
use shared::SnakeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

pub const BACKGROUND: Rgb = Rgb::new(0, 0, 0);
pub const FOOD_COLOR: Rgb = Rgb::new(255, 255, 255);

/// Steps of the colour wheel used for snake hues.
const HUE_STEPS: u32 = 6 * 255;
/// Roughly the golden angle. Coprime with `HUE_STEPS`, so no two ids share a hue.
const HUE_STRIDE: u32 = 583;

/// Colour for a snake id. Ids start at 1.
pub fn snake_color(id: SnakeId) -> Rgb {
    let hue = (u32::from(id.saturating_sub(1)) * HUE_STRIDE) % HUE_STEPS;
    let rise = (hue % 255) as u8;
    let fall = 255 - rise;
    match hue / 255 {
        0 => Rgb::new(255, rise, 0),
        1 => Rgb::new(fall, 255, 0),
        2 => Rgb::new(0, 255, rise),
        3 => Rgb::new(0, fall, 255),
        4 => Rgb::new(rise, 0, 255),
        _ => Rgb::new(255, 0, fall),
    }
}

/// Row-major `width x height` pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u16,
    height: u16,
    pixels: Vec<Rgb>,
}

impl Frame {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![BACKGROUND; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }
}

/// Renders the world as it stands after the last completed tick.
pub fn project(world: &World) -> Frame {
    let grid = world.grid();
    let pixels = grid
        .cells()
        .map(|(_, contents)| match contents {
            CellContents::Empty => BACKGROUND,
            CellContents::Food => FOOD_COLOR,
            CellContents::SnakeHead(id) | CellContents::SnakeBody(id) => snake_color(id),
        })
        .collect();

    Frame {
        width: grid.width(),
        height: grid.height(),
        pixels,
    }
}
