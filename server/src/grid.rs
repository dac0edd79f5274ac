//! The shared playfield: coordinates and per-cell occupancy.
//!
//! Every change to what a cell holds goes through [`Grid::set`], so collision
//! checks in the simulation always read the real contents of the board.

use shared::{Direction, SnakeId};

/// Cell coordinate, `0 <= x < width`, `0 <= y < height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: u16,
    pub y: u16,
}

impl Cell {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance, the number of king moves between two cells.
    pub fn distance(self, other: Cell) -> u16 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellContents {
    Empty,
    SnakeHead(SnakeId),
    SnakeBody(SnakeId),
    Food,
}

impl CellContents {
    pub fn snake_id(self) -> Option<SnakeId> {
        match self {
            CellContents::SnakeHead(id) | CellContents::SnakeBody(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<CellContents>,
}

impl Grid {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![CellContents::Empty; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
    }

    /// The neighbouring cell in `direction`, or `None` past the edge.
    pub fn step(&self, cell: Cell, direction: Direction) -> Option<Cell> {
        let (dx, dy) = direction.delta();
        let x = cell.x as i32 + dx;
        let y = cell.y as i32 + dy;
        self.in_bounds(x, y).then(|| Cell::new(x as u16, y as u16))
    }

    pub fn cell_contents(&self, cell: Cell) -> CellContents {
        self.index(cell)
            .map(|i| self.cells[i])
            .unwrap_or(CellContents::Empty)
    }

    /// True when a snake segment or the food sits on `cell`.
    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.cell_contents(cell) != CellContents::Empty
    }

    pub fn is_snake(&self, cell: Cell) -> bool {
        self.cell_contents(cell).snake_id().is_some()
    }

    pub(crate) fn set(&mut self, cell: Cell, contents: CellContents) {
        if let Some(i) = self.index(cell) {
            self.cells[i] = contents;
        }
    }

    pub(crate) fn clear(&mut self, cell: Cell) {
        self.set(cell, CellContents::Empty);
    }

    pub fn free_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells()
            .filter(|(_, contents)| *contents == CellContents::Empty)
            .map(|(cell, _)| cell)
    }

    /// All cells in row-major order with their contents.
    pub fn cells(&self) -> impl Iterator<Item = (Cell, CellContents)> + '_ {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, contents)| (Cell::new((i % width) as u16, (i / width) as u16), *contents))
    }

    /// True when any snake segment lies within `radius` king moves of `cell`.
    pub fn snake_within(&self, cell: Cell, radius: u16) -> bool {
        let x0 = cell.x.saturating_sub(radius);
        let y0 = cell.y.saturating_sub(radius);
        let x1 = cell.x.saturating_add(radius).min(self.width - 1);
        let y1 = cell.y.saturating_add(radius).min(self.height - 1);
        (y0..=y1).any(|y| (x0..=x1).any(|x| self.is_snake(Cell::new(x, y))))
    }

    /// Free cells reachable in a straight line from `cell`, not counting it.
    pub fn free_run(&self, cell: Cell, direction: Direction) -> usize {
        let mut run = 0;
        let mut current = cell;
        while let Some(next) = self.step(current, direction) {
            if self.is_occupied(next) {
                break;
            }
            run += 1;
            current = next;
        }
        run
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        (cell.x < self.width && cell.y < self.height)
            .then(|| cell.y as usize * self.width as usize + cell.x as usize)
    }
}
