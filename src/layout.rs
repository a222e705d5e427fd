//! Default placement for tables that have no position yet.
//!
//! Tables with an explicit or previously known position are fixed; the
//! rest are packed into the default area by scanning a grid row by row and
//! taking the first slot whose box clears every box placed so far. When the
//! area is full, placed boxes may overlap each other but still keep clear of
//! fixed ones; only an area covered entirely by fixed boxes leaves no choice.

use crate::diagram::Position;
use crate::measure::TextMetrics;

#[derive(Debug, Clone)]
pub struct PlacementConfig {
    pub metrics: TextMetrics,
    /// Top-left corners of placed tables fall in `[min_x, max_x) x [min_y, max_y)`.
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    /// Grid step of the slot scan.
    pub step: f64,
    /// Minimum clearance between two boxes.
    pub gap: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            metrics: TextMetrics::default(),
            min_x: 50.0,
            max_x: 850.0,
            min_y: 50.0,
            max_y: 650.0,
            step: 20.0,
            gap: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Rect {
    fn at(pos: Position, (width, height): (f64, f64)) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            width,
            height,
        }
    }

    fn overlaps(&self, other: &Rect, gap: f64) -> bool {
        self.x < other.x + other.width + gap
            && other.x < self.x + self.width + gap
            && self.y < other.y + other.height + gap
            && other.y < self.y + self.height + gap
    }
}

pub struct Placer<'a> {
    config: &'a PlacementConfig,
    /// Boxes of tables with an explicit or existing position.
    fixed: Vec<Rect>,
    /// Fixed boxes plus everything placed so far.
    occupied: Vec<Rect>,
    overflow: usize,
}

impl<'a> Placer<'a> {
    pub fn new(config: &'a PlacementConfig) -> Self {
        Self {
            config,
            fixed: Vec::new(),
            occupied: Vec::new(),
            overflow: 0,
        }
    }

    /// Reserve the box of a table with a fixed position.
    pub fn occupy(&mut self, pos: Position, size: (f64, f64)) {
        let rect = Rect::at(pos, size);
        self.fixed.push(rect);
        self.occupied.push(rect);
    }

    /// Find a free slot for a box of `size` and reserve it.
    pub fn place(&mut self, size: (f64, f64)) -> Position {
        let pos = self
            .find_free_slot(size, &self.occupied)
            .unwrap_or_else(|| self.overflow_slot(size));
        self.occupied.push(Rect::at(pos, size));
        pos
    }

    /// First grid slot, row by row, whose box clears every box in `blockers`.
    fn find_free_slot(&self, (width, height): (f64, f64), blockers: &[Rect]) -> Option<Position> {
        let c = self.config;
        let mut y = c.min_y;
        while y < c.max_y {
            let mut x = c.min_x;
            while x < c.max_x {
                let candidate = Rect {
                    x,
                    y,
                    width,
                    height,
                };
                if !blockers.iter().any(|r| r.overlaps(&candidate, c.gap)) {
                    return Some(Position::new(x, y));
                }
                x += c.step;
            }
            y += c.step;
        }
        None
    }

    /// The area is full: cascade diagonally inside the area, skipping slots
    /// that would cover a fixed box.
    fn overflow_slot(&mut self, size: (f64, f64)) -> Position {
        let c = self.config;
        let stride = (c.step * 2.0).max(1.0);
        let span_x = (c.max_x - c.min_x).max(1.0);
        let span_y = (c.max_y - c.min_y).max(1.0);
        let cascade = |n: usize| {
            let offset = n as f64 * stride;
            Position::new(c.min_x + offset % span_x, c.min_y + offset % span_y)
        };

        let cycle = ((span_x / stride).ceil() * (span_y / stride).ceil()) as usize;
        for n in self.overflow..self.overflow + cycle.max(1) {
            let pos = cascade(n);
            let rect = Rect::at(pos, size);
            if !self.fixed.iter().any(|r| r.overlaps(&rect, 0.0)) {
                self.overflow = n + 1;
                return pos;
            }
        }
        if let Some(pos) = self.find_free_slot(size, &self.fixed) {
            return pos;
        }

        let pos = cascade(self.overflow);
        self.overflow += 1;
        pos
    }
}
