//! Static spatial model: bounds, obstacles and special cost zones.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};
use thiserror::Error;

/// Grid cell, 1-indexed.
///
/// Serialized as a two-element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to `other`.
    pub fn dist(&self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<[i32; 2]> for Coord {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Coord> for [i32; 2] {
    fn from(c: Coord) -> Self {
        [c.x, c.y]
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("coordinates {from} and {to} are not adjacent")]
    InvalidAdjacency { from: Coord, to: Coord },
}

/// Axis-aligned rectangle whose perimeter edges carry a special cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostZone {
    pub corner_a: Coord,
    pub corner_b: Coord,
    pub cost: u32,
}

impl CostZone {
    pub fn new(corner_a: Coord, corner_b: Coord, cost: u32) -> Self {
        Self {
            corner_a,
            corner_b,
            cost,
        }
    }

    /// Whether the edge `from -> to` runs along the perimeter of the zone.
    ///
    /// Both endpoints must lie on the perimeter; interior edges are never affected.
    pub fn affects(&self, from: Coord, to: Coord) -> bool {
        self.on_perimeter(from) && self.on_perimeter(to)
    }

    fn on_perimeter(&self, c: Coord) -> bool {
        let (x_lo, x_hi) = min_max(self.corner_a.x, self.corner_b.x);
        let (y_lo, y_hi) = min_max(self.corner_a.y, self.corner_b.y);
        let in_x = (x_lo..=x_hi).contains(&c.x);
        let in_y = (y_lo..=y_hi).contains(&c.y);
        (in_x && (c.y == y_lo || c.y == y_hi)) || (in_y && (c.x == x_lo || c.x == x_hi))
    }
}

fn min_max(a: i32, b: i32) -> (i32, i32) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Rectangular grid of `n_rows x n_cols` cells.
///
/// `x` ranges over `1..=n_rows` and `y` over `1..=n_cols`.
#[derive(Debug, Clone)]
pub struct Grid {
    n_rows: i32,
    n_cols: i32,
    obstacles: HashSet<Coord>,
    zones: Vec<CostZone>,
}

impl Grid {
    pub fn new(n_rows: i32, n_cols: i32) -> Self {
        Self {
            n_rows,
            n_cols,
            obstacles: HashSet::new(),
            zones: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> i32 {
        self.n_rows
    }

    pub fn n_cols(&self) -> i32 {
        self.n_cols
    }

    pub fn zones(&self) -> &[CostZone] {
        &self.zones
    }

    pub fn add_obstacle(&mut self, c: Coord) {
        self.obstacles.insert(c);
    }

    pub fn add_zone(&mut self, zone: CostZone) {
        self.zones.push(zone);
    }

    /// Add `n_zones` zones with random corners and a cost in `2..=5`.
    pub fn add_random_zones<R: Rng>(&mut self, n_zones: usize, rng: &mut R) {
        for _ in 0..n_zones {
            let x1 = rng.random_range(1..=self.n_rows);
            let y1 = rng.random_range(1..=self.n_cols);
            let x2 = x1 + rng.random_range(0..(self.n_rows - x1).max(1));
            let y2 = y1 + rng.random_range(0..(self.n_cols - y1).max(1));
            let cost = rng.random_range(2..=5);
            self.add_zone(CostZone::new(Coord::new(x1, y1), Coord::new(x2, y2), cost));
        }
    }

    /// Add `n_obstacles` obstacles at uniformly random cells.
    pub fn add_random_obstacles<R: Rng>(&mut self, n_obstacles: usize, rng: &mut R) {
        for _ in 0..n_obstacles {
            let x = rng.random_range(1..=self.n_rows);
            let y = rng.random_range(1..=self.n_cols);
            self.add_obstacle(Coord::new(x, y));
        }
    }

    pub fn contains(&self, c: Coord) -> bool {
        (1..=self.n_rows).contains(&c.x) && (1..=self.n_cols).contains(&c.y)
    }

    pub fn is_obstacle(&self, c: Coord) -> bool {
        self.obstacles.contains(&c)
    }

    /// In-bounds, obstacle-free orthogonal neighbours of `c`,
    /// always in the order north, east, south, west.
    pub fn valid_moves(&self, c: Coord) -> Vec<Coord> {
        const DIRS: [(i32, i32); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
        DIRS.iter()
            .map(|&(dx, dy)| Coord::new(c.x + dx, c.y + dy))
            .filter(|&nb| self.contains(nb) && !self.is_obstacle(nb))
            .collect()
    }

    /// Cost of moving between two adjacent cells.
    ///
    /// The largest cost among the zones affecting the edge, or 1 if none does.
    ///
    /// # Errors
    /// Returns [`GridError::InvalidAdjacency`] if `from` and `to` are not adjacent.
    pub fn edge_cost(&self, from: Coord, to: Coord) -> Result<u32, GridError> {
        if from.dist(to) != 1 {
            return Err(GridError::InvalidAdjacency { from, to });
        }
        let cost = self
            .zones
            .iter()
            .filter(|zone| zone.affects(from, to))
            .map(|zone| zone.cost)
            .fold(1, u32::max);
        Ok(cost)
    }

    pub fn max_edge_cost(&self) -> u32 {
        self.zones.iter().map(|zone| zone.cost).fold(1, u32::max)
    }
}
