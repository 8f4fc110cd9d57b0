use crate::calendar::Time;
use crate::comfort::{comfort, path_cost};
use crate::grid::{Coord, Grid, GridError};
use std::collections::HashMap;

/// Identity of an individual within its population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndId(pub usize);

#[derive(Debug, Clone)]
pub struct Individual {
    path: Vec<Coord>,

    birth: Time,
    death: Time,

    parent: Option<IndId>,
}

impl Individual {
    pub fn new(start: Coord) -> Self {
        Self {
            path: vec![start],
            birth: 0,
            death: 0,
            parent: None,
        }
    }

    pub fn path(&self) -> &[Coord] {
        &self.path
    }

    pub fn pos(&self) -> Coord {
        // The path always holds at least the birth position.
        self.path[self.path.len() - 1]
    }

    pub fn birth(&self) -> Time {
        self.birth
    }

    pub fn death(&self) -> Time {
        self.death
    }

    pub fn set_birth(&mut self, birth: Time) {
        self.birth = birth;
    }

    pub fn set_death(&mut self, death: Time) {
        self.death = death;
    }

    pub fn parent(&self) -> Option<IndId> {
        self.parent
    }

    pub fn cost(&self, grid: &Grid) -> Result<u32, GridError> {
        path_cost(&self.path, grid)
    }

    pub fn comfort(&self, grid: &Grid, dest: Coord, k: u32) -> Result<f64, GridError> {
        comfort(&self.path, grid, dest, k)
    }

    /// Step to `next` and cut any loop the step closes.
    pub fn move_to(&mut self, next: Coord) {
        self.path.push(next);
        remove_cycles(&mut self.path);
    }

    /// Create an offspring that inherits a prefix of this individual's path.
    ///
    /// The prefix keeps `ceil(0.9 v + 0.1 v phi)` of the `v` vertices, where `phi` is
    /// this individual's comfort. Birth and death times are left for the caller to set.
    pub fn reproduce(
        &self,
        id: IndId,
        grid: &Grid,
        dest: Coord,
        k: u32,
    ) -> Result<Individual, GridError> {
        let phi = self.comfort(grid, dest, k)?;
        let n_vert = self.path.len();
        let n_kept = (n_vert as f64 * 0.9 + n_vert as f64 * 0.1 * phi).ceil() as usize;
        let n_kept = n_kept.clamp(1, n_vert);
        Ok(Self {
            path: self.path[..n_kept].to_vec(),
            birth: 0,
            death: 0,
            parent: Some(id),
        })
    }
}

/// Truncate `path` back to the first occurrence of every repeated cell.
pub fn remove_cycles(path: &mut Vec<Coord>) {
    let mut first_idx: HashMap<Coord, usize> = HashMap::with_capacity(path.len());
    let mut simple = Vec::with_capacity(path.len());
    for &c in path.iter() {
        match first_idx.get(&c) {
            Some(&idx) => {
                for dropped in simple.drain(idx + 1..) {
                    first_idx.remove(&dropped);
                }
            }
            None => {
                first_idx.insert(c, simple.len());
                simple.push(c);
            }
        }
    }
    *path = simple;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    fn walker(cells: &[(i32, i32)]) -> Individual {
        let mut ind = Individual::new(c(cells[0].0, cells[0].1));
        for &(x, y) in &cells[1..] {
            ind.move_to(c(x, y));
        }
        ind
    }

    #[test]
    fn move_extends_a_simple_path() {
        let ind = walker(&[(1, 1), (1, 2), (2, 2)]);
        assert_eq!(ind.path(), &[c(1, 1), c(1, 2), c(2, 2)]);
        assert_eq!(ind.pos(), c(2, 2));
        assert_eq!(ind.path().len(), 3);
    }

    #[test]
    fn move_removes_closed_loop() {
        let ind = walker(&[(1, 1), (1, 2), (2, 2), (2, 1), (1, 1)]);
        assert_eq!(ind.path(), &[c(1, 1)]);

        let ind = walker(&[(1, 1), (1, 2), (2, 2), (2, 3), (1, 3), (1, 2), (1, 3)]);
        assert_eq!(ind.path(), &[c(1, 1), c(1, 2), c(1, 3)]);
    }

    #[test]
    fn move_back_and_forth_retracts() {
        let ind = walker(&[(3, 3), (3, 4), (3, 3)]);
        assert_eq!(ind.path(), &[c(3, 3)]);
        assert_eq!(ind.pos(), c(3, 3));
    }

    #[test]
    fn remove_cycles_is_idempotent() {
        let mut path = vec![c(1, 1), c(1, 2), c(2, 2), c(2, 1), c(1, 1), c(1, 2), c(1, 3)];
        remove_cycles(&mut path);
        let once = path.clone();
        remove_cycles(&mut path);
        assert_eq!(path, once);
        assert_eq!(once, vec![c(1, 1), c(1, 2), c(1, 3)]);
    }

    #[test]
    fn remove_cycles_leaves_simple_path_alone() {
        let simple = vec![c(1, 1), c(2, 1), c(3, 1), c(3, 2)];
        let mut path = simple.clone();
        remove_cycles(&mut path);
        assert_eq!(path, simple);
    }

    #[test]
    fn reproduce_yields_prefix() {
        let grid = Grid::new(10, 10);
        let cells: Vec<_> = (1..=10).map(|x| (x, 1)).collect();
        let parent = walker(&cells);
        let child = parent.reproduce(IndId(4), &grid, c(10, 10), 1).unwrap();

        let n = child.path().len();
        assert!((1..=parent.path().len()).contains(&n));
        assert_eq!(child.path(), &parent.path()[..n]);
        // ceil(9 + phi) with phi in (0, 1).
        assert_eq!(n, 10);
        assert_eq!(child.parent(), Some(IndId(4)));
        assert_eq!((child.birth(), child.death()), (0, 0));
    }

    #[test]
    fn reproduce_single_cell_keeps_it() {
        let grid = Grid::new(3, 3);
        let parent = Individual::new(c(2, 2));
        let child = parent.reproduce(IndId(0), &grid, c(3, 3), 2).unwrap();
        assert_eq!(child.path(), parent.path());
    }

    #[test]
    fn reproduce_drops_tail_of_long_uncomfortable_path() {
        let grid = Grid::new(40, 40);
        let cells: Vec<_> = (1..=40).map(|x| (x, 1)).collect();
        let parent = walker(&cells);
        // Far from the destination: phi is tiny, so ceil(36 + 4 phi) = 37.
        let child = parent.reproduce(IndId(0), &grid, c(1, 40), 3).unwrap();
        assert_eq!(child.path().len(), 37);
        assert_eq!(child.path(), &parent.path()[..37]);
    }
}
