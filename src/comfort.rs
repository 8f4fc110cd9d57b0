use crate::grid::{Coord, Grid, GridError};

const MIN_PART: f64 = 0.001;
const MAX_PART: f64 = 0.999;

/// Sum of the edge costs along `path`.
pub fn path_cost(path: &[Coord], grid: &Grid) -> Result<u32, GridError> {
    path.windows(2)
        .map(|pair| grid.edge_cost(pair[0], pair[1]))
        .sum()
}

/// Comfort of an individual that followed `path`.
///
/// Product of a path-efficiency term and a proximity-to-destination term,
/// each clamped to `[0.001, 0.999]` and raised to `k`.
/// The result is therefore always strictly inside `(0, 1)`.
pub fn comfort(path: &[Coord], grid: &Grid, dest: Coord, k: u32) -> Result<f64, GridError> {
    let Some(&last) = path.last() else {
        return Ok(MIN_PART.powi(2 * k as i32));
    };

    let length = (path.len() - 1) as f64;
    let cost = path_cost(path, grid)? as f64;
    let max_edge_cost = grid.max_edge_cost() as f64;

    let part_1 = (1.0 - cost - length + 2.0) / ((max_edge_cost - 1.0) * length + 3.0);
    let part_1 = part_1.clamp(MIN_PART, MAX_PART);

    let max_dist = (grid.n_rows() + grid.n_cols() + 1) as f64;
    let part_2 = 1.0 - last.dist(dest) as f64 / max_dist;
    let part_2 = part_2.clamp(MIN_PART, MAX_PART);

    Ok(part_1.powi(k as i32) * part_2.powi(k as i32))
}
