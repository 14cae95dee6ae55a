// Uniform-grid spatial hash for radius-bounded neighbor queries.

use std::collections::HashMap;

use crate::marble::Marble;
use crate::types::MarbleId;

/// Maps grid cells to buckets of marble ids. Buckets hold ids into the
/// shared marble sequence, never copies of marble data; `query` reads
/// positions from the slice the ids were inserted for. Built once per
/// simulation, entries are never removed or moved (positions are
/// immutable).
pub struct SpatialHash {
    cell_size: f32,
    cols: usize,
    rows: usize,
    cells: HashMap<usize, Vec<MarbleId>>,
}

impl SpatialHash {
    pub fn new(cell_size: f32, width: f32, height: f32) -> Self {
        let (cols, rows) = if cell_size > 0.0 {
            (
                (width / cell_size).ceil() as usize,
                (height / cell_size).ceil() as usize,
            )
        } else {
            // Degenerate cell size disables the grid entirely.
            (0, 0)
        };
        Self {
            cell_size,
            cols,
            rows,
            cells: HashMap::new(),
        }
    }

    /// Appends `id` to the bucket of the cell containing (x, y). Duplicate
    /// positions are permitted and all retained. Positions outside the grid
    /// are skipped; the sampler only yields in-domain points.
    pub fn insert(&mut self, id: MarbleId, x: f32, y: f32) {
        if self.cols == 0 || self.rows == 0 {
            return;
        }
        let col = (x / self.cell_size).floor() as isize;
        let row = (y / self.cell_size).floor() as isize;
        if col < 0 || row < 0 || col >= self.cols as isize || row >= self.rows as isize {
            return;
        }
        self.cells
            .entry(row as usize * self.cols + col as usize)
            .or_default()
            .push(id);
    }

    /// All inserted ids whose Euclidean distance from (x, y) is <= `radius`.
    /// Scans exactly the cells overlapped by the query disk's bounding box
    /// and filters each candidate by the exact squared-distance test, so
    /// there are no false negatives and no false positives. A radius <= 0
    /// is legal and yields an empty or exact-hit result.
    pub fn query(&self, marbles: &[Marble], x: f32, y: f32, radius: f32) -> Vec<MarbleId> {
        let mut results = Vec::new();
        if self.cols == 0 || self.rows == 0 {
            return results;
        }

        let min_col = ((x - radius) / self.cell_size).floor() as isize;
        let max_col = ((x + radius) / self.cell_size).floor() as isize;
        let min_row = ((y - radius) / self.cell_size).floor() as isize;
        let max_row = ((y + radius) / self.cell_size).floor() as isize;
        let radius_sq = radius * radius;

        for row in min_row..=max_row {
            if row < 0 || row >= self.rows as isize {
                continue;
            }
            for col in min_col..=max_col {
                if col < 0 || col >= self.cols as isize {
                    continue;
                }
                let key = row as usize * self.cols + col as usize;
                if let Some(cell) = self.cells.get(&key) {
                    for &id in cell {
                        let dx = marbles[id].x - x;
                        let dy = marbles[id].y - y;
                        if dx * dx + dy * dy <= radius_sq {
                            results.push(id);
                        }
                    }
                }
            }
        }
        results
    }
}
