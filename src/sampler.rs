// Marble field generation: Bridson's Poisson disk sampling over the domain,
// then attribute assignment (radius and HSB color bands).

use rand::Rng;
use std::f32::consts::{SQRT_2, TAU};

use crate::config::SimulationConfig;
use crate::marble::Marble;
use crate::types::{wrap_hue, Point};

// Acceleration grid for the sampler. With cell size `min_dist / sqrt(2)` a
// cell holds at most one accepted point, so a candidate only has to be
// checked against the surrounding +-2 cells.
struct AccelGrid {
    cell_size: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Option<usize>>,
}

impl AccelGrid {
    fn new(width: f32, height: f32, cell_size: f32) -> Self {
        let cols = (width / cell_size).ceil() as usize;
        let rows = (height / cell_size).ceil() as usize;
        Self {
            cell_size,
            cols,
            rows,
            cells: vec![None; cols * rows],
        }
    }

    fn record(&mut self, p: Point, index: usize) {
        let col = (p.x / self.cell_size) as usize;
        let row = (p.y / self.cell_size) as usize;
        self.cells[row * self.cols + col] = Some(index);
    }

    /// True when no accepted point lies within `min_dist` of (x, y).
    fn is_far_enough(&self, x: f32, y: f32, min_dist: f32, points: &[Point]) -> bool {
        let col = (x / self.cell_size) as isize;
        let row = (y / self.cell_size) as isize;
        let min_dist_sq = min_dist * min_dist;

        for dr in -2..=2 {
            for dc in -2..=2 {
                let r = row + dr;
                let c = col + dc;
                if r < 0 || r >= self.rows as isize || c < 0 || c >= self.cols as isize {
                    continue;
                }
                if let Some(index) = self.cells[r as usize * self.cols + c as usize] {
                    let dx = points[index].x - x;
                    let dy = points[index].y - y;
                    if dx * dx + dy * dy < min_dist_sq {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Bridson's algorithm. Returns points covering the domain with pairwise
/// spacing >= `min_dist`, in insertion order (the random seed comes first).
/// `k` is the candidate budget per active point; `k = 0` degenerates to the
/// seed alone. Non-positive dimensions or spacing yield an empty field.
pub fn poisson_disk_sample<R: Rng>(
    width: f32,
    height: f32,
    min_dist: f32,
    k: usize,
    rng: &mut R,
) -> Vec<Point> {
    if width <= 0.0 || height <= 0.0 || min_dist <= 0.0 {
        return Vec::new();
    }

    let mut grid = AccelGrid::new(width, height, min_dist / SQRT_2);
    let mut points: Vec<Point> = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    // Seed with a random first point.
    let seed = Point {
        x: rng.gen_range(0.0..width),
        y: rng.gen_range(0.0..height),
    };
    grid.record(seed, 0);
    points.push(seed);
    active.push(0);

    while !active.is_empty() {
        let slot = rng.gen_range(0..active.len());
        let parent = points[active[slot]];

        let mut found = false;
        for _ in 0..k {
            // Candidate in the annulus [min_dist, 2 * min_dist) around the parent.
            let angle = rng.gen_range(0.0..TAU);
            let dist = rng.gen_range(min_dist..min_dist * 2.0);
            let nx = parent.x + angle.cos() * dist;
            let ny = parent.y + angle.sin() * dist;

            let inside = nx >= 0.0 && nx < width && ny >= 0.0 && ny < height;
            if inside && grid.is_far_enough(nx, ny, min_dist, &points) {
                let index = points.len();
                let p = Point { x: nx, y: ny };
                grid.record(p, index);
                points.push(p);
                active.push(index);
                found = true;
                break;
            }
        }

        if !found {
            // Parent exhausted its candidate budget; retire it.
            active.swap_remove(slot);
        }
    }

    points
}

/// Generates the full marble field: samples positions, then attaches radius
/// and HSB color. Hues are drawn around `center_hue` within
/// `config.hue_spread` degrees and wrapped into [0, 360); the default spread
/// of 180 covers the whole circle.
pub fn generate_marbles<R: Rng>(
    config: &SimulationConfig,
    center_hue: f32,
    rng: &mut R,
) -> Vec<Marble> {
    let points = poisson_disk_sample(
        config.width,
        config.height,
        config.min_dist,
        config.sample_attempts,
        rng,
    );

    points
        .into_iter()
        .enumerate()
        .map(|(i, p)| Marble {
            id: i,
            x: p.x,
            y: p.y,
            radius: band_sample(rng, config.min_radius, config.max_radius),
            hue: wrap_hue(center_hue + spread_sample(rng, config.hue_spread)),
            saturation: band_sample(rng, config.min_saturation, config.max_saturation),
            brightness: band_sample(rng, config.min_brightness, config.max_brightness),
            consumed: false,
            parent: None,
        })
        .collect()
}

fn band_sample<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

fn spread_sample<R: Rng>(rng: &mut R, spread: f32) -> f32 {
    if spread > 0.0 {
        rng.gen_range(-spread..spread)
    } else {
        0.0
    }
}
