use rand::Rng;

use crate::config::{ConfigUpdate, SimulationConfig};
use crate::marble::Marble;
use crate::sampler::generate_marbles;
use crate::spatial::SpatialHash;
use crate::types::{hue_distance, wrap_hue, MarbleId};

// Horizontal slack around the trunk when picking root marbles, and how far
// below the trunk bottom the seeding query is centered.
const TRUNK_PAD: f32 = 20.0;
const SEED_PROBE_OFFSET: f32 = 30.0;

// Simulation state - all mutable growth data, replaced wholesale on reset
pub struct SimulationState {
    pub marbles: Vec<Marble>,
    pub hash: SpatialHash,
    // Tip ids, most recent growth first, bounded by `max_active_tips`.
    pub active_tips: Vec<MarbleId>,
    pub target_hue: f32,
    pub tick_count: u64,
}

// Simulation - state plus config and the pacing flags the driver reads
pub struct Simulation {
    pub state: SimulationState,
    pub config: SimulationConfig,
    pub paused: bool,
    pub speed_multiplier: f32,
    pub speed_accumulator: f32,
}

// Allows sim.marbles instead of sim.state.marbles
impl std::ops::Deref for Simulation {
    type Target = SimulationState;
    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl std::ops::DerefMut for Simulation {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}

impl Simulation {
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        Self::with_config(rng, SimulationConfig::default())
    }

    /// Generates a fresh marble field for the configured domain and builds
    /// the simulation around it. The field's hues are centered on the
    /// starting target hue.
    pub fn with_config<R: Rng>(rng: &mut R, config: SimulationConfig) -> Self {
        let start_hue = resolve_start_hue(&config, rng);
        let marbles = generate_marbles(&config, start_hue, rng);
        Self::assemble(marbles, config, start_hue)
    }

    /// Builds the simulation over a caller-supplied marble sequence. Each
    /// marble's `id` must equal its index in the sequence.
    pub fn from_marbles<R: Rng>(
        rng: &mut R,
        marbles: Vec<Marble>,
        config: SimulationConfig,
    ) -> Self {
        let start_hue = resolve_start_hue(&config, rng);
        Self::assemble(marbles, config, start_hue)
    }

    fn assemble(marbles: Vec<Marble>, config: SimulationConfig, start_hue: f32) -> Self {
        let mut state = SimulationState {
            hash: SpatialHash::new(config.reach_distance, config.width, config.height),
            marbles,
            active_tips: Vec::new(),
            target_hue: start_hue,
            tick_count: 0,
        };

        for i in 0..state.marbles.len() {
            let (x, y) = (state.marbles[i].x, state.marbles[i].y);
            state.hash.insert(i, x, y);
        }

        Self::seed_roots(&mut state, &config);

        Self {
            state,
            config,
            paused: false,
            speed_multiplier: 1.0,
            speed_accumulator: 0.0,
        }
    }

    /// Claims up to `root_count` marbles just below the trunk base as the
    /// initial tips: inside the trunk's padded horizontal span, below its
    /// bottom edge, closest to it first. Roots carry no parent.
    fn seed_roots(state: &mut SimulationState, config: &SimulationConfig) {
        let trunk_left = (config.width - config.trunk_width) / 2.0;
        let trunk_right = trunk_left + config.trunk_width;
        let trunk_bottom = config.trunk_height;

        let candidates = state.hash.query(
            &state.marbles,
            config.width / 2.0,
            trunk_bottom + SEED_PROBE_OFFSET,
            config.trunk_width,
        );

        let mut below: Vec<MarbleId> = candidates
            .into_iter()
            .filter(|&id| {
                let m = &state.marbles[id];
                m.y > trunk_bottom && m.x > trunk_left - TRUNK_PAD && m.x < trunk_right + TRUNK_PAD
            })
            .collect();
        below.sort_by(|&a, &b| state.marbles[a].y.total_cmp(&state.marbles[b].y));
        below.truncate(config.root_count);

        for id in below {
            let m = &mut state.marbles[id];
            m.consumed = true;
            m.parent = None;
            state.active_tips.push(id);
        }
    }

    /// Advances the simulation by one tick. Returns true if any tip grew,
    /// so a driver can detect stagnation. A tick with no active tips is a
    /// no-op beyond the hue drift.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> bool {
        self.state.tick_count += 1;

        // Drift the target hue. rand panics on empty ranges, so a zero
        // drift rate skips the draw instead.
        if self.config.drift_rate > 0.0 {
            let drift = rng.gen_range(-self.config.drift_rate..self.config.drift_rate);
            self.state.target_hue = wrap_hue(self.state.target_hue + drift);
        }

        let mut grew = false;
        let mut new_tips: Vec<MarbleId> = Vec::new();

        let tips = self.state.active_tips.clone();
        for tip_id in tips {
            let tip = &self.state.marbles[tip_id];
            let (tip_x, tip_y, tip_radius) = (tip.x, tip.y, tip.radius);

            let nearby = self.state.hash.query(
                &self.state.marbles,
                tip_x,
                tip_y,
                tip_radius + self.config.reach_distance,
            );

            // Score candidates: must be unconsumed, within reach edge to
            // edge, and close enough to the target hue; prefer downward.
            let mut best_score = f32::NEG_INFINITY;
            let mut best: Option<MarbleId> = None;

            for id in nearby {
                let candidate = &self.state.marbles[id];
                if candidate.consumed || id == tip_id {
                    continue;
                }

                let dx = candidate.x - tip_x;
                let dy = candidate.y - tip_y;
                let center_dist = (dx * dx + dy * dy).sqrt();
                let edge_dist = center_dist - tip_radius - candidate.radius;

                if edge_dist > self.config.reach_distance {
                    continue;
                }
                if hue_distance(candidate.hue, self.state.target_hue) > self.config.tolerance {
                    continue;
                }

                // sin(angle) ranges -1 (straight up) to 1 (straight down).
                let score = dy.atan2(dx).sin();
                if score > best_score {
                    best_score = score;
                    best = Some(id);
                }
            }

            if let Some(id) = best {
                let claimed = &mut self.state.marbles[id];
                claimed.consumed = true;
                claimed.parent = Some(tip_id);
                new_tips.push(id);
                grew = true;
            }
        }

        // New tips take priority over old ones; the cap drops the oldest.
        let mut next_tips = new_tips;
        next_tips.extend_from_slice(&self.state.active_tips);
        next_tips.truncate(self.config.max_active_tips);
        self.state.active_tips = next_tips;

        grew
    }

    /// Applies a partial update between ticks. Absent fields are left
    /// unchanged; already-consumed marbles are never recomputed.
    pub fn update_config(&mut self, update: &ConfigUpdate) {
        if let Some(tolerance) = update.tolerance {
            self.config.tolerance = tolerance;
        }
        if let Some(drift_rate) = update.drift_rate {
            self.config.drift_rate = drift_rate;
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn set_speed(&mut self, multiplier: f32) {
        self.speed_multiplier = multiplier.clamp(0.1, 10.0);
    }

    /// Discards the whole state and regrows a fresh field from the current
    /// config. When `start_hue` is unset a new target hue is drawn.
    pub fn reset<R: Rng>(&mut self, rng: &mut R) {
        *self = Self::with_config(rng, self.config.clone());
    }

    /// New domain dimensions; the old field cannot be carried over, so this
    /// is a wholesale reset.
    pub fn resize<R: Rng>(&mut self, rng: &mut R, width: f32, height: f32) {
        self.config.width = width;
        self.config.height = height;
        self.reset(rng);
    }

    /// (total marbles, consumed marbles, active tips)
    pub fn stats(&self) -> (usize, usize, usize) {
        let consumed = self.state.marbles.iter().filter(|m| m.consumed).count();
        (
            self.state.marbles.len(),
            consumed,
            self.state.active_tips.len(),
        )
    }
}

fn resolve_start_hue<R: Rng>(config: &SimulationConfig, rng: &mut R) -> f32 {
    config
        .start_hue
        .unwrap_or_else(|| rng.gen_range(0.0..360.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn marble_at(id: MarbleId, x: f32, y: f32, hue: f32) -> Marble {
        Marble {
            id,
            x,
            y,
            radius: 10.0,
            hue,
            saturation: 80.0,
            brightness: 70.0,
            consumed: false,
            parent: None,
        }
    }

    fn trunk_config() -> SimulationConfig {
        SimulationConfig {
            width: 500.0,
            height: 500.0,
            trunk_width: 80.0,
            trunk_height: 60.0,
            start_hue: Some(10.0),
            drift_rate: 0.0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn seeds_roots_below_the_trunk() {
        // Trunk centered at x = 250, width 80: span [210, 290], bottom 60.
        let marbles = vec![
            marble_at(0, 250.0, 80.0, 10.0),  // below trunk, closest
            marble_at(1, 230.0, 100.0, 10.0), // below trunk
            marble_at(2, 270.0, 120.0, 10.0), // below trunk
            marble_at(3, 250.0, 140.0, 10.0), // below trunk
            marble_at(4, 250.0, 150.0, 10.0), // below trunk, 5th closest
            marble_at(5, 250.0, 40.0, 10.0),  // above trunk bottom
            marble_at(6, 100.0, 100.0, 10.0), // outside horizontal span
        ];
        let mut rng = StdRng::seed_from_u64(5);
        let sim = Simulation::from_marbles(&mut rng, marbles, trunk_config());

        assert_eq!(sim.active_tips, vec![0, 1, 2, 3]);
        for &id in &sim.active_tips {
            let m = &sim.marbles[id];
            assert!(m.consumed);
            assert_eq!(m.parent, None);
            assert!(m.y > 60.0);
        }
        assert!(!sim.marbles[4].consumed, "cap of root_count exceeded");
        assert!(!sim.marbles[5].consumed);
        assert!(!sim.marbles[6].consumed);
    }

    #[test]
    fn tick_claims_a_matching_downward_neighbor() {
        let marbles = vec![
            marble_at(0, 250.0, 80.0, 10.0),
            marble_at(1, 250.0, 130.0, 10.0), // in reach, hue matches target
            marble_at(2, 250.0, 132.0, 200.0), // in reach, hue far off
        ];
        let mut config = trunk_config();
        config.root_count = 1; // only the closest marble becomes a root
        let mut rng = StdRng::seed_from_u64(5);
        let mut sim = Simulation::from_marbles(&mut rng, marbles, config);
        assert_eq!(sim.active_tips, vec![0]);

        let grew = sim.tick(&mut rng);

        assert!(grew);
        assert!(sim.marbles[1].consumed);
        assert_eq!(sim.marbles[1].parent, Some(0));
        assert!(!sim.marbles[2].consumed);
        assert_eq!(sim.active_tips[0], 1, "new growth leads the tip list");
    }

    #[test]
    fn zero_tolerance_without_exact_match_is_no_growth() {
        let marbles = vec![
            marble_at(0, 250.0, 80.0, 10.0),
            marble_at(1, 250.0, 130.0, 11.0), // one degree off
        ];
        let mut config = trunk_config();
        config.tolerance = 0.0;
        config.root_count = 1;
        let mut rng = StdRng::seed_from_u64(5);
        let mut sim = Simulation::from_marbles(&mut rng, marbles, config);

        let consumed_before: Vec<bool> = sim.marbles.iter().map(|m| m.consumed).collect();
        let grew = sim.tick(&mut rng);

        assert!(!grew);
        let consumed_after: Vec<bool> = sim.marbles.iter().map(|m| m.consumed).collect();
        assert_eq!(consumed_before, consumed_after);
    }

    #[test]
    fn tick_on_empty_field_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut sim = Simulation::from_marbles(&mut rng, Vec::new(), trunk_config());
        assert!(sim.active_tips.is_empty());
        assert!(!sim.tick(&mut rng));
    }

    #[test]
    fn consumption_is_monotonic_and_parents_are_stable() {
        let mut rng = StdRng::seed_from_u64(21);
        let config = SimulationConfig {
            width: 400.0,
            height: 400.0,
            min_dist: 20.0,
            tolerance: 180.0, // every hue matches; maximal growth pressure
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::with_config(&mut rng, config);

        let mut seen: Vec<(bool, Option<MarbleId>)> = sim
            .marbles
            .iter()
            .map(|m| (m.consumed, m.parent))
            .collect();

        for _ in 0..200 {
            sim.tick(&mut rng);
            for (m, prev) in sim.marbles.iter().zip(seen.iter_mut()) {
                if prev.0 {
                    assert!(m.consumed, "consumed flag reverted");
                    assert_eq!(m.parent, prev.1, "parent changed after consumption");
                } else {
                    assert_eq!(
                        m.parent.is_some(),
                        m.consumed,
                        "parent set without consumption"
                    );
                }
                *prev = (m.consumed, m.parent);
            }
        }
    }

    #[test]
    fn consumed_graph_stays_a_forest() {
        let mut rng = StdRng::seed_from_u64(33);
        let config = SimulationConfig {
            width: 400.0,
            height: 400.0,
            min_dist: 20.0,
            tolerance: 180.0,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::with_config(&mut rng, config);
        for _ in 0..300 {
            sim.tick(&mut rng);
        }

        let (total, consumed, _) = sim.stats();
        assert!(consumed > 4, "expected real growth, got {consumed}/{total}");

        // Every parent chain must terminate at a root within `total` hops.
        for m in sim.marbles.iter().filter(|m| m.consumed) {
            let mut hops = 0;
            let mut current = m.parent;
            while let Some(parent_id) = current {
                let parent = &sim.marbles[parent_id];
                assert!(parent.consumed, "edge points at an unconsumed marble");
                hops += 1;
                assert!(hops <= total, "cycle through marble {}", m.id);
                current = parent.parent;
            }
        }
    }

    #[test]
    fn active_tips_never_exceed_the_cap() {
        let mut rng = StdRng::seed_from_u64(44);
        let config = SimulationConfig {
            width: 400.0,
            height: 400.0,
            min_dist: 15.0,
            tolerance: 180.0,
            max_active_tips: 6,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::with_config(&mut rng, config);

        for _ in 0..100 {
            sim.tick(&mut rng);
            assert!(sim.active_tips.len() <= 6);
        }
    }

    #[test]
    fn target_hue_stays_wrapped_under_heavy_drift() {
        let mut rng = StdRng::seed_from_u64(55);
        let config = SimulationConfig {
            width: 100.0,
            height: 100.0,
            drift_rate: 180.0,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::with_config(&mut rng, config);

        for _ in 0..500 {
            sim.tick(&mut rng);
            assert!(
                (0.0..360.0).contains(&sim.target_hue),
                "target hue escaped: {}",
                sim.target_hue
            );
        }
    }

    #[test]
    fn identical_seeds_replay_identically() {
        let config = SimulationConfig {
            width: 300.0,
            height: 300.0,
            min_dist: 20.0,
            ..SimulationConfig::default()
        };

        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut sim = Simulation::with_config(&mut rng, config.clone());
            for _ in 0..100 {
                sim.tick(&mut rng);
            }
            sim
        };

        let a = run(1234);
        let b = run(1234);

        assert_eq!(a.marbles, b.marbles);
        assert_eq!(a.active_tips, b.active_tips);
        assert_eq!(a.target_hue, b.target_hue);
        assert_eq!(a.tick_count, b.tick_count);
    }

    #[test]
    fn partial_config_update_applies_between_ticks() {
        let mut rng = StdRng::seed_from_u64(66);
        let mut sim = Simulation::from_marbles(&mut rng, Vec::new(), trunk_config());

        sim.update_config(&ConfigUpdate {
            tolerance: Some(55.0),
            drift_rate: None,
        });
        assert_eq!(sim.config.tolerance, 55.0);
        assert_eq!(sim.config.drift_rate, 0.0, "absent field must not change");

        sim.update_config(&ConfigUpdate {
            tolerance: None,
            drift_rate: Some(4.0),
        });
        assert_eq!(sim.config.tolerance, 55.0);
        assert_eq!(sim.config.drift_rate, 4.0);
    }

    #[test]
    fn reset_replaces_the_field_wholesale() {
        let mut rng = StdRng::seed_from_u64(77);
        let config = SimulationConfig {
            width: 300.0,
            height: 300.0,
            min_dist: 20.0,
            tolerance: 180.0,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::with_config(&mut rng, config);
        for _ in 0..50 {
            sim.tick(&mut rng);
        }
        let (_, consumed_before, _) = sim.stats();
        assert!(consumed_before > 4);

        sim.resize(&mut rng, 200.0, 200.0);

        assert_eq!(sim.config.width, 200.0);
        assert_eq!(sim.tick_count, 0);
        let (_, consumed_after, _) = sim.stats();
        assert!(
            consumed_after <= sim.config.root_count,
            "only fresh roots may be consumed after reset"
        );
        assert!(sim
            .marbles
            .iter()
            .all(|m| m.x < 200.0 && m.y < 200.0));
    }
}
