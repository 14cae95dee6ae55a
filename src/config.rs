// Global configuration for the field and the growth engine.

use serde::{Deserialize, Serialize};

// Configuration struct for simulation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // Domain
    pub width: f32,
    pub height: f32,

    // Field generation
    pub min_dist: f32,
    pub sample_attempts: usize,
    pub min_radius: f32,
    pub max_radius: f32,
    pub hue_spread: f32,
    pub min_saturation: f32,
    pub max_saturation: f32,
    pub min_brightness: f32,
    pub max_brightness: f32,

    // Growth
    pub tolerance: f32,
    pub drift_rate: f32,
    pub reach_distance: f32,
    pub max_active_tips: usize,
    pub start_hue: Option<f32>,

    // Root seeding
    pub trunk_width: f32,
    pub trunk_height: f32,
    pub root_count: usize,

    // Reproducibility
    pub rng_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            min_dist: 35.0,
            sample_attempts: 30,
            min_radius: 5.0,
            max_radius: 25.0,
            hue_spread: 180.0,
            min_saturation: 60.0,
            max_saturation: 100.0,
            min_brightness: 50.0,
            max_brightness: 90.0,
            tolerance: 30.0,
            drift_rate: 2.0,
            reach_distance: 50.0,
            max_active_tips: 10,
            start_hue: None,
            trunk_width: 80.0,
            trunk_height: 60.0,
            root_count: 4,
            rng_seed: None,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a YAML or JSON file, by extension.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config = if path.ends_with(".json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        Ok(config)
    }

    /// Searches config.yaml, config.yml, config.json in the working
    /// directory; falls back to defaults when none is present or parses.
    pub fn from_default_paths() -> Self {
        for path in ["config.yaml", "config.yml", "config.json"] {
            if std::path::Path::new(path).exists() {
                if let Ok(config) = Self::from_file(path) {
                    return config;
                }
            }
        }
        Self::default()
    }
}

/// Partial runtime update from a controller. Absent fields leave the
/// current values unchanged; unrecognized fields are dropped at the
/// deserialization boundary.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ConfigUpdate {
    pub tolerance: Option<f32>,
    pub drift_rate: Option<f32>,
}
