//! Configuration types for the occupancy tree.
//!
//! The tree consumes these values but does not own their provenance; callers
//! typically load them from a YAML file at startup.

use serde::{Deserialize, Serialize};

/// Occupancy tree configuration: geometry and log-odds update rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Meters per voxel at the finest level (e.g. 0.05 = 5cm voxels)
    pub resolution: f32,

    /// Tree depth in bits per axis (1-16). Keys are valid over this range.
    pub depth: u8,

    /// Log-odds increment for an occupied observation
    pub hit_log_odds: f32,

    /// Log-odds increment for a free observation (negative)
    pub miss_log_odds: f32,

    /// Lower clamp for stored log-odds
    pub clamp_min: f32,

    /// Upper clamp for stored log-odds
    pub clamp_max: f32,

    /// Log-odds threshold above which a voxel counts as occupied
    pub occupancy_threshold: f32,

    /// Delete voxels that reach `clamp_min` during a batched merge instead
    /// of storing them, so deep free space does not densify the tree
    pub delete_minimum: bool,

    /// Allow merging eight identical leaf siblings into their parent.
    /// Off by default: with timed decay enabled a prune can discard
    /// distinguishing expiry information.
    pub prune_enabled: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            resolution: 0.05,          // 5cm voxels
            depth: 16,                 // full key range, ~3.2km at 5cm
            hit_log_odds: 0.85,        // p = 0.7
            miss_log_odds: -0.4,       // p = 0.4
            clamp_min: -2.0,           // p = 0.12
            clamp_max: 3.5,            // p = 0.97
            occupancy_threshold: 0.0,  // p = 0.5
            delete_minimum: false,
            prune_enabled: false,
        }
    }
}

impl TreeConfig {
    /// Validate ranges that the tree relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 || self.depth > crate::core::MAX_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "depth must be 1-{}, got {}",
                crate::core::MAX_DEPTH,
                self.depth
            )));
        }
        if self.resolution <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.clamp_min >= self.clamp_max {
            return Err(ConfigError::Invalid(format!(
                "clamp_min {} must be below clamp_max {}",
                self.clamp_min, self.clamp_max
            )));
        }
        if self.hit_log_odds <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "hit_log_odds must be positive, got {}",
                self.hit_log_odds
            )));
        }
        Ok(())
    }

    /// Edge length in meters of a voxel at the given tree level.
    #[inline]
    pub fn voxel_size(&self, level: u8) -> f32 {
        self.resolution * (1u32 << level) as f32
    }
}

/// Temporal decay configuration.
///
/// A voxel's lifetime grows quadratically with its accumulated evidence:
/// `expiry = timestamp + c_coeff + a_coeff_log_odds * log_odds^2`, where
/// `a_coeff` is expressed per squared default-strength observation and is
/// rescaled into log-odds units against the configured hit increment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Quadratic lifetime coefficient, seconds per squared observation count
    pub a_coeff: f32,

    /// Flat minimum lifetime in seconds
    pub c_coeff: f32,

    /// Optional flat timeout in seconds for free space. `None` leaves free
    /// voxels permanent.
    pub free_timeout: Option<u32>,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            a_coeff: 1.0 / 25.0, // 25 observations buy one extra second
            c_coeff: 60.0,       // one minute minimum lifetime
            free_timeout: None,
        }
    }
}

impl DecayConfig {
    /// `a_coeff` rescaled from observation counts into log-odds units.
    #[inline]
    pub fn a_coeff_log_odds(&self, hit_log_odds: f32) -> f32 {
        self.a_coeff / (hit_log_odds * hit_log_odds)
    }

    /// Timestamp mask for free space.
    ///
    /// Free voxels are stamped at a power-of-two granularity near one tenth
    /// of the free timeout, so free regions sensed at slightly different
    /// times still carry equal stamps and remain prunable.
    pub fn free_stamp_mask(&self) -> u32 {
        match self.free_timeout {
            Some(timeout) => {
                let tenth = timeout / 10;
                if tenth == 0 {
                    return !0;
                }
                let power = 1u32 << (32 - tenth.leading_zeros()).min(31);
                !(power - 1)
            }
            None => !0,
        }
    }

    /// Maximum possible lifespan in seconds at full clamp strength.
    #[inline]
    pub fn max_expiry_delta(&self, hit_log_odds: f32, clamp_max: f32) -> u32 {
        (self.c_coeff as f64
            + self.a_coeff_log_odds(hit_log_odds) as f64 * clamp_max as f64 * clamp_max as f64)
            as u32
    }
}

/// Full map configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapConfig {
    /// Tree geometry and log-odds rule
    pub tree: TreeConfig,
    /// Temporal decay coefficients
    pub decay: DecayConfig,
}

impl MapConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Configuration error type
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// File I/O error
    IoError(String),
    /// YAML parsing error
    ParseError(String),
    /// Value out of the range the tree supports
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
