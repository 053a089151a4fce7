//! Engine configuration with documented constants
//!
//! Every tunable the order engine reads is collected here. Values can be
//! loaded from TOML; any section or field left out keeps its default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TacticsError};

/// Top-level configuration handed to grids, orders and queues
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub combat: CombatConfig,
    pub wait: WaitConfig,
    pub queue: QueueConfig,
}

/// Hex grid geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Hex edge length in world units (also the centre-to-corner radius)
    ///
    /// Shared by the whole grid. Attack ranges are in the same units, so an
    /// infantry unit (500) reaches roughly three hexes at the default size.
    pub hex_size: f64,

    /// Extra hex rings generated beyond the visible region before the
    /// bounds filter runs
    pub materialize_buffer: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            hex_size: 100.0,
            materialize_buffer: 2,
        }
    }
}

/// Attack resolution tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Hit probability before range, LOS, cover and morale factors
    pub base_hit_probability: f64,

    /// Multiplier applied when line of sight is blocked
    pub no_los_factor: f64,

    /// Realized damage varies uniformly by this fraction around firepower
    pub damage_jitter: f64,

    /// LOS is clear while the blocking total stays below
    /// `floor(los_block_fraction * path_length)`
    pub los_block_fraction: f64,

    /// Apply full cube rounding to interpolated LOS samples
    ///
    /// Off by default: the per-axis rounding approximation is what hit
    /// probabilities were balanced against.
    pub los_cube_rounding: bool,

    /// Treat same-hex and adjacent-hex shots as having clear LOS
    ///
    /// Off by default: `floor(los_block_fraction * n)` is 0 for n <= 1, so
    /// the threshold rule reports such paths as blocked.
    pub los_adjacent_clear: bool,

    /// Ammunition consumed per attack
    pub ammo_per_shot: u32,

    /// Delay between committing ammunition and resolving the impact (ms)
    pub resolution_delay_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            base_hit_probability: 0.70,
            no_los_factor: 0.3,
            damage_jitter: 0.2,
            los_block_fraction: 0.7,
            los_cube_rounding: false,
            los_adjacent_clear: false,
            ammo_per_shot: 1,
            resolution_delay_ms: 250,
        }
    }
}

impl CombatConfig {
    pub fn resolution_delay(&self) -> Duration {
        Duration::from_millis(self.resolution_delay_ms)
    }
}

/// Wait order pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Length of one timed wait increment (ms)
    pub tick_ms: u64,

    /// Emit a progress event every N increments
    pub progress_every: u32,

    /// Real time spent per turn in turn-counted waits (ms)
    pub turn_duration_ms: u64,

    /// Game minutes represented by one turn, used to scale recovery
    pub turn_minutes: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            progress_every: 5,
            turn_duration_ms: 1000,
            turn_minutes: 1.0,
        }
    }
}

impl WaitConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn turn_duration(&self) -> Duration {
        Duration::from_millis(self.turn_duration_ms)
    }
}

/// How a queue drives its executable orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One order at a time, in priority order
    Sequential,
    /// Fixed-size concurrent chunks
    BoundedParallel { max_concurrency: usize },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Sequential
    }
}

/// Order queue behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Finished orders kept in history before the oldest is evicted
    pub history_cap: usize,

    pub mode: ExecutionMode,

    /// Re-validate every order at the start of `execute_all`
    pub validate_before_execute: bool,

    /// Poll interval while a sequential run is paused (ms)
    pub pause_poll_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            history_cap: 100,
            mode: ExecutionMode::Sequential,
            validate_before_execute: true,
            pause_poll_ms: 100,
        }
    }
}

impl QueueConfig {
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.grid.hex_size > 0.0) {
            return Err(TacticsError::Config(format!(
                "grid.hex_size must be positive (got {})",
                self.grid.hex_size
            )));
        }

        if self.grid.materialize_buffer < 0 {
            return Err(TacticsError::Config(
                "grid.materialize_buffer must not be negative".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.combat.base_hit_probability) {
            return Err(TacticsError::Config(format!(
                "combat.base_hit_probability ({}) must be within [0, 1]",
                self.combat.base_hit_probability
            )));
        }

        if !(0.0..1.0).contains(&self.combat.damage_jitter) {
            return Err(TacticsError::Config(format!(
                "combat.damage_jitter ({}) must be within [0, 1)",
                self.combat.damage_jitter
            )));
        }

        if !(self.combat.los_block_fraction > 0.0) {
            return Err(TacticsError::Config(
                "combat.los_block_fraction must be positive".into(),
            ));
        }

        if self.wait.tick_ms == 0 {
            return Err(TacticsError::Config("wait.tick_ms must be positive".into()));
        }

        if self.queue.history_cap == 0 {
            return Err(TacticsError::Config(
                "queue.history_cap must be at least 1".into(),
            ));
        }

        if let ExecutionMode::BoundedParallel { max_concurrency: 0 } = self.queue.mode {
            return Err(TacticsError::Config(
                "queue.mode.max_concurrency must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
