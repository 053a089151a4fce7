pub mod config;
pub mod error;
pub mod types;

pub use config::{CombatConfig, EngineConfig, ExecutionMode, GridConfig, QueueConfig, WaitConfig};
pub use error::{Result, TacticsError};
pub use types::{OrderId, Side, UnitId, WorldPos};
