//! Units and the provider interface orders use to reach them

pub mod constants;
pub mod roster;
pub mod unit;
pub mod unit_type;

pub use roster::{UnitProvider, UnitRoster};
pub use unit::{CoverTier, DamageReport, Modifier, ModifierOrigin, Recovery, Stat, TacticalUnit};
pub use unit_type::{UnitProperties, UnitType};
