//! Unit constants - engagement ranges and stat bounds

// Maximum engagement range (world units)
pub const ARMOR_MAX_RANGE: f64 = 3000.0;
pub const FIELD_ARTILLERY_MAX_RANGE: f64 = 20000.0;
pub const INFANTRY_MAX_RANGE: f64 = 500.0;
pub const DEFAULT_MAX_RANGE: f64 = 1000.0;

// Morale and fatigue are percentages
pub const MAX_MORALE: f64 = 100.0;
pub const MAX_FATIGUE: f64 = 100.0;
