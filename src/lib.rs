//! Hex Tactics - hex-grid tactical order resolution
//!
//! Hex coordinate math and the materialized battle grid, line of sight,
//! attack and wait orders, and per-side order queues that validate and
//! execute them.

pub mod core;
pub mod hexgrid;
pub mod orders;
pub mod units;
