//! Discretized spatial model: hex coordinates, the materialized grid,
//! terrain and line of sight.
//!
//! Flat-topped hexes in cube coordinates. The grid only exists for the
//! currently visible region and is rebuilt wholesale when that changes.

pub mod constants;
pub mod geometry;
pub mod grid;
pub mod hex;
pub mod line_of_sight;
pub mod terrain;

use std::sync::{Arc, RwLock};

pub use geometry::{point_in_polygon, Bounds, Zone};
pub use grid::{HexCell, HexGrid};
pub use hex::{cube_round, hex_corners, hex_distance, hex_to_world, world_to_hex, HexCoord};
pub use line_of_sight::LosReport;
pub use terrain::{OpenTerrain, TerrainDescriptor, TerrainMap, TerrainSource, VegetationDensity};

/// Grid shared between orders (read) and the region manager (write)
pub type SharedGrid = Arc<RwLock<HexGrid>>;
