//! Per-hex terrain attributes and where they come from
//!
//! Only what matters to order resolution is modelled: vegetation density
//! and whether the hex holds an obstacle or a building.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::WorldPos;
use crate::hexgrid::constants::{DENSE_VEGETATION_BLOCKING, STRUCTURE_BLOCKING};
use crate::hexgrid::hex::HexCoord;

/// Vegetation density tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VegetationDensity {
    #[default]
    None,
    Light,
    Dense,
}

/// Terrain attributes of a single hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TerrainDescriptor {
    pub vegetation: VegetationDensity,
    pub has_obstacle: bool,
    pub has_building: bool,
}

impl TerrainDescriptor {
    pub const CLEAR: TerrainDescriptor = TerrainDescriptor {
        vegetation: VegetationDensity::None,
        has_obstacle: false,
        has_building: false,
    };

    pub fn dense_vegetation() -> Self {
        Self {
            vegetation: VegetationDensity::Dense,
            ..Self::CLEAR
        }
    }

    pub fn building() -> Self {
        Self {
            has_building: true,
            ..Self::CLEAR
        }
    }

    pub fn obstacle() -> Self {
        Self {
            has_obstacle: true,
            ..Self::CLEAR
        }
    }

    /// Contribution of this hex to a line-of-sight blocking total
    pub fn los_blocking_weight(&self) -> u32 {
        let mut weight = 0;
        if self.vegetation == VegetationDensity::Dense {
            weight += DENSE_VEGETATION_BLOCKING;
        }
        if self.has_obstacle || self.has_building {
            weight += STRUCTURE_BLOCKING;
        }
        weight
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::CLEAR
    }
}

/// Supplies terrain when a grid region is materialized
pub trait TerrainSource {
    fn terrain_at(&self, coord: HexCoord, center: WorldPos) -> TerrainDescriptor;
}

/// Everything is clear ground
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTerrain;

impl TerrainSource for OpenTerrain {
    fn terrain_at(&self, _coord: HexCoord, _center: WorldPos) -> TerrainDescriptor {
        TerrainDescriptor::CLEAR
    }
}

/// Sparse coordinate → terrain table; unlisted hexes are clear
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainMap {
    #[serde(default)]
    pub hexes: HashMap<HexCoord, TerrainDescriptor>,
}

impl TerrainMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, coord: HexCoord, terrain: TerrainDescriptor) {
        if terrain.is_clear() {
            self.hexes.remove(&coord);
        } else {
            self.hexes.insert(coord, terrain);
        }
    }

    pub fn get(&self, coord: HexCoord) -> TerrainDescriptor {
        self.hexes.get(&coord).copied().unwrap_or_default()
    }

    /// Parse a TOML table of `"q,r,s" = { ... }` entries under `[hexes]`
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl TerrainSource for TerrainMap {
    fn terrain_at(&self, coord: HexCoord, _center: WorldPos) -> TerrainDescriptor {
        self.get(coord)
    }
}
