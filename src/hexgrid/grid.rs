//! Hex grid covering the visible region
//!
//! Cells live in a flat arena with a coordinate → index map. Changing the
//! visible region regenerates the whole arena; nothing holds references into
//! it across a regeneration, so there is nothing to dangle.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::config::GridConfig;
use crate::core::types::{UnitId, WorldPos};
use crate::hexgrid::constants::SQRT_3;
use crate::hexgrid::geometry::{point_in_polygon, Bounds};
use crate::hexgrid::hex::{hex_corners, hex_to_world, world_to_hex, HexCoord};
use crate::hexgrid::terrain::{TerrainDescriptor, TerrainSource};

/// A single materialized hex
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HexCell {
    pub coord: HexCoord,
    pub center: WorldPos,
    pub corners: [WorldPos; 6],
    pub terrain: TerrainDescriptor,
    /// Unit standing in this hex (by id; the cell does not own it)
    pub occupant: Option<UnitId>,
}

impl HexCell {
    pub fn new(coord: HexCoord, center: WorldPos, hex_size: f64, terrain: TerrainDescriptor) -> Self {
        Self {
            coord,
            center,
            corners: hex_corners(center, hex_size),
            terrain,
            occupant: None,
        }
    }

    /// Exact membership test against the cell outline
    pub fn contains(&self, pos: WorldPos) -> bool {
        point_in_polygon(pos, &self.corners)
    }
}

/// The materialized hex grid
#[derive(Debug, Clone)]
pub struct HexGrid {
    cells: Vec<HexCell>,
    index: AHashMap<HexCoord, usize>,
    hex_size: f64,
    origin: WorldPos,
    buffer: i32,
    region: Option<Bounds>,
}

impl HexGrid {
    /// Empty grid anchored at `origin`
    ///
    /// A size that is not a positive finite number falls back to the
    /// default hex size.
    pub fn new(hex_size: f64, origin: WorldPos) -> Self {
        let hex_size = if hex_size.is_finite() && hex_size > 0.0 {
            hex_size
        } else {
            let fallback = GridConfig::default().hex_size;
            tracing::warn!(hex_size, fallback, "invalid hex size, using default");
            fallback
        };
        Self {
            cells: Vec::new(),
            index: AHashMap::new(),
            hex_size,
            origin,
            buffer: GridConfig::default().materialize_buffer,
            region: None,
        }
    }

    pub fn from_config(config: &GridConfig, origin: WorldPos) -> Self {
        let mut grid = Self::new(config.hex_size, origin);
        grid.buffer = config.materialize_buffer;
        grid
    }

    pub fn hex_size(&self) -> f64 {
        self.hex_size
    }

    pub fn origin(&self) -> WorldPos {
        self.origin
    }

    /// Region of the last materialization, if any
    pub fn region(&self) -> Option<Bounds> {
        self.region
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &HexCell> {
        self.cells.iter()
    }

    pub fn world_to_hex(&self, pos: WorldPos) -> HexCoord {
        world_to_hex(pos, self.origin, self.hex_size)
    }

    pub fn hex_to_world(&self, coord: HexCoord) -> WorldPos {
        hex_to_world(coord, self.origin, self.hex_size)
    }

    /// Regenerate the grid so it covers `region`
    ///
    /// Candidates are enumerated over the region plus a buffer of hex rings;
    /// a candidate is kept when its centre lies inside the region bounds.
    /// The previous cell set is discarded. Returns the new cell count.
    pub fn materialize(&mut self, region: Bounds, terrain: &dyn TerrainSource) -> usize {
        let local_min = region.min - self.origin;
        let local_max = region.max - self.origin;

        let column_width = self.hex_size * 1.5;
        let row_height = self.hex_size * SQRT_3;

        let q_min = ((local_min.x / column_width).floor() as i32).saturating_sub(self.buffer);
        let q_max = ((local_max.x / column_width).ceil() as i32).saturating_add(self.buffer);

        let mut cells = Vec::new();
        let mut index = AHashMap::new();

        for q in q_min..=q_max {
            // Flat-top columns are offset by half a row per column
            let half_q = q as f64 / 2.0;
            let r_min = ((local_min.y / row_height - half_q).floor() as i32).saturating_sub(self.buffer);
            let r_max = ((local_max.y / row_height - half_q).ceil() as i32).saturating_add(self.buffer);

            for r in r_min..=r_max {
                let coord = HexCoord::axial(q, r);
                let center = self.hex_to_world(coord);
                if !region.contains(center) {
                    continue;
                }
                index.insert(coord, cells.len());
                cells.push(HexCell::new(
                    coord,
                    center,
                    self.hex_size,
                    terrain.terrain_at(coord, center),
                ));
            }
        }

        tracing::debug!(
            cells = cells.len(),
            q_min,
            q_max,
            "materialized hex grid"
        );

        self.cells = cells;
        self.index = index;
        self.region = Some(region);
        self.cells.len()
    }

    /// Direct keyed lookup
    pub fn cell_at(&self, coord: HexCoord) -> Option<&HexCell> {
        self.index.get(&coord).map(|&i| &self.cells[i])
    }

    fn cell_at_mut(&mut self, coord: HexCoord) -> Option<&mut HexCell> {
        match self.index.get(&coord) {
            Some(&i) => Some(&mut self.cells[i]),
            None => None,
        }
    }

    /// Cell containing a world position
    ///
    /// The rounded hex is confirmed with a point-in-polygon test; when a
    /// point near an edge rounds into the wrong cell its neighbours are
    /// checked. Points exactly on a shared edge or corner belong to no
    /// polygon and resolve to the rounded hex.
    pub fn cell_at_position(&self, pos: WorldPos) -> Option<&HexCell> {
        let coord = self.world_to_hex(pos);
        let rounded = self.cell_at(coord);
        if let Some(cell) = rounded {
            if cell.contains(pos) {
                return Some(cell);
            }
        }

        coord
            .neighbors()
            .into_iter()
            .filter_map(|n| self.cell_at(n))
            .find(|cell| cell.contains(pos))
            .or(rounded)
    }

    /// Terrain at a coordinate; unmaterialized hexes read as clear
    pub fn terrain_at(&self, coord: HexCoord) -> TerrainDescriptor {
        self.cell_at(coord).map(|c| c.terrain).unwrap_or_default()
    }

    /// Overwrite terrain of a materialized cell; false if not materialized
    pub fn set_terrain(&mut self, coord: HexCoord, terrain: TerrainDescriptor) -> bool {
        match self.cell_at_mut(coord) {
            Some(cell) => {
                cell.terrain = terrain;
                true
            }
            None => false,
        }
    }

    /// Record which unit stands in the hex at `pos`; false if off-grid
    pub fn set_occupant(&mut self, pos: WorldPos, unit: UnitId) -> bool {
        let coord = match self.cell_at_position(pos) {
            Some(cell) => cell.coord,
            None => return false,
        };
        self.clear_occupant(unit);
        match self.cell_at_mut(coord) {
            Some(cell) => {
                cell.occupant = Some(unit);
                true
            }
            None => false,
        }
    }

    /// Remove a unit from whatever hex it occupies
    pub fn clear_occupant(&mut self, unit: UnitId) {
        for cell in self.cells.iter_mut().filter(|c| c.occupant == Some(unit)) {
            cell.occupant = None;
        }
    }

    pub fn occupant_at(&self, pos: WorldPos) -> Option<UnitId> {
        self.cell_at_position(pos).and_then(|c| c.occupant)
    }
}
