//! Line-of-sight raycast over the hex grid
//!
//! Samples every intermediate hex between shooter and target and sums a
//! blocking weight from its terrain. Sight is clear while the total stays
//! below a fraction of the path length.
//!
//! Samples are rounded per axis, without the cube-rounding correction. A
//! sample that lands off the q + r + s = 0 plane matches no cell and counts
//! as clear. This approximation is what hit probabilities are tuned
//! against; `CombatConfig::los_cube_rounding` switches to exact rounding.

use serde::{Deserialize, Serialize};

use crate::core::config::CombatConfig;
use crate::core::types::WorldPos;
use crate::hexgrid::grid::HexGrid;
use crate::hexgrid::hex::{cube_round, lerp_cube, HexCoord};

/// Outcome of a raycast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LosReport {
    pub clear: bool,
    /// Hex distance between the endpoints
    pub path_length: u32,
    pub blocking_total: u32,
    pub threshold: u32,
}

/// Cube triples sampled between two hexes, endpoints excluded
///
/// Without `cube_rounding` the triples may violate q + r + s = 0.
pub fn sample_path(start: HexCoord, end: HexCoord, cube_rounding: bool) -> Vec<(i32, i32, i32)> {
    let n = start.distance(&end);
    (1..n)
        .map(|i| {
            let (fq, fr, fs) = lerp_cube(start, end, i as f64 / n as f64);
            if cube_rounding {
                let c = cube_round(fq, fr, fs);
                (c.q(), c.r(), c.s())
            } else {
                (fq.round() as i32, fr.round() as i32, fs.round() as i32)
            }
        })
        .collect()
}

/// Blocking threshold for a path of `path_length` hexes
pub fn blocking_threshold(path_length: u32, block_fraction: f64) -> u32 {
    (block_fraction * path_length as f64).floor() as u32
}

/// Trace line of sight between two hexes
pub fn trace_hexes(grid: &HexGrid, start: HexCoord, end: HexCoord, config: &CombatConfig) -> LosReport {
    let path_length = start.distance(&end);
    let threshold = blocking_threshold(path_length, config.los_block_fraction);

    if path_length <= 1 && config.los_adjacent_clear {
        return LosReport {
            clear: true,
            path_length,
            blocking_total: 0,
            threshold,
        };
    }

    let blocking_total: u32 = sample_path(start, end, config.los_cube_rounding)
        .into_iter()
        .filter_map(|(q, r, s)| HexCoord::new(q, r, s))
        .map(|coord| grid.terrain_at(coord).los_blocking_weight())
        .sum();

    LosReport {
        clear: blocking_total < threshold,
        path_length,
        blocking_total,
        threshold,
    }
}

/// Trace line of sight between two world positions
pub fn trace(grid: &HexGrid, from: WorldPos, to: WorldPos, config: &CombatConfig) -> LosReport {
    trace_hexes(grid, grid.world_to_hex(from), grid.world_to_hex(to), config)
}
