//! Hex coordinate system (cube coordinates, flat-topped layout)
//!
//! Cube coordinates (q, r, s) with q + r + s = 0. Axial (q, r) is the
//! storage form; s is kept alongside so the invariant can be checked on
//! construction and the canonical "q,r,s" key stays cheap to produce.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::types::WorldPos;
use crate::hexgrid::constants::SQRT_3;

/// Cube hex coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexCoord {
    q: i32,
    r: i32,
    s: i32,
}

impl HexCoord {
    pub const ORIGIN: HexCoord = HexCoord { q: 0, r: 0, s: 0 };

    /// Build from a full cube triple; `None` if q + r + s != 0
    pub fn new(q: i32, r: i32, s: i32) -> Option<Self> {
        if q + r + s == 0 {
            Some(Self { q, r, s })
        } else {
            None
        }
    }

    /// Build from axial (q, r); s is derived
    pub fn axial(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    pub fn q(&self) -> i32 {
        self.q
    }

    pub fn r(&self) -> i32 {
        self.r
    }

    pub fn s(&self) -> i32 {
        self.s
    }

    /// Canonical string key "q,r,s"
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Number of hex steps between two coordinates
    pub fn distance(&self, other: &Self) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s - other.s).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Get all 6 neighboring hex coordinates
    pub fn neighbors(&self) -> [HexCoord; 6] {
        [
            HexCoord::axial(self.q + 1, self.r),
            HexCoord::axial(self.q + 1, self.r - 1),
            HexCoord::axial(self.q, self.r - 1),
            HexCoord::axial(self.q - 1, self.r),
            HexCoord::axial(self.q - 1, self.r + 1),
            HexCoord::axial(self.q, self.r + 1),
        ]
    }

    /// Get hex coordinates in a line from self to other (inclusive),
    /// every sample cube-rounded
    pub fn line_to(&self, other: &Self) -> Vec<HexCoord> {
        let n = self.distance(other);
        if n == 0 {
            return vec![*self];
        }

        (0..=n)
            .map(|i| {
                let (fq, fr, fs) = lerp_cube(*self, *other, i as f64 / n as f64);
                cube_round(fq, fr, fs)
            })
            .collect()
    }

    /// Get all hexes within range (inclusive)
    pub fn hexes_in_range(&self, range: u32) -> Vec<HexCoord> {
        let range = range as i32;
        let mut results = Vec::new();
        for q in -range..=range {
            for r in (-range).max(-q - range)..=range.min(-q + range) {
                results.push(HexCoord::axial(self.q + q, self.r + r));
            }
        }
        results
    }
}

impl Default for HexCoord {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.q, self.r, self.s)
    }
}

/// Failure to parse a "q,r,s" key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex key {0:?}")]
pub struct ParseHexKeyError(pub String);

impl FromStr for HexCoord {
    type Err = ParseHexKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(ParseHexKeyError(s.to_string()));
        }

        let mut values = [0i32; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| ParseHexKeyError(s.to_string()))?;
        }

        HexCoord::new(values[0], values[1], values[2]).ok_or_else(|| ParseHexKeyError(s.to_string()))
    }
}

impl TryFrom<String> for HexCoord {
    type Error = ParseHexKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexCoord> for String {
    fn from(coord: HexCoord) -> Self {
        coord.key()
    }
}

/// Linear interpolation between two coordinates in fractional cube space
pub fn lerp_cube(a: HexCoord, b: HexCoord, t: f64) -> (f64, f64, f64) {
    (
        a.q as f64 + (b.q - a.q) as f64 * t,
        a.r as f64 + (b.r - a.r) as f64 * t,
        a.s as f64 + (b.s - a.s) as f64 * t,
    )
}

/// Round fractional cube coordinates to the containing hex
///
/// Each axis is rounded on its own, then the axis with the largest rounding
/// error is rebuilt from the other two so q + r + s = 0 holds exactly.
pub fn cube_round(q: f64, r: f64, s: f64) -> HexCoord {
    let mut rq = q.round();
    let mut rr = r.round();
    let mut rs = s.round();

    let q_diff = (rq - q).abs();
    let r_diff = (rr - r).abs();
    let s_diff = (rs - s).abs();

    if q_diff > r_diff && q_diff > s_diff {
        rq = -rr - rs;
    } else if r_diff > s_diff {
        rr = -rq - rs;
    } else {
        rs = -rq - rr;
    }

    HexCoord {
        q: rq as i32,
        r: rr as i32,
        s: rs as i32,
    }
}

/// World position to hex (inverse flat-top axial transform + cube rounding)
pub fn world_to_hex(position: WorldPos, origin: WorldPos, hex_size: f64) -> HexCoord {
    let local = position - origin;
    let q = (2.0 / 3.0 * local.x) / hex_size;
    let r = (-1.0 / 3.0 * local.x + SQRT_3 / 3.0 * local.y) / hex_size;
    cube_round(q, r, -q - r)
}

/// Hex centre in world space (forward flat-top axial transform)
pub fn hex_to_world(coord: HexCoord, origin: WorldPos, hex_size: f64) -> WorldPos {
    let x = hex_size * 1.5 * coord.q as f64;
    let y = hex_size * (SQRT_3 / 2.0 * coord.q as f64 + SQRT_3 * coord.r as f64);
    origin + WorldPos::new(x, y)
}

/// The six corners of a flat-topped hex, at 60°·i
pub fn hex_corners(center: WorldPos, hex_size: f64) -> [WorldPos; 6] {
    std::array::from_fn(|i| {
        let angle = (60.0 * i as f64).to_radians();
        WorldPos::new(
            center.x + hex_size * angle.cos(),
            center.y + hex_size * angle.sin(),
        )
    })
}

/// Hex distance as a free function
pub fn hex_distance(a: HexCoord, b: HexCoord) -> u32 {
    a.distance(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_coord_creation() {
        let coord = HexCoord::axial(5, 10);
        assert_eq!(coord.q(), 5);
        assert_eq!(coord.r(), 10);
        assert_eq!(coord.s(), -15);
    }

    #[test]
    fn test_invalid_cube_rejected() {
        assert!(HexCoord::new(1, 1, 1).is_none());
        assert!(HexCoord::new(1, -1, 0).is_some());
    }

    #[test]
    fn test_hex_distance_same() {
        let a = HexCoord::axial(3, -2);
        assert_eq!(a.distance(&a), 0);
    }

    #[test]
    fn test_hex_distance_adjacent() {
        let a = HexCoord::ORIGIN;
        for n in a.neighbors() {
            assert_eq!(a.distance(&n), 1);
        }
    }

    #[test]
    fn test_hex_distance_formula() {
        let a = HexCoord::axial(0, 0);
        let b = HexCoord::axial(3, -5);
        // |3| + |-5| + |2| = 10, halved
        assert_eq!(hex_distance(a, b), 5);
    }

    #[test]
    fn test_key_round_trip() {
        let coord = HexCoord::axial(-4, 7);
        assert_eq!(coord.key(), "-4,7,-3");
        assert_eq!("-4,7,-3".parse::<HexCoord>().unwrap(), coord);
    }

    #[test]
    fn test_key_rejects_broken_invariant() {
        assert!("1,1,1".parse::<HexCoord>().is_err());
        assert!("1,2".parse::<HexCoord>().is_err());
        assert!("a,b,c".parse::<HexCoord>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_key() {
        let coord = HexCoord::axial(2, -1);
        let json = serde_json::to_string(&coord).unwrap();
        assert_eq!(json, "\"2,-1,-1\"");
        let back: HexCoord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coord);
        assert!(serde_json::from_str::<HexCoord>("\"1,1,1\"").is_err());
    }

    #[test]
    fn test_cube_round_corrects_largest_error() {
        // q rounds furthest (0.4 -> 0), so q is rebuilt from r and s
        let coord = cube_round(0.4, 0.3, -0.7);
        assert_eq!(coord, HexCoord::axial(1, 0));
        assert_eq!(coord.q() + coord.r() + coord.s(), 0);
    }

    #[test]
    fn test_world_hex_round_trip_at_centres() {
        let origin = WorldPos::new(250.0, -40.0);
        for coord in HexCoord::ORIGIN.hexes_in_range(4) {
            let center = hex_to_world(coord, origin, 100.0);
            assert_eq!(world_to_hex(center, origin, 100.0), coord);
        }
    }

    #[test]
    fn test_corners_are_flat_topped() {
        let corners = hex_corners(WorldPos::ORIGIN, 10.0);
        assert!((corners[0].x - 10.0).abs() < 1e-9);
        assert!(corners[0].y.abs() < 1e-9);
        // Top edge is horizontal: corners 1 and 2 share y
        assert!((corners[1].y - corners[2].y).abs() < 1e-9);
        for corner in corners {
            assert!((corner.length() - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_adjacent_centres_are_sqrt3_apart() {
        let a = hex_to_world(HexCoord::ORIGIN, WorldPos::ORIGIN, 10.0);
        let b = hex_to_world(HexCoord::axial(1, 0), WorldPos::ORIGIN, 10.0);
        assert!((a.distance(&b) - 10.0 * SQRT_3).abs() < 1e-9);
    }

    #[test]
    fn test_hex_line() {
        let a = HexCoord::axial(0, 0);
        let b = HexCoord::axial(3, 0);
        let line = a.line_to(&b);
        assert_eq!(line.len(), 4);
        assert_eq!(line[0], a);
        assert_eq!(line[3], b);
    }

    #[test]
    fn test_hexes_in_range() {
        assert_eq!(HexCoord::ORIGIN.hexes_in_range(1).len(), 7);
        assert_eq!(HexCoord::ORIGIN.hexes_in_range(2).len(), 19);
    }
}
