//! Planar geometry helpers: point-in-polygon, region bounds, sector zones

use geo::{Area, Contains, Intersects, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TacticsError};
use crate::core::types::WorldPos;

/// Ray-casting parity test
///
/// Casts a horizontal ray from `point` and counts edge crossings. Works for
/// any simple polygon regardless of winding. Fewer than 3 vertices is never
/// inside.
pub fn point_in_polygon(point: WorldPos, vertices: &[WorldPos]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let vi = vertices[i];
        let vj = vertices[j];
        if (vi.y > point.y) != (vj.y > point.y) {
            let cross_x = (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x;
            if point.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Axis-aligned world region (the visible region a grid is built for)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: WorldPos,
    pub max: WorldPos,
}

impl Bounds {
    /// Build from any two opposite corners
    pub fn new(a: WorldPos, b: WorldPos) -> Self {
        Self {
            min: WorldPos::new(a.x.min(b.x), a.y.min(b.y)),
            max: WorldPos::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_center(center: WorldPos, half_width: f64, half_height: f64) -> Self {
        Self::new(
            WorldPos::new(center.x - half_width, center.y - half_height),
            WorldPos::new(center.x + half_width, center.y + half_height),
        )
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> WorldPos {
        WorldPos::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Inclusive containment
    pub fn contains(&self, pos: WorldPos) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }

    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            WorldPos::new(self.min.x - margin, self.min.y - margin),
            WorldPos::new(self.max.x + margin, self.max.y + margin),
        )
    }

    fn to_rect(self) -> Rect<f64> {
        Rect::new(self.min, self.max)
    }
}

/// A closed polygonal zone (fire sector, objective area, no-fire area)
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    vertices: Vec<WorldPos>,
    polygon: Polygon<f64>,
}

impl Zone {
    /// Build a zone from its outline
    pub fn new(vertices: Vec<WorldPos>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(TacticsError::InvalidGeometry(format!(
                "zone needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }

        let ring: Vec<(f64, f64)> = vertices.iter().map(|v| (v.x, v.y)).collect();
        let polygon = Polygon::new(LineString::from(ring), vec![]);

        if polygon.unsigned_area() <= f64::EPSILON {
            return Err(TacticsError::InvalidGeometry(
                "zone outline encloses no area".into(),
            ));
        }

        Ok(Self { vertices, polygon })
    }

    /// Circular sector fanning out from `apex`
    ///
    /// `heading_deg` is measured counter-clockwise from +x; `arc_deg` is the
    /// full opening angle. The arc is approximated with `segments` edges.
    pub fn sector(
        apex: WorldPos,
        heading_deg: f64,
        arc_deg: f64,
        radius: f64,
        segments: usize,
    ) -> Result<Self> {
        if !(arc_deg > 0.0 && arc_deg < 360.0) || !(radius > 0.0) {
            return Err(TacticsError::InvalidGeometry(format!(
                "sector needs 0 < arc < 360 and radius > 0 (arc {arc_deg}, radius {radius})"
            )));
        }

        let segments = segments.max(1);
        let start = heading_deg - arc_deg / 2.0;
        let mut vertices = Vec::with_capacity(segments + 2);
        vertices.push(apex);
        for i in 0..=segments {
            let angle = (start + arc_deg * i as f64 / segments as f64).to_radians();
            vertices.push(WorldPos::new(
                apex.x + radius * angle.cos(),
                apex.y + radius * angle.sin(),
            ));
        }
        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[WorldPos] {
        &self.vertices
    }

    pub fn contains_point(&self, point: WorldPos) -> bool {
        point_in_polygon(point, &self.vertices)
    }

    /// Whole-polygon containment (e.g. a hex fully inside the zone)
    pub fn contains_polygon(&self, outline: &[WorldPos]) -> bool {
        if outline.len() < 3 {
            return false;
        }
        let ring: Vec<(f64, f64)> = outline.iter().map(|v| (v.x, v.y)).collect();
        self.polygon.contains(&Polygon::new(LineString::from(ring), vec![]))
    }

    pub fn intersects_bounds(&self, bounds: &Bounds) -> bool {
        self.polygon.intersects(&bounds.to_rect())
    }

    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }
}
