//! Reading-order reconstruction for the unordered blocks of one page.
//!
//! Blocks are sorted by their top edge, greedily grouped into rows, and each
//! row is then read left to right. A block joins the current row when its
//! vertical center falls inside the band of the row's first block, which keeps
//! list markers (`a)`, bullets) next to the text they label even when their
//! boxes sit slightly higher or lower.

use crate::types::RawBlock;

/// The three coordinates the sorter looks at. Missing or non-finite geometry
/// collapses to all zeros, so such blocks sort first.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geometry {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Geometry {
    pub fn center_y(&self) -> f32 { (self.top + self.bottom) / 2.0 }

    /// Whether `other`'s vertical center lies within this box's `[top, bottom]` band.
    pub fn holds_center_of(&self, other: &Geometry) -> bool {
        let c = other.center_y();
        self.top <= c && c <= self.bottom
    }
}

impl RawBlock {
    pub fn geometry(&self) -> Geometry {
        let Some(poly) = &self.bounding_poly else { return Geometry::default() };
        let mut top = f32::INFINITY;
        let mut bottom = f32::NEG_INFINITY;
        let mut left = f32::INFINITY;
        for v in poly.normalized_vertices.iter().filter(|v| v.x.is_finite() && v.y.is_finite()) {
            top = top.min(v.y);
            bottom = bottom.max(v.y);
            left = left.min(v.x);
        }
        if !top.is_finite() || !bottom.is_finite() || !left.is_finite() {
            return Geometry::default();
        }
        Geometry { top, bottom, left }
    }
}

/// Generic row-major ordering over anything that can report its geometry.
pub fn sort_by_geometry<T, F>(items: Vec<T>, geometry: F) -> Vec<T>
where
    F: Fn(&T) -> Geometry,
{
    let mut keyed: Vec<(Geometry, T)> = items.into_iter().map(|it| (geometry(&it), it)).collect();
    // Stable: equal tops keep their input order.
    keyed.sort_by(|a, b| a.0.top.total_cmp(&b.0.top));

    let mut ordered = Vec::with_capacity(keyed.len());
    let mut row: Vec<(Geometry, T)> = Vec::new();
    for item in keyed {
        let joins = row.first().is_some_and(|(reference, _)| reference.holds_center_of(&item.0));
        if !joins && !row.is_empty() {
            flush_row(&mut row, &mut ordered);
        }
        row.push(item);
    }
    flush_row(&mut row, &mut ordered);
    ordered
}

fn flush_row<T>(row: &mut Vec<(Geometry, T)>, out: &mut Vec<T>) {
    row.sort_by(|a, b| a.0.left.total_cmp(&b.0.left));
    out.extend(row.drain(..).map(|(_, it)| it));
}

/// Reading order for one page's blocks.
pub fn sort_blocks(blocks: &[RawBlock]) -> Vec<&RawBlock> {
    sort_by_geometry(blocks.iter().collect(), |b| b.geometry())
}
