//! Convex hulls of point sets (Andrew's monotone chain).

use crate::body::cross;
use ultraviolet::Vec2;

/// Returns the hull vertices in counter-clockwise order, starting from the
/// lexicographically smallest point. Collinear and duplicate points are
/// dropped. Fewer than three distinct points come back as-is (deduplicated).
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    let mut sorted: Vec<Vec2> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Vec2> = Vec::with_capacity(sorted.len() * 2);

    // Lower hull.
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 1] - hull[hull.len() - 2], p - hull[hull.len() - 2]) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }

    // Upper hull.
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(hull[hull.len() - 1] - hull[hull.len() - 2], p - hull[hull.len() - 2]) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }

    // The last point repeats the first.
    hull.pop();
    hull
}

/// A convex polygon with counter-clockwise vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvexHull {
    vertices: Vec<Vec2>,
}

impl ConvexHull {
    pub fn from_points(points: &[Vec2]) -> Self {
        Self {
            vertices: convex_hull(points),
        }
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Shoelace area. Zero for degenerate hulls.
    pub fn area(&self) -> f32 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        0.5 * self.edges().map(|(a, b)| cross(a, b)).sum::<f32>()
    }

    pub fn perimeter(&self) -> f32 {
        match self.vertices.len() {
            0 | 1 => 0.0,
            2 => 2.0 * (self.vertices[1] - self.vertices[0]).mag(),
            _ => self.edges().map(|(a, b)| (b - a).mag()).sum(),
        }
    }

    /// Area centroid. Falls back to the vertex mean for degenerate hulls.
    pub fn centroid(&self) -> Option<Vec2> {
        if self.vertices.is_empty() {
            return None;
        }
        let area = self.area();
        if area <= f32::EPSILON {
            let sum = self.vertices.iter().fold(Vec2::zero(), |acc, v| acc + *v);
            return Some(sum / self.vertices.len() as f32);
        }
        let weighted = self
            .edges()
            .fold(Vec2::zero(), |acc, (a, b)| acc + (a + b) * cross(a, b));
        Some(weighted / (6.0 * area))
    }

    /// Inclusive of the boundary.
    pub fn contains(&self, point: Vec2) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        self.edges().all(|(a, b)| cross(b - a, point - a) >= 0.0)
    }

    /// Returns `(min, max)` corners.
    pub fn bounding_box(&self) -> Option<(Vec2, Vec2)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (
                Vec2::new(min.x.min(v.x), min.y.min(v.y)),
                Vec2::new(max.x.max(v.x), max.y.max(v.y)),
            )
        }))
    }
}
