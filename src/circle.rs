//! Overlap measures for two circles with radii `r1`, `r2` whose centres are
//! `d` apart. All functions return 0 for disjoint circles.

use std::f32::consts::PI;

#[inline]
pub fn area(r: f32) -> f32 {
    PI * r * r
}

#[inline]
pub fn overlaps(r1: f32, r2: f32, d: f32) -> bool {
    d < r1 + r2
}

/// Distance the circles interpenetrate along the line joining their centres.
#[inline]
pub fn penetration_depth(r1: f32, r2: f32, d: f32) -> f32 {
    (r1 + r2 - d).max(0.0)
}

/// Length of the common chord. Zero when one circle contains the other.
pub fn chord_length(r1: f32, r2: f32, d: f32) -> f32 {
    if d >= r1 + r2 || d <= (r1 - r2).abs() {
        return 0.0;
    }
    let part = (d * d + r1 * r1 - r2 * r2) / (2.0 * d);
    2.0 * (r1 * r1 - part * part).max(0.0).sqrt()
}

/// Area of the lens where the circles intersect.
///
/// Two circular segments minus the kite joining the centres to the chord ends.
/// A contained circle contributes its whole area.
pub fn intersection_area(r1: f32, r2: f32, d: f32) -> f32 {
    if d >= r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        return area(r1.min(r2));
    }

    let a1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0);
    let a2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0);
    let p1 = r1 * r1 * a1.acos();
    let p2 = r2 * r2 * a2.acos();
    let p3 = 0.5 * ((-d + r1 + r2) * (d + r1 - r2) * (d - r1 + r2) * (d + r1 + r2)).max(0.0).sqrt();

    (p1 + p2 - p3).max(0.0)
}
