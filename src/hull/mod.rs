//! Convex hull masking for bivariate grids
//!
//! Grid points outside the convex hull of the two training columns are
//! extrapolations. They are flagged, not removed; rendering code decides
//! whether to hide or gray them out.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Relative tolerance for the on-boundary test
const BOUNDARY_TOL: f64 = 1e-9;

/// Convex polygon with vertices in counter-clockwise order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexHull {
    vertices: Vec<(f64, f64)>,
    tol: f64,
}

impl ConvexHull {
    /// Hull of a point cloud (monotone chain).
    ///
    /// Returns `None` when fewer than three distinct points exist or all
    /// points are collinear, since the hull then has no interior.
    pub fn compute(points: &[(f64, f64)]) -> Option<Self> {
        let mut pts: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        pts.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        });
        pts.dedup();
        if pts.len() < 3 {
            return None;
        }

        let mut lower: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
        for &p in &pts {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
                lower.pop();
            }
            lower.push(p);
        }

        let mut upper: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
        for &p in pts.iter().rev() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
                upper.pop();
            }
            upper.push(p);
        }

        lower.pop();
        upper.pop();
        lower.extend(upper);
        if lower.len() < 3 {
            return None;
        }

        let (min_x, max_x, min_y, max_y) = pts.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(a, b, c, d), &(x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
        );
        // Non-degenerate hull, so extent > 0; `cross` scales with extent²
        let extent = (max_x - min_x).max(max_y - min_y);

        Some(Self {
            vertices: lower,
            tol: BOUNDARY_TOL * extent * extent,
        })
    }

    /// Hull vertices, counter-clockwise
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// Whether a point lies inside or on the hull
    pub fn contains(&self, p: (f64, f64)) -> bool {
        if !p.0.is_finite() || !p.1.is_finite() {
            return false;
        }
        let n = self.vertices.len();
        (0..n).all(|i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            cross(a, b, p) >= -self.tol
        })
    }

    /// Polygon area
    pub fn area(&self) -> f64 {
        let n = self.vertices.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let (x1, y1) = self.vertices[i];
                let (x2, y2) = self.vertices[(i + 1) % n];
                x1 * y2 - x2 * y1
            })
            .sum();
        0.5 * twice.abs()
    }
}

/// Indices of grid points that fall outside the hull of the training points.
///
/// Returns an empty set when the hull is undefined.
pub fn mask(grid_points: &[(f64, f64)], training_points: &[(f64, f64)]) -> BTreeSet<usize> {
    match ConvexHull::compute(training_points) {
        Some(hull) => grid_points
            .iter()
            .enumerate()
            .filter(|(_, p)| !hull.contains(**p))
            .map(|(i, _)| i)
            .collect(),
        None => BTreeSet::new(),
    }
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}
