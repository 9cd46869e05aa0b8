//! Geometry primitives over normalized frame coordinates.
//!
//! Everything operates in the unit square: the detection stage divides pixel
//! centroids by the working frame size before they get here. Door lines are
//! oriented; the stored endpoint order fixes the line normal, which in turn
//! decides which side of the doorway counts as "living".

use serde::{Deserialize, Serialize};

/// A point in normalized frame coordinates. Serializes as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f64, pub f64);

/// An oriented line segment. Serializes as `[[x1, y1], [x2, y2]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line(pub Point, pub Point);

/// An ordered vertex loop. Serializes as `[[x, y], ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon(pub Vec<Point>);

/// Which way a centroid moved across a door line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    IntoLiving,
    IntoRoom,
}

/// Ray cast along +x: count edges that straddle the ray at height `p.y`
/// with the crossing to the right of `p.x`. An exactly horizontal edge
/// never straddles, so the fallback divisor below is never reached; it
/// only guards the division syntactically.
pub fn point_in_polygon(p: Point, poly: &Polygon) -> bool {
    let Point(x, y) = p;
    let verts = &poly.0;
    let mut inside = false;

    for i in 0..verts.len() {
        let Point(x1, y1) = verts[i];
        let Point(x2, y2) = verts[(i + 1) % verts.len()];

        if (y1 > y) != (y2 > y) {
            let dy = y2 - y1;
            let dy = if dy == 0.0 { 1e-6 } else { dy };
            if x < (x2 - x1) * (y - y1) / dy + x1 {
                inside = !inside;
            }
        }
    }
    inside
}

/// Detect whether the centroid crossed the door line between two frames.
///
/// The line is taken in implicit form `A*x + B*y + C = 0`. Returns `None`
/// when either point sits exactly on the line or both lie on the same side.
/// Otherwise the sign of the movement vector against the line normal
/// `(A, B)` picks the direction.
pub fn line_crossed(prev: Point, curr: Point, line: Line) -> Option<Direction> {
    let Line(Point(x1, y1), Point(x2, y2)) = line;

    let a = y1 - y2;
    let b = x2 - x1;
    let c = x1 * y2 - x2 * y1;

    let prev_side = a * prev.0 + b * prev.1 + c;
    let curr_side = a * curr.0 + b * curr.1 + c;

    if prev_side == 0.0 || curr_side == 0.0 || prev_side * curr_side > 0.0 {
        return None;
    }

    let movement = (curr.0 - prev.0, curr.1 - prev.1);
    let dot = movement.0 * a + movement.1 * b;
    if dot > 0.0 {
        Some(Direction::IntoLiving)
    } else {
        Some(Direction::IntoRoom)
    }
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn segments_cross(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);
    o1 * o2 < 0.0 && o3 * o4 < 0.0
}

impl Polygon {
    /// Reject degenerate or self-intersecting vertex loops.
    ///
    /// The ray cast assumes a simple polygon; a crossed loop would silently
    /// flip the presence parity, so startup fails loudly instead.
    pub fn validate(&self) -> crate::Result<()> {
        let n = self.0.len();
        if n < 3 {
            return Err(crate::HomesightError::Config(format!(
                "polygon needs at least 3 vertices, got {}",
                n
            )));
        }
        for i in 0..n {
            for j in i + 1..n {
                // Edges sharing a vertex always "touch"; only test disjoint pairs.
                if j == i || (j + 1) % n == i || (i + 1) % n == j {
                    continue;
                }
                let (p1, p2) = (self.0[i], self.0[(i + 1) % n]);
                let (q1, q2) = (self.0[j], self.0[(j + 1) % n]);
                if segments_cross(p1, p2, q1, q2) {
                    return Err(crate::HomesightError::SelfIntersectingPolygon(i, j));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn living_polygon() -> Polygon {
        Polygon(vec![
            Point(0.2, 0.35),
            Point(0.8, 0.35),
            Point(0.85, 0.9),
            Point(0.15, 0.9),
        ])
    }

    fn bed_line() -> Line {
        Line(Point(0.15, 0.30), Point(0.35, 0.30))
    }

    #[test]
    fn test_point_in_polygon_basic() {
        let poly = living_polygon();
        assert!(point_in_polygon(Point(0.5, 0.6), &poly));
        assert!(!point_in_polygon(Point(0.5, 0.1), &poly));
        assert!(!point_in_polygon(Point(0.05, 0.6), &poly));
    }

    #[test]
    fn test_point_in_polygon_rotation_invariant() {
        let base = living_polygon();
        let samples = [
            Point(0.5, 0.6),
            Point(0.25, 0.4),
            Point(0.5, 0.1),
            Point(0.9, 0.9),
        ];
        for rot in 0..base.0.len() {
            let mut verts = base.0.clone();
            verts.rotate_left(rot);
            let rotated = Polygon(verts);
            for &p in &samples {
                assert_eq!(
                    point_in_polygon(p, &base),
                    point_in_polygon(p, &rotated),
                    "rotation {} changed answer for {:?}",
                    rot,
                    p
                );
            }
        }
    }

    #[test]
    fn test_point_in_polygon_reversal_invariant() {
        let base = living_polygon();
        let mut verts = base.0.clone();
        verts.reverse();
        let reversed = Polygon(verts);
        for &p in &[Point(0.5, 0.6), Point(0.5, 0.1), Point(0.2, 0.36)] {
            assert_eq!(point_in_polygon(p, &base), point_in_polygon(p, &reversed));
        }
    }

    #[test]
    fn test_line_crossed_directions() {
        // Downward through the bedroom door line is "into living".
        let dir = line_crossed(Point(0.25, 0.20), Point(0.25, 0.40), bed_line());
        assert_eq!(dir, Some(Direction::IntoLiving));

        // Reversed movement flips the direction.
        let dir = line_crossed(Point(0.25, 0.40), Point(0.25, 0.20), bed_line());
        assert_eq!(dir, Some(Direction::IntoRoom));
    }

    #[test]
    fn test_line_crossed_same_side_none() {
        assert_eq!(
            line_crossed(Point(0.25, 0.10), Point(0.30, 0.20), bed_line()),
            None
        );
        assert_eq!(
            line_crossed(Point(0.25, 0.40), Point(0.30, 0.50), bed_line()),
            None
        );
    }

    #[test]
    fn test_line_crossed_on_line_none() {
        // A point exactly on the line produces no crossing either way.
        assert_eq!(
            line_crossed(Point(0.25, 0.30), Point(0.25, 0.40), bed_line()),
            None
        );
        assert_eq!(
            line_crossed(Point(0.25, 0.20), Point(0.25, 0.30), bed_line()),
            None
        );
    }

    #[test]
    fn test_line_crossed_antisymmetric() {
        let line = Line(Point(0.1, 0.8), Point(0.6, 0.2));
        let (a, b) = (Point(0.1, 0.1), Point(0.7, 0.9));
        let fwd = line_crossed(a, b, line);
        let rev = line_crossed(b, a, line);
        assert!(fwd.is_some());
        assert!(rev.is_some());
        assert_ne!(fwd, rev);
    }

    #[test]
    fn test_horizontal_edges_no_crossing() {
        // Degenerate flat "polygon": every edge horizontal. The ray cast
        // must not divide by zero and nothing is inside.
        let flat = Polygon(vec![Point(0.1, 0.5), Point(0.5, 0.5), Point(0.9, 0.5)]);
        assert!(!point_in_polygon(Point(0.5, 0.5), &flat));
        assert!(!point_in_polygon(Point(0.5, 0.4), &flat));
    }

    #[test]
    fn test_polygon_validate() {
        assert!(living_polygon().validate().is_ok());

        let bowtie = Polygon(vec![
            Point(0.0, 0.0),
            Point(1.0, 1.0),
            Point(1.0, 0.0),
            Point(0.0, 1.0),
        ]);
        assert!(bowtie.validate().is_err());

        let degenerate = Polygon(vec![Point(0.0, 0.0), Point(1.0, 1.0)]);
        assert!(degenerate.validate().is_err());
    }
}
