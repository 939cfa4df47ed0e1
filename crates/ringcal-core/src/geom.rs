//! Planar point-set geometry: convex hull, minimum-area rectangle and
//! closed-polygon measures.

use nalgebra::{Point2, Vector2};

#[inline]
fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by Andrew's monotone chain.
///
/// Collinear boundary points are dropped. The hull is returned in
/// counter-clockwise order of the (x right, y up) frame, which is clockwise
/// on screen for image coordinates.
pub fn convex_hull(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut pts: Vec<Point2<f64>> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(2 * pts.len());
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Minimum-area enclosing rectangle.
///
/// `corners` run around the rectangle so that consecutive entries (and the
/// last/first pair) share an edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinAreaRect {
    pub corners: [Point2<f64>; 4],
    pub area: f64,
}

impl MinAreaRect {
    /// The two corners sharing an edge with corner `i`.
    pub fn adjacent(&self, i: usize) -> [usize; 2] {
        [(i + 3) % 4, (i + 1) % 4]
    }
}

/// Minimum-area rectangle by rotating calipers over the hull edges.
///
/// Returns `None` when the points do not span a 2D region.
pub fn min_area_rect(points: &[Point2<f64>]) -> Option<MinAreaRect> {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return None;
    }

    let mut best: Option<MinAreaRect> = None;
    for i in 0..hull.len() {
        let edge = hull[(i + 1) % hull.len()] - hull[i];
        let len = edge.norm();
        if len <= f64::EPSILON {
            continue;
        }
        let u = edge / len;
        let n = Vector2::new(-u.y, u.x);

        let (mut u_min, mut u_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut n_min, mut n_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let v = p.coords;
            let pu = v.dot(&u);
            let pn = v.dot(&n);
            u_min = u_min.min(pu);
            u_max = u_max.max(pu);
            n_min = n_min.min(pn);
            n_max = n_max.max(pn);
        }

        let area = (u_max - u_min) * (n_max - n_min);
        if best.is_none_or(|b| area < b.area) {
            let corner = |a: f64, b: f64| Point2::from(u * a + n * b);
            best = Some(MinAreaRect {
                corners: [
                    corner(u_min, n_min),
                    corner(u_max, n_min),
                    corner(u_max, n_max),
                    corner(u_min, n_max),
                ],
                area,
            });
        }
    }

    best.filter(|r| r.area > f64::EPSILON)
}

/// Absolute shoelace area of a polygon, implicitly closed.
pub fn polygon_area(points: &[Point2<f32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64)
        .sum();
    0.5 * twice.abs()
}

/// Perimeter of a polygon, implicitly closed.
pub fn polygon_perimeter(points: &[Point2<f32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| {
            let dx = (b.x - a.x) as f64;
            let dy = (b.y - a.y) as f64;
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

/// Isoperimetric ratio `4π·area / perimeter²`; 1 for a circle.
pub fn circularity(points: &[Point2<f32>]) -> f64 {
    let perimeter = polygon_perimeter(points);
    if perimeter <= f64::EPSILON {
        return 0.0;
    }
    4.0 * std::f64::consts::PI * polygon_area(points) / (perimeter * perimeter)
}

/// Perpendicular distance from `p` to the infinite line through `a` and `b`.
pub fn point_line_distance(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    let d = b - a;
    let len = d.norm();
    if len <= f64::EPSILON {
        return (p - a).norm();
    }
    cross(a, b, p).abs() / len
}
