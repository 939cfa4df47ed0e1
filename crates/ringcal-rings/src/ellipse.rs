use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Ellipse described as a rotated rectangle.
///
/// `height` is the full axis length along the direction `angle_deg`
/// (measured from +x towards +y in image coordinates), `width` the full
/// axis length perpendicular to it. Ellipses produced by
/// [`crate::conic_to_ellipse`] put the major axis along `angle_deg`, so
/// `width` is the minor diameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotatedEllipse {
    pub center: Point2<f32>,
    pub width: f32,
    pub height: f32,
    pub angle_deg: f32,
}

impl RotatedEllipse {
    /// Circle of the given radius.
    pub fn circle(center: Point2<f32>, radius: f32) -> Self {
        Self {
            center,
            width: 2.0 * radius,
            height: 2.0 * radius,
            angle_deg: 0.0,
        }
    }

    /// `width * height`, the area of the enclosing rotated rectangle.
    #[inline]
    pub fn bounding_area(&self) -> f32 {
        self.width * self.height
    }

    /// Point on the boundary at parameter `t` (radians).
    pub fn point_at(&self, t: f64) -> Point2<f64> {
        let theta = (self.angle_deg as f64).to_radians();
        let (s, c) = theta.sin_cos();
        let a = self.height as f64 / 2.0;
        let b = self.width as f64 / 2.0;
        let (x, y) = (a * t.cos(), b * t.sin());
        Point2::new(
            self.center.x as f64 + c * x - s * y,
            self.center.y as f64 + s * x + c * y,
        )
    }

    /// `n` boundary samples, evenly spaced in the parameter.
    pub fn sample_points(&self, n: usize) -> Vec<Point2<f32>> {
        (0..n)
            .map(|k| {
                let p = self.point_at(k as f64 * std::f64::consts::TAU / n as f64);
                Point2::new(p.x as f32, p.y as f32)
            })
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
            && self.center.x.is_finite()
            && self.center.y.is_finite()
    }
}

/// One fitted boundary ellipse with the contour it was fitted to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EllipseCandidate {
    pub ellipse: RotatedEllipse,
    #[serde(skip)]
    pub points: Vec<Point2<f32>>,
    /// Position of the source contour in detection order.
    pub detection_index: usize,
}

impl EllipseCandidate {
    pub fn new(ellipse: RotatedEllipse, points: Vec<Point2<f32>>, detection_index: usize) -> Self {
        Self {
            ellipse,
            points,
            detection_index,
        }
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.ellipse.center
    }
}
