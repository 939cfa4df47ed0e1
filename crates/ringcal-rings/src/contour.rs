//! Sub-pixel iso-contours and ring-boundary candidate selection.

use std::collections::HashMap;

use image::{ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use nalgebra::Point2;
use ringcal_core::geom::circularity;
use ringcal_core::{otsu_threshold, FloatImage, GrayImageView};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::ellipse::EllipseCandidate;
use crate::fit::EllipseFitter;

type LumaF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Closed sub-pixel contours from a grayscale image.
pub trait SubpixelContourExtractor {
    fn extract(&self, src: &GrayImageView<'_>) -> Vec<Vec<Point2<f32>>>;
}

/// Gray level at which boundaries are traced.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsoLevel {
    /// Mid-gray of the nearby edges: the local mean of the smoothed image
    /// weighted by squared gradient magnitude. Follows uneven lighting.
    Local,
    /// One Otsu level for the whole image.
    Otsu,
    Fixed(f32),
}

/// Marching-squares iso-contours of the Gaussian-smoothed image.
///
/// Pixel `(x, y)` is sampled at coordinate `(x, y)`. Gradients are Sobel
/// responses of the smoothed image, so the thresholds are on the same
/// scale as Canny thresholds. Only closed contours whose gradient along the
/// curve passes both thresholds are returned.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoContourExtractor {
    /// Gaussian smoothing sigma in pixels.
    pub sigma: f32,
    /// Minimum mean Sobel magnitude along a contour.
    pub low_threshold: f32,
    /// Minimum peak Sobel magnitude along a contour.
    pub high_threshold: f32,
    pub level: IsoLevel,
    /// Spatial sigma of the [`IsoLevel::Local`] weighted mean.
    pub level_sigma: f32,
}

impl Default for IsoContourExtractor {
    fn default() -> Self {
        Self {
            sigma: 1.5,
            low_threshold: 20.0,
            high_threshold: 40.0,
            level: IsoLevel::Local,
            level_sigma: 5.0,
        }
    }
}

impl SubpixelContourExtractor for IsoContourExtractor {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(w = src.width, h = src.height))
    )]
    fn extract(&self, src: &GrayImageView<'_>) -> Vec<Vec<Point2<f32>>> {
        if src.width < 2 || src.height < 2 || !src.is_consistent() {
            return Vec::new();
        }
        let smooth = smooth_gray(src, self.sigma);
        let grad = sobel_magnitude(&smooth);
        let field = match self.level {
            IsoLevel::Local => {
                // below this weight no edge is near enough to define a level
                let min_weight = 0.25 * self.low_threshold * self.low_threshold;
                local_level_field(&smooth, &grad, self.level_sigma, min_weight)
            }
            IsoLevel::Otsu => offset_field(&smooth, otsu_threshold(src.data) as f32 + 0.5),
            IsoLevel::Fixed(level) => offset_field(&smooth, level),
        };

        let contours = iso_contours(&field, 0.0);
        let total = contours.len();
        let kept: Vec<Vec<Point2<f32>>> = contours
            .into_iter()
            .filter(|c| passes_gradient(&grad, c, self.low_threshold, self.high_threshold))
            .collect();
        log::debug!(
            "{:?} iso level: {} closed contours, {} pass gradient check",
            self.level,
            total,
            kept.len()
        );
        kept
    }
}

fn smooth_gray(src: &GrayImageView<'_>, sigma: f32) -> LumaF32 {
    let img = LumaF32::from_fn(src.width as u32, src.height as u32, |x, y| {
        Luma([src.get(x as usize, y as usize) as f32])
    });
    if sigma > 0.0 && sigma.is_finite() {
        gaussian_blur_f32(&img, sigma)
    } else {
        img
    }
}

/// Sobel gradient magnitude of the smoothed image.
fn sobel_magnitude(smooth: &LumaF32) -> FloatImage {
    let (w, h) = smooth.dimensions();
    let gray = image::GrayImage::from_fn(w, h, |x, y| {
        Luma([smooth.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    });
    let gx = horizontal_sobel(&gray);
    let gy = vertical_sobel(&gray);
    FloatImage {
        width: w as usize,
        height: h as usize,
        data: gx
            .as_raw()
            .iter()
            .zip(gy.as_raw())
            .map(|(&a, &b)| (a as f32).hypot(b as f32))
            .collect(),
    }
}

fn offset_field(smooth: &LumaF32, level: f32) -> FloatImage {
    let (w, h) = smooth.dimensions();
    FloatImage {
        width: w as usize,
        height: h as usize,
        data: smooth.as_raw().iter().map(|&v| v - level).collect(),
    }
}

/// `smooth - level(x, y)` with the gradient-weighted local level; `NaN`
/// where the blurred weight is below `min_weight`.
fn local_level_field(
    smooth: &LumaF32,
    grad: &FloatImage,
    level_sigma: f32,
    min_weight: f32,
) -> FloatImage {
    let (w, h) = smooth.dimensions();
    let weight = LumaF32::from_fn(w, h, |x, y| {
        let g = grad.get(x as usize, y as usize);
        Luma([g * g])
    });
    let weighted = LumaF32::from_fn(w, h, |x, y| {
        Luma([weight.get_pixel(x, y)[0] * smooth.get_pixel(x, y)[0]])
    });
    let level_sigma = level_sigma.max(0.5);
    let num = gaussian_blur_f32(&weighted, level_sigma);
    let den = gaussian_blur_f32(&weight, level_sigma);

    let data = smooth
        .as_raw()
        .iter()
        .zip(num.as_raw().iter().zip(den.as_raw()))
        .map(|(&v, (&n, &d))| if d > min_weight { v - n / d } else { f32::NAN })
        .collect();
    FloatImage {
        width: w as usize,
        height: h as usize,
        data,
    }
}

fn passes_gradient(grad: &FloatImage, contour: &[Point2<f32>], low: f32, high: f32) -> bool {
    if contour.is_empty() {
        return false;
    }
    let (sum, max) = contour.iter().fold((0.0f32, 0.0f32), |(s, m), p| {
        let g = grad.sample_bilinear(p.x, p.y);
        (s + g, m.max(g))
    });
    sum / contour.len() as f32 >= low && max >= high
}

/// Edge ids: horizontal edge from `(x, y)` to `(x+1, y)` is `y*w + x`,
/// vertical edge from `(x, y)` to `(x, y+1)` is `w*h + y*w + x`.
struct EdgeGrid<'a> {
    img: &'a FloatImage,
    level: f32,
}

impl EdgeGrid<'_> {
    fn horizontal(&self, x: usize, y: usize) -> usize {
        y * self.img.width + x
    }

    fn vertical(&self, x: usize, y: usize) -> usize {
        self.img.width * self.img.height + y * self.img.width + x
    }

    /// Level crossing on an edge, linearly interpolated.
    fn crossing(&self, id: usize) -> Point2<f32> {
        let w = self.img.width;
        let n = w * self.img.height;
        let (x, y, dx, dy) = if id < n {
            (id % w, id / w, 1, 0)
        } else {
            ((id - n) % w, (id - n) / w, 0, 1)
        };
        let v0 = self.img.get(x, y);
        let v1 = self.img.get(x + dx, y + dy);
        let t = if (v1 - v0).abs() > f32::EPSILON {
            ((self.level - v0) / (v1 - v0)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        Point2::new(x as f32 + t * dx as f32, y as f32 + t * dy as f32)
    }
}

/// Closed iso-contours at `level`, each as an ordered point loop.
///
/// Cells with a non-finite corner are skipped, so curves entering them stay
/// open and are dropped.
pub fn iso_contours(img: &FloatImage, level: f32) -> Vec<Vec<Point2<f32>>> {
    let (w, h) = (img.width, img.height);
    if w < 2 || h < 2 {
        return Vec::new();
    }
    let grid = EdgeGrid { img, level };

    let mut segments: Vec<(usize, usize)> = Vec::new();
    for y in 0..h - 1 {
        for x in 0..w - 1 {
            let v00 = img.get(x, y);
            let v10 = img.get(x + 1, y);
            let v11 = img.get(x + 1, y + 1);
            let v01 = img.get(x, y + 1);
            if !(v00.is_finite() && v10.is_finite() && v11.is_finite() && v01.is_finite()) {
                continue;
            }
            let case = (v00 > level) as u8
                | ((v10 > level) as u8) << 1
                | ((v11 > level) as u8) << 2
                | ((v01 > level) as u8) << 3;

            let top = grid.horizontal(x, y);
            let bottom = grid.horizontal(x, y + 1);
            let left = grid.vertical(x, y);
            let right = grid.vertical(x + 1, y);
            let center_inside = 0.25 * (v00 + v10 + v11 + v01) > level;

            match case {
                0 | 15 => {}
                1 | 14 => segments.push((left, top)),
                2 | 13 => segments.push((top, right)),
                3 | 12 => segments.push((left, right)),
                4 | 11 => segments.push((right, bottom)),
                6 | 9 => segments.push((top, bottom)),
                7 | 8 => segments.push((left, bottom)),
                5 => {
                    if center_inside {
                        segments.push((top, right));
                        segments.push((bottom, left));
                    } else {
                        segments.push((left, top));
                        segments.push((right, bottom));
                    }
                }
                10 => {
                    if center_inside {
                        segments.push((left, top));
                        segments.push((right, bottom));
                    } else {
                        segments.push((top, right));
                        segments.push((bottom, left));
                    }
                }
                _ => unreachable!("4-bit case"),
            }
        }
    }

    let mut by_edge: HashMap<usize, Vec<usize>> = HashMap::with_capacity(2 * segments.len());
    for (i, &(a, b)) in segments.iter().enumerate() {
        by_edge.entry(a).or_default().push(i);
        by_edge.entry(b).or_default().push(i);
    }

    let mut visited = vec![false; segments.len()];
    let mut contours = Vec::new();
    for start in 0..segments.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let (first, mut edge) = segments[start];
        let mut chain = vec![first];
        let mut seg = start;

        let closed = loop {
            if edge == first {
                break true;
            }
            chain.push(edge);
            let next = by_edge
                .get(&edge)
                .and_then(|segs| segs.iter().copied().find(|&s| s != seg));
            let Some(next) = next else {
                break false;
            };
            if visited[next] {
                break false;
            }
            visited[next] = true;
            let (a, b) = segments[next];
            edge = if a == edge { b } else { a };
            seg = next;
        };

        if closed && chain.len() >= 3 {
            contours.push(chain.into_iter().map(|e| grid.crossing(e)).collect());
        }
    }
    contours
}

/// Shape gates for ring-boundary contours.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourFilterParams {
    pub min_points: usize,
    pub max_points: usize,
    /// Minimum `4π·area / perimeter²`.
    pub min_circularity: f64,
}

impl Default for ContourFilterParams {
    fn default() -> Self {
        Self {
            min_points: 20,
            max_points: 1000,
            min_circularity: 0.6,
        }
    }
}

/// Fit ellipses to contours that look like ring boundaries near a node.
///
/// `detection_index` of each candidate is the position of its contour in
/// `contours`.
pub fn select_ring_candidates<F: EllipseFitter + ?Sized>(
    contours: Vec<Vec<Point2<f32>>>,
    coarse_centers: &[Point2<f32>],
    distance_feat: f32,
    params: &ContourFilterParams,
    fitter: &F,
) -> Vec<EllipseCandidate> {
    contours
        .into_iter()
        .enumerate()
        .filter(|(_, c)| (params.min_points..=params.max_points).contains(&c.len()))
        .filter(|(_, c)| circularity(c) >= params.min_circularity)
        .filter_map(|(i, c)| {
            let ellipse = fitter.fit(&c)?;
            let near = coarse_centers
                .iter()
                .any(|p| (ellipse.center - *p).norm() < distance_feat);
            near.then(|| EllipseCandidate::new(ellipse, c, i))
        })
        .collect()
}
