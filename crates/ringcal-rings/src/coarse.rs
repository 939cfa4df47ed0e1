//! Coarse node localization on the binarized image.
//!
//! The inner disk of every ring node shows up as a compact white blob after
//! adaptive thresholding. Blobs are gated by area and shape, reduced to
//! exactly `rows × cols` centroids and put into row-major order.

use image::Luma;
use imageproc::region_labelling::{connected_components, Connectivity};
use nalgebra::Point2;
use ringcal_core::{sort_grid_points, GrayImageView, GridOrderParams};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// How blob candidates are reduced to one per grid node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoarseStrategy {
    /// Every blob passing the gates is a node; the count must match.
    Plain,
    /// Keep the blobs whose area agrees with the median blob area.
    Clustering,
}

/// Locates approximate node centers on a binary image.
pub trait CoarseGridDetector {
    /// Row-major `rows × cols` node centers, or `None` when the grid is not
    /// found with `strategy`.
    fn detect(
        &self,
        binary: &GrayImageView<'_>,
        rows: usize,
        cols: usize,
        strategy: CoarseStrategy,
    ) -> Option<Vec<Point2<f32>>>;
}

/// Try `strategies` in order; first success wins.
pub fn detect_coarse_grid<G: CoarseGridDetector + ?Sized>(
    detector: &G,
    binary: &GrayImageView<'_>,
    rows: usize,
    cols: usize,
    strategies: &[CoarseStrategy],
) -> Option<(Vec<Point2<f32>>, CoarseStrategy)> {
    strategies.iter().find_map(|&s| {
        let found = detector.detect(binary, rows, cols, s);
        if found.is_none() {
            log::debug!("coarse grid not found with {:?}", s);
        }
        found.map(|pts| (pts, s))
    })
}

/// Connected white region with its second-order shape measures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    pub centroid: Point2<f32>,
    /// Pixel count.
    pub area: usize,
    /// Minor over major eigenvalue of the pixel covariance.
    pub inertia_ratio: f32,
    /// Area over the area of the moment-equivalent ellipse.
    pub fill_ratio: f32,
}

/// Blob-based coarse grid detector.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobGridDetector {
    /// Binary value treated as foreground.
    pub blob_color: u8,
    pub min_area: usize,
    pub max_area: usize,
    pub min_inertia_ratio: f32,
    pub min_fill_ratio: f32,
    /// `Clustering` keeps blobs within this relative distance of the median area.
    pub area_tolerance: f32,
    pub order: GridOrderParams,
}

impl Default for BlobGridDetector {
    fn default() -> Self {
        Self {
            blob_color: 255,
            min_area: 25,
            max_area: 5000,
            min_inertia_ratio: 0.1,
            min_fill_ratio: 0.8,
            area_tolerance: 0.5,
            order: GridOrderParams::default(),
        }
    }
}

impl BlobGridDetector {
    /// 8-connected foreground components passing the area and shape gates.
    pub fn find_blobs(&self, binary: &GrayImageView<'_>) -> Vec<Blob> {
        let (w, h) = (binary.width, binary.height);
        if !binary.is_consistent() || w == 0 || h == 0 {
            return Vec::new();
        }
        let mask = image::GrayImage::from_fn(w as u32, h as u32, |x, y| {
            let fg = binary.get(x as usize, y as usize) == self.blob_color;
            Luma([if fg { 255 } else { 0 }])
        });
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        // labels are consecutive from 1 in raster order of first pixel
        let mut moments: Vec<Moments> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if moments.len() < label {
                moments.resize_with(label, Moments::default);
            }
            moments[label - 1].add(x as f64, y as f64);
        }

        moments
            .iter()
            .filter(|m| (self.min_area..=self.max_area).contains(&m.count))
            .map(Moments::blob)
            .filter(|b| {
                b.inertia_ratio >= self.min_inertia_ratio && b.fill_ratio >= self.min_fill_ratio
            })
            .collect()
    }

    fn select(&self, mut blobs: Vec<Blob>, n: usize, strategy: CoarseStrategy) -> Option<Vec<Blob>> {
        match strategy {
            CoarseStrategy::Plain => (blobs.len() == n).then_some(blobs),
            CoarseStrategy::Clustering => {
                if blobs.len() < n {
                    return None;
                }
                let mut areas: Vec<usize> = blobs.iter().map(|b| b.area).collect();
                areas.sort_unstable();
                let median = areas[areas.len() / 2] as f32;
                let off = |b: &Blob| (b.area as f32 - median).abs();
                blobs.retain(|b| off(b) <= self.area_tolerance * median);
                if blobs.len() < n {
                    return None;
                }
                blobs.sort_by(|a, b| off(a).total_cmp(&off(b)));
                blobs.truncate(n);
                Some(blobs)
            }
        }
    }
}

impl CoarseGridDetector for BlobGridDetector {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, binary), fields(w = binary.width, h = binary.height))
    )]
    fn detect(
        &self,
        binary: &GrayImageView<'_>,
        rows: usize,
        cols: usize,
        strategy: CoarseStrategy,
    ) -> Option<Vec<Point2<f32>>> {
        let blobs = self.find_blobs(binary);
        let found = blobs.len();
        let Some(selected) = self.select(blobs, rows * cols, strategy) else {
            log::debug!(
                "{:?}: {} blobs cannot form a {}x{} grid",
                strategy,
                found,
                rows,
                cols
            );
            return None;
        };
        let centers: Vec<Point2<f32>> = selected.iter().map(|b| b.centroid).collect();
        match sort_grid_points(&centers, rows, cols, &self.order) {
            Ok(ordered) => Some(ordered),
            Err(err) => {
                log::debug!("{:?}: blob centers not orderable: {}", strategy, err);
                None
            }
        }
    }
}

#[derive(Default)]
struct Moments {
    count: usize,
    sx: f64,
    sy: f64,
    sxx: f64,
    sxy: f64,
    syy: f64,
}

impl Moments {
    fn add(&mut self, x: f64, y: f64) {
        self.count += 1;
        self.sx += x;
        self.sy += y;
        self.sxx += x * x;
        self.sxy += x * y;
        self.syy += y * y;
    }

    fn blob(&self) -> Blob {
        let n = self.count as f64;
        let (mx, my) = (self.sx / n, self.sy / n);
        let cxx = self.sxx / n - mx * mx;
        let cxy = self.sxy / n - mx * my;
        let cyy = self.syy / n - my * my;

        let half_tr = 0.5 * (cxx + cyy);
        let disc = (0.25 * (cxx - cyy).powi(2) + cxy * cxy).sqrt();
        let l_max = half_tr + disc;
        let l_min = (half_tr - disc).max(0.0);
        let inertia_ratio = if l_max > 0.0 { l_min / l_max } else { 0.0 };
        let det = (cxx * cyy - cxy * cxy).max(0.0);
        let fill_ratio = if det > 0.0 {
            n / (4.0 * std::f64::consts::PI * det.sqrt())
        } else {
            0.0
        };

        Blob {
            centroid: Point2::new(mx as f32, my as f32),
            area: self.count,
            inertia_ratio: inertia_ratio as f32,
            fill_ratio: fill_ratio as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ringcal_core::GrayImage;

    fn paint_disk(img: &mut GrayImage, cx: f32, cy: f32, r: f32) {
        for y in 0..img.height {
            for x in 0..img.width {
                if (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2) <= r * r {
                    img.data[y * img.width + x] = 255;
                }
            }
        }
    }

    fn grid_image(rows: usize, cols: usize, r: f32) -> (GrayImage, Vec<Point2<f32>>) {
        let mut img = GrayImage::filled(40 * cols + 40, 40 * rows + 40, 0);
        let mut truth = Vec::new();
        for i in 0..rows {
            for j in 0..cols {
                let c = Point2::new(40.0 + 40.0 * j as f32, 40.0 + 40.0 * i as f32);
                paint_disk(&mut img, c.x, c.y, r);
                truth.push(c);
            }
        }
        (img, truth)
    }

    #[test]
    fn disk_blob_measures() {
        let mut img = GrayImage::filled(40, 40, 0);
        paint_disk(&mut img, 20.0, 18.0, 8.0);
        let blobs = BlobGridDetector::default().find_blobs(&img.view());
        assert_eq!(blobs.len(), 1);
        let b = blobs[0];
        assert_relative_eq!(b.centroid.x, 20.0, epsilon = 1e-4);
        assert_relative_eq!(b.centroid.y, 18.0, epsilon = 1e-4);
        assert!(b.inertia_ratio > 0.95);
        assert!(b.fill_ratio > 0.9 && b.fill_ratio < 1.1);
    }

    #[test]
    fn annulus_fails_fill_gate() {
        let mut img = GrayImage::filled(60, 60, 0);
        paint_disk(&mut img, 30.0, 30.0, 20.0);
        for y in 0..60 {
            for x in 0..60 {
                if (x as f32 - 30.0).powi(2) + (y as f32 - 30.0).powi(2) <= 144.0 {
                    img.data[y * 60 + x] = 0;
                }
            }
        }
        assert!(BlobGridDetector::default().find_blobs(&img.view()).is_empty());
    }

    #[test]
    fn plain_grid_in_row_major_order() {
        let (img, truth) = grid_image(3, 4, 6.0);
        let pts = BlobGridDetector::default()
            .detect(&img.view(), 3, 4, CoarseStrategy::Plain)
            .expect("grid");
        for (p, t) in pts.iter().zip(&truth) {
            assert!((p - t).norm() < 1e-3);
        }
    }

    #[test]
    fn clustering_recovers_from_an_extra_blob() {
        let (mut img, truth) = grid_image(3, 4, 6.0);
        // bigger stray blob below the grid
        paint_disk(&mut img, 100.0, 148.0, 12.0);
        let det = BlobGridDetector::default();
        assert!(det.detect(&img.view(), 3, 4, CoarseStrategy::Plain).is_none());

        let (pts, used) = detect_coarse_grid(
            &det,
            &img.view(),
            3,
            4,
            &[CoarseStrategy::Plain, CoarseStrategy::Clustering],
        )
        .expect("grid");
        assert_eq!(used, CoarseStrategy::Clustering);
        for (p, t) in pts.iter().zip(&truth) {
            assert!((p - t).norm() < 1e-3);
        }
    }

    #[test]
    fn too_few_blobs() {
        let (img, _) = grid_image(2, 4, 6.0);
        let det = BlobGridDetector::default();
        assert!(det.detect(&img.view(), 3, 4, CoarseStrategy::Plain).is_none());
        assert!(det.detect(&img.view(), 3, 4, CoarseStrategy::Clustering).is_none());
    }

    #[test]
    fn diagonal_touch_joins_components() {
        let mut img = GrayImage::filled(30, 30, 0);
        for y in 5..11 {
            for x in 5..11 {
                img.data[y * 30 + x] = 255;
                img.data[(y + 6) * 30 + x + 6] = 255;
            }
        }
        let det = BlobGridDetector {
            min_fill_ratio: 0.0,
            ..BlobGridDetector::default()
        };
        let blobs = det.find_blobs(&img.view());
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 72);
        assert_relative_eq!(blobs[0].centroid.x, 10.5, epsilon = 1e-4);
    }
}
