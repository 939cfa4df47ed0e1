//! Global and local thresholding.

use crate::{GrayImage, GrayImageView};

/// Otsu threshold over a set of sample intensities.
///
/// Degenerate inputs fall back to simple midpoints: empty → 127, constant →
/// that value, two levels → their mean.
pub fn otsu_threshold(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let (min_v, max_v) = samples
        .iter()
        .fold((255u8, 0u8), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

/// Summed-area table with one row/column of zero padding.
struct IntegralImage {
    stride: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn new(src: &GrayImageView<'_>) -> Self {
        let stride = src.width + 1;
        let mut sums = vec![0u64; stride * (src.height + 1)];
        for y in 0..src.height {
            let mut row = 0u64;
            for x in 0..src.width {
                row += src.get(x, y) as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the half-open box `[x0, x1) × [y0, y1)`.
    #[inline]
    fn box_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.stride;
        self.sums[y1 * s + x1] + self.sums[y0 * s + x0]
            - self.sums[y0 * s + x1]
            - self.sums[y1 * s + x0]
    }
}

/// Copy of `src` with `pad` replicated border pixels on every side.
fn replicate_border(src: &GrayImageView<'_>, pad: usize) -> GrayImage {
    let (w, h) = (src.width, src.height);
    let (pw, ph) = (w + 2 * pad, h + 2 * pad);
    let mut data = Vec::with_capacity(pw * ph);
    for py in 0..ph {
        let y = py.saturating_sub(pad).min(h - 1);
        for px in 0..pw {
            let x = px.saturating_sub(pad).min(w - 1);
            data.push(src.get(x, y));
        }
    }
    GrayImage {
        width: pw,
        height: ph,
        data,
    }
}

/// Local-mean adaptive threshold.
///
/// A pixel becomes 255 when it is strictly brighter than the mean of the
/// `block_size × block_size` window around it minus `bias`, 0 otherwise.
/// Windows reaching past the image use replicated border pixels, as OpenCV's
/// `ADAPTIVE_THRESH_MEAN_C` does. Even block sizes are bumped to the next
/// odd value.
pub fn adaptive_mean_threshold(src: &GrayImageView<'_>, block_size: usize, bias: f32) -> GrayImage {
    let (w, h) = (src.width, src.height);
    if w == 0 || h == 0 {
        return GrayImage::filled(w, h, 0);
    }
    let block = block_size.max(3) | 1;
    let padded = replicate_border(src, block / 2);
    let integral = IntegralImage::new(&padded.view());
    let area = (block * block) as f32;

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            // window centered on (x, y) starts at (x, y) in padded coordinates
            let mean = integral.box_sum(x, y, x + block, y + block) as f32 / area;
            if src.get(x, y) as f32 > mean - bias {
                out[y * w + x] = 255;
            }
        }
    }

    GrayImage {
        width: w,
        height: h,
        data: out,
    }
}
