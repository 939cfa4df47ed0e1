//! Anti-aliased synthetic ring-grid images.
//!
//! Regions alternate between `light` and `dark` from the inner disk
//! outwards, so a 4-boundary node is light / dark / light / dark on a light
//! background. Pixel `(x, y)` covers `[x - 0.5, x + 0.5]` on the canvas.

use nalgebra::Point2;
use ringcal_core::{GrayImage, Homography};
use serde::{Deserialize, Serialize};

use crate::board::RingBoardSpec;

/// Rendering settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Pixels per board unit.
    pub px_per_unit: f32,
    /// Canvas border around the outermost node centers, in pixels.
    pub margin: f32,
    /// Samples per pixel side.
    pub supersample: u32,
    pub light: u8,
    pub dark: u8,
    /// Warp from the frontal canvas to the output image.
    pub homography: Option<Homography>,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            px_per_unit: 1.0,
            margin: 60.0,
            supersample: 4,
            light: 255,
            dark: 0,
            homography: None,
        }
    }
}

impl RenderParams {
    /// Output image position of a board-plane point.
    pub fn project(&self, board: Point2<f32>) -> Point2<f32> {
        let p = Point2::new(
            self.margin + self.px_per_unit * board.x,
            self.margin + self.px_per_unit * board.y,
        );
        match &self.homography {
            Some(h) => h.apply(p),
            None => p,
        }
    }
}

/// Render `board` with all four boundaries.
pub fn render_board(board: &RingBoardSpec, params: &RenderParams) -> GrayImage {
    render_ring_grid(board.rows, board.cols, board.spacing, &board.radii, params)
}

/// Render a `rows × cols` grid of concentric rings with arbitrary radii
/// (ascending, board units). Ground-truth centers are
/// `params.project(board_node_position)`.
pub fn render_ring_grid(
    rows: u32,
    cols: u32,
    spacing: f32,
    radii: &[f32],
    params: &RenderParams,
) -> GrayImage {
    let ppu = params.px_per_unit;
    let width = ((cols.saturating_sub(1)) as f32 * spacing * ppu + 2.0 * params.margin).ceil()
        as usize
        + 1;
    let height = ((rows.saturating_sub(1)) as f32 * spacing * ppu + 2.0 * params.margin).ceil()
        as usize
        + 1;
    let inverse = params.homography.as_ref().and_then(Homography::inverse);

    let n = params.supersample.max(1);
    let step = 1.0 / n as f64;
    let offset = -0.5 + 0.5 * step;
    let region_value = |bx: f64, by: f64| -> f64 {
        let j = (bx / spacing as f64).round().clamp(0.0, cols.saturating_sub(1) as f64);
        let i = (by / spacing as f64).round().clamp(0.0, rows.saturating_sub(1) as f64);
        let d = (bx - j * spacing as f64).hypot(by - i * spacing as f64);
        let region = radii
            .iter()
            .position(|&r| d < r as f64)
            .unwrap_or(radii.len());
        if region % 2 == 0 {
            params.light as f64
        } else {
            params.dark as f64
        }
    };

    let mut img = GrayImage::filled(width, height, params.light);
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for sy in 0..n {
                for sx in 0..n {
                    let canvas = Point2::new(
                        x as f64 + offset + sx as f64 * step,
                        y as f64 + offset + sy as f64 * step,
                    );
                    let frontal = match &inverse {
                        Some(h) => h.apply_f64(canvas),
                        None => canvas,
                    };
                    let bx = (frontal.x - params.margin as f64) / ppu as f64;
                    let by = (frontal.y - params.margin as f64) / ppu as f64;
                    acc += region_value(bx, by);
                }
            }
            img.data[y * width + x] = (acc / (n * n) as f64).round() as u8;
        }
    }
    img
}
