use crate::{core, rings};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error(transparent)]
    Detect(#[from] rings::RingGridError),
}

/// Convert an `image::GrayImage` into the lightweight `ringcal-core` view type.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Convert a `ringcal-core` image into an `image::GrayImage`.
pub fn to_image_gray(img: &core::GrayImage) -> Result<::image::GrayImage, DetectError> {
    match (u32::try_from(img.width), u32::try_from(img.height)) {
        (Ok(width), Ok(height)) => gray_image_from_slice(width, height, &img.data),
        _ => Err(DetectError::InvalidGrayBuffer {
            expected: img.width.saturating_mul(img.height),
            got: img.data.len(),
        }),
    }
}

/// Load any supported image file as 8-bit grayscale.
pub fn load_gray(path: impl AsRef<std::path::Path>) -> Result<::image::GrayImage, DetectError> {
    let reader = ::image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(::image::ImageError::IoError)?;
    Ok(reader.decode()?.to_luma8())
}

/// Detect all ring centers of `board` in a grayscale image.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width(), height = img.height()))
)]
pub fn detect_ring_grid(
    img: &::image::GrayImage,
    board: rings::RingBoardSpec,
    params: rings::RingGridParams,
) -> Result<rings::RingGridDetection, DetectError> {
    let detector = rings::RingGridDetector::new(board, params)?;
    Ok(detector.detect(&gray_view(img))?)
}

/// Convenience overload using default detector parameters.
pub fn detect_ring_grid_default(
    img: &::image::GrayImage,
    board: rings::RingBoardSpec,
) -> Result<rings::RingGridDetection, DetectError> {
    detect_ring_grid(img, board, rings::RingGridParams::default())
}

/// Color images are converted to luma first.
pub fn detect_ring_grid_dynamic(
    img: &::image::DynamicImage,
    board: rings::RingBoardSpec,
    params: rings::RingGridParams,
) -> Result<rings::RingGridDetection, DetectError> {
    detect_ring_grid(&img.to_luma8(), board, params)
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidGrayDimensions { width, height })
}

pub fn detect_ring_grid_from_gray_u8(
    width: u32,
    height: u32,
    pixels: &[u8],
    board: rings::RingBoardSpec,
    params: rings::RingGridParams,
) -> Result<rings::RingGridDetection, DetectError> {
    let img = gray_image_from_slice(width, height, pixels)?;
    detect_ring_grid(&img, board, params)
}
