use crate::domain::{RsmError, RsmResult};
use image::DynamicImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};

/// One detector image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Frame {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> RsmResult<Self> {
        if data.len() != rows * cols {
            return Err(RsmError::scan_data_missing(
                "DATA.FRAME_SHAPE",
                format!(
                    "frame data holds {} values for a {}x{} frame",
                    data.len(),
                    rows,
                    cols
                ),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }
}

pub trait FrameLoader: Send + Sync {
    fn load(&self, path: &Path) -> RsmResult<Frame>;
}

/// Decodes TIFF and PNG frames. Single-channel TIFFs of any sample type go
/// through the `tiff` decoder at full precision. Everything else goes through
/// the `image` crate: 8/16-bit luma is kept raw, 32-bit float colour images
/// keep float precision and other layouts are reduced to 16-bit luma.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFrameLoader;

impl FrameLoader for ImageFrameLoader {
    fn load(&self, path: &Path) -> RsmResult<Frame> {
        if is_tiff(path) {
            if let Some(frame) = load_grayscale_tiff(path)? {
                return Ok(frame);
            }
        }
        load_with_image(path)
    }
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            extension.eq_ignore_ascii_case("tif") || extension.eq_ignore_ascii_case("tiff")
        })
}

fn decode_error(path: &Path, error: impl std::fmt::Display) -> RsmError {
    RsmError::io_system(
        "IO.FRAME_DECODE",
        format!("failed to decode frame '{}': {}", path.display(), error),
    )
}

/// `Ok(None)` when the TIFF is not single-channel.
fn load_grayscale_tiff(path: &Path) -> RsmResult<Option<Frame>> {
    let file = File::open(path).map_err(|error| decode_error(path, error))?;
    let mut decoder =
        Decoder::new(BufReader::new(file)).map_err(|error| decode_error(path, error))?;
    let color = decoder
        .colortype()
        .map_err(|error| decode_error(path, error))?;
    if !matches!(color, ColorType::Gray(_)) {
        return Ok(None);
    }
    let (width, height) = decoder
        .dimensions()
        .map_err(|error| decode_error(path, error))?;

    let data: Vec<f64> = match decoder
        .read_image()
        .map_err(|error| decode_error(path, error))?
    {
        DecodingResult::U8(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::U16(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::U32(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::U64(values) => values.into_iter().map(|value| value as f64).collect(),
        DecodingResult::I8(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::I16(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::I32(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::I64(values) => values.into_iter().map(|value| value as f64).collect(),
        DecodingResult::F32(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::F64(values) => values,
    };
    Frame::new(height as usize, width as usize, data).map(Some)
}

fn load_with_image(path: &Path) -> RsmResult<Frame> {
    let image = image::open(path).map_err(|error| decode_error(path, error))?;
    let rows = image.height() as usize;
    let cols = image.width() as usize;

    let data = match image {
        DynamicImage::ImageLuma8(buffer) => buffer.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageLuma16(buffer) => {
            buffer.into_raw().into_iter().map(f64::from).collect()
        }
        float @ (DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)) => float
            .to_luma32f()
            .into_raw()
            .into_iter()
            .map(f64::from)
            .collect(),
        other => other
            .to_luma16()
            .into_raw()
            .into_iter()
            .map(f64::from)
            .collect(),
    };
    Frame::new(rows, cols, data)
}
