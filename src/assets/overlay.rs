use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{MillError, MillResult};
use crate::foundation::math::unpremultiply_u8;

/// An immutable overlay bitmap, built once and composited onto every frame.
///
/// Pixels are straight (non-premultiplied) RGBA when `has_alpha` is set, RGB otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overlay {
    width: u32,
    height: u32,
    has_alpha: bool,
    data: Vec<u8>,
}

impl Overlay {
    /// Wrap straight-alpha RGBA pixels.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> MillResult<Self> {
        Self::from_raw(width, height, true, data)
    }

    /// Wrap opaque RGB pixels.
    pub fn from_rgb8(width: u32, height: u32, data: Vec<u8>) -> MillResult<Self> {
        Self::from_raw(width, height, false, data)
    }

    fn from_raw(width: u32, height: u32, has_alpha: bool, data: Vec<u8>) -> MillResult<Self> {
        if width == 0 || height == 0 {
            return Err(MillError::validation(format!(
                "overlay must be non-empty, got {width}x{height}"
            )));
        }
        let ch = if has_alpha { 4 } else { 3 };
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(ch))
            .ok_or_else(|| MillError::validation("overlay buffer size overflow"))?;
        if data.len() != expected {
            return Err(MillError::validation(format!(
                "overlay buffer has {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            has_alpha,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether `data` carries an alpha channel.
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Bytes per pixel (3 or 4).
    pub fn channels(&self) -> usize {
        if self.has_alpha { 4 } else { 3 }
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Load a raster image or an `.svg` file.
    ///
    /// `resize` forces exact output dimensions (Lanczos for raster images, vector scaling for SVG).
    /// Images without an alpha channel stay opaque and are composited by plain overwrite.
    pub fn from_path(path: &Path, resize: Option<(u32, u32)>) -> MillResult<Self> {
        if !path.is_file() {
            return Err(MillError::InputNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("read overlay '{}'", path.display()))?;

        let is_svg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
        let overlay = if is_svg {
            Self::from_svg_bytes(&bytes, resize)?
        } else {
            Self::from_image_bytes(&bytes, resize)?
        };

        tracing::debug!(
            path = %path.display(),
            width = overlay.width,
            height = overlay.height,
            alpha = overlay.has_alpha,
            "loaded overlay"
        );
        Ok(overlay)
    }

    /// Decode an encoded raster image (PNG, JPEG, ...).
    pub fn from_image_bytes(bytes: &[u8], resize: Option<(u32, u32)>) -> MillResult<Self> {
        let mut img = image::load_from_memory(bytes).context("decode overlay image")?;
        if let Some((w, h)) = resize {
            if w == 0 || h == 0 {
                return Err(MillError::validation("overlay resize must be non-zero"));
            }
            img = img.resize_exact(w, h, image::imageops::FilterType::Lanczos3);
        }

        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            Self::from_rgba8(w, h, rgba.into_raw())
        } else {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            Self::from_rgb8(w, h, rgb.into_raw())
        }
    }

    /// Parse and rasterize an SVG document.
    pub fn from_svg_bytes(bytes: &[u8], resize: Option<(u32, u32)>) -> MillResult<Self> {
        let opts = usvg::Options::default();
        let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;

        let size = tree.size();
        let (w, h) = match resize {
            Some((w, h)) if w > 0 && h > 0 => (w, h),
            Some(_) => return Err(MillError::validation("overlay resize must be non-zero")),
            None => {
                let to_px = |v: f32| {
                    if v.is_finite() && v > 0.0 {
                        Ok((v.ceil() as u32).max(1))
                    } else {
                        Err(MillError::validation("svg has invalid width/height"))
                    }
                };
                (to_px(size.width())?, to_px(size.height())?)
            }
        };

        let premul = rasterize_svg_to_premul_rgba8(&tree, w, h)?;
        let straight = unpremultiply_rgba8(premul);
        Self::from_rgba8(w, h, straight)
    }
}

const MAX_RASTER_DIM: u32 = 16_384;

fn rasterize_svg_to_premul_rgba8(tree: &usvg::Tree, width: u32, height: u32) -> MillResult<Vec<u8>> {
    if width > MAX_RASTER_DIM || height > MAX_RASTER_DIM {
        return Err(MillError::validation(format!(
            "svg raster size too large: {width}x{height} (max {MAX_RASTER_DIM}x{MAX_RASTER_DIM})"
        )));
    }
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| MillError::other("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.data().to_vec())
}

pub(crate) fn unpremultiply_rgba8(mut rgba: Vec<u8>) -> Vec<u8> {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3];
        if a == 255 {
            continue;
        }
        px[0] = unpremultiply_u8(px[0], a);
        px[1] = unpremultiply_u8(px[1], a);
        px[2] = unpremultiply_u8(px[2], a);
    }
    rgba
}

#[cfg(test)]
#[path = "../../tests/unit/assets/overlay.rs"]
mod tests;
