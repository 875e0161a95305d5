use crate::foundation::core::Canvas;
use crate::foundation::error::{MillError, MillResult};

/// Channel layout of a [`Frame`]. Both layouts are 8 bits per channel, straight alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// Three channels, R G B.
    Rgb8,
    /// Four channels, R G B A.
    Rgba8,
}

impl PixelLayout {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    /// Matching `ffmpeg` rawvideo pixel format name.
    pub fn ffmpeg_pix_fmt(self) -> &'static str {
        match self {
            Self::Rgb8 => "rgb24",
            Self::Rgba8 => "rgba",
        }
    }
}

/// A decoded video frame: dense, row-major, tightly packed 8-bit pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Channel layout of `data`.
    pub layout: PixelLayout,
    /// Pixel bytes, `width * height * layout.channels()` long.
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap raw pixel bytes, validating the buffer length.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> MillResult<Self> {
        let expected = byte_len(width, height, layout)?;
        if data.len() != expected {
            return Err(MillError::validation(format!(
                "frame buffer has {} bytes, expected {expected} for {width}x{height} {layout:?}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// A frame where every pixel is `rgba` (alpha ignored for [`PixelLayout::Rgb8`]).
    pub fn filled(width: u32, height: u32, layout: PixelLayout, rgba: [u8; 4]) -> MillResult<Self> {
        let px = &rgba[..layout.channels()];
        let data = px.repeat((width as usize) * (height as usize));
        Self::new(width, height, layout, data)
    }

    /// Frame dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.channels()
    }

    /// Borrow the channels of pixel `(x, y)`.
    ///
    /// Panics when the coordinate is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let ch = self.layout.channels();
        let off = y as usize * self.stride() + x as usize * ch;
        &self.data[off..off + ch]
    }

    /// Convert to a [`PixelLayout::Rgb8`] frame, dropping alpha.
    pub fn into_rgb8(self) -> Self {
        match self.layout {
            PixelLayout::Rgb8 => self,
            PixelLayout::Rgba8 => {
                let mut data = Vec::with_capacity(self.data.len() / 4 * 3);
                for px in self.data.chunks_exact(4) {
                    data.extend_from_slice(&px[..3]);
                }
                Self {
                    width: self.width,
                    height: self.height,
                    layout: PixelLayout::Rgb8,
                    data,
                }
            }
        }
    }
}

pub(crate) fn byte_len(width: u32, height: u32, layout: PixelLayout) -> MillResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(layout.channels()))
        .ok_or_else(|| MillError::validation("frame buffer size overflow"))
}
