use crate::assets::overlay::Overlay;
use crate::effects::composite::{composite, composite_placed};
use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{MillError, MillResult};
use crate::layout::placement::PlacementSpec;
use crate::media::frame::{Frame, PixelLayout};

/// One per-frame step of the in-process encode loop.
///
/// A step maps input frames of a fixed canvas to output frames of a fixed canvas; the encoder
/// is opened with the canvas the whole chain produces.
pub trait FrameTransform {
    /// Output dimensions for frames of `input` dimensions.
    fn output_canvas(&self, input: Canvas) -> Canvas;

    /// Transform one frame.
    fn apply(&mut self, frame: Frame) -> MillResult<Frame>;
}

impl<T: FrameTransform + ?Sized> FrameTransform for Box<T> {
    fn output_canvas(&self, input: Canvas) -> Canvas {
        (**self).output_canvas(input)
    }

    fn apply(&mut self, frame: Frame) -> MillResult<Frame> {
        (**self).apply(frame)
    }
}

/// Ordered list of steps applied front to back.
#[derive(Default)]
pub struct TransformChain {
    steps: Vec<Box<dyn FrameTransform + Send>>,
}

impl TransformChain {
    /// Empty chain (identity).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn push(&mut self, step: impl FrameTransform + Send + 'static) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain is the identity.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FrameTransform for TransformChain {
    fn output_canvas(&self, input: Canvas) -> Canvas {
        self.steps
            .iter()
            .fold(input, |canvas, step| step.output_canvas(canvas))
    }

    fn apply(&mut self, frame: Frame) -> MillResult<Frame> {
        self.steps
            .iter_mut()
            .try_fold(frame, |frame, step| step.apply(frame))
    }
}

/// Composites a fixed overlay at a fixed placement on every frame.
#[derive(Clone, Debug)]
pub struct OverlayStep {
    overlay: Overlay,
    spec: PlacementSpec,
}

impl OverlayStep {
    /// Place `overlay` according to `spec`.
    pub fn new(overlay: Overlay, spec: PlacementSpec) -> Self {
        Self { overlay, spec }
    }
}

impl FrameTransform for OverlayStep {
    fn output_canvas(&self, input: Canvas) -> Canvas {
        input
    }

    fn apply(&mut self, mut frame: Frame) -> MillResult<Frame> {
        composite_placed(&mut frame, &self.overlay, &self.spec)?;
        Ok(frame)
    }
}

fn to_rgb_image(frame: Frame) -> MillResult<image::RgbImage> {
    let frame = frame.into_rgb8();
    image::RgbImage::from_raw(frame.width, frame.height, frame.data)
        .ok_or_else(|| MillError::validation("frame buffer does not match its dimensions"))
}

fn from_rgb_image(img: image::RgbImage) -> MillResult<Frame> {
    let (w, h) = img.dimensions();
    Frame::new(w, h, PixelLayout::Rgb8, img.into_raw())
}

/// Lanczos resampling to a fixed canvas, with optional unsharp masking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resize {
    target: Canvas,
    sharpen: bool,
}

impl Resize {
    /// Resample every frame to `target`.
    pub fn new(target: Canvas, sharpen: bool) -> Self {
        Self { target, sharpen }
    }

    /// Scale to `target_height`, keeping the aspect ratio. Both dimensions are rounded down to
    /// even values.
    pub fn to_height(input: Canvas, target_height: u32, sharpen: bool) -> MillResult<Self> {
        if target_height < 2 {
            return Err(MillError::validation("target height must be >= 2"));
        }
        let width = (f64::from(input.width) * f64::from(target_height) / f64::from(input.height))
            .round()
            .max(2.0) as u32;
        let target = Canvas::new(width, target_height)?.even_floor();
        Ok(Self::new(target, sharpen))
    }

    /// Output canvas.
    pub fn target(&self) -> Canvas {
        self.target
    }
}

impl FrameTransform for Resize {
    fn output_canvas(&self, _input: Canvas) -> Canvas {
        self.target
    }

    fn apply(&mut self, frame: Frame) -> MillResult<Frame> {
        if frame.canvas() == self.target && !self.sharpen {
            return Ok(frame.into_rgb8());
        }
        let img = to_rgb_image(frame)?;
        let mut out = image::imageops::resize(
            &img,
            self.target.width,
            self.target.height,
            image::imageops::FilterType::Lanczos3,
        );
        if self.sharpen {
            out = image::imageops::unsharpen(&out, 1.0, 0);
        }
        from_rgb_image(out)
    }
}

/// Opaque frame-to-frame enlargement by a fixed integer factor.
///
/// Implementations may wrap any model; the loop only relies on the output being exactly
/// `factor` times the input on both axes.
pub trait Upscaler {
    /// Integer scale factor, at least 1.
    fn factor(&self) -> u32;

    /// Upscale one frame.
    fn upscale(&mut self, frame: Frame) -> MillResult<Frame>;
}

/// Reference [`Upscaler`] backed by Lanczos resampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LanczosUpscaler {
    factor: u32,
}

impl LanczosUpscaler {
    /// Create an upscaler; `factor` must be in `1..=8`.
    pub fn new(factor: u32) -> MillResult<Self> {
        if !(1..=8).contains(&factor) {
            return Err(MillError::validation(format!(
                "upscale factor must be in 1..=8, got {factor}"
            )));
        }
        Ok(Self { factor })
    }
}

impl Upscaler for LanczosUpscaler {
    fn factor(&self) -> u32 {
        self.factor
    }

    fn upscale(&mut self, frame: Frame) -> MillResult<Frame> {
        if self.factor == 1 {
            return Ok(frame.into_rgb8());
        }
        let (w, h) = (frame.width * self.factor, frame.height * self.factor);
        let img = to_rgb_image(frame)?;
        from_rgb_image(image::imageops::resize(
            &img,
            w,
            h,
            image::imageops::FilterType::Lanczos3,
        ))
    }
}

/// Adapts an [`Upscaler`] into a [`FrameTransform`], checking its output dimensions.
pub struct UpscaleStep<U> {
    upscaler: U,
}

impl<U: Upscaler> UpscaleStep<U> {
    /// Wrap an upscaler.
    pub fn new(upscaler: U) -> Self {
        Self { upscaler }
    }
}

impl<U: Upscaler> FrameTransform for UpscaleStep<U> {
    fn output_canvas(&self, input: Canvas) -> Canvas {
        let f = self.upscaler.factor();
        Canvas {
            width: input.width.saturating_mul(f),
            height: input.height.saturating_mul(f),
        }
    }

    fn apply(&mut self, frame: Frame) -> MillResult<Frame> {
        let want = self.output_canvas(frame.canvas());
        let out = self.upscaler.upscale(frame)?;
        if out.canvas() != want {
            return Err(MillError::validation(format!(
                "upscaler produced {}, expected {want}",
                out.canvas()
            )));
        }
        Ok(out)
    }
}

/// Fits frames inside a fixed canvas: frames that are too large are scaled down with their
/// aspect ratio kept, then every frame is centered on a solid background.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    target: Canvas,
    background: Rgba8,
}

impl Letterbox {
    /// Letterbox onto a black `target` canvas.
    pub fn new(target: Canvas) -> Self {
        Self {
            target,
            background: Rgba8::rgb(0, 0, 0),
        }
    }
}

impl FrameTransform for Letterbox {
    fn output_canvas(&self, _input: Canvas) -> Canvas {
        self.target
    }

    fn apply(&mut self, frame: Frame) -> MillResult<Frame> {
        let frame = frame.into_rgb8();
        if frame.canvas() == self.target {
            return Ok(frame);
        }

        let (tw, th) = (self.target.width, self.target.height);
        let fits = frame.width <= tw && frame.height <= th;
        let inner = if fits {
            frame
        } else {
            let scale = (f64::from(tw) / f64::from(frame.width))
                .min(f64::from(th) / f64::from(frame.height));
            let w = ((f64::from(frame.width) * scale).round() as u32).clamp(1, tw);
            let h = ((f64::from(frame.height) * scale).round() as u32).clamp(1, th);
            Resize::new(Canvas::new(w, h)?, false).apply(frame)?
        };

        let bg = self.background;
        let mut out = Frame::filled(tw, th, PixelLayout::Rgb8, [bg.r, bg.g, bg.b, 255])?;
        let x = i64::from((tw - inner.width) / 2);
        let y = i64::from((th - inner.height) / 2);
        let overlay = Overlay::from_rgb8(inner.width, inner.height, inner.data)?;
        composite(&mut out, &overlay, x, y)?;
        Ok(out)
    }
}

/// Crops frames to a canvas anchored at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Crop {
    target: Canvas,
}

impl Crop {
    /// Keep the top-left `target` region of every frame.
    pub fn new(target: Canvas) -> Self {
        Self { target }
    }
}

impl FrameTransform for Crop {
    fn output_canvas(&self, _input: Canvas) -> Canvas {
        self.target
    }

    fn apply(&mut self, frame: Frame) -> MillResult<Frame> {
        if frame.canvas() == self.target {
            return Ok(frame);
        }
        if self.target.width > frame.width || self.target.height > frame.height {
            return Err(MillError::validation(format!(
                "cannot crop {} frame to {}",
                frame.canvas(),
                self.target
            )));
        }
        let ch = frame.layout.channels();
        let row_len = self.target.width as usize * ch;
        let stride = frame.stride();
        let mut data = Vec::with_capacity(row_len * self.target.height as usize);
        for row in frame.data.chunks_exact(stride).take(self.target.height as usize) {
            data.extend_from_slice(&row[..row_len]);
        }
        Frame::new(self.target.width, self.target.height, frame.layout, data)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/transform.rs"]
mod tests;
