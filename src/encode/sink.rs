use std::path::PathBuf;

use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{MillError, MillResult};
use crate::media::frame::{Frame, PixelLayout};

/// Configuration provided to a [`FrameSink`] when it is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output dimensions.
    pub canvas: Canvas,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Pixel layout of pushed frames.
    pub layout: PixelLayout,
    /// Optional raw PCM audio muxed alongside the video.
    pub audio: Option<AudioInputConfig>,
}

/// Raw PCM audio input for sinks that mux audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInputConfig {
    /// Path to interleaved `f32le` PCM data.
    pub path: PathBuf,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

/// Consumer of encoded output frames: the write side of a negotiated output stream.
///
/// Ordering contract: `push_frame` is called in strictly increasing [`FrameIndex`] order.
/// Sinks reject anything else.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> MillResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> MillResult<()>;
    /// Finalize the output after the last frame.
    fn end(&mut self) -> MillResult<()>;
    /// Discard the output after a failure. Must be safe to call in any state.
    fn abort(&mut self) {}
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn begin(&mut self, cfg: SinkConfig) -> MillResult<()> {
        (**self).begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> MillResult<()> {
        (**self).push_frame(idx, frame)
    }

    fn end(&mut self) -> MillResult<()> {
        (**self).end()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

pub(crate) fn check_frame(
    cfg: &SinkConfig,
    last_idx: Option<FrameIndex>,
    idx: FrameIndex,
    frame: &Frame,
) -> MillResult<()> {
    if let Some(last) = last_idx
        && idx.0 <= last.0
    {
        return Err(MillError::validation(format!(
            "out-of-order frame index {} after {}",
            idx.0, last.0
        )));
    }
    if frame.canvas() != cfg.canvas {
        return Err(MillError::validation(format!(
            "frame size mismatch: got {}, expected {}",
            frame.canvas(),
            cfg.canvas
        )));
    }
    if frame.layout != cfg.layout {
        return Err(MillError::validation(format!(
            "frame layout mismatch: got {:?}, expected {:?}",
            frame.layout, cfg.layout
        )));
    }
    Ok(())
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, Frame)>,
    finished: bool,
    aborted: bool,
}

impl InMemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    /// Captured frames in push order.
    pub fn frames(&self) -> &[(FrameIndex, Frame)] {
        &self.frames
    }

    /// Whether `end` completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether `abort` was called.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> MillResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.finished = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> MillResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| MillError::validation("in-memory sink not started"))?;
        check_frame(cfg, self.frames.last().map(|(i, _)| *i), idx, frame)?;
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> MillResult<()> {
        if self.cfg.is_none() {
            return Err(MillError::validation("in-memory sink not started"));
        }
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
        self.aborted = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
