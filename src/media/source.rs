use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Stdio};
use std::thread::JoinHandle;

use crate::config::ToolPaths;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MillError, MillResult};
use crate::media::frame::{Frame, PixelLayout, byte_len};
use crate::media::probe::{MediaInfo, probe_media};

/// An opened input video.
///
/// The clip owns its decoder process between the first call to [`MediaClip::frames`] (or
/// [`MediaClip::frames_window`]) and [`MediaClip::close`]; dropping the clip closes it. Frame
/// access is single-pass: reopen the clip to iterate again.
pub struct MediaClip {
    info: MediaInfo,
    tools: ToolPaths,
    decoder: Option<FrameDecoder>,
    started: bool,
}

impl std::fmt::Debug for MediaClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaClip")
            .field("info", &self.info)
            .field("decoding", &self.decoder.is_some())
            .finish()
    }
}

impl MediaClip {
    /// Probe `path` and return a clip handle. No decoder is started yet.
    pub fn open(path: &Path, tools: &ToolPaths) -> MillResult<Self> {
        let info = probe_media(path, tools)?;
        tracing::debug!(
            path = %path.display(),
            size = %info.canvas(),
            fps = %info.fps,
            frames = info.frame_count,
            "opened clip"
        );
        Ok(Self {
            info,
            tools: tools.clone(),
            decoder: None,
            started: false,
        })
    }

    /// Probed stream metadata.
    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    /// Source path.
    pub fn path(&self) -> &Path {
        &self.info.path
    }

    /// Native frame width.
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Native frame height.
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Native frame dimensions.
    pub fn canvas(&self) -> Canvas {
        self.info.canvas()
    }

    /// Average frame rate.
    pub fn fps(&self) -> Fps {
        self.info.fps
    }

    /// Total number of frames.
    pub fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.info.duration_secs
    }

    /// Whether the container carries an audio stream.
    pub fn has_audio(&self) -> bool {
        self.info.has_audio
    }

    /// Iterate every frame of the clip in order.
    pub fn frames(&mut self) -> MillResult<Frames<'_>> {
        self.start(None, None)?;
        Ok(Frames { clip: self })
    }

    /// Iterate at most `max_frames` frames starting at `start_secs`.
    pub fn frames_window(&mut self, start_secs: f64, max_frames: u64) -> MillResult<Frames<'_>> {
        self.select_window(start_secs, max_frames)?;
        Ok(Frames { clip: self })
    }

    /// Start decoding a window without borrowing an iterator; frames are then pulled through
    /// [`FrameSource::next_frame`].
    pub fn select_window(&mut self, start_secs: f64, max_frames: u64) -> MillResult<()> {
        if !start_secs.is_finite() || start_secs < 0.0 {
            return Err(MillError::validation(
                "frame window start must be finite and >= 0",
            ));
        }
        self.start(Some(start_secs), Some(max_frames))
    }

    fn start(&mut self, start_secs: Option<f64>, max_frames: Option<u64>) -> MillResult<()> {
        if self.started {
            return Err(MillError::validation(format!(
                "frames of '{}' were already consumed; reopen the clip to iterate again",
                self.info.path.display()
            )));
        }
        self.started = true;
        let decoder = FrameDecoder::spawn(&self.info, &self.tools, start_secs, max_frames)?;
        self.decoder = Some(decoder);
        Ok(())
    }

    fn read_next(&mut self) -> Option<MillResult<Frame>> {
        let decoder = self.decoder.as_mut()?;
        match decoder.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.close();
                None
            }
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }

    /// Release the decoder process. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.shutdown();
            tracing::debug!(path = %self.info.path.display(), "closed clip");
        }
    }
}

impl Drop for MediaClip {
    fn drop(&mut self) {
        self.close();
    }
}

/// Lazy, finite, single-pass frame sequence borrowed from a [`MediaClip`].
pub struct Frames<'a> {
    clip: &'a mut MediaClip,
}

impl Iterator for Frames<'_> {
    type Item = MillResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.clip.read_next()
    }
}

/// Ordered frame supply for the encode loop.
pub trait FrameSource {
    /// Next frame, `None` once the source is exhausted.
    fn next_frame(&mut self) -> Option<MillResult<Frame>>;

    /// Release decoder resources. Idempotent.
    fn release(&mut self);
}

impl FrameSource for MediaClip {
    /// Starts a full decode on first use unless a window was selected.
    fn next_frame(&mut self) -> Option<MillResult<Frame>> {
        if !self.started
            && let Err(e) = self.start(None, None)
        {
            return Some(Err(e));
        }
        self.read_next()
    }

    fn release(&mut self) {
        self.close();
    }
}

/// Plays several clips back to back; each clip is closed as soon as it is exhausted.
#[derive(Debug)]
pub struct ConcatSource {
    clips: Vec<MediaClip>,
    current: usize,
}

impl ConcatSource {
    /// Chain `clips` in order.
    pub fn new(clips: Vec<MediaClip>) -> Self {
        Self { clips, current: 0 }
    }

    /// Sum of the clips' frame counts.
    pub fn total_frames(&self) -> u64 {
        self.clips.iter().map(MediaClip::frame_count).sum()
    }
}

impl FrameSource for ConcatSource {
    fn next_frame(&mut self) -> Option<MillResult<Frame>> {
        while let Some(clip) = self.clips.get_mut(self.current) {
            match clip.next_frame() {
                Some(item) => return Some(item),
                None => {
                    clip.close();
                    self.current += 1;
                }
            }
        }
        None
    }

    fn release(&mut self) {
        for clip in &mut self.clips {
            clip.close();
        }
    }
}

/// Adapts any frame iterator into a [`FrameSource`]; releasing drops the iterator.
pub struct IterSource<I> {
    inner: Option<I>,
}

impl<I> IterSource<I> {
    /// Wrap an iterator.
    pub fn new(inner: I) -> Self {
        Self { inner: Some(inner) }
    }
}

impl<I: Iterator<Item = MillResult<Frame>>> FrameSource for IterSource<I> {
    fn next_frame(&mut self) -> Option<MillResult<Frame>> {
        self.inner.as_mut()?.next()
    }

    fn release(&mut self) {
        self.inner = None;
    }
}

struct FrameDecoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    source: std::path::PathBuf,
    width: u32,
    height: u32,
    frame_len: usize,
    delivered: u64,
}

impl FrameDecoder {
    fn spawn(
        info: &MediaInfo,
        tools: &ToolPaths,
        start_secs: Option<f64>,
        max_frames: Option<u64>,
    ) -> MillResult<Self> {
        let layout = PixelLayout::Rgb8;
        let frame_len = byte_len(info.width, info.height, layout)?;

        let mut cmd = tools.ffmpeg_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .args(["-v", "error", "-nostdin", "-noautorotate"]);
        if let Some(start) = start_secs {
            cmd.args(["-ss", &format!("{start:.6}")]);
        }
        cmd.arg("-i").arg(&info.path);
        if let Some(n) = max_frames {
            cmd.args(["-frames:v", &n.to_string()]);
        }
        cmd.args([
            "-an",
            "-sn",
            "-f",
            "rawvideo",
            "-pix_fmt",
            layout.ffmpeg_pix_fmt(),
            "-s",
            &format!("{}x{}", info.width, info.height),
            "pipe:1",
        ]);

        let mut child = cmd.spawn().map_err(|e| {
            MillError::other(format!(
                "failed to spawn ffmpeg decoder '{}': {e}",
                tools.ffmpeg.display()
            ))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MillError::other("failed to open ffmpeg decoder stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MillError::other("failed to open ffmpeg decoder stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Self {
            child,
            stdout: BufReader::with_capacity(frame_len.clamp(64 * 1024, 8 * 1024 * 1024), stdout),
            stderr_drain: Some(stderr_drain),
            source: info.path.clone(),
            width: info.width,
            height: info.height,
            frame_len,
            delivered: 0,
        })
    }

    fn read_frame(&mut self) -> MillResult<Option<Frame>> {
        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = self.stdout.read(&mut buf[filled..]).map_err(|e| {
                MillError::unreadable(&self.source, format!("decoder read failed: {e}"))
            })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return self.finish().map(|()| None);
        }
        if filled < buf.len() {
            return Err(MillError::unreadable(
                &self.source,
                format!(
                    "truncated frame {}: got {filled} of {} bytes",
                    self.delivered, self.frame_len
                ),
            ));
        }

        self.delivered += 1;
        Frame::new(self.width, self.height, PixelLayout::Rgb8, buf).map(Some)
    }

    fn finish(&mut self) -> MillResult<()> {
        let status = self.child.wait().map_err(|e| {
            MillError::other(format!("failed to wait for ffmpeg decoder: {e}"))
        })?;
        let stderr = self.join_stderr();
        if !status.success() {
            return Err(MillError::unreadable(&self.source, stderr.trim().to_string()));
        }
        Ok(())
    }

    fn join_stderr(&mut self) -> String {
        self.stderr_drain
            .take()
            .and_then(|h| h.join().ok())
            .and_then(|r| r.ok())
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    fn shutdown(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        let _ = self.join_stderr();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/source.rs"]
mod tests;
