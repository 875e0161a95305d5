use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ToolPaths;
use crate::encode::codec::{CodecCandidate, EncoderSpec};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig, check_frame};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{MillError, MillResult};
use crate::media::frame::Frame;

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output file path; its extension selects the container.
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Codec and container to encode with.
    pub candidate: CodecCandidate,
    /// External tool locations.
    pub tools: ToolPaths,
}

impl FfmpegSinkOpts {
    /// H.264/MP4 output to `out_path` with tools from `PATH`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            candidate: CodecCandidate::new("h264", "mp4"),
            tools: ToolPaths::default(),
        }
    }
}

/// Sink that spawns `ffmpeg` and streams raw frames to its stdin.
///
/// Audio is optional and read by `ffmpeg` from the raw PCM file named in `SinkConfig.audio`.
/// After an `abort`, or when dropped before `end`, the partial output file is deleted.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    finished: bool,
}

impl FfmpegSink {
    /// Create a sink; nothing is spawned until `begin`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            cfg: None,
            last_idx: None,
            finished: false,
        }
    }

    /// Output path.
    pub fn out_path(&self) -> &Path {
        &self.opts.out_path
    }

    fn next_frame_number(&self) -> u64 {
        self.last_idx.map_or(0, |i| i.0 + 1)
    }

    fn join_stderr(&mut self) -> String {
        let bytes = self
            .stderr_drain
            .take()
            .and_then(|h| h.join().ok())
            .and_then(|r| r.ok())
            .unwrap_or_default();
        stderr_tail(&bytes, 12)
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> MillResult<()> {
        if self.child.is_some() {
            return Err(MillError::validation("ffmpeg sink already started"));
        }
        let spec = self.opts.candidate.encoder_spec();
        if spec.pix_fmt.starts_with("yuv") && !cfg.canvas.is_even() {
            return Err(MillError::validation(format!(
                "output size {} must be even for {}",
                cfg.canvas, spec.pix_fmt
            )));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(MillError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        let mut cmd = self.opts.tools.ffmpeg_command();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            cfg.layout.ffmpeg_pix_fmt(),
            "-s",
            &cfg.canvas.to_string(),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0"]);
        if let Some(audio) = cfg.audio.as_ref() {
            push_audio_input(&mut cmd, audio)?;
        }
        push_output_args(&mut cmd, &spec, &self.opts.candidate, cfg.audio.is_some());
        cmd.arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            MillError::other(format!(
                "failed to spawn ffmpeg '{}': {e}",
                self.opts.tools.ffmpeg.display()
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MillError::other("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MillError::other("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            out = %self.opts.out_path.display(),
            codec = %self.opts.candidate,
            size = %cfg.canvas,
            fps = %cfg.fps,
            audio = cfg.audio.is_some(),
            "ffmpeg sink started"
        );
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.finished = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> MillResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| MillError::validation("ffmpeg sink not started"))?;
        check_frame(cfg, self.last_idx, idx, frame)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MillError::validation("ffmpeg sink is already finalized"));
        };
        if let Err(e) = stdin.write_all(&frame.data) {
            drop(self.stdin.take());
            if let Some(child) = self.child.as_mut() {
                let _ = child.wait();
            }
            let stderr = self.join_stderr();
            return Err(MillError::partial_write(
                idx.0,
                format!("ffmpeg stdin write failed: {e}; {stderr}"),
            ));
        }
        self.last_idx = Some(idx);
        Ok(())
    }

    fn end(&mut self) -> MillResult<()> {
        let frame = self.next_frame_number();
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| MillError::validation("ffmpeg sink not started"))?;

        let status = child
            .wait()
            .map_err(|e| MillError::partial_write(frame, format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = self.join_stderr();
        if !status.success() {
            return Err(MillError::partial_write(
                frame,
                format!("ffmpeg exited with {status}: {stderr}"),
            ));
        }

        self.cfg = None;
        self.finished = true;
        tracing::debug!(out = %self.opts.out_path.display(), frames = frame, "ffmpeg sink finished");
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
        let _ = self.join_stderr();
        self.cfg = None;
        if !self.finished && self.opts.out_path.exists() {
            match std::fs::remove_file(&self.opts.out_path) {
                Ok(()) => tracing::debug!(
                    out = %self.opts.out_path.display(),
                    "removed partial output"
                ),
                Err(e) => tracing::warn!(
                    out = %self.opts.out_path.display(),
                    error = %e,
                    "failed to remove partial output"
                ),
            }
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // Rawvideo input rate goes before `-i`.
    cmd.args(["-r", &fps.to_string()]);
}

fn push_audio_input(cmd: &mut Command, audio: &AudioInputConfig) -> MillResult<()> {
    if audio.sample_rate == 0 || audio.channels == 0 {
        return Err(MillError::validation(
            "audio sample_rate and channels must be non-zero",
        ));
    }
    cmd.args([
        "-f",
        "f32le",
        "-ar",
        &audio.sample_rate.to_string(),
        "-ac",
        &audio.channels.to_string(),
        "-i",
    ])
    .arg(&audio.path);
    Ok(())
}

fn push_output_args(cmd: &mut Command, spec: &EncoderSpec, candidate: &CodecCandidate, audio: bool) {
    cmd.args(["-map", "0:v:0"]);
    if audio {
        cmd.args(["-map", "1:a:0"]);
    }
    cmd.args(["-c:v", &spec.video_encoder]);
    cmd.args(&spec.video_args);
    cmd.args(["-pix_fmt", spec.pix_fmt]);
    if audio {
        cmd.args(["-c:a", spec.audio_encoder, "-b:a", "192k", "-shortest"]);
    } else {
        cmd.arg("-an");
    }
    if matches!(candidate.container.as_str(), "mp4" | "mov" | "m4v") {
        cmd.args(["-movflags", "+faststart"]);
    }
}

/// Encode one synthetic frame with `candidate` to find out whether this `ffmpeg` build can
/// produce it. The probe file lives in the temp directory and is always removed.
pub fn trial_encode(
    tools: &ToolPaths,
    candidate: &CodecCandidate,
    canvas: Canvas,
    fps: Fps,
    audio: Option<&AudioInputConfig>,
) -> MillResult<()> {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let probe_path = std::env::temp_dir().join(format!(
        "clipmill_probe_{}_{}.{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed),
        candidate.container
    ));
    let spec = candidate.encoder_spec();

    let mut cmd = tools.ffmpeg_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .args(["-v", "error", "-nostdin", "-y", "-f", "lavfi", "-i"])
        .arg(format!("color=c=black:s={canvas}:r={fps}:d=1"));
    if let Some(a) = audio {
        let layout = match a.channels {
            1 => ":cl=mono",
            2 => ":cl=stereo",
            _ => "",
        };
        cmd.args(["-f", "lavfi", "-t", "1", "-i"])
            .arg(format!("anullsrc=r={}{layout}", a.sample_rate));
    }
    push_output_args(&mut cmd, &spec, candidate, audio.is_some());
    cmd.args(["-frames:v", "1"]).arg(&probe_path);

    let out = cmd.output();
    let _ = std::fs::remove_file(&probe_path);
    let out = out.map_err(|e| {
        MillError::other(format!(
            "failed to run ffmpeg '{}': {e}",
            tools.ffmpeg.display()
        ))
    })?;
    if !out.status.success() {
        return Err(MillError::other(format!(
            "trial encode with {candidate} failed: {}",
            stderr_tail(&out.stderr, 4)
        )));
    }
    Ok(())
}

/// Last `max_lines` non-empty lines of a diagnostic stream, joined by `" | "`.
pub(crate) fn stderr_tail(bytes: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join(" | ")
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> MillResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
