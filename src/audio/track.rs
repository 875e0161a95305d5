use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ToolPaths;
use crate::encode::sink::AudioInputConfig;
use crate::foundation::error::{MillError, MillResult};

/// Interleaved `f32` PCM at a fixed sample rate and channel count.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl AudioTrack {
    /// Wrap interleaved samples; the sample count must be a multiple of `channels`.
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> MillResult<Self> {
        if sample_rate == 0 {
            return Err(MillError::validation("audio sample_rate must be non-zero"));
        }
        if channels == 0 {
            return Err(MillError::validation("audio channels must be non-zero"));
        }
        if !samples.len().is_multiple_of(usize::from(channels)) {
            return Err(MillError::validation(format!(
                "{} interleaved samples do not divide into {channels} channels",
                samples.len()
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    /// `round(secs * sample_rate)` frames of silence.
    pub fn silence(sample_rate: u32, channels: u16, secs: f64) -> MillResult<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(MillError::validation(
                "silence duration must be finite and >= 0",
            ));
        }
        let frames = (secs * f64::from(sample_rate)).round() as usize;
        Self::new(
            sample_rate,
            channels,
            vec![0.0; frames * usize::from(channels)],
        )
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Take the interleaved samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of sample frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    /// Whether the track holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether `other` has the same sample rate and channel count.
    pub fn same_format(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    /// Append tracks back to back. All tracks must share one format.
    pub fn concat(tracks: &[AudioTrack]) -> MillResult<Self> {
        let first = tracks
            .first()
            .ok_or_else(|| MillError::validation("cannot concatenate zero audio tracks"))?;
        let mut samples = Vec::with_capacity(tracks.iter().map(|t| t.samples.len()).sum());
        for t in tracks {
            if !t.same_format(first) {
                return Err(MillError::incompatible_audio(format!(
                    "cannot concatenate {} Hz/{} ch with {} Hz/{} ch",
                    first.sample_rate, first.channels, t.sample_rate, t.channels
                )));
            }
            samples.extend_from_slice(&t.samples);
        }
        Self::new(first.sample_rate, first.channels, samples)
    }

    /// Scale every sample by `gain` (finite, in `[0, 1]`).
    pub fn with_gain(mut self, gain: f32) -> MillResult<Self> {
        check_gain("gain", gain)?;
        if gain != 1.0 {
            for s in &mut self.samples {
                *s *= gain;
            }
        }
        Ok(self)
    }
}

pub(crate) fn check_gain(name: &str, gain: f32) -> MillResult<()> {
    if !gain.is_finite() || !(0.0..=1.0).contains(&gain) {
        return Err(MillError::validation(format!(
            "{name} must be finite and in [0, 1], got {gain}"
        )));
    }
    Ok(())
}

/// Slice of the source timeline to decode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioWindow {
    /// Start offset in seconds.
    pub start_secs: f64,
    /// Length in seconds.
    pub duration_secs: f64,
}

/// Decode the first audio stream of `path` to interleaved `f32` PCM through `ffmpeg`.
///
/// Media without an audio stream decode to an empty track.
pub fn decode_audio(
    path: &Path,
    tools: &ToolPaths,
    sample_rate: u32,
    channels: u16,
    window: Option<AudioWindow>,
) -> MillResult<AudioTrack> {
    if !path.is_file() {
        return Err(MillError::InputNotFound(path.to_path_buf()));
    }

    let mut cmd = tools.ffmpeg_command();
    cmd.stdin(Stdio::null()).args(["-v", "error", "-nostdin"]);
    if let Some(w) = window {
        let start_ok = w.start_secs.is_finite() && w.start_secs >= 0.0;
        let len_ok = w.duration_secs.is_finite() && w.duration_secs > 0.0;
        if !start_ok || !len_ok {
            return Err(MillError::validation(
                "audio window must have start >= 0 and duration > 0",
            ));
        }
        cmd.args(["-ss", &format!("{:.6}", w.start_secs)]);
        cmd.arg("-i").arg(path);
        cmd.args(["-t", &format!("{:.6}", w.duration_secs)]);
    } else {
        cmd.arg("-i").arg(path);
    }
    cmd.args([
        "-vn",
        "-f",
        "f32le",
        "-acodec",
        "pcm_f32le",
        "-ac",
        &channels.to_string(),
        "-ar",
        &sample_rate.to_string(),
        "pipe:1",
    ]);

    let out = cmd.output().map_err(|e| {
        MillError::other(format!(
            "failed to run ffmpeg '{}' for audio decode: {e}",
            tools.ffmpeg.display()
        ))
    })?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        if msg.contains("Stream specifier")
            || msg.contains("matches no streams")
            || msg.contains("does not contain any stream")
        {
            tracing::debug!(path = %path.display(), "no audio stream, using empty track");
            return AudioTrack::new(sample_rate, channels, Vec::new());
        }
        return Err(MillError::unreadable(
            path,
            format!("audio decode failed: {}", msg.trim()),
        ));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(MillError::unreadable(
            path,
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    // A truncated trailing frame is dropped rather than rejected.
    let whole = pcm.len() - pcm.len() % usize::from(channels);
    pcm.truncate(whole);

    AudioTrack::new(sample_rate, channels, pcm)
}

/// Raw `f32le` PCM written to a temporary file; the file is removed on drop.
#[derive(Debug)]
pub struct PcmFile {
    path: Option<PathBuf>,
    sample_rate: u32,
    channels: u16,
}

impl PcmFile {
    /// Write `track` into a fresh file under the system temp directory.
    pub fn write_temp(track: &AudioTrack) -> MillResult<Self> {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!(
            "clipmill_audio_{}_{}_{}.f32le",
            std::process::id(),
            nanos,
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        Self::write_to(track, path)
    }

    /// Write `track` to `path`, taking ownership of the file.
    pub fn write_to(track: &AudioTrack, path: PathBuf) -> MillResult<Self> {
        write_f32le(track.samples(), &path)?;
        Ok(Self {
            path: Some(path),
            sample_rate: track.sample_rate(),
            channels: track.channels(),
        })
    }

    /// File location.
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    /// Encoder input description for this file.
    pub fn input_config(&self) -> AudioInputConfig {
        AudioInputConfig {
            path: self.path().to_path_buf(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

impl Drop for PcmFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn write_f32le(samples: &[f32], out_path: &Path) -> MillResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MillError::other(format!(
                "failed to create audio output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples.len() * 4);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        MillError::other(format!(
            "failed to write audio file '{}': {e}",
            out_path.display()
        ))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/audio/track.rs"]
mod tests;
