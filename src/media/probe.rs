use std::path::{Path, PathBuf};

use crate::config::ToolPaths;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MillError, MillResult};

/// Stream metadata gathered by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    /// Probed path.
    pub path: PathBuf,
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Average video frame rate.
    pub fps: Fps,
    /// Number of video frames.
    pub frame_count: u64,
    /// Container duration in seconds.
    pub duration_secs: f64,
    /// Whether at least one audio stream is present.
    pub has_audio: bool,
}

impl MediaInfo {
    /// Video dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Expected frame count for progress bounds: `floor(duration * fps)`.
    pub fn expected_frames(&self) -> u64 {
        self.fps.secs_to_frames_floor(self.duration_secs)
    }
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Probe a media file through `ffprobe`.
///
/// Missing files map to [`MillError::InputNotFound`]; anything `ffprobe` rejects, or a file
/// without a usable video stream, maps to [`MillError::UnreadableContainer`].
#[tracing::instrument(skip(tools))]
pub fn probe_media(path: &Path, tools: &ToolPaths) -> MillResult<MediaInfo> {
    if !path.is_file() {
        return Err(MillError::InputNotFound(path.to_path_buf()));
    }

    let out = tools
        .ffprobe_command()
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            MillError::other(format!(
                "failed to run ffprobe '{}': {e}",
                tools.ffprobe.display()
            ))
        })?;
    if !out.status.success() {
        return Err(MillError::unreadable(
            path,
            String::from_utf8_lossy(&out.stderr).trim().to_string(),
        ));
    }

    parse_probe_json(path, &out.stdout)
}

pub(crate) fn parse_probe_json(path: &Path, json: &[u8]) -> MillResult<MediaInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| MillError::unreadable(path, format!("ffprobe json parse failed: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MillError::unreadable(path, "no video stream found"))?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(MillError::unreadable(
                path,
                "missing or zero video dimensions",
            ));
        }
    };

    let fps = [video.avg_frame_rate.as_deref(), video.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|r| Fps::parse_ratio(r).ok())
        .ok_or_else(|| MillError::unreadable(path, "video stream has no usable frame rate"))?;

    let parse_secs = |s: Option<&String>| {
        s.and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    };
    let nb_frames = video
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0);
    let duration_secs = parse_secs(parsed.format.as_ref().and_then(|f| f.duration.as_ref()))
        .or_else(|| parse_secs(video.duration.as_ref()))
        .or_else(|| nb_frames.map(|n| fps.frames_to_secs(n)))
        .ok_or_else(|| MillError::unreadable(path, "unable to determine duration"))?;
    let frame_count = nb_frames.unwrap_or_else(|| fps.secs_to_frames_floor(duration_secs));

    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps,
        frame_count,
        duration_secs,
        has_audio,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
