use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One entry of a codec preference list: a symbolic video codec and a container extension.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodecCandidate {
    /// Symbolic codec name (`h264`, `vp9`, `mpeg4`, ...) or a raw `ffmpeg` encoder name.
    pub codec: String,
    /// Container file extension without the dot (`mp4`, `webm`, `avi`, ...).
    pub container: String,
}

/// How a [`CodecCandidate`] is expressed on an `ffmpeg` command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderSpec {
    /// `-c:v` value.
    pub video_encoder: String,
    /// `-pix_fmt` value for the encoded stream.
    pub pix_fmt: &'static str,
    /// Extra output options placed after `-c:v`.
    pub video_args: Vec<String>,
    /// `-c:a` value suitable for the container.
    pub audio_encoder: &'static str,
}

impl CodecCandidate {
    /// Create a candidate; a leading dot on `container` is stripped.
    pub fn new(codec: impl Into<String>, container: impl Into<String>) -> Self {
        let container = container.into();
        Self {
            codec: codec.into().trim().to_ascii_lowercase(),
            container: container.trim().trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    /// Human-readable `codec/container` label.
    pub fn label(&self) -> String {
        format!("{}/{}", self.codec, self.container)
    }

    /// Rewrite `requested`'s extension to this candidate's container when they disagree.
    pub fn output_path(&self, requested: &Path) -> PathBuf {
        let matches = requested
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.container));
        if matches {
            requested.to_path_buf()
        } else {
            requested.with_extension(&self.container)
        }
    }

    /// Map the symbolic codec to `ffmpeg` encoder settings.
    pub fn encoder_spec(&self) -> EncoderSpec {
        let s = |v: &[&str]| v.iter().map(|x| (*x).to_string()).collect::<Vec<_>>();
        let (video_encoder, pix_fmt, video_args) = match self.codec.as_str() {
            "h264" | "avc" | "avc1" | "x264" | "libx264" => (
                "libx264".to_string(),
                "yuv420p",
                s(&["-preset", "medium", "-crf", "20"]),
            ),
            "hevc" | "h265" | "x265" | "libx265" => {
                let mut args = s(&["-preset", "medium", "-crf", "24"]);
                if matches!(self.container.as_str(), "mp4" | "mov" | "m4v") {
                    args.extend(s(&["-tag:v", "hvc1"]));
                }
                ("libx265".to_string(), "yuv420p", args)
            }
            "vp9" | "libvpx-vp9" => (
                "libvpx-vp9".to_string(),
                "yuv420p",
                s(&["-b:v", "0", "-crf", "32", "-row-mt", "1"]),
            ),
            "vp8" | "libvpx" => (
                "libvpx".to_string(),
                "yuv420p",
                s(&["-b:v", "2M", "-crf", "10"]),
            ),
            "av1" | "libaom-av1" => (
                "libaom-av1".to_string(),
                "yuv420p",
                s(&["-crf", "32", "-cpu-used", "6"]),
            ),
            "mpeg4" | "mp4v" | "divx" => ("mpeg4".to_string(), "yuv420p", s(&["-q:v", "3"])),
            "xvid" | "libxvid" => ("libxvid".to_string(), "yuv420p", s(&["-q:v", "3"])),
            "mjpeg" | "mjpg" => ("mjpeg".to_string(), "yuvj420p", s(&["-q:v", "3"])),
            other => (other.to_string(), "yuv420p", Vec::new()),
        };

        EncoderSpec {
            video_encoder,
            pix_fmt,
            video_args,
            audio_encoder: audio_encoder_for_container(&self.container),
        }
    }
}

impl std::fmt::Display for CodecCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.codec, self.container)
    }
}

/// Audio encoder that the given container accepts.
pub fn audio_encoder_for_container(container: &str) -> &'static str {
    match container {
        "webm" => "libopus",
        "ogg" | "ogv" => "libvorbis",
        "avi" => "libmp3lame",
        _ => "aac",
    }
}

/// Default preference list: H.264 in MP4, MPEG-4 Part 2 in MP4, Motion JPEG in AVI.
pub fn default_preferences() -> Vec<CodecCandidate> {
    vec![
        CodecCandidate::new("h264", "mp4"),
        CodecCandidate::new("mpeg4", "mp4"),
        CodecCandidate::new("mjpeg", "avi"),
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/encode/codec.rs"]
mod tests;
