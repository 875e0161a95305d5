use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::track::check_gain;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MillError, MillResult};

/// One unit of work: read input(s), transform, write one output.
///
/// Serialized with an internal `kind` tag:
/// `{"kind":"trim","input":"a.mp4","output":"b.mp4","start_secs":2,"end_secs":5}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Keep `[start_secs, end_secs)` of the input.
    Trim(TrimJob),
    /// Play inputs back to back.
    Concat(ConcatJob),
    /// Burn a text caption into every frame.
    TextOverlay(TextOverlayJob),
    /// Composite a logo image onto every frame.
    ImageOverlay(ImageOverlayJob),
    /// Replace or mix the soundtrack with a music file.
    AddAudio(AddAudioJob),
    /// Resample to a higher resolution.
    Upscale(UpscaleJob),
}

/// Parameters of [`Job::Trim`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrimJob {
    /// Source video.
    pub input: PathBuf,
    /// Requested output path.
    pub output: PathBuf,
    /// Window start in seconds.
    pub start_secs: f64,
    /// Window end in seconds (exclusive).
    pub end_secs: f64,
}

/// Parameters of [`Job::Concat`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConcatJob {
    /// Inputs in playback order. Missing files are skipped with a warning.
    pub inputs: Vec<PathBuf>,
    /// Requested output path.
    pub output: PathBuf,
}

/// Parameters of [`Job::TextOverlay`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextOverlayJob {
    /// Source video.
    pub input: PathBuf,
    /// Requested output path.
    pub output: PathBuf,
    /// Caption; may span several lines.
    pub text: String,
    /// Font size in pixels.
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Fill color (`white`, `#RRGGBB`, ...).
    #[serde(default = "default_text_color")]
    pub color: String,
    /// Outline color.
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    /// Outline width in pixels.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
    /// Placement tag such as `center`, `bottom-left` or `120,40`.
    #[serde(default = "default_text_position")]
    pub position: String,
    /// Distance from the frame edge in pixels.
    #[serde(default = "default_padding")]
    pub padding: u32,
    /// Font file; falls back to the pipeline's `font_path`.
    #[serde(default)]
    pub font: Option<PathBuf>,
}

/// Parameters of [`Job::ImageOverlay`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlayJob {
    /// Source video.
    pub input: PathBuf,
    /// Requested output path.
    pub output: PathBuf,
    /// Raster image or SVG.
    pub image: PathBuf,
    /// Placement tag.
    #[serde(default = "default_image_position")]
    pub position: String,
    /// Distance from the frame edge in pixels.
    #[serde(default = "default_padding")]
    pub padding: u32,
    /// Resize the image to `(width, height)` before compositing.
    #[serde(default)]
    pub resize: Option<(u32, u32)>,
}

/// Parameters of [`Job::AddAudio`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddAudioJob {
    /// Source video.
    pub input: PathBuf,
    /// Requested output path.
    pub output: PathBuf,
    /// Music file; looped or truncated to the video's duration.
    pub music: PathBuf,
    /// Gain applied to the music, in `[0, 1]`.
    #[serde(default = "default_music_volume")]
    pub music_volume: f32,
    /// Gain applied to the video's own audio, in `[0, 1]`. `0` drops it.
    #[serde(default)]
    pub video_audio_factor: f32,
}

/// Parameters of [`Job::Upscale`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpscaleJob {
    /// Source video.
    pub input: PathBuf,
    /// Requested output path.
    pub output: PathBuf,
    /// Output size.
    #[serde(default)]
    pub target: UpscaleTarget,
    /// In-process or external.
    #[serde(default)]
    pub mode: UpscaleMode,
}

/// Output size of an upscale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscaleTarget {
    /// Scale to this height, keeping the aspect ratio (even dimensions).
    Height(u32),
    /// Multiply both dimensions by a fixed integer factor.
    Factor(u32),
}

impl Default for UpscaleTarget {
    fn default() -> Self {
        Self::Height(2160)
    }
}

impl UpscaleTarget {
    /// Output dimensions for an input of `input` dimensions, rounded down to even values.
    pub fn output_canvas(self, input: Canvas) -> MillResult<Canvas> {
        let canvas = match self {
            Self::Height(h) => {
                let w = (f64::from(input.width) * f64::from(h) / f64::from(input.height)).round();
                Canvas::new((w as u32).max(2), h)?
            }
            Self::Factor(f) => Canvas::new(input.width * f, input.height * f)?,
        };
        Ok(canvas.even_floor())
    }
}

/// Where an upscale runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscaleMode {
    /// Decode, resample and encode frame by frame in this process.
    #[default]
    InProcess,
    /// Delegate scaling and encoding to one `ffmpeg` process.
    External,
}

fn default_font_size() -> f32 {
    70.0
}

fn default_text_color() -> String {
    "white".to_string()
}

fn default_stroke_color() -> String {
    "black".to_string()
}

fn default_stroke_width() -> f32 {
    2.0
}

fn default_text_position() -> String {
    "center".to_string()
}

fn default_image_position() -> String {
    "top-left".to_string()
}

fn default_padding() -> u32 {
    5
}

fn default_music_volume() -> f32 {
    1.0
}

impl Job {
    /// Parse a job from JSON.
    pub fn from_json(json: &str) -> MillResult<Self> {
        let job: Self = serde_json::from_str(json)
            .map_err(|e| MillError::validation(format!("invalid job description: {e}")))?;
        Ok(job)
    }

    /// Short job name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trim(_) => "trim",
            Self::Concat(_) => "concat",
            Self::TextOverlay(_) => "text_overlay",
            Self::ImageOverlay(_) => "image_overlay",
            Self::AddAudio(_) => "add_audio",
            Self::Upscale(_) => "upscale",
        }
    }

    /// Requested output path. The written file may carry a different extension.
    pub fn output(&self) -> &Path {
        match self {
            Self::Trim(j) => &j.output,
            Self::Concat(j) => &j.output,
            Self::TextOverlay(j) => &j.output,
            Self::ImageOverlay(j) => &j.output,
            Self::AddAudio(j) => &j.output,
            Self::Upscale(j) => &j.output,
        }
    }

    /// Every file the job reads: videos, overlay images, music.
    pub fn inputs(&self) -> Vec<&Path> {
        match self {
            Self::Trim(j) => vec![j.input.as_path()],
            Self::Concat(j) => j.inputs.iter().map(PathBuf::as_path).collect(),
            Self::TextOverlay(j) => vec![j.input.as_path()],
            Self::ImageOverlay(j) => vec![j.input.as_path(), j.image.as_path()],
            Self::AddAudio(j) => vec![j.input.as_path(), j.music.as_path()],
            Self::Upscale(j) => vec![j.input.as_path()],
        }
    }

    /// Check numeric parameters. File existence is checked when inputs are opened.
    pub fn validate(&self) -> MillResult<()> {
        if self.output().as_os_str().is_empty() {
            return Err(MillError::validation("output path must not be empty"));
        }
        if self.inputs().contains(&self.output()) {
            return Err(MillError::validation(format!(
                "output '{}' must differ from every input",
                self.output().display()
            )));
        }

        match self {
            Self::Trim(j) => {
                if !j.start_secs.is_finite() || j.start_secs < 0.0 {
                    return Err(MillError::validation("trim start_secs must be finite and >= 0"));
                }
                if !j.end_secs.is_finite() || j.end_secs <= j.start_secs {
                    return Err(MillError::validation(format!(
                        "trim end_secs ({}) must be greater than start_secs ({})",
                        j.end_secs, j.start_secs
                    )));
                }
            }
            Self::Concat(j) => {
                if j.inputs.is_empty() {
                    return Err(MillError::InsufficientInputs {
                        found: 0,
                        required: 2,
                    });
                }
            }
            Self::TextOverlay(j) => {
                if j.text.trim().is_empty() {
                    return Err(MillError::validation("overlay text must not be empty"));
                }
                if !j.font_size.is_finite() || j.font_size <= 0.0 {
                    return Err(MillError::validation("font_size must be finite and > 0"));
                }
                if !j.stroke_width.is_finite() || j.stroke_width < 0.0 {
                    return Err(MillError::validation(
                        "stroke_width must be finite and >= 0",
                    ));
                }
            }
            Self::ImageOverlay(j) => {
                if let Some((w, h)) = j.resize
                    && (w == 0 || h == 0)
                {
                    return Err(MillError::validation(format!(
                        "logo resize must be non-empty, got {w}x{h}"
                    )));
                }
            }
            Self::AddAudio(j) => {
                check_gain("music_volume", j.music_volume)?;
                check_gain("video_audio_factor", j.video_audio_factor)?;
            }
            Self::Upscale(j) => match j.target {
                UpscaleTarget::Height(h) if h < 2 => {
                    return Err(MillError::validation("upscale height must be >= 2"));
                }
                UpscaleTarget::Factor(f) if !(1..=8).contains(&f) => {
                    return Err(MillError::validation(format!(
                        "upscale factor must be in 1..=8, got {f}"
                    )));
                }
                _ => {}
            },
        }
        Ok(())
    }
}

/// Non-fatal condition recorded while running a job.
#[derive(Clone, Debug, PartialEq)]
pub enum JobWarning {
    /// A placement tag was not recognized; the overlay went to the top-left corner.
    UnsupportedPlacement {
        /// Tag as written in the job.
        tag: String,
    },
    /// A concat input did not exist and was left out.
    SkippedMissingInput {
        /// Missing path.
        path: PathBuf,
    },
    /// Audio was expected from an input that has none.
    MissingAudioStream {
        /// Input without audio.
        path: PathBuf,
    },
    /// A concat input runs at a different rate than the output; its frames are retimed.
    FpsMismatch {
        /// Offending input.
        path: PathBuf,
        /// Its frame rate.
        fps: Fps,
        /// Output frame rate.
        output_fps: Fps,
    },
    /// The output canvas was cropped to even dimensions for the encoder.
    CroppedToEven {
        /// Canvas before cropping.
        from: Canvas,
        /// Encoded canvas.
        to: Canvas,
    },
    /// The trim end lies past the end of the input and was clamped.
    TrimClamped {
        /// Requested end in seconds.
        requested: f64,
        /// Input duration in seconds.
        duration: f64,
    },
}

impl std::fmt::Display for JobWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedPlacement { tag } => {
                write!(f, "unsupported placement \"{tag}\", using top-left")
            }
            Self::SkippedMissingInput { path } => {
                write!(f, "input not found, skipped: '{}'", path.display())
            }
            Self::MissingAudioStream { path } => {
                write!(f, "no audio stream in '{}'", path.display())
            }
            Self::FpsMismatch {
                path,
                fps,
                output_fps,
            } => write!(
                f,
                "'{}' runs at {fps} fps, output uses {output_fps} fps",
                path.display()
            ),
            Self::CroppedToEven { from, to } => write!(f, "cropped {from} to {to} for encoding"),
            Self::TrimClamped {
                requested,
                duration,
            } => write!(
                f,
                "trim end {requested:.3}s is past the input duration {duration:.3}s; clamped"
            ),
        }
    }
}

/// Terminal status handed back to the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum JobStatus {
    /// The output was written.
    Success,
    /// The job failed; no output is left behind.
    Failure(String),
}

/// Result of one job run.
#[derive(Clone, Debug, PartialEq)]
pub struct JobOutcome {
    /// Success or failure message.
    pub status: JobStatus,
    /// Written file; present only on success.
    pub output: Option<PathBuf>,
    /// Non-fatal conditions, in the order they occurred.
    pub warnings: Vec<JobWarning>,
}

impl JobOutcome {
    /// Whether the job succeeded.
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/job.rs"]
mod tests;
