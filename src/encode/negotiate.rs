use std::path::{Path, PathBuf};

use crate::config::ToolPaths;
use crate::encode::codec::{CodecCandidate, EncoderSpec};
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, ensure_parent_dir, trial_encode};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MillError, MillResult};
use crate::media::frame::PixelLayout;

/// What to produce: output path, codec preferences, stream parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeTarget {
    /// Requested output path. The extension may be rewritten to the chosen container.
    pub path: PathBuf,
    /// Ordered codec/container preferences.
    pub codecs: Vec<CodecCandidate>,
    /// Output frame rate.
    pub fps: Fps,
    /// Output dimensions.
    pub canvas: Canvas,
    /// Optional raw PCM audio to mux.
    pub audio: Option<AudioInputConfig>,
    /// Replace an existing output file.
    pub overwrite: bool,
    /// Files the job reads. No candidate may write to one of them.
    pub inputs: Vec<PathBuf>,
}

impl EncodeTarget {
    /// Whether `path` names one of the job's inputs.
    pub fn is_input(&self, path: &Path) -> bool {
        self.inputs.iter().any(|input| same_file(input, path))
    }

    /// Sink configuration for RGB frames of this target.
    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            canvas: self.canvas,
            fps: self.fps,
            layout: PixelLayout::Rgb8,
            audio: self.audio.clone(),
        }
    }
}

/// Opens an output stream for one (codec, container) candidate.
///
/// A failed `open` must not leave a handle behind; files it created are removed by the
/// negotiator.
pub trait EncoderBackend {
    /// Exclusive owner of the opened output.
    type Handle;

    /// Try to open `candidate` writing to `path`.
    fn open(
        &mut self,
        target: &EncodeTarget,
        candidate: &CodecCandidate,
        path: &Path,
    ) -> MillResult<Self::Handle>;
}

/// Result of a successful negotiation.
#[derive(Debug)]
pub struct Negotiated<H> {
    /// Opened output handle.
    pub handle: H,
    /// Actual output path (extension matches `candidate.container`).
    pub path: PathBuf,
    /// Winning candidate.
    pub candidate: CodecCandidate,
    /// Candidates that failed before the winner, in order.
    pub rejected: Vec<String>,
}

/// Tries codec candidates in order and keeps the first that opens.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodecNegotiator;

impl CodecNegotiator {
    /// Negotiate an output stream for `target` through `backend`.
    ///
    /// Errors: [`MillError::NoCodecAvailable`] when every candidate fails; no file created by a
    /// failed attempt is left behind and an output that existed before the attempt is put back.
    /// A candidate path that names one of `target.inputs` is a validation error.
    #[tracing::instrument(skip_all, fields(path = %target.path.display()))]
    pub fn negotiate<B: EncoderBackend>(
        target: &EncodeTarget,
        backend: &mut B,
    ) -> MillResult<Negotiated<B::Handle>> {
        if target.codecs.is_empty() {
            return Err(MillError::validation("codec preference list is empty"));
        }
        ensure_parent_dir(&target.path)?;

        let mut rejected = Vec::new();
        for candidate in &target.codecs {
            let path = candidate.output_path(&target.path);
            if target.is_input(&path) {
                return Err(MillError::validation(format!(
                    "output '{}' for {candidate} would overwrite an input",
                    path.display()
                )));
            }
            if !target.overwrite && path.exists() {
                return Err(MillError::validation(format!(
                    "output file '{}' already exists",
                    path.display()
                )));
            }
            let kept = SetAside::take(&path)?;

            match backend.open(target, candidate, &path) {
                Ok(handle) => {
                    if let Some(kept) = kept {
                        kept.discard();
                    }
                    if path != target.path {
                        tracing::info!(
                            requested = %target.path.display(),
                            actual = %path.display(),
                            "output extension rewritten for container"
                        );
                    }
                    tracing::info!(codec = %candidate, "codec negotiated");
                    return Ok(Negotiated {
                        handle,
                        path,
                        candidate: candidate.clone(),
                        rejected,
                    });
                }
                Err(e) => {
                    tracing::warn!(codec = %candidate, error = %e, "codec candidate failed");
                    if path.exists() {
                        let _ = std::fs::remove_file(&path);
                    }
                    if let Some(kept) = kept {
                        kept.restore()?;
                    }
                    rejected.push(candidate.label());
                }
            }
        }

        Err(MillError::NoCodecAvailable { tried: rejected })
    }
}

/// A pre-existing output moved to a hidden sibling while a candidate is tried.
///
/// Restored when the attempt fails, deleted when it succeeds.
#[derive(Debug)]
struct SetAside {
    original: PathBuf,
    kept: PathBuf,
}

impl SetAside {
    fn take(path: &Path) -> MillResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kept = path.with_file_name(format!(".{name}.clipmill-kept"));
        use anyhow::Context as _;
        std::fs::rename(path, &kept)
            .with_context(|| format!("failed to set aside existing output '{}'", path.display()))?;
        Ok(Some(Self {
            original: path.to_path_buf(),
            kept,
        }))
    }

    fn restore(self) -> MillResult<()> {
        use anyhow::Context as _;
        std::fs::rename(&self.kept, &self.original).with_context(|| {
            format!(
                "failed to restore '{}' from '{}'",
                self.original.display(),
                self.kept.display()
            )
        })?;
        Ok(())
    }

    fn discard(self) {
        if let Err(e) = std::fs::remove_file(&self.kept) {
            tracing::warn!(path = %self.kept.display(), error = %e, "failed to remove replaced output");
        }
    }
}

/// Path equality that sees through relative paths and links when both files exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Backend that verifies a candidate with a one-frame trial encode, then starts a streaming
/// [`FfmpegSink`] for it.
#[derive(Clone, Debug, Default)]
pub struct FfmpegBackend {
    tools: ToolPaths,
}

impl FfmpegBackend {
    /// Use the given tool locations.
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }
}

impl EncoderBackend for FfmpegBackend {
    type Handle = FfmpegSink;

    fn open(
        &mut self,
        target: &EncodeTarget,
        candidate: &CodecCandidate,
        path: &Path,
    ) -> MillResult<FfmpegSink> {
        trial_encode(
            &self.tools,
            candidate,
            target.canvas,
            target.fps,
            target.audio.as_ref(),
        )?;
        let mut sink = FfmpegSink::new(FfmpegSinkOpts {
            out_path: path.to_path_buf(),
            overwrite: target.overwrite,
            candidate: candidate.clone(),
            tools: self.tools.clone(),
        });
        sink.begin(target.sink_config())?;
        Ok(sink)
    }
}

/// Backend that only runs the trial encode; the handle is the encoder settings for a caller
/// that drives its own `ffmpeg` process.
#[derive(Clone, Debug, Default)]
pub struct TrialBackend {
    tools: ToolPaths,
}

impl TrialBackend {
    /// Use the given tool locations.
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }
}

impl EncoderBackend for TrialBackend {
    type Handle = EncoderSpec;

    fn open(
        &mut self,
        target: &EncodeTarget,
        candidate: &CodecCandidate,
        _path: &Path,
    ) -> MillResult<EncoderSpec> {
        trial_encode(
            &self.tools,
            candidate,
            target.canvas,
            target.fps,
            target.audio.as_ref(),
        )?;
        Ok(candidate.encoder_spec())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/negotiate.rs"]
mod tests;
