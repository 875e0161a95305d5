use std::path::{Path, PathBuf};
use std::process::Command;

use crate::assets::overlay::Overlay;
use crate::assets::text::{TextRasterizer, TextStyle};
use crate::audio::mix::{conform, mix};
use crate::audio::track::{AudioTrack, AudioWindow, PcmFile, decode_audio};
use crate::config::PipelineConfig;
use crate::effects::transform::{
    Crop, FrameTransform, LanczosUpscaler, Letterbox, OverlayStep, Resize, TransformChain,
    UpscaleStep,
};
use crate::encode::codec::EncoderSpec;
use crate::encode::negotiate::{EncodeTarget, FfmpegBackend, Negotiated, TrialBackend};
use crate::foundation::core::{Canvas, Fps, Rgba8};
use crate::foundation::error::{MillError, MillResult};
use crate::jobs::job::{
    AddAudioJob, ConcatJob, ImageOverlayJob, Job, JobOutcome, JobStatus, JobWarning,
    TextOverlayJob, TrimJob, UpscaleJob, UpscaleMode, UpscaleTarget,
};
use crate::layout::placement::{PlacementSpec, parse_placement_lenient};
use crate::media::source::{ConcatSource, FrameSource, MediaClip};
use crate::session::progress::{CancelToken, ProgressObserver};
use crate::session::supervisor::EncodeSupervisor;

/// Run `job` to completion and fold the result into a [`JobOutcome`].
///
/// Never panics on bad input: every error becomes `JobStatus::Failure` with the error's message,
/// and warnings collected before the failure are kept.
#[tracing::instrument(skip_all, fields(job = job.name(), out = %job.output().display()))]
pub fn run_job(
    job: &Job,
    cfg: &PipelineConfig,
    cancel: &CancelToken,
    observer: &mut dyn ProgressObserver,
) -> JobOutcome {
    let mut ctx = JobContext {
        cfg,
        cancel,
        observer,
        inputs: job.inputs().into_iter().map(Path::to_path_buf).collect(),
        warnings: Vec::new(),
    };
    let result = ctx.execute(job);
    let warnings = ctx.warnings;
    match result {
        Ok(output) => {
            tracing::info!(out = %output.display(), warnings = warnings.len(), "job succeeded");
            JobOutcome {
                status: JobStatus::Success,
                output: Some(output),
                warnings,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "job failed");
            JobOutcome {
                status: JobStatus::Failure(e.to_string()),
                output: None,
                warnings,
            }
        }
    }
}

struct JobContext<'a> {
    cfg: &'a PipelineConfig,
    cancel: &'a CancelToken,
    observer: &'a mut dyn ProgressObserver,
    inputs: Vec<PathBuf>,
    warnings: Vec<JobWarning>,
}

/// Everything the in-process encode needs besides the frame source.
struct InProcessEncode<'p> {
    output: &'p Path,
    input_canvas: Canvas,
    fps: Fps,
    audio: Option<AudioTrack>,
    total: u64,
}

impl JobContext<'_> {
    fn execute(&mut self, job: &Job) -> MillResult<PathBuf> {
        self.cfg.validate()?;
        job.validate()?;
        match job {
            Job::Trim(j) => self.trim(j),
            Job::Concat(j) => self.concat(j),
            Job::TextOverlay(j) => self.text_overlay(j),
            Job::ImageOverlay(j) => self.image_overlay(j),
            Job::AddAudio(j) => self.add_audio(j),
            Job::Upscale(j) => match j.mode {
                UpscaleMode::InProcess => self.upscale_in_process(j),
                UpscaleMode::External => self.upscale_external(j),
            },
        }
    }

    fn warn(&mut self, warning: JobWarning) {
        tracing::warn!(%warning, "job warning");
        self.warnings.push(warning);
    }

    fn placement(&mut self, tag: &str, padding: u32) -> PlacementSpec {
        let (placement, err) = parse_placement_lenient(tag);
        if err.is_some() {
            self.warn(JobWarning::UnsupportedPlacement {
                tag: tag.to_string(),
            });
        }
        PlacementSpec::new(placement, padding)
    }

    /// Decode the audio of `path` over `window` and fit it to `secs`.
    ///
    /// `None` when the file carries no audio.
    fn conformed_audio(
        &self,
        path: &Path,
        window: Option<AudioWindow>,
        secs: f64,
    ) -> MillResult<Option<AudioTrack>> {
        let track = decode_audio(
            path,
            &self.cfg.tools,
            self.cfg.audio_sample_rate,
            self.cfg.audio_channels,
            window,
        )?;
        if track.is_empty() {
            return Ok(None);
        }
        conform(&track, secs).map(Some)
    }

    /// Pass-through soundtrack for single-input jobs.
    fn clip_audio(&self, clip: &MediaClip) -> MillResult<Option<AudioTrack>> {
        if !clip.has_audio() {
            return Ok(None);
        }
        let secs = clip.fps().frames_to_secs(clip.frame_count());
        self.conformed_audio(clip.path(), None, secs)
    }

    fn trim(&mut self, job: &TrimJob) -> MillResult<PathBuf> {
        let mut clip = MediaClip::open(&job.input, &self.cfg.tools)?;
        let duration = clip.duration_secs();
        if job.start_secs >= duration {
            return Err(MillError::validation(format!(
                "trim start {:.3}s is past the input duration {duration:.3}s",
                job.start_secs
            )));
        }
        let end = if job.end_secs > duration {
            self.warn(JobWarning::TrimClamped {
                requested: job.end_secs,
                duration,
            });
            duration
        } else {
            job.end_secs
        };

        let fps = clip.fps();
        let frames = fps.secs_to_frames_round(end - job.start_secs);
        if frames == 0 {
            return Err(MillError::validation("trim window is shorter than one frame"));
        }
        let secs = fps.frames_to_secs(frames);
        let audio = if clip.has_audio() {
            let window = AudioWindow {
                start_secs: job.start_secs,
                duration_secs: secs,
            };
            self.conformed_audio(&job.input, Some(window), secs)?
        } else {
            None
        };

        clip.select_window(job.start_secs, frames)?;
        let encode = InProcessEncode {
            output: &job.output,
            input_canvas: clip.canvas(),
            fps,
            audio,
            total: frames,
        };
        self.encode_in_process(&mut clip, TransformChain::new(), encode)
    }

    fn concat(&mut self, job: &ConcatJob) -> MillResult<PathBuf> {
        let mut clips = Vec::new();
        for path in &job.inputs {
            if !path.is_file() {
                self.warn(JobWarning::SkippedMissingInput { path: path.clone() });
                continue;
            }
            clips.push(MediaClip::open(path, &self.cfg.tools)?);
        }
        if clips.len() < 2 {
            return Err(MillError::InsufficientInputs {
                found: clips.len(),
                required: 2,
            });
        }

        let fps = clips[0].fps();
        let canvas = clips[0].canvas();
        for clip in &clips[1..] {
            if clip.fps() != fps {
                self.warn(JobWarning::FpsMismatch {
                    path: clip.path().to_path_buf(),
                    fps: clip.fps(),
                    output_fps: fps,
                });
            }
        }

        let audio = if clips.iter().any(MediaClip::has_audio) {
            let mut parts = Vec::with_capacity(clips.len());
            for clip in &clips {
                let secs = fps.frames_to_secs(clip.frame_count());
                let track = if clip.has_audio() {
                    self.conformed_audio(clip.path(), None, secs)?
                } else {
                    None
                };
                let track = match track {
                    Some(t) => t,
                    None => {
                        self.warn(JobWarning::MissingAudioStream {
                            path: clip.path().to_path_buf(),
                        });
                        AudioTrack::silence(
                            self.cfg.audio_sample_rate,
                            self.cfg.audio_channels,
                            secs,
                        )?
                    }
                };
                parts.push(track);
            }
            Some(AudioTrack::concat(&parts)?)
        } else {
            None
        };

        let mut source = ConcatSource::new(clips);
        let total = source.total_frames();
        let mut chain = TransformChain::new();
        chain.push(Letterbox::new(canvas));
        let encode = InProcessEncode {
            output: &job.output,
            input_canvas: canvas,
            fps,
            audio,
            total,
        };
        self.encode_in_process(&mut source, chain, encode)
    }

    fn text_overlay(&mut self, job: &TextOverlayJob) -> MillResult<PathBuf> {
        let font = job
            .font
            .as_deref()
            .or(self.cfg.font_path.as_deref())
            .ok_or_else(|| {
                MillError::validation("text overlay needs a font: set `font` or `font_path`")
            })?;
        let style = TextStyle {
            text: job.text.clone(),
            size_px: job.font_size,
            color: Rgba8::parse(&job.color)?,
            stroke_color: Rgba8::parse(&job.stroke_color)?,
            stroke_width: job.stroke_width,
        };
        let overlay = TextRasterizer::from_font_path(font)?.rasterize(&style)?;
        let spec = self.placement(&job.position, job.padding);
        self.overlay_job(&job.input, &job.output, overlay, spec)
    }

    fn image_overlay(&mut self, job: &ImageOverlayJob) -> MillResult<PathBuf> {
        let overlay = Overlay::from_path(&job.image, job.resize)?;
        let spec = self.placement(&job.position, job.padding);
        self.overlay_job(&job.input, &job.output, overlay, spec)
    }

    fn overlay_job(
        &mut self,
        input: &Path,
        output: &Path,
        overlay: Overlay,
        spec: PlacementSpec,
    ) -> MillResult<PathBuf> {
        let mut clip = MediaClip::open(input, &self.cfg.tools)?;
        tracing::debug!(
            overlay = %format!("{}x{}", overlay.width(), overlay.height()),
            placement = ?spec.placement,
            "overlay prepared"
        );
        let audio = self.clip_audio(&clip)?;
        let mut chain = TransformChain::new();
        chain.push(OverlayStep::new(overlay, spec));
        let encode = InProcessEncode {
            output,
            input_canvas: clip.canvas(),
            fps: clip.fps(),
            audio,
            total: clip.frame_count(),
        };
        self.encode_in_process(&mut clip, chain, encode)
    }

    fn add_audio(&mut self, job: &AddAudioJob) -> MillResult<PathBuf> {
        let mut clip = MediaClip::open(&job.input, &self.cfg.tools)?;
        let secs = clip.fps().frames_to_secs(clip.frame_count());

        let music = self
            .conformed_audio(&job.music, None, secs)?
            .ok_or_else(|| {
                MillError::validation(format!(
                    "music file '{}' has no audio stream",
                    job.music.display()
                ))
            })?;

        let original = if job.video_audio_factor > 0.0 {
            let track = self.clip_audio(&clip)?;
            if track.is_none() {
                self.warn(JobWarning::MissingAudioStream {
                    path: job.input.clone(),
                });
            }
            track
        } else {
            None
        };

        let soundtrack = match original {
            Some(original) => mix(&original, &music, job.video_audio_factor, job.music_volume)?,
            None => music.with_gain(job.music_volume)?,
        };

        let encode = InProcessEncode {
            output: &job.output,
            input_canvas: clip.canvas(),
            fps: clip.fps(),
            audio: Some(soundtrack),
            total: clip.frame_count(),
        };
        self.encode_in_process(&mut clip, TransformChain::new(), encode)
    }

    fn upscale_in_process(&mut self, job: &UpscaleJob) -> MillResult<PathBuf> {
        let mut clip = MediaClip::open(&job.input, &self.cfg.tools)?;
        let mut chain = TransformChain::new();
        match job.target {
            UpscaleTarget::Height(h) => {
                chain.push(Resize::to_height(clip.canvas(), h, true)?);
            }
            UpscaleTarget::Factor(f) => {
                chain.push(UpscaleStep::new(LanczosUpscaler::new(f)?));
            }
        }
        let audio = self.clip_audio(&clip)?;
        let encode = InProcessEncode {
            output: &job.output,
            input_canvas: clip.canvas(),
            fps: clip.fps(),
            audio,
            total: clip.frame_count(),
        };
        self.encode_in_process(&mut clip, chain, encode)
    }

    fn upscale_external(&mut self, job: &UpscaleJob) -> MillResult<PathBuf> {
        let clip = MediaClip::open(&job.input, &self.cfg.tools)?;
        let canvas = job.target.output_canvas(clip.canvas())?;
        let total = clip.info().expected_frames();
        let has_audio = clip.has_audio();
        let fps = clip.fps();
        drop(clip);

        let target = EncodeTarget {
            path: job.output.clone(),
            codecs: self.cfg.codecs.clone(),
            fps,
            canvas,
            audio: None,
            overwrite: self.cfg.overwrite,
            inputs: self.inputs.clone(),
        };
        let mut backend = TrialBackend::new(self.cfg.tools.clone());
        let mut supervisor = EncodeSupervisor::new(&mut *self.observer)
            .with_cancel(self.cancel.clone())
            .with_timeout(self.cfg.encode_timeout());
        let cfg = self.cfg;
        let report = supervisor.run_external(
            &target,
            &mut backend,
            |n| Ok(upscale_command(cfg, &job.input, canvas, has_audio, n)),
            total,
        )?;
        Ok(report.output)
    }

    fn encode_in_process<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        mut chain: TransformChain,
        encode: InProcessEncode<'_>,
    ) -> MillResult<PathBuf> {
        let produced = chain.output_canvas(encode.input_canvas);
        let canvas = if produced.is_even() {
            produced
        } else {
            let even = produced.even_floor();
            self.warn(JobWarning::CroppedToEven {
                from: produced,
                to: even,
            });
            chain.push(Crop::new(even));
            even
        };

        let pcm = encode.audio.as_ref().map(PcmFile::write_temp).transpose()?;
        let target = EncodeTarget {
            path: encode.output.to_path_buf(),
            codecs: self.cfg.codecs.clone(),
            fps: encode.fps,
            canvas,
            audio: pcm.as_ref().map(PcmFile::input_config),
            overwrite: self.cfg.overwrite,
            inputs: self.inputs.clone(),
        };

        let mut backend = FfmpegBackend::new(self.cfg.tools.clone());
        let mut supervisor = EncodeSupervisor::new(&mut *self.observer)
            .with_cancel(self.cancel.clone())
            .with_timeout(self.cfg.encode_timeout());
        let report =
            supervisor.run_in_process(source, &mut chain, &target, &mut backend, encode.total)?;
        drop(pcm);
        Ok(report.output)
    }
}

/// `ffmpeg` command that scales `input` to `canvas` with Lanczos plus an unsharp pass and encodes
/// with the negotiated codec.
fn upscale_command(
    cfg: &PipelineConfig,
    input: &Path,
    canvas: Canvas,
    has_audio: bool,
    negotiated: &Negotiated<EncoderSpec>,
) -> Command {
    let spec = &negotiated.handle;
    let mut cmd = cfg.tools.ffmpeg_command();
    cmd.args(["-hide_banner", "-nostdin", "-stats"]);
    cmd.arg(if cfg.overwrite { "-y" } else { "-n" });
    cmd.arg("-i").arg(input);
    cmd.args([
        "-vf",
        &format!(
            "scale={}:{}:flags=lanczos,unsharp=5:5:1.5:5:5:0.0",
            canvas.width, canvas.height
        ),
    ]);
    cmd.args(["-c:v", &spec.video_encoder]);
    cmd.args(&spec.video_args);
    cmd.args(["-pix_fmt", spec.pix_fmt]);
    if has_audio {
        cmd.args(["-c:a", spec.audio_encoder, "-b:a", "192k"]);
    } else {
        cmd.arg("-an");
    }
    if matches!(
        negotiated.candidate.container.as_str(),
        "mp4" | "mov" | "m4v"
    ) {
        cmd.args(["-movflags", "+faststart"]);
    }
    cmd.arg(&negotiated.path);
    cmd
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/runner.rs"]
mod tests;
