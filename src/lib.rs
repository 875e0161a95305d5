//! clipmill is a batch video transformation pipeline.
//!
//! Inputs are decoded frame by frame through `ffmpeg`, passed through per-frame transforms
//! (overlay compositing, resampling, letterboxing) and written to an output whose codec and
//! container are negotiated from a preference list. Audio is decoded to PCM, conformed to the
//! video's duration, mixed and muxed alongside.
//!
//! - Describe the work as a [`Job`]
//! - Configure tools and codecs with a [`PipelineConfig`]
//! - Run it with [`run_job`] and inspect the [`JobOutcome`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Overlay assets: images, SVG logos, rasterized text.
pub mod assets;
/// PCM audio tracks, conforming and mixing.
pub mod audio;
/// Pipeline configuration.
pub mod config;
/// Frame compositing and transform steps.
pub mod effects;
/// Codec negotiation and frame sinks.
pub mod encode;
/// Job descriptions and the job runner.
pub mod jobs;
/// Overlay placement.
pub mod layout;
/// Input probing and frame decoding.
pub mod media;
/// Encode supervision and progress.
pub mod session;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use crate::foundation::error::{MillError, MillResult};

pub use crate::assets::overlay::Overlay;
pub use crate::audio::track::AudioTrack;
pub use crate::config::{PipelineConfig, ToolPaths};
pub use crate::encode::codec::CodecCandidate;
pub use crate::encode::negotiate::{CodecNegotiator, EncodeTarget, EncoderBackend};
pub use crate::encode::sink::{FrameSink, InMemorySink};
pub use crate::jobs::job::{Job, JobOutcome, JobStatus, JobWarning};
pub use crate::jobs::runner::run_job;
pub use crate::layout::placement::{Placement, PlacementSpec};
pub use crate::media::frame::{Frame, PixelLayout};
pub use crate::media::source::{FrameSource, MediaClip};
pub use crate::session::progress::{CancelToken, Progress, ProgressObserver, TracingProgress};
pub use crate::session::supervisor::{EncodeReport, EncodeState, EncodeSupervisor};
