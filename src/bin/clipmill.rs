use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use clipmill::jobs::job::{
    AddAudioJob, ConcatJob, ImageOverlayJob, TextOverlayJob, TrimJob, UpscaleJob, UpscaleMode,
    UpscaleTarget,
};
use clipmill::{CancelToken, CodecCandidate, Job, JobStatus, PipelineConfig, TracingProgress};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clipmill", version, about = "Batch video transformations")]
struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// JSON pipeline configuration; flags below override its fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// `ffmpeg` executable.
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// `ffprobe` executable.
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,

    /// Codec preference as `codec/container`; repeat to build an ordered list.
    #[arg(long = "codec", global = true, value_parser = parse_codec)]
    codecs: Vec<CodecCandidate>,

    /// Abort an encode after this many seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Fail instead of replacing an existing output file.
    #[arg(long, global = true, default_value_t = false)]
    no_overwrite: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep a time window of a video.
    Trim(TrimArgs),
    /// Join videos back to back.
    Concat(ConcatArgs),
    /// Burn a text caption into a video.
    Text(TextArgs),
    /// Composite a logo image onto a video.
    Logo(LogoArgs),
    /// Add background music to a video.
    Audio(AudioArgs),
    /// Upscale a video.
    Upscale(UpscaleArgs),
    /// Run a job described as JSON.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct TrimArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output video.
    #[arg(long)]
    out: PathBuf,
    /// Start time in seconds.
    #[arg(long)]
    start: f64,
    /// End time in seconds.
    #[arg(long)]
    end: f64,
}

#[derive(Args, Debug)]
struct ConcatArgs {
    /// Input videos in playback order.
    #[arg(long = "in", required = true, num_args = 1..)]
    in_paths: Vec<PathBuf>,
    /// Output video.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct TextArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output video.
    #[arg(long)]
    out: PathBuf,
    /// Caption text.
    #[arg(long)]
    text: String,
    /// Font file (TTF/OTF).
    #[arg(long)]
    font: Option<PathBuf>,
    /// Font size in pixels.
    #[arg(long, default_value_t = 70.0)]
    size: f32,
    /// Fill color.
    #[arg(long, default_value = "white")]
    color: String,
    /// Outline color.
    #[arg(long, default_value = "black")]
    stroke_color: String,
    /// Outline width in pixels.
    #[arg(long, default_value_t = 2.0)]
    stroke_width: f32,
    /// Placement (`center`, `top-right`, `left,bottom`, `x,y`, ...).
    #[arg(long, default_value = "center")]
    position: String,
    /// Padding from the frame edge in pixels.
    #[arg(long, default_value_t = 5)]
    padding: u32,
}

#[derive(Args, Debug)]
struct LogoArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output video.
    #[arg(long)]
    out: PathBuf,
    /// Logo image (PNG, JPEG, SVG, ...).
    #[arg(long)]
    image: PathBuf,
    /// Placement.
    #[arg(long, default_value = "top-left")]
    position: String,
    /// Padding from the frame edge in pixels.
    #[arg(long, default_value_t = 5)]
    padding: u32,
    /// Resize the logo to `WIDTHxHEIGHT`.
    #[arg(long, value_parser = parse_size)]
    resize: Option<(u32, u32)>,
}

#[derive(Args, Debug)]
struct AudioArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output video.
    #[arg(long)]
    out: PathBuf,
    /// Music file.
    #[arg(long)]
    music: PathBuf,
    /// Music gain in [0, 1].
    #[arg(long, default_value_t = 1.0)]
    music_volume: f32,
    /// Gain of the video's own audio in [0, 1]; 0 replaces it.
    #[arg(long, default_value_t = 0.0)]
    video_audio: f32,
}

#[derive(Args, Debug)]
struct UpscaleArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output video.
    #[arg(long)]
    out: PathBuf,
    /// Target height in pixels.
    #[arg(long, conflicts_with = "factor")]
    height: Option<u32>,
    /// Integer scale factor.
    #[arg(long)]
    factor: Option<u32>,
    /// Let a single `ffmpeg` process scale and encode.
    #[arg(long, default_value_t = false)]
    external: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Job description JSON.
    #[arg(long)]
    job: PathBuf,
}

fn parse_codec(s: &str) -> Result<CodecCandidate, String> {
    let (codec, container) = s
        .split_once('/')
        .ok_or_else(|| format!("expected codec/container, got \"{s}\""))?;
    if codec.trim().is_empty() || container.trim().is_empty() {
        return Err(format!("expected codec/container, got \"{s}\""));
    }
    Ok(CodecCandidate::new(codec, container))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got \"{s}\""))?;
    let w = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    Ok((w, h))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = pipeline_config(&cli.pipeline)?;
    let job = build_job(cli.cmd)?;

    let mut progress = TracingProgress::new(job.name());
    let outcome = clipmill::run_job(&job, &cfg, &CancelToken::new(), &mut progress);
    for warning in &outcome.warnings {
        eprintln!("warning: {warning}");
    }
    match (outcome.status, outcome.output) {
        (JobStatus::Success, Some(path)) => {
            eprintln!("wrote {}", path.display());
            Ok(())
        }
        (JobStatus::Failure(msg), _) => anyhow::bail!("{} failed: {msg}", job.name()),
        (JobStatus::Success, None) => anyhow::bail!("{} produced no output", job.name()),
    }
}

fn pipeline_config(args: &PipelineArgs) -> anyhow::Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(ffmpeg) = &args.ffmpeg {
        cfg.tools.ffmpeg = ffmpeg.clone();
    }
    if let Some(ffprobe) = &args.ffprobe {
        cfg.tools.ffprobe = ffprobe.clone();
    }
    if !args.codecs.is_empty() {
        cfg.codecs = args.codecs.clone();
    }
    if args.timeout_secs.is_some() {
        cfg.encode_timeout_secs = args.timeout_secs;
    }
    if args.no_overwrite {
        cfg.overwrite = false;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn build_job(cmd: Command) -> anyhow::Result<Job> {
    let job = match cmd {
        Command::Trim(a) => Job::Trim(TrimJob {
            input: a.in_path,
            output: a.out,
            start_secs: a.start,
            end_secs: a.end,
        }),
        Command::Concat(a) => Job::Concat(ConcatJob {
            inputs: a.in_paths,
            output: a.out,
        }),
        Command::Text(a) => Job::TextOverlay(TextOverlayJob {
            input: a.in_path,
            output: a.out,
            text: a.text,
            font_size: a.size,
            color: a.color,
            stroke_color: a.stroke_color,
            stroke_width: a.stroke_width,
            position: a.position,
            padding: a.padding,
            font: a.font,
        }),
        Command::Logo(a) => Job::ImageOverlay(ImageOverlayJob {
            input: a.in_path,
            output: a.out,
            image: a.image,
            position: a.position,
            padding: a.padding,
            resize: a.resize,
        }),
        Command::Audio(a) => Job::AddAudio(AddAudioJob {
            input: a.in_path,
            output: a.out,
            music: a.music,
            music_volume: a.music_volume,
            video_audio_factor: a.video_audio,
        }),
        Command::Upscale(a) => Job::Upscale(UpscaleJob {
            input: a.in_path,
            output: a.out,
            target: match (a.height, a.factor) {
                (_, Some(f)) => UpscaleTarget::Factor(f),
                (Some(h), None) => UpscaleTarget::Height(h),
                (None, None) => UpscaleTarget::default(),
            },
            mode: if a.external {
                UpscaleMode::External
            } else {
                UpscaleMode::InProcess
            },
        }),
        Command::Run(a) => {
            let json = std::fs::read_to_string(&a.job)
                .with_context(|| format!("read job '{}'", a.job.display()))?;
            Job::from_json(&json)?
        }
    };
    Ok(job)
}
