use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::encode::codec::{CodecCandidate, default_preferences};
use crate::foundation::error::{MillError, MillResult};

/// Locations of the external media tools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// `ffmpeg` executable (bare names are resolved through `PATH`).
    pub ffmpeg: PathBuf,
    /// `ffprobe` executable.
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl ToolPaths {
    /// A fresh `ffmpeg` command with no arguments.
    pub fn ffmpeg_command(&self) -> Command {
        Command::new(&self.ffmpeg)
    }

    /// A fresh `ffprobe` command with no arguments.
    pub fn ffprobe_command(&self) -> Command {
        Command::new(&self.ffprobe)
    }

    /// Return `true` when both tools run and report a version.
    pub fn available(&self) -> bool {
        let ok = |mut cmd: Command| {
            cmd.arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|s| s.success())
        };
        ok(self.ffmpeg_command()) && ok(self.ffprobe_command())
    }
}

/// Explicit, job-scoped pipeline configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// External tool locations.
    pub tools: ToolPaths,
    /// Font used for text overlays. Required by text jobs only.
    pub font_path: Option<PathBuf>,
    /// Ordered codec/container preference list.
    pub codecs: Vec<CodecCandidate>,
    /// Sample rate every audio track is decoded and mixed at.
    pub audio_sample_rate: u32,
    /// Channel count every audio track is decoded and mixed at.
    pub audio_channels: u16,
    /// Wall-clock budget for one encode, unlimited when `None`.
    pub encode_timeout_secs: Option<u64>,
    /// Replace an existing output file instead of failing.
    pub overwrite: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            font_path: None,
            codecs: default_preferences(),
            audio_sample_rate: 48_000,
            audio_channels: 2,
            encode_timeout_secs: None,
            overwrite: true,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> MillResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check value ranges.
    pub fn validate(&self) -> MillResult<()> {
        if self.codecs.is_empty() {
            return Err(MillError::validation("codec preference list must not be empty"));
        }
        for c in &self.codecs {
            if c.codec.trim().is_empty() || c.container.trim().is_empty() {
                return Err(MillError::validation(format!(
                    "codec candidate '{c}' must name both a codec and a container"
                )));
            }
        }
        if !(8_000..=192_000).contains(&self.audio_sample_rate) {
            return Err(MillError::validation(format!(
                "audio_sample_rate must be in 8000..=192000, got {}",
                self.audio_sample_rate
            )));
        }
        if !(1..=8).contains(&self.audio_channels) {
            return Err(MillError::validation(format!(
                "audio_channels must be in 1..=8, got {}",
                self.audio_channels
            )));
        }
        if self.encode_timeout_secs == Some(0) {
            return Err(MillError::validation("encode_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Encode timeout as a [`Duration`].
    pub fn encode_timeout(&self) -> Option<Duration> {
        self.encode_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
