use std::path::PathBuf;
use std::time::Duration;

/// Convenience result type used across clipmill.
pub type MillResult<T> = Result<T, MillError>;

/// Top-level error taxonomy for pipeline components and jobs.
#[derive(thiserror::Error, Debug)]
pub enum MillError {
    /// The input media file does not exist.
    #[error("input not found: '{}'", .0.display())]
    InputNotFound(PathBuf),

    /// The input exists but could not be probed or decoded as a video container.
    #[error("unreadable container '{}': {reason}", .path.display())]
    UnreadableContainer {
        /// Offending input path.
        path: PathBuf,
        /// Probe or decoder diagnostic.
        reason: String,
    },

    /// A placement tag was not recognized (strict parsing only; jobs recover from this).
    #[error("unsupported placement: {0}")]
    UnsupportedPlacement(String),

    /// Two audio tracks cannot be combined without resampling or re-shaping.
    #[error("incompatible audio format: {0}")]
    IncompatibleAudioFormat(String),

    /// Every (codec, container) candidate failed to open.
    #[error("no codec available (tried: {})", .tried.join(", "))]
    NoCodecAvailable {
        /// Candidates in the order they were attempted.
        tried: Vec<String>,
    },

    /// The external transcoding process exited unsuccessfully.
    #[error("external encode failed (exit code {code:?}): {stderr_tail}")]
    ExternalEncodeFailed {
        /// Process exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Last diagnostic lines emitted by the process.
        stderr_tail: String,
    },

    /// Writing a frame (or finalizing the stream) failed mid-encode.
    #[error("partial write failure at frame {frame}: {reason}")]
    PartialWriteFailure {
        /// Index of the frame being written when the failure occurred.
        frame: u64,
        /// Underlying cause.
        reason: String,
    },

    /// Too few usable inputs remained after filtering.
    #[error("insufficient inputs: {found} usable, {required} required")]
    InsufficientInputs {
        /// Usable inputs after filtering.
        found: usize,
        /// Minimum required by the job.
        required: usize,
    },

    /// Invalid user-provided parameters or API misuse.
    #[error("validation error: {0}")]
    Validation(String),

    /// The job was cancelled through its cancel token.
    #[error("job cancelled")]
    Cancelled,

    /// The job exceeded its wall-clock budget.
    #[error("job timed out after {0:?}")]
    TimedOut(Duration),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MillError {
    /// Build a [`MillError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MillError::UnreadableContainer`] value.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnreadableContainer {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`MillError::IncompatibleAudioFormat`] value.
    pub fn incompatible_audio(msg: impl Into<String>) -> Self {
        Self::IncompatibleAudioFormat(msg.into())
    }

    /// Build a [`MillError::PartialWriteFailure`] value.
    pub fn partial_write(frame: u64, reason: impl Into<String>) -> Self {
        Self::PartialWriteFailure {
            frame,
            reason: reason.into(),
        }
    }

    /// Wrap an ad-hoc message as [`MillError::Other`].
    pub fn other(msg: impl std::fmt::Display) -> Self {
        Self::Other(anyhow::anyhow!("{msg}"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
