//! Encode supervision: progress reporting, cancellation and the encode lifecycle.
//!
//! An [`supervisor::EncodeSupervisor`] owns exactly one encode. In-process encodes pull frames
//! through a transform chain into a negotiated sink; external encodes delegate to an `ffmpeg`
//! process and follow its progress on stderr.

/// Progress parsing for external encoder processes.
pub mod external;
/// Progress observers and cancellation.
pub mod progress;
/// Encode lifecycle state machine.
pub mod supervisor;
