//! Per-frame image operations.

/// Alpha compositing of overlays.
pub mod composite;
/// Frame transform steps used by the in-process encode loop.
pub mod transform;
