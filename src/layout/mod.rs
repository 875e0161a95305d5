//! Overlay placement.

/// Placement specs and the clamped position resolver.
pub mod placement;
