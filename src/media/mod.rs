//! Frame sources: probing input containers and decoding frames in order.

/// In-memory frame representation.
pub mod frame;
/// `ffprobe` metadata.
pub mod probe;
/// Decoding clips frame by frame.
pub mod source;
