//! Audio tracks: decoding, conforming to a duration and mixing.

/// Conform and mix operations.
pub mod mix;
/// PCM track type, decoding and raw PCM files.
pub mod track;
