//! Output encoding: codec negotiation and frame sinks.
//!
//! The negotiator picks the first codec/container pair that opens; the resulting handle is a
//! [`sink::FrameSink`] written in strictly increasing frame order.

/// Symbolic codec names and their `ffmpeg` settings.
pub mod codec;
/// `ffmpeg`-backed sink and trial encoding.
pub mod ffmpeg;
/// Codec/container negotiation.
pub mod negotiate;
/// Frame sink trait and built-in sinks.
pub mod sink;
