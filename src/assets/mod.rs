//! Overlay assets: raster images, SVG logos and rasterized text.

/// Image and SVG overlays.
pub mod overlay;
/// Text rasterization.
pub mod text;
