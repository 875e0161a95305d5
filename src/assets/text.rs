use std::path::Path;

use anyhow::Context;

use crate::assets::overlay::{Overlay, unpremultiply_rgba8};
use crate::foundation::core::Rgba8;
use crate::foundation::error::{MillError, MillResult};

/// Styling for a rasterized text overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// Text to draw; may contain newlines.
    pub text: String,
    /// Font size in pixels.
    pub size_px: f32,
    /// Fill color.
    pub color: Rgba8,
    /// Outline color.
    pub stroke_color: Rgba8,
    /// Outline width in pixels, drawn outside the glyph edge. `0` disables the outline.
    pub stroke_width: f32,
}

impl TextStyle {
    /// White text with a 2 px black outline.
    pub fn new(text: impl Into<String>, size_px: f32) -> Self {
        Self {
            text: text.into(),
            size_px,
            color: Rgba8::rgb(255, 255, 255),
            stroke_color: Rgba8::rgb(0, 0, 0),
            stroke_width: 2.0,
        }
    }

    fn validate(&self) -> MillResult<()> {
        if self.text.trim().is_empty() {
            return Err(MillError::validation("overlay text must not be empty"));
        }
        if !self.size_px.is_finite() || self.size_px <= 0.0 {
            return Err(MillError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(MillError::validation(
                "text stroke_width must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct TextBrush {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

/// Shapes text with Parley and rasterizes it on the CPU into an alpha-masked [`Overlay`].
pub struct TextRasterizer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for TextRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRasterizer")
            .field("family_name", &self.family_name)
            .finish_non_exhaustive()
    }
}

impl TextRasterizer {
    /// Load a TrueType/OpenType font file.
    pub fn from_font_path(path: &Path) -> MillResult<Self> {
        if !path.is_file() {
            return Err(MillError::InputNotFound(path.to_path_buf()));
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
        Self::from_font_bytes(bytes)
    }

    /// Register raw font bytes.
    pub fn from_font_bytes(font_bytes: Vec<u8>) -> MillResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            MillError::validation("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| MillError::validation("registered font family has no name"))?
            .to_string();

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font: vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0),
        })
    }

    fn layout_plain(&mut self, text: &str, size_px: f32, brush: TextBrush) -> parley::Layout<TextBrush> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }

    /// Rasterize `style` into a tightly sized overlay with straight alpha.
    ///
    /// The outline is drawn first and the fill on top, so the visible outline extends
    /// `stroke_width` pixels beyond the glyph edge.
    pub fn rasterize(&mut self, style: &TextStyle) -> MillResult<Overlay> {
        style.validate()?;

        let fill = TextBrush {
            r: style.color.r,
            g: style.color.g,
            b: style.color.b,
            a: style.color.a,
        };
        let layout = self.layout_plain(&style.text, style.size_px, fill);

        let pad = f64::from(style.stroke_width.ceil());
        let to_dim = |v: f32| -> MillResult<u16> {
            let px = (f64::from(v) + 2.0 * pad).ceil().max(1.0);
            if px > f64::from(u16::MAX) {
                return Err(MillError::validation(format!(
                    "text raster too large: {px} px exceeds {}",
                    u16::MAX
                )));
            }
            Ok(px as u16)
        };
        let width = to_dim(layout.width())?;
        let height = to_dim(layout.height())?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((pad, pad)));

        if style.stroke_width > 0.0 {
            let s = style.stroke_color;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(s.r, s.g, s.b, s.a));
            ctx.set_stroke(vello_cpu::kurbo::Stroke::new(
                2.0 * f64::from(style.stroke_width),
            ));
            self.draw_glyphs(&mut ctx, &layout, true);
        }
        self.draw_glyphs(&mut ctx, &layout, false);

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        ctx.render_to_pixmap(&mut pixmap);

        let straight = unpremultiply_rgba8(pixmap.data_as_u8_slice().to_vec());
        let overlay = Overlay::from_rgba8(u32::from(width), u32::from(height), straight)?;
        tracing::debug!(
            width = overlay.width(),
            height = overlay.height(),
            size_px = style.size_px,
            "rasterized text overlay"
        );
        Ok(overlay)
    }

    fn draw_glyphs(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        layout: &parley::Layout<TextBrush>,
        stroke: bool,
    ) {
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                if !stroke {
                    let brush = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        brush.r, brush.g, brush.b, brush.a,
                    ));
                }
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                let builder = ctx.glyph_run(&self.font).font_size(run.run().font_size());
                if stroke {
                    builder.stroke_glyphs(glyphs);
                } else {
                    builder.fill_glyphs(glyphs);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/text.rs"]
mod tests;
