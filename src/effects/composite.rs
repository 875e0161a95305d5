use crate::assets::overlay::Overlay;
use crate::foundation::error::{MillError, MillResult};
use crate::foundation::math::lerp_u8;
use crate::layout::placement::{PlacementSpec, resolve};
use crate::media::frame::{Frame, byte_len};

/// Blend `overlay` onto `frame` with its top-left corner at `(x, y)`.
///
/// The overlay is cropped to the frame; negative offsets crop its leading edge. With alpha,
/// each RGB channel becomes `a*overlay + (1-a)*frame`; without alpha the region is overwritten.
/// The frame's own alpha channel is left untouched. Nothing is written if validation fails.
pub fn composite(frame: &mut Frame, overlay: &Overlay, x: i64, y: i64) -> MillResult<()> {
    let expected = byte_len(frame.width, frame.height, frame.layout)?;
    if frame.data.len() != expected {
        return Err(MillError::validation(format!(
            "frame buffer has {} bytes, expected {expected}",
            frame.data.len()
        )));
    }

    let (fw, fh) = (i64::from(frame.width), i64::from(frame.height));
    let (ow, oh) = (i64::from(overlay.width()), i64::from(overlay.height()));
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = x.saturating_add(ow).min(fw);
    let y1 = y.saturating_add(oh).min(fh);
    if x1 <= x0 || y1 <= y0 {
        return Ok(());
    }

    let dst_ch = frame.layout.channels();
    let src_ch = overlay.channels();
    let dst_stride = frame.stride();
    let src_stride = overlay.width() as usize * src_ch;
    let cols = (x1 - x0) as usize;
    let src_x = (x0 - x) as usize;
    let src_y = (y0 - y) as usize;
    let src = overlay.data();

    for row in 0..(y1 - y0) as usize {
        let d_off = (y0 as usize + row) * dst_stride + x0 as usize * dst_ch;
        let s_off = (src_y + row) * src_stride + src_x * src_ch;
        let d_row = &mut frame.data[d_off..d_off + cols * dst_ch];
        let s_row = &src[s_off..s_off + cols * src_ch];

        for (d, s) in d_row.chunks_exact_mut(dst_ch).zip(s_row.chunks_exact(src_ch)) {
            if overlay.has_alpha() {
                let a = s[3];
                match a {
                    0 => {}
                    255 => d[..3].copy_from_slice(&s[..3]),
                    _ => {
                        d[0] = lerp_u8(d[0], s[0], a);
                        d[1] = lerp_u8(d[1], s[1], a);
                        d[2] = lerp_u8(d[2], s[2], a);
                    }
                }
            } else {
                d[..3].copy_from_slice(&s[..3]);
            }
        }
    }
    Ok(())
}

/// Resolve `spec` against the frame and composite the overlay there.
pub fn composite_placed(frame: &mut Frame, overlay: &Overlay, spec: &PlacementSpec) -> MillResult<()> {
    let (x, y) = resolve(
        spec,
        overlay.width(),
        overlay.height(),
        frame.width,
        frame.height,
    );
    composite(frame, overlay, i64::from(x), i64::from(y))
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
