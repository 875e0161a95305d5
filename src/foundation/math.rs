pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Linear interpolation `a*src + (1-a)*dst` in 8-bit fixed point, `a` in `0..=255`.
///
/// Exact at the endpoints: `a = 255` yields `src`, `a = 0` yields `dst`.
pub(crate) fn lerp_u8(dst: u8, src: u8, a: u8) -> u8 {
    let a = u16::from(a);
    let inv = 255 - a;
    (mul_div255_u16(u16::from(src), a) + mul_div255_u16(u16::from(dst), inv)).min(255) as u8
}

pub(crate) fn unpremultiply_u8(c: u8, a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
