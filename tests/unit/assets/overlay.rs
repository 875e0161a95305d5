use std::io::Cursor;

use super::*;

fn encode_png(img: image::DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn png_with_alpha_keeps_straight_rgba() {
    let img = image::RgbaImage::from_raw(2, 1, vec![10, 20, 30, 128, 200, 100, 50, 255]).unwrap();
    let ovl = Overlay::from_image_bytes(&encode_png(image::DynamicImage::ImageRgba8(img)), None)
        .unwrap();
    assert!(ovl.has_alpha());
    assert_eq!((ovl.width(), ovl.height()), (2, 1));
    assert_eq!(ovl.data(), &[10, 20, 30, 128, 200, 100, 50, 255]);
}

#[test]
fn png_without_alpha_is_opaque_rgb() {
    let img = image::RgbImage::from_raw(1, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
    let ovl =
        Overlay::from_image_bytes(&encode_png(image::DynamicImage::ImageRgb8(img)), None).unwrap();
    assert!(!ovl.has_alpha());
    assert_eq!(ovl.channels(), 3);
    assert_eq!(ovl.data(), &[1, 2, 3, 4, 5, 6]);
}

#[test]
fn resize_forces_dimensions() {
    let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]));
    let ovl = Overlay::from_image_bytes(
        &encode_png(image::DynamicImage::ImageRgba8(img)),
        Some((4, 2)),
    )
    .unwrap();
    assert_eq!((ovl.width(), ovl.height()), (4, 2));
    assert_eq!(ovl.data().len(), 4 * 2 * 4);
}

#[test]
fn svg_rasterizes_with_alpha() {
    let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="6">
        <rect x="0" y="0" width="5" height="6" fill="#ff0000"/>
    </svg>"##;
    let ovl = Overlay::from_svg_bytes(svg, None).unwrap();
    assert!(ovl.has_alpha());
    assert_eq!((ovl.width(), ovl.height()), (10, 6));
    let px = |x: usize, y: usize| {
        let i = (y * 10 + x) * 4;
        &ovl.data()[i..i + 4]
    };
    assert_eq!(px(1, 1), &[255, 0, 0, 255]);
    assert_eq!(px(8, 1)[3], 0);

    let scaled = Overlay::from_svg_bytes(svg, Some((20, 12))).unwrap();
    assert_eq!((scaled.width(), scaled.height()), (20, 12));
}

#[test]
fn invalid_inputs_are_rejected() {
    assert!(Overlay::from_svg_bytes(b"<svg", None).is_err());
    assert!(Overlay::from_image_bytes(b"not an image", None).is_err());
    assert!(Overlay::from_rgb8(2, 2, vec![0; 11]).is_err());
    assert!(Overlay::from_rgba8(0, 2, vec![]).is_err());
    assert!(matches!(
        Overlay::from_path(Path::new("/no/such/logo.png"), None),
        Err(MillError::InputNotFound(_))
    ));
}

#[test]
fn unpremultiply_restores_straight_color() {
    let out = unpremultiply_rgba8(vec![64, 0, 128, 128, 9, 9, 9, 0, 1, 2, 3, 255]);
    assert_eq!(out, vec![128, 0, 255, 128, 0, 0, 0, 0, 1, 2, 3, 255]);
}
