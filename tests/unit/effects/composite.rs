use super::*;
use crate::layout::placement::{Corner, Placement};
use crate::media::frame::PixelLayout;

fn gray_frame(w: u32, h: u32) -> Frame {
    Frame::filled(w, h, PixelLayout::Rgb8, [100, 100, 100, 255]).unwrap()
}

fn rgba_overlay(w: u32, h: u32, px: [u8; 4]) -> Overlay {
    Overlay::from_rgba8(w, h, px.repeat((w * h) as usize)).unwrap()
}

#[test]
fn opaque_overlay_overwrites_roi() {
    let mut frame = gray_frame(8, 8);
    let ovl = rgba_overlay(2, 3, [10, 20, 30, 255]);
    composite(&mut frame, &ovl, 4, 2).unwrap();
    for y in 0..8 {
        for x in 0..8 {
            let inside = (4..6).contains(&x) && (2..5).contains(&y);
            let want: &[u8] = if inside { &[10, 20, 30] } else { &[100, 100, 100] };
            assert_eq!(frame.pixel(x, y), want, "({x},{y})");
        }
    }
}

#[test]
fn transparent_overlay_is_a_no_op() {
    let mut frame = gray_frame(4, 4);
    let before = frame.clone();
    composite(&mut frame, &rgba_overlay(4, 4, [255, 0, 0, 0]), 0, 0).unwrap();
    assert_eq!(frame, before);
}

#[test]
fn half_alpha_blends_linearly() {
    let mut frame = Frame::filled(1, 1, PixelLayout::Rgb8, [0, 255, 100, 255]).unwrap();
    composite(&mut frame, &rgba_overlay(1, 1, [255, 0, 100, 128]), 0, 0).unwrap();
    assert_eq!(frame.pixel(0, 0), &[128, 127, 100]);
}

#[test]
fn rgb_overlay_overwrites() {
    let mut frame = gray_frame(3, 1);
    let ovl = Overlay::from_rgb8(2, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
    composite(&mut frame, &ovl, 1, 0).unwrap();
    assert_eq!(frame.data, vec![100, 100, 100, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn rgba_frame_alpha_is_preserved() {
    let mut frame = Frame::filled(2, 1, PixelLayout::Rgba8, [0, 0, 0, 77]).unwrap();
    composite(&mut frame, &rgba_overlay(2, 1, [200, 200, 200, 255]), 0, 0).unwrap();
    assert_eq!(frame.data, vec![200, 200, 200, 77, 200, 200, 200, 77]);
}

#[test]
fn negative_offset_crops_leading_edge() {
    let mut frame = gray_frame(2, 2);
    let ovl = Overlay::from_rgb8(
        2,
        2,
        vec![
            1, 1, 1, 2, 2, 2, //
            3, 3, 3, 4, 4, 4,
        ],
    )
    .unwrap();
    composite(&mut frame, &ovl, -1, -1).unwrap();
    assert_eq!(frame.pixel(0, 0), &[4, 4, 4]);
    assert_eq!(frame.pixel(1, 0), &[100, 100, 100]);
    assert_eq!(frame.pixel(0, 1), &[100, 100, 100]);
}

#[test]
fn oversized_and_offscreen_overlays() {
    let mut frame = gray_frame(2, 2);
    composite(&mut frame, &rgba_overlay(5, 5, [9, 9, 9, 255]), 0, 0).unwrap();
    assert!(frame.data.iter().all(|&b| b == 9));

    let mut frame = gray_frame(2, 2);
    let before = frame.clone();
    composite(&mut frame, &rgba_overlay(1, 1, [9, 9, 9, 255]), 10, 10).unwrap();
    assert_eq!(frame, before);
}

#[test]
fn corrupt_frame_is_rejected_before_writing() {
    let mut frame = gray_frame(2, 2);
    frame.data.pop();
    let snapshot = frame.data.clone();
    assert!(composite(&mut frame, &rgba_overlay(1, 1, [0, 0, 0, 255]), 0, 0).is_err());
    assert_eq!(frame.data, snapshot);
}

#[test]
fn placed_composite_uses_resolver() {
    let mut frame = gray_frame(10, 10);
    let spec = PlacementSpec::new(Placement::Corner(Corner::BottomRight), 1);
    composite_placed(&mut frame, &rgba_overlay(2, 2, [0, 0, 0, 255]), &spec).unwrap();
    assert_eq!(frame.pixel(7, 7), &[0, 0, 0]);
    assert_eq!(frame.pixel(8, 8), &[0, 0, 0]);
    assert_eq!(frame.pixel(9, 9), &[100, 100, 100]);
}
