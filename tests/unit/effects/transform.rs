use super::*;
use crate::layout::placement::{Corner, Placement};

fn solid(w: u32, h: u32, rgb: [u8; 3]) -> Frame {
    Frame::filled(w, h, PixelLayout::Rgb8, [rgb[0], rgb[1], rgb[2], 255]).unwrap()
}

#[test]
fn chain_folds_canvas_and_applies_in_order() {
    let mut chain = TransformChain::new();
    let logo = Overlay::from_rgb8(1, 1, vec![255, 0, 0]).unwrap();
    chain
        .push(OverlayStep::new(
            logo,
            PlacementSpec::new(Placement::Corner(Corner::TopLeft), 0),
        ))
        .push(UpscaleStep::new(LanczosUpscaler::new(2).unwrap()));
    assert_eq!(chain.len(), 2);

    let input = Canvas::new(4, 4).unwrap();
    assert_eq!(chain.output_canvas(input), Canvas::new(8, 8).unwrap());

    let out = chain.apply(solid(4, 4, [0, 0, 255])).unwrap();
    assert_eq!(out.canvas(), Canvas::new(8, 8).unwrap());
    assert_eq!(out.pixel(7, 7), &[0, 0, 255]);
    assert!(out.pixel(0, 0)[0] > 128);
}

#[test]
fn empty_chain_is_identity() {
    let mut chain = TransformChain::new();
    assert!(chain.is_empty());
    let f = solid(3, 2, [1, 2, 3]);
    assert_eq!(chain.apply(f.clone()).unwrap(), f);
}

#[test]
fn resize_to_height_keeps_aspect_and_even_dims() {
    let r = Resize::to_height(Canvas::new(1920, 1080).unwrap(), 720, true).unwrap();
    assert_eq!(r.target(), Canvas::new(1280, 720).unwrap());

    let r = Resize::to_height(Canvas::new(641, 480).unwrap(), 241, false).unwrap();
    assert!(r.target().is_even());
    assert_eq!(r.target().height, 240);

    assert!(Resize::to_height(Canvas::new(10, 10).unwrap(), 1, false).is_err());
}

#[test]
fn resize_preserves_solid_color() {
    let mut r = Resize::new(Canvas::new(6, 4).unwrap(), false);
    let out = r.apply(solid(3, 2, [40, 80, 120])).unwrap();
    assert_eq!(out.canvas(), Canvas::new(6, 4).unwrap());
    assert!(out.data.chunks_exact(3).all(|p| p == [40, 80, 120]));
}

#[test]
fn upscaler_factor_is_validated() {
    assert!(LanczosUpscaler::new(0).is_err());
    assert!(LanczosUpscaler::new(9).is_err());
    assert_eq!(LanczosUpscaler::new(4).unwrap().factor(), 4);
}

struct Broken;

impl Upscaler for Broken {
    fn factor(&self) -> u32 {
        2
    }

    fn upscale(&mut self, frame: Frame) -> MillResult<Frame> {
        Ok(frame)
    }
}

#[test]
fn upscale_step_rejects_wrong_output_size() {
    let mut step = UpscaleStep::new(Broken);
    let err = step.apply(solid(2, 2, [0, 0, 0])).unwrap_err();
    assert!(err.to_string().contains("expected 4x4"));
}

#[test]
fn letterbox_centers_smaller_frames() {
    let mut lb = Letterbox::new(Canvas::new(6, 4).unwrap());
    let out = lb.apply(solid(2, 2, [255, 255, 255])).unwrap();
    assert_eq!(out.canvas(), Canvas::new(6, 4).unwrap());
    assert_eq!(out.pixel(0, 0), &[0, 0, 0]);
    assert_eq!(out.pixel(2, 1), &[255, 255, 255]);
    assert_eq!(out.pixel(3, 2), &[255, 255, 255]);
    assert_eq!(out.pixel(4, 1), &[0, 0, 0]);
}

#[test]
fn letterbox_shrinks_larger_frames() {
    let mut lb = Letterbox::new(Canvas::new(4, 4).unwrap());
    let out = lb.apply(solid(8, 4, [10, 200, 10])).unwrap();
    assert_eq!(out.canvas(), Canvas::new(4, 4).unwrap());
    assert_eq!(out.pixel(0, 0), &[0, 0, 0]);
    assert_eq!(out.pixel(0, 1), &[10, 200, 10]);
    assert_eq!(out.pixel(3, 2), &[10, 200, 10]);
    assert_eq!(out.pixel(0, 3), &[0, 0, 0]);
}

#[test]
fn crop_keeps_top_left_region() {
    let frame = Frame::new(
        3,
        2,
        PixelLayout::Rgb8,
        (0u8..18).collect(),
    )
    .unwrap();
    let mut crop = Crop::new(Canvas::new(2, 2).unwrap());
    let out = crop.apply(frame).unwrap();
    assert_eq!(out.data, vec![0, 1, 2, 3, 4, 5, 9, 10, 11, 12, 13, 14]);
    assert!(crop.apply(solid(1, 1, [0, 0, 0])).is_err());
}
