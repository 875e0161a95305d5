use super::*;

fn frame(v: u8) -> MillResult<Frame> {
    Frame::filled(1, 1, PixelLayout::Rgb8, [v, v, v, 255])
}

#[test]
fn iter_source_yields_then_releases() {
    let mut src = IterSource::new(vec![frame(1), frame(2)].into_iter());
    assert_eq!(src.next_frame().unwrap().unwrap().data, vec![1, 1, 1]);
    src.release();
    assert!(src.next_frame().is_none());
    src.release();
}

#[test]
fn empty_concat_is_exhausted() {
    let mut src = ConcatSource::new(Vec::new());
    assert_eq!(src.total_frames(), 0);
    assert!(src.next_frame().is_none());
    src.release();
}

#[test]
fn opening_missing_clip_fails() {
    let err = MediaClip::open(Path::new("/no/such/clip.mp4"), &ToolPaths::default()).unwrap_err();
    assert!(matches!(err, MillError::InputNotFound(_)));
}
