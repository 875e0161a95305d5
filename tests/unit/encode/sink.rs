use super::*;

fn cfg() -> SinkConfig {
    SinkConfig {
        canvas: Canvas::new(2, 2).unwrap(),
        fps: Fps::new(30, 1).unwrap(),
        layout: PixelLayout::Rgb8,
        audio: None,
    }
}

fn frame(w: u32, h: u32) -> Frame {
    Frame::filled(w, h, PixelLayout::Rgb8, [1, 2, 3, 255]).unwrap()
}

#[test]
fn in_memory_sink_captures_frames_in_order() {
    let mut sink = InMemorySink::new();
    sink.begin(cfg()).unwrap();
    sink.push_frame(FrameIndex(0), &frame(2, 2)).unwrap();
    sink.push_frame(FrameIndex(1), &frame(2, 2)).unwrap();
    sink.end().unwrap();

    assert!(sink.is_finished());
    assert_eq!(sink.frames().len(), 2);
    assert_eq!(sink.config().unwrap().fps, Fps::new(30, 1).unwrap());
}

#[test]
fn out_of_order_and_mismatched_frames_are_rejected() {
    let mut sink = InMemorySink::new();
    sink.begin(cfg()).unwrap();
    sink.push_frame(FrameIndex(3), &frame(2, 2)).unwrap();

    let err = sink.push_frame(FrameIndex(3), &frame(2, 2)).unwrap_err();
    assert!(err.to_string().contains("out-of-order"));
    assert!(sink.push_frame(FrameIndex(2), &frame(2, 2)).is_err());
    assert!(sink.push_frame(FrameIndex(4), &frame(4, 2)).is_err());

    let rgba = Frame::filled(2, 2, PixelLayout::Rgba8, [0, 0, 0, 0]).unwrap();
    assert!(sink.push_frame(FrameIndex(5), &rgba).is_err());
    assert_eq!(sink.frames().len(), 1);
}

#[test]
fn push_before_begin_fails_and_abort_discards() {
    let mut sink = InMemorySink::new();
    assert!(sink.push_frame(FrameIndex(0), &frame(2, 2)).is_err());
    assert!(sink.end().is_err());

    sink.begin(cfg()).unwrap();
    sink.push_frame(FrameIndex(0), &frame(2, 2)).unwrap();
    sink.abort();
    assert!(sink.is_aborted());
    assert!(sink.frames().is_empty());
}
