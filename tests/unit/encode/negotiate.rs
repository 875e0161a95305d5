use super::*;

struct FakeBackend {
    available: Vec<&'static str>,
    attempts: Vec<String>,
    touch_on_failure: bool,
}

impl EncoderBackend for FakeBackend {
    type Handle = String;

    fn open(
        &mut self,
        _target: &EncodeTarget,
        candidate: &CodecCandidate,
        path: &Path,
    ) -> MillResult<String> {
        self.attempts.push(candidate.label());
        if self.available.contains(&candidate.codec.as_str()) {
            std::fs::write(path, b"ok").unwrap();
            return Ok(candidate.codec.clone());
        }
        if self.touch_on_failure {
            std::fs::write(path, b"partial").unwrap();
        }
        Err(MillError::other(format!("{} unavailable", candidate.codec)))
    }
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "clipmill_negotiate_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn target(path: PathBuf, codecs: &[(&str, &str)]) -> EncodeTarget {
    EncodeTarget {
        path,
        codecs: codecs
            .iter()
            .map(|(c, k)| CodecCandidate::new(*c, *k))
            .collect(),
        fps: Fps::new(30, 1).unwrap(),
        canvas: Canvas::new(64, 64).unwrap(),
        audio: None,
        overwrite: true,
        inputs: Vec::new(),
    }
}

#[test]
fn falls_back_to_first_available_and_cleans_failed_attempt() {
    let dir = scratch_dir("fallback");
    let t = target(dir.join("out.webm"), &[("vp9", "webm"), ("h264", "mp4")]);
    let mut backend = FakeBackend {
        available: vec!["h264"],
        attempts: vec![],
        touch_on_failure: true,
    };

    let got = CodecNegotiator::negotiate(&t, &mut backend).unwrap();
    assert_eq!(got.handle, "h264");
    assert_eq!(got.path, dir.join("out.mp4"));
    assert_eq!(got.rejected, vec!["vp9/webm".to_string()]);
    assert_eq!(backend.attempts, vec!["vp9/webm", "h264/mp4"]);
    assert!(!dir.join("out.webm").exists());
    assert!(dir.join("out.mp4").exists());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn stops_at_first_success() {
    let dir = scratch_dir("first");
    let t = target(
        dir.join("out.mp4"),
        &[("h264", "mp4"), ("mpeg4", "mp4"), ("mjpeg", "avi")],
    );
    let mut backend = FakeBackend {
        available: vec!["h264", "mpeg4", "mjpeg"],
        attempts: vec![],
        touch_on_failure: false,
    };
    let got = CodecNegotiator::negotiate(&t, &mut backend).unwrap();
    assert_eq!(got.candidate, CodecCandidate::new("h264", "mp4"));
    assert_eq!(backend.attempts.len(), 1);
    assert!(got.rejected.is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn exhaustion_reports_every_candidate_and_leaves_nothing() {
    let dir = scratch_dir("none");
    let t = target(dir.join("out.mp4"), &[("vp9", "webm"), ("av1", "mkv")]);
    let mut backend = FakeBackend {
        available: vec![],
        attempts: vec![],
        touch_on_failure: true,
    };
    let err = CodecNegotiator::negotiate(&t, &mut backend).unwrap_err();
    match err {
        MillError::NoCodecAvailable { tried } => {
            assert_eq!(tried, vec!["vp9/webm".to_string(), "av1/mkv".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn existing_output_is_respected_without_overwrite() {
    let dir = scratch_dir("exists");
    std::fs::write(dir.join("out.mp4"), b"keep").unwrap();
    let mut t = target(dir.join("out.mp4"), &[("h264", "mp4")]);
    t.overwrite = false;
    let mut backend = FakeBackend {
        available: vec!["h264"],
        attempts: vec![],
        touch_on_failure: false,
    };
    assert!(matches!(
        CodecNegotiator::negotiate(&t, &mut backend),
        Err(MillError::Validation(_))
    ));
    assert!(backend.attempts.is_empty());
    assert_eq!(std::fs::read(dir.join("out.mp4")).unwrap(), b"keep");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn empty_preferences_are_rejected() {
    let t = target(PathBuf::from("out.mp4"), &[]);
    let mut backend = FakeBackend {
        available: vec![],
        attempts: vec![],
        touch_on_failure: false,
    };
    assert!(CodecNegotiator::negotiate(&t, &mut backend).is_err());
}

#[test]
fn sink_config_uses_rgb_frames() {
    let t = target(PathBuf::from("out.mp4"), &[("h264", "mp4")]);
    let cfg = t.sink_config();
    assert_eq!(cfg.layout, PixelLayout::Rgb8);
    assert_eq!(cfg.canvas, t.canvas);
}

#[test]
fn rewritten_extension_never_lands_on_an_input() {
    let dir = scratch_dir("input");
    let input = dir.join("clip.mp4");
    std::fs::write(&input, b"source").unwrap();
    let mut t = target(dir.join("clip.avi"), &[("h264", "mp4")]);
    t.inputs = vec![input.clone()];
    let mut backend = FakeBackend {
        available: vec!["h264"],
        attempts: vec![],
        touch_on_failure: false,
    };

    let err = CodecNegotiator::negotiate(&t, &mut backend).unwrap_err();
    assert!(matches!(err, MillError::Validation(ref m) if m.contains("overwrite an input")));
    assert!(backend.attempts.is_empty());
    assert_eq!(std::fs::read(&input).unwrap(), b"source");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn failed_attempt_puts_back_an_existing_file() {
    let dir = scratch_dir("restore");
    std::fs::write(dir.join("out.webm"), b"USER FILE").unwrap();
    let t = target(dir.join("out.webm"), &[("vp9", "webm"), ("h264", "mp4")]);
    let mut backend = FakeBackend {
        available: vec!["h264"],
        attempts: vec![],
        touch_on_failure: true,
    };

    let got = CodecNegotiator::negotiate(&t, &mut backend).unwrap();
    assert_eq!(got.path, dir.join("out.mp4"));
    assert_eq!(std::fs::read(dir.join("out.webm")).unwrap(), b"USER FILE");
    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["out.mp4", "out.webm"]);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn successful_attempt_replaces_an_existing_file() {
    let dir = scratch_dir("replace");
    std::fs::write(dir.join("out.mp4"), b"old").unwrap();
    let t = target(dir.join("out.mp4"), &[("h264", "mp4")]);
    let mut backend = FakeBackend {
        available: vec!["h264"],
        attempts: vec![],
        touch_on_failure: false,
    };

    CodecNegotiator::negotiate(&t, &mut backend).unwrap();
    assert_eq!(std::fs::read(dir.join("out.mp4")).unwrap(), b"ok");
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn trial_backend_without_ffmpeg_exhausts_every_candidate() {
    let dir = scratch_dir("no_ffmpeg");
    let t = target(dir.join("out.webm"), &[("vp9", "webm"), ("h264", "mp4")]);
    let tools = ToolPaths {
        ffmpeg: dir.join("no-such-ffmpeg"),
        ffprobe: dir.join("no-such-ffprobe"),
    };
    let mut backend = TrialBackend::new(tools);

    match CodecNegotiator::negotiate(&t, &mut backend) {
        Err(MillError::NoCodecAvailable { tried }) => {
            assert_eq!(tried, vec!["vp9/webm".to_string(), "h264/mp4".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn trial_backend_skips_an_encoder_ffmpeg_lacks() {
    let tools = ToolPaths::default();
    if !tools.available() {
        return;
    }
    let dir = scratch_dir("trial");
    let t = target(
        dir.join("out.mkv"),
        &[("clipmill_no_such_encoder", "mkv"), ("mpeg4", "mp4")],
    );
    let mut backend = TrialBackend::new(tools);

    let got = CodecNegotiator::negotiate(&t, &mut backend).unwrap();
    assert_eq!(got.candidate, CodecCandidate::new("mpeg4", "mp4"));
    assert_eq!(got.path, dir.join("out.mp4"));
    assert_eq!(got.rejected, vec!["clipmill_no_such_encoder/mkv".to_string()]);
    assert_eq!(got.handle.video_encoder, "mpeg4");
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

    std::fs::remove_dir_all(&dir).unwrap();
}
