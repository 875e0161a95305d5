use super::*;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::effects::transform::TransformChain;
use crate::encode::sink::SinkConfig;
use crate::foundation::core::{Canvas, Fps};
use crate::media::frame::{Frame, PixelLayout};

type Log = Arc<Mutex<Vec<String>>>;

struct TestSource {
    frames: VecDeque<MillResult<Frame>>,
    log: Log,
}

impl TestSource {
    fn new(n: usize, log: &Log) -> Self {
        Self {
            frames: (0..n)
                .map(|i| Frame::filled(2, 2, PixelLayout::Rgb8, [i as u8, 0, 0, 255]))
                .collect(),
            log: log.clone(),
        }
    }
}

impl FrameSource for TestSource {
    fn next_frame(&mut self) -> Option<MillResult<Frame>> {
        self.frames.pop_front()
    }

    fn release(&mut self) {
        self.frames.clear();
        self.log.lock().unwrap().push("release".to_string());
    }
}

struct RecordingSink {
    log: Log,
    fail_at: Option<u64>,
}

impl FrameSink for RecordingSink {
    fn begin(&mut self, _cfg: SinkConfig) -> MillResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _frame: &Frame) -> MillResult<()> {
        if self.fail_at == Some(idx.0) {
            return Err(MillError::partial_write(idx.0, "broken pipe"));
        }
        self.log.lock().unwrap().push(format!("frame {}", idx.0));
        Ok(())
    }

    fn end(&mut self) -> MillResult<()> {
        self.log.lock().unwrap().push("end".to_string());
        Ok(())
    }

    fn abort(&mut self) {
        self.log.lock().unwrap().push("abort".to_string());
    }
}

struct FakeBackend {
    log: Log,
    fail_at: Option<u64>,
    available: bool,
}

impl FakeBackend {
    fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            fail_at: None,
            available: true,
        }
    }
}

impl EncoderBackend for FakeBackend {
    type Handle = RecordingSink;

    fn open(
        &mut self,
        _target: &EncodeTarget,
        candidate: &CodecCandidate,
        _path: &Path,
    ) -> MillResult<RecordingSink> {
        if !self.available {
            return Err(MillError::other(format!("{} unavailable", candidate.codec)));
        }
        self.log.lock().unwrap().push("open".to_string());
        Ok(RecordingSink {
            log: self.log.clone(),
            fail_at: self.fail_at,
        })
    }
}

struct NoopBackend;

impl EncoderBackend for NoopBackend {
    type Handle = ();

    fn open(&mut self, _: &EncodeTarget, _: &CodecCandidate, _: &Path) -> MillResult<()> {
        Ok(())
    }
}

fn target(tag: &str) -> EncodeTarget {
    EncodeTarget {
        path: std::env::temp_dir().join(format!(
            "clipmill_supervisor_{tag}_{}_{}.mp4",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        )),
        codecs: vec![CodecCandidate::new("h264", "mp4")],
        fps: Fps::new(30, 1).unwrap(),
        canvas: Canvas::new(2, 2).unwrap(),
        audio: None,
        overwrite: true,
        inputs: Vec::new(),
    }
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn writes_frames_in_order_then_releases_and_finalizes() {
    let log = Log::default();
    let mut source = TestSource::new(3, &log);
    let mut seen = Vec::new();
    let mut observer = |p: Progress| seen.push((p.done, p.total));

    let mut sup = EncodeSupervisor::new(&mut observer);
    let report = sup
        .run_in_process(
            &mut source,
            &mut TransformChain::new(),
            &target("ok"),
            &mut FakeBackend::new(&log),
            3,
        )
        .unwrap();
    assert_eq!(sup.state(), EncodeState::Completed);
    drop(sup);

    assert_eq!(report.frames, 3);
    assert_eq!(report.codec, CodecCandidate::new("h264", "mp4"));
    assert_eq!(
        entries(&log),
        vec!["open", "frame 0", "frame 1", "frame 2", "release", "end"]
    );
    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn write_failure_releases_source_before_aborting_output() {
    let log = Log::default();
    let mut source = TestSource::new(3, &log);
    let mut backend = FakeBackend::new(&log);
    backend.fail_at = Some(1);
    let mut observer = |_: Progress| {};

    let mut sup = EncodeSupervisor::new(&mut observer);
    let err = sup
        .run_in_process(
            &mut source,
            &mut TransformChain::new(),
            &target("fail"),
            &mut backend,
            3,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::PartialWriteFailure { frame: 1, .. }));
    assert_eq!(sup.state(), EncodeState::Failed);
    assert_eq!(entries(&log), vec!["open", "frame 0", "release", "abort"]);
}

#[test]
fn cancellation_before_start_never_opens_output() {
    let log = Log::default();
    let mut source = TestSource::new(2, &log);
    let token = CancelToken::new();
    token.cancel();
    let mut observer = |_: Progress| {};

    let mut sup = EncodeSupervisor::new(&mut observer).with_cancel(token);
    let err = sup
        .run_in_process(
            &mut source,
            &mut TransformChain::new(),
            &target("precancel"),
            &mut FakeBackend::new(&log),
            2,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::Cancelled));
    assert_eq!(sup.state(), EncodeState::Failed);
    assert_eq!(entries(&log), vec!["release"]);
}

#[test]
fn cancellation_is_observed_at_the_next_frame_boundary() {
    let log = Log::default();
    let mut source = TestSource::new(5, &log);
    let token = CancelToken::new();
    let trigger = token.clone();
    let mut observer = move |p: Progress| {
        if p.done == 2 {
            trigger.cancel();
        }
    };

    let mut sup = EncodeSupervisor::new(&mut observer).with_cancel(token);
    let err = sup
        .run_in_process(
            &mut source,
            &mut TransformChain::new(),
            &target("midcancel"),
            &mut FakeBackend::new(&log),
            5,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::Cancelled));
    assert_eq!(
        entries(&log),
        vec!["open", "frame 0", "frame 1", "release", "abort"]
    );
}

#[test]
fn zero_timeout_fails_immediately() {
    let log = Log::default();
    let mut source = TestSource::new(2, &log);
    let mut observer = |_: Progress| {};

    let mut sup = EncodeSupervisor::new(&mut observer).with_timeout(Some(Duration::ZERO));
    let err = sup
        .run_in_process(
            &mut source,
            &mut TransformChain::new(),
            &target("timeout"),
            &mut FakeBackend::new(&log),
            2,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::TimedOut(_)));
}

#[test]
fn empty_source_is_an_error_and_aborts() {
    let log = Log::default();
    let mut source = TestSource::new(0, &log);
    let mut observer = |_: Progress| {};

    let mut sup = EncodeSupervisor::new(&mut observer);
    let err = sup
        .run_in_process(
            &mut source,
            &mut TransformChain::new(),
            &target("empty"),
            &mut FakeBackend::new(&log),
            0,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::Validation(_)));
    assert_eq!(entries(&log), vec!["open", "release", "abort"]);
}

#[test]
fn negotiation_failure_releases_source() {
    let log = Log::default();
    let mut source = TestSource::new(2, &log);
    let mut backend = FakeBackend::new(&log);
    backend.available = false;
    let mut observer = |_: Progress| {};

    let mut sup = EncodeSupervisor::new(&mut observer);
    let err = sup
        .run_in_process(
            &mut source,
            &mut TransformChain::new(),
            &target("nocodec"),
            &mut backend,
            2,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::NoCodecAvailable { .. }));
    assert_eq!(sup.state(), EncodeState::Failed);
    assert_eq!(entries(&log), vec!["release"]);
}

#[test]
fn supervisor_runs_a_single_encode() {
    let log = Log::default();
    let mut observer = |_: Progress| {};
    let mut sup = EncodeSupervisor::new(&mut observer);
    sup.run_in_process(
        &mut TestSource::new(1, &log),
        &mut TransformChain::new(),
        &target("once"),
        &mut FakeBackend::new(&log),
        1,
    )
    .unwrap();
    let err = sup
        .run_in_process(
            &mut TestSource::new(1, &log),
            &mut TransformChain::new(),
            &target("twice"),
            &mut FakeBackend::new(&log),
            1,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::Validation(_)));
}

#[cfg(unix)]
fn shell(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", script]);
    cmd
}

#[cfg(unix)]
#[test]
fn external_progress_is_parsed_from_stderr() {
    let mut seen = Vec::new();
    let mut observer = |p: Progress| seen.push(p.done);
    let mut sup = EncodeSupervisor::new(&mut observer);
    let report = sup
        .run_external(
            &target("ext_ok"),
            &mut NoopBackend,
            |_| {
                Ok(shell(
                    "printf 'frame=    1 fps=0.0\\rframe=    5 fps=0.0\\n' >&2; exit 0",
                ))
            },
            5,
        )
        .unwrap();
    assert_eq!(sup.state(), EncodeState::Completed);
    drop(sup);
    assert_eq!(report.frames, 5);
    assert_eq!(seen, vec![1, 5]);
}

#[cfg(unix)]
#[test]
fn external_failure_carries_exit_code_and_removes_output() {
    let t = target("ext_fail");
    let mut observer = |_: Progress| {};
    let mut sup = EncodeSupervisor::new(&mut observer);
    let err = sup
        .run_external(
            &t,
            &mut NoopBackend,
            |n| {
                let mut cmd = shell("touch \"$OUT\"; echo 'Unknown encoder boom' >&2; exit 3");
                cmd.env("OUT", &n.path);
                Ok(cmd)
            },
            10,
        )
        .unwrap_err();
    match err {
        MillError::ExternalEncodeFailed { code, stderr_tail } => {
            assert_eq!(code, Some(3));
            assert!(stderr_tail.contains("Unknown encoder boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sup.state(), EncodeState::Failed);
    assert!(!t.path.exists());
}

#[cfg(unix)]
#[test]
fn external_timeout_kills_the_process() {
    let started = Instant::now();
    let mut observer = |_: Progress| {};
    let mut sup =
        EncodeSupervisor::new(&mut observer).with_timeout(Some(Duration::from_millis(200)));
    let err = sup
        .run_external(
            &target("ext_timeout"),
            &mut NoopBackend,
            |_| Ok(shell("exec sleep 10")),
            0,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::TimedOut(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn external_cancellation_kills_the_process() {
    let token = CancelToken::new();
    let trigger = token.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        trigger.cancel();
    });
    let started = Instant::now();
    let mut observer = |_: Progress| {};
    let mut sup = EncodeSupervisor::new(&mut observer).with_cancel(token);
    let err = sup
        .run_external(
            &target("ext_cancel"),
            &mut NoopBackend,
            |_| Ok(shell("exec sleep 10")),
            0,
        )
        .unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, MillError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn external_timeout_applies_after_stderr_closes() {
    let started = Instant::now();
    let mut observer = |_: Progress| {};
    let mut sup =
        EncodeSupervisor::new(&mut observer).with_timeout(Some(Duration::from_millis(300)));
    let err = sup
        .run_external(
            &target("ext_quiet"),
            &mut NoopBackend,
            |_| Ok(shell("exec 2>&-; exec sleep 10")),
            0,
        )
        .unwrap_err();
    assert!(matches!(err, MillError::TimedOut(_)));
    assert_eq!(sup.state(), EncodeState::Failed);
    assert!(started.elapsed() < Duration::from_secs(5));
}
