use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::effects::transform::FrameTransform;
use crate::encode::codec::CodecCandidate;
use crate::encode::negotiate::{CodecNegotiator, EncodeTarget, EncoderBackend, Negotiated};
use crate::encode::sink::FrameSink;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MillError, MillResult};
use crate::media::source::FrameSource;
use crate::session::external::{FfmpegStderrProgress, ProgressSource};
use crate::session::progress::{CancelToken, Progress, ProgressObserver};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of one encode. `Opened` is reached only after codec negotiation succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeState {
    /// Nothing started.
    Idle,
    /// Output negotiated and opened.
    Opened,
    /// Frames are flowing.
    Writing,
    /// Output finalized.
    Completed,
    /// Terminal failure; resources were released and partial output removed.
    Failed,
}

/// Summary of a completed encode.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeReport {
    /// Path of the written file.
    pub output: PathBuf,
    /// Codec/container that was used.
    pub codec: CodecCandidate,
    /// Frames written (in-process) or last frame reported (external).
    pub frames: u64,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

/// Drives one encode to completion, in-process or through an external process.
///
/// A supervisor runs a single encode; reuse after it leaves `Idle` is rejected.
pub struct EncodeSupervisor<'o> {
    state: EncodeState,
    cancel: CancelToken,
    timeout: Option<Duration>,
    observer: &'o mut dyn ProgressObserver,
}

impl<'o> EncodeSupervisor<'o> {
    /// Report progress to `observer`.
    pub fn new(observer: &'o mut dyn ProgressObserver) -> Self {
        Self {
            state: EncodeState::Idle,
            cancel: CancelToken::new(),
            timeout: None,
            observer,
        }
    }

    /// Observe `cancel` at every frame boundary and poll tick.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fail with [`MillError::TimedOut`] once `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current state.
    pub fn state(&self) -> EncodeState {
        self.state
    }

    fn ensure_idle(&self) -> MillResult<()> {
        if self.state != EncodeState::Idle {
            return Err(MillError::validation(format!(
                "encode supervisor already used (state {:?})",
                self.state
            )));
        }
        Ok(())
    }

    fn checkpoint(&self, started: Instant) -> MillResult<()> {
        if self.cancel.is_cancelled() {
            return Err(MillError::Cancelled);
        }
        if let Some(limit) = self.timeout
            && started.elapsed() >= limit
        {
            return Err(MillError::TimedOut(limit));
        }
        Ok(())
    }

    /// Pull frames from `source`, run them through `transforms` and write them to an output
    /// negotiated for `target`.
    ///
    /// On any failure the source is released first, then the write handle is aborted (which
    /// removes the partial file), and the error is returned.
    #[tracing::instrument(skip_all, fields(out = %target.path.display()))]
    pub fn run_in_process<S, T, B>(
        &mut self,
        source: &mut S,
        transforms: &mut T,
        target: &EncodeTarget,
        backend: &mut B,
        total: u64,
    ) -> MillResult<EncodeReport>
    where
        S: FrameSource + ?Sized,
        T: FrameTransform + ?Sized,
        B: EncoderBackend,
        B::Handle: FrameSink,
    {
        self.ensure_idle()?;
        let started = Instant::now();

        let negotiated = match self
            .checkpoint(started)
            .and_then(|()| CodecNegotiator::negotiate(target, backend))
        {
            Ok(n) => n,
            Err(e) => {
                source.release();
                self.state = EncodeState::Failed;
                return Err(e);
            }
        };
        self.state = EncodeState::Opened;
        let Negotiated {
            mut handle,
            path,
            candidate,
            ..
        } = negotiated;

        let written = self.pump(source, transforms, &mut handle, total, started);
        source.release();
        let finished = written.and_then(|frames| handle.end().map(|()| frames));

        match finished {
            Ok(frames) => {
                self.state = EncodeState::Completed;
                tracing::info!(
                    out = %path.display(),
                    codec = %candidate,
                    frames,
                    "encode completed"
                );
                Ok(EncodeReport {
                    output: path,
                    codec: candidate,
                    frames,
                    elapsed: started.elapsed(),
                })
            }
            Err(e) => {
                handle.abort();
                self.state = EncodeState::Failed;
                tracing::warn!(out = %path.display(), error = %e, "encode failed");
                Err(e)
            }
        }
    }

    fn pump<S, T, K>(
        &mut self,
        source: &mut S,
        transforms: &mut T,
        handle: &mut K,
        total: u64,
        started: Instant,
    ) -> MillResult<u64>
    where
        S: FrameSource + ?Sized,
        T: FrameTransform + ?Sized,
        K: FrameSink,
    {
        self.state = EncodeState::Writing;
        let mut done = 0u64;
        loop {
            self.checkpoint(started)?;
            let Some(item) = source.next_frame() else {
                break;
            };
            let frame = transforms.apply(item?)?;
            handle.push_frame(FrameIndex(done), &frame)?;
            done += 1;
            self.observer.on_progress(Progress { done, total });
        }
        if done == 0 {
            return Err(MillError::validation("frame source produced no frames"));
        }
        Ok(done)
    }

    /// Negotiate a codec for `target`, then launch the command produced by `build` and supervise
    /// it until exit.
    ///
    /// Progress comes from `frame=` tokens on the process' stderr, read by one monitor thread.
    /// A non-zero exit maps to [`MillError::ExternalEncodeFailed`]; on any failure the child is
    /// killed and the output file is removed.
    #[tracing::instrument(skip_all, fields(out = %target.path.display()))]
    pub fn run_external<B, F>(
        &mut self,
        target: &EncodeTarget,
        backend: &mut B,
        build: F,
        total: u64,
    ) -> MillResult<EncodeReport>
    where
        B: EncoderBackend,
        F: FnOnce(&Negotiated<B::Handle>) -> MillResult<Command>,
    {
        self.ensure_idle()?;
        let started = Instant::now();

        let prepared = self
            .checkpoint(started)
            .and_then(|()| CodecNegotiator::negotiate(target, backend))
            .and_then(|n| build(&n).map(|cmd| (n, cmd)));
        let (negotiated, mut cmd) = match prepared {
            Ok(v) => v,
            Err(e) => {
                self.state = EncodeState::Failed;
                return Err(e);
            }
        };
        self.state = EncodeState::Opened;

        let result = self.supervise(&mut cmd, total, started);
        match result {
            Ok(frames) => {
                self.state = EncodeState::Completed;
                tracing::info!(
                    out = %negotiated.path.display(),
                    codec = %negotiated.candidate,
                    frames,
                    "external encode completed"
                );
                Ok(EncodeReport {
                    output: negotiated.path,
                    codec: negotiated.candidate,
                    frames,
                    elapsed: started.elapsed(),
                })
            }
            Err(e) => {
                self.state = EncodeState::Failed;
                remove_partial(&negotiated.path);
                tracing::warn!(out = %negotiated.path.display(), error = %e, "external encode failed");
                Err(e)
            }
        }
    }

    fn supervise(&mut self, cmd: &mut Command, total: u64, started: Instant) -> MillResult<u64> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| MillError::other(format!("failed to spawn encoder process: {e}")))?;
        let stderr = match child.stderr.take() {
            Some(s) => s,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MillError::other("failed to open encoder stderr"));
            }
        };
        self.state = EncodeState::Writing;

        let (tx, rx) = mpsc::channel::<u64>();
        let monitor = std::thread::spawn(move || {
            let mut progress = FfmpegStderrProgress::new(BufReader::new(stderr));
            while let Some(n) = progress.next_progress_event() {
                if tx.send(n).is_err() {
                    progress.drain();
                    break;
                }
            }
            progress.tail()
        });

        let mut done = 0u64;
        let mut stderr_open = true;
        let stopped = loop {
            if let Err(e) = self.checkpoint(started) {
                break Err(e);
            }
            if stderr_open {
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(n) => {
                        done = n;
                        self.observer.on_progress(Progress { done, total });
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => stderr_open = false,
                }
                continue;
            }
            // Stderr is closed but the process may still run; keep honoring cancel and timeout.
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    break Err(MillError::other(format!(
                        "failed to wait for encoder process: {e}"
                    )));
                }
            }
        };

        let status = match stopped {
            Ok(status) => status,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                drop(rx);
                let _ = monitor.join();
                return Err(e);
            }
        };
        let tail = monitor.join().unwrap_or_default();
        if !status.success() {
            return Err(MillError::ExternalEncodeFailed {
                code: status.code(),
                stderr_tail: tail,
            });
        }
        Ok(done)
    }
}

fn remove_partial(path: &Path) {
    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(out = %path.display(), "removed partial output"),
            Err(e) => tracing::warn!(
                out = %path.display(),
                error = %e,
                "failed to remove partial output"
            ),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/supervisor.rs"]
mod tests;
