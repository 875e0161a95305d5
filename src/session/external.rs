use std::collections::VecDeque;
use std::io::BufRead;

/// Pull-based stream of progress events from an external encoder.
pub trait ProgressSource {
    /// Block until the next frame counter is available; `None` once the stream has ended.
    ///
    /// Returned values are strictly increasing.
    fn next_progress_event(&mut self) -> Option<u64>;
}

/// Extract the integer after the first `frame=` token of an `ffmpeg` status line.
pub fn parse_frame_token(line: &str) -> Option<u64> {
    let rest = &line[line.find("frame=")? + "frame=".len()..];
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// [`ProgressSource`] over an `ffmpeg` diagnostic stream.
///
/// Lines are split on both `\r` and `\n` because `ffmpeg` rewrites its status line in place.
/// Lines without a parsable `frame=` token are ignored for progress but the most recent ones are
/// kept as the diagnostic tail.
pub struct FfmpegStderrProgress<R> {
    reader: R,
    last: Option<u64>,
    tail: VecDeque<String>,
    tail_cap: usize,
}

impl<R: BufRead> FfmpegStderrProgress<R> {
    /// Wrap a buffered reader over the process' stderr.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            last: None,
            tail: VecDeque::new(),
            tail_cap: 12,
        }
    }

    /// Last non-progress diagnostic lines, joined by `" | "`.
    pub fn tail(&self) -> String {
        self.tail.iter().cloned().collect::<Vec<_>>().join(" | ")
    }

    /// Drain the rest of the stream, keeping only the diagnostic tail.
    pub fn drain(&mut self) {
        while self.next_progress_event().is_some() {}
    }

    fn next_line(&mut self) -> Option<String> {
        let mut buf = Vec::new();
        loop {
            let available = match self.reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => &[][..],
            };
            if available.is_empty() {
                return (!buf.is_empty()).then(|| String::from_utf8_lossy(&buf).into_owned());
            }
            if let Some(pos) = available.iter().position(|&b| b == b'\r' || b == b'\n') {
                buf.extend_from_slice(&available[..pos]);
                self.reader.consume(pos + 1);
                return Some(String::from_utf8_lossy(&buf).into_owned());
            }
            let n = available.len();
            buf.extend_from_slice(available);
            self.reader.consume(n);
        }
    }

    fn remember(&mut self, line: &str) {
        if self.tail.len() == self.tail_cap {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }
}

impl<R: BufRead> ProgressSource for FfmpegStderrProgress<R> {
    fn next_progress_event(&mut self) -> Option<u64> {
        loop {
            let line = self.next_line()?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_frame_token(line) {
                Some(n) if self.last.is_none_or(|last| n > last) => {
                    self.last = Some(n);
                    return Some(n);
                }
                Some(_) => {}
                None => self.remember(line),
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/external.rs"]
mod tests;
