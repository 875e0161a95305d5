use crate::foundation::error::{MillError, MillResult};

/// Absolute 0-based frame index in output stream order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> MillResult<Self> {
        if den == 0 {
            return Err(MillError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(MillError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Parse an ffprobe-style rate: `"30000/1001"`, `"30/1"` or `"25"`.
    ///
    /// `"0/0"` (reported for streams without a known rate) is rejected.
    pub fn parse_ratio(s: &str) -> MillResult<Self> {
        let s = s.trim();
        let bad = || MillError::validation(format!("invalid frame rate '{s}'"));
        match s.split_once('/') {
            Some((n, d)) => {
                let num = n.trim().parse::<u32>().map_err(|_| bad())?;
                let den = d.trim().parse::<u32>().map_err(|_| bad())?;
                Self::new(num, den)
            }
            None => {
                let v = s.parse::<f64>().map_err(|_| bad())?;
                Self::from_f64(v)
            }
        }
    }

    /// Approximate a floating-point rate with a millesimal rational.
    pub fn from_f64(fps: f64) -> MillResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MillError::validation("fps must be finite and > 0"));
        }
        if fps.fract() == 0.0 && fps <= f64::from(u32::MAX) {
            return Self::new(fps as u32, 1);
        }
        Self::new((fps * 1000.0).round() as u32, 1000)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Convert seconds to frame count using floor semantics.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        // Nudge by a tiny epsilon so that exact products (3.0 * 30.0) survive float error.
        (secs * self.as_f64() + 1e-9).floor().max(0.0) as u64
    }

    /// Convert seconds to frame count rounding to the nearest frame.
    pub fn secs_to_frames_round(self, secs: f64) -> u64 {
        (secs * self.as_f64()).round().max(0.0) as u64
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Frame or canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a canvas, rejecting zero-sized dimensions.
    pub fn new(width: u32, height: u32) -> MillResult<Self> {
        if width == 0 || height == 0 {
            return Err(MillError::validation(format!(
                "canvas must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Round both dimensions down to even values (yuv420p requirement).
    pub fn even_floor(self) -> Self {
        Self {
            width: (self.width - self.width % 2).max(2),
            height: (self.height - self.height % 2).max(2),
        }
    }

    /// Return `true` when both dimensions are even.
    pub fn is_even(self) -> bool {
        self.width.is_multiple_of(2) && self.height.is_multiple_of(2)
    }

    /// Number of pixels.
    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque color from RGB channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#RRGGBB`, `#RRGGBBAA`, or a basic CSS color name (case-insensitive).
    pub fn parse(s: &str) -> MillResult<Self> {
        let t = s.trim();
        let named = match t.to_ascii_lowercase().as_str() {
            "white" => Some(Self::rgb(255, 255, 255)),
            "black" => Some(Self::rgb(0, 0, 0)),
            "red" => Some(Self::rgb(255, 0, 0)),
            "green" => Some(Self::rgb(0, 128, 0)),
            "lime" => Some(Self::rgb(0, 255, 0)),
            "blue" => Some(Self::rgb(0, 0, 255)),
            "yellow" => Some(Self::rgb(255, 255, 0)),
            "cyan" => Some(Self::rgb(0, 255, 255)),
            "magenta" => Some(Self::rgb(255, 0, 255)),
            "orange" => Some(Self::rgb(255, 165, 0)),
            "gray" | "grey" => Some(Self::rgb(128, 128, 128)),
            "transparent" => Some(Self {
                r: 0,
                g: 0,
                b: 0,
                a: 0,
            }),
            _ => None,
        };
        if let Some(c) = named {
            return Ok(c);
        }

        let hex = t.strip_prefix('#').unwrap_or(t);
        let byte = |pair: &str| {
            u8::from_str_radix(pair, 16)
                .map_err(|_| MillError::validation(format!("invalid hex byte \"{pair}\"")))
        };
        match hex.len() {
            6 => Ok(Self::rgb(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
            )),
            8 => Ok(Self {
                r: byte(&hex[0..2])?,
                g: byte(&hex[2..4])?,
                b: byte(&hex[4..6])?,
                a: byte(&hex[6..8])?,
            }),
            _ => Err(MillError::validation(format!(
                "unknown color '{s}' (expected a color name, #RRGGBB or #RRGGBBAA)"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
