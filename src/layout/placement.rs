use serde::{Deserialize, Serialize};

use crate::foundation::error::{MillError, MillResult};

/// Frame corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    /// Upper left.
    TopLeft,
    /// Upper right.
    TopRight,
    /// Lower left.
    BottomLeft,
    /// Lower right.
    BottomRight,
}

/// Frame edge; the overlay is centered along it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Top edge, horizontally centered.
    Top,
    /// Bottom edge, horizontally centered.
    Bottom,
    /// Left edge, vertically centered.
    Left,
    /// Right edge, vertically centered.
    Right,
}

/// Where an overlay goes on a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Anchored in a corner, inset by the padding on both axes.
    Corner(Corner),
    /// Anchored on an edge, inset by the padding on that axis.
    Edge(Edge),
    /// Centered on both axes; padding is ignored.
    Centered,
    /// Raw top-left coordinate; padding is ignored.
    Explicit {
        /// Left offset in pixels.
        x: i64,
        /// Top offset in pixels.
        y: i64,
    },
}

impl Default for Placement {
    fn default() -> Self {
        Self::Corner(Corner::TopLeft)
    }
}

/// A placement plus the padding applied to anchored variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementSpec {
    /// Anchor.
    pub placement: Placement,
    /// Inset from the anchored edges, in pixels.
    #[serde(default)]
    pub padding: u32,
}

impl PlacementSpec {
    /// Construct a spec.
    pub fn new(placement: Placement, padding: u32) -> Self {
        Self { placement, padding }
    }
}

/// Resolve a placement to a top-left coordinate.
///
/// The result always satisfies `0 <= x <= max(0, frame_w - overlay_w)` and the same for `y`.
/// Overlays larger than the frame resolve to `0` on that axis; the compositor crops them.
pub fn resolve(
    spec: &PlacementSpec,
    overlay_w: u32,
    overlay_h: u32,
    frame_w: u32,
    frame_h: u32,
) -> (u32, u32) {
    let (ow, oh) = (i64::from(overlay_w), i64::from(overlay_h));
    let (fw, fh) = (i64::from(frame_w), i64::from(frame_h));
    let p = i64::from(spec.padding);

    let far_x = fw - ow - p;
    let far_y = fh - oh - p;
    let mid_x = (fw - ow).div_euclid(2);
    let mid_y = (fh - oh).div_euclid(2);

    let (x, y) = match spec.placement {
        Placement::Corner(Corner::TopLeft) => (p, p),
        Placement::Corner(Corner::TopRight) => (far_x, p),
        Placement::Corner(Corner::BottomLeft) => (p, far_y),
        Placement::Corner(Corner::BottomRight) => (far_x, far_y),
        Placement::Edge(Edge::Top) => (mid_x, p),
        Placement::Edge(Edge::Bottom) => (mid_x, far_y),
        Placement::Edge(Edge::Left) => (p, mid_y),
        Placement::Edge(Edge::Right) => (far_x, mid_y),
        Placement::Centered => (mid_x, mid_y),
        Placement::Explicit { x, y } => (x, y),
    };

    let max_x = (fw - ow).max(0);
    let max_y = (fh - oh).max(0);
    (x.clamp(0, max_x) as u32, y.clamp(0, max_y) as u32)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Token {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

fn token(word: &str) -> Option<Token> {
    Some(match word {
        "top" | "upper" => Token::Top,
        "bottom" | "lower" => Token::Bottom,
        "left" => Token::Left,
        "right" => Token::Right,
        "center" | "centre" | "middle" | "centered" => Token::Center,
        _ => return None,
    })
}

/// Parse a placement tag, failing with [`MillError::UnsupportedPlacement`] on anything unknown.
///
/// Accepted forms: `top-left`, `right,top`, `bottom_right`, `center`, `top`, `center,bottom`,
/// and explicit coordinates `x,y`. Word order inside a pair does not matter.
pub fn parse_placement(tag: &str) -> MillResult<Placement> {
    let unsupported = || MillError::UnsupportedPlacement(tag.to_string());
    let t = tag.trim().to_ascii_lowercase();
    if t.is_empty() {
        return Err(unsupported());
    }

    if let Some((a, b)) = t.split_once(',')
        && let (Ok(x), Ok(y)) = (a.trim().parse::<i64>(), b.trim().parse::<i64>())
    {
        return Ok(Placement::Explicit { x, y });
    }

    let words = t
        .split(|c: char| c == ',' || c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(token)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(unsupported)?;

    use Token::*;
    let placement = match words.as_slice() {
        [Center] | [Center, Center] => Placement::Centered,
        [Top] | [Top, Center] | [Center, Top] => Placement::Edge(Edge::Top),
        [Bottom] | [Bottom, Center] | [Center, Bottom] => Placement::Edge(Edge::Bottom),
        [Left] | [Left, Center] | [Center, Left] => Placement::Edge(Edge::Left),
        [Right] | [Right, Center] | [Center, Right] => Placement::Edge(Edge::Right),
        [Top, Left] | [Left, Top] => Placement::Corner(Corner::TopLeft),
        [Top, Right] | [Right, Top] => Placement::Corner(Corner::TopRight),
        [Bottom, Left] | [Left, Bottom] => Placement::Corner(Corner::BottomLeft),
        [Bottom, Right] | [Right, Bottom] => Placement::Corner(Corner::BottomRight),
        _ => return Err(unsupported()),
    };
    Ok(placement)
}

/// Parse a placement tag, falling back to the top-left corner when it is not recognized.
///
/// The fallback is logged and returned as the error value so callers can record it.
pub fn parse_placement_lenient(tag: &str) -> (Placement, Option<MillError>) {
    match parse_placement(tag) {
        Ok(p) => (p, None),
        Err(e) => {
            tracing::warn!(tag, "unsupported placement, falling back to top-left");
            (Placement::default(), Some(e))
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/placement.rs"]
mod tests;
