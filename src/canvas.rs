//! Size of the compositing surface, as configured or requested at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest edge the compositor will allocate, in pixels.
pub const MAX_CANVAS_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 700,
            height: 700,
        }
    }
}

/// Which edge of the canvas a [`CanvasSizeError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Width,
    Height,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Edge::Width => "width",
            Edge::Height => "height",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanvasSizeError {
    #[error("canvas size '{0}' is not of the form WIDTHxHEIGHT")]
    Malformed(String),
    #[error("canvas {edge} '{value}' is not a whole number of pixels")]
    NotANumber { edge: Edge, value: String },
    #[error("canvas {edge} must be between 1 and {MAX_CANVAS_DIMENSION} pixels, got {value}")]
    OutOfRange { edge: Edge, value: u32 },
}

impl CanvasSize {
    /// Unchecked constructor; use [`CanvasSize::checked`] for untrusted input.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn checked(width: u32, height: u32) -> Result<Self, CanvasSizeError> {
        let size = Self { width, height };
        size.validate()?;
        Ok(size)
    }

    /// Both edges in `1..=MAX_CANVAS_DIMENSION`.
    pub fn validate(&self) -> Result<(), CanvasSizeError> {
        for (edge, value) in [(Edge::Width, self.width), (Edge::Height, self.height)] {
            if value == 0 || value > MAX_CANVAS_DIMENSION {
                return Err(CanvasSizeError::OutOfRange { edge, value });
            }
        }
        Ok(())
    }

    pub fn is_allocatable(&self) -> bool {
        self.validate().is_ok()
    }
}

impl FromStr for CanvasSize {
    type Err = CanvasSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| CanvasSizeError::Malformed(s.to_string()))?;

        let edge = |edge: Edge, raw: &str| {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| CanvasSizeError::NotANumber {
                    edge,
                    value: raw.trim().to_string(),
                })
        };

        Self::checked(edge(Edge::Width, w)?, edge(Edge::Height, h)?)
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_either_separator_and_ignores_padding() {
        assert_eq!("700x700".parse::<CanvasSize>().unwrap(), CanvasSize::new(700, 700));
        assert_eq!(" 800 X 600 ".parse::<CanvasSize>().unwrap(), CanvasSize::new(800, 600));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            "700".parse::<CanvasSize>(),
            Err(CanvasSizeError::Malformed(_))
        ));
        assert!(matches!(
            "x700".parse::<CanvasSize>(),
            Err(CanvasSizeError::NotANumber { edge: Edge::Width, .. })
        ));
        assert!(matches!(
            "700x700x700".parse::<CanvasSize>(),
            Err(CanvasSizeError::NotANumber { edge: Edge::Height, .. })
        ));
    }

    #[test]
    fn zero_and_oversized_edges_are_out_of_range() {
        assert_eq!(
            "0x700".parse::<CanvasSize>(),
            Err(CanvasSizeError::OutOfRange { edge: Edge::Width, value: 0 })
        );
        assert_eq!(
            "700x5000".parse::<CanvasSize>(),
            Err(CanvasSizeError::OutOfRange { edge: Edge::Height, value: 5000 })
        );
        assert!("4096x4096".parse::<CanvasSize>().is_ok());
    }

    #[test]
    fn out_of_range_message_names_the_limit() {
        let err = CanvasSize::checked(9000, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "canvas width must be between 1 and 4096 pixels, got 9000"
        );
    }

    #[test]
    fn displays_as_width_by_height() {
        assert_eq!(CanvasSize::default().to_string(), "700x700");
        assert!(CanvasSize::default().is_allocatable());
        assert!(!CanvasSize::new(1, 4097).is_allocatable());
    }
}
