//! Built-in test patterns, used by the control plane's test operation and
//! by the integration tests.

use serde::{Deserialize, Serialize};

use super::Bitmap;
use crate::config::CanvasSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPattern {
    Checkerboard,
    Border,
    Solid,
    Clear,
}

/// Render a test pattern sized to the canvas.
pub fn test_pattern(canvas: &CanvasSize, pattern: TestPattern) -> Bitmap {
    let (w, h) = (canvas.width as usize, canvas.height as usize);
    match pattern {
        TestPattern::Clear => Bitmap::zeroed(w, h),
        TestPattern::Solid => Bitmap::filled(w, h),
        TestPattern::Checkerboard => {
            let mut bitmap = Bitmap::zeroed(w, h);
            for y in 0..h {
                for x in 0..w {
                    if (x + y) % 2 == 0 {
                        bitmap.set(x, y, true);
                    }
                }
            }
            bitmap
        }
        TestPattern::Border => {
            let mut bitmap = Bitmap::zeroed(w, h);
            for x in 0..w {
                bitmap.set(x, 0, true);
                bitmap.set(x, h - 1, true);
            }
            for y in 0..h {
                bitmap.set(0, y, true);
                bitmap.set(w - 1, y, true);
            }
            bitmap
        }
    }
}
