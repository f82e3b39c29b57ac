//! Canvas-to-panel mapping.
//!
//! Pure transforms from a virtual canvas bitmap to per-panel column bytes:
//! crop each panel's rectangle, apply its mounting orientation, then fold
//! rows into column bytes (LSB = top pixel, bit 7 clear). Deterministic:
//! output depends only on the bitmap and the topology, and panels are
//! produced in canonical `(origin.y, origin.x, id)` order.

mod bitmap;
mod pattern;

pub use bitmap::Bitmap;
pub use pattern::{test_pattern, TestPattern};

use crate::config::{DisplayConfig, Orientation, PanelConfig};
use crate::protocol::EncodeError;

/// One panel's worth of mapped output, ready for the wire codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPanel {
    pub id: String,
    pub address: u8,
    /// Oriented width: number of column bytes.
    pub width: u16,
    /// Oriented height: rows folded into each column byte.
    pub height: u16,
    pub columns: Vec<u8>,
}

/// Map a canvas bitmap onto every panel of the topology.
///
/// Fails only when a panel's oriented shape cannot be expressed as column
/// bytes (more than 7 rows after rotation); the caller treats that as an
/// encode failure for the tick.
pub fn map(canvas: &Bitmap, config: &DisplayConfig) -> Result<Vec<MappedPanel>, EncodeError> {
    let mut out = Vec::with_capacity(config.panels.len());
    for panel in config.panels_canonical() {
        let oriented = orient_panel(canvas, panel);
        let columns = column_bytes(&oriented)?;
        out.push(MappedPanel {
            id: panel.id.clone(),
            address: panel.address,
            width: oriented.width() as u16,
            height: oriented.height() as u16,
            columns,
        });
    }
    Ok(out)
}

/// Crop the panel's rectangle out of the canvas and apply its orientation.
fn orient_panel(canvas: &Bitmap, panel: &PanelConfig) -> Bitmap {
    let sub = canvas.crop(
        panel.origin.x as usize,
        panel.origin.y as usize,
        panel.size.w as usize,
        panel.size.h as usize,
    );
    match panel.orientation {
        Orientation::Normal => sub,
        Orientation::Rot90 => sub.rotate_cw(),
        Orientation::Rot180 => sub.rotate_cw().rotate_cw(),
        Orientation::Rot270 => sub.rotate_cw().rotate_cw().rotate_cw(),
        Orientation::FlipH => sub.flip_h(),
        Orientation::FlipV => sub.flip_v(),
    }
}

/// Fold an oriented bitmap into column bytes: one byte per column, LSB is
/// the top pixel. Requires height <= 7 so bit 7 stays clear.
fn column_bytes(bitmap: &Bitmap) -> Result<Vec<u8>, EncodeError> {
    if bitmap.height() > 7 {
        return Err(EncodeError::UnsupportedGeometry {
            width: bitmap.width() as u16,
            height: bitmap.height() as u16,
        });
    }

    let mut columns = Vec::with_capacity(bitmap.width());
    for x in 0..bitmap.width() {
        let mut byte = 0u8;
        for y in 0..bitmap.height() {
            if bitmap.get(x, y) {
                byte |= 1 << y;
            }
        }
        columns.push(byte);
    }
    Ok(columns)
}

/// Reconstruct the canvas pixels covered by panels from mapped output.
///
/// Inverse of [`map`] over panel rectangles; pixels outside every panel are
/// left unset. Used to check the mapping-parity invariant.
pub fn unmap(mapped: &[MappedPanel], config: &DisplayConfig) -> Bitmap {
    let mut canvas = Bitmap::zeroed(
        config.canvas.width as usize,
        config.canvas.height as usize,
    );

    for entry in mapped {
        let Some(panel) = config.panel_by_id(&entry.id) else {
            continue;
        };

        // Columns back to the oriented bitmap, then undo the orientation.
        let mut oriented = Bitmap::zeroed(entry.width as usize, entry.height as usize);
        for (x, &byte) in entry.columns.iter().enumerate() {
            for y in 0..entry.height as usize {
                if byte & (1 << y) != 0 {
                    oriented.set(x, y, true);
                }
            }
        }

        let sub = match panel.orientation {
            Orientation::Normal => oriented,
            // clockwise rotation undone by counter-clockwise (three more cw)
            Orientation::Rot90 => oriented.rotate_cw().rotate_cw().rotate_cw(),
            Orientation::Rot180 => oriented.rotate_cw().rotate_cw(),
            Orientation::Rot270 => oriented.rotate_cw(),
            Orientation::FlipH => oriented.flip_h(),
            Orientation::FlipV => oriented.flip_v(),
        };

        for y in 0..sub.height() {
            for x in 0..sub.width() {
                if sub.get(x, y) {
                    canvas.set(panel.origin.x as usize + x, panel.origin.y as usize + y, true);
                }
            }
        }
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CanvasSize, Origin, PanelSize, RuntimeConfig, SerialConfig};

    fn single_panel_config(orientation: Orientation) -> DisplayConfig {
        DisplayConfig {
            canvas: CanvasSize {
                width: 28,
                height: 7,
            },
            panels: vec![PanelConfig {
                id: "only".to_string(),
                address: 0,
                origin: Origin { x: 0, y: 0 },
                size: PanelSize { w: 28, h: 7 },
                orientation,
            }],
            serial: SerialConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }

    #[test]
    fn test_single_pixel_lsb_top() {
        let cfg = single_panel_config(Orientation::Normal);
        let mut canvas = Bitmap::zeroed(28, 7);
        canvas.set(3, 1, true);

        let mapped = map(&canvas, &cfg).unwrap();
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].columns.len(), 28);
        assert_eq!(mapped[0].columns[3], 0b0000_0010);
        assert!(mapped[0].columns.iter().enumerate().all(|(x, &b)| x == 3 || b == 0));
    }

    #[test]
    fn test_top_stripe_rot180_sets_bit_six() {
        let cfg = single_panel_config(Orientation::Rot180);
        let mut canvas = Bitmap::zeroed(28, 7);
        for x in 0..28 {
            canvas.set(x, 0, true);
        }

        let mapped = map(&canvas, &cfg).unwrap();
        assert!(mapped[0].columns.iter().all(|&b| b == 0b0100_0000));
    }

    #[test]
    fn test_bit_seven_always_clear() {
        let cfg = single_panel_config(Orientation::Normal);
        let canvas = Bitmap::filled(28, 7);
        let mapped = map(&canvas, &cfg).unwrap();
        assert!(mapped[0].columns.iter().all(|&b| b == 0x7F));
    }

    #[test]
    fn test_identity_orientation_idempotent() {
        let cfg = single_panel_config(Orientation::Normal);
        let canvas = test_pattern(
            &CanvasSize {
                width: 28,
                height: 7,
            },
            TestPattern::Checkerboard,
        );
        let a = map(&canvas, &cfg).unwrap();
        let b = map(&canvas, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rot90_of_wide_panel_fails_column_fold() {
        // rotating a 28x7 rectangle yields 28 rows, which no panel command
        // can express
        let cfg = single_panel_config(Orientation::Rot90);
        let canvas = Bitmap::zeroed(28, 7);
        assert!(matches!(
            map(&canvas, &cfg),
            Err(EncodeError::UnsupportedGeometry { width: 7, height: 28 })
        ));
    }

    #[test]
    fn test_unmap_round_trip_checkerboard_with_marker() {
        // asymmetric pattern: checkerboard plus a marker row segment
        let cfg = single_panel_config(Orientation::Rot180);
        let mut canvas = test_pattern(
            &CanvasSize {
                width: 28,
                height: 7,
            },
            TestPattern::Checkerboard,
        );
        for x in 0..5 {
            canvas.set(x, 3, true);
        }

        let mapped = map(&canvas, &cfg).unwrap();
        let restored = unmap(&mapped, &cfg);
        assert_eq!(restored, canvas);
    }

    #[test]
    fn test_unmap_round_trip_all_orientations_square() {
        for orientation in [
            Orientation::Normal,
            Orientation::Rot90,
            Orientation::Rot180,
            Orientation::Rot270,
            Orientation::FlipH,
            Orientation::FlipV,
        ] {
            let cfg = DisplayConfig {
                canvas: CanvasSize {
                    width: 7,
                    height: 7,
                },
                panels: vec![PanelConfig {
                    id: "sq".to_string(),
                    address: 0,
                    origin: Origin { x: 0, y: 0 },
                    size: PanelSize { w: 7, h: 7 },
                    orientation,
                }],
                serial: SerialConfig::default(),
                runtime: RuntimeConfig::default(),
            };

            let mut canvas = Bitmap::zeroed(7, 7);
            canvas.set(1, 0, true);
            canvas.set(2, 4, true);
            canvas.set(6, 6, true);

            let mapped = map(&canvas, &cfg).unwrap();
            let restored = unmap(&mapped, &cfg);
            assert_eq!(restored, canvas, "orientation {:?}", orientation);
        }
    }

    #[test]
    fn test_canonical_output_order() {
        let cfg = DisplayConfig {
            canvas: CanvasSize {
                width: 28,
                height: 14,
            },
            panels: vec![
                PanelConfig {
                    id: "bottom".to_string(),
                    address: 1,
                    origin: Origin { x: 0, y: 7 },
                    size: PanelSize { w: 28, h: 7 },
                    orientation: Orientation::Normal,
                },
                PanelConfig {
                    id: "top".to_string(),
                    address: 0,
                    origin: Origin { x: 0, y: 0 },
                    size: PanelSize { w: 28, h: 7 },
                    orientation: Orientation::Normal,
                },
            ],
            serial: SerialConfig::default(),
            runtime: RuntimeConfig::default(),
        };

        let canvas = Bitmap::zeroed(28, 14);
        let mapped = map(&canvas, &cfg).unwrap();
        assert_eq!(mapped[0].id, "top");
        assert_eq!(mapped[1].id, "bottom");
    }
}
