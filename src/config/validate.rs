use std::collections::HashSet;

use thiserror::Error;

use super::DisplayConfig;

/// Structural problems in a display configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("canvas must be non-empty, got {width}x{height}")]
    EmptyCanvas { width: u16, height: u16 },

    #[error("panel '{id}' has unsupported size {w}x{h} (supported: 7x7, 14x7, 28x7)")]
    UnsupportedPanelSize { id: String, w: u16, h: u16 },

    #[error("panel '{id}' at ({x},{y}) size {w}x{h} extends outside the {cw}x{ch} canvas")]
    PanelOutOfBounds {
        id: String,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        cw: u16,
        ch: u16,
    },

    #[error("panels '{a}' and '{b}' overlap")]
    PanelOverlap { a: String, b: String },

    #[error("panels '{a}' and '{b}' share address {address}")]
    DuplicateAddress { a: String, b: String, address: u8 },

    #[error("duplicate panel id '{id}'")]
    DuplicateId { id: String },

    #[error("fps {fps} outside [1, {fps_max}]")]
    FpsOutOfRange { fps: u32, fps_max: u32 },
}

/// Check the topology invariants: panels are disjoint, contained in the
/// canvas, uniquely identified and uniquely addressed; panel geometry is
/// one the hardware supports; fps is within range.
pub fn validate_config(config: &DisplayConfig) -> Result<(), ConfigError> {
    let canvas = config.canvas;
    if canvas.width == 0 || canvas.height == 0 {
        return Err(ConfigError::EmptyCanvas {
            width: canvas.width,
            height: canvas.height,
        });
    }

    let rt = config.runtime;
    if rt.fps < 1 || rt.fps > rt.fps_max {
        return Err(ConfigError::FpsOutOfRange {
            fps: rt.fps,
            fps_max: rt.fps_max,
        });
    }

    let mut ids = HashSet::new();
    for panel in &config.panels {
        if !ids.insert(panel.id.as_str()) {
            return Err(ConfigError::DuplicateId {
                id: panel.id.clone(),
            });
        }

        if panel.size.h != 7 || !matches!(panel.size.w, 7 | 14 | 28) {
            return Err(ConfigError::UnsupportedPanelSize {
                id: panel.id.clone(),
                w: panel.size.w,
                h: panel.size.h,
            });
        }

        let x1 = panel.origin.x as u32 + panel.size.w as u32;
        let y1 = panel.origin.y as u32 + panel.size.h as u32;
        if x1 > canvas.width as u32 || y1 > canvas.height as u32 {
            return Err(ConfigError::PanelOutOfBounds {
                id: panel.id.clone(),
                x: panel.origin.x,
                y: panel.origin.y,
                w: panel.size.w,
                h: panel.size.h,
                cw: canvas.width,
                ch: canvas.height,
            });
        }
    }

    for (i, a) in config.panels.iter().enumerate() {
        for b in &config.panels[i + 1..] {
            if a.address == b.address {
                return Err(ConfigError::DuplicateAddress {
                    a: a.id.clone(),
                    b: b.id.clone(),
                    address: a.address,
                });
            }
            if rects_overlap(a, b) {
                return Err(ConfigError::PanelOverlap {
                    a: a.id.clone(),
                    b: b.id.clone(),
                });
            }
        }
    }

    Ok(())
}

fn rects_overlap(a: &super::PanelConfig, b: &super::PanelConfig) -> bool {
    let (ax0, ay0) = (a.origin.x as u32, a.origin.y as u32);
    let (ax1, ay1) = (ax0 + a.size.w as u32, ay0 + a.size.h as u32);
    let (bx0, by0) = (b.origin.x as u32, b.origin.y as u32);
    let (bx1, by1) = (bx0 + b.size.w as u32, by0 + b.size.h as u32);
    ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1
}
