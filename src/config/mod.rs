//! Display configuration: canvas, panel topology, serial settings, runtime
//! pacing parameters. Loaded from a declarative TOML file; no runtime state
//! is ever persisted back.

mod load;
mod validate;

pub use load::load_from_toml;
pub use validate::{validate_config, ConfigError};

use serde::{Deserialize, Serialize};

/// Absolute ceiling for the target frame rate, enforced by the control plane.
pub const FPS_MAX_DEFAULT: u32 = 30;

/// Logical pixel grid the producers render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u16,
    pub height: u16,
}

impl CanvasSize {
    /// Bytes per packed row (8 pixels per byte, MSB first).
    pub fn stride(&self) -> usize {
        (self.width as usize + 7) / 8
    }

    /// Total payload size of a packed 1-bit frame for this canvas.
    pub fn payload_len(&self) -> usize {
        self.height as usize * self.stride()
    }
}

/// Top-left corner of a panel inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub x: u16,
    pub y: u16,
}

/// Panel dimensions. Hardware panels are 7 rows tall and 7/14/28 wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSize {
    pub w: u16,
    pub h: u16,
}

/// How the panel is physically mounted relative to the canvas.
///
/// Rotations are clockwise. At most one orientation is set per panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Normal,
    Rot90,
    Rot180,
    Rot270,
    FlipH,
    FlipV,
}

/// One physical display module on the RS-485 bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub id: String,
    pub address: u8,
    pub origin: Origin,
    pub size: PanelSize,
    #[serde(default)]
    pub orientation: Orientation,
}

/// Serial line parameters for the RS-485 bus. 8N1 at 9600 baud by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// Use the mock sink instead of real hardware.
    #[serde(default = "default_true")]
    pub mock: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: default_baud(),
            parity: Parity::None,
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            mock: true,
        }
    }
}

/// Pacing and buffering parameters the dispatcher runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Target frames per second, clamped to `[1, fps_max]`.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Upper clamp for fps changes at runtime.
    #[serde(default = "default_fps_max")]
    pub fps_max: u32,
    /// Keep-latest buffer depth expressed in milliseconds of frames.
    #[serde(default = "default_buffer_ms")]
    pub buffer_ms: u32,
    /// Minimum extra gap enforced after each dispatcher tick.
    #[serde(default)]
    pub frame_gap_ms: u32,
    /// Pause between consecutive panel messages on the bus, microseconds.
    #[serde(default)]
    pub inter_panel_us: u32,
    /// Buffered refresh mode: panels latch data and a trailing flush
    /// command makes the whole display flip at once.
    #[serde(default)]
    pub buffered: bool,
    /// Per-panel transport write timeout in milliseconds.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            fps_max: default_fps_max(),
            buffer_ms: default_buffer_ms(),
            frame_gap_ms: 0,
            inter_panel_us: 0,
            buffered: false,
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl RuntimeConfig {
    /// Tick interval in milliseconds, rounded. This value is authoritative:
    /// producer-declared durations are rewritten to it on the forward path.
    pub fn interval_ms(&self) -> u16 {
        ((1000.0 / self.fps.max(1) as f64).round()) as u16
    }

    /// Buffer capacity in frames: `ceil(buffer_ms * fps / 1000)`, at least 1.
    pub fn buffer_capacity(&self) -> usize {
        let frames = (self.buffer_ms as u64 * self.fps as u64 + 999) / 1000;
        frames.max(1) as usize
    }
}

/// Complete display configuration. Immutable once published; changes go
/// through the control plane as a whole-snapshot swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub canvas: CanvasSize,
    pub panels: Vec<PanelConfig>,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl DisplayConfig {
    /// Panels in canonical order: `(origin.y, origin.x, id)`. The dispatcher
    /// writes panels in exactly this order within a tick.
    pub fn panels_canonical(&self) -> Vec<&PanelConfig> {
        let mut panels: Vec<&PanelConfig> = self.panels.iter().collect();
        panels.sort_by(|a, b| {
            (a.origin.y, a.origin.x, &a.id).cmp(&(b.origin.y, b.origin.x, &b.id))
        });
        panels
    }

    pub fn panel_by_id(&self, id: &str) -> Option<&PanelConfig> {
        self.panels.iter().find(|p| p.id == id)
    }
}

fn default_baud() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

fn default_fps() -> u32 {
    20
}

fn default_fps_max() -> u32 {
    FPS_MAX_DEFAULT
}

fn default_buffer_ms() -> u32 {
    500
}

fn default_write_timeout_ms() -> u32 {
    250
}
