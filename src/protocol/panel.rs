//! RS-485 panel messages.
//!
//! A panel update is `0x80, cfg, address, data..., 0x8F` with one data byte
//! per column (LSB = topmost pixel, bit 7 clear). The cfg byte selects the
//! panel width and whether the panel shows the data immediately or latches
//! it until a global flush.

use thiserror::Error;

const FRAME_START: u8 = 0x80;
const FRAME_END: u8 = 0x8F;
const FLUSH_COMMAND: u8 = 0x82;

/// All-panels address. Defined by the hardware; the dispatcher always
/// addresses panels explicitly and never emits it.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Whether a panel shows new data immediately or waits for a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Instant,
    Buffered,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unsupported panel geometry {width}x{height} (supported: 7x7, 14x7, 28x7)")]
    UnsupportedGeometry { width: u16, height: u16 },

    #[error("7-wide panels have no buffered refresh command")]
    BufferedUnsupported,

    #[error("payload has {got} column bytes, panel width is {want}")]
    ColumnCount { got: usize, want: u16 },
}

/// cfg byte for a panel width and refresh mode.
fn config_byte(width: u16, mode: RefreshMode) -> Result<u8, EncodeError> {
    match (width, mode) {
        (28, RefreshMode::Instant) => Ok(0x83),
        (28, RefreshMode::Buffered) => Ok(0x84),
        (14, RefreshMode::Instant) => Ok(0x92),
        (14, RefreshMode::Buffered) => Ok(0x93),
        (7, RefreshMode::Instant) => Ok(0x87),
        (7, RefreshMode::Buffered) => Err(EncodeError::BufferedUnsupported),
        (width, _) => Err(EncodeError::UnsupportedGeometry { width, height: 7 }),
    }
}

/// Encode one panel update message.
///
/// `columns` must hold exactly `width` bytes, already in column order with
/// the LSB-top convention.
pub fn encode_panel_message(
    address: u8,
    width: u16,
    height: u16,
    mode: RefreshMode,
    columns: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    if height != 7 || !matches!(width, 7 | 14 | 28) {
        return Err(EncodeError::UnsupportedGeometry { width, height });
    }
    if columns.len() != width as usize {
        return Err(EncodeError::ColumnCount {
            got: columns.len(),
            want: width,
        });
    }

    let cfg = config_byte(width, mode)?;
    let mut out = Vec::with_capacity(4 + columns.len());
    out.push(FRAME_START);
    out.push(cfg);
    out.push(address);
    out.extend_from_slice(columns);
    out.push(FRAME_END);
    Ok(out)
}

/// The global flush that makes buffered panels show their latched data.
pub fn encode_flush() -> [u8; 3] {
    [FRAME_START, FLUSH_COMMAND, FRAME_END]
}
