//! Wire formats: the RBM frame envelope spoken with producers and the
//! RS-485 message framing spoken with the panels. Both are byte-exact
//! contracts; see the tests for reference vectors.

pub mod panel;
pub mod rbm;

pub use panel::{encode_flush, encode_panel_message, EncodeError, RefreshMode, BROADCAST_ADDRESS};
pub use rbm::{rewrite_duration, CodecError, RbmFrame, RbmHeader, HEADER_LEN};
