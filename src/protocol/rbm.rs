//! RBM: the packed 1-bit bitmap envelope producers submit.
//!
//! Layout, big-endian throughout:
//!
//! | offset | bytes | field             |
//! |--------|-------|-------------------|
//! | 0      | 2     | magic `"RB"`      |
//! | 2      | 1     | version (1)       |
//! | 3      | 1     | flags (bit 0 = invert) |
//! | 4      | 2     | width px          |
//! | 6      | 2     | height px         |
//! | 8      | 4     | seq (wraps at 2^32) |
//! | 12     | 2     | frame_duration_ms (0 = dispatcher cadence) |
//! | 14     | 2     | reserved (zero on write, ignored on read) |
//!
//! Payload: `height * ceil(width/8)` bytes, row-major, MSB-first.

use thiserror::Error;

pub const HEADER_LEN: usize = 16;

const MAGIC: [u8; 2] = *b"RB";
const VERSION: u8 = 1;

/// Header bit 0: invert all pixels after decode.
pub const FLAG_INVERT: u8 = 0x01;

const DURATION_OFFSET: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated header: {len} bytes, need {HEADER_LEN}")]
    ShortHeader { len: usize },

    #[error("bad magic or version")]
    BadMagic,

    #[error("payload length {got} does not match {width}x{height} geometry (want {want})")]
    PayloadLength {
        got: usize,
        want: usize,
        width: u16,
        height: u16,
    },
}

/// Parsed RBM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RbmHeader {
    pub flags: u8,
    pub width: u16,
    pub height: u16,
    pub seq: u32,
    pub frame_duration_ms: u16,
}

impl RbmHeader {
    pub fn invert(&self) -> bool {
        self.flags & FLAG_INVERT != 0
    }

    /// Expected payload length for this geometry.
    pub fn payload_len(&self) -> usize {
        self.height as usize * ((self.width as usize + 7) / 8)
    }

    /// Parse the fixed 16-byte header. Returns the header and the payload
    /// offset so callers can validate before copying the payload.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::ShortHeader { len: data.len() });
        }
        if data[0..2] != MAGIC || data[2] != VERSION {
            return Err(CodecError::BadMagic);
        }

        let header = Self {
            flags: data[3],
            width: u16::from_be_bytes([data[4], data[5]]),
            height: u16::from_be_bytes([data[6], data[7]]),
            seq: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            frame_duration_ms: u16::from_be_bytes([data[12], data[13]]),
        };
        Ok((header, HEADER_LEN))
    }
}

/// A complete, validated RBM frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbmFrame {
    pub flags: u8,
    pub width: u16,
    pub height: u16,
    pub seq: u32,
    pub frame_duration_ms: u16,
    pub payload: Vec<u8>,
}

impl RbmFrame {
    /// Build a frame from a packed payload, checking the length invariant.
    pub fn new(
        width: u16,
        height: u16,
        seq: u32,
        frame_duration_ms: u16,
        payload: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let frame = Self {
            flags: 0,
            width,
            height,
            seq,
            frame_duration_ms,
            payload,
        };
        frame.check_payload()?;
        Ok(frame)
    }

    /// An all-zero frame for the given canvas geometry.
    pub fn zeroed(width: u16, height: u16) -> Self {
        let len = height as usize * ((width as usize + 7) / 8);
        Self {
            flags: 0,
            width,
            height,
            seq: 0,
            frame_duration_ms: 0,
            payload: vec![0u8; len],
        }
    }

    pub fn invert(&self) -> bool {
        self.flags & FLAG_INVERT != 0
    }

    fn expected_payload_len(&self) -> usize {
        self.height as usize * ((self.width as usize + 7) / 8)
    }

    fn check_payload(&self) -> Result<(), CodecError> {
        let want = self.expected_payload_len();
        if self.payload.len() != want {
            return Err(CodecError::PayloadLength {
                got: self.payload.len(),
                want,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Decode a complete frame, validating magic, version and payload length.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let (header, offset) = RbmHeader::parse(data)?;
        let want = header.payload_len();
        let got = data.len() - offset;
        if got != want {
            return Err(CodecError::PayloadLength {
                got,
                want,
                width: header.width,
                height: header.height,
            });
        }

        Ok(Self {
            flags: header.flags,
            width: header.width,
            height: header.height,
            seq: header.seq,
            frame_duration_ms: header.frame_duration_ms,
            payload: data[offset..].to_vec(),
        })
    }

    /// Encode to the wire format. Reserved bytes are written as zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&MAGIC);
        out.push(VERSION);
        out.push(self.flags);
        out.extend_from_slice(&self.width.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.seq.to_be_bytes());
        out.extend_from_slice(&self.frame_duration_ms.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Patch `frame_duration_ms` in an encoded frame without reallocating.
///
/// The forwarder uses this to align producer-declared durations with the
/// dispatcher's current interval.
pub fn rewrite_duration(encoded: &mut [u8], duration_ms: u16) -> Result<(), CodecError> {
    if encoded.len() < HEADER_LEN {
        return Err(CodecError::ShortHeader { len: encoded.len() });
    }
    encoded[DURATION_OFFSET..DURATION_OFFSET + 2].copy_from_slice(&duration_ms.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> RbmFrame {
        let payload = vec![0xAA; 7 * 4];
        RbmFrame::new(28, 7, 42, 100, payload).unwrap()
    }

    #[test]
    fn test_header_bytes_exact() {
        let frame = sample_frame();
        let bytes = frame.encode();

        assert_eq!(&bytes[0..2], b"RB");
        assert_eq!(bytes[2], 1);
        assert_eq!(bytes[3], 0);
        assert_eq!(&bytes[4..6], &28u16.to_be_bytes());
        assert_eq!(&bytes[6..8], &7u16.to_be_bytes());
        assert_eq!(&bytes[8..12], &42u32.to_be_bytes());
        assert_eq!(&bytes[12..14], &100u16.to_be_bytes());
        assert_eq!(&bytes[14..16], &[0, 0]);
        assert_eq!(bytes.len(), HEADER_LEN + 28);
    }

    #[test]
    fn test_decode_encode_round_trip() {
        let frame = sample_frame();
        let decoded = RbmFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = sample_frame().encode();
        bytes[0] = b'X';
        assert_eq!(RbmFrame::decode(&bytes), Err(CodecError::BadMagic));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut bytes = sample_frame().encode();
        bytes[2] = 2;
        assert_eq!(RbmFrame::decode(&bytes), Err(CodecError::BadMagic));
    }

    #[test]
    fn test_short_header_rejected() {
        assert_eq!(
            RbmFrame::decode(&[0u8; 5]),
            Err(CodecError::ShortHeader { len: 5 })
        );
    }

    #[test]
    fn test_payload_length_mismatch_rejected() {
        let mut bytes = sample_frame().encode();
        bytes.pop();
        assert!(matches!(
            RbmFrame::decode(&bytes),
            Err(CodecError::PayloadLength { got: 27, want: 28, .. })
        ));
    }

    #[test]
    fn test_reserved_ignored_on_read() {
        let mut bytes = sample_frame().encode();
        bytes[14] = 0xDE;
        bytes[15] = 0xAD;
        let decoded = RbmFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, sample_frame());
    }

    #[test]
    fn test_rewrite_duration_in_place() {
        let mut bytes = sample_frame().encode();
        rewrite_duration(&mut bytes, 33).unwrap();
        let decoded = RbmFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.frame_duration_ms, 33);
        // nothing else moved
        assert_eq!(decoded.seq, 42);
        assert_eq!(decoded.payload, sample_frame().payload);
    }

    #[test]
    fn test_width_one_stride() {
        let frame = RbmFrame::new(1, 7, 0, 0, vec![0x80; 7]).unwrap();
        assert_eq!(frame.payload.len(), 7);
        let decoded = RbmFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_invert_flag() {
        let mut frame = sample_frame();
        assert!(!frame.invert());
        frame.flags |= FLAG_INVERT;
        assert!(frame.invert());
    }
}
