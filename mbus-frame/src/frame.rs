//! Frame layout and encoder.
//!
//! ```text
//! 0xFF | CMD | LEN | PAYLOAD[LEN] | CS
//! ```
//!
//! `CS` is the XOR of every preceding byte, start byte included.

use core::fmt;

pub const START_BYTE: u8 = 0xFF;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = 255;

/// Start + command + length + payload + checksum.
pub const MAX_FRAME: usize = MAX_PAYLOAD + 4;

const HEADER_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Payload longer than [`MAX_PAYLOAD`].
    PayloadTooLong(usize),
    /// Output buffer cannot hold the encoded frame.
    BufferTooSmall { needed: usize },
    /// Received checksum does not match the computed one.
    Checksum { expected: u8, actual: u8 },
    /// Input ended in the middle of a frame.
    Truncated,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::PayloadTooLong(n) => write!(f, "payload too long ({} bytes)", n),
            FrameError::BufferTooSmall { needed } => {
                write!(f, "output buffer too small ({} bytes needed)", needed)
            }
            FrameError::Checksum { expected, actual } => write!(
                f,
                "checksum mismatch (expected 0x{:02X}, got 0x{:02X})",
                expected, actual
            ),
            FrameError::Truncated => write!(f, "truncated frame"),
        }
    }
}

/// XOR over `bytes`.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode one frame into `out`, returning the number of bytes written.
pub fn encode(command: u8, payload: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLong(payload.len()));
    }
    let total = payload.len() + HEADER_LEN + 1;
    if out.len() < total {
        return Err(FrameError::BufferTooSmall { needed: total });
    }

    out[0] = START_BYTE;
    out[1] = command;
    out[2] = payload.len() as u8;
    out[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
    out[total - 1] = checksum(&out[..total - 1]);

    Ok(total)
}

/// One decoded frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    command: u8,
    payload: heapless::Vec<u8, MAX_PAYLOAD>,
}

impl Frame {
    pub fn new(command: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = heapless::Vec::from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLong(payload.len()))?;
        Ok(Self { command, payload })
    }

    pub(crate) const fn empty(command: u8) -> Self {
        Self {
            command,
            payload: heapless::Vec::new(),
        }
    }

    /// Append one payload byte; fails once the length field is exhausted.
    pub(crate) fn push_payload(&mut self, byte: u8) -> Result<(), FrameError> {
        self.payload
            .push(byte)
            .map_err(|_| FrameError::PayloadTooLong(MAX_PAYLOAD + 1))
    }

    #[inline]
    pub fn command(&self) -> u8 {
        self.command
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Checksum this frame carries on the wire.
    pub fn checksum(&self) -> u8 {
        START_BYTE ^ self.command ^ self.payload.len() as u8 ^ checksum(&self.payload)
    }

    /// Encode this frame into `out`.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, FrameError> {
        encode(self.command, self.payload(), out)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("command", &format_args!("0x{:02X}", self.command))
            .field("payload", &self.payload())
            .finish()
    }
}
