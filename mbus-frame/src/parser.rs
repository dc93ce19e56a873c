//! Streaming frame parser.
//!
//! Bytes are fed one at a time as they come off the UART. Anything before
//! a start byte is discarded; after a checksum error the parser waits for
//! the next start byte.

use log::{debug, warn};

use crate::frame::{Frame, FrameError, START_BYTE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitStart,
    Command,
    Length,
    Payload { len: u8 },
    Checksum,
}

pub struct Parser {
    state: State,
    frame: Frame,
    running: u8,
    discarded: u32,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub const fn new() -> Self {
        Self {
            state: State::WaitStart,
            frame: Frame::empty(0),
            running: 0,
            discarded: 0,
        }
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.state = State::WaitStart;
        self.running = 0;
    }

    /// True while a frame has been started but not completed.
    pub fn in_frame(&self) -> bool {
        self.state != State::WaitStart
    }

    /// Bytes thrown away while hunting for a start byte.
    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Feed one byte. Returns a frame (or error) when one completes.
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame, FrameError>> {
        match self.state {
            State::WaitStart => {
                if byte == START_BYTE {
                    self.running = START_BYTE;
                    self.state = State::Command;
                } else {
                    self.discarded = self.discarded.wrapping_add(1);
                }
                None
            }
            State::Command => {
                self.frame = Frame::empty(byte);
                self.running ^= byte;
                self.state = State::Length;
                None
            }
            State::Length => {
                self.running ^= byte;
                self.state = if byte == 0 {
                    State::Checksum
                } else {
                    State::Payload { len: byte }
                };
                None
            }
            State::Payload { len } => {
                if let Err(e) = self.frame.push_payload(byte) {
                    self.reset();
                    return Some(Err(e));
                }
                self.running ^= byte;
                if self.frame.len() == len as usize {
                    self.state = State::Checksum;
                }
                None
            }
            State::Checksum => {
                let expected = self.running;
                self.reset();
                if byte == expected {
                    debug!(
                        "mbus: frame cmd=0x{:02X} len={}",
                        self.frame.command(),
                        self.frame.len()
                    );
                    Some(Ok(self.frame.clone()))
                } else {
                    warn!(
                        "mbus: checksum mismatch on cmd 0x{:02X}: expected 0x{:02X}, got 0x{:02X}",
                        self.frame.command(),
                        expected,
                        byte
                    );
                    Some(Err(FrameError::Checksum {
                        expected,
                        actual: byte,
                    }))
                }
            }
        }
    }

    /// Parse exactly one frame from `bytes`, ignoring leading noise.
    /// Returns the frame and the number of bytes consumed.
    pub fn parse_one(bytes: &[u8]) -> Result<(Frame, usize), FrameError> {
        let mut parser = Parser::new();
        for (i, &b) in bytes.iter().enumerate() {
            if let Some(result) = parser.push(b) {
                return result.map(|frame| (frame, i + 1));
            }
        }
        Err(FrameError::Truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;

    fn feed(parser: &mut Parser, bytes: &[u8]) -> Vec<Result<Frame, FrameError>> {
        bytes.iter().filter_map(|&b| parser.push(b)).collect()
    }

    #[test]
    fn parses_confirmation_with_status() {
        let mut parser = Parser::new();
        // DATA_CNF, status 0
        let out = feed(&mut parser, &[0xFF, 0x40, 0x01, 0x00, 0xBE]);
        assert_eq!(out.len(), 1);
        let frame = out[0].as_ref().unwrap();
        assert_eq!(frame.command(), 0x40);
        assert_eq!(frame.payload(), &[0x00]);
        assert!(!parser.in_frame());
    }

    #[test]
    fn skips_noise_before_start_byte() {
        let mut buf = [0u8; 16];
        let n = encode(0x4B, &[0x12, 0x34, 0x56, 0x78], &mut buf).unwrap();

        let mut parser = Parser::new();
        let mut stream = vec![0x00, 0x13, 0x37];
        stream.extend_from_slice(&buf[..n]);
        let out = feed(&mut parser, &stream);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().payload(), &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(parser.discarded(), 3);
    }

    #[test]
    fn zero_length_frame() {
        let (frame, used) = Parser::parse_one(&[0xFF, 0x45, 0x00, 0xBA]).unwrap();
        assert_eq!(frame.command(), 0x45);
        assert!(frame.is_empty());
        assert_eq!(used, 4);
    }

    #[test]
    fn bad_checksum_then_resync() {
        let mut parser = Parser::new();
        let mut stream = vec![0xFF, 0x40, 0x01, 0x00, 0x00];
        stream.extend_from_slice(&[0xFF, 0x40, 0x01, 0x00, 0xBE]);
        let out = feed(&mut parser, &stream);

        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            Err(FrameError::Checksum {
                expected: 0xBE,
                actual: 0x00
            })
        );
        assert_eq!(out[1].as_ref().unwrap().command(), 0x40);
    }

    #[test]
    fn back_to_back_frames() {
        let mut a = [0u8; 16];
        let na = encode(0x03, &[0xAA; 5], &mut a).unwrap();
        let mut b = [0u8; 16];
        let nb = encode(0x4D, &[0x80], &mut b).unwrap();

        let mut stream = a[..na].to_vec();
        stream.extend_from_slice(&b[..nb]);

        let mut parser = Parser::new();
        let out = feed(&mut parser, &stream);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().command(), 0x03);
        assert_eq!(out[1].as_ref().unwrap().payload(), &[0x80]);
    }

    #[test]
    fn truncated_input() {
        assert_eq!(
            Parser::parse_one(&[0xFF, 0x40, 0x02, 0x00]),
            Err(FrameError::Truncated)
        );
    }

    #[test]
    fn max_length_payload() {
        let payload = [0x5Au8; 255];
        let mut buf = [0u8; crate::MAX_FRAME];
        let n = encode(0x03, &payload, &mut buf).unwrap();
        let (frame, used) = Parser::parse_one(&buf[..n]).unwrap();
        assert_eq!(used, n);
        assert_eq!(frame.len(), 255);
    }
}
