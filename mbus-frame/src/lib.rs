// mbus-frame: no_std codec for the M-BUS RF 5 module command interface.
// command: request / confirmation / indication command codes
// frame:   frame type, encoder, XOR checksum
// parser:  streaming byte-at-a-time frame parser with resync

#![cfg_attr(not(test), no_std)]

pub mod command;
pub mod frame;
pub mod parser;

pub use command::Command;
pub use frame::{Frame, FrameError, MAX_FRAME, MAX_PAYLOAD, START_BYTE, checksum, encode};
pub use parser::Parser;
