// Driver error type shared by every Click driver.
//
// Bus errors are carried through unchanged so callers can still inspect
// the HAL's own error kind; everything else is a chip-level failure.

use core::fmt;

use mbus_frame::FrameError;

pub type Result<T, E> = core::result::Result<T, Error<E>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// I2C / SPI / UART transfer failed.
    Bus(E),
    /// A control pin (reset, chip select) could not be driven.
    Pin,
    /// Identity register did not match; holds the value read.
    InvalidDevice(u8),
    /// The chip did not finish an operation in the allotted time.
    Timeout,
    /// Argument outside what the chip accepts (channel, sector, PDO...).
    InvalidArgument,
    /// Malformed frame from a serial module.
    Frame(FrameError),
    /// Module reported a non-zero status code.
    Status(u8),
    /// Module answered with something other than what was asked.
    UnexpectedResponse(u8),
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::Bus(error)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {:?}", e),
            Error::Pin => write!(f, "control pin error"),
            Error::InvalidDevice(id) => write!(f, "unexpected device id 0x{:02X}", id),
            Error::Timeout => write!(f, "timed out"),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::Frame(e) => write!(f, "frame error: {}", e),
            Error::Status(s) => write!(f, "module status 0x{:02X}", s),
            Error::UnexpectedResponse(c) => write!(f, "unexpected response 0x{:02X}", c),
        }
    }
}
