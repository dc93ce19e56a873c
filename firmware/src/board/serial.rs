//! Blocking UART wrapped in the `embedded-io` traits the Click drivers
//! are written against.

use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use esp_hal::{
    Blocking,
    uart::{RxError, TxError, Uart},
};

#[derive(Debug)]
pub enum UartError {
    Rx(RxError),
    Tx(TxError),
}

impl embedded_io::Error for UartError {
    fn kind(&self) -> ErrorKind {
        match self {
            UartError::Rx(RxError::FifoOverflowed) => ErrorKind::OutOfMemory,
            UartError::Rx(_) => ErrorKind::InvalidData,
            UartError::Tx(_) => ErrorKind::Other,
        }
    }
}

/// UART on a mikroBUS socket.
pub struct MikroUart {
    uart: Uart<'static, Blocking>,
}

impl MikroUart {
    pub fn new(uart: Uart<'static, Blocking>) -> Self {
        Self { uart }
    }
}

impl ErrorType for MikroUart {
    type Error = UartError;
}

impl Read for MikroUart {
    // blocks until at least one byte is in the FIFO
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.uart.read(buf).map_err(UartError::Rx)
    }
}

impl ReadReady for MikroUart {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.uart.read_ready())
    }
}

impl Write for MikroUart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.uart.write(buf).map_err(UartError::Tx)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.uart.flush().map_err(UartError::Tx)
    }
}
