//! Host-side mocks for driver tests
//!
//! Records all bus traffic for verification. State that tests need to
//! inspect after the mock has been moved into a driver is kept behind
//! `Rc` handles.

use std::boxed::Box;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource};
use embedded_hal::spi::{self, SpiDevice};

pub type Registers = [u8; 256];

/// Called after each I2C write transaction with the first register written.
pub type WriteHook = Box<dyn FnMut(&mut Registers, u8)>;

// ── I2C ─────────────────────────────────────────────────────

/// Register-file I2C device: first written byte is the register pointer,
/// reads and writes auto-increment from there.
pub struct MockI2c {
    address: u8,
    regs: Registers,
    writes: Vec<(u8, Vec<u8>)>,
    transactions: usize,
    fail_at: Option<usize>,
    hook: Option<WriteHook>,
}

impl MockI2c {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            regs: [0; 256],
            writes: Vec::new(),
            transactions: 0,
            fail_at: None,
            hook: None,
        }
    }

    pub fn set_reg(&mut self, reg: u8, value: u8) {
        self.regs[reg as usize] = value;
    }

    pub fn set_regs(&mut self, reg: u8, values: &[u8]) {
        let start = reg as usize;
        self.regs[start..start + values.len()].copy_from_slice(values);
    }

    pub fn reg(&self, reg: u8) -> u8 {
        self.regs[reg as usize]
    }

    /// Every write transaction as `(first register, data)`.
    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.writes
    }

    /// Values written to one register, in order.
    pub fn writes_to(&self, reg: u8) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .filter_map(|(_, d)| d.first().copied())
            .collect()
    }

    /// Fail the `n`th transaction from now (0 = the next one).
    pub fn fail_transaction(&mut self, n: usize) {
        self.fail_at = Some(self.transactions + n);
    }

    pub fn on_write(&mut self, hook: WriteHook) {
        self.hook = Some(hook);
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        let n = self.transactions;
        self.transactions += 1;
        if self.fail_at == Some(n) {
            self.fail_at = None;
            return Err(ErrorKind::Bus);
        }
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        let mut pointer: Option<u8> = None;
        let mut written: Option<(u8, Vec<u8>)> = None;

        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        match pointer {
                            None => pointer = Some(b),
                            Some(p) => {
                                self.regs[p as usize] = b;
                                written.get_or_insert_with(|| (p, Vec::new())).1.push(b);
                                pointer = Some(p.wrapping_add(1));
                            }
                        }
                    }
                }
                i2c::Operation::Read(buf) => {
                    let mut p = pointer.unwrap_or(0);
                    for b in buf.iter_mut() {
                        *b = self.regs[p as usize];
                        p = p.wrapping_add(1);
                    }
                    pointer = Some(p);
                }
            }
        }

        if let Some((reg, data)) = written {
            self.writes.push((reg, data));
            if let Some(hook) = self.hook.as_mut() {
                hook(&mut self.regs, reg);
            }
        }
        Ok(())
    }
}

// ── SPI ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpiOp {
    Write(Vec<u8>),
    Read(usize),
    Transfer(Vec<u8>),
    Delay(u32),
}

/// SPI device that answers reads from a queue and logs every operation.
#[derive(Default)]
pub struct MockSpi {
    rx: RefCell<VecDeque<u8>>,
    log: RefCell<Vec<SpiOp>>,
}

impl MockSpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_read(&self, bytes: &[u8]) {
        self.rx.borrow_mut().extend(bytes.iter().copied());
    }

    pub fn log(&self) -> Vec<SpiOp> {
        self.log.borrow().clone()
    }

    fn next(&self) -> u8 {
        self.rx.borrow_mut().pop_front().unwrap_or(0)
    }
}

impl spi::ErrorType for MockSpi {
    type Error = spi::ErrorKind;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations.iter_mut() {
            let entry = match op {
                spi::Operation::Write(bytes) => SpiOp::Write(bytes.to_vec()),
                spi::Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.next();
                    }
                    SpiOp::Read(buf.len())
                }
                spi::Operation::Transfer(read, write) => {
                    for b in read.iter_mut() {
                        *b = self.next();
                    }
                    SpiOp::Transfer(write.to_vec())
                }
                spi::Operation::TransferInPlace(buf) => {
                    let sent = buf.to_vec();
                    for b in buf.iter_mut() {
                        *b = self.next();
                    }
                    SpiOp::Transfer(sent)
                }
                spi::Operation::DelayNs(ns) => SpiOp::Delay(*ns),
            };
            self.log.borrow_mut().push(entry);
        }
        Ok(())
    }
}

// ── GPIO / delay ────────────────────────────────────────────

/// Pin whose level (and history of driven levels) is shared with the test.
#[derive(Clone, Default)]
pub struct MockPin {
    level: Rc<Cell<bool>>,
    history: Rc<RefCell<Vec<bool>>>,
}

impl MockPin {
    pub fn new(high: bool) -> Self {
        let pin = Self::default();
        pin.level.set(high);
        pin
    }

    pub fn set(&self, high: bool) {
        self.level.set(high);
    }

    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }
}

impl PinErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        self.history.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(true);
        self.history.borrow_mut().push(true);
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

/// Delay that only counts elapsed time.
#[derive(Clone, Default)]
pub struct MockDelay {
    elapsed_ns: Rc<Cell<u64>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns.get() / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + ns as u64);
    }
}

// ── UART ────────────────────────────────────────────────────

#[derive(Default)]
struct UartState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    parser: mbus_frame::Parser,
    requests: Vec<mbus_frame::Frame>,
    replies: VecDeque<(u8, Vec<u8>)>,
}

/// Serial module stand-in: decodes frames the driver writes and answers
/// them from a scripted reply list.
#[derive(Clone, Default)]
pub struct MockUart {
    state: Rc<RefCell<UartState>>,
}

impl MockUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for the driver to read.
    pub fn inject(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Queue an encoded frame for the driver to read.
    pub fn inject_frame(&self, command: u8, payload: &[u8]) {
        let mut buf = [0u8; mbus_frame::MAX_FRAME];
        let n = mbus_frame::encode(command, payload, &mut buf).unwrap();
        self.inject(&buf[..n]);
    }

    /// When a request with `command` is written, answer with `reply`.
    pub fn reply_to(&self, command: u8, reply: &[u8]) {
        self.state
            .borrow_mut()
            .replies
            .push_back((command, reply.to_vec()));
    }

    /// Answer `command` with a well-formed frame.
    pub fn reply_frame(&self, command: u8, reply_command: u8, payload: &[u8]) {
        let mut buf = [0u8; mbus_frame::MAX_FRAME];
        let n = mbus_frame::encode(reply_command, payload, &mut buf).unwrap();
        self.reply_to(command, &buf[..n]);
    }

    pub fn tx(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    /// Requests the driver has sent, decoded.
    pub fn requests(&self) -> Vec<mbus_frame::Frame> {
        self.state.borrow().requests.clone()
    }
}

impl embedded_io::ErrorType for MockUart {
    type Error = embedded_io::ErrorKind;
}

impl embedded_io::Read for MockUart {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.state.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match state.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for MockUart {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.state.borrow().rx.is_empty())
    }
}

impl embedded_io::Write for MockUart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.tx.extend_from_slice(buf);
        for &b in buf {
            if let Some(Ok(frame)) = state.parser.push(b) {
                let cmd = frame.command();
                state.requests.push(frame);
                if let Some(pos) = state.replies.iter().position(|(c, _)| *c == cmd) {
                    if let Some((_, reply)) = state.replies.remove(pos) {
                        state.rx.extend(reply);
                    }
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
