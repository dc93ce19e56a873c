//! Wireless M-Bus 868 MHz module (M-BUS RF 5 Click).
//!
//! The module speaks a framed command interface over UART (9600 8N1):
//! `FF | CMD | LEN | PAYLOAD | CS`, see [`mbus_frame`]. Every request is
//! answered by a confirmation `CMD | 0x40`. Received radio telegrams
//! arrive unsolicited as `DATA_IND` frames at any time, including while
//! a confirmation is pending; those are queued and handed out by
//! [`MbusRf5::poll`].
//!
//! Reset is active low. The module boots in the mode stored in its
//! parameter memory.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_io::{Read, ReadReady, Write};
use log::{debug, info, warn};
use heapless::Deque;
use mbus_frame::{Command, Frame, FrameError, MAX_FRAME, MAX_PAYLOAD, Parser};

use crate::error::{Error, Result};

pub const BAUD_RATE: u32 = 9600;

const RESET_PULSE_MS: u32 = 10;
const BOOT_MS: u32 = 300;

/// Indications kept while a confirmation is pending.
const QUEUE_DEPTH: usize = 2;

// GET/SET payload header: memory position, length
const PARAM_HEADER: usize = 2;

/// Wireless M-Bus mode (EN 13757-4). "Meter" modes transmit in the
/// meter-to-other direction, "other" modes are for collectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    S1 = 0x01,
    S1m = 0x02,
    S2 = 0x03,
    T1Meter = 0x05,
    T1Other = 0x06,
    T2Meter = 0x07,
    T2Other = 0x08,
    C2T2Other = 0x09,
    C1Meter = 0x0A,
    C2Meter = 0x0B,
    C2Other = 0x0C,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Module appends one RSSI byte to every DATA_IND payload
    /// (parameter memory `CMD_OUT_ENABLE` RSSI bit).
    pub rssi_appended: bool,
    /// How long to wait for a confirmation.
    pub confirm_timeout_ms: u32,
    /// How long to wait for DATA_CNF; covers the on-air time of a
    /// full telegram at the slowest mode.
    pub tx_timeout_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rssi_appended: true,
            confirm_timeout_ms: 500,
            tx_timeout_ms: 2000,
        }
    }
}

/// One received radio telegram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indication {
    data: heapless::Vec<u8, MAX_PAYLOAD>,
    /// Receive level in dBm, when the module reports it.
    pub rssi_dbm: Option<i16>,
}

impl Indication {
    fn from_frame(frame: &Frame, rssi_appended: bool) -> Self {
        let payload = frame.payload();
        let (body, rssi_dbm) = match payload.split_last() {
            Some((&raw, body)) if rssi_appended => (body, Some(rssi_to_dbm(raw))),
            _ => (payload, None),
        };

        // body is a slice of a frame payload, so it always fits
        let mut data = heapless::Vec::new();
        let _ = data.extend_from_slice(body);
        Self { data, rssi_dbm }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Raw RSSI register value to dBm: two's complement, 0.5 dB steps,
/// offset -74 dBm.
pub fn rssi_to_dbm(raw: u8) -> i16 {
    let raw = raw as i16;
    if raw >= 128 {
        (raw - 256) / 2 - 74
    } else {
        raw / 2 - 74
    }
}

pub struct MbusRf5<U, RST, D> {
    uart: U,
    rst: RST,
    delay: D,
    config: Config,
    parser: Parser,
    // oldest first
    queue: Deque<Indication, QUEUE_DEPTH>,
}

impl<U, RST, D> MbusRf5<U, RST, D>
where
    U: Read + Write + ReadReady,
    RST: OutputPin,
    D: DelayNs,
{
    pub fn new(uart: U, rst: RST, delay: D, config: Config) -> Self {
        Self {
            uart,
            rst,
            delay,
            config,
            parser: Parser::new(),
            queue: Deque::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn release(self) -> (U, RST, D) {
        (self.uart, self.rst, self.delay)
    }

    /// Pulse RST and wait for the module to boot. Drops any partial frame
    /// and queued indications.
    pub fn hw_reset(&mut self) -> Result<(), U::Error> {
        self.rst.set_low().map_err(|_| Error::Pin)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.rst.set_high().map_err(|_| Error::Pin)?;
        self.delay.delay_ms(BOOT_MS);

        self.parser.reset();
        self.queue.clear();
        info!("mbusrf5: hardware reset");
        Ok(())
    }

    /// Frame and write one request; does not wait for the confirmation.
    pub fn send_command(&mut self, command: Command, payload: &[u8]) -> Result<(), U::Error> {
        let mut buf = [0u8; MAX_FRAME];
        let n = mbus_frame::encode(command.code(), payload, &mut buf).map_err(Error::Frame)?;
        self.uart.write_all(&buf[..n])?;
        self.uart.flush()?;
        debug!("mbusrf5: -> {} ({} bytes)", command, payload.len());
        Ok(())
    }

    /// Send a request and wait for its confirmation.
    pub fn transact(&mut self, command: Command, payload: &[u8]) -> Result<Frame, U::Error> {
        let timeout_ms = match command {
            Command::Data | Command::DataRetry => self.config.tx_timeout_ms,
            _ => self.config.confirm_timeout_ms,
        };

        self.send_command(command, payload)?;

        // one step per received frame or idle millisecond, so a steady
        // stream of unrelated traffic still runs into the timeout
        let expected = command.confirmation();
        let mut steps = 0;
        loop {
            match self.next_frame()? {
                Some(Ok(frame)) if frame.command() == expected => {
                    debug!("mbusrf5: <- {} cnf ({} bytes)", command, frame.len());
                    return Ok(frame);
                }
                Some(Ok(frame)) if frame.command() == Command::DataInd.code() => {
                    let ind = Indication::from_frame(&frame, self.config.rssi_appended);
                    self.enqueue(ind);
                }
                Some(Ok(frame)) => {
                    warn!(
                        "mbusrf5: dropped 0x{:02X} while waiting for 0x{:02X}",
                        frame.command(),
                        expected
                    );
                }
                // a corrupt frame is not the confirmation; keep waiting
                Some(Err(e)) => {
                    warn!("mbusrf5: {} while waiting for 0x{:02X}", e, expected);
                }
                None => self.delay.delay_ms(1),
            }

            steps += 1;
            if steps >= timeout_ms {
                warn!("mbusrf5: no confirmation for {}", command);
                return Err(Error::Timeout);
            }
        }
    }

    /// Next received telegram, if any. Never blocks.
    pub fn poll(&mut self) -> Result<Option<Indication>, U::Error> {
        if let Some(ind) = self.queue.pop_front() {
            return Ok(Some(ind));
        }

        while let Some(result) = self.next_frame()? {
            let frame = result.map_err(Error::Frame)?;
            if frame.command() == Command::DataInd.code() {
                let ind = Indication::from_frame(&frame, self.config.rssi_appended);
                debug!("mbusrf5: indication, {} bytes", ind.data().len());
                return Ok(Some(ind));
            }
            warn!("mbusrf5: unsolicited frame 0x{:02X}", frame.command());
        }
        Ok(None)
    }

    /// Indications received during a transaction and not yet polled.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Transmit one telegram over the radio.
    pub fn send_data(&mut self, data: &[u8]) -> Result<(), U::Error> {
        if data.is_empty() || data.len() > MAX_PAYLOAD {
            return Err(Error::InvalidArgument);
        }
        self.transact_status(Command::Data, data)
    }

    /// Switch mode until the next reset.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), U::Error> {
        self.transact_status(Command::SetMode, &[mode as u8])?;
        info!("mbusrf5: mode {:?}", mode);
        Ok(())
    }

    /// Software reset; waits for the module to boot again.
    pub fn reset(&mut self) -> Result<(), U::Error> {
        self.transact_status(Command::Reset, &[])?;
        self.delay.delay_ms(BOOT_MS);
        self.parser.reset();
        Ok(())
    }

    /// Restore the parameter memory to defaults and reboot.
    pub fn factory_reset(&mut self) -> Result<(), U::Error> {
        self.transact_status(Command::FactoryReset, &[])?;
        self.delay.delay_ms(BOOT_MS);
        self.parser.reset();
        info!("mbusrf5: factory reset");
        Ok(())
    }

    /// Read `len` bytes of parameter memory at `addr` into `buf`.
    pub fn get_parameter(&mut self, addr: u8, len: u8, buf: &mut [u8]) -> Result<usize, U::Error> {
        let len_usize = len as usize;
        if len == 0 || buf.len() < len_usize {
            return Err(Error::InvalidArgument);
        }

        let cnf = self.transact(Command::Get, &[addr, len])?;
        let payload = cnf.payload();
        if payload.len() < PARAM_HEADER + len_usize || payload[0] != addr || payload[1] != len {
            return Err(Error::UnexpectedResponse(cnf.command()));
        }
        buf[..len_usize].copy_from_slice(&payload[PARAM_HEADER..PARAM_HEADER + len_usize]);
        Ok(len_usize)
    }

    /// Write `data` to parameter memory at `addr`. Takes effect after reset.
    pub fn set_parameter(&mut self, addr: u8, data: &[u8]) -> Result<(), U::Error> {
        if data.is_empty() || data.len() > MAX_PAYLOAD - PARAM_HEADER {
            return Err(Error::InvalidArgument);
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        payload[0] = addr;
        payload[1] = data.len() as u8;
        payload[PARAM_HEADER..PARAM_HEADER + data.len()].copy_from_slice(data);
        self.transact_status(Command::Set, &payload[..PARAM_HEADER + data.len()])
    }

    pub fn serial_number(&mut self) -> Result<u32, U::Error> {
        let raw = self.query::<4>(Command::SerialNo)?;
        Ok(u32::from_be_bytes(raw))
    }

    /// `(major, minor, patch)`
    pub fn firmware_version(&mut self) -> Result<(u8, u8, u8), U::Error> {
        let [major, minor, patch] = self.query::<3>(Command::FirmwareVersion)?;
        Ok((major, minor, patch))
    }

    /// Level of the last received telegram, in dBm.
    pub fn rssi(&mut self) -> Result<i16, U::Error> {
        let [raw] = self.query::<1>(Command::Rssi)?;
        Ok(rssi_to_dbm(raw))
    }

    // fixed-size query confirmation
    fn query<const N: usize>(&mut self, command: Command) -> Result<[u8; N], U::Error> {
        debug_assert!(!command.returns_status(), "{} returns a status", command);
        let cnf = self.transact(command, &[])?;
        let payload = cnf.payload();
        if payload.len() < N {
            return Err(Error::UnexpectedResponse(cnf.command()));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&payload[..N]);
        Ok(out)
    }

    fn transact_status(&mut self, command: Command, payload: &[u8]) -> Result<(), U::Error> {
        debug_assert!(command.returns_status(), "{} returns data", command);
        let cnf = self.transact(command, payload)?;
        match cnf.payload().first().copied() {
            Some(0) => Ok(()),
            Some(status) => {
                warn!("mbusrf5: {} failed, status 0x{:02X}", command, status);
                Err(Error::Status(status))
            }
            None => Err(Error::UnexpectedResponse(cnf.command())),
        }
    }

    // a full queue drops its oldest entry
    fn enqueue(&mut self, ind: Indication) {
        if self.queue.is_full() {
            warn!("mbusrf5: indication queue full, dropping oldest");
            self.queue.pop_front();
        }
        let _ = self.queue.push_back(ind);
    }

    // feed bytes to the parser until a frame completes or the UART runs dry
    fn next_frame(&mut self) -> Result<Option<core::result::Result<Frame, FrameError>>, U::Error> {
        let mut byte = [0u8; 1];
        while self.uart.read_ready()? {
            if self.uart.read(&mut byte)? == 0 {
                break;
            }
            if let Some(result) = self.parser.push(byte[0]) {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}
