//! STUSB4500 USB-PD sink controller (USB-C Sink Click).
//!
//! The chip negotiates power on its own from the sink PDOs it holds.
//! Those PDOs live in two places:
//!
//! - volatile DPM registers, used by the next negotiation (lost on reset)
//! - the NVM, copied into the DPM registers at power-up; see [`nvm`]
//!
//! To ask for a different contract at runtime, write a PDO, set the PDO
//! count and issue a soft reset so the chip renegotiates.

pub mod nvm;
pub mod pdo;

pub use nvm::{Nvm, NvmImage, SECTOR_COUNT, SECTOR_SIZE};
pub use pdo::{Rdo, SinkPdo};

use pdo::SAFE_VOLTAGE_MV;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::bus::RegisterBus;
use crate::error::{Error, Result};

/// ADDR0 = ADDR1 = 0. The two address pins add 0..=3.
pub const DEFAULT_ADDRESS: u8 = 0x28;

/// DEVICE_ID values seen across silicon revisions.
pub const DEVICE_IDS: [u8; 2] = [0x21, 0x25];

pub const MAX_PDOS: u8 = 3;

#[allow(dead_code)]
pub(crate) mod reg {
    pub const ALERT_STATUS_1: u8 = 0x0B;
    pub const ALERT_STATUS_1_MASK: u8 = 0x0C;
    pub const PORT_STATUS_0: u8 = 0x0D;
    pub const PORT_STATUS_1: u8 = 0x0E;
    pub const PD_COMMAND_CTRL: u8 = 0x1A;
    pub const DEVICE_ID: u8 = 0x2F;
    pub const TX_HEADER_LOW: u8 = 0x51;
    pub const RW_BUFFER: u8 = 0x53;
    pub const DPM_PDO_NUMB: u8 = 0x70;
    pub const DPM_SNK_PDO1: u8 = 0x85;
    pub const RDO_REG_STATUS_0: u8 = 0x91;
    pub const FTP_CUST_PASSWORD_REG: u8 = 0x95;
    pub const FTP_CTRL_0: u8 = 0x96;
    pub const FTP_CTRL_1: u8 = 0x97;
}

const ATTACH: u8 = 0x01;
const PDO_NUMB_MASK: u8 = 0x07;

// soft reset = send a SOFT_RESET control message on the PD line
const SOFT_RESET_HEADER: u8 = 0x0D;
const SEND_COMMAND: u8 = 0x26;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Clear latched alerts during `init`.
    pub clear_alerts: bool,
}

pub struct Stusb4500<B> {
    bus: B,
    config: Config,
}

impl<B: RegisterBus> Stusb4500<B> {
    pub fn new(bus: B, config: Config) -> Self {
        Self { bus, config }
    }

    pub fn release(self) -> B {
        self.bus
    }

    pub fn read_reg(&mut self, reg: u8) -> Result<u8, B::Error> {
        Ok(self.bus.read_reg(reg)?)
    }

    pub fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), B::Error> {
        Ok(self.bus.write_reg(reg, value)?)
    }

    pub fn device_id(&mut self) -> Result<u8, B::Error> {
        self.read_reg(reg::DEVICE_ID)
    }

    pub fn init(&mut self) -> Result<(), B::Error> {
        let id = self.device_id()?;
        if !DEVICE_IDS.contains(&id) {
            return Err(Error::InvalidDevice(id));
        }
        if self.config.clear_alerts {
            self.read_alert_status()?;
        }

        let count = self.pdo_count()?;
        info!("stusb4500: id 0x{:02X}, {} sink PDO(s)", id, count);
        for n in 1..=count {
            let pdo = self.read_pdo(n)?;
            info!(
                "stusb4500:   PDO{}: {} mV / {} mA",
                n,
                pdo.voltage_mv(),
                pdo.current_ma()
            );
        }
        Ok(())
    }

    /// Raw ALERT_STATUS_1; reading clears the latched bits.
    pub fn read_alert_status(&mut self) -> Result<u8, B::Error> {
        self.read_reg(reg::ALERT_STATUS_1)
    }

    pub fn is_attached(&mut self) -> Result<bool, B::Error> {
        Ok(self.read_reg(reg::PORT_STATUS_1)? & ATTACH != 0)
    }

    /// Force renegotiation with the current DPM PDOs.
    pub fn soft_reset(&mut self) -> Result<(), B::Error> {
        self.bus.write_reg(reg::TX_HEADER_LOW, SOFT_RESET_HEADER)?;
        self.bus.write_reg(reg::PD_COMMAND_CTRL, SEND_COMMAND)?;
        Ok(())
    }

    pub fn pdo_count(&mut self) -> Result<u8, B::Error> {
        Ok(self.read_reg(reg::DPM_PDO_NUMB)? & PDO_NUMB_MASK)
    }

    pub fn set_pdo_count(&mut self, count: u8) -> Result<(), B::Error> {
        if !(1..=MAX_PDOS).contains(&count) {
            return Err(Error::InvalidArgument);
        }
        Ok(self.bus.modify_reg(reg::DPM_PDO_NUMB, PDO_NUMB_MASK, count)?)
    }

    /// Read sink PDO `n` (1-based).
    pub fn read_pdo(&mut self, n: u8) -> Result<SinkPdo, B::Error> {
        let addr = pdo_register::<B::Error>(n)?;
        let mut buf = [0u8; 4];
        self.bus.read_regs(addr, &mut buf)?;
        Ok(SinkPdo::from_raw(u32::from_le_bytes(buf)))
    }

    /// Write sink PDO `n` (1-based). PDO1 must stay at 5 V.
    pub fn write_pdo(&mut self, n: u8, pdo: SinkPdo) -> Result<(), B::Error> {
        let addr = pdo_register::<B::Error>(n)?;
        if n == 1 && pdo.voltage_mv() != SAFE_VOLTAGE_MV {
            warn!("stusb4500: PDO1 must be 5 V, got {} mV", pdo.voltage_mv());
            return Err(Error::InvalidArgument);
        }
        Ok(self.bus.write_regs(addr, &pdo.raw().to_le_bytes())?)
    }

    /// Put `pdo` in slot `n`, make it the highest-numbered (preferred)
    /// PDO and renegotiate.
    pub fn request(&mut self, n: u8, pdo: SinkPdo) -> Result<(), B::Error> {
        self.write_pdo(n, pdo)?;
        self.set_pdo_count(n)?;
        self.soft_reset()?;
        info!(
            "stusb4500: requested PDO{} {} mV / {} mA",
            n,
            pdo.voltage_mv(),
            pdo.current_ma()
        );
        Ok(())
    }

    /// Request data object of the active contract.
    pub fn read_rdo(&mut self) -> Result<Rdo, B::Error> {
        let mut buf = [0u8; 4];
        self.bus.read_regs(reg::RDO_REG_STATUS_0, &mut buf)?;
        Ok(Rdo::from_raw(u32::from_le_bytes(buf)))
    }

    /// NVM access; see [`Nvm`].
    pub fn nvm<'a, D: DelayNs>(&'a mut self, delay: &'a mut D) -> Nvm<'a, B, D> {
        Nvm::new(&mut self.bus, delay)
    }
}

fn pdo_register<E>(n: u8) -> Result<u8, E> {
    if !(1..=MAX_PDOS).contains(&n) {
        return Err(Error::InvalidArgument);
    }
    Ok(reg::DPM_SNK_PDO1 + 4 * (n - 1))
}
