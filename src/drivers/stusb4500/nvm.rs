//! STUSB4500 NVM ("FTP") programming.
//!
//! The NVM holds 5 sectors of 8 bytes and is loaded into the DPM
//! registers at power-up. It is reached through a small controller:
//!
//! - unlock by writing the customer password to `FTP_CUST_PASSWORD_REG`
//! - pick an opcode in `FTP_CTRL_1` (plus the sector-erase mask for
//!   `WRITE_SER`)
//! - start it by setting `REQ` in `FTP_CTRL_0` (plus the sector number)
//! - wait for the controller to clear `REQ`
//! - data moves through the 8-byte `RW_BUFFER`
//!
//! Reprogramming is erase-then-write: load the erase mask, soft-program,
//! erase, then for each sector load the program buffer and program it.
//! The controller is always taken back out of test mode, also when a
//! step fails.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use super::reg;
use crate::bus::RegisterBus;
use crate::error::{Error, Result};

pub const SECTOR_COUNT: usize = 5;
pub const SECTOR_SIZE: usize = 8;

const PASSWORD: u8 = 0x47;

const ALL_SECTORS: u8 = 0x1F;

// REQ normally clears within a few hundred µs; erase is the slowest
const REQ_POLL_US: u32 = 100;
const REQ_POLL_LIMIT: u32 = 1000;

mod ctrl0 {
    pub const PWR: u8 = 0x80;
    pub const RST_N: u8 = 0x40;
    pub const REQ: u8 = 0x10;
    pub const SECT: u8 = 0x07;
}

mod ctrl1 {
    pub const SER: u8 = 0xF8;
    pub const OPCODE: u8 = 0x07;
}

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Opcode {
    Read = 0x00,
    WritePl = 0x01,
    WriteSer = 0x02,
    ReadPl = 0x03,
    ReadSer = 0x04,
    EraseSector = 0x05,
    ProgSector = 0x06,
    SoftProgSector = 0x07,
}

/// Full NVM contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NvmImage {
    pub sectors: [[u8; SECTOR_SIZE]; SECTOR_COUNT],
}

impl NvmImage {
    pub fn from_bytes(bytes: &[u8; SECTOR_COUNT * SECTOR_SIZE]) -> Self {
        let mut image = Self::default();
        for (sector, chunk) in image.sectors.iter_mut().zip(bytes.chunks_exact(SECTOR_SIZE)) {
            sector.copy_from_slice(chunk);
        }
        image
    }

    pub fn to_bytes(&self) -> [u8; SECTOR_COUNT * SECTOR_SIZE] {
        let mut out = [0u8; SECTOR_COUNT * SECTOR_SIZE];
        for (chunk, sector) in out.chunks_exact_mut(SECTOR_SIZE).zip(self.sectors.iter()) {
            chunk.copy_from_slice(sector);
        }
        out
    }
}

pub struct Nvm<'a, B, D> {
    bus: &'a mut B,
    delay: &'a mut D,
}

impl<'a, B: RegisterBus, D: DelayNs> Nvm<'a, B, D> {
    pub fn new(bus: &'a mut B, delay: &'a mut D) -> Self {
        Self { bus, delay }
    }

    // ── Whole-image operations ──────────────────────────────

    /// Dump all sectors.
    pub fn read_all(&mut self) -> Result<NvmImage, B::Error> {
        let result = self.read_all_inner();
        let exit = self.exit_test_mode();
        let image = result?;
        exit?;
        Ok(image)
    }

    /// Erase, write every sector, then read back and compare.
    pub fn program(&mut self, image: &NvmImage) -> Result<(), B::Error> {
        info!("stusb4500: programming NVM");
        let result = self.program_inner(image);
        let exit = self.exit_test_mode();
        result?;
        exit?;

        self.verify(image)?;
        info!("stusb4500: NVM programmed and verified");
        Ok(())
    }

    /// Read back and compare against `image`.
    pub fn verify(&mut self, image: &NvmImage) -> Result<(), B::Error> {
        let actual = self.read_all()?;
        for (n, (want, got)) in image.sectors.iter().zip(actual.sectors.iter()).enumerate() {
            if want != got {
                warn!("stusb4500: NVM sector {} verify failed", n);
                return Err(Error::UnexpectedResponse(n as u8));
            }
        }
        Ok(())
    }

    fn read_all_inner(&mut self) -> Result<NvmImage, B::Error> {
        self.enter_read_mode()?;
        let mut image = NvmImage::default();
        for (n, sector) in image.sectors.iter_mut().enumerate() {
            *sector = self.read_sector(n as u8)?;
        }
        Ok(image)
    }

    fn program_inner(&mut self, image: &NvmImage) -> Result<(), B::Error> {
        self.enter_write_mode(ALL_SECTORS)?;
        for (n, sector) in image.sectors.iter().enumerate() {
            self.write_sector(n as u8, sector)?;
        }
        Ok(())
    }

    // ── Controller steps ────────────────────────────────────

    pub fn enter_read_mode(&mut self) -> Result<(), B::Error> {
        self.bus.write_reg(reg::FTP_CUST_PASSWORD_REG, PASSWORD)?;
        // reset the internal controller, then power it
        self.bus.write_reg(reg::FTP_CTRL_0, 0x00)?;
        self.bus.write_reg(reg::FTP_CTRL_0, ctrl0::PWR | ctrl0::RST_N)?;
        Ok(())
    }

    pub fn read_sector(&mut self, sector: u8) -> Result<[u8; SECTOR_SIZE], B::Error> {
        check_sector::<B::Error>(sector)?;

        self.bus.write_reg(reg::FTP_CTRL_0, ctrl0::PWR | ctrl0::RST_N)?;
        self.bus
            .write_reg(reg::FTP_CTRL_1, Opcode::Read as u8 & ctrl1::OPCODE)?;
        self.request(sector)?;

        let mut data = [0u8; SECTOR_SIZE];
        self.bus.read_regs(reg::RW_BUFFER, &mut data)?;
        debug!("stusb4500: NVM sector {}: {:02X?}", sector, data);
        Ok(data)
    }

    /// Unlock, load the erase mask and erase the selected sectors.
    pub fn enter_write_mode(&mut self, sector_mask: u8) -> Result<(), B::Error> {
        if sector_mask & !ALL_SECTORS != 0 {
            return Err(Error::InvalidArgument);
        }

        self.bus.write_reg(reg::FTP_CUST_PASSWORD_REG, PASSWORD)?;
        self.bus.write_reg(reg::RW_BUFFER, 0x00)?;
        self.bus.write_reg(reg::FTP_CTRL_0, 0x00)?;
        self.bus.write_reg(reg::FTP_CTRL_0, ctrl0::PWR | ctrl0::RST_N)?;

        let ser = (sector_mask << 3) & ctrl1::SER;
        self.bus
            .write_reg(reg::FTP_CTRL_1, ser | (Opcode::WriteSer as u8 & ctrl1::OPCODE))?;
        self.request(0)?;

        self.opcode(Opcode::SoftProgSector)?;
        self.request(0)?;

        self.opcode(Opcode::EraseSector)?;
        self.request(0)?;

        debug!("stusb4500: NVM erased (mask 0x{:02X})", sector_mask);
        Ok(())
    }

    /// Program one sector. The sector must have been erased first.
    pub fn write_sector(&mut self, sector: u8, data: &[u8; SECTOR_SIZE]) -> Result<(), B::Error> {
        check_sector::<B::Error>(sector)?;

        self.bus.write_regs(reg::RW_BUFFER, data)?;
        self.bus.write_reg(reg::FTP_CTRL_0, ctrl0::PWR | ctrl0::RST_N)?;

        self.opcode(Opcode::WritePl)?;
        self.request(0)?;

        self.opcode(Opcode::ProgSector)?;
        self.request(sector)?;

        debug!("stusb4500: NVM sector {} written", sector);
        Ok(())
    }

    /// Leave test mode and lock the controller again.
    pub fn exit_test_mode(&mut self) -> Result<(), B::Error> {
        self.bus.write_regs(reg::FTP_CTRL_0, &[ctrl0::RST_N, 0x00])?;
        self.bus.write_reg(reg::FTP_CUST_PASSWORD_REG, 0x00)?;
        Ok(())
    }

    fn opcode(&mut self, op: Opcode) -> Result<(), B::Error> {
        Ok(self
            .bus
            .write_reg(reg::FTP_CTRL_1, op as u8 & ctrl1::OPCODE)?)
    }

    // start the selected opcode and wait until the controller drops REQ
    fn request(&mut self, sector: u8) -> Result<(), B::Error> {
        let start = (sector & ctrl0::SECT) | ctrl0::PWR | ctrl0::RST_N | ctrl0::REQ;
        self.bus.write_reg(reg::FTP_CTRL_0, start)?;

        for _ in 0..REQ_POLL_LIMIT {
            if self.bus.read_reg(reg::FTP_CTRL_0)? & ctrl0::REQ == 0 {
                return Ok(());
            }
            self.delay.delay_us(REQ_POLL_US);
        }
        warn!("stusb4500: NVM request timed out");
        Err(Error::Timeout)
    }
}

fn check_sector<E>(sector: u8) -> Result<(), E> {
    if sector as usize >= SECTOR_COUNT {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}
