// Register access over I2C or SPI
//
// Most Click chips expose a flat 8-bit register map. Drivers talk to a
// `RegisterBus` and never see which bus is underneath; the two adapters
// here do the per-bus framing (I2C: address + repeated start, SPI:
// read/auto-increment flag bits in the register byte).

use embedded_hal::i2c::{self, I2c};
use embedded_hal::spi::{self, SpiDevice};

pub trait RegisterBus {
    type Error: core::fmt::Debug;

    /// Write `data` starting at `reg` (chip auto-increments).
    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Read `buf.len()` bytes starting at `reg`.
    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
        self.write_regs(reg, &[value])
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, Self::Error> {
        let mut b = [0u8; 1];
        self.read_regs(reg, &mut b)?;
        Ok(b[0])
    }

    /// Read-modify-write: bits in `mask` take their value from `value`.
    fn modify_reg(&mut self, reg: u8, mask: u8, value: u8) -> Result<(), Self::Error> {
        let old = self.read_reg(reg)?;
        let new = (old & !mask) | (value & mask);
        if new != old {
            self.write_reg(reg, new)?;
        }
        Ok(())
    }
}

// ── I2C ─────────────────────────────────────────────────────

pub struct I2cRegisters<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> I2cRegisters<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterBus for I2cRegisters<I2C> {
    type Error = I2C::Error;

    // adjacent writes in one transaction go out without a repeated start
    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.i2c.transaction(
            self.address,
            &mut [i2c::Operation::Write(&[reg]), i2c::Operation::Write(data)],
        )
    }

    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(self.address, &[reg], buf)
    }
}

// ── SPI ─────────────────────────────────────────────────────

pub struct SpiRegisters<SPI> {
    spi: SPI,
    read_flag: u8,
    multi_flag: u8,
}

impl<SPI: SpiDevice> SpiRegisters<SPI> {
    /// `read_flag` is OR-ed into the register byte on reads (usually 0x80).
    /// `multi_flag` is added for reads longer than one byte; chips that
    /// auto-increment on their own pass 0.
    pub fn new(spi: SPI, read_flag: u8, multi_flag: u8) -> Self {
        Self {
            spi,
            read_flag,
            multi_flag,
        }
    }

    fn reg_byte(&self, reg: u8, len: usize, read: bool) -> u8 {
        let mut b = reg & !(self.read_flag | self.multi_flag);
        if read {
            b |= self.read_flag;
        }
        if len > 1 {
            b |= self.multi_flag;
        }
        b
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> RegisterBus for SpiRegisters<SPI> {
    type Error = SPI::Error;

    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<(), Self::Error> {
        let cmd = self.reg_byte(reg, data.len(), false);
        self.spi
            .transaction(&mut [spi::Operation::Write(&[cmd]), spi::Operation::Write(data)])
    }

    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        let cmd = self.reg_byte(reg, buf.len(), true);
        self.spi
            .transaction(&mut [spi::Operation::Write(&[cmd]), spi::Operation::Read(buf)])
    }
}
