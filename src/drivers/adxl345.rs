// ADXL345 3-axis accelerometer (Accel Click)
// I2C at 0x1D (ALT high, Click default) or 0x53; also works over SPI
// mode 3 with SpiRegisters::new(spi, 0x80, 0x40).
//
// Output is 13-bit in full-resolution mode (fixed 3.9 mg/LSB at every
// range), 10-bit otherwise (LSB doubles with each range step).

use log::{debug, info};

use crate::bus::RegisterBus;
use crate::error::{Error, Result};

pub const DEFAULT_ADDRESS: u8 = 0x1D;
pub const ALT_ADDRESS: u8 = 0x53;

pub const DEVICE_ID: u8 = 0xE5;

// micro-g per LSB at ±2 g / full resolution
const SCALE_UG_PER_LSB: i32 = 3900;

#[allow(dead_code)]
mod reg {
    pub const DEVID: u8 = 0x00;
    pub const THRESH_TAP: u8 = 0x1D;
    pub const OFSX: u8 = 0x1E;
    pub const DUR: u8 = 0x21;
    pub const BW_RATE: u8 = 0x2C;
    pub const POWER_CTL: u8 = 0x2D;
    pub const INT_ENABLE: u8 = 0x2E;
    pub const INT_MAP: u8 = 0x2F;
    pub const INT_SOURCE: u8 = 0x30;
    pub const DATA_FORMAT: u8 = 0x31;
    pub const DATAX0: u8 = 0x32;
    pub const FIFO_CTL: u8 = 0x38;
}

mod bits {
    pub const MEASURE: u8 = 0x08;
    pub const FULL_RES: u8 = 0x08;
    pub const RANGE_MASK: u8 = 0x03;
    pub const RATE_MASK: u8 = 0x0F;
    pub const DATA_READY: u8 = 0x80;
    pub const SINGLE_TAP: u8 = 0x40;
    pub const DOUBLE_TAP: u8 = 0x20;
    pub const ACTIVITY: u8 = 0x10;
    pub const INACTIVITY: u8 = 0x08;
    pub const FREE_FALL: u8 = 0x04;
    pub const WATERMARK: u8 = 0x02;
    pub const OVERRUN: u8 = 0x01;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Range {
    #[default]
    G2 = 0,
    G4 = 1,
    G8 = 2,
    G16 = 3,
}

/// Output data rate (BW_RATE low nibble).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataRate {
    Hz12_5 = 0x07,
    Hz25 = 0x08,
    Hz50 = 0x09,
    #[default]
    Hz100 = 0x0A,
    Hz200 = 0x0B,
    Hz400 = 0x0C,
    Hz800 = 0x0D,
    Hz1600 = 0x0E,
    Hz3200 = 0x0F,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub range: Range,
    pub rate: DataRate,
    pub full_resolution: bool,
    /// Route DATA_READY to INT1 (the Click's INT pin).
    pub data_ready_int: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            range: Range::G2,
            rate: DataRate::Hz100,
            full_resolution: true,
            data_ready_int: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Axes {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Acceleration in milli-g.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxesMg {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Decoded INT_SOURCE register. Reading it clears latched events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterruptSource {
    pub data_ready: bool,
    pub single_tap: bool,
    pub double_tap: bool,
    pub activity: bool,
    pub inactivity: bool,
    pub free_fall: bool,
    pub watermark: bool,
    pub overrun: bool,
}

impl From<u8> for InterruptSource {
    fn from(v: u8) -> Self {
        Self {
            data_ready: v & bits::DATA_READY != 0,
            single_tap: v & bits::SINGLE_TAP != 0,
            double_tap: v & bits::DOUBLE_TAP != 0,
            activity: v & bits::ACTIVITY != 0,
            inactivity: v & bits::INACTIVITY != 0,
            free_fall: v & bits::FREE_FALL != 0,
            watermark: v & bits::WATERMARK != 0,
            overrun: v & bits::OVERRUN != 0,
        }
    }
}

pub struct Adxl345<B> {
    bus: B,
    config: Config,
}

impl<B: RegisterBus> Adxl345<B> {
    pub fn new(bus: B, config: Config) -> Self {
        Self { bus, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
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
        self.read_reg(reg::DEVID)
    }

    /// Verify identity, apply the config and start measuring.
    pub fn init(&mut self) -> Result<(), B::Error> {
        let id = self.device_id()?;
        if id != DEVICE_ID {
            return Err(Error::InvalidDevice(id));
        }

        // configure in standby, then switch to measure
        self.bus.write_reg(reg::POWER_CTL, 0x00)?;
        self.bus.write_reg(reg::BW_RATE, self.config.rate as u8)?;
        self.bus.write_reg(reg::DATA_FORMAT, self.data_format())?;
        self.bus.write_reg(reg::INT_MAP, 0x00)?;
        let int_enable = if self.config.data_ready_int {
            bits::DATA_READY
        } else {
            0
        };
        self.bus.write_reg(reg::INT_ENABLE, int_enable)?;
        self.bus.write_reg(reg::FIFO_CTL, 0x00)?;
        self.measure()?;

        info!(
            "adxl345: ready, range {:?}, rate {:?}, full_res {}",
            self.config.range, self.config.rate, self.config.full_resolution
        );
        Ok(())
    }

    pub fn measure(&mut self) -> Result<(), B::Error> {
        self.write_reg(reg::POWER_CTL, bits::MEASURE)
    }

    pub fn standby(&mut self) -> Result<(), B::Error> {
        self.write_reg(reg::POWER_CTL, 0x00)
    }

    pub fn set_range(&mut self, range: Range) -> Result<(), B::Error> {
        self.config.range = range;
        let df = self.data_format();
        Ok(self.bus.modify_reg(
            reg::DATA_FORMAT,
            bits::RANGE_MASK | bits::FULL_RES,
            df,
        )?)
    }

    pub fn set_rate(&mut self, rate: DataRate) -> Result<(), B::Error> {
        self.config.rate = rate;
        Ok(self
            .bus
            .modify_reg(reg::BW_RATE, bits::RATE_MASK, rate as u8)?)
    }

    pub fn interrupt_source(&mut self) -> Result<InterruptSource, B::Error> {
        Ok(self.read_reg(reg::INT_SOURCE)?.into())
    }

    pub fn data_ready(&mut self) -> Result<bool, B::Error> {
        Ok(self.read_reg(reg::INT_SOURCE)? & bits::DATA_READY != 0)
    }

    /// One 6-byte burst so all three axes come from the same sample.
    pub fn read_raw(&mut self) -> Result<Axes, B::Error> {
        let mut buf = [0u8; 6];
        self.bus.read_regs(reg::DATAX0, &mut buf)?;
        let axes = Axes {
            x: i16::from_le_bytes([buf[0], buf[1]]),
            y: i16::from_le_bytes([buf[2], buf[3]]),
            z: i16::from_le_bytes([buf[4], buf[5]]),
        };
        debug!("adxl345: raw {:?}", axes);
        Ok(axes)
    }

    pub fn read_mg(&mut self) -> Result<AxesMg, B::Error> {
        let raw = self.read_raw()?;
        let ug = self.ug_per_lsb();
        Ok(AxesMg {
            x: raw.x as i32 * ug / 1000,
            y: raw.y as i32 * ug / 1000,
            z: raw.z as i32 * ug / 1000,
        })
    }

    fn data_format(&self) -> u8 {
        let mut v = self.config.range as u8;
        if self.config.full_resolution {
            v |= bits::FULL_RES;
        }
        v
    }

    fn ug_per_lsb(&self) -> i32 {
        if self.config.full_resolution {
            SCALE_UG_PER_LSB
        } else {
            SCALE_UG_PER_LSB << (self.config.range as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::I2cRegisters;
    use crate::mock::MockI2c;

    fn device() -> MockI2c {
        let mut i2c = MockI2c::new(DEFAULT_ADDRESS);
        i2c.set_reg(reg::DEVID, DEVICE_ID);
        i2c
    }

    #[test]
    fn init_writes_power_up_sequence() {
        let bus = I2cRegisters::new(device(), DEFAULT_ADDRESS);
        let mut accel = Adxl345::new(bus, Config::default());
        accel.init().unwrap();

        let i2c = accel.release().release();
        assert_eq!(i2c.reg(reg::BW_RATE), 0x0A);
        assert_eq!(i2c.reg(reg::DATA_FORMAT), 0x08);
        assert_eq!(i2c.reg(reg::INT_ENABLE), 0x80);
        assert_eq!(i2c.writes_to(reg::POWER_CTL), vec![0x00, 0x08]);
    }

    #[test]
    fn init_rejects_wrong_chip() {
        let mut i2c = device();
        i2c.set_reg(reg::DEVID, 0x00);
        let mut accel = Adxl345::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());
        assert_eq!(accel.init(), Err(Error::InvalidDevice(0x00)));
    }

    #[test]
    fn reads_axes_little_endian() {
        let mut i2c = device();
        // x = 256, y = -1, z = 100
        i2c.set_regs(reg::DATAX0, &[0x00, 0x01, 0xFF, 0xFF, 0x64, 0x00]);
        let mut accel = Adxl345::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());

        assert_eq!(accel.read_raw().unwrap(), Axes { x: 256, y: -1, z: 100 });
        // 256 * 3.9 mg = 998 mg
        let mg = accel.read_mg().unwrap();
        assert_eq!(mg.x, 998);
        assert_eq!(mg.z, 390);
    }

    #[test]
    fn fixed_resolution_scale_follows_range() {
        let mut i2c = device();
        i2c.set_regs(reg::DATAX0, &[0x64, 0x00, 0, 0, 0, 0]);
        let config = Config {
            range: Range::G8,
            full_resolution: false,
            ..Config::default()
        };
        let mut accel = Adxl345::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), config);
        // 100 * 15.6 mg
        assert_eq!(accel.read_mg().unwrap().x, 1560);
    }

    #[test]
    fn set_range_keeps_other_format_bits() {
        let mut i2c = device();
        i2c.set_reg(reg::DATA_FORMAT, 0x20); // INT_INVERT
        let mut accel = Adxl345::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());
        accel.set_range(Range::G16).unwrap();
        assert_eq!(accel.release().release().reg(reg::DATA_FORMAT), 0x2B);
    }

    #[test]
    fn interrupt_source_decodes_bits() {
        let mut i2c = device();
        i2c.set_reg(reg::INT_SOURCE, 0x83);
        let mut accel = Adxl345::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());
        let src = accel.interrupt_source().unwrap();
        assert!(src.data_ready && src.watermark && src.overrun);
        assert!(!src.single_tap);
        assert!(accel.data_ready().unwrap());
    }

    #[test]
    fn bus_failure_is_propagated() {
        let mut i2c = device();
        i2c.fail_transaction(0);
        let mut accel = Adxl345::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());
        assert!(matches!(accel.read_raw(), Err(Error::Bus(_))));
    }
}
