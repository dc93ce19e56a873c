// LSM6DSL 6-axis IMU (accelerometer + gyroscope + temperature)
// I2C at 0x6B (SA0 high) or 0x6A; SPI via SpiRegisters::new(spi, 0x80, 0)
// since the chip auto-increments on its own once IF_INC is set.
//
// Output registers are laid out contiguously from OUT_TEMP_L:
// temp (2) | gyro xyz (6) | accel xyz (6), all little-endian i16.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::bus::RegisterBus;
use crate::error::{Error, Result};

pub const DEFAULT_ADDRESS: u8 = 0x6B;
pub const ALT_ADDRESS: u8 = 0x6A;

pub const WHO_AM_I_VALUE: u8 = 0x6A;

const RESET_POLL_LIMIT: u32 = 50;
const RESET_POLL_US: u32 = 100;

// 256 LSB/°C, zero at 25 °C
const TEMP_LSB_PER_C: i32 = 256;
const TEMP_OFFSET_C: i32 = 25;

#[allow(dead_code)]
mod reg {
    pub const INT1_CTRL: u8 = 0x0D;
    pub const INT2_CTRL: u8 = 0x0E;
    pub const WHO_AM_I: u8 = 0x0F;
    pub const CTRL1_XL: u8 = 0x10;
    pub const CTRL2_G: u8 = 0x11;
    pub const CTRL3_C: u8 = 0x12;
    pub const STATUS_REG: u8 = 0x1E;
    pub const OUT_TEMP_L: u8 = 0x20;
    pub const OUTX_L_G: u8 = 0x22;
    pub const OUTX_L_XL: u8 = 0x28;
}

mod bits {
    pub const SW_RESET: u8 = 0x01;
    pub const IF_INC: u8 = 0x04;
    pub const BDU: u8 = 0x40;
    pub const INT1_DRDY_XL: u8 = 0x01;
    pub const INT1_DRDY_G: u8 = 0x02;
    pub const XLDA: u8 = 0x01;
    pub const GDA: u8 = 0x02;
    pub const TDA: u8 = 0x04;
}

/// Output data rate, shared encoding for CTRL1_XL / CTRL2_G bits 7:4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Odr {
    PowerDown = 0x0,
    Hz12_5 = 0x1,
    Hz26 = 0x2,
    Hz52 = 0x3,
    #[default]
    Hz104 = 0x4,
    Hz208 = 0x5,
    Hz416 = 0x6,
    Hz833 = 0x7,
    Hz1660 = 0x8,
    Hz3330 = 0x9,
    Hz6660 = 0xA,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccelScale {
    #[default]
    G2,
    G4,
    G8,
    G16,
}

impl AccelScale {
    // FS_XL field, note the non-monotonic encoding
    const fn bits(self) -> u8 {
        match self {
            AccelScale::G2 => 0b00,
            AccelScale::G16 => 0b01,
            AccelScale::G4 => 0b10,
            AccelScale::G8 => 0b11,
        }
    }

    /// Sensitivity in micro-g per LSB.
    pub const fn ug_per_lsb(self) -> i32 {
        match self {
            AccelScale::G2 => 61,
            AccelScale::G4 => 122,
            AccelScale::G8 => 244,
            AccelScale::G16 => 488,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GyroScale {
    Dps125,
    #[default]
    Dps250,
    Dps500,
    Dps1000,
    Dps2000,
}

impl GyroScale {
    // FS_G in bits 3:2, FS_125 in bit 1
    const fn bits(self) -> u8 {
        match self {
            GyroScale::Dps125 => 0b0010,
            GyroScale::Dps250 => 0b0000,
            GyroScale::Dps500 => 0b0100,
            GyroScale::Dps1000 => 0b1000,
            GyroScale::Dps2000 => 0b1100,
        }
    }

    /// Sensitivity in micro-dps per LSB.
    pub const fn udps_per_lsb(self) -> i32 {
        match self {
            GyroScale::Dps125 => 4_375,
            GyroScale::Dps250 => 8_750,
            GyroScale::Dps500 => 17_500,
            GyroScale::Dps1000 => 35_000,
            GyroScale::Dps2000 => 70_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub accel_odr: Odr,
    pub accel_scale: AccelScale,
    pub gyro_odr: Odr,
    pub gyro_scale: GyroScale,
    /// Signal accel + gyro data-ready on INT1.
    pub drdy_on_int1: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accel_odr: Odr::Hz104,
            accel_scale: AccelScale::G2,
            gyro_odr: Odr::Hz104,
            gyro_scale: GyroScale::Dps250,
            drdy_on_int1: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Vector {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Vector {
    fn from_le(b: &[u8]) -> Self {
        Self {
            x: i16::from_le_bytes([b[0], b[1]]),
            y: i16::from_le_bytes([b[2], b[3]]),
            z: i16::from_le_bytes([b[4], b[5]]),
        }
    }

    // i64 intermediate: 32767 * 70_000 does not fit in i32
    fn scaled(self, per_lsb: i32) -> [i32; 3] {
        let scale = |v: i16| (v as i64 * per_lsb as i64 / 1000) as i32;
        [scale(self.x), scale(self.y), scale(self.z)]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub accel_ready: bool,
    pub gyro_ready: bool,
    pub temp_ready: bool,
}

/// One coherent sample of every output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    pub temp_raw: i16,
    pub gyro: Vector,
    pub accel: Vector,
}

impl Sample {
    /// Temperature in centi-degrees Celsius.
    pub fn temp_centi_c(&self) -> i32 {
        self.temp_raw as i32 * 100 / TEMP_LSB_PER_C + TEMP_OFFSET_C * 100
    }
}

pub struct Lsm6dsl<B> {
    bus: B,
    config: Config,
}

impl<B: RegisterBus> Lsm6dsl<B> {
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

    pub fn who_am_i(&mut self) -> Result<u8, B::Error> {
        self.read_reg(reg::WHO_AM_I)
    }

    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), B::Error> {
        let id = self.who_am_i()?;
        if id != WHO_AM_I_VALUE {
            return Err(Error::InvalidDevice(id));
        }

        self.reset(delay)?;

        self.bus
            .write_reg(reg::CTRL3_C, bits::BDU | bits::IF_INC)?;
        self.apply_config()?;

        info!(
            "lsm6dsl: ready, accel {:?}/{:?}, gyro {:?}/{:?}",
            self.config.accel_odr,
            self.config.accel_scale,
            self.config.gyro_odr,
            self.config.gyro_scale
        );
        Ok(())
    }

    /// Software reset; SW_RESET self-clears when done (~50 µs).
    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), B::Error> {
        self.bus.write_reg(reg::CTRL3_C, bits::SW_RESET)?;
        for _ in 0..RESET_POLL_LIMIT {
            delay.delay_us(RESET_POLL_US);
            if self.bus.read_reg(reg::CTRL3_C)? & bits::SW_RESET == 0 {
                return Ok(());
            }
        }
        warn!("lsm6dsl: software reset did not complete");
        Err(Error::Timeout)
    }

    pub fn set_config(&mut self, config: Config) -> Result<(), B::Error> {
        self.config = config;
        self.apply_config()
    }

    fn apply_config(&mut self) -> Result<(), B::Error> {
        let c = self.config;
        self.bus
            .write_reg(reg::CTRL1_XL, (c.accel_odr as u8) << 4 | c.accel_scale.bits() << 2)?;
        self.bus
            .write_reg(reg::CTRL2_G, (c.gyro_odr as u8) << 4 | c.gyro_scale.bits())?;
        let int1 = if c.drdy_on_int1 {
            bits::INT1_DRDY_XL | bits::INT1_DRDY_G
        } else {
            0
        };
        self.bus.write_reg(reg::INT1_CTRL, int1)?;
        Ok(())
    }

    pub fn status(&mut self) -> Result<Status, B::Error> {
        let s = self.read_reg(reg::STATUS_REG)?;
        Ok(Status {
            accel_ready: s & bits::XLDA != 0,
            gyro_ready: s & bits::GDA != 0,
            temp_ready: s & bits::TDA != 0,
        })
    }

    pub fn read_accel_raw(&mut self) -> Result<Vector, B::Error> {
        let mut buf = [0u8; 6];
        self.bus.read_regs(reg::OUTX_L_XL, &mut buf)?;
        Ok(Vector::from_le(&buf))
    }

    pub fn read_gyro_raw(&mut self) -> Result<Vector, B::Error> {
        let mut buf = [0u8; 6];
        self.bus.read_regs(reg::OUTX_L_G, &mut buf)?;
        Ok(Vector::from_le(&buf))
    }

    /// Acceleration in milli-g.
    pub fn read_accel_mg(&mut self) -> Result<[i32; 3], B::Error> {
        let per_lsb = self.config.accel_scale.ug_per_lsb();
        Ok(self.read_accel_raw()?.scaled(per_lsb))
    }

    /// Angular rate in milli-dps.
    pub fn read_gyro_mdps(&mut self) -> Result<[i32; 3], B::Error> {
        let per_lsb = self.config.gyro_scale.udps_per_lsb();
        Ok(self.read_gyro_raw()?.scaled(per_lsb))
    }

    /// Die temperature in centi-degrees Celsius.
    pub fn read_temperature(&mut self) -> Result<i32, B::Error> {
        let mut buf = [0u8; 2];
        self.bus.read_regs(reg::OUT_TEMP_L, &mut buf)?;
        let sample = Sample {
            temp_raw: i16::from_le_bytes(buf),
            ..Sample::default()
        };
        Ok(sample.temp_centi_c())
    }

    /// Temperature, gyro and accel in one 14-byte burst.
    pub fn read_all(&mut self) -> Result<Sample, B::Error> {
        let mut buf = [0u8; 14];
        self.bus.read_regs(reg::OUT_TEMP_L, &mut buf)?;
        Ok(Sample {
            temp_raw: i16::from_le_bytes([buf[0], buf[1]]),
            gyro: Vector::from_le(&buf[2..8]),
            accel: Vector::from_le(&buf[8..14]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::I2cRegisters;
    use crate::mock::{MockDelay, MockI2c, Registers};

    fn device() -> MockI2c {
        let mut i2c = MockI2c::new(DEFAULT_ADDRESS);
        i2c.set_reg(reg::WHO_AM_I, WHO_AM_I_VALUE);
        // reset completes immediately
        i2c.on_write(Box::new(|regs: &mut Registers, r: u8| {
            if r == reg::CTRL3_C {
                regs[reg::CTRL3_C as usize] &= !bits::SW_RESET;
            }
        }));
        i2c
    }

    #[test]
    fn init_programs_control_registers() {
        let mut imu = Lsm6dsl::new(I2cRegisters::new(device(), DEFAULT_ADDRESS), Config::default());
        imu.init(&mut MockDelay::new()).unwrap();

        let i2c = imu.release().release();
        assert_eq!(i2c.writes_to(reg::CTRL3_C), vec![0x01, 0x44]);
        assert_eq!(i2c.reg(reg::CTRL1_XL), 0x40);
        assert_eq!(i2c.reg(reg::CTRL2_G), 0x40);
        assert_eq!(i2c.reg(reg::INT1_CTRL), 0x03);
    }

    #[test]
    fn scale_encodings() {
        let config = Config {
            accel_scale: AccelScale::G16,
            gyro_scale: GyroScale::Dps125,
            accel_odr: Odr::Hz416,
            gyro_odr: Odr::Hz52,
            drdy_on_int1: false,
        };
        let mut imu = Lsm6dsl::new(I2cRegisters::new(device(), DEFAULT_ADDRESS), config);
        imu.init(&mut MockDelay::new()).unwrap();

        let i2c = imu.release().release();
        assert_eq!(i2c.reg(reg::CTRL1_XL), 0x64);
        assert_eq!(i2c.reg(reg::CTRL2_G), 0x32);
        assert_eq!(i2c.reg(reg::INT1_CTRL), 0x00);
    }

    #[test]
    fn stuck_reset_times_out() {
        let mut i2c = MockI2c::new(DEFAULT_ADDRESS);
        i2c.set_reg(reg::WHO_AM_I, WHO_AM_I_VALUE);
        let delay = MockDelay::new();
        let mut imu = Lsm6dsl::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());

        assert_eq!(imu.init(&mut delay.clone()), Err(Error::Timeout));
        assert_eq!(delay.elapsed_ms(), 5);
    }

    #[test]
    fn burst_read_splits_outputs() {
        let mut i2c = device();
        i2c.set_regs(
            reg::OUT_TEMP_L,
            &[
                0x00, 0x02, // temp = 512 -> 27.00 C
                0x10, 0x00, 0x20, 0x00, 0x30, 0x00, // gyro
                0x00, 0x40, 0x00, 0xC0, 0x01, 0x00, // accel
            ],
        );
        let mut imu = Lsm6dsl::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());

        let s = imu.read_all().unwrap();
        assert_eq!(s.temp_centi_c(), 2700);
        assert_eq!(s.gyro, Vector { x: 16, y: 32, z: 48 });
        assert_eq!(s.accel, Vector { x: 16384, y: -16384, z: 1 });
        assert_eq!(imu.read_temperature().unwrap(), 2700);
    }

    #[test]
    fn scaled_outputs() {
        let mut i2c = device();
        i2c.set_regs(reg::OUTX_L_XL, &[0x00, 0x40, 0, 0, 0, 0]);
        i2c.set_regs(reg::OUTX_L_G, &[0xE8, 0x03, 0, 0, 0, 0]);
        let mut imu = Lsm6dsl::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());

        // 16384 * 0.061 mg = 999 mg
        assert_eq!(imu.read_accel_mg().unwrap()[0], 999);
        // 1000 * 8.75 mdps
        assert_eq!(imu.read_gyro_mdps().unwrap()[0], 8750);
    }

    #[test]
    fn full_scale_outputs_do_not_overflow() {
        // x = +32767, y = -32768, z = 0
        let extremes = [0xFF, 0x7F, 0x00, 0x80, 0x00, 0x00];

        for gyro_scale in [
            GyroScale::Dps125,
            GyroScale::Dps250,
            GyroScale::Dps500,
            GyroScale::Dps1000,
            GyroScale::Dps2000,
        ] {
            let mut i2c = device();
            i2c.set_regs(reg::OUTX_L_G, &extremes);
            let config = Config {
                gyro_scale,
                ..Config::default()
            };
            let mut imu = Lsm6dsl::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), config);

            let per_lsb = gyro_scale.udps_per_lsb() as i64;
            let mdps = imu.read_gyro_mdps().unwrap();
            assert_eq!(mdps[0] as i64, 32767 * per_lsb / 1000);
            assert_eq!(mdps[1] as i64, -32768 * per_lsb / 1000);
            assert_eq!(mdps[2], 0);
        }
        // 2000 dps range tops out at about 2293 dps
        assert_eq!(Vector { x: i16::MAX, y: i16::MIN, z: 0 }.scaled(70_000)[0], 2_293_690);

        for accel_scale in [AccelScale::G2, AccelScale::G4, AccelScale::G8, AccelScale::G16] {
            let mut i2c = device();
            i2c.set_regs(reg::OUTX_L_XL, &extremes);
            let config = Config {
                accel_scale,
                ..Config::default()
            };
            let mut imu = Lsm6dsl::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), config);

            let per_lsb = accel_scale.ug_per_lsb();
            let mg = imu.read_accel_mg().unwrap();
            assert_eq!(mg[0], 32767 * per_lsb / 1000);
            assert_eq!(mg[1], -32768 * per_lsb / 1000);
        }
    }

    #[test]
    fn status_flags() {
        let mut i2c = device();
        i2c.set_reg(reg::STATUS_REG, 0x05);
        let mut imu = Lsm6dsl::new(I2cRegisters::new(i2c, DEFAULT_ADDRESS), Config::default());
        assert_eq!(
            imu.status().unwrap(),
            Status {
                accel_ready: true,
                gyro_ready: false,
                temp_ready: true
            }
        );
    }
}
