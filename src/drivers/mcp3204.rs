// MCP3204 4-channel 12-bit SAR ADC (ADC Click)
// SPI mode 0 or 3, max 2 MHz at 5 V. One conversion per 3-byte transfer:
//
//   tx: 0000 01 S D2 | D1 D0 xx xxxx | xxxx xxxx
//   rx: ---- ---- | ---0 B11..B8     | B7..B0
//
// S = single-ended (1) / differential (0). D2 is don't-care on the
// 4-channel part. The Click's reference jumper selects 4.096 V or 3.3 V.

use embedded_hal::spi::SpiDevice;
use log::debug;

use crate::error::{Error, Result};

pub const CHANNELS: u8 = 4;
pub const RESOLUTION_BITS: u8 = 12;
const FULL_SCALE: u32 = 1 << RESOLUTION_BITS;

const START: u8 = 0x04;
const SINGLE: u8 = 0x02;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Reference voltage in millivolts.
    pub vref_mv: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self { vref_mv: 4096 }
    }
}

/// Differential pair as "positive input - negative input".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pair {
    Ch0MinusCh1 = 0,
    Ch1MinusCh0 = 1,
    Ch2MinusCh3 = 2,
    Ch3MinusCh2 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    Single(u8),
    Differential(Pair),
}

impl Input {
    fn command(self) -> Option<[u8; 3]> {
        let (mode, sel) = match self {
            Input::Single(ch) if ch < CHANNELS => (SINGLE, ch),
            Input::Single(_) => return None,
            Input::Differential(pair) => (0, pair as u8),
        };
        Some([START | mode | (sel >> 2), (sel & 0x03) << 6, 0x00])
    }
}

pub struct Mcp3204<SPI> {
    spi: SPI,
    config: Config,
}

impl<SPI: SpiDevice> Mcp3204<SPI> {
    pub fn new(spi: SPI, config: Config) -> Self {
        Self { spi, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    pub fn read_raw(&mut self, input: Input) -> Result<u16, SPI::Error> {
        let tx = input.command().ok_or(Error::InvalidArgument)?;
        let mut rx = [0u8; 3];
        self.spi.transfer(&mut rx, &tx)?;
        let raw = ((rx[1] as u16 & 0x0F) << 8) | rx[2] as u16;
        debug!("mcp3204: {:?} -> {}", input, raw);
        Ok(raw)
    }

    pub fn raw_to_mv(&self, raw: u16) -> u16 {
        (raw as u32 * self.config.vref_mv as u32 / FULL_SCALE) as u16
    }

    pub fn read_mv(&mut self, input: Input) -> Result<u16, SPI::Error> {
        let raw = self.read_raw(input)?;
        Ok(self.raw_to_mv(raw))
    }

    /// Single-ended conversion of every channel, in channel order.
    pub fn read_all_single(&mut self) -> Result<[u16; CHANNELS as usize], SPI::Error> {
        let mut out = [0u16; CHANNELS as usize];
        for (ch, slot) in out.iter_mut().enumerate() {
            *slot = self.read_raw(Input::Single(ch as u8))?;
        }
        Ok(out)
    }
}
