//! ESP32-C3 carrier with three mikroBUS sockets.
//!
//! Maps the Click boards to peripherals so the demo doesn't need to know
//! GPIO numbers. See [`pins`] for the wiring.
//!
//! The I2C bus is shared by three Clicks; it is handed out as a bare
//! bus and split per device with `embedded-hal-bus` at the call site.

pub mod pins;
pub mod serial;

pub use serial::{MikroUart, UartError};

use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::{
    Blocking,
    delay::Delay,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    i2c,
    peripherals::Peripherals,
    spi,
    time::Rate,
    uart,
};

use click_drivers::drivers::mbusrf5;

// Type Aliases
pub type I2cBus = i2c::master::I2c<'static, Blocking>;
pub type SpiBus = spi::master::Spi<'static, Blocking>;
pub type AdcSpi = ExclusiveDevice<SpiBus, Output<'static>, Delay>;

/// M-BUS RF 5 socket: UART plus reset line.
pub struct RadioHw {
    pub uart: MikroUart,
    pub rst: Output<'static>,
}

/// Interrupt outputs of the Clicks, read as levels.
pub struct IrqHw {
    pub imu_int1: Input<'static>,
    pub pd_alert: Input<'static>,
}

/// Complete board hardware, ready for driver initialization.
pub struct Board {
    pub i2c: I2cBus,
    pub adc: AdcSpi,
    pub radio: RadioHw,
    pub irq: IrqHw,
}

impl Board {
    pub fn init(p: Peripherals) -> Self {
        let i2c_cfg =
            i2c::master::Config::default().with_frequency(Rate::from_khz(pins::I2C_FREQ_KHZ));
        let i2c = i2c::master::I2c::new(p.I2C0, i2c_cfg)
            .unwrap()
            .with_sda(p.GPIO4)
            .with_scl(p.GPIO5);

        // MCP3204: mode 0, CS idles high
        let cs = Output::new(p.GPIO10, Level::High, OutputConfig::default());
        let spi_cfg = spi::master::Config::default()
            .with_frequency(Rate::from_mhz(pins::SPI_FREQ_MHZ))
            .with_mode(spi::Mode::_0);
        let spi_bus = spi::master::Spi::new(p.SPI2, spi_cfg)
            .unwrap()
            .with_sck(p.GPIO6)
            .with_mosi(p.GPIO7)
            .with_miso(p.GPIO2);
        let adc = ExclusiveDevice::new(spi_bus, cs, Delay::new()).unwrap();

        let uart_cfg = uart::Config::default().with_baudrate(mbusrf5::BAUD_RATE);
        let uart = uart::Uart::new(p.UART1, uart_cfg)
            .unwrap()
            .with_tx(p.GPIO0)
            .with_rx(p.GPIO1);
        // hold the module out of reset until the driver pulses it
        let rst = Output::new(p.GPIO3, Level::High, OutputConfig::default());

        let irq = IrqHw {
            imu_int1: Input::new(p.GPIO9, InputConfig::default().with_pull(Pull::Down)),
            pd_alert: Input::new(p.GPIO8, InputConfig::default().with_pull(Pull::Up)),
        };

        Board {
            i2c,
            adc,
            radio: RadioHw {
                uart: MikroUart::new(uart),
                rst,
            },
            irq,
        }
    }
}
