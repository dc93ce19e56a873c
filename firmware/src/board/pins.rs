//! GPIO |     Function     |      Notes
//! -----+------------------+----------------------------------
//!  0   | UART1 TX         | mikroBUS 1 RX (M-BUS RF 5)
//!  1   | UART1 RX         | mikroBUS 1 TX (M-BUS RF 5)
//!  2   | SPI2 MISO        | ADC Click SDO
//!  3   | RF RST           | M-BUS RF 5 reset, active low
//!  4   | I2C0 SDA         | Shared: IMU, accel, USB-C Sink
//!  5   | I2C0 SCL         | 4.7K pullups on the Click boards
//!  6   | SPI2 SCK         |
//!  7   | SPI2 MOSI        | ADC Click SDI
//!  8   | PD ALERT         | USB-C Sink ALERT, open drain, active low
//!  9   | IMU INT1         | LSM6DSL data ready, push-pull high
//! 10   | ADC CS           | ADC Click chip select
//! 20   | UART0 RX         | Console
//! 21   | UART0 TX         | Console

pub const I2C_FREQ_KHZ: u32 = 400;

// MCP3204 tops out at 1 MHz on 2.7 V
pub const SPI_FREQ_MHZ: u32 = 1;
