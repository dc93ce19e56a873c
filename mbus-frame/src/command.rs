//! Command codes of the module's serial command interface.
//!
//! Every request `CMD` is answered by a confirmation `CMD | 0x40`.
//! Received radio telegrams arrive unsolicited as [`Command::DataInd`].

use core::fmt;

/// Bit set in a request code to form its confirmation code.
pub const CONFIRMATION_FLAG: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Transmit a telegram over the radio.
    Data = 0x00,
    /// Telegram received over the radio (module to host only).
    DataInd = 0x03,
    /// Switch the wireless M-Bus mode (volatile).
    SetMode = 0x04,
    /// Software reset of the module.
    Reset = 0x05,
    /// Write to the non-volatile parameter memory.
    Set = 0x09,
    /// Read from the non-volatile parameter memory.
    Get = 0x0A,
    SerialNo = 0x0B,
    FirmwareVersion = 0x0C,
    Rssi = 0x0D,
    SetUartSpeed = 0x10,
    FactoryReset = 0x11,
    DataRetry = 0x12,
}

impl Command {
    pub const fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Command::Data,
            0x03 => Command::DataInd,
            0x04 => Command::SetMode,
            0x05 => Command::Reset,
            0x09 => Command::Set,
            0x0A => Command::Get,
            0x0B => Command::SerialNo,
            0x0C => Command::FirmwareVersion,
            0x0D => Command::Rssi,
            0x10 => Command::SetUartSpeed,
            0x11 => Command::FactoryReset,
            0x12 => Command::DataRetry,
            _ => return None,
        })
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Code of the frame the module answers this request with.
    #[inline]
    pub const fn confirmation(self) -> u8 {
        self as u8 | CONFIRMATION_FLAG
    }

    /// Confirmation codes carry a single status byte, except for the
    /// queries that return data.
    pub const fn returns_status(self) -> bool {
        !matches!(
            self,
            Command::Get | Command::SerialNo | Command::FirmwareVersion | Command::Rssi
        )
    }
}

/// True if `code` is a confirmation (as opposed to a request or indication).
#[inline]
pub const fn is_confirmation(code: u8) -> bool {
    code & CONFIRMATION_FLAG != 0 && code & 0x80 == 0
}

/// Request code a confirmation answers, if `code` is a confirmation.
#[inline]
pub const fn request_of(code: u8) -> Option<u8> {
    if is_confirmation(code) {
        Some(code & !CONFIRMATION_FLAG)
    } else {
        None
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Data => "DATA",
            Command::DataInd => "DATA_IND",
            Command::SetMode => "SET_MODE",
            Command::Reset => "RESET",
            Command::Set => "SET",
            Command::Get => "GET",
            Command::SerialNo => "SERIALNO",
            Command::FirmwareVersion => "FWV",
            Command::Rssi => "RSSI",
            Command::SetUartSpeed => "SETUARTSPEED",
            Command::FactoryReset => "FACTORYRESET",
            Command::DataRetry => "DATARETRY",
        };
        write!(f, "{}(0x{:02X})", name, self.code())
    }
}
