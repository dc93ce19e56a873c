// Sink power data objects and the request data object (USB PD r2/r3)
//
// Fixed-supply sink PDO:
//   31:30 supply type (00 fixed)   29 dual-role power   28 higher capability
//   27 unconstrained power   26 USB comm   25 dual-role data
//   24:23 fast role swap current   19:10 voltage (50 mV)   9:0 current (10 mA)
//
// RDO:
//   30:28 object position   26 capability mismatch   25 USB comm
//   24 no USB suspend   19:10 operating current (10 mA)   9:0 max current (10 mA)

pub const SAFE_VOLTAGE_MV: u32 = 5000;

pub const MAX_VOLTAGE_MV: u32 = 20_000;
pub const MAX_CURRENT_MA: u32 = 5000;

const VOLTAGE_UNIT_MV: u32 = 50;
const CURRENT_UNIT_MA: u32 = 10;

const FIELD_10: u32 = 0x3FF;
const VOLTAGE_SHIFT: u32 = 10;

const HIGHER_CAPABILITY: u32 = 1 << 28;
const UNCONSTRAINED_POWER: u32 = 1 << 27;
const USB_COMM: u32 = 1 << 26;
const DUAL_ROLE_DATA: u32 = 1 << 25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkPdo(u32);

impl SinkPdo {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Fixed-supply PDO; voltage rounds down to 50 mV, current to 10 mA.
    pub fn fixed(voltage_mv: u32, current_ma: u32) -> Option<Self> {
        if !(SAFE_VOLTAGE_MV..=MAX_VOLTAGE_MV).contains(&voltage_mv) || current_ma > MAX_CURRENT_MA
        {
            return None;
        }
        let v = (voltage_mv / VOLTAGE_UNIT_MV) & FIELD_10;
        let i = (current_ma / CURRENT_UNIT_MA) & FIELD_10;
        Some(Self(v << VOLTAGE_SHIFT | i))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn voltage_mv(self) -> u32 {
        ((self.0 >> VOLTAGE_SHIFT) & FIELD_10) * VOLTAGE_UNIT_MV
    }

    pub const fn current_ma(self) -> u32 {
        (self.0 & FIELD_10) * CURRENT_UNIT_MA
    }

    pub const fn is_fixed(self) -> bool {
        self.0 >> 30 == 0
    }

    pub const fn higher_capability(self) -> bool {
        self.0 & HIGHER_CAPABILITY != 0
    }

    pub const fn unconstrained_power(self) -> bool {
        self.0 & UNCONSTRAINED_POWER != 0
    }

    pub const fn usb_comm(self) -> bool {
        self.0 & USB_COMM != 0
    }

    pub const fn dual_role_data(self) -> bool {
        self.0 & DUAL_ROLE_DATA != 0
    }

    pub fn with_current_ma(self, current_ma: u32) -> Option<Self> {
        if current_ma > MAX_CURRENT_MA {
            return None;
        }
        Some(Self((self.0 & !FIELD_10) | (current_ma / CURRENT_UNIT_MA)))
    }

    pub const fn with_higher_capability(self, on: bool) -> Self {
        if on {
            Self(self.0 | HIGHER_CAPABILITY)
        } else {
            Self(self.0 & !HIGHER_CAPABILITY)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rdo(u32);

impl Rdo {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// 1-based index of the source PDO the contract was made on; 0 if none.
    pub const fn object_position(self) -> u8 {
        ((self.0 >> 28) & 0x07) as u8
    }

    pub const fn capability_mismatch(self) -> bool {
        self.0 & (1 << 26) != 0
    }

    pub const fn operating_current_ma(self) -> u32 {
        ((self.0 >> 10) & FIELD_10) * CURRENT_UNIT_MA
    }

    pub const fn max_current_ma(self) -> u32 {
        (self.0 & FIELD_10) * CURRENT_UNIT_MA
    }

    pub const fn has_contract(self) -> bool {
        self.object_position() != 0
    }
}
