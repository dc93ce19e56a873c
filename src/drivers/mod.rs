// Click board drivers. One chip per module, no board knowledge.
//
// Each module follows the same shape: a `Config` whose Default matches
// the Click's power-up wiring, a constructor that takes ownership of the
// bus, `init()` for the power-up register sequence, and raw register
// access next to the typed getters.

pub mod adxl345;
pub mod lsm6dsl;
pub mod mbusrf5;
pub mod mcp3204;
pub mod stusb4500;
