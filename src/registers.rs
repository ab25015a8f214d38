//! The KS0127 register map and its power-on defaults.

use core::ops::Range;

/// Number of registers we shadow (0x00 to 0x3F).
///
/// The gamma tables at 0x40 to 0x7F are left at whatever the chip powers
/// up with.
pub(crate) const NUM_REGISTERS: usize = 0x40;

/// The set of named registers in the KS0127
///
/// Only 0x00 to 0x3F are covered. The gamma curve registers (0x40 to 0x7F)
/// can't be written or read through this driver.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    /// Status (read-only)
    Stat = 0x00,
    /// Command A: power, output timing and embedded sync
    CmdA = 0x01,
    /// Command B: input mux
    CmdB = 0x02,
    CmdC = 0x03,
    CmdD = 0x04,
    HAvB = 0x05,
    HAvE = 0x06,
    Hs1B = 0x07,
    Hs1E = 0x08,
    Hs2B = 0x09,
    Hs2E = 0x0a,
    Agc = 0x0b,
    HXtra = 0x0c,
    /// Chroma decimation
    CDem = 0x0d,
    PortAB = 0x0e,
    Luma = 0x0f,
    Con = 0x10,
    Brt = 0x11,
    ChromA = 0x12,
    ChromB = 0x13,
    /// Demodulation; bit 6 reads back as the colour-lock indicator
    Demod = 0x14,
    Sat = 0x15,
    Hue = 0x16,
    VertIA = 0x17,
    VertIB = 0x18,
    VertIC = 0x19,
    HSclL = 0x1a,
    HSclH = 0x1b,
    VSclL = 0x1c,
    VSclH = 0x1d,
    /// Output format A
    OfmtA = 0x1e,
    OfmtB = 0x1f,
    VbiCtl = 0x20,
    CcDat2 = 0x21,
    CcDat1 = 0x22,
    VbiL30 = 0x23,
    VbiL74 = 0x24,
    VbiL118 = 0x25,
    VbiL1512 = 0x26,
    TtFram = 0x27,
    /// Factory test register. Never written.
    TestA = 0x28,
    UvOffH = 0x29,
    UvOffL = 0x2a,
    UGain = 0x2b,
    VGain = 0x2c,
    VAvB = 0x2d,
    VAvE = 0x2e,
    CTrack = 0x2f,
    PolCtl = 0x30,
    RefCod = 0x31,
    InvalY = 0x32,
    InvalU = 0x33,
    InvalV = 0x34,
    UnuseY = 0x35,
    UnuseU = 0x36,
    UnuseV = 0x37,
    UsrSav = 0x38,
    UsrEav = 0x39,
    Shs1A = 0x3a,
    Shs1B = 0x3b,
    Shs1C = 0x3c,
    /// Command E: the low nibble holds the silicon revision
    CmdE = 0x3d,
    VsDel = 0x3e,
    CmdF = 0x3f,
}

/// Power-on-safe value for every shadowed register, indexed by address.
pub(crate) const REGISTER_DEFAULTS: [u8; NUM_REGISTERS] = {
    let mut table = [0u8; NUM_REGISTERS];
    // Command block: powered up, composite 3 selected
    table[Register::CmdA as usize] = 0x2c;
    table[Register::CmdB as usize] = 0x12;
    table[Register::CmdD as usize] = 0x01;
    table[Register::Hs1B as usize] = 0x10;
    table[Register::Agc as usize] = 0x53;
    table[Register::PortAB as usize] = 0x0f;
    table[Register::Luma as usize] = 0x01;
    table[Register::ChromA as usize] = 0x2a;
    table[Register::ChromB as usize] = 0x90;
    table[Register::VertIB as usize] = 0x12;
    table[Register::VertIC as usize] = 0x0b;
    // Output format: YCbCr 4:2:2 with outputs enabled
    table[Register::OfmtA as usize] = 0x30;
    table[Register::VbiCtl as usize] = 0x5d;
    table[Register::VbiL30 as usize] = 0xa8;
    table[Register::VbiL74 as usize] = 0xaa;
    table[Register::VbiL118 as usize] = 0x2a;
    table[Register::VAvB as usize] = 0x07;
    table[Register::PolCtl as usize] = 0x41;
    table[Register::RefCod as usize] = 0x80;
    table[Register::InvalY as usize] = 0x10;
    table[Register::InvalU as usize] = 0x80;
    table[Register::InvalV as usize] = 0x80;
    table[Register::UnuseY as usize] = 0x10;
    table[Register::UnuseU as usize] = 0x80;
    table[Register::UnuseV as usize] = 0x80;
    table[Register::Shs1B as usize] = 0x80;
    table[Register::CmdF as usize] = 0x02;
    table
};

/// Address ranges walked at reset.
///
/// The closed-caption data registers (33, 34), the test register (40) and
/// the user SAV/EAV codes (56, 57) are skipped.
pub(crate) const INIT_RANGES: [Range<u8>; 4] = [1..33, 35..40, 41..56, 58..64];

/// Every shadowed register, in address order.
const ALL_REGISTERS: [Register; NUM_REGISTERS] = [
    Register::Stat,
    Register::CmdA,
    Register::CmdB,
    Register::CmdC,
    Register::CmdD,
    Register::HAvB,
    Register::HAvE,
    Register::Hs1B,
    Register::Hs1E,
    Register::Hs2B,
    Register::Hs2E,
    Register::Agc,
    Register::HXtra,
    Register::CDem,
    Register::PortAB,
    Register::Luma,
    Register::Con,
    Register::Brt,
    Register::ChromA,
    Register::ChromB,
    Register::Demod,
    Register::Sat,
    Register::Hue,
    Register::VertIA,
    Register::VertIB,
    Register::VertIC,
    Register::HSclL,
    Register::HSclH,
    Register::VSclL,
    Register::VSclH,
    Register::OfmtA,
    Register::OfmtB,
    Register::VbiCtl,
    Register::CcDat2,
    Register::CcDat1,
    Register::VbiL30,
    Register::VbiL74,
    Register::VbiL118,
    Register::VbiL1512,
    Register::TtFram,
    Register::TestA,
    Register::UvOffH,
    Register::UvOffL,
    Register::UGain,
    Register::VGain,
    Register::VAvB,
    Register::VAvE,
    Register::CTrack,
    Register::PolCtl,
    Register::RefCod,
    Register::InvalY,
    Register::InvalU,
    Register::InvalV,
    Register::UnuseY,
    Register::UnuseU,
    Register::UnuseV,
    Register::UsrSav,
    Register::UsrEav,
    Register::Shs1A,
    Register::Shs1B,
    Register::Shs1C,
    Register::CmdE,
    Register::VsDel,
    Register::CmdF,
];

impl Register {
    /// Look up the register at a given address, if it is one we shadow.
    pub fn from_address(address: u8) -> Option<Register> {
        ALL_REGISTERS.get(address as usize).copied()
    }

    /// The documented reset value of this register.
    pub const fn default_value(self) -> u8 {
        REGISTER_DEFAULTS[self as usize]
    }
}

impl From<Register> for u8 {
    fn from(reg: Register) -> u8 {
        reg as u8
    }
}
