//! # KS0127 Driver
//!
//! This is driver for the Samsung KS0127 multi-standard video decoder, as
//! found on the Matrox Marvel G200/G400 and Rainbow Runner-G capture cards.
//! The KS0127B revision and the reduced-feature KS0122S are also handled.
//!
//! Specifically, this driver is for setting the registers in the KS0127
//! over I²C - this driver does not handle the digital video port or any of
//! the pixel data it produces.
//!
//! The KS0127 can decode from the following inputs:
//!
//! * Six analog Composite inputs
//! * Three analog S-Video (Y/C) inputs
//! * One digital YUV 4:2:2 input with embedded sync (ITU-R BT.656)
//!
//! The [`Decoder`] object must cache the register contents because the
//! KS0127 only reads back a handful of registers reliably. Every update is
//! a read-modify-write against that cache. If an I²C write fails, the cache
//! still holds the value we *meant* to write and the register is flagged as
//! unconfirmed until [`Decoder::sync`] gets it onto the chip.
//!
//! # Example
//!
//! You might setup the Decoder like this:
//!
//! ```rust
//! # use embedded_hal::blocking::i2c::{SevenBitAddress, Write, WriteRead};
//! # use embedded_hal::blocking::delay::DelayMs;
//! # struct I2c;
//! # impl Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # impl WriteRead for I2c {
//! #     type Error = ();
//! #     fn write_read(&mut self, address: SevenBitAddress, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
//! #         buffer[0] = 0xa1;
//! #         Ok(())
//! #     }
//! # }
//! # struct Delay;
//! # impl DelayMs<u8> for Delay {
//! #     fn delay_ms(&mut self, _ms: u8) {}
//! # }
//! # let mut i2c = I2c;
//! # let mut delay = Delay;
//! let mut decoder = ks0127::Decoder::attach(ks0127::BusAddress::OnBoard, &mut i2c, &mut delay);
//! decoder
//!     .select_standard(&mut i2c, &mut delay, ks0127::Standard::Pal)
//!     .unwrap();
//! decoder
//!     .select_route(&mut i2c, ks0127::Input::SVideo1.into())
//!     .unwrap();
//! decoder.set_streaming(&mut i2c, true);
//! let (status, _guess) = decoder.query_status(&mut i2c);
//! if status.contains(ks0127::InputStatus::NO_SIGNAL) {
//!     // Nothing plugged in
//! }
//! if decoder.sync(&mut i2c).is_err() {
//!     // Decoder didn't respond
//! }
//! ```

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

use embedded_hal::blocking::{delay::DelayMs, i2c};

mod fmt;
mod registers;
#[cfg(test)]
mod test_support;

use fmt::{debug, warning};
use registers::{INIT_RANGES, NUM_REGISTERS, REGISTER_DEFAULTS};

pub use registers::Register;

//
// Public Types
//

/// The KS0127 has one of two I²C addresses, depending on where it sits on
/// the capture card.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusAddress {
    /// The address of the chip on an add-on module (0xD8 in 8-bit form)
    AddOn = 0x6C,
    /// The address of the chip soldered onto the card (0xDA in 8-bit form)
    OnBoard = 0x6D,
}

/// The video inputs the KS0127 can decode.
///
/// The discriminant is the code the input mux in CMDB expects.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Input {
    Composite1 = 0,
    Composite2 = 1,
    Composite3 = 2,
    Composite4 = 4,
    Composite5 = 5,
    Composite6 = 6,
    SVideo1 = 8,
    SVideo2 = 9,
    SVideo3 = 10,
    /// Digital YUV 4:2:2 with embedded sync
    Yuv656 = 15,
}

/// Broadcast colour standards.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Standard {
    /// NTSC (525 lines, 60 Hz)
    Ntsc,
    /// PAL B/G/D/K/H/I (625 lines, 50 Hz)
    Pal,
    /// PAL-M (525 lines, 60 Hz)
    PalM,
    /// PAL-N (625 lines, 50 Hz)
    PalN,
    /// SECAM (625 lines, 50 Hz)
    Secam,
    /// No standard chosen yet, or not one we can configure
    Unknown,
}

/// The three chips that answer at a KS0127 address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipVariant {
    /// The original KS0127
    Ks0127,
    /// KS0127B Revision A
    Ks0127B,
    /// KS0122S. Has no revision register.
    Ks0122S,
}

bitflags::bitflags! {
    /// Problems with the incoming video signal.
    ///
    /// An empty set means we have a signal and the colour is locked.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct InputStatus: u32 {
        /// No video detected on the selected input
        const NO_SIGNAL = 0x0000_0002;
        /// The chroma subcarrier has not been locked
        const NO_COLOR = 0x0000_0004;
    }
}

/// The ways a control operation can be refused.
///
/// Bus errors are not in here - they are logged, and the cache carries on
/// regardless. See [`Decoder::sync`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The input code doesn't match any [`Input`]
    UnsupportedInput(u8),
    /// The standard can't be configured
    UnsupportedStandard(Standard),
}

/// Represents the state inside our KS0127 chip.
pub struct Decoder {
    bus_address: u8,
    /// `(unconfirmed, value)` for each register.
    register_cache: [(bool, u8); NUM_REGISTERS],
    standard: Standard,
    variant: ChipVariant,
}

//
// Private Types
//

/// The bits that differ between composite and S-Video routing.
struct SyncSeparation {
    luma: u8,
    vertia: u8,
    vertic: u8,
    chromb: u8,
}

//
// Private Data
//

/// CMDA value that powers the chip up with default timing.
const CMDA_POWER_ON: u8 = 0x2c;
/// CMDA soft standby bit.
const CMDA_STANDBY: u8 = 0x80;
/// OFMTA with the outputs blanked.
const OFMTA_BLANKED: u8 = 0x20;

/// STAT: clear on the KS0122S
const STAT_HAS_REVISION: u8 = 0x80;
/// STAT: video present on the selected input
const STAT_SIGNAL: u8 = 0x20;
/// STAT: a 625-line (PAL-like) signal is being decoded
const STAT_625_LINE: u8 = 0x08;
/// STAT: chroma locked
const STAT_COLOR_LOCK: u8 = 0x01;

/// DEMOD: SECAM detector has locked
const DEMOD_SECAM_LOCK: u8 = 0x40;

/// Power-up settle time after the first CMDA write.
const POWER_UP_MS: u8 = 10;
/// Pause before walking the register defaults.
const RESET_MS: u8 = 1;
/// Time the colour-lock detector needs before its SECAM verdict is valid.
const SECAM_SETTLE_MS: u8 = 100;

/// Composite forces the sync separator on.
const COMPOSITE_SYNC: SyncSeparation = SyncSeparation {
    luma: Register::Luma.default_value() | 0x0c,
    vertia: 0x81,
    vertic: 0x90,
    chromb: 0x90,
};

/// S-Video goes back to the defaults.
const SVIDEO_SYNC: SyncSeparation = SyncSeparation {
    luma: Register::Luma.default_value(),
    vertia: (Register::VertIA.default_value() & 0xf0) | 0x01,
    vertic: Register::VertIC.default_value() & 0xf0,
    chromb: Register::ChromB.default_value() & 0xf0,
};

//
// impls on Public Types
//

impl From<BusAddress> for u8 {
    fn from(addr: BusAddress) -> u8 {
        addr as u8
    }
}

impl BusAddress {
    fn placement(self) -> &'static str {
        match self {
            BusAddress::AddOn => "addon",
            BusAddress::OnBoard => "on-board",
        }
    }
}

impl From<Input> for u8 {
    fn from(input: Input) -> u8 {
        input as u8
    }
}

impl TryFrom<u8> for Input {
    type Error = Error;

    fn try_from(code: u8) -> Result<Input, Error> {
        match code {
            0 => Ok(Input::Composite1),
            1 => Ok(Input::Composite2),
            2 => Ok(Input::Composite3),
            4 => Ok(Input::Composite4),
            5 => Ok(Input::Composite5),
            6 => Ok(Input::Composite6),
            8 => Ok(Input::SVideo1),
            9 => Ok(Input::SVideo2),
            10 => Ok(Input::SVideo3),
            15 => Ok(Input::Yuv656),
            _ => Err(Error::UnsupportedInput(code)),
        }
    }
}

impl Standard {
    /// Is this a 525-line, 60 Hz field rate standard?
    pub fn is_60hz(self) -> bool {
        matches!(self, Standard::Ntsc | Standard::PalM)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::UnsupportedInput(code) => write!(f, "unsupported input {}", code),
            Error::UnsupportedStandard(std) => write!(f, "unsupported standard {:?}", std),
        }
    }
}

impl Decoder {
    /// Create a new KS0127 proxy object, without touching the chip.
    ///
    /// The cache starts out all zero. You probably want [`Decoder::attach`].
    pub fn new(bus_address: BusAddress) -> Decoder {
        Decoder {
            bus_address: bus_address.into(),
            register_cache: [(false, 0); NUM_REGISTERS],
            standard: Standard::Unknown,
            variant: ChipVariant::Ks0127,
        }
    }

    /// Power up the KS0127, load the register defaults and find out which
    /// chip we are talking to.
    ///
    /// This never fails. A chip that doesn't answer ends up treated as a
    /// KS0122S (its status register reads as zero) and every register is
    /// left unconfirmed - see [`Decoder::sync`].
    pub fn attach<B, D>(bus_address: BusAddress, bus: &mut B, delay: &mut D) -> Decoder
    where
        B: i2c::Write + i2c::WriteRead,
        D: DelayMs<u8>,
    {
        debug!(
            "{} chip found @ 0x{:02x}",
            bus_address.placement(),
            (bus_address as u8) << 1
        );
        let mut decoder = Decoder::new(bus_address);
        decoder.write_register(bus, Register::CmdA, CMDA_POWER_ON);
        delay.delay_ms(POWER_UP_MS);
        decoder.reset(bus, delay);
        decoder
    }

    /// Put the KS0127 into standby and give up the proxy object.
    pub fn release<B>(mut self, bus: &mut B)
    where
        B: i2c::Write,
    {
        self.write_register(bus, Register::OfmtA, OFMTA_BLANKED);
        self.write_register(bus, Register::CmdA, CMDA_POWER_ON | CMDA_STANDBY);
    }

    /// Write every register back to its default, then probe the chip
    /// variant.
    ///
    /// The closed-caption data, test and user SAV/EAV registers are not
    /// touched.
    pub fn reset<B, D>(&mut self, bus: &mut B, delay: &mut D) -> ChipVariant
    where
        B: i2c::Write + i2c::WriteRead,
        D: DelayMs<u8>,
    {
        self.variant = ChipVariant::Ks0127;
        debug!("reset");
        delay.delay_ms(RESET_MS);

        for range in INIT_RANGES {
            for address in range {
                self.store(bus, address, REGISTER_DEFAULTS[address as usize]);
            }
        }

        if self.read_register(bus, Register::Stat) & STAT_HAS_REVISION == 0 {
            self.variant = ChipVariant::Ks0122S;
            debug!("ks0122s found");
            return self.variant;
        }

        match self.read_register(bus, Register::CmdE) & 0x0f {
            0 => {
                debug!("ks0127 found");
            }
            9 => {
                self.variant = ChipVariant::Ks0127B;
                debug!("ks0127B Revision A found");
            }
            revision => {
                warning!("unknown revision {}", revision);
            }
        }
        self.variant
    }

    /// Which chip did [`Decoder::reset`] find?
    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    /// The standard last passed to [`Decoder::select_standard`].
    pub fn standard(&self) -> Standard {
        self.standard
    }

    /// The 7-bit I²C address of this chip.
    pub fn bus_address(&self) -> u8 {
        self.bus_address
    }

    /// The value we last wrote (or tried to write) to a register.
    ///
    /// This is not read from the chip. If the write failed, the chip may
    /// hold something else.
    pub fn register(&self, register: Register) -> u8 {
        self.register_cache[register as usize].1
    }

    /// Did the last write to this register reach the chip?
    pub fn is_confirmed(&self, register: Register) -> bool {
        !self.register_cache[register as usize].0
    }

    /// Registers whose last write failed, in address order.
    pub fn unconfirmed(&self) -> impl Iterator<Item = Register> + '_ {
        self.register_cache
            .iter()
            .enumerate()
            .filter(|(_, (unconfirmed, _))| *unconfirmed)
            .filter_map(|(address, _)| Register::from_address(address as u8))
    }

    /// Write a register, updating the cache whether or not the chip ACKs.
    pub fn write_register<B>(&mut self, bus: &mut B, register: Register, value: u8)
    where
        B: i2c::Write,
    {
        self.store(bus, register.into(), value);
    }

    /// Read a register from the chip (not from the cache).
    ///
    /// If the transfer fails we guess zero.
    pub fn read_register<B>(&self, bus: &mut B, register: Register) -> u8
    where
        B: i2c::WriteRead,
    {
        let mut buffer = [0u8; 1];
        if bus
            .write_read(self.bus_address, &[register.into()], &mut buffer)
            .is_err()
        {
            warning!("read error at 0x{:02x}", register as u8);
            return 0;
        }
        buffer[0]
    }

    /// Update one register: `(cached & and_mask) | or_mask`.
    pub fn and_or<B>(&mut self, bus: &mut B, register: Register, and_mask: u8, or_mask: u8)
    where
        B: i2c::Write,
    {
        let value = (self.register(register) & and_mask) | or_mask;
        self.write_register(bus, register, value);
    }

    /// Select which input gets decoded.
    ///
    /// `input` is an [`Input`] code. An unknown code changes nothing except
    /// the demodulator, which every route change puts back to its default.
    pub fn select_route<B>(&mut self, bus: &mut B, input: u8) -> Result<Input, Error>
    where
        B: i2c::Write,
    {
        let result = Input::try_from(input);
        match result {
            Ok(
                input @ (Input::Composite1
                | Input::Composite2
                | Input::Composite3
                | Input::Composite4
                | Input::Composite5
                | Input::Composite6),
            ) => {
                debug!("s_routing {}: Composite", input as u8);
                self.route_analog(bus, input, &COMPOSITE_SYNC);
            }
            Ok(input @ (Input::SVideo1 | Input::SVideo2 | Input::SVideo3)) => {
                debug!("s_routing {}: S-Video", input as u8);
                self.route_analog(bus, input, &SVIDEO_SYNC);
            }
            Ok(Input::Yuv656) => {
                debug!("s_routing 15: YUV656");
                self.route_digital(bus);
            }
            Err(_) => {
                warning!("s_routing: Unknown input {}", input);
            }
        }

        // Undo any standard-specific demodulator tweak
        self.write_register(bus, Register::Demod, Register::Demod.default_value());
        result
    }

    fn route_analog<B>(&mut self, bus: &mut B, input: Input, sync: &SyncSeparation)
    where
        B: i2c::Write,
    {
        // Analog output timing, no embedded sync
        self.and_or(bus, Register::CmdA, 0xfc, 0x00);
        self.and_or(bus, Register::CmdA, !0x40, 0x00);
        // Input mux
        self.and_or(bus, Register::CmdB, 0xb0, input.into());
        // Analog ADCs, clamping on
        self.and_or(bus, Register::CmdC, 0x70, 0x0a);
        self.and_or(bus, Register::CmdD, 0x03, 0x00);
        self.and_or(bus, Register::CTrack, 0xcf, 0x00);
        // Sync separation and chroma trap
        self.and_or(bus, Register::Luma, 0x00, sync.luma);
        self.and_or(bus, Register::VertIA, 0x08, sync.vertia);
        self.and_or(bus, Register::VertIC, 0x0f, sync.vertic);
        self.and_or(bus, Register::ChromB, 0x0f, sync.chromb);

        for register in [
            Register::UGain,
            Register::VGain,
            Register::UvOffH,
            Register::UvOffL,
        ] {
            self.write_register(bus, register, register.default_value());
        }
    }

    fn route_digital<B>(&mut self, bus: &mut B)
    where
        B: i2c::Write,
    {
        // Output timing follows the field rate of the current standard
        if self.standard.is_60hz() {
            self.and_or(bus, Register::CmdA, 0xfc, 0x03);
        } else {
            self.and_or(bus, Register::CmdA, 0xfc, 0x02);
        }
        // Embedded sync on
        self.and_or(bus, Register::CmdA, 0xff, 0x40);
        self.and_or(bus, Register::CmdB, 0xb0, u8::from(Input::Yuv656) | 0x40);
        // Bypass the analog front end
        self.and_or(bus, Register::CmdC, 0x70, 0x87);
        self.and_or(bus, Register::CmdD, 0x03, 0x08);
        self.and_or(bus, Register::CTrack, 0xcf, 0x30);
        self.and_or(bus, Register::Luma, 0x00, 0x71);
        self.and_or(
            bus,
            Register::VertIC,
            0x0f,
            Register::VertIC.default_value() & 0xf0,
        );
        self.and_or(bus, Register::VertIA, 0x08, 0x81);
        self.and_or(
            bus,
            Register::ChromB,
            0x0f,
            Register::ChromB.default_value() & 0xf0,
        );

        // Picture controls neutral, colour space passed through
        self.and_or(bus, Register::Con, 0x00, 0x00);
        self.and_or(bus, Register::Brt, 0x00, 32);
        self.and_or(bus, Register::Sat, 0x00, 0xe8);
        self.and_or(bus, Register::Hue, 0x00, 0);
        self.and_or(bus, Register::UGain, 0x00, 238);
        self.and_or(bus, Register::VGain, 0x00, 0x00);
        self.and_or(bus, Register::UvOffH, 0x00, 0x4f);
        self.and_or(bus, Register::UvOffL, 0x00, 0x00);
    }

    /// Configure the colour demodulator for a broadcast standard.
    ///
    /// For SECAM this blocks for 100 ms while the colour-lock detector
    /// settles, then forces SECAM decoding if the chip didn't lock on its
    /// own.
    ///
    /// PAL-N and PAL-M get the same setting, which is only approximately
    /// right for either.
    pub fn select_standard<B, D>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        standard: Standard,
    ) -> Result<(), Error>
    where
        B: i2c::Write + i2c::WriteRead,
        D: DelayMs<u8>,
    {
        // Back to automatic mode detection
        self.and_or(bus, Register::Demod, 0xf0, 0x00);

        self.standard = standard;
        match standard {
            Standard::Ntsc | Standard::Pal => {
                debug!("s_std: {:?}", standard);
                self.and_or(bus, Register::ChromA, 0x9f, 0x20);
            }
            Standard::PalN | Standard::PalM => {
                debug!("s_std: {:?} (approximate)", standard);
                self.and_or(bus, Register::ChromA, 0x9f, 0x40);
            }
            Standard::Secam => {
                debug!("s_std: SECAM");
                self.and_or(bus, Register::ChromA, 0xdf, 0x20);
                self.and_or(bus, Register::Demod, 0xf0, 0x00);
                delay.delay_ms(SECAM_SETTLE_MS);

                if self.read_register(bus, Register::Demod) & DEMOD_SECAM_LOCK == 0 {
                    // Detector gave up - force SECAM
                    self.and_or(bus, Register::Demod, 0xf0, 0x0f);
                }
            }
            Standard::Unknown => {
                warning!("s_std: Unknown norm");
                return Err(Error::UnsupportedStandard(standard));
            }
        }
        Ok(())
    }

    /// Turn the digital video output on or off.
    ///
    /// Off blanks the output port and powers down chroma decimation.
    pub fn set_streaming<B>(&mut self, bus: &mut B, enabled: bool)
    where
        B: i2c::Write,
    {
        debug!("s_stream({})", enabled);
        if enabled {
            self.and_or(bus, Register::OfmtA, 0xcf, 0x30);
            self.and_or(bus, Register::CDem, 0x7f, 0x00);
        } else {
            self.and_or(bus, Register::OfmtA, 0xcf, 0x00);
            self.and_or(bus, Register::CDem, 0x7f, 0x80);
        }
    }

    /// Check the incoming signal.
    ///
    /// Returns what is wrong with it (if anything) and whether it looks like
    /// a 625-line ([`Standard::Pal`]) or 525-line ([`Standard::Ntsc`])
    /// signal. That guess is only a hint: call
    /// [`Decoder::select_standard`] to actually configure the chip.
    pub fn query_status<B>(&self, bus: &mut B) -> (InputStatus, Standard)
    where
        B: i2c::WriteRead,
    {
        let status = self.read_register(bus, Register::Stat);

        let mut flags = InputStatus::empty();
        if status & STAT_SIGNAL == 0 {
            flags |= InputStatus::NO_SIGNAL;
        }
        if status & STAT_COLOR_LOCK == 0 {
            flags |= InputStatus::NO_COLOR;
        }
        let standard = if status & STAT_625_LINE != 0 {
            Standard::Pal
        } else {
            Standard::Ntsc
        };
        (flags, standard)
    }

    /// Guess the standard of the incoming signal.
    ///
    /// See [`Decoder::query_status`].
    pub fn query_standard<B>(&self, bus: &mut B) -> Standard
    where
        B: i2c::WriteRead,
    {
        debug!("querystd");
        self.query_status(bus).1
    }

    /// Get the signal / colour-lock flags for the current input.
    ///
    /// See [`Decoder::query_status`].
    pub fn input_status<B>(&self, bus: &mut B) -> InputStatus
    where
        B: i2c::WriteRead,
    {
        debug!("g_input_status");
        self.query_status(bus).0
    }

    /// Retry every register whose last write failed, over I²C.
    ///
    /// Stops at the first failure; registers after it stay unconfirmed.
    pub fn sync<B>(&mut self, bus: &mut B) -> Result<(), B::Error>
    where
        B: i2c::Write,
    {
        for (address, (unconfirmed, register_value)) in self.register_cache.iter_mut().enumerate()
        {
            if *unconfirmed {
                debug!(
                    "Retrying KS0127 0x{:02x} with 0x{:02x}",
                    address as u8,
                    *register_value
                );
                bus.write(self.bus_address, &[address as u8, *register_value])?;
                *unconfirmed = false;
            }
        }
        Ok(())
    }

    /// Write a register by address. The cache is updated even if the chip
    /// doesn't answer.
    fn store<B>(&mut self, bus: &mut B, address: u8, value: u8)
    where
        B: i2c::Write,
    {
        debug!("Setting KS0127 0x{:02x} to 0x{:02x}", address, value);
        let acked = bus.write(self.bus_address, &[address, value]).is_ok();
        if !acked {
            warning!("write error at 0x{:02x}", address);
        }
        self.register_cache[address as usize] = (!acked, value);
    }
}

//
// impls on Private Types
//

// None


//
// End of file
//
