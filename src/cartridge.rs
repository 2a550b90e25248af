//! Everything related to the cartridge and its header.

use std::fmt;

use crate::{
    error::Error,
    log::*,
    mbc::{self, Mbc},
    primitives::{Byte, Word},
};


/// Specifies how this ROM works with the Game Boy Color. Stored at `0x0143`.
/// This core only implements the monochrome device, so the value is parsed
/// for information only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgbMode {
    /// Only CGB is supported. Value `0xC0`.
    CgbOnly,

    /// DMG and CGB are supported. Value `0x80`.
    BothSupported,

    /// CGB features are not supported. Bit 7 is not set.
    NonCgb,
}

impl CgbMode {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0xc0 => CgbMode::CgbOnly,
            0x80 => CgbMode::BothSupported,
            _ => CgbMode::NonCgb,
        }
    }
}

/// The kind of memory bank controller soldered onto the cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

/// The parsed cartridge type byte (`0x0147`): which controller is used and
/// which extras (RAM, battery, RTC) are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartridgeType {
    pub mbc: MbcKind,
    pub has_ram: bool,
    pub has_battery: bool,
    pub has_rtc: bool,
}

impl CartridgeType {
    /// Parses the cartridge type from the given byte.
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        let t = |mbc, has_ram, has_battery, has_rtc| {
            Ok(Self { mbc, has_ram, has_battery, has_rtc })
        };

        match byte {
            0x00 => t(MbcKind::NoMbc, false, false, false),
            0x08 => t(MbcKind::NoMbc, true,  false, false),
            0x09 => t(MbcKind::NoMbc, true,  true,  false),

            0x01 => t(MbcKind::Mbc1, false, false, false),
            0x02 => t(MbcKind::Mbc1, true,  false, false),
            0x03 => t(MbcKind::Mbc1, true,  true,  false),

            // MBC2 always has its internal nybble RAM, regardless of the
            // RAM size header field.
            0x05 => t(MbcKind::Mbc2, true, false, false),
            0x06 => t(MbcKind::Mbc2, true, true,  false),

            0x0f => t(MbcKind::Mbc3, false, true,  true),
            0x10 => t(MbcKind::Mbc3, true,  true,  true),
            0x11 => t(MbcKind::Mbc3, false, false, false),
            0x12 => t(MbcKind::Mbc3, true,  false, false),
            0x13 => t(MbcKind::Mbc3, true,  true,  false),

            // 0x1C--0x1E are the rumble variants. The rumble motor itself is
            // not emulated but the banking is plain MBC5.
            0x19 => t(MbcKind::Mbc5, false, false, false),
            0x1a => t(MbcKind::Mbc5, true,  false, false),
            0x1b => t(MbcKind::Mbc5, true,  true,  false),
            0x1c => t(MbcKind::Mbc5, false, false, false),
            0x1d => t(MbcKind::Mbc5, true,  false, false),
            0x1e => t(MbcKind::Mbc5, true,  true,  false),

            other => Err(Error::UnsupportedMbc(other)),
        }
    }
}

/// Size of the cartridge's ROM, defined by the number of 16 KiB banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RomSize {
    Banks2,
    Banks4,
    Banks8,
    Banks16,
    Banks32,
    Banks64,
    Banks128,
    Banks256,
    Banks512,
}

impl RomSize {
    fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0x00 => Ok(RomSize::Banks2),
            0x01 => Ok(RomSize::Banks4),
            0x02 => Ok(RomSize::Banks8),
            0x03 => Ok(RomSize::Banks16),
            0x04 => Ok(RomSize::Banks32),
            0x05 => Ok(RomSize::Banks64),
            0x06 => Ok(RomSize::Banks128),
            0x07 => Ok(RomSize::Banks256),
            0x08 => Ok(RomSize::Banks512),
            _ => Err(Error::InvalidRomHeader("bad ROM size byte")),
        }
    }

    /// Number of 16 KiB banks.
    pub fn banks(&self) -> usize {
        match self {
            RomSize::Banks2 => 2,
            RomSize::Banks4 => 4,
            RomSize::Banks8 => 8,
            RomSize::Banks16 => 16,
            RomSize::Banks32 => 32,
            RomSize::Banks64 => 64,
            RomSize::Banks128 => 128,
            RomSize::Banks256 => 256,
            RomSize::Banks512 => 512,
        }
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.banks() * 0x4000
    }
}

/// Size of the cartridge's external RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RamSize {
    None,
    Kb2,
    Kb8,
    Kb32,
    Kb64,
    Kb128,
}

impl RamSize {
    fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0x00 => Ok(RamSize::None),
            0x01 => Ok(RamSize::Kb2),
            0x02 => Ok(RamSize::Kb8),
            0x03 => Ok(RamSize::Kb32),
            0x05 => Ok(RamSize::Kb64),
            0x04 => Ok(RamSize::Kb128),
            _ => Err(Error::InvalidRomHeader("bad RAM size byte")),
        }
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        match self {
            RamSize::None => 0,
            RamSize::Kb2 => 0x800,
            RamSize::Kb8 => 0x2000,
            RamSize::Kb32 => 4 * 0x2000,
            RamSize::Kb64 => 8 * 0x2000,
            RamSize::Kb128 => 16 * 0x2000,
        }
    }
}

/// A loaded cartridge: the parsed header plus the memory bank controller
/// that owns the ROM image and any external RAM.
pub struct Cartridge {
    pub(crate) mbc: Box<dyn Mbc>,
    title: String,
    cgb_mode: CgbMode,
    cartridge_type: CartridgeType,
    rom_size: RomSize,
    ram_size: RamSize,
}

impl Cartridge {
    /// Parses the header and builds the matching bank controller. The image
    /// must at least contain the full 0x150 byte header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 0x150 {
            return Err(Error::InvalidRomHeader("image shorter than the cartridge header"));
        }

        // The title field shrank over the years as manufacturer code and CGB
        // flag were carved out of it. If the last four bytes contain a 0 we
        // assume the long pre-CGB layout.
        let man_code = &bytes[0x013f..=0x0142];
        let max_title_len = if man_code.iter().any(|b| *b == 0x00) { 15 } else { 11 };
        let title_len = bytes[0x0134..0x0134 + max_title_len]
            .iter()
            .position(|b| *b == 0x00)
            .unwrap_or(max_title_len);
        let title = String::from_utf8_lossy(&bytes[0x0134..0x0134 + title_len]).into_owned();

        let cgb_mode = CgbMode::from_byte(bytes[0x0143]);
        let cartridge_type = CartridgeType::from_byte(bytes[0x0147])?;
        let rom_size = RomSize::from_byte(bytes[0x0148])?;
        let ram_size = RamSize::from_byte(bytes[0x0149])?;

        if bytes.len() != rom_size.len() {
            warn!(
                "ROM image is {} bytes but the header claims {}",
                bytes.len(),
                rom_size.len(),
            );
        }

        // The header checksum is informative only; real hardware checks it
        // in the boot ROM but plenty of homebrew images get it wrong.
        let checksum = bytes[0x0134..=0x014c]
            .iter()
            .fold(0u8, |sum, b| sum.wrapping_sub(*b).wrapping_sub(1));
        if checksum != bytes[0x014d] {
            warn!(
                "header checksum mismatch: computed {:#04x}, header says {:#04x}",
                checksum, bytes[0x014d],
            );
        }

        if cgb_mode == CgbMode::CgbOnly {
            warn!("cartridge is marked CGB-only; running it as DMG anyway");
        }

        let mbc = mbc::build(cartridge_type, bytes, ram_size);

        info!(
            "loaded cartridge {:?}: {:?}, {} ROM banks, {} bytes RAM",
            title,
            cartridge_type.mbc,
            rom_size.banks(),
            ram_size.len(),
        );

        Ok(Self {
            mbc,
            title,
            cgb_mode,
            cartridge_type,
            rom_size,
            ram_size,
        })
    }

    /// Load a [`Byte`] from the ROM range `0x0000..0x8000`.
    pub fn load_rom_byte(&self, addr: Word) -> Byte {
        self.mbc.load_rom_byte(addr)
    }

    /// Store a [`Byte`] to the ROM range. This never changes ROM contents,
    /// but it is how games talk to the controller's banking registers.
    pub fn store_rom_byte(&mut self, addr: Word, byte: Byte) {
        self.mbc.store_rom_byte(addr, byte);
    }

    /// Load a [`Byte`] from external RAM. `addr` is relative to `0xA000`.
    pub fn load_ram_byte(&self, addr: Word) -> Byte {
        self.mbc.load_ram_byte(addr)
    }

    /// Store a [`Byte`] to external RAM. `addr` is relative to `0xA000`.
    pub fn store_ram_byte(&mut self, addr: Word, byte: Byte) {
        self.mbc.store_ram_byte(addr, byte);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cgb_mode(&self) -> CgbMode {
        self.cgb_mode
    }

    pub fn cartridge_type(&self) -> CartridgeType {
        self.cartridge_type
    }

    pub fn rom_size(&self) -> RomSize {
        self.rom_size
    }

    pub fn ram_size(&self) -> RamSize {
        self.ram_size
    }

    /// Whether external RAM survives power-off (and is worth persisting).
    pub fn has_battery(&self) -> bool {
        self.cartridge_type.has_battery
    }
}

// Manual implementation to omit printing the full memory.
impl fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cartridge")
            .field("title", &self.title)
            .field("cgb_mode", &self.cgb_mode)
            .field("cartridge_type", &self.cartridge_type)
            .field("rom_size", &self.rom_size)
            .field("ram_size", &self.ram_size)
            .finish()
    }
}


#[cfg(test)]
mod test {
    use super::*;

    /// Builds a minimal image with the given header bytes at 0x147..=0x149
    /// and a correct header checksum.
    pub(crate) fn image(cartridge_type: u8, rom_size: u8, ram_size: u8) -> Vec<u8> {
        let mut rom = vec![0u8; RomSize::from_byte(rom_size).unwrap().len()];
        rom[0x0134..0x0134 + 4].copy_from_slice(b"TEST");
        rom[0x0147] = cartridge_type;
        rom[0x0148] = rom_size;
        rom[0x0149] = ram_size;

        let checksum = rom[0x0134..=0x014c]
            .iter()
            .fold(0u8, |sum, b| sum.wrapping_sub(*b).wrapping_sub(1));
        rom[0x014d] = checksum;

        rom
    }

    #[test]
    fn test_header_parse() {
        let cartridge = Cartridge::from_bytes(&image(0x03, 0x02, 0x03)).unwrap();
        assert_eq!(cartridge.title(), "TEST");
        assert_eq!(cartridge.cartridge_type().mbc, MbcKind::Mbc1);
        assert!(cartridge.cartridge_type().has_ram);
        assert!(cartridge.has_battery());
        assert_eq!(cartridge.rom_size(), RomSize::Banks8);
        assert_eq!(cartridge.ram_size(), RamSize::Kb32);
    }

    #[test]
    fn test_too_short_image() {
        assert!(matches!(
            Cartridge::from_bytes(&[0u8; 0x100]),
            Err(Error::InvalidRomHeader(_)),
        ));
    }

    #[test]
    fn test_unknown_mapper() {
        let rom = image(0xfc, 0x00, 0x00);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(Error::UnsupportedMbc(0xfc)),
        ));
    }
}
