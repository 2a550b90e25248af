//! Memory bank controllers.
//!
//! The cartridge-side chip that decides which ROM bank shows up in
//! `0x4000..0x8000` (and sometimes `0x0000..0x4000`), whether external RAM
//! is reachable and which bank of it. Writes into the ROM address range are
//! the register interface of these chips.

use crate::{
    cartridge::{CartridgeType, MbcKind, RamSize},
    primitives::{Byte, Word},
};
pub(crate) use self::{
    mbc1::Mbc1,
    mbc2::Mbc2,
    mbc3::Mbc3,
    mbc5::Mbc5,
    no_mbc::NoMbc,
};

mod mbc1;
mod mbc2;
mod mbc3;
mod mbc5;
mod no_mbc;


/// A memory bank controller.
///
/// This part of the cartridge controls all writes and reads to and from ROM
/// and RAM. Usually some kind of banking strategy is used to store more
/// than `0x8000` bytes on the cartridge.
pub(crate) trait Mbc {
    /// Loads one byte from the cartridge ROM. `addr` has to be below
    /// `0x8000`.
    fn load_rom_byte(&self, addr: Word) -> Byte;

    /// Stores one byte to the cartridge ROM range. ROM contents never
    /// change; this writes into the controller's banking registers.
    fn store_rom_byte(&mut self, addr: Word, byte: Byte);

    /// Loads one byte from external RAM. `addr` is relative and has to be
    /// below `0x2000`.
    fn load_ram_byte(&self, addr: Word) -> Byte;

    /// Stores one byte to external RAM. `addr` is relative and has to be
    /// below `0x2000`.
    fn store_ram_byte(&mut self, addr: Word, byte: Byte);

    /// The full external RAM contents, in cartridge address order. Used for
    /// battery backed save files.
    fn ram(&self) -> &[Byte];

    /// Overwrites external RAM with a previously saved image. Extra bytes
    /// are ignored, a short image leaves the tail untouched.
    fn restore_ram(&mut self, bytes: &[u8]);

    /// Advances controller internal time. Only the MBC3 real time clock
    /// cares.
    fn tick(&mut self, _cycles: u64) {}
}

/// Builds the controller matching the parsed cartridge type.
pub(crate) fn build(
    cartridge_type: CartridgeType,
    rom: &[u8],
    ram_size: RamSize,
) -> Box<dyn Mbc> {
    match cartridge_type.mbc {
        MbcKind::NoMbc => Box::new(NoMbc::new(rom, ram_size)),
        MbcKind::Mbc1 => Box::new(Mbc1::new(rom, ram_size)),
        MbcKind::Mbc2 => Box::new(Mbc2::new(rom)),
        MbcKind::Mbc3 => Box::new(Mbc3::new(rom, ram_size, cartridge_type.has_rtc)),
        MbcKind::Mbc5 => Box::new(Mbc5::new(rom, ram_size)),
    }
}

/// Copies a ROM image into a boxed slice of [`Byte`]s.
fn copy_rom(data: &[u8]) -> Box<[Byte]> {
    data.iter().copied().map(Byte::new).collect()
}

/// Restores a saved RAM image into `ram`, clamping to the shorter of the
/// two lengths.
fn restore_into(ram: &mut [Byte], bytes: &[u8]) {
    for (dst, src) in ram.iter_mut().zip(bytes) {
        *dst = Byte::new(*src);
    }
}
