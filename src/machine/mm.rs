//! Everything related to memory mapping.

use super::Machine;
use crate::{
    log::*,
    primitives::{Byte, Word},
};


impl Machine {
    /// Loads a byte from the given address.
    pub fn load_byte(&self, addr: Word) -> Byte {
        // During OAM DMA the CPU is cut off from everything but HRAM.
        if self.oam_dma_active() && !(0xff80..0xffff).contains(&addr.get()) {
            return Byte::new(0xff);
        }

        self.load_byte_bypass_dma(addr)
    }

    /// Loads a byte from the given address even while DMA is running. The
    /// DMA engine itself reads through this.
    pub(crate) fn load_byte_bypass_dma(&self, addr: Word) -> Byte {
        match addr.get() {
            0x0000..0x8000 => self.cartridge.load_rom_byte(addr),
            0x8000..0xa000 => self.ppu.load_vram_byte(addr),
            0xa000..0xc000 => self.cartridge.load_ram_byte(addr - 0xa000),
            0xc000..0xe000 => self.wram[addr - 0xc000],
            0xe000..0xfe00 => self.wram[addr - 0xe000], // echo RAM
            0xfe00..0xfea0 => self.ppu.load_oam_byte(addr),

            // The prohibited area. What the hardware actually returns here
            // depends on the revision and the PPU mode; all ones is the
            // simple, common answer.
            0xfea0..0xff00 => Byte::new(0xff),

            0xff00 => self.input_controller.load_register(),
            0xff01..=0xff02 => self.serial.load_byte(addr),
            0xff04..=0xff07 => self.timer.load_byte(addr),
            0xff0f => self.interrupt_controller.load_if(),
            0xff10..=0xff3f => self.apu.load_byte(addr),
            0xff40..=0xff4b => self.ppu.load_io_byte(addr),

            // Unmapped I/O ports read all ones.
            0xff00..0xff80 => Byte::new(0xff),

            0xff80..0xffff => self.hram[addr - 0xff80],
            0xffff => self.interrupt_controller.interrupt_enable,
        }
    }

    /// Stores the given byte at the given address.
    pub(crate) fn store_byte(&mut self, addr: Word, byte: Byte) {
        // During OAM DMA the CPU is cut off from everything but HRAM.
        if self.oam_dma_active() && !(0xff80..0xffff).contains(&addr.get()) {
            return;
        }

        match addr.get() {
            0x0000..0x8000 => self.cartridge.store_rom_byte(addr, byte),
            0x8000..0xa000 => self.ppu.store_vram_byte(addr, byte),
            0xa000..0xc000 => self.cartridge.store_ram_byte(addr - 0xa000, byte),
            0xc000..0xe000 => self.wram[addr - 0xc000] = byte,
            0xe000..0xfe00 => self.wram[addr - 0xe000] = byte, // echo RAM
            0xfe00..0xfea0 => self.ppu.store_oam_byte(addr, byte),

            // Writes into the prohibited area are dropped.
            0xfea0..0xff00 => {
                trace!("ignored write of {} to prohibited address {}", byte, addr);
            }

            0xff00 => self.input_controller.store_register(byte),
            0xff01..=0xff02 => self.serial.store_byte(addr, byte),
            0xff04..=0xff07 => self.timer.store_byte(addr, byte),
            0xff0f => self.interrupt_controller.store_if(byte),
            0xff10..=0xff3f => self.apu.store_byte(addr, byte),
            0xff46 => {
                self.ppu.set_oam_dma_register(byte);
                self.start_oam_dma(byte);
            }
            0xff40..=0xff4b => {
                self.ppu.store_io_byte(addr, byte, &mut self.interrupt_controller);
            }

            // Unmapped I/O ports (including the boot ROM disable port,
            // which has nothing left to unmap here) swallow writes.
            0xff00..0xff80 => {}

            0xff80..0xffff => self.hram[addr - 0xff80] = byte,
            0xffff => self.interrupt_controller.interrupt_enable = byte,
        }
    }

    /// Loads the little endian word at `addr`.
    pub fn load_word(&self, addr: Word) -> Word {
        let lsb = self.load_byte(addr);
        let msb = self.load_byte(addr + 1u16);

        Word::from_bytes(lsb, msb)
    }

    /// Stores `word` at `addr`, low byte first.
    pub(crate) fn store_word(&mut self, addr: Word, word: Word) {
        let (lsb, msb) = word.into_bytes();
        self.store_byte(addr, lsb);
        self.store_byte(addr + 1u16, msb);
    }
}
