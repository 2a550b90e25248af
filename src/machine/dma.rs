//! The OAM DMA engine.

use super::Machine;
use crate::{
    log::*,
    primitives::{Byte, Word},
};


/// A running OAM DMA transfer: 160 bytes, one per machine cycle, from
/// `page * 0x100` into OAM. While it runs, the CPU can only reach HRAM.
pub(crate) struct OamDma {
    /// Source base address (`page * 0x100`).
    source: Word,

    /// Index of the next byte to copy (0..160).
    next: u8,

    /// T-cycles accumulated towards the next byte.
    cycle_acc: u32,
}

impl Machine {
    /// A write to `0xFF46` (re)starts the transfer.
    pub(crate) fn start_oam_dma(&mut self, page: Byte) {
        self.oam_dma = Some(OamDma {
            source: Word::new((page.get() as u16) << 8),
            next: 0,
            cycle_acc: 0,
        });
    }

    /// Advances a running transfer. One byte moves every 4 T-cycles, so
    /// the whole OAM is rewritten after 640.
    pub(crate) fn dma_tick(&mut self, cycles: u32) {
        let Some(mut dma) = self.oam_dma.take() else { return };

        dma.cycle_acc += cycles;
        while dma.cycle_acc >= 4 {
            dma.cycle_acc -= 4;

            let byte = self.load_byte_bypass_dma(dma.source + dma.next);
            self.ppu.store_oam_byte_bypass(Word::new(0xfe00 + dma.next as u16), byte);

            dma.next += 1;
            if dma.next == 160 {
                trace!("OAM DMA finished");
                return;
            }
        }

        self.oam_dma = Some(dma);
    }

    /// Whether a transfer is running, i.e. whether the bus is locked away
    /// from the CPU.
    pub(crate) fn oam_dma_active(&self) -> bool {
        self.oam_dma.is_some()
    }
}
