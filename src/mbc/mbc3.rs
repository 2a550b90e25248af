//! The MBC3, used by games that want a real time clock.

use crate::{
    cartridge::RamSize,
    log::*,
    primitives::{Byte, Word},
    CLOCK_RATE,
};
use super::{copy_rom, restore_into, Mbc};

/// Up to 2 MiB of ROM, 32 KiB of RAM and an optional battery buffered real
/// time clock.
///
/// The `0x4000` register selects either a RAM bank (0..=3) or one of the
/// five clock registers (0x08..=0x0C), which are then visible through the
/// whole external RAM window. Unlike the MBC1 the full 7 bit ROM bank
/// register is writable, so bank 0 can be mapped into the switchable area.
pub(crate) struct Mbc3 {
    rom: Box<[Byte]>,
    ram: Box<[Byte]>,

    rom_bank: u8,

    /// RAM bank or RTC register select (raw register value).
    ram_select: u8,

    ram_enabled: bool,
    rom_bank_mask: usize,

    rtc: Option<Rtc>,
}

/// The clock counters. `latched` is the snapshot frozen by the latch
/// sequence so the guest can read a consistent set of registers.
struct Rtc {
    current: ClockRegs,
    latched: ClockRegs,

    /// Sub-second progress in T-cycles.
    cycle_acc: u64,

    /// Previous value written to the latch register; latching happens on a
    /// 0 -> 1 sequence.
    last_latch_write: u8,
}

#[derive(Clone, Copy, Default)]
struct ClockRegs {
    seconds: u8,
    minutes: u8,
    hours: u8,

    /// 9 bit day counter.
    days: u16,

    halted: bool,

    /// Set when the day counter wraps past 511; sticky until the guest
    /// clears it.
    day_carry: bool,
}

impl ClockRegs {
    fn advance_second(&mut self) {
        self.seconds = (self.seconds + 1) % 60;
        if self.seconds != 0 {
            return;
        }

        self.minutes = (self.minutes + 1) % 60;
        if self.minutes != 0 {
            return;
        }

        self.hours = (self.hours + 1) % 24;
        if self.hours != 0 {
            return;
        }

        self.days += 1;
        if self.days > 0x1ff {
            self.days = 0;
            self.day_carry = true;
        }
    }

    fn read(&self, reg: u8) -> Byte {
        let v = match reg {
            0x08 => self.seconds,
            0x09 => self.minutes,
            0x0a => self.hours,
            0x0b => (self.days & 0xff) as u8,
            0x0c => {
                ((self.days >> 8) as u8 & 1)
                    | (self.halted as u8) << 6
                    | (self.day_carry as u8) << 7
            }
            _ => 0xff,
        };

        Byte::new(v)
    }

    fn write(&mut self, reg: u8, byte: Byte) {
        let v = byte.get();
        match reg {
            0x08 => self.seconds = v % 60,
            0x09 => self.minutes = v % 60,
            0x0a => self.hours = v % 24,
            0x0b => self.days = (self.days & 0x100) | v as u16,
            0x0c => {
                self.days = (self.days & 0xff) | ((v as u16 & 1) << 8);
                self.halted = v & 0x40 != 0;
                self.day_carry = v & 0x80 != 0;
            }
            _ => {}
        }
    }
}

impl Mbc3 {
    pub(crate) fn new(data: &[u8], ram_size: RamSize, has_rtc: bool) -> Self {
        let banks = std::cmp::max(data.len() / 0x4000, 1);

        Self {
            rom: copy_rom(data),
            ram: vec![Byte::zero(); ram_size.len()].into_boxed_slice(),
            rom_bank: 1,
            ram_select: 0,
            ram_enabled: false,
            rom_bank_mask: banks.next_power_of_two() - 1,
            rtc: has_rtc.then(|| Rtc {
                current: ClockRegs::default(),
                latched: ClockRegs::default(),
                cycle_acc: 0,
                last_latch_write: 0xff,
            }),
        }
    }
}

impl Mbc for Mbc3 {
    fn load_rom_byte(&self, addr: Word) -> Byte {
        let bank = match addr.get() {
            0x0000..0x4000 => 0,
            0x4000..0x8000 => self.rom_bank as usize & self.rom_bank_mask,
            _ => unreachable!(),
        };

        let offset = bank * 0x4000 + (addr.get() as usize & 0x3fff);
        self.rom.get(offset).copied().unwrap_or(Byte::new(0xff))
    }

    fn store_rom_byte(&mut self, addr: Word, byte: Byte) {
        match addr.get() {
            0x0000..0x2000 => self.ram_enabled = byte.get() & 0x0f == 0x0a,

            // Full 7 bit bank number; bank 0 is selectable.
            0x2000..0x4000 => self.rom_bank = byte.get() & 0x7f,

            0x4000..0x6000 => self.ram_select = byte.get() & 0x0f,

            0x6000..0x8000 => {
                if let Some(rtc) = &mut self.rtc {
                    if rtc.last_latch_write == 0 && byte.get() == 1 {
                        rtc.latched = rtc.current;
                        trace!("RTC latched");
                    }
                    rtc.last_latch_write = byte.get();
                }
            }

            _ => unreachable!(),
        }
    }

    fn load_ram_byte(&self, addr: Word) -> Byte {
        if !self.ram_enabled {
            return Byte::new(0xff);
        }

        match (self.ram_select, &self.rtc) {
            (0x08..=0x0c, Some(rtc)) => rtc.latched.read(self.ram_select),
            (bank @ 0x00..=0x03, _) => self
                .ram
                .get(bank as usize * 0x2000 + addr.get() as usize)
                .copied()
                .unwrap_or(Byte::new(0xff)),
            _ => Byte::new(0xff),
        }
    }

    fn store_ram_byte(&mut self, addr: Word, byte: Byte) {
        if !self.ram_enabled {
            return;
        }

        match (self.ram_select, &mut self.rtc) {
            (0x08..=0x0c, Some(rtc)) => {
                rtc.current.write(self.ram_select, byte);
                if self.ram_select == 0x08 {
                    // Writing the seconds register also resets the
                    // sub-second counter.
                    rtc.cycle_acc = 0;
                }
            }
            (bank @ 0x00..=0x03, _) => {
                let idx = bank as usize * 0x2000 + addr.get() as usize;
                if let Some(slot) = self.ram.get_mut(idx) {
                    *slot = byte;
                }
            }
            _ => {}
        }
    }

    fn ram(&self) -> &[Byte] {
        &self.ram
    }

    fn restore_ram(&mut self, bytes: &[u8]) {
        restore_into(&mut self.ram, bytes);
    }

    fn tick(&mut self, cycles: u64) {
        let Some(rtc) = &mut self.rtc else { return };
        if rtc.current.halted {
            return;
        }

        rtc.cycle_acc += cycles;
        while rtc.cycle_acc >= CLOCK_RATE {
            rtc.cycle_acc -= CLOCK_RATE;
            rtc.current.advance_second();
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn controller() -> Mbc3 {
        Mbc3::new(&vec![0u8; 2 * 0x4000], RamSize::Kb8, true)
    }

    #[test]
    fn test_bank_zero_is_selectable() {
        let mut data = vec![0u8; 4 * 0x4000];
        for (bank, chunk) in data.chunks_mut(0x4000).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut mbc = Mbc3::new(&data, RamSize::None, false);

        mbc.store_rom_byte(Word::new(0x2000), Byte::new(0x00));
        assert_eq!(mbc.load_rom_byte(Word::new(0x4000)), 0x00);

        mbc.store_rom_byte(Word::new(0x2000), Byte::new(0x02));
        assert_eq!(mbc.load_rom_byte(Word::new(0x4000)), 0x02);
    }

    #[test]
    fn test_rtc_counts_seconds() {
        let mut mbc = controller();
        mbc.store_rom_byte(Word::new(0x0000), Byte::new(0x0a));
        mbc.store_rom_byte(Word::new(0x4000), Byte::new(0x08));

        mbc.tick(CLOCK_RATE * 61);

        // Unlatched: reads still show the snapshot from construction.
        assert_eq!(mbc.load_ram_byte(Word::new(0)), 0x00);

        mbc.store_rom_byte(Word::new(0x6000), Byte::new(0x00));
        mbc.store_rom_byte(Word::new(0x6000), Byte::new(0x01));
        assert_eq!(mbc.load_ram_byte(Word::new(0)), 1);

        mbc.store_rom_byte(Word::new(0x4000), Byte::new(0x09));
        assert_eq!(mbc.load_ram_byte(Word::new(0)), 1);
    }

    #[test]
    fn test_rtc_halt_stops_counting() {
        let mut mbc = controller();
        mbc.store_rom_byte(Word::new(0x0000), Byte::new(0x0a));

        mbc.store_rom_byte(Word::new(0x4000), Byte::new(0x0c));
        mbc.store_ram_byte(Word::new(0), Byte::new(0x40));

        mbc.tick(CLOCK_RATE * 5);

        mbc.store_rom_byte(Word::new(0x6000), Byte::new(0x00));
        mbc.store_rom_byte(Word::new(0x6000), Byte::new(0x01));
        mbc.store_rom_byte(Word::new(0x4000), Byte::new(0x08));
        assert_eq!(mbc.load_ram_byte(Word::new(0)), 0x00);
    }
}
