//! The machine: every piece of hardware state and the wiring between the
//! subsystems.

use crate::{
    cartridge::Cartridge,
    primitives::{Byte, Memory, Word},
};
use self::{
    apu::Apu,
    cpu::Cpu,
    dma::OamDma,
    input::InputController,
    interrupt::InterruptController,
    ppu::Ppu,
    serial::SerialPort,
    timer::Timer,
};


#[macro_use]
mod macros;

pub mod apu;
pub mod cpu;
mod dma;
pub mod input;
pub mod interrupt;
mod mm;
pub mod ppu;
mod serial;
mod step;
mod timer;


/// The whole device. Owns the CPU state and all memories and peripherals;
/// the CPU reaches everything through the memory mapping in `mm`, the
/// peripherals raise interrupts through the shared controller.
pub struct Machine {
    pub cpu: Cpu,

    pub cartridge: Cartridge,

    pub wram: Memory,
    pub hram: Memory,

    pub ppu: Ppu,
    pub apu: Apu,
    pub(crate) timer: Timer,
    pub(crate) serial: SerialPort,

    pub(crate) interrupt_controller: InterruptController,
    pub(crate) input_controller: InputController,

    /// A running OAM DMA transfer, if any.
    pub(crate) oam_dma: Option<OamDma>,

    /// The EI instruction enables interrupts only after the following
    /// instruction has finished; this carries the request across that one
    /// instruction.
    pub(crate) ei_pending: bool,

    /// The CPU is parked in HALT until an enabled interrupt is requested.
    pub halted: bool,

    /// Set when HALT is executed with IME off while an interrupt is
    /// already pending: the next opcode byte is then fetched twice.
    pub(crate) halt_bug: bool,

    /// The CPU is parked in STOP. Simplified to the same wake rules as
    /// HALT.
    pub stopped: bool,

    /// Total T-cycles since power on. Only ever increases.
    pub cycle_counter: u64,
}

impl Machine {
    pub(crate) fn new(cartridge: Cartridge) -> Self {
        Self {
            cpu: Cpu::new(),
            cartridge,
            wram: Memory::zeroed(Word::new(0x2000)),
            hram: Memory::zeroed(Word::new(0x7f)),
            ppu: Ppu::new(),
            apu: Apu::new(),
            timer: Timer::new(),
            serial: SerialPort::new(),
            interrupt_controller: InterruptController::new(),
            input_controller: InputController::new(),
            oam_dma: None,
            ei_pending: false,
            halted: false,
            halt_bug: false,
            stopped: false,
            cycle_counter: 0,
        }
    }

    /// Read access to IE/IF/IME.
    pub fn interrupt_controller(&self) -> &InterruptController {
        &self.interrupt_controller
    }

    /// Runs every peripheral for the cycles one CPU step took: timer,
    /// serial, OAM DMA, PPU, APU and the cartridge clock.
    pub(crate) fn tick_peripherals(&mut self, cycles: u32) {
        self.timer.tick(cycles, &mut self.interrupt_controller);
        self.serial.tick(cycles, &mut self.interrupt_controller);
        self.dma_tick(cycles);
        self.ppu.tick(cycles, &mut self.interrupt_controller);
        self.apu.tick(cycles);
        self.cartridge.mbc.tick(cycles as u64);
    }

    /// Convenience method to load the value stored behind the address in
    /// HL.
    pub fn load_hl(&self) -> Byte {
        self.load_byte(self.cpu.hl())
    }

    /// Convenience method to store a value to the address in HL.
    pub(crate) fn store_hl(&mut self, byte: Byte) {
        self.store_byte(self.cpu.hl(), byte);
    }

    /// Pushes the given word onto the stack.
    pub(crate) fn push(&mut self, word: Word) {
        self.cpu.sp -= 2u16;
        self.store_word(self.cpu.sp, word);
    }

    /// Pops the topmost word from the stack and returns it.
    pub(crate) fn pop(&mut self) -> Word {
        let val = self.load_word(self.cpu.sp);
        self.cpu.sp += 2u16;
        val
    }
}
