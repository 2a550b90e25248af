//! A cycle accurate emulator core for the original Game Boy (DMG).
//!
//! The crate exposes a single [`Emulator`] facade: feed it a ROM image,
//! call [`Emulator::run_until_frame`] in your render loop and read the
//! finished frame, push key events in, pull audio samples out. Everything
//! else (window, CLI, key mapping, sound device) is the host's job.
//!
//! The core is strictly single threaded and deterministic: the same ROM
//! with the same key event timing produces bitwise identical frames on
//! every platform.

use std::{fs, path::Path};

use crate::{
    cartridge::Cartridge,
    log::*,
    machine::Machine,
};

pub use crate::{
    error::Error,
    machine::input::JoypadKey,
    machine::ppu::{Frame, Mode},
};


pub mod cartridge;
pub mod error;
pub mod instr;
pub mod log;
pub mod machine;
mod mbc;
pub mod primitives;


/// Width of the Game Boy screen in pixels.
pub const SCREEN_WIDTH: usize = 160;

/// Height of the Game Boy screen in pixels.
pub const SCREEN_HEIGHT: usize = 144;

/// The master clock in T-cycles per second.
pub const CLOCK_RATE: u64 = 4_194_304;

/// T-cycles per frame: 154 scanlines of 456 cycles each.
pub const CYCLES_PER_FRAME: u64 = 70_224;


/// The emulator: a [`Machine`] plus the host facing conveniences (frame
/// pacing, pause state, battery RAM access).
pub struct Emulator {
    machine: Machine,

    /// T-cycles already run towards the next frame boundary. Instructions
    /// do not align with frames, so the overshoot carries over.
    frame_progress: u64,

    paused: bool,

    /// Once the CPU hits an illegal opcode it is locked for good; every
    /// further run attempt reports the same error.
    locked: Option<(u16, u8)>,
}

impl Emulator {
    /// Builds an emulator from a raw ROM image (the first 0x150 bytes
    /// must be the standard cartridge header).
    pub fn new_with_rom(bytes: &[u8]) -> Result<Self, Error> {
        let cartridge = Cartridge::from_bytes(bytes)?;
        info!("creating emulator for {:?}", cartridge.title());

        Ok(Self {
            machine: Machine::new(cartridge),
            frame_progress: 0,
            paused: false,
            locked: None,
        })
    }

    /// The machine behind the facade, for debuggers and tests that want
    /// to poke at registers and memory directly.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Mutable access to the machine. Debugger frontends use this to
    /// patch memory or registers; anything written here is visible to
    /// the guest immediately.
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    /// Runs the machine for exactly one frame worth of T-cycles
    /// ([`CYCLES_PER_FRAME`], modulo one instruction of jitter that is
    /// carried into the next frame). Does nothing while paused.
    pub fn run_until_frame(&mut self) -> Result<(), Error> {
        if self.paused {
            return Ok(());
        }

        self.run_one_frame()
    }

    /// The most recently rendered frame.
    pub fn current_frame(&self) -> &Frame {
        self.machine.ppu.frame()
    }

    /// A key went down on the host side.
    pub fn press(&mut self, key: JoypadKey) {
        self.machine
            .input_controller
            .press(key, &mut self.machine.interrupt_controller);
    }

    /// A key came back up on the host side.
    pub fn release(&mut self, key: JoypadKey) {
        self.machine.input_controller.release(key);
    }

    /// Takes up to `n` mono audio samples at
    /// [`machine::apu::SAMPLE_RATE`] out of the ring buffer.
    pub fn pull_audio_samples(&mut self, n: usize) -> Vec<i16> {
        self.machine.apu.pull_samples(n)
    }

    /// Mutes or unmutes one of the four channels (1..=4) in the host
    /// output. The guest visible channel state is unaffected.
    pub fn set_audio_channel_enabled(&mut self, channel: u8, enabled: bool) {
        assert!((1..=4).contains(&channel), "channel must be 1..=4");
        self.machine.apu.set_channel_enabled(channel as usize - 1, enabled);
    }

    /// Unmutes the given channel (1..=4) and mutes the other three.
    pub fn solo_channel(&mut self, channel: u8) {
        assert!((1..=4).contains(&channel), "channel must be 1..=4");
        self.machine.apu.solo_channel(channel as usize - 1);
    }

    /// Whether each of the four channels is currently active from the
    /// guest's point of view (the NR52 status bits).
    pub fn channel_status(&self) -> (bool, bool, bool, bool) {
        self.machine.apu.channel_status()
    }

    /// Pauses the emulation: [`Emulator::run_until_frame`] becomes a no
    /// op until [`Emulator::resume`]. Single stepping still works.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Executes a single CPU step (instruction, interrupt dispatch or
    /// HALT idle tick), regardless of the pause state.
    pub fn step_instruction(&mut self) -> Result<(), Error> {
        self.step_cpu()?;
        Ok(())
    }

    /// Runs exactly one frame, regardless of the pause state.
    pub fn step_frame(&mut self) -> Result<(), Error> {
        self.run_one_frame()
    }

    /// A consistent snapshot of the machine for debugger frontends.
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let cpu = &self.machine.cpu;
        let pc = cpu.pc.get();

        // 64 bytes of bus content around PC.
        let window_start = pc.saturating_sub(16);
        let memory_window = (0..64)
            .map(|i| {
                self.machine
                    .load_byte(primitives::Word::new(window_start.wrapping_add(i)))
                    .get()
            })
            .collect();

        let mut oam = [0u8; 160];
        for (i, byte) in self.machine.ppu.oam.as_slice().iter().enumerate() {
            oam[i] = byte.get();
        }

        let vram_tiles = self.machine.ppu.vram.as_slice()[..0x1800]
            .iter()
            .map(|b| b.get())
            .collect();

        let ic = self.machine.interrupt_controller();
        DebugSnapshot {
            a: cpu.a.get(),
            f: cpu.f.get(),
            b: cpu.b.get(),
            c: cpu.c.get(),
            d: cpu.d.get(),
            e: cpu.e.get(),
            h: cpu.h.get(),
            l: cpu.l.get(),
            sp: cpu.sp.get(),
            pc,
            cycle_counter: self.machine.cycle_counter,
            interrupt_enable: ic.interrupt_enable.get(),
            interrupt_flag: ic.load_if().get(),
            ime: ic.ime,
            memory_window_start: window_start,
            memory_window,
            oam,
            vram_tiles,
        }
    }

    /// The external RAM contents in cartridge address order, for battery
    /// backed save files.
    pub fn save_external_ram(&self) -> Vec<u8> {
        self.machine.cartridge.mbc.ram().iter().map(|b| b.get()).collect()
    }

    /// Restores a previously saved external RAM image.
    pub fn load_external_ram(&mut self, bytes: &[u8]) {
        self.machine.cartridge.mbc.restore_ram(bytes);
    }

    /// Writes the external RAM to a file.
    pub fn save_external_ram_to(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, self.save_external_ram())?;
        Ok(())
    }

    /// Loads the external RAM from a file.
    pub fn load_external_ram_from(&mut self, path: &Path) -> Result<(), Error> {
        let bytes = fs::read(path)?;
        self.load_external_ram(&bytes);
        Ok(())
    }

    /// Every byte the guest has transmitted over the serial port. Test
    /// ROMs report their results here.
    pub fn serial_output(&self) -> &[u8] {
        self.machine.serial.output()
    }

    /// Hands out the transmitted serial bytes and clears the queue.
    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.machine.serial.take_output()
    }

    /// Completes serial transfers on the next tick instead of after the
    /// hardware's 4096 cycle delay.
    pub fn set_serial_transfer_immediate(&mut self, immediate: bool) {
        self.machine.serial.set_immediate(immediate);
    }

    /// The cartridge title from the ROM header.
    pub fn title(&self) -> &str {
        self.machine.cartridge.title()
    }

    /// Whether the cartridge has battery backed RAM worth persisting.
    pub fn has_battery(&self) -> bool {
        self.machine.cartridge.has_battery()
    }

    fn run_one_frame(&mut self) -> Result<(), Error> {
        while self.frame_progress < CYCLES_PER_FRAME {
            self.frame_progress += self.step_cpu()? as u64;
        }
        self.frame_progress -= CYCLES_PER_FRAME;

        Ok(())
    }

    /// One CPU step plus the same amount of time for every peripheral.
    fn step_cpu(&mut self) -> Result<u32, Error> {
        if let Some((addr, opcode)) = self.locked {
            return Err(Error::IllegalOpcode { addr, opcode });
        }

        let cycles = match self.machine.step() {
            Ok(cycles) => cycles,
            Err(err) => {
                if let Error::IllegalOpcode { addr, opcode } = err {
                    error!("CPU locked up: opcode {opcode:#04x} at {addr:#06x}");
                    self.locked = Some((addr, opcode));
                }
                return Err(err);
            }
        };

        self.machine.tick_peripherals(cycles);
        Ok(cycles)
    }
}

/// The register and memory state handed to debugger frontends.
pub struct DebugSnapshot {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub cycle_counter: u64,

    pub interrupt_enable: u8,
    pub interrupt_flag: u8,
    pub ime: bool,

    /// Bus address of `memory_window[0]`.
    pub memory_window_start: u16,

    /// 64 bytes of bus content around PC.
    pub memory_window: Vec<u8>,

    pub oam: [u8; 160],

    /// The tile data half of VRAM (`0x8000..0x9800`).
    pub vram_tiles: Vec<u8>,
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::primitives::Word;


    /// A 32 KiB image that spins in a tight `JR -2` loop at the entry
    /// point.
    fn looping_rom(cartridge_type: u8, ram_size: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0100] = 0x18;
        rom[0x0101] = 0xfe;
        rom[0x0134..0x0138].copy_from_slice(b"LOOP");
        rom[0x0147] = cartridge_type;
        rom[0x0149] = ram_size;

        let checksum = rom[0x0134..=0x014c]
            .iter()
            .fold(0u8, |sum, b| sum.wrapping_sub(*b).wrapping_sub(1));
        rom[0x014d] = checksum;

        rom
    }

    #[test]
    fn test_frame_advances_one_frame_of_cycles() {
        let mut emulator = Emulator::new_with_rom(&looping_rom(0x00, 0x00)).unwrap();

        emulator.run_until_frame().unwrap();
        let after_one = emulator.machine().cycle_counter;
        assert!((CYCLES_PER_FRAME..CYCLES_PER_FRAME + 24).contains(&after_one));

        emulator.run_until_frame().unwrap();
        let after_two = emulator.machine().cycle_counter;
        assert!((2 * CYCLES_PER_FRAME..2 * CYCLES_PER_FRAME + 24).contains(&after_two));
    }

    #[test]
    fn test_deterministic_frames() {
        let rom = looping_rom(0x00, 0x00);
        let mut a = Emulator::new_with_rom(&rom).unwrap();
        let mut b = Emulator::new_with_rom(&rom).unwrap();

        for _ in 0..3 {
            a.run_until_frame().unwrap();
            b.run_until_frame().unwrap();
        }

        for y in 0..SCREEN_HEIGHT {
            assert_eq!(a.current_frame().line(y), b.current_frame().line(y));
        }
        assert_eq!(a.machine().cycle_counter, b.machine().cycle_counter);
    }

    #[test]
    fn test_joypad_reads_through_register() {
        let mut emulator = Emulator::new_with_rom(&looping_rom(0x00, 0x00)).unwrap();

        emulator.press(JoypadKey::Start);
        emulator.run_until_frame().unwrap();
        emulator.run_until_frame().unwrap();

        // Select the action row and check the Start line (bit 3) is low.
        emulator
            .machine_mut()
            .store_byte(Word::new(0xff00), primitives::Byte::new(0b0001_0000));
        let held = emulator.machine().load_byte(Word::new(0xff00));
        assert_eq!(held.get() & 0x0f, 0b0111);

        emulator.release(JoypadKey::Start);
        let released = emulator.machine().load_byte(Word::new(0xff00));
        assert_eq!(released.get() & 0x0f, 0b1111);
    }

    #[test]
    fn test_pause_gates_the_frame_loop() {
        let mut emulator = Emulator::new_with_rom(&looping_rom(0x00, 0x00)).unwrap();

        emulator.pause();
        emulator.run_until_frame().unwrap();
        assert_eq!(emulator.machine().cycle_counter, 0);

        // Single stepping works while paused.
        emulator.step_instruction().unwrap();
        assert_eq!(emulator.machine().cycle_counter, 12);

        emulator.step_frame().unwrap();
        assert!(emulator.machine().cycle_counter >= CYCLES_PER_FRAME);

        emulator.resume();
        emulator.run_until_frame().unwrap();
        assert!(emulator.machine().cycle_counter >= 2 * CYCLES_PER_FRAME);
    }

    #[test]
    fn test_illegal_opcode_locks_the_emulator() {
        let mut rom = looping_rom(0x00, 0x00);
        rom[0x0100] = 0xdd;
        rom[0x0101] = 0x00;
        // Patching code invalidates the checksum, which is informative
        // only.
        let mut emulator = Emulator::new_with_rom(&rom).unwrap();

        assert!(matches!(
            emulator.run_until_frame(),
            Err(Error::IllegalOpcode { addr: 0x0100, opcode: 0xdd }),
        ));
        assert!(matches!(
            emulator.run_until_frame(),
            Err(Error::IllegalOpcode { addr: 0x0100, opcode: 0xdd }),
        ));
    }

    #[test]
    fn test_battery_ram_roundtrip() {
        // MBC1 with battery backed 32 KiB RAM.
        let mut emulator = Emulator::new_with_rom(&looping_rom(0x03, 0x03)).unwrap();
        assert!(emulator.has_battery());

        let mut image = vec![0u8; 4 * 0x2000];
        image[0] = 0xaa;
        image[0x2000] = 0xbb;
        emulator.load_external_ram(&image);

        assert_eq!(emulator.save_external_ram(), image);
    }

    #[test]
    fn test_serial_console_capture() {
        // LD A, 'H'; LDH (0x01), A; LD A, 0x81; LDH (0x02), A; JR -2
        let mut rom = looping_rom(0x00, 0x00);
        rom[0x0100..0x010a].copy_from_slice(&[
            0x3e, 0x48, 0xe0, 0x01, 0x3e, 0x81, 0xe0, 0x02, 0x18, 0xfe,
        ]);

        let mut emulator = Emulator::new_with_rom(&rom).unwrap();
        emulator.run_until_frame().unwrap();

        assert_eq!(emulator.serial_output(), b"H");
        assert_eq!(emulator.take_serial_output(), b"H".to_vec());
        assert!(emulator.serial_output().is_empty());

        // The transfer completion raised the serial interrupt.
        assert!(emulator.machine().interrupt_controller().load_if().bit(3));
    }

    #[test]
    fn test_debug_snapshot() {
        let mut emulator = Emulator::new_with_rom(&looping_rom(0x00, 0x00)).unwrap();
        emulator.step_instruction().unwrap();

        let snapshot = emulator.debug_snapshot();
        assert_eq!(snapshot.pc, 0x0100);
        assert_eq!(snapshot.sp, 0xfffe);
        assert_eq!(snapshot.a, 0x01);
        assert_eq!(snapshot.memory_window.len(), 64);
        assert_eq!(snapshot.vram_tiles.len(), 0x1800);

        // The memory window contains the loop instruction.
        let offset = (0x0100 - snapshot.memory_window_start) as usize;
        assert_eq!(snapshot.memory_window[offset], 0x18);
        assert_eq!(snapshot.memory_window[offset + 1], 0xfe);
    }
}
