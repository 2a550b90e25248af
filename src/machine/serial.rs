use crate::{
    log::*,
    machine::interrupt::{Interrupt, InterruptController},
    primitives::{Byte, Word},
};


/// T-cycles per byte at the normal 8192 Hz transfer clock.
const TRANSFER_CYCLES: u32 = 4096;

/// The serial port, implemented as a sink.
///
/// There is no link cable peer: every transmitted byte is captured into an
/// output queue (test ROMs report their results this way) and echoed to the
/// `serial` log target once a full line has accumulated. The incoming byte
/// is always `0xFF`, which is exactly what a disconnected cable reads as.
pub(crate) struct SerialPort {
    /// SB (`0xFF01`).
    data: Byte,

    /// SC (`0xFF02`): bit 7 transfer in progress, bit 0 clock select.
    control: Byte,

    /// T-cycles until the running transfer completes.
    countdown: Option<u32>,

    /// Completes transfers on the next tick instead of after the real
    /// 4096 cycle delay.
    immediate: bool,

    /// Every byte ever transmitted, in order.
    output: Vec<u8>,

    /// Bytes of the current, not yet flushed console line.
    line: String,
}

impl SerialPort {
    pub(crate) fn new() -> Self {
        SerialPort {
            data: Byte::zero(),
            control: Byte::new(0x7e),
            countdown: None,
            immediate: false,
            output: Vec::new(),
            line: String::new(),
        }
    }

    /// Loads SB or SC.
    pub(crate) fn load_byte(&self, addr: Word) -> Byte {
        match addr.get() {
            0xff01 => self.data,
            // The unused middle bits read 1.
            0xff02 => self.control.map(|b| b | 0b0111_1110),
            _ => unreachable!("serial register {}", addr),
        }
    }

    /// Writes SB or SC. Setting SC bit 7 together with bit 0 (internal
    /// clock) starts a transfer; without bit 0 there is no peer to drive
    /// the clock, so the transfer never finishes.
    pub(crate) fn store_byte(&mut self, addr: Word, byte: Byte) {
        match addr.get() {
            0xff01 => self.data = byte,
            0xff02 => {
                self.control = byte;
                if byte.bit(7) && byte.bit(0) {
                    self.countdown = Some(if self.immediate { 0 } else { TRANSFER_CYCLES });
                } else {
                    self.countdown = None;
                }
            }
            _ => unreachable!("serial register {}", addr),
        }
    }

    /// Advances a running transfer by the given number of T-cycles.
    pub(crate) fn tick(&mut self, cycles: u32, interrupt_controller: &mut InterruptController) {
        let Some(left) = &mut self.countdown else { return };

        if *left > cycles {
            *left -= cycles;
            return;
        }

        self.countdown = None;
        self.push_output(self.data.get());

        // The shifted-in byte from the nonexistent peer is all ones.
        self.data = Byte::new(0xff);
        self.control &= Byte::new(0x7f);
        interrupt_controller.request(Interrupt::Serial);
    }

    /// Completes future transfers without the 4096 cycle delay. Handy for
    /// hosts that just want console output as fast as possible.
    pub(crate) fn set_immediate(&mut self, immediate: bool) {
        self.immediate = immediate;
    }

    /// All bytes transmitted so far.
    pub(crate) fn output(&self) -> &[u8] {
        &self.output
    }

    /// Hands out the transmitted bytes and clears the queue.
    pub(crate) fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    fn push_output(&mut self, byte: u8) {
        self.output.push(byte);

        // Console convention: NUL, LF and CR all terminate a line.
        match byte {
            0x00 | 0x0a | 0x0d => self.flush_line(),
            _ => self.line.push(byte as char),
        }
    }

    fn flush_line(&mut self) {
        if !self.line.is_empty() {
            info!(target: "serial", "{}", self.line);
            self.line.clear();
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn transmit(serial: &mut SerialPort, ic: &mut InterruptController, byte: u8) {
        serial.store_byte(Word::new(0xff01), Byte::new(byte));
        serial.store_byte(Word::new(0xff02), Byte::new(0x81));
        serial.tick(TRANSFER_CYCLES, ic);
    }

    #[test]
    fn test_transfer_completion() {
        let mut serial = SerialPort::new();
        let mut ic = InterruptController::new();
        ic.store_if(Byte::zero());

        serial.store_byte(Word::new(0xff01), Byte::new(0x42));
        serial.store_byte(Word::new(0xff02), Byte::new(0x81));

        serial.tick(TRANSFER_CYCLES - 1, &mut ic);
        assert_eq!(serial.load_byte(Word::new(0xff02)), 0xff);
        assert!(ic.load_if().get() & 0b1000 == 0);

        serial.tick(1, &mut ic);
        assert_eq!(serial.load_byte(Word::new(0xff02)), 0x7f);
        assert_eq!(serial.load_byte(Word::new(0xff01)), 0xff);
        assert!(ic.load_if().get() & 0b1000 != 0);
        assert_eq!(serial.output(), &[0x42]);
    }

    #[test]
    fn test_external_clock_never_completes() {
        let mut serial = SerialPort::new();
        let mut ic = InterruptController::new();
        ic.store_if(Byte::zero());

        serial.store_byte(Word::new(0xff01), Byte::new(0x42));
        serial.store_byte(Word::new(0xff02), Byte::new(0x80));
        serial.tick(TRANSFER_CYCLES * 4, &mut ic);

        assert_eq!(serial.load_byte(Word::new(0xff02)), 0xff);
        assert!(serial.output().is_empty());
    }

    #[test]
    fn test_take_output() {
        let mut serial = SerialPort::new();
        let mut ic = InterruptController::new();
        ic.store_if(Byte::zero());

        for b in *b"ok\n" {
            transmit(&mut serial, &mut ic, b);
        }

        assert_eq!(serial.take_output(), b"ok\n".to_vec());
        assert!(serial.output().is_empty());
    }
}
