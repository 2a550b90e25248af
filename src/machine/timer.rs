use crate::{
    machine::interrupt::{Interrupt, InterruptController},
    primitives::{Byte, Word},
};


/// Manages the four timer registers and raises the timer interrupt.
///
/// DIV and TIMA are both views of a single 16 bit counter that increments
/// every T-cycle: DIV is its upper byte, and TIMA increments whenever the
/// bit selected by TAC *falls*. Modelling it that way (instead of counting
/// cycles per register) gives all the documented quirks for free: resetting
/// DIV or reconfiguring TAC can produce a spurious falling edge and tick
/// TIMA immediately.
pub(crate) struct Timer {
    /// The internal 16 bit counter. DIV (`0xFF04`) reads its upper byte.
    divider: u16,

    /// TIMA (`0xFF05`).
    counter: Byte,

    /// TMA (`0xFF06`): reload value for TIMA overflows.
    modulo: Byte,

    /// TAC (`0xFF07`): bit 2 enables TIMA, bits 1 & 0 select the speed.
    control: Byte,

    /// T-cycles left until an overflowed TIMA is reloaded from TMA. During
    /// this window TIMA reads 0 and a write can still cancel the reload.
    overflow_in: Option<u8>,

    /// T-cycles left in the reload slot itself. While this runs, TIMA
    /// writes are ignored and TMA writes fall through into TIMA.
    reloading: u8,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Timer {
            // DIV is mid-count when control reaches a cartridge entry
            // point.
            divider: 0xabcc,
            counter: Byte::zero(),
            modulo: Byte::zero(),
            control: Byte::new(0xf8),
            overflow_in: None,
            reloading: 0,
        }
    }

    /// Loads one of the timer registers. `addr` has to be between 0xFF04
    /// and 0xFF07 (inclusive).
    pub(crate) fn load_byte(&self, addr: Word) -> Byte {
        match addr.get() {
            0xff04 => Byte::new((self.divider >> 8) as u8),
            0xff05 => self.counter,
            0xff06 => self.modulo,
            0xff07 => self.control.map(|b| b | 0xf8),
            _ => unreachable!("timer register {}", addr),
        }
    }

    /// Writes one of the timer registers. `addr` has to be between 0xFF04
    /// and 0xFF07 (inclusive).
    pub(crate) fn store_byte(&mut self, addr: Word, byte: Byte) {
        match addr.get() {
            0xff04 => {
                // Any write clears the whole counter. If the selected bit
                // was high, that is a falling edge.
                if self.enabled() && self.selected_bit() {
                    self.increment_counter();
                }
                self.divider = 0;
            }
            0xff05 => {
                if self.reloading == 0 {
                    self.counter = byte;
                    // A write inside the overflow window cancels the
                    // reload (and the interrupt).
                    self.overflow_in = None;
                }
            }
            0xff06 => {
                self.modulo = byte;
                if self.reloading > 0 {
                    self.counter = byte;
                }
            }
            0xff07 => {
                let old_signal = self.enabled() && self.selected_bit();
                self.control = byte.map(|b| b & 0b111);
                let new_signal = self.enabled() && self.selected_bit();

                if old_signal && !new_signal {
                    self.increment_counter();
                }
            }
            _ => unreachable!("timer register {}", addr),
        }
    }

    /// Advances the timer by the given number of T-cycles.
    pub(crate) fn tick(&mut self, cycles: u32, interrupt_controller: &mut InterruptController) {
        for _ in 0..cycles {
            if self.reloading > 0 {
                self.reloading -= 1;
            }

            if let Some(left) = &mut self.overflow_in {
                *left -= 1;
                if *left == 0 {
                    self.overflow_in = None;
                    self.counter = self.modulo;
                    self.reloading = 4;
                    interrupt_controller.request(Interrupt::Timer);
                }
            }

            let old_bit = self.selected_bit();
            self.divider = self.divider.wrapping_add(1);

            if self.enabled() && old_bit && !self.selected_bit() {
                self.increment_counter();
            }
        }
    }

    /// Resets the internal counter (STOP does this).
    pub(crate) fn reset_divider(&mut self) {
        self.divider = 0;
    }

    fn enabled(&self) -> bool {
        self.control.bit(2)
    }

    /// The divider bit whose falling edge clocks TIMA, per the TAC speed
    /// bits: 4096 Hz, 262144 Hz, 65536 Hz, 16384 Hz.
    fn selected_bit(&self) -> bool {
        let bit = match self.control.get() & 0b11 {
            0b00 => 9,
            0b01 => 3,
            0b10 => 5,
            0b11 => 7,
            _ => unreachable!(),
        };

        self.divider >> bit & 1 != 0
    }

    fn increment_counter(&mut self) {
        if self.counter == 0xff {
            // TIMA stays 0 for one machine cycle before the reload from
            // TMA happens and the interrupt fires.
            self.counter = Byte::zero();
            self.overflow_in = Some(4);
        } else {
            self.counter += 1;
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn fresh() -> (Timer, InterruptController) {
        let mut timer = Timer::new();
        timer.divider = 0;
        let mut ic = InterruptController::new();
        ic.store_if(Byte::zero());
        (timer, ic)
    }

    fn tima(timer: &Timer) -> u8 {
        timer.load_byte(Word::new(0xff05)).get()
    }

    fn timer_irq(ic: &InterruptController) -> bool {
        ic.load_if().get() & 0b100 != 0
    }

    #[test]
    fn test_div_increments_every_256_cycles() {
        let (mut timer, mut ic) = fresh();

        timer.tick(255, &mut ic);
        assert_eq!(timer.load_byte(Word::new(0xff04)), 0x00);

        timer.tick(1, &mut ic);
        assert_eq!(timer.load_byte(Word::new(0xff04)), 0x01);
    }

    #[test]
    fn test_div_write_resets_counter() {
        let (mut timer, mut ic) = fresh();
        timer.tick(0x1234, &mut ic);

        timer.store_byte(Word::new(0xff04), Byte::new(0x5a));
        assert_eq!(timer.load_byte(Word::new(0xff04)), 0x00);
    }

    #[test]
    fn test_tima_rates() {
        // TAC speed select -> T-cycles per TIMA increment.
        for (select, period) in [(0b00, 1024), (0b01, 16), (0b10, 64), (0b11, 256)] {
            let (mut timer, mut ic) = fresh();
            timer.store_byte(Word::new(0xff07), Byte::new(0b100 | select));

            timer.tick(period * 10, &mut ic);
            assert_eq!(tima(&timer), 10, "select {select:#04b}");
        }
    }

    #[test]
    fn test_disabled_timer_does_not_count() {
        let (mut timer, mut ic) = fresh();
        timer.store_byte(Word::new(0xff07), Byte::new(0b001));

        timer.tick(4096, &mut ic);
        assert_eq!(tima(&timer), 0);
    }

    #[test]
    fn test_overflow_reloads_from_tma_and_requests_interrupt() {
        let (mut timer, mut ic) = fresh();
        timer.store_byte(Word::new(0xff06), Byte::new(0x23));
        timer.store_byte(Word::new(0xff05), Byte::new(0xff));
        timer.store_byte(Word::new(0xff07), Byte::new(0b101));

        // 16 cycles reach the overflow; TIMA reads 0 during the 4 cycle
        // window, then the reload lands together with the interrupt.
        timer.tick(16, &mut ic);
        assert_eq!(tima(&timer), 0x00);
        assert!(!timer_irq(&ic));

        timer.tick(4, &mut ic);
        assert_eq!(tima(&timer), 0x23);
        assert!(timer_irq(&ic));
    }

    #[test]
    fn test_write_in_overflow_window_cancels_reload() {
        let (mut timer, mut ic) = fresh();
        timer.store_byte(Word::new(0xff06), Byte::new(0x23));
        timer.store_byte(Word::new(0xff05), Byte::new(0xff));
        timer.store_byte(Word::new(0xff07), Byte::new(0b101));

        timer.tick(17, &mut ic);
        timer.store_byte(Word::new(0xff05), Byte::new(0x80));
        timer.tick(8, &mut ic);

        assert_eq!(tima(&timer), 0x80);
        assert!(!timer_irq(&ic));
    }

    #[test]
    fn test_div_write_can_tick_tima() {
        let (mut timer, mut ic) = fresh();
        timer.store_byte(Word::new(0xff07), Byte::new(0b101));

        // Bring the selected bit (bit 3) high, then reset the divider:
        // that falling edge must count.
        timer.tick(8, &mut ic);
        timer.store_byte(Word::new(0xff04), Byte::new(0x00));
        assert_eq!(tima(&timer), 1);
    }

    #[test]
    fn test_tac_disable_can_tick_tima() {
        let (mut timer, mut ic) = fresh();
        timer.store_byte(Word::new(0xff07), Byte::new(0b101));
        timer.tick(8, &mut ic);

        timer.store_byte(Word::new(0xff07), Byte::new(0b001));
        assert_eq!(tima(&timer), 1);
    }
}
