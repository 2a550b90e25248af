use bit_field::BitField;

use crate::{
    machine::interrupt::{Interrupt, InterruptController},
    primitives::Byte,
};


/// Manages the joypad state behind the P1 register (`0xFF00`).
///
/// The eight buttons form a 2x4 matrix: the select bits 5 (action buttons)
/// and 4 (direction pad) choose a row, and the selected row's keys show up
/// in the low nybble, active low. The register value is computed on every
/// read, so the CPU always sees the current key state.
pub(crate) struct InputController {
    /// Bits 4 and 5 as last written by the guest (stored active low, like
    /// the register itself).
    select: Byte,

    /// Currently held keys.
    pressed: Keys,
}

impl InputController {
    /// Creates an instance with no buttons pressed and no row selected.
    pub(crate) fn new() -> Self {
        Self {
            select: Byte::new(0x30),
            pressed: Keys::none(),
        }
    }

    /// Computes the P1 value. Bits 6 and 7 always read 1.
    pub(crate) fn load_register(&self) -> Byte {
        Byte::new(0b1100_0000 | self.select.get() | self.selected_row())
    }

    /// Stores to P1. Only the two select bits are writable.
    pub(crate) fn store_register(&mut self, byte: Byte) {
        self.select = byte.map(|b| b & 0b0011_0000);
    }

    /// A key was pressed on the host side. Pulls the matching matrix line
    /// low and requests the joypad interrupt on the falling edge, if the
    /// key's row is currently selected.
    pub(crate) fn press(
        &mut self,
        key: JoypadKey,
        interrupt_controller: &mut InterruptController,
    ) {
        let before = self.selected_row();
        self.pressed = self.pressed.set_key(key, true);
        let after = self.selected_row();

        // Active low: a freshly cleared bit is a falling edge.
        if before & !after != 0 {
            interrupt_controller.request(Interrupt::Joypad);
        }
    }

    /// A key was released on the host side.
    pub(crate) fn release(&mut self, key: JoypadKey) {
        self.pressed = self.pressed.set_key(key, false);
    }

    /// The low nybble of P1 for the current row selection (active low).
    /// With both rows selected the lines are wired together.
    fn selected_row(&self) -> u8 {
        let mut keys = 0;
        if !self.select.bit(5) {
            keys |= self.pressed.action_keys();
        }
        if !self.select.bit(4) {
            keys |= self.pressed.direction_keys();
        }

        !keys & 0x0f
    }
}

/// The set of currently held buttons, one bit per key (1 = pressed):
/// - 0: A (LSB)
/// - 1: B
/// - 2: Select
/// - 3: Start
/// - 4: Right
/// - 5: Left
/// - 6: Up
/// - 7: Down (MSB)
#[derive(Clone, Copy, Debug)]
pub struct Keys(u8);

impl Keys {
    /// Creates an instance with no buttons pressed.
    pub fn none() -> Self {
        Keys(0x00)
    }

    /// Sets the given key in this instance to the given state.
    pub fn set_key(mut self, key: JoypadKey, is_pressed: bool) -> Self {
        let bit = match key {
            JoypadKey::A => 0,
            JoypadKey::B => 1,
            JoypadKey::Select => 2,
            JoypadKey::Start => 3,
            JoypadKey::Right => 4,
            JoypadKey::Left => 5,
            JoypadKey::Up => 6,
            JoypadKey::Down => 7,
        };
        self.0.set_bit(bit, is_pressed);
        self
    }

    /// Returns the action buttons in the low nybble (the high nybble is 0).
    pub(crate) fn action_keys(&self) -> u8 {
        self.0 & 0x0f
    }

    /// Returns the direction keys in the low nybble (the high nybble is 0).
    pub(crate) fn direction_keys(&self) -> u8 {
        (self.0 >> 4) & 0x0f
    }
}

/// A key on the Game Boy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoypadKey {
    A,
    B,
    Start,
    Select,
    Up,
    Right,
    Down,
    Left,
}


#[cfg(test)]
mod test {
    use super::*;


    #[test]
    fn test_row_selection() {
        fn run(keys: Vec<JoypadKey>, select: u8) -> u8 {
            let mut input = InputController::new();
            let mut ic = InterruptController::new();
            for key in keys {
                input.press(key, &mut ic);
            }
            input.store_register(Byte::new(select));
            input.load_register().get()
        }

        // No row selected: everything reads released.
        assert_eq!(run(vec![], 0b0011_0000), 0b1111_1111);
        assert_eq!(run(vec![JoypadKey::A], 0b0011_0000), 0b1111_1111);

        // Action row (bit 5 low).
        assert_eq!(run(vec![], 0b0001_0000), 0b1101_1111);
        assert_eq!(run(vec![JoypadKey::Left], 0b0001_0000), 0b1101_1111);
        assert_eq!(run(vec![JoypadKey::A], 0b0001_0000), 0b1101_1110);
        assert_eq!(run(vec![JoypadKey::Start, JoypadKey::Up], 0b0001_0000), 0b1101_0111);

        // Direction row (bit 4 low).
        assert_eq!(run(vec![], 0b0010_0000), 0b1110_1111);
        assert_eq!(run(vec![JoypadKey::A], 0b0010_0000), 0b1110_1111);
        assert_eq!(run(vec![JoypadKey::Left], 0b0010_0000), 0b1110_1101);
        assert_eq!(run(vec![JoypadKey::Down, JoypadKey::Right], 0b0010_0000), 0b1110_0110);

        // Both rows: lines are wired together.
        assert_eq!(run(vec![JoypadKey::A, JoypadKey::Up], 0b0000_0000), 0b1100_1010);
    }

    #[test]
    fn test_interrupt_on_falling_edge() {
        fn joypad_irq(ic: &InterruptController) -> bool {
            ic.load_if().get() & 0b1_0000 != 0
        }

        let mut input = InputController::new();
        let mut ic = InterruptController::new();
        ic.store_if(Byte::zero());

        // Row not selected: no edge on the register lines, no interrupt.
        input.store_register(Byte::new(0b0011_0000));
        input.press(JoypadKey::A, &mut ic);
        assert!(!joypad_irq(&ic));
        input.release(JoypadKey::A);

        // Selected row: the press pulls a line low.
        input.store_register(Byte::new(0b0001_0000));
        input.press(JoypadKey::A, &mut ic);
        assert!(joypad_irq(&ic));

        // Holding the key produces no further edge.
        ic.store_if(Byte::zero());
        input.press(JoypadKey::A, &mut ic);
        assert!(!joypad_irq(&ic));
    }
}
