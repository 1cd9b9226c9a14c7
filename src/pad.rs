//! Joypad functions and structures.

use crate::{consts::P1_ADDR, warnln};

/// The set of physical keys available on the machine, to be
/// used by the host driver when forwarding input events.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PadKey {
    Up,
    Down,
    Left,
    Right,
    Start,
    Select,
    A,
    B,
}

impl PadKey {
    pub fn is_direction(&self) -> bool {
        matches!(
            self,
            PadKey::Up | PadKey::Down | PadKey::Left | PadKey::Right
        )
    }
}

pub struct Pad {
    down: bool,
    up: bool,
    left: bool,
    right: bool,
    start: bool,
    select: bool,
    b: bool,
    a: bool,
    select_direction: bool,
    select_action: bool,
    int_pad: bool,
}

impl Pad {
    pub fn new() -> Self {
        Self {
            down: false,
            up: false,
            left: false,
            right: false,
            start: false,
            select: false,
            b: false,
            a: false,
            select_direction: false,
            select_action: false,
            int_pad: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            P1_ADDR => {
                // pressed keys pull the polled lines low
                let mut value = 0x0f;
                if self.select_direction {
                    value &= !((self.right as u8)
                        | ((self.left as u8) << 1)
                        | ((self.up as u8) << 2)
                        | ((self.down as u8) << 3));
                }
                if self.select_action {
                    value &= !((self.a as u8)
                        | ((self.b as u8) << 1)
                        | ((self.select as u8) << 2)
                        | ((self.start as u8) << 3));
                }
                value |= if self.select_direction { 0x00 } else { 0x10 };
                value |= if self.select_action { 0x00 } else { 0x20 };
                value | 0xc0
            }
            _ => {
                warnln!("Reading from unknown Pad location 0x{:04x}", addr);
                0x00
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            P1_ADDR => {
                self.select_direction = value & 0x10 == 0x00;
                self.select_action = value & 0x20 == 0x00;
            }
            _ => warnln!("Writing to unknown Pad location 0x{:04x}", addr),
        }
    }

    pub fn key_press(&mut self, key: PadKey) {
        match key {
            PadKey::Up => self.up = true,
            PadKey::Down => self.down = true,
            PadKey::Left => self.left = true,
            PadKey::Right => self.right = true,
            PadKey::Start => self.start = true,
            PadKey::Select => self.select = true,
            PadKey::A => self.a = true,
            PadKey::B => self.b = true,
        }

        // a high-to-low transition on a polled line requests
        // the joypad interrupt
        if (key.is_direction() && self.select_direction)
            || (!key.is_direction() && self.select_action)
        {
            self.int_pad = true;
        }
    }

    pub fn key_release(&mut self, key: PadKey) {
        match key {
            PadKey::Up => self.up = false,
            PadKey::Down => self.down = false,
            PadKey::Left => self.left = false,
            PadKey::Right => self.right = false,
            PadKey::Start => self.start = false,
            PadKey::Select => self.select = false,
            PadKey::A => self.a = false,
            PadKey::B => self.b = false,
        }
    }

    #[inline(always)]
    pub fn int_pad(&self) -> bool {
        self.int_pad
    }

    #[inline(always)]
    pub fn set_int_pad(&mut self, value: bool) {
        self.int_pad = value;
    }

    #[inline(always)]
    pub fn ack_pad(&mut self) {
        self.set_int_pad(false);
    }
}

impl Default for Pad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::consts::P1_ADDR;

    use super::{Pad, PadKey};

    #[test]
    fn test_idle_reads_high() {
        let pad = Pad::new();
        assert_eq!(pad.read(P1_ADDR) & 0x0f, 0x0f);
    }

    #[test]
    fn test_direction_selection() {
        let mut pad = Pad::new();
        pad.key_press(PadKey::Left);
        pad.key_press(PadKey::A);

        // only the direction group is polled, A stays invisible
        pad.write(P1_ADDR, 0x20);
        assert_eq!(pad.read(P1_ADDR) & 0x0f, 0x0d);

        pad.write(P1_ADDR, 0x10);
        assert_eq!(pad.read(P1_ADDR) & 0x0f, 0x0e);
    }

    #[test]
    fn test_release_restores_line() {
        let mut pad = Pad::new();
        pad.write(P1_ADDR, 0x20);
        pad.key_press(PadKey::Down);
        assert_eq!(pad.read(P1_ADDR) & 0x0f, 0x07);
        pad.key_release(PadKey::Down);
        assert_eq!(pad.read(P1_ADDR) & 0x0f, 0x0f);
    }

    #[test]
    fn test_interrupt_on_polled_press() {
        let mut pad = Pad::new();
        pad.write(P1_ADDR, 0x20);

        // action keys are not polled, no interrupt
        pad.key_press(PadKey::A);
        assert!(!pad.int_pad());

        pad.key_press(PadKey::Up);
        assert!(pad.int_pad());

        pad.ack_pad();
        assert!(!pad.int_pad());
    }
}
