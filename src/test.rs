//! Shared helpers for unit tests and benchmarks.

use crate::{
    cart::LOGO,
    gb::{GameBoy, Mode},
};

/// Builds a minimal but valid ROM image with the given cartridge
/// type, ROM size code and RAM size code. The entry point jumps
/// over the header into a tight spin loop so that execution never
/// runs through the header bytes.
pub fn build_rom(kind: u8, rom_size: u8, ram_size: u8) -> Vec<u8> {
    let mut data = vec![0x00_u8; 0x8000_usize << rom_size];

    // entry code: NOP followed by a jump over the header
    data[0x0100] = 0x00;
    data[0x0101] = 0xc3;
    data[0x0102] = 0x50;
    data[0x0103] = 0x01;

    // spin loop (JR -2) at the jump target
    data[0x0150] = 0x18;
    data[0x0151] = 0xfe;

    data[0x0104..0x0134].copy_from_slice(&LOGO);
    data[0x0134..0x0138].copy_from_slice(b"TEST");
    data[0x0147] = kind;
    data[0x0148] = rom_size;
    data[0x0149] = ram_size;

    fix_checksum(data)
}

/// Recomputes the header checksum of the provided image, to be
/// used after patching header bytes.
pub fn fix_checksum(mut data: Vec<u8>) -> Vec<u8> {
    let mut checksum: u8 = 0;
    for byte in &data[0x0134..=0x014c] {
        checksum = checksum.wrapping_sub(*byte).wrapping_sub(1);
    }
    data[0x014d] = checksum;
    data
}

#[derive(Default)]
pub struct TestOptions {
    pub mode: Option<Mode>,
    pub ppu_enabled: Option<bool>,
    pub timer_enabled: Option<bool>,
}

/// Builds an emulator with a plain test cartridge loaded and the
/// requested components enabled.
pub fn build_test(options: TestOptions) -> GameBoy {
    let mut gb = GameBoy::new(options.mode);
    gb.set_ppu_enabled(options.ppu_enabled.unwrap_or(true));
    gb.set_timer_enabled(options.timer_enabled.unwrap_or(true));
    gb.load(&build_rom(0x00, 0x00, 0x00)).unwrap();
    gb
}

#[cfg(test)]
mod tests {
    use super::{build_rom, build_test, TestOptions};

    #[test]
    fn test_build_rom_is_loadable() {
        let gb = build_test(TestOptions::default());
        assert_eq!(gb.cart_i().title(), "TEST");
        assert!(gb.cart_i().valid_checksum());
    }

    #[test]
    fn test_build_rom_sizes() {
        assert_eq!(build_rom(0x00, 0x00, 0x00).len(), 0x8000);
        assert_eq!(build_rom(0x00, 0x02, 0x00).len(), 0x20000);
    }
}
