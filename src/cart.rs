//! Cartridge related functions and structures.
//!
//! Owns the ROM image and the (optional) external RAM and implements
//! the MBC1 bank switching state machine.

use core::fmt;
use std::fmt::{Display, Formatter};

use dotmatrix_common::{error::Error, util::read_file};

use crate::{debugln, gb::Mode, warnln};

pub const ROM_BANK_SIZE: usize = 16384;
pub const RAM_BANK_SIZE: usize = 8192;

/// The 48 byte logo sequence that every cartridge carries at
/// 0x0104-0x0133, verified at load time.
pub const LOGO: [u8; 48] = [
    0xce, 0xed, 0x66, 0x66, 0xcc, 0x0d, 0x00, 0x0b, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0c, 0x00,
    0x0d, 0x00, 0x08, 0x11, 0x1f, 0x88, 0x89, 0x00, 0x0e, 0xdc, 0xcc, 0x6e, 0xe6, 0xdd, 0xdd,
    0xd9, 0x99, 0xbb, 0xbb, 0x67, 0x63, 0x6e, 0x0e, 0xec, 0xcc, 0xdd, 0xdc, 0x99, 0x9f, 0xbb,
    0xb9, 0x33, 0x3e,
];

/// The set of cartridge kinds that can be identified from the
/// type byte at 0x0147. Only the simple and MBC1 kinds have a
/// dedicated controller, everything else degrades to plain
/// addressing with a logged warning.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CartKind {
    RomOnly = 0x00,
    Mbc1 = 0x01,
    Mbc1Ram = 0x02,
    Mbc1RamBattery = 0x03,
    Mbc2 = 0x05,
    Mbc2Battery = 0x06,
    RomRam = 0x08,
    RomRamBattery = 0x09,
    Mbc3TimerBattery = 0x0f,
    Mbc3TimerRamBattery = 0x10,
    Mbc3 = 0x11,
    Mbc3Ram = 0x12,
    Mbc3RamBattery = 0x13,
    Mbc5 = 0x19,
    Mbc5Ram = 0x1a,
    Mbc5RamBattery = 0x1b,
    Unknown = 0xef,
}

impl CartKind {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CartKind::RomOnly,
            0x01 => CartKind::Mbc1,
            0x02 => CartKind::Mbc1Ram,
            0x03 => CartKind::Mbc1RamBattery,
            0x05 => CartKind::Mbc2,
            0x06 => CartKind::Mbc2Battery,
            0x08 => CartKind::RomRam,
            0x09 => CartKind::RomRamBattery,
            0x0f => CartKind::Mbc3TimerBattery,
            0x10 => CartKind::Mbc3TimerRamBattery,
            0x11 => CartKind::Mbc3,
            0x12 => CartKind::Mbc3Ram,
            0x13 => CartKind::Mbc3RamBattery,
            0x19 => CartKind::Mbc5,
            0x1a => CartKind::Mbc5Ram,
            0x1b => CartKind::Mbc5RamBattery,
            _ => CartKind::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CartKind::RomOnly => "ROM Only",
            CartKind::Mbc1 => "MBC1",
            CartKind::Mbc1Ram => "MBC1 + RAM",
            CartKind::Mbc1RamBattery => "MBC1 + RAM + Battery",
            CartKind::Mbc2 => "MBC2",
            CartKind::Mbc2Battery => "MBC2 + Battery",
            CartKind::RomRam => "ROM + RAM",
            CartKind::RomRamBattery => "ROM + RAM + Battery",
            CartKind::Mbc3TimerBattery => "MBC3 + Timer + Battery",
            CartKind::Mbc3TimerRamBattery => "MBC3 + Timer + RAM + Battery",
            CartKind::Mbc3 => "MBC3",
            CartKind::Mbc3Ram => "MBC3 + RAM",
            CartKind::Mbc3RamBattery => "MBC3 + RAM + Battery",
            CartKind::Mbc5 => "MBC5",
            CartKind::Mbc5Ram => "MBC5 + RAM",
            CartKind::Mbc5RamBattery => "MBC5 + RAM + Battery",
            CartKind::Unknown => "Unknown",
        }
    }

    /// Whether the cartridge kind advertises battery backed RAM,
    /// meaning that its contents should persist across sessions.
    pub fn has_battery(&self) -> bool {
        matches!(
            self,
            CartKind::Mbc1RamBattery
                | CartKind::Mbc2Battery
                | CartKind::RomRamBattery
                | CartKind::Mbc3TimerBattery
                | CartKind::Mbc3TimerRamBattery
                | CartKind::Mbc3RamBattery
                | CartKind::Mbc5RamBattery
        )
    }
}

impl Display for CartKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RomSize {
    Size32K,
    Size64K,
    Size128K,
    Size256K,
    Size512K,
    Size1M,
    Size2M,
    Size4M,
    Size8M,
    SizeUnknown,
}

impl RomSize {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => RomSize::Size32K,
            0x01 => RomSize::Size64K,
            0x02 => RomSize::Size128K,
            0x03 => RomSize::Size256K,
            0x04 => RomSize::Size512K,
            0x05 => RomSize::Size1M,
            0x06 => RomSize::Size2M,
            0x07 => RomSize::Size4M,
            0x08 => RomSize::Size8M,
            _ => RomSize::SizeUnknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RomSize::Size32K => "32 KB",
            RomSize::Size64K => "64 KB",
            RomSize::Size128K => "128 KB",
            RomSize::Size256K => "256 KB",
            RomSize::Size512K => "512 KB",
            RomSize::Size1M => "1 MB",
            RomSize::Size2M => "2 MB",
            RomSize::Size4M => "4 MB",
            RomSize::Size8M => "8 MB",
            RomSize::SizeUnknown => "Unknown",
        }
    }

    pub fn rom_banks(&self) -> u16 {
        match self {
            RomSize::Size32K => 2,
            RomSize::Size64K => 4,
            RomSize::Size128K => 8,
            RomSize::Size256K => 16,
            RomSize::Size512K => 32,
            RomSize::Size1M => 64,
            RomSize::Size2M => 128,
            RomSize::Size4M => 256,
            RomSize::Size8M => 512,
            RomSize::SizeUnknown => 0,
        }
    }
}

impl Display for RomSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RamSize {
    NoRam,
    Size2K,
    Size8K,
    Size32K,
    Size128K,
    Size64K,
    SizeUnknown,
}

impl RamSize {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => RamSize::NoRam,
            0x01 => RamSize::Size2K,
            0x02 => RamSize::Size8K,
            0x03 => RamSize::Size32K,
            0x04 => RamSize::Size128K,
            0x05 => RamSize::Size64K,
            _ => RamSize::SizeUnknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RamSize::NoRam => "No RAM",
            RamSize::Size2K => "2 KB",
            RamSize::Size8K => "8 KB",
            RamSize::Size32K => "32 KB",
            RamSize::Size128K => "128 KB",
            RamSize::Size64K => "64 KB",
            RamSize::SizeUnknown => "Unknown",
        }
    }

    pub fn ram_bytes(&self) -> usize {
        match self {
            RamSize::NoRam => 0,
            RamSize::Size2K => 2048,
            RamSize::Size8K => 8192,
            RamSize::Size32K => 32768,
            RamSize::Size128K => 131072,
            RamSize::Size64K => 65536,
            RamSize::SizeUnknown => 0,
        }
    }

    pub fn ram_banks(&self) -> u16 {
        (self.ram_bytes() / RAM_BANK_SIZE) as u16
    }
}

impl Display for RamSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Structure that owns the ROM image and the external RAM of a
/// cartridge together with the latch state of its memory bank
/// controller.
#[derive(Clone)]
pub struct Cartridge {
    /// The complete data of the cartridge ROM, including the
    /// complete set of ROM banks.
    rom_data: Vec<u8>,

    /// The external (battery backed or not) RAM of the cartridge,
    /// sized according to the RAM size code of the header.
    ram_data: Vec<u8>,

    /// The bank controller in charge of handling the memory
    /// access for the current cartridge kind.
    controller: &'static Controller,

    /// The number of 16 KB ROM banks present in the image, used
    /// to wrap out-of-range bank selections.
    rom_bank_count: u16,

    /// The number of 8 KB RAM banks advertised by the header.
    ram_bank_count: u16,

    /// The offset into `rom_data` of the bank currently mapped
    /// into the 0x4000-0x7FFF window.
    rom_offset: usize,

    /// The offset into `ram_data` of the bank currently mapped
    /// into the 0xA000-0xBFFF window.
    ram_offset: usize,

    /// Gates access to the external RAM, latched by writes to
    /// the 0x0000-0x1FFF range.
    ram_enabled: bool,

    /// Low 5 bits of the ROM bank index (MBC1), never zero.
    bank_low: u8,

    /// Upper 2 bits of the ROM bank index or the RAM bank index,
    /// depending on the banking mode (MBC1).
    bank_high: u8,

    /// MBC1 banking mode: false selects ROM banking (low and high
    /// bits combine into the ROM index), true selects RAM banking.
    ram_mode: bool,
}

impl Cartridge {
    pub fn new() -> Self {
        Self {
            rom_data: vec![],
            ram_data: vec![],
            controller: &NO_MBC,
            rom_bank_count: 0,
            ram_bank_count: 0,
            rom_offset: ROM_BANK_SIZE,
            ram_offset: 0x0000,
            ram_enabled: false,
            bank_low: 0x1,
            bank_high: 0x0,
            ram_mode: false,
        }
    }

    pub fn from_data(data: &[u8]) -> Result<Self, Error> {
        let mut cart = Cartridge::new();
        cart.set_data(data)?;
        Ok(cart)
    }

    pub fn from_file(path: &str) -> Result<Self, Error> {
        let data = read_file(path)?;
        Self::from_data(&data)
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            // 0x0000-0x7FFF - ROM bank 0 + switchable ROM bank
            0x0000..=0x7fff => (self.controller.read_rom)(self, addr),
            // 0xA000-0xBFFF - External RAM
            0xa000..=0xbfff => (self.controller.read_ram)(self, addr),
            _ => {
                debugln!("Reading from unknown cartridge location 0x{:04x}", addr);
                0x00
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // 0x0000-0x7FFF - MBC register latches
            0x0000..=0x7fff => (self.controller.write_rom)(self, addr, value),
            // 0xA000-0xBFFF - External RAM
            0xa000..=0xbfff => (self.controller.write_ram)(self, addr, value),
            _ => debugln!("Writing to unknown cartridge location 0x{:04x}", addr),
        }
    }

    fn set_data(&mut self, data: &[u8]) -> Result<(), Error> {
        Self::verify_header(data)?;
        self.rom_data = data.to_vec();
        self.rom_bank_count = self.rom_size().rom_banks();
        self.ram_bank_count = self.ram_size().ram_banks();
        self.ram_data = vec![0x00; self.ram_size().ram_bytes()];
        self.controller = self.select_controller();
        self.rom_offset = ROM_BANK_SIZE;
        self.ram_offset = 0x0000;
        self.ram_enabled = false;
        self.bank_low = 0x1;
        self.bank_high = 0x0;
        self.ram_mode = false;
        Ok(())
    }

    /// Ensures the provided data looks like a valid cartridge
    /// image: sized in complete 32 KB units, carrying the expected
    /// logo sequence and a matching header checksum.
    fn verify_header(data: &[u8]) -> Result<(), Error> {
        if data.is_empty() || data.len() % 0x8000 != 0 {
            return Err(Error::RomSize);
        }
        if data[0x0104..0x0134] != LOGO {
            return Err(Error::BadLogo);
        }
        let mut checksum: u8 = 0;
        for byte in &data[0x0134..=0x014c] {
            checksum = checksum.wrapping_sub(*byte).wrapping_sub(1);
        }
        if checksum != data[0x014d] {
            return Err(Error::BadHeaderChecksum);
        }
        Ok(())
    }

    fn select_controller(&self) -> &'static Controller {
        match self.kind() {
            CartKind::RomOnly | CartKind::RomRam | CartKind::RomRamBattery => &NO_MBC,
            CartKind::Mbc1 | CartKind::Mbc1Ram | CartKind::Mbc1RamBattery => &MBC1,
            kind => {
                warnln!(
                    "No controller implemented for {}, using plain addressing",
                    kind
                );
                &NO_MBC
            }
        }
    }

    /// Recomputes the ROM and RAM window offsets from the current
    /// MBC1 latch values. Bank indexes beyond the present banks wrap
    /// and a resolved ROM index of zero selects bank 1.
    fn update_banks(&mut self) {
        let mut rom_bank = if self.ram_mode {
            self.bank_low as u16
        } else {
            self.bank_low as u16 | ((self.bank_high as u16) << 5)
        };
        if self.rom_bank_count > 0 {
            rom_bank %= self.rom_bank_count;
        }
        if rom_bank == 0 {
            rom_bank = 1;
        }
        self.rom_offset = rom_bank as usize * ROM_BANK_SIZE;

        let mut ram_bank = if self.ram_mode { self.bank_high as u16 } else { 0 };
        if self.ram_bank_count > 0 {
            ram_bank %= self.ram_bank_count;
        } else {
            ram_bank = 0;
        }
        self.ram_offset = ram_bank as usize * RAM_BANK_SIZE;
    }

    pub fn title(&self) -> String {
        let mut end = 0x0134;
        for (index, byte) in self.rom_data[0x0134..=0x0143].iter().enumerate() {
            if *byte == 0x00 || (index == 15 && *byte & 0x80 != 0x00) {
                break;
            }
            end += 1;
        }
        String::from(
            std::str::from_utf8(&self.rom_data[0x0134..end])
                .unwrap_or("")
                .trim(),
        )
    }

    pub fn kind(&self) -> CartKind {
        CartKind::from_u8(self.rom_data[0x0147])
    }

    pub fn rom_size(&self) -> RomSize {
        RomSize::from_u8(self.rom_data[0x0148])
    }

    pub fn ram_size(&self) -> RamSize {
        RamSize::from_u8(self.rom_data[0x0149])
    }

    /// The hardware mode the cartridge asks for, derived from the
    /// CGB flag byte that overlaps the end of the title field.
    pub fn mode(&self) -> Mode {
        match self.rom_data[0x0143] {
            0x80 | 0xc0 => Mode::Cgb,
            _ => Mode::Dmg,
        }
    }

    pub fn checksum(&self) -> u8 {
        let mut sum: u8 = 0;
        for byte in &self.rom_data[0x0134..=0x014c] {
            sum = sum.wrapping_sub(*byte).wrapping_sub(1);
        }
        sum
    }

    pub fn valid_checksum(&self) -> bool {
        self.rom_data[0x014d] == self.checksum()
    }

    pub fn has_battery(&self) -> bool {
        self.kind().has_battery()
    }

    pub fn loaded(&self) -> bool {
        !self.rom_data.is_empty()
    }

    pub fn rom_data(&self) -> &[u8] {
        &self.rom_data
    }

    pub fn ram_data(&self) -> &[u8] {
        &self.ram_data
    }

    pub fn set_ram_data(&mut self, data: &[u8]) {
        self.ram_data = data.to_vec();
    }

    pub fn rom_bank(&self) -> u16 {
        (self.rom_offset / ROM_BANK_SIZE) as u16
    }

    pub fn ram_bank(&self) -> u8 {
        (self.ram_offset / RAM_BANK_SIZE) as u8
    }

    pub fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    pub fn description(&self) -> String {
        format!(
            "Title: {}, Type: {}, ROM: {}, RAM: {}",
            self.title(),
            self.kind(),
            self.rom_size(),
            self.ram_size()
        )
    }
}

impl Default for Cartridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Cartridge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A bank controller strategy, bundling the read and write
/// operations for both the ROM and the external RAM windows.
pub struct Controller {
    pub name: &'static str,
    pub read_rom: fn(cart: &Cartridge, addr: u16) -> u8,
    pub write_rom: fn(cart: &mut Cartridge, addr: u16, value: u8),
    pub read_ram: fn(cart: &Cartridge, addr: u16) -> u8,
    pub write_ram: fn(cart: &mut Cartridge, addr: u16, value: u8),
}

pub static NO_MBC: Controller = Controller {
    name: "No MBC",
    read_rom: |cart: &Cartridge, addr: u16| -> u8 {
        *cart.rom_data.get(addr as usize).unwrap_or(&0xff)
    },
    write_rom: |_cart: &mut Cartridge, addr: u16, value: u8| {
        // some ROMs (Tetris among them) write to the MBC1 bank latch
        // even on plain cartridges, nothing to be done here
        debugln!(
            "Ignoring ROM write on plain cartridge 0x{:04x} = 0x{:02x}",
            addr,
            value
        );
    },
    read_ram: |cart: &Cartridge, addr: u16| -> u8 {
        *cart.ram_data.get((addr - 0xa000) as usize).unwrap_or(&0xff)
    },
    write_ram: |cart: &mut Cartridge, addr: u16, value: u8| {
        let index = (addr - 0xa000) as usize;
        if let Some(byte) = cart.ram_data.get_mut(index) {
            *byte = value;
        }
    },
};

pub static MBC1: Controller = Controller {
    name: "MBC1",
    read_rom: |cart: &Cartridge, addr: u16| -> u8 {
        match addr {
            // 0x0000-0x3FFF - ROM bank 0 (fixed)
            0x0000..=0x3fff => *cart.rom_data.get(addr as usize).unwrap_or(&0xff),
            // 0x4000-0x7FFF - ROM bank 1-N (switchable)
            _ => *cart
                .rom_data
                .get(cart.rom_offset + (addr - 0x4000) as usize)
                .unwrap_or(&0xff),
        }
    },
    write_rom: |cart: &mut Cartridge, addr: u16, value: u8| {
        match addr {
            // 0x0000-0x1FFF - RAM enable latch
            0x0000..=0x1fff => cart.ram_enabled = value & 0x0f == 0x0a,
            // 0x2000-0x3FFF - ROM bank low 5 bits, zero rewritten to one
            0x2000..=0x3fff => {
                let bank = value & 0x1f;
                cart.bank_low = if bank == 0 { 1 } else { bank };
                cart.update_banks();
            }
            // 0x4000-0x5FFF - ROM bank upper 2 bits or RAM bank
            0x4000..=0x5fff => {
                cart.bank_high = value & 0x03;
                cart.update_banks();
            }
            // 0x6000-0x7FFF - banking mode select
            _ => {
                cart.ram_mode = value & 0x01 == 0x01;
                cart.update_banks();
            }
        }
    },
    read_ram: |cart: &Cartridge, addr: u16| -> u8 {
        if !cart.ram_enabled {
            return 0xff;
        }
        *cart
            .ram_data
            .get(cart.ram_offset + (addr - 0xa000) as usize)
            .unwrap_or(&0xff)
    },
    write_ram: |cart: &mut Cartridge, addr: u16, value: u8| {
        if !cart.ram_enabled {
            warnln!("Attempt to write to ERAM while write protect is active");
            return;
        }
        let index = cart.ram_offset + (addr - 0xa000) as usize;
        if let Some(byte) = cart.ram_data.get_mut(index) {
            *byte = value;
        }
    },
};

#[cfg(test)]
mod tests {
    use crate::test::build_rom;

    use super::{CartKind, Cartridge, RamSize, RomSize, ROM_BANK_SIZE};

    use dotmatrix_common::error::Error;

    #[test]
    fn test_header_parse() {
        let cart = Cartridge::from_data(&build_rom(0x03, 0x02, 0x03)).unwrap();
        assert_eq!(cart.title(), "TEST");
        assert_eq!(cart.kind(), CartKind::Mbc1RamBattery);
        assert_eq!(cart.rom_size(), RomSize::Size128K);
        assert_eq!(cart.ram_size(), RamSize::Size32K);
        assert!(cart.has_battery());
        assert!(cart.valid_checksum());
    }

    #[test]
    fn test_rejects_bad_size() {
        let result = Cartridge::from_data(&vec![0x00; 0x4000]);
        assert_eq!(result.err(), Some(Error::RomSize));
    }

    #[test]
    fn test_rejects_bad_logo() {
        let mut data = build_rom(0x00, 0x00, 0x00);
        data[0x0104] = !data[0x0104];
        let result = Cartridge::from_data(&data);
        assert_eq!(result.err(), Some(Error::BadLogo));
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let mut data = build_rom(0x00, 0x00, 0x00);
        data[0x014d] = data[0x014d].wrapping_add(1);
        let result = Cartridge::from_data(&data);
        assert_eq!(result.err(), Some(Error::BadHeaderChecksum));
    }

    #[test]
    fn test_mbc1_bank_select() {
        let mut data = build_rom(0x01, 0x02, 0x00);
        data[5 * ROM_BANK_SIZE] = 0x42;
        let mut cart = Cartridge::from_data(&data).unwrap();

        cart.write(0x2000, 0x05);
        assert_eq!(cart.rom_bank(), 5);
        assert_eq!(cart.read(0x4000), 0x42);

        // a write of zero selects bank one
        cart.write(0x2000, 0x00);
        assert_eq!(cart.rom_bank(), 1);
    }

    #[test]
    fn test_mbc1_bank_wrap() {
        // 64 KB image has 4 banks, bank 5 wraps to 1
        let mut cart = Cartridge::from_data(&build_rom(0x01, 0x01, 0x00)).unwrap();
        cart.write(0x2000, 0x05);
        assert_eq!(cart.rom_bank(), 1);
    }

    #[test]
    fn test_mbc1_ram_enable() {
        let mut cart = Cartridge::from_data(&build_rom(0x03, 0x01, 0x03)).unwrap();

        cart.write(0xa000, 0x42);
        assert_eq!(cart.read(0xa000), 0xff);

        cart.write(0x0000, 0x0a);
        assert!(cart.ram_enabled());
        cart.write(0xa000, 0x42);
        assert_eq!(cart.read(0xa000), 0x42);

        cart.write(0x0000, 0x00);
        assert_eq!(cart.read(0xa000), 0xff);
    }

    #[test]
    fn test_mbc1_ram_mode() {
        let mut cart = Cartridge::from_data(&build_rom(0x03, 0x02, 0x03)).unwrap();
        cart.write(0x0000, 0x0a);

        // in ROM banking mode the high bits extend the ROM index
        // (bank 33 wraps to 1 on this 8 bank image) and the RAM
        // bank stays at zero
        cart.write(0x2000, 0x01);
        cart.write(0x4000, 0x01);
        assert_eq!(cart.rom_bank(), 1);
        assert_eq!(cart.ram_bank(), 0);

        // in RAM banking mode the high bits select the RAM bank
        // and the ROM index reduces to the low 5 bits
        cart.write(0x6000, 0x01);
        assert_eq!(cart.rom_bank(), 1);
        assert_eq!(cart.ram_bank(), 1);

        cart.write(0xa000, 0x99);
        cart.write(0x4000, 0x00);
        assert_eq!(cart.read(0xa000), 0x00);
        cart.write(0x4000, 0x01);
        assert_eq!(cart.read(0xa000), 0x99);
    }

    #[test]
    fn test_fallback_controller() {
        let cart = Cartridge::from_data(&build_rom(0x11, 0x00, 0x00)).unwrap();
        assert_eq!(cart.kind(), CartKind::Mbc3);
        assert_eq!(cart.controller.name, "No MBC");
    }
}
