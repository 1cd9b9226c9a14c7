//! MMU (Memory Management Unit) functions and structures.
//!
//! Dispatches every 16 bit bus access to the owning backing store
//! or peripheral and composes the interrupt request register from
//! the per-peripheral interrupt flags.

use crate::{
    apu::Apu,
    cart::Cartridge,
    consts::{
        DIV_ADDR, DMA_ADDR, IE_ADDR, IF_ADDR, KEY1_ADDR, P1_ADDR, SB_ADDR, SC_ADDR, SVBK_ADDR,
        TAC_ADDR, VBK_ADDR,
    },
    gb::{Components, Mode, Speed},
    pad::Pad,
    ppu::{Ppu, OAM_SIZE},
    serial::Serial,
    timer::Timer,
    warnln,
};

pub const WRAM_SIZE_DMG: usize = 8192;
pub const WRAM_SIZE_CGB: usize = 32768;
pub const HRAM_SIZE: usize = 128;

/// Indexes of the five interrupt sources in priority order, used
/// both for IF/IE bit positions and for vector computation.
pub const INT_VBLANK: u8 = 0;
pub const INT_STAT: u8 = 1;
pub const INT_TIMER: u8 = 2;
pub const INT_SERIAL: u8 = 3;
pub const INT_PAD: u8 = 4;

pub struct Mmu {
    /// Register that controls the interrupts that are considered
    /// to be enabled and should be triggered.
    pub ie: u8,

    /// Reference to the PPU (Pixel Processing Unit) that is going
    /// to be used both for VRAM and OAM reading/writing and for
    /// the graphics register window.
    ppu: Ppu,

    /// Reference to the APU register stub, memory mapped in the
    /// 0xFF10-0xFF3F window.
    apu: Apu,

    /// Reference to the joypad structure that controls the I/O
    /// access to the P1 register.
    pad: Pad,

    /// The timer controller, memory mapped at 0xFF04-0xFF07.
    timer: Timer,

    /// The serial transfer stub, memory mapped at 0xFF01-0xFF02.
    serial: Serial,

    /// The cartridge currently loaded into the system, used for
    /// both ROM and external RAM accesses.
    cart: Cartridge,

    /// Work RAM, a fixed bank at 0xC000-0xCFFF plus a switchable
    /// one at 0xD000-0xDFFF (always bank 1 on DMG).
    wram: Vec<u8>,

    /// High RAM scratch area at 0xFF80-0xFFFE.
    hram: [u8; HRAM_SIZE],

    /// The WRAM bank mapped into the switchable window (CGB only).
    wram_bank: u8,

    /// Byte offset into `wram` matching the selected bank.
    wram_offset: u16,

    /// The value last written to the OAM DMA register, kept for
    /// read back.
    dma_value: u8,

    /// The speed the system is currently running at.
    speed: Speed,

    /// Set while a speed switch has been requested through KEY1
    /// and is waiting for the next STOP instruction.
    switching: bool,

    mode: Mode,
}

impl Mmu {
    pub fn new(components: Components, mode: Mode) -> Self {
        let mut mmu = Self {
            ie: 0x0,
            ppu: components.ppu,
            apu: components.apu,
            pad: components.pad,
            timer: components.timer,
            serial: components.serial,
            cart: Cartridge::new(),
            wram: vec![],
            hram: [0x00; HRAM_SIZE],
            wram_bank: 0x1,
            wram_offset: 0x1000,
            dma_value: 0xff,
            speed: Speed::Normal,
            switching: false,
            mode,
        };
        mmu.allocate();
        mmu
    }

    pub fn reset(&mut self) {
        self.ie = 0x0;
        self.cart = Cartridge::new();
        self.hram = [0x00; HRAM_SIZE];
        self.wram_bank = 0x1;
        self.wram_offset = 0x1000;
        self.dma_value = 0xff;
        self.speed = Speed::Normal;
        self.switching = false;
        self.allocate();
    }

    fn allocate(&mut self) {
        let size = match self.mode {
            Mode::Dmg => WRAM_SIZE_DMG,
            Mode::Cgb => WRAM_SIZE_CGB,
        };
        self.wram = vec![0x00; size];
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            // 0x0000-0x7FFF - ROM bank 0 + switchable ROM bank
            0x0000..=0x7fff => self.cart.read(addr),

            // 0x8000-0x9FFF - VRAM
            0x8000..=0x9fff => self.ppu.read(addr),

            // 0xA000-0xBFFF - External cartridge RAM
            0xa000..=0xbfff => self.cart.read(addr),

            // 0xC000-0xCFFF - WRAM bank 0
            0xc000..=0xcfff => self.wram[(addr & 0x0fff) as usize],

            // 0xD000-0xDFFF - WRAM bank 1-7 (switchable on CGB)
            0xd000..=0xdfff => self.wram[(self.wram_offset + (addr & 0x0fff)) as usize],

            // 0xE000-0xFDFF - Echo of 0xC000-0xDDFF
            0xe000..=0xfdff => self.read(addr - 0x2000),

            // 0xFE00-0xFE9F - Object attribute memory (OAM)
            0xfe00..=0xfe9f => self.ppu.read(addr),

            // 0xFEA0-0xFEFF - Not usable
            0xfea0..=0xfeff => 0x00,

            // 0xFF00 — P1: Joypad
            P1_ADDR => self.pad.read(addr),

            // 0xFF01-0xFF02 — Serial transfer
            SB_ADDR..=SC_ADDR => self.serial.read(addr),

            // 0xFF04-0xFF07 — Timer and divider
            DIV_ADDR..=TAC_ADDR => self.timer.read(addr),

            // 0xFF0F — IF: Interrupt flag, composed from the
            // per-peripheral request lines
            IF_ADDR => {
                (self.ppu.int_vblank() as u8)
                    | ((self.ppu.int_stat() as u8) << 1)
                    | ((self.timer.int_tima() as u8) << 2)
                    | ((self.serial.int_serial() as u8) << 3)
                    | ((self.pad.int_pad() as u8) << 4)
                    | 0xe0
            }

            // 0xFF10-0xFF3F — Audio registers + wave pattern
            0xff10..=0xff3f => self.apu.read(addr),

            // 0xFF40-0xFF45, 0xFF47-0xFF4B — PPU registers
            0xff40..=0xff45 | 0xff47..=0xff4b => self.ppu.read(addr),

            // 0xFF46 — DMA: OAM DMA source address & start
            DMA_ADDR => self.dma_value,

            // 0xFF4D — KEY1: Speed switching (CGB only)
            KEY1_ADDR => (self.switching as u8) | ((self.speed as u8) << 7) | 0x7e,

            // 0xFF4F — VBK: VRAM bank select (CGB only)
            VBK_ADDR => self.ppu.read(addr),

            // 0xFF68-0xFF6B — Color palette ports (CGB only)
            0xff68..=0xff6b => self.ppu.read(addr),

            // 0xFF70 — SVBK: WRAM bank select (CGB only)
            SVBK_ADDR => (self.wram_bank & 0x07) | 0xf8,

            // 0xFF80-0xFFFE - High RAM (HRAM)
            0xff80..=0xfffe => self.hram[(addr & 0x007f) as usize],

            // 0xFFFF — IE: Interrupt enable
            IE_ADDR => self.ie,

            addr => {
                warnln!("Reading from unknown location 0x{:04x}", addr);
                0x00
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // 0x0000-0x7FFF - MBC register latches
            0x0000..=0x7fff => self.cart.write(addr, value),

            // 0x8000-0x9FFF - VRAM
            0x8000..=0x9fff => self.ppu.write(addr, value),

            // 0xA000-0xBFFF - External cartridge RAM
            0xa000..=0xbfff => self.cart.write(addr, value),

            // 0xC000-0xCFFF - WRAM bank 0
            0xc000..=0xcfff => self.wram[(addr & 0x0fff) as usize] = value,

            // 0xD000-0xDFFF - WRAM bank 1-7 (switchable on CGB)
            0xd000..=0xdfff => {
                self.wram[(self.wram_offset + (addr & 0x0fff)) as usize] = value
            }

            // 0xE000-0xFDFF - Echo of 0xC000-0xDDFF
            0xe000..=0xfdff => self.write(addr - 0x2000, value),

            // 0xFE00-0xFE9F - Object attribute memory (OAM)
            0xfe00..=0xfe9f => self.ppu.write(addr, value),

            // 0xFEA0-0xFEFF - Not usable
            0xfea0..=0xfeff => (),

            // 0xFF00 — P1: Joypad
            P1_ADDR => self.pad.write(addr, value),

            // 0xFF01-0xFF02 — Serial transfer
            SB_ADDR..=SC_ADDR => self.serial.write(addr, value),

            // 0xFF04-0xFF07 — Timer and divider
            DIV_ADDR..=TAC_ADDR => self.timer.write(addr, value),

            // 0xFF0F — IF: Interrupt flag, scattered back into the
            // per-peripheral request lines
            IF_ADDR => {
                self.ppu.set_int_vblank(value & 0x01 == 0x01);
                self.ppu.set_int_stat(value & 0x02 == 0x02);
                self.timer.set_int_tima(value & 0x04 == 0x04);
                self.serial.set_int_serial(value & 0x08 == 0x08);
                self.pad.set_int_pad(value & 0x10 == 0x10);
            }

            // 0xFF10-0xFF3F — Audio registers + wave pattern
            0xff10..=0xff3f => self.apu.write(addr, value),

            // 0xFF40-0xFF45, 0xFF47-0xFF4B — PPU registers
            0xff40..=0xff45 | 0xff47..=0xff4b => self.ppu.write(addr, value),

            // 0xFF46 — DMA: OAM DMA source address & start
            DMA_ADDR => self.oam_dma(value),

            // 0xFF4D — KEY1: Speed switching (CGB only)
            KEY1_ADDR => self.switching = value & 0x01 == 0x01,

            // 0xFF4F — VBK: VRAM bank select (CGB only)
            VBK_ADDR => self.ppu.write(addr, value),

            // 0xFF68-0xFF6B — Color palette ports (CGB only)
            0xff68..=0xff6b => self.ppu.write(addr, value),

            // 0xFF70 — SVBK: WRAM bank select (CGB only)
            SVBK_ADDR => {
                let mut wram_bank = value & 0x07;
                if wram_bank == 0x0 {
                    wram_bank = 0x1;
                }
                if self.mode == Mode::Cgb {
                    self.wram_bank = wram_bank;
                    self.wram_offset = wram_bank as u16 * 0x1000;
                }
            }

            // 0xFF80-0xFFFE - High RAM (HRAM)
            0xff80..=0xfffe => self.hram[(addr & 0x007f) as usize] = value,

            // 0xFFFF — IE: Interrupt enable
            IE_ADDR => self.ie = value,

            addr => warnln!("Writing to unknown location 0x{:04x}", addr),
        }
    }

    /// Reads a little-endian 16 bit word as two byte accesses at
    /// `addr` and `addr + 1`.
    pub fn read_word(&self, addr: u16) -> u16 {
        self.read(addr) as u16 | ((self.read(addr.wrapping_add(1)) as u16) << 8)
    }

    /// Writes a little-endian 16 bit word as two byte accesses at
    /// `addr` and `addr + 1`.
    pub fn write_word(&mut self, addr: u16, value: u16) {
        self.write(addr, value as u8);
        self.write(addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// Copies 160 bytes from `value << 8` into OAM. The transfer is
    /// instantaneous: it completes before the next instruction runs
    /// and the bus is never blocked.
    fn oam_dma(&mut self, value: u8) {
        self.dma_value = value;
        let base = (value as u16) << 8;
        for index in 0..OAM_SIZE as u16 {
            let byte = self.read(base + index);
            self.ppu.write(0xfe00 + index, byte);
        }
    }

    /// Clears the interrupt request line of the given source,
    /// called by the CPU when a handler is dispatched.
    pub fn ack_interrupt(&mut self, index: u8) {
        match index {
            INT_VBLANK => self.ppu.ack_vblank(),
            INT_STAT => self.ppu.ack_stat(),
            INT_TIMER => self.timer.ack_tima(),
            INT_SERIAL => self.serial.ack_serial(),
            INT_PAD => self.pad.ack_pad(),
            index => warnln!("Acknowledge of unknown interrupt {}", index),
        }
    }

    /// Toggles between normal and double speed, consuming the
    /// pending switch request.
    pub fn switch_speed(&mut self) {
        self.speed = self.speed.switch();
        self.switching = false;
    }

    #[inline(always)]
    pub fn speed(&self) -> Speed {
        self.speed
    }

    #[inline(always)]
    pub fn switching(&self) -> bool {
        self.switching
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, value: Mode) {
        self.mode = value;
        self.ppu.set_gb_mode(value);
        self.allocate();
    }

    pub fn ppu(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn ppu_i(&self) -> &Ppu {
        &self.ppu
    }

    pub fn apu(&mut self) -> &mut Apu {
        &mut self.apu
    }

    pub fn apu_i(&self) -> &Apu {
        &self.apu
    }

    pub fn pad(&mut self) -> &mut Pad {
        &mut self.pad
    }

    pub fn pad_i(&self) -> &Pad {
        &self.pad
    }

    pub fn timer(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn timer_i(&self) -> &Timer {
        &self.timer
    }

    pub fn serial(&mut self) -> &mut Serial {
        &mut self.serial
    }

    pub fn serial_i(&self) -> &Serial {
        &self.serial
    }

    pub fn cart(&mut self) -> &mut Cartridge {
        &mut self.cart
    }

    pub fn cart_i(&self) -> &Cartridge {
        &self.cart
    }

    pub fn set_cart(&mut self, cart: Cartridge) {
        self.cart = cart;
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Mmu::new(Components::default(), Mode::Dmg)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        consts::{DMA_ADDR, IF_ADDR, KEY1_ADDR, SVBK_ADDR},
        gb::{Components, Mode},
    };

    use super::Mmu;

    #[test]
    fn test_ram_round_trip() {
        let mut mmu = Mmu::default();
        mmu.write(0xc000, 0x12);
        mmu.write(0xdfff, 0x34);
        mmu.write(0xff80, 0x56);
        mmu.write(0xfffe, 0x78);
        assert_eq!(mmu.read(0xc000), 0x12);
        assert_eq!(mmu.read(0xdfff), 0x34);
        assert_eq!(mmu.read(0xff80), 0x56);
        assert_eq!(mmu.read(0xfffe), 0x78);
    }

    #[test]
    fn test_echo_mirrors_wram() {
        let mut mmu = Mmu::default();
        mmu.write(0xc123, 0xab);
        assert_eq!(mmu.read(0xe123), 0xab);

        mmu.write(0xe200, 0xcd);
        assert_eq!(mmu.read(0xc200), 0xcd);

        for addr in (0xe000..0xfe00).step_by(0x111) {
            assert_eq!(mmu.read(addr), mmu.read(addr - 0x2000));
        }
    }

    #[test]
    fn test_unusable_region() {
        let mut mmu = Mmu::default();
        mmu.write(0xfea0, 0xff);
        assert_eq!(mmu.read(0xfea0), 0x00);
        assert_eq!(mmu.read(0xfeff), 0x00);
    }

    #[test]
    fn test_unknown_io() {
        let mut mmu = Mmu::default();
        mmu.write(0xff03, 0xff);
        assert_eq!(mmu.read(0xff03), 0x00);
        assert_eq!(mmu.read(0xff7f), 0x00);
    }

    #[test]
    fn test_word_access() {
        let mut mmu = Mmu::default();
        mmu.write_word(0xc000, 0x1234);
        assert_eq!(mmu.read(0xc000), 0x34);
        assert_eq!(mmu.read(0xc001), 0x12);
        assert_eq!(mmu.read_word(0xc000), 0x1234);
    }

    #[test]
    fn test_interrupt_flag_composition() {
        let mut mmu = Mmu::default();
        assert_eq!(mmu.read(IF_ADDR), 0xe0);

        mmu.timer().set_int_tima(true);
        mmu.ppu().set_int_vblank(true);
        assert_eq!(mmu.read(IF_ADDR), 0xe5);

        mmu.write(IF_ADDR, 0x00);
        assert_eq!(mmu.read(IF_ADDR), 0xe0);
        assert!(!mmu.timer_i().int_tima());
    }

    #[test]
    fn test_oam_dma() {
        let mut mmu = Mmu::default();
        for index in 0..160_u16 {
            mmu.write(0xc000 + index, index as u8);
        }

        mmu.write(DMA_ADDR, 0xc0);
        for index in 0..160_u16 {
            assert_eq!(mmu.read(0xfe00 + index), index as u8);
        }
        assert_eq!(mmu.read(DMA_ADDR), 0xc0);
    }

    #[test]
    fn test_wram_banking() {
        let mut mmu = Mmu::new(Components::default(), Mode::Cgb);

        mmu.write(0xd000, 0x11);
        mmu.write(SVBK_ADDR, 0x02);
        assert_eq!(mmu.read(0xd000), 0x00);
        mmu.write(0xd000, 0x22);
        assert_eq!(mmu.read(0xd000), 0x22);

        // the echo region follows the selected bank
        assert_eq!(mmu.read(0xf000), 0x22);

        // bank zero maps to bank one
        mmu.write(SVBK_ADDR, 0x00);
        assert_eq!(mmu.read(0xd000), 0x11);
        assert_eq!(mmu.read(SVBK_ADDR), 0xf8 | 0x01);
    }

    #[test]
    fn test_speed_switch_request() {
        let mut mmu = Mmu::new(Components::default(), Mode::Cgb);
        assert_eq!(mmu.read(KEY1_ADDR), 0x7e);

        mmu.write(KEY1_ADDR, 0x01);
        assert!(mmu.switching());
        assert_eq!(mmu.read(KEY1_ADDR), 0x7f);

        mmu.switch_speed();
        assert!(!mmu.switching());
        assert_eq!(mmu.read(KEY1_ADDR), 0xfe);
    }
}
