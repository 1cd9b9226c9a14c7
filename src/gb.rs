//! Emulation entrypoint and associated functions and structures.
//!
//! The [`GameBoy`] structure bundles the CPU (which owns the bus
//! and every peripheral) and exposes the host driver API: loading
//! a cartridge, stepping, pumping frames, input events and the
//! persistence of battery backed cartridge RAM.

use std::fmt::{self, Display, Formatter};

use dotmatrix_common::error::Error;

use crate::{
    apu::Apu,
    cart::Cartridge,
    cpu::Cpu,
    mmu::Mmu,
    pad::{Pad, PadKey},
    ppu::{Ppu, PpuMode, DISPLAY_HEIGHT, DISPLAY_WIDTH, FRAME_BUFFER_SIZE},
    serial::Serial,
    timer::Timer,
};

/// Enumeration that describes the two hardware generations that
/// can be emulated: the original monochrome device and the color
/// one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Dmg = 1,
    Cgb = 2,
}

impl Mode {
    pub fn description(&self) -> &'static str {
        match self {
            Mode::Dmg => "Game Boy (DMG)",
            Mode::Cgb => "Game Boy Color (CGB)",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Speed {
    Normal = 0,
    Double = 1,
}

impl Speed {
    pub fn description(&self) -> &'static str {
        match self {
            Speed::Normal => "Normal Speed",
            Speed::Double => "Double Speed",
        }
    }

    pub fn switch(&self) -> Self {
        match self {
            Speed::Normal => Speed::Double,
            Speed::Double => Speed::Normal,
        }
    }

    pub fn multiplier(&self) -> u8 {
        match self {
            Speed::Normal => 1,
            Speed::Double => 2,
        }
    }
}

impl Display for Speed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Aggregation structure bundling all the peripheral components
/// handed over to the MMU at construction time.
pub struct Components {
    pub ppu: Ppu,
    pub apu: Apu,
    pub pad: Pad,
    pub timer: Timer,
    pub serial: Serial,
}

impl Components {
    pub fn new(mode: Mode) -> Self {
        Self {
            ppu: Ppu::new(mode),
            apu: Apu::default(),
            pad: Pad::default(),
            timer: Timer::default(),
            serial: Serial::default(),
        }
    }
}

impl Default for Components {
    fn default() -> Self {
        Self::new(Mode::Dmg)
    }
}

/// Top level structure that abstracts the usage of the emulated
/// system, serving as the main entry-point API.
pub struct GameBoy {
    /// The current running mode of the emulator, this may affect
    /// many aspects of the emulation.
    mode: Mode,

    /// Whether the mode was forced by the host, preventing the
    /// cartridge CGB flag from selecting it at load time.
    mode_forced: bool,

    /// Reference to the CPU component, which transitively owns
    /// the bus and every peripheral.
    cpu: Cpu,

    /// If the PPU is enabled, it will be clocked.
    ppu_enabled: bool,

    /// If the timer is enabled, it will be clocked.
    timer_enabled: bool,

    /// Cooperative break flag: when armed the next step yields to
    /// the break callback before executing any instruction.
    break_requested: bool,

    /// Callback invoked when a requested debug break is honored.
    break_callback: fn(&Cpu),
}

impl GameBoy {
    /// The logic frequency of the CPU in Hz.
    pub const CPU_FREQ: u32 = 4194304;

    /// The visual frequency (refresh rate) of the machine,
    /// close to 60 Hz.
    pub const VISUAL_FREQ: f32 = 59.7275;

    /// The cycles taken to run a complete frame in the PPU
    /// (in CPU cycles).
    pub const FRAME_CYCLES: u32 = 70224;

    pub fn new(mode: Option<Mode>) -> Self {
        let mode_forced = mode.is_some();
        let mode = mode.unwrap_or(Mode::Dmg);
        let mmu = Mmu::new(Components::new(mode), mode);
        Self {
            mode,
            mode_forced,
            cpu: Cpu::new(mmu),
            ppu_enabled: true,
            timer_enabled: true,
            break_requested: false,
            break_callback: |_| {},
        }
    }

    /// Constructs the emulator with the provided ROM image already
    /// loaded, the usual one-call entry-point for hosts.
    pub fn with_rom(data: &[u8]) -> Result<Self, Error> {
        let mut gb = Self::new(None);
        gb.load(data)?;
        Ok(gb)
    }

    /// Verifies and loads the provided ROM image, selecting the
    /// hardware mode from the cartridge header (unless forced) and
    /// placing the machine in the post boot state.
    pub fn load(&mut self, data: &[u8]) -> Result<(), Error> {
        let cart = Cartridge::from_data(data)?;
        if !self.mode_forced {
            self.set_mode(cart.mode());
        }
        self.cpu.mmu().set_cart(cart);
        self.cpu.boot();
        Ok(())
    }

    pub fn load_file(&mut self, path: &str) -> Result<(), Error> {
        let data = dotmatrix_common::util::read_file(path)?;
        self.load(&data)
    }

    pub fn reset(&mut self) {
        self.cpu.mmu().ppu().reset();
        self.cpu.mmu().apu().reset();
        self.cpu.mmu().timer().reset();
        self.cpu.mmu().serial().reset();
        self.cpu.mmu().reset();
        self.cpu.reset();
    }

    /// Advances the system by one CPU instruction (or one idle
    /// period while halted/stopped), then brings every peripheral
    /// up to the same point in time. Returns the cycles consumed.
    pub fn step(&mut self) -> Result<u16, Error> {
        if self.break_requested {
            self.break_requested = false;
            (self.break_callback)(&self.cpu);
        }

        let cycles = self.cpu.step()?;

        // the PPU runs from the normal speed clock, so the cycle
        // count is scaled down while in double speed
        let cycles_n = cycles / self.multiplier() as u16;
        if self.ppu_enabled {
            self.cpu.mmu().ppu().clock(cycles_n);
        }
        if self.timer_enabled {
            self.cpu.mmu().timer().clock(cycles);
        }

        Ok(cycles)
    }

    /// Steps the system until the given number of cycles has been
    /// reached, returning the cycles effectively consumed. One
    /// frame is [`GameBoy::FRAME_CYCLES`] cycles.
    pub fn run_until(&mut self, cycle_budget: u64) -> Result<u64, Error> {
        let start = self.cpu.ticks();
        while self.cpu.ticks().wrapping_sub(start) < cycle_budget {
            self.step()?;
        }
        Ok(self.cpu.ticks().wrapping_sub(start))
    }

    /// Steps the system until the PPU finishes the frame currently
    /// in drawing.
    pub fn next_frame(&mut self) -> Result<u64, Error> {
        let start = self.cpu.ticks();
        let frame = self.ppu_i().frame_index();
        while self.ppu_i().frame_index() == frame {
            self.step()?;
        }
        Ok(self.cpu.ticks().wrapping_sub(start))
    }

    /// The rendered frame as 160x144 RGB triples.
    pub fn frame_buffer(&self) -> &[u8; FRAME_BUFFER_SIZE] {
        self.cpu.mmu_i().ppu_i().frame_buffer()
    }

    pub fn key_press(&mut self, key: PadKey) {
        self.cpu.mmu().pad().key_press(key);
    }

    pub fn key_release(&mut self, key: PadKey) {
        self.cpu.mmu().pad().key_release(key);
    }

    /// The external RAM of the cartridge for persistence purposes,
    /// only present when the cartridge is battery backed.
    pub fn save_ram(&self) -> Option<&[u8]> {
        let cart = self.cpu.mmu_i().cart_i();
        if cart.has_battery() {
            Some(cart.ram_data())
        } else {
            None
        }
    }

    /// Restores a previously saved external RAM buffer.
    pub fn load_ram(&mut self, data: &[u8]) -> Result<(), Error> {
        let cart = self.cpu.mmu().cart();
        if data.len() != cart.ram_data().len() {
            return Err(Error::InvalidParameter(format!(
                "RAM size mismatch: expected {} bytes, got {}",
                cart.ram_data().len(),
                data.len()
            )));
        }
        cart.set_ram_data(data);
        Ok(())
    }

    /// Arms the cooperative debug break: the next step will call
    /// the break callback before executing any instruction.
    pub fn request_debug_break(&mut self) {
        self.break_requested = true;
    }

    pub fn set_break_callback(&mut self, callback: fn(&Cpu)) {
        self.break_callback = callback;
    }

    pub fn cpu(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn cpu_i(&self) -> &Cpu {
        &self.cpu
    }

    pub fn mmu(&mut self) -> &mut Mmu {
        self.cpu.mmu()
    }

    pub fn mmu_i(&self) -> &Mmu {
        self.cpu.mmu_i()
    }

    pub fn ppu(&mut self) -> &mut Ppu {
        self.cpu.mmu().ppu()
    }

    pub fn ppu_i(&self) -> &Ppu {
        self.cpu.mmu_i().ppu_i()
    }

    pub fn timer(&mut self) -> &mut Timer {
        self.cpu.mmu().timer()
    }

    pub fn serial(&mut self) -> &mut Serial {
        self.cpu.mmu().serial()
    }

    pub fn pad(&mut self) -> &mut Pad {
        self.cpu.mmu().pad()
    }

    pub fn cart_i(&self) -> &Cartridge {
        self.cpu.mmu_i().cart_i()
    }

    pub fn ppu_mode(&self) -> PpuMode {
        self.ppu_i().mode()
    }

    pub fn ppu_ly(&self) -> u8 {
        self.ppu_i().ly()
    }

    pub fn ppu_frame(&self) -> u16 {
        self.ppu_i().frame_index()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, value: Mode) {
        self.mode = value;
        self.cpu.mmu().set_mode(value);
    }

    pub fn speed(&self) -> Speed {
        self.cpu.mmu_i().speed()
    }

    pub fn multiplier(&self) -> u8 {
        self.cpu.mmu_i().speed().multiplier()
    }

    pub fn ppu_enabled(&self) -> bool {
        self.ppu_enabled
    }

    pub fn set_ppu_enabled(&mut self, value: bool) {
        self.ppu_enabled = value;
    }

    pub fn timer_enabled(&self) -> bool {
        self.timer_enabled
    }

    pub fn set_timer_enabled(&mut self, value: bool) {
        self.timer_enabled = value;
    }

    pub fn display_width(&self) -> usize {
        DISPLAY_WIDTH
    }

    pub fn display_height(&self) -> usize {
        DISPLAY_HEIGHT
    }

    pub fn description(&self) -> String {
        format!(
            "Mode: {}, Speed: {}, Cartridge: {}",
            self.mode(),
            self.speed(),
            self.cart_i().description()
        )
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Display for GameBoy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
