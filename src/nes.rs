use crate::apu::Apu;
use crate::bus::Bus;
use crate::cart::Cart;
use crate::cpu6502::Cpu;
use crate::peripherals::Peripherals;
use crate::ppu::Ppu;
use crate::ram::Ram;
use log::debug;

/// Video standard. Decides the CPU clock divider and the PPU frame
/// geometry; threaded through construction rather than living in a
/// global.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Region {
  Ntsc,
  Pal,
}

impl Region {
  /// Master ticks (PPU dots) per CPU cycle.
  pub fn cpu_divider(self) -> u64 {
    match self {
      Region::Ntsc => 3,
      Region::Pal => 4,
    }
  }
}

/// OAM DMA engine state. A CPU write to $4014 suspends instruction
/// execution and streams a 256-byte page into the PPU's OAM, one
/// read/write pair per two CPU-rate ticks.
struct OamDma {
  active: bool,
  /// Alignment tick consumed before the first read.
  dummy: bool,
  /// CPU-rate ticks spent on this transfer. Its parity drives the
  /// read/write alternation; the master tick's parity cannot, since on
  /// PAL the CPU runs only on every fourth master tick.
  phase: u64,
  page: u8,
  addr: u8,
  data: u8,
}

impl OamDma {
  fn new() -> OamDma {
    OamDma {
      active: false,
      dummy: true,
      phase: 0,
      page: 0x00,
      addr: 0x00,
      data: 0x00,
    }
  }

  fn begin(&mut self, page: u8) {
    self.page = page;
    self.addr = 0x00;
    self.phase = 0;
    self.active = true;
  }
}

/// The CPU-visible address space, borrowed from the console for the
/// duration of one CPU step. Devices answer `Some` for addresses they
/// claim; the first claimant wins.
struct CpuBus<'a> {
  ram: &'a mut Ram,
  ppu: &'a mut Ppu,
  cart: &'a mut Cart,
  apu: &'a mut Apu,
  peripherals: &'a mut Peripherals,
  dma: &'a mut OamDma,
}

impl Bus for CpuBus<'_> {
  fn read(&mut self, addr: u16) -> u8 {
    None
      .or_else(|| self.ram.read(addr))
      .or_else(|| self.ppu.cpu_read(addr, self.cart))
      .or_else(|| self.peripherals.cpu_read(addr))
      .or_else(|| self.apu.cpu_read(addr))
      .or_else(|| self.cart.cpu_read(addr))
      .unwrap_or(0x00)
  }

  fn safe_read(&self, addr: u16) -> u8 {
    // Registers with read side effects are skipped entirely; this only
    // sees plain storage.
    None
      .or_else(|| self.ram.read(addr))
      .or_else(|| self.cart.cpu_read(addr))
      .unwrap_or(0x00)
  }

  fn write(&mut self, addr: u16, data: u8) {
    let claimed = None
      .or_else(|| self.ram.write(addr, data))
      .or_else(|| self.ppu.cpu_write(addr, data, self.cart))
      .or_else(|| {
        if addr == 0x4014 {
          self.dma.begin(data);
          return Some(());
        }
        None
      })
      .or_else(|| self.peripherals.cpu_write(addr, data))
      .or_else(|| self.apu.cpu_write(addr, data))
      .or_else(|| self.cart.cpu_write(addr, data));

    if claimed.is_none() {
      debug!("dropped write of {:02X} to unmapped address {:04X}", data, addr);
    }
  }
}

/// The console: every device plus the master clock that sequences them.
pub struct Nes {
  pub cpu: Cpu,
  pub ppu: Ppu,
  pub cart: Cart,
  pub peripherals: Peripherals,
  apu: Apu,
  ram: Ram,
  region: Region,
  tick: u64,
  /// PPU NMI edge waiting for the next instruction boundary.
  nmi_pending: bool,
  dma: OamDma,
}

/// Borrow every bus-visible device out of a `Nes`. Field-by-field so the
/// CPU (and the scheduler's own bookkeeping) stay borrowable alongside
/// the bus.
macro_rules! cpu_bus {
  ($nes:expr) => {
    CpuBus {
      ram: &mut $nes.ram,
      ppu: &mut $nes.ppu,
      cart: &mut $nes.cart,
      apu: &mut $nes.apu,
      peripherals: &mut $nes.peripherals,
      dma: &mut $nes.dma,
    }
  };
}

impl Nes {
  pub fn new(cart: Cart, region: Region) -> Nes {
    Nes {
      cpu: Cpu::new(),
      ppu: Ppu::new(region),
      cart,
      peripherals: Peripherals::new(),
      apu: Apu::new(),
      // 2 KiB of work RAM answering to 8 KiB of address space.
      ram: Ram::new(0x0000, 2 * 1024, 8 * 1024),
      region,
      tick: 0,
      nmi_pending: false,
      dma: OamDma::new(),
    }
  }

  pub fn from_file(rom_path: &str, region: Region) -> Result<Nes, String> {
    Ok(Nes::new(Cart::from_file(rom_path)?, region))
  }

  /// One master tick: the PPU always advances a dot; the CPU runs on
  /// every third (NTSC) or fourth (PAL) tick. Interrupt edges raised by
  /// the PPU are latched here and delivered between instructions.
  pub fn clock(&mut self) {
    self.ppu.clock(&mut self.cart);
    if self.ppu.nmi {
      self.ppu.nmi = false;
      self.nmi_pending = true;
    }

    if self.tick % self.region.cpu_divider() == 0 {
      if self.dma.active {
        self.dma_tick();
      } else {
        if self.cpu.cycles_left == 0 && self.nmi_pending {
          self.nmi_pending = false;
          let mut bus = cpu_bus!(self);
          self.cpu.sig_nmi(&mut bus);
        }
        let mut bus = cpu_bus!(self);
        self.cpu.clock(&mut bus);
      }
    }

    self.tick += 1;
  }

  /// One CPU-rate tick of the DMA engine: a dummy alignment tick, then
  /// alternating reads from CPU space and writes into OAM, paced by the
  /// transfer's own phase counter.
  fn dma_tick(&mut self) {
    let phase = self.dma.phase;
    self.dma.phase += 1;

    if self.dma.dummy {
      if phase % 2 == 1 {
        self.dma.dummy = false;
      }
    } else if phase % 2 == 0 {
      let addr = ((self.dma.page as u16) << 8) | (self.dma.addr as u16);
      self.dma.data = self.cpu_read(addr);
    } else {
      self.ppu.set_oam_data(self.dma.addr, self.dma.data);
      self.dma.addr = self.dma.addr.wrapping_add(1);
      if self.dma.addr == 0x00 {
        self.dma.active = false;
        self.dma.dummy = true;
      }
    }
  }

  /// Run master ticks until the current CPU instruction has retired.
  pub fn step(&mut self) {
    loop {
      self.clock();
      if self.tick % self.region.cpu_divider() == 1
        && self.cpu.cycles_left == 0
        && !self.dma.active
      {
        return;
      }
    }
  }

  /// Drain one full frame, then hand the `frame_complete` latch back to
  /// the PPU cleared. Polling faster than once per frame cannot lose a
  /// frame this way.
  pub fn frame(&mut self) {
    loop {
      self.clock();
      if self.ppu.frame_complete {
        break;
      }
    }
    self.ppu.frame_complete = false;
  }

  pub fn reset(&mut self) {
    let mut bus = cpu_bus!(self);
    self.cpu.sig_reset(&mut bus);
    self.tick = 0;
    self.nmi_pending = false;
    self.dma = OamDma::new();
  }

  // Convenience accessors that stand up a bus for a single access.

  pub fn cpu_read(&mut self, addr: u16) -> u8 {
    let mut bus = cpu_bus!(self);
    bus.read(addr)
  }

  pub fn cpu_write(&mut self, addr: u16, data: u8) {
    let mut bus = cpu_bus!(self);
    bus.write(addr, data);
  }

  pub fn safe_cpu_read(&self, addr: u16) -> u8 {
    None
      .or_else(|| self.ram.read(addr))
      .or_else(|| self.cart.cpu_read(addr))
      .unwrap_or(0x00)
  }

  pub fn safe_cpu_read16(&self, addr: u16) -> u16 {
    let lo = self.safe_cpu_read(addr) as u16;
    let hi = self.safe_cpu_read(addr.wrapping_add(1)) as u16;
    (hi << 8) | lo
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  /// Console around a one-bank NROM image with `program` at $8000 and
  /// the reset vector pointing there. The NMI vector points at $8000 +
  /// `nmi_offset` when given.
  fn test_nes_region(program: &[u8], nmi_offset: Option<u8>, region: Region) -> Nes {
    let image = crate::test_utils::program_image(program, nmi_offset);
    Nes::new(Cart::new(&image).unwrap(), region)
  }

  fn test_nes(program: &[u8]) -> Nes {
    test_nes_region(program, None, Region::Ntsc)
  }

  #[test]
  fn work_ram_is_mirrored_every_2k() {
    let mut nes = test_nes(&[]);
    nes.cpu_write(0x0000, 0x42);
    assert_eq!(nes.cpu_read(0x0800), 0x42);
    assert_eq!(nes.cpu_read(0x1000), 0x42);
    assert_eq!(nes.cpu_read(0x1800), 0x42);

    nes.cpu_write(0x1801, 0x43);
    assert_eq!(nes.cpu_read(0x0001), 0x43);
  }

  #[test]
  fn ppu_registers_mirror_and_keep_side_effects() {
    let mut nes = test_nes(&[]);
    nes.ppu.status = 0b1000_0000;

    // $3FFA decodes to PPUSTATUS; the read commits the vblank clear, so
    // a second read through the canonical address sees it low.
    assert_ne!(nes.cpu_read(0x3FFA) & 0x80, 0);
    assert_eq!(nes.cpu_read(0x2002) & 0x80, 0);
  }

  #[test]
  fn rom_writes_are_swallowed() {
    let mut nes = test_nes(&[0xEA]);
    nes.cpu_write(0x8000, 0x00);
    assert_eq!(nes.cpu_read(0x8000), 0xEA);
  }

  #[test]
  fn unmapped_reads_return_zero() {
    let mut nes = test_nes(&[]);
    assert_eq!(nes.cpu_read(0x5000), 0x00);
  }

  #[test]
  fn controllers_latch_and_shift_through_the_bus() {
    let mut nes = test_nes(&[]);
    nes.peripherals.controllers[0].a = true;
    nes.peripherals.controllers[0].down = true;

    nes.cpu_write(0x4016, 0x01);
    let bits: Vec<u8> = (0..8).map(|_| nes.cpu_read(0x4016)).collect();
    assert_eq!(bits, vec![1, 0, 0, 0, 0, 1, 0, 0]);
  }

  #[test]
  fn reset_reads_the_vector_and_zeroes_the_master_clock() {
    let mut nes = test_nes(&[0xEA]);
    nes.tick = 12345;
    nes.reset();
    assert_eq!(nes.cpu.pc, 0x8000);
    assert_eq!(nes.cpu.cycles_left, 8);
    assert_eq!(nes.tick, 0);
  }

  #[test]
  fn ntsc_gates_the_cpu_every_third_tick() {
    let mut nes = test_nes(&[0xEA]);
    nes.reset();

    // Draining the 8-cycle reset takes a CPU tick on master ticks
    // 0, 3, .., 21, so 22 master ticks in all.
    let mut ticks = 0;
    while nes.cpu.cycles_left > 0 {
      nes.clock();
      ticks += 1;
    }
    assert_eq!(ticks, 22);
  }

  #[test]
  fn pal_gates_the_cpu_every_fourth_tick() {
    let mut nes = test_nes_region(&[0xEA], None, Region::Pal);
    nes.reset();

    let mut ticks = 0;
    while nes.cpu.cycles_left > 0 {
      nes.clock();
      ticks += 1;
    }
    assert_eq!(ticks, 29);
  }

  #[test]
  fn step_executes_exactly_one_instruction() {
    let mut nes = test_nes(&[0xA9, 0x05, 0xA9, 0x07]);
    nes.reset();
    nes.step(); // drain reset
    assert_eq!(nes.cpu.pc, 0x8000);

    nes.step();
    assert_eq!(nes.cpu.a, 0x05);
    assert_eq!(nes.cpu.pc, 0x8002);

    nes.step();
    assert_eq!(nes.cpu.a, 0x07);
  }

  #[test]
  fn frame_drains_one_frame_and_clears_the_latch() {
    let mut nes = test_nes(&[0x4C, 0x00, 0x80]); // JMP $8000
    nes.reset();
    nes.frame();

    assert!(!nes.ppu.frame_complete);
    assert_eq!(nes.tick, 262 * 341);

    nes.frame();
    assert!(!nes.ppu.frame_complete);
    // Odd frame is one dot shorter.
    assert_eq!(nes.tick, 262 * 341 + 262 * 341 - 1);
  }

  #[test]
  fn pal_frames_span_312_scanlines() {
    let mut nes = test_nes_region(&[0x4C, 0x00, 0x80], None, Region::Pal);
    nes.reset();
    nes.frame();
    assert_eq!(nes.tick, 312 * 341);
  }

  #[test]
  fn nmi_is_delivered_between_instructions_after_vblank() {
    // Main loop: JMP $8000. NMI handler at $8003: LDA #$42, then spin.
    let program = [
      0x4C, 0x00, 0x80, // $8000: JMP $8000
      0xA9, 0x42, // $8003: LDA #$42
      0x4C, 0x05, 0x80, // $8005: JMP $8005
    ];
    let mut nes = test_nes_region(&program, Some(0x03), Region::Ntsc);
    nes.reset();
    nes.cpu_write(0x2000, 0x80); // enable NMI on vblank

    nes.frame();

    // The handler ran: A holds its marker and the interrupt frame is on
    // the stack.
    assert_eq!(nes.cpu.a, 0x42);
    assert_eq!(nes.cpu.s, 0xFD - 3);
  }

  #[test]
  fn nmi_is_not_delivered_when_disabled() {
    let program = [
      0x4C, 0x00, 0x80, //
      0xA9, 0x42, //
      0x4C, 0x05, 0x80,
    ];
    let mut nes = test_nes_region(&program, Some(0x03), Region::Ntsc);
    nes.reset();

    nes.frame();
    assert_eq!(nes.cpu.a, 0x00);
    assert_eq!(nes.cpu.s, 0xFD);
  }

  #[test]
  fn oam_dma_copies_a_full_page() {
    let mut nes = test_nes(&[0x4C, 0x00, 0x80]);
    nes.reset();
    for i in 0..=255u16 {
      nes.cpu_write(0x0200 + i, i as u8);
    }

    nes.cpu_write(0x4014, 0x02);
    assert!(nes.dma.active);

    let mut guard = 0;
    while nes.dma.active {
      nes.clock();
      guard += 1;
      assert!(guard < 10_000, "DMA never finished");
    }

    assert_eq!(nes.ppu.oam[0].y, 0);
    assert_eq!(nes.ppu.oam[0].tile_id, 1);
    assert_eq!(nes.ppu.oam[10].attribute, 42);
    assert_eq!(nes.ppu.oam[63].x, 255);
  }

  #[test]
  fn oam_dma_completes_on_pal() {
    // The read/write alternation must be paced by CPU-rate ticks, not by
    // master-tick parity: with the PAL divider of 4, every master tick
    // the DMA engine sees is even.
    let mut nes = test_nes_region(&[0x4C, 0x00, 0x80], None, Region::Pal);
    nes.reset();
    for i in 0..=255u16 {
      nes.cpu_write(0x0200 + i, i as u8);
    }

    nes.cpu_write(0x4014, 0x02);
    assert!(nes.dma.active);

    // One dummy pair plus 256 read/write pairs at one CPU tick per four
    // master ticks; anything past that bound means the engine stalled.
    let mut guard = 0;
    while nes.dma.active {
      nes.clock();
      guard += 1;
      assert!(guard <= 4 * 514, "DMA never finished");
    }

    assert_eq!(nes.ppu.oam[0].y, 0);
    assert_eq!(nes.ppu.oam[0].tile_id, 1);
    assert_eq!(nes.ppu.oam[10].attribute, 42);
    assert_eq!(nes.ppu.oam[63].x, 255);
  }
}
