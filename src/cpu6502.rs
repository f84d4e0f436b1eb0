use crate::bus::Bus;
use lazy_static::lazy_static;
use log::debug;
use maplit::hashmap;
use std::collections::HashMap;

/// 6502 Processor Status bits.
///
/// Decimal mode exists as a flag but the NES variant of the chip ignores
/// it during arithmetic.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StatusFlag {
  Carry = 1 << 0,
  Zero = 1 << 1,
  DisableInterrupts = 1 << 2,
  DecimalMode = 1 << 3,
  Break = 1 << 4,
  Unused = 1 << 5,
  Overflow = 1 << 6,
  Negative = 1 << 7,
}
use StatusFlag::*;

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Cpu {
  /// Processor Status
  pub status: u8,
  /// Accumulator
  pub a: u8,
  /// X Register
  pub x: u8,
  /// Y Register
  pub y: u8,
  /// Stack Pointer
  pub s: u8,
  /// Program Counter
  pub pc: u16,

  /// Cycles the current instruction still owes. The next opcode is
  /// fetched only once this reaches zero.
  pub cycles_left: u8,
}

/// The stack occupies page $01; the effective address is `$0100 | s`.
pub const STACK_BASE: u16 = 0x0100;
pub const STACK_INIT: u8 = 0xFD;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

impl Cpu {
  pub fn new() -> Cpu {
    Cpu {
      status: (Unused as u8) | (DisableInterrupts as u8),
      a: 0,
      x: 0,
      y: 0,
      s: STACK_INIT,
      pc: 0,
      cycles_left: 0,
    }
  }

  pub fn get_status(&self, flag: StatusFlag) -> u8 {
    self.status & (flag as u8)
  }

  pub fn set_status(&mut self, flag: StatusFlag, value: bool) {
    if value {
      self.status |= flag as u8;
    } else {
      self.status &= !(flag as u8);
    }
  }

  fn set_zn(&mut self, value: u8) {
    self.set_status(Zero, value == 0x00);
    self.set_status(Negative, value & 0x80 != 0);
  }

  fn push(&mut self, bus: &mut dyn Bus, data: u8) {
    bus.write(STACK_BASE | (self.s as u16), data);
    self.s = self.s.wrapping_sub(1);
  }

  fn pull(&mut self, bus: &mut dyn Bus) -> u8 {
    self.s = self.s.wrapping_add(1);
    bus.read(STACK_BASE | (self.s as u16))
  }

  /// Run clock ticks until the current instruction has fully retired.
  pub fn step(&mut self, bus: &mut dyn Bus) {
    loop {
      self.clock(bus);
      if self.cycles_left == 0 {
        return;
      }
    }
  }

  /// One CPU-rate tick: either pay down the current instruction's cycle
  /// debt, or fetch, resolve and execute the next instruction in full and
  /// start paying for it.
  pub fn clock(&mut self, bus: &mut dyn Bus) {
    if self.cycles_left == 0 {
      let opcode = bus.read(self.pc);
      self.pc = self.pc.wrapping_add(1);

      let operation: &Operation = opcode.into();
      self.cycles_left = operation.cycles;

      if operation.instruction == INV {
        debug!(
          "illegal opcode {:02X} at {:04X}",
          opcode,
          self.pc.wrapping_sub(1)
        );
      }

      let resolve: AddressingModeFn = match operation.addressing_mode {
        IMP => imp,
        ACC => acc,
        IMM => imm,
        ZP0 => zp0,
        ZPX => zpx,
        ZPY => zpy,
        ABS => abs,
        ABX => abx,
        ABY => aby,
        IND => ind,
        IZX => izx,
        IZY => izy,
        REL => rel,
        OTH => oth,
      };
      let resolved = resolve(self, bus);

      let execute: InstructionFn = match operation.instruction {
        ADC => adc,
        AND => and,
        ASL => asl,
        BCC => bcc,
        BCS => bcs,
        BEQ => beq,
        BIT => bit,
        BMI => bmi,
        BNE => bne,
        BPL => bpl,
        BRK => brk,
        BVC => bvc,
        BVS => bvs,
        CLC => clc,
        CLD => cld,
        CLI => cli,
        CLV => clv,
        CMP => cmp,
        CPX => cpx,
        CPY => cpy,
        DEC => dec,
        DEX => dex,
        DEY => dey,
        EOR => eor,
        INC => inc,
        INX => inx,
        INY => iny,
        JMP => jmp,
        JSR => jsr,
        LDA => lda,
        LDX => ldx,
        LDY => ldy,
        LSR => lsr,
        NOP => nop,
        ORA => ora,
        PHA => pha,
        PHP => php,
        PLA => pla,
        PLP => plp,
        ROL => rol,
        ROR => ror,
        RTI => rti,
        RTS => rts,
        SBC => sbc,
        SEC => sec,
        SED => sed,
        SEI => sei,
        STA => sta,
        STX => stx,
        STY => sty,
        TAX => tax,
        TAY => tay,
        TSX => tsx,
        TXA => txa,
        TXS => txs,
        TYA => tya,
        INV => inv,
      };
      let extra = execute(self, bus, &resolved.data);

      // The addressing mode only reports that a page boundary was
      // crossed; whether that costs a cycle is the instruction's call.
      // Reads pay it, stores and read-modify-writes absorb it.
      if resolved.page_crossed && extra == PageCross {
        self.cycles_left += 1;
      }
    }

    self.cycles_left -= 1;
  }

  // SIGNALS

  /// Power-on / reset. The stack pointer and status bits I and U are
  /// forced; A, X and Y keep whatever they held before.
  pub fn sig_reset(&mut self, bus: &mut dyn Bus) {
    self.s = STACK_INIT;
    self.set_status(DisableInterrupts, true);
    self.set_status(Unused, true);
    self.pc = bus.read16(RESET_VECTOR);
    self.cycles_left = 8;
  }

  /// Maskable interrupt request; ignored while the I flag is set.
  pub fn sig_irq(&mut self, bus: &mut dyn Bus) {
    if self.get_status(DisableInterrupts) == 0 {
      self.interrupt(bus, IRQ_VECTOR, 7);
    }
  }

  /// Non-maskable interrupt; always honored.
  pub fn sig_nmi(&mut self, bus: &mut dyn Bus) {
    self.interrupt(bus, NMI_VECTOR, 8);
  }

  fn interrupt(&mut self, bus: &mut dyn Bus, vector: u16, cycles: u8) {
    self.push(bus, (self.pc >> 8) as u8);
    self.push(bus, (self.pc & 0x00FF) as u8);

    // Hardware interrupts push P with B clear and U set; I is raised
    // only after the push.
    self.set_status(Break, false);
    self.set_status(Unused, true);
    self.push(bus, self.status);
    self.set_status(DisableInterrupts, true);

    self.pc = bus.read16(vector);
    self.cycles_left = cycles;
  }
}

/// One cell of the decode table.
pub struct Operation {
  pub instruction: Instruction,
  pub addressing_mode: AddressingMode,
  pub cycles: u8,
  pub undocumented: bool,
}

enum DataSourceKind {
  Accumulator,
  AbsoluteAddress,
  Implicit,
}
use DataSourceKind::*;

/// Where an instruction's operand lives: the accumulator, a resolved bus
/// address, or nowhere at all.
pub struct DataSource {
  kind: DataSourceKind,
  addr: u16,
}

impl DataSource {
  fn read(&self, cpu: &Cpu, bus: &mut dyn Bus) -> u8 {
    match self.kind {
      Accumulator => cpu.a,
      AbsoluteAddress => bus.read(self.addr),
      Implicit => panic!("Cannot read from an implicit data source"),
    }
  }

  fn write(&self, cpu: &mut Cpu, bus: &mut dyn Bus, data: u8) {
    match self.kind {
      Accumulator => cpu.a = data,
      AbsoluteAddress => bus.write(self.addr, data),
      Implicit => panic!("Cannot write to an implicit data source"),
    }
  }
}

struct Resolved {
  data: DataSource,
  /// The effective address landed on a different page than the base
  /// address. Tentative; the instruction decides whether it is charged.
  page_crossed: bool,
}

type AddressingModeFn = fn(&mut Cpu, &mut dyn Bus) -> Resolved;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum AddressingMode {
  IMP,
  ACC,
  IMM,
  ZP0,
  ZPX,
  ZPY,
  ABS,
  ABX,
  ABY,
  IND,
  IZX,
  IZY,
  REL,
  /// Placeholder for the halt opcodes; no operand bytes, sentinel address.
  OTH,
}
use AddressingMode::*;

/// Handler verdict on the addressing mode's tentative page-cross cycle.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ExtraCycles {
  NoExtra,
  PageCross,
}
use ExtraCycles::*;

type InstructionFn = fn(&mut Cpu, &mut dyn Bus, &DataSource) -> ExtraCycles;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Instruction {
  ADC,
  AND,
  ASL,
  BCC,
  BCS,
  BEQ,
  BIT,
  BMI,
  BNE,
  BPL,
  BRK,
  BVC,
  BVS,
  CLC,
  CLD,
  CLI,
  CLV,
  CMP,
  CPX,
  CPY,
  DEC,
  DEX,
  DEY,
  EOR,
  INC,
  INX,
  INY,
  JMP,
  JSR,
  LDA,
  LDX,
  LDY,
  LSR,
  NOP,
  ORA,
  PHA,
  PHP,
  PLA,
  PLP,
  ROL,
  ROR,
  RTI,
  RTS,
  SBC,
  SEC,
  SED,
  SEI,
  STA,
  STX,
  STY,
  TAX,
  TAY,
  TSX,
  TXA,
  TXS,
  TYA,
  /// Every opcode byte outside the documented set. Decodes, burns its
  /// historically observed cycles, does nothing else.
  INV,
}
use Instruction::*;

// INSTRUCTIONS ///////////////////////////////////////////////////////////////

// Loads

/// Load Accumulator
fn lda(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  cpu.a = m;
  cpu.set_zn(m);
  PageCross
}

/// Load X
fn ldx(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  cpu.x = m;
  cpu.set_zn(m);
  PageCross
}

/// Load Y
fn ldy(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  cpu.y = m;
  cpu.set_zn(m);
  PageCross
}

// Stores

/// Store Accumulator
fn sta(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  data.write(cpu, bus, cpu.a);
  NoExtra
}

/// Store X
fn stx(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  data.write(cpu, bus, cpu.x);
  NoExtra
}

/// Store Y
fn sty(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  data.write(cpu, bus, cpu.y);
  NoExtra
}

// Transfers

/// Transfer Accumulator to X
fn tax(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.x = cpu.a;
  cpu.set_zn(cpu.x);
  NoExtra
}

/// Transfer Accumulator to Y
fn tay(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.y = cpu.a;
  cpu.set_zn(cpu.y);
  NoExtra
}

/// Transfer Stack Pointer to X
fn tsx(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.x = cpu.s;
  cpu.set_zn(cpu.x);
  NoExtra
}

/// Transfer X to Accumulator
fn txa(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.a = cpu.x;
  cpu.set_zn(cpu.a);
  NoExtra
}

/// Transfer X to Stack Pointer. The only transfer that leaves the flags
/// alone.
fn txs(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.s = cpu.x;
  NoExtra
}

/// Transfer Y to Accumulator
fn tya(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.a = cpu.y;
  cpu.set_zn(cpu.a);
  NoExtra
}

// Arithmetic

/// Shared add core: ADC is `A + M + C`, SBC feeds it `!M`.
fn add_with_carry(cpu: &mut Cpu, m: u8) -> ExtraCycles {
  let a = cpu.a as u16;
  let m = m as u16;
  let carry_in = if cpu.get_status(Carry) != 0 { 1 } else { 0 };
  let result = a + m + carry_in;

  // Signed overflow happened when both operands share a sign and the
  // result does not.
  let overflow = !(a ^ m) & (a ^ result) & 0x0080;
  cpu.set_status(Overflow, overflow != 0);
  cpu.set_status(Carry, result & 0xFF00 != 0);

  cpu.a = (result & 0x00FF) as u8;
  cpu.set_zn(cpu.a);
  PageCross
}

/// Add with Carry
fn adc(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  add_with_carry(cpu, m)
}

/// Subtract with Carry
fn sbc(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  add_with_carry(cpu, !m)
}

// Logic

/// Logical AND
fn and(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  cpu.a &= data.read(cpu, bus);
  cpu.set_zn(cpu.a);
  PageCross
}

/// Inclusive OR
fn ora(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  cpu.a |= data.read(cpu, bus);
  cpu.set_zn(cpu.a);
  PageCross
}

/// Exclusive OR
fn eor(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  cpu.a ^= data.read(cpu, bus);
  cpu.set_zn(cpu.a);
  PageCross
}

/// Bit Test: Z from `A & M`, N and V copied straight out of bits 7 and 6
/// of the memory operand.
fn bit(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  cpu.set_status(Zero, cpu.a & m == 0x00);
  cpu.set_status(Overflow, m & 0b0100_0000 != 0);
  cpu.set_status(Negative, m & 0b1000_0000 != 0);
  NoExtra
}

// Compares

fn compare(cpu: &mut Cpu, register: u8, m: u8) {
  let result = (register as u16).wrapping_sub(m as u16);
  cpu.set_status(Carry, register >= m);
  cpu.set_zn((result & 0x00FF) as u8);
}

/// Compare Accumulator
fn cmp(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  compare(cpu, cpu.a, m);
  PageCross
}

/// Compare X. Only zero-page and absolute encodings exist, so no
/// page-cross cycle to keep.
fn cpx(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  compare(cpu, cpu.x, m);
  NoExtra
}

/// Compare Y
fn cpy(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  compare(cpu, cpu.y, m);
  NoExtra
}

// Shifts and rotates

/// Arithmetic Shift Left
fn asl(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  let result = m << 1;
  cpu.set_status(Carry, m & 0x80 != 0);
  cpu.set_zn(result);
  data.write(cpu, bus, result);
  NoExtra
}

/// Logical Shift Right
fn lsr(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  let result = m >> 1;
  cpu.set_status(Carry, m & 0x01 != 0);
  cpu.set_zn(result);
  data.write(cpu, bus, result);
  NoExtra
}

/// Rotate Left through the carry flag
fn rol(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  let carry_in = if cpu.get_status(Carry) != 0 { 1 } else { 0 };
  let result = (m << 1) | carry_in;
  cpu.set_status(Carry, m & 0x80 != 0);
  cpu.set_zn(result);
  data.write(cpu, bus, result);
  NoExtra
}

/// Rotate Right through the carry flag
fn ror(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let m = data.read(cpu, bus);
  let carry_in: u8 = if cpu.get_status(Carry) != 0 { 0x80 } else { 0x00 };
  let result = (m >> 1) | carry_in;
  cpu.set_status(Carry, m & 0x01 != 0);
  cpu.set_zn(result);
  data.write(cpu, bus, result);
  NoExtra
}

// Increments and decrements

/// Increment Memory
fn inc(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let result = data.read(cpu, bus).wrapping_add(1);
  cpu.set_zn(result);
  data.write(cpu, bus, result);
  NoExtra
}

/// Decrement Memory
fn dec(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let result = data.read(cpu, bus).wrapping_sub(1);
  cpu.set_zn(result);
  data.write(cpu, bus, result);
  NoExtra
}

/// Increment X
fn inx(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.x = cpu.x.wrapping_add(1);
  cpu.set_zn(cpu.x);
  NoExtra
}

/// Increment Y
fn iny(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.y = cpu.y.wrapping_add(1);
  cpu.set_zn(cpu.y);
  NoExtra
}

/// Decrement X
fn dex(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.x = cpu.x.wrapping_sub(1);
  cpu.set_zn(cpu.x);
  NoExtra
}

/// Decrement Y
fn dey(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.y = cpu.y.wrapping_sub(1);
  cpu.set_zn(cpu.y);
  NoExtra
}

// Flag operations

/// Clear carry
fn clc(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.set_status(Carry, false);
  NoExtra
}

/// Set carry
fn sec(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.set_status(Carry, true);
  NoExtra
}

/// Clear decimal mode
fn cld(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.set_status(DecimalMode, false);
  NoExtra
}

/// Set decimal mode
fn sed(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.set_status(DecimalMode, true);
  NoExtra
}

/// Clear interrupt disable
fn cli(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.set_status(DisableInterrupts, false);
  NoExtra
}

/// Set interrupt disable
fn sei(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.set_status(DisableInterrupts, true);
  NoExtra
}

/// Clear overflow
fn clv(cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.set_status(Overflow, false);
  NoExtra
}

// Branches

/// Shared branch tail. A taken branch costs one extra cycle, two if the
/// target sits on a different page than the updated program counter.
/// Those cycles are charged here, so the resolver's tentative extra is
/// never kept.
fn branch_if(condition: bool, cpu: &mut Cpu, data: &DataSource) -> ExtraCycles {
  if condition {
    cpu.cycles_left += 1;
    if (data.addr & 0xFF00) != (cpu.pc & 0xFF00) {
      cpu.cycles_left += 1;
    }
    cpu.pc = data.addr;
  }
  NoExtra
}

/// Branch if Carry Clear
fn bcc(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  branch_if(cpu.get_status(Carry) == 0, cpu, data)
}

/// Branch if Carry Set
fn bcs(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  branch_if(cpu.get_status(Carry) != 0, cpu, data)
}

/// Branch if Equal
fn beq(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  branch_if(cpu.get_status(Zero) != 0, cpu, data)
}

/// Branch if Not Equal
fn bne(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  branch_if(cpu.get_status(Zero) == 0, cpu, data)
}

/// Branch if Minus
fn bmi(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  branch_if(cpu.get_status(Negative) != 0, cpu, data)
}

/// Branch if Positive
fn bpl(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  branch_if(cpu.get_status(Negative) == 0, cpu, data)
}

/// Branch if Overflow Clear
fn bvc(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  branch_if(cpu.get_status(Overflow) == 0, cpu, data)
}

/// Branch if Overflow Set
fn bvs(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  branch_if(cpu.get_status(Overflow) != 0, cpu, data)
}

// Stack operations

/// Push Accumulator
fn pha(cpu: &mut Cpu, bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.push(bus, cpu.a);
  NoExtra
}

/// Push Processor Status. Software pushes always carry B and U set.
fn php(cpu: &mut Cpu, bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.push(bus, cpu.status | (Break as u8) | (Unused as u8));
  NoExtra
}

/// Pull Accumulator
fn pla(cpu: &mut Cpu, bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.a = cpu.pull(bus);
  cpu.set_zn(cpu.a);
  NoExtra
}

/// Pull Processor Status. B is not a real flag and U is hardwired, so the
/// popped byte never controls them.
fn plp(cpu: &mut Cpu, bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.status = cpu.pull(bus);
  cpu.set_status(Break, false);
  cpu.set_status(Unused, true);
  NoExtra
}

// Jumps and calls

/// Jump
fn jmp(cpu: &mut Cpu, _bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  cpu.pc = data.addr;
  NoExtra
}

/// Jump to Subroutine. The pushed return address is the last byte of the
/// JSR itself; RTS compensates with its increment.
fn jsr(cpu: &mut Cpu, bus: &mut dyn Bus, data: &DataSource) -> ExtraCycles {
  let return_addr = cpu.pc.wrapping_sub(1);
  cpu.push(bus, (return_addr >> 8) as u8);
  cpu.push(bus, (return_addr & 0x00FF) as u8);
  cpu.pc = data.addr;
  NoExtra
}

/// Return from Subroutine
fn rts(cpu: &mut Cpu, bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  let lo = cpu.pull(bus) as u16;
  let hi = cpu.pull(bus) as u16;
  cpu.pc = ((hi << 8) | lo).wrapping_add(1);
  NoExtra
}

/// Return from Interrupt: pop P (B forced clear, U forced set), then pop
/// the program counter with no increment.
fn rti(cpu: &mut Cpu, bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.status = cpu.pull(bus);
  cpu.set_status(Break, false);
  cpu.set_status(Unused, true);

  let lo = cpu.pull(bus) as u16;
  let hi = cpu.pull(bus) as u16;
  cpu.pc = (hi << 8) | lo;
  NoExtra
}

// System

/// Software interrupt. Pushes the address of the byte after the padding
/// byte, pushes P with B and U set, raises I after the push, and vectors
/// through $FFFE.
fn brk(cpu: &mut Cpu, bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  cpu.pc = cpu.pc.wrapping_add(1);
  cpu.push(bus, (cpu.pc >> 8) as u8);
  cpu.push(bus, (cpu.pc & 0x00FF) as u8);
  cpu.push(bus, cpu.status | (Break as u8) | (Unused as u8));
  cpu.set_status(Break, false);
  cpu.set_status(DisableInterrupts, true);
  cpu.pc = bus.read16(IRQ_VECTOR);
  NoExtra
}

/// No operation
fn nop(_cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  NoExtra
}

/// Illegal opcode. Already logged at decode time; the table entry's cycle
/// count and addressing mode keep the program counter and the clock in
/// step, nothing else happens.
fn inv(_cpu: &mut Cpu, _bus: &mut dyn Bus, _data: &DataSource) -> ExtraCycles {
  NoExtra
}

// ADDRESSING MODES ///////////////////////////////////////////////////////////

/// Implied: the instruction carries no operand.
fn imp(_cpu: &mut Cpu, _bus: &mut dyn Bus) -> Resolved {
  Resolved {
    data: DataSource {
      kind: Implicit,
      addr: 0x0000,
    },
    page_crossed: false,
  }
}

/// Accumulator: the operand is A itself.
fn acc(_cpu: &mut Cpu, _bus: &mut dyn Bus) -> Resolved {
  Resolved {
    data: DataSource {
      kind: Accumulator,
      addr: 0x0000,
    },
    page_crossed: false,
  }
}

/// Immediate: the operand byte sits at the program counter.
fn imm(cpu: &mut Cpu, _bus: &mut dyn Bus) -> Resolved {
  let addr = cpu.pc;
  cpu.pc = cpu.pc.wrapping_add(1);
  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr,
    },
    page_crossed: false,
  }
}

/// Zero Page: one operand byte addressing the first 256 bytes of memory.
fn zp0(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let addr = bus.read(cpu.pc) as u16;
  cpu.pc = cpu.pc.wrapping_add(1);
  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr,
    },
    page_crossed: false,
  }
}

/// Zero Page, X: the index is added before the high byte is considered,
/// so the address wraps inside the zero page.
fn zpx(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let addr = bus.read(cpu.pc).wrapping_add(cpu.x) as u16;
  cpu.pc = cpu.pc.wrapping_add(1);
  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr,
    },
    page_crossed: false,
  }
}

/// Zero Page, Y
fn zpy(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let addr = bus.read(cpu.pc).wrapping_add(cpu.y) as u16;
  cpu.pc = cpu.pc.wrapping_add(1);
  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr,
    },
    page_crossed: false,
  }
}

fn read_operand16(cpu: &mut Cpu, bus: &mut dyn Bus) -> u16 {
  let lo = bus.read(cpu.pc) as u16;
  cpu.pc = cpu.pc.wrapping_add(1);
  let hi = bus.read(cpu.pc) as u16;
  cpu.pc = cpu.pc.wrapping_add(1);
  (hi << 8) | lo
}

/// Absolute: a full 16-bit address in the operand bytes.
fn abs(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let addr = read_operand16(cpu, bus);
  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr,
    },
    page_crossed: false,
  }
}

/// Absolute, X. Crossing out of the base page is reported so read
/// instructions can pay the oops cycle.
fn abx(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let base = read_operand16(cpu, bus);
  let addr = base.wrapping_add(cpu.x as u16);
  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr,
    },
    page_crossed: (addr & 0xFF00) != (base & 0xFF00),
  }
}

/// Absolute, Y
fn aby(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let base = read_operand16(cpu, bus);
  let addr = base.wrapping_add(cpu.y as u16);
  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr,
    },
    page_crossed: (addr & 0xFF00) != (base & 0xFF00),
  }
}

/// Indirect, used only by JMP. Reproduces the NMOS bug: when the pointer
/// sits at the end of a page the high byte is fetched from the start of
/// the same page, not the next one.
fn ind(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let ptr = read_operand16(cpu, bus);

  let lo = bus.read(ptr) as u16;
  let hi = if ptr & 0x00FF == 0x00FF {
    bus.read(ptr & 0xFF00) as u16
  } else {
    bus.read(ptr.wrapping_add(1)) as u16
  };

  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr: (hi << 8) | lo,
    },
    page_crossed: false,
  }
}

/// (Indirect, X): a zero-page pointer offset by X before dereferencing.
/// Both pointer bytes wrap inside the zero page.
fn izx(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let ptr = bus.read(cpu.pc);
  cpu.pc = cpu.pc.wrapping_add(1);

  let lo = bus.read(ptr.wrapping_add(cpu.x) as u16) as u16;
  let hi = bus.read(ptr.wrapping_add(cpu.x).wrapping_add(1) as u16) as u16;

  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr: (hi << 8) | lo,
    },
    page_crossed: false,
  }
}

/// (Indirect), Y: dereference a zero-page pointer, then add Y to the
/// result. The Y add can cross a page, which read instructions pay for.
fn izy(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let ptr = bus.read(cpu.pc);
  cpu.pc = cpu.pc.wrapping_add(1);

  let lo = bus.read(ptr as u16) as u16;
  let hi = bus.read(ptr.wrapping_add(1) as u16) as u16;
  let base = (hi << 8) | lo;
  let addr = base.wrapping_add(cpu.y as u16);

  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr,
    },
    page_crossed: (addr & 0xFF00) != (base & 0xFF00),
  }
}

/// Relative, for branches: a signed 8-bit displacement from the address
/// of the next instruction. Taken-branch cycle charges happen in the
/// branch handler, not here.
fn rel(cpu: &mut Cpu, bus: &mut dyn Bus) -> Resolved {
  let offset = bus.read(cpu.pc) as i8;
  cpu.pc = cpu.pc.wrapping_add(1);
  Resolved {
    data: DataSource {
      kind: AbsoluteAddress,
      addr: cpu.pc.wrapping_add(offset as i16 as u16),
    },
    page_crossed: false,
  }
}

/// Mode tag for the halt opcodes. No operand bytes; the sentinel address
/// is never dereferenced.
fn oth(_cpu: &mut Cpu, _bus: &mut dyn Bus) -> Resolved {
  Resolved {
    data: DataSource {
      kind: Implicit,
      addr: 0xFFFF,
    },
    page_crossed: false,
  }
}

// DECODE TABLE ///////////////////////////////////////////////////////////////

lazy_static! {
  /// All 256 opcode bytes. Cycle counts follow the standard NMOS 6502
  /// matrix; bytes outside the documented set decode to INV with the
  /// addressing mode and cycle count observed on real silicon, so a
  /// program that wanders into them keeps its timing and operand
  /// alignment.
  #[rustfmt::skip]
  static ref OPCODE_MAP: HashMap<u8, Operation> = {
    fn op(instruction: Instruction, addressing_mode: AddressingMode, cycles: u8) -> Operation {
      Operation { instruction, addressing_mode, cycles, undocumented: false }
    }
    fn inv(addressing_mode: AddressingMode, cycles: u8) -> Operation {
      Operation { instruction: INV, addressing_mode, cycles, undocumented: true }
    }

    hashmap! {
      0x00 => op(BRK, IMP, 7), 0x01 => op(ORA, IZX, 6), 0x02 => inv(OTH, 2), 0x03 => inv(IZX, 8),
      0x04 => inv(ZP0, 3),     0x05 => op(ORA, ZP0, 3), 0x06 => op(ASL, ZP0, 5), 0x07 => inv(ZP0, 5),
      0x08 => op(PHP, IMP, 3), 0x09 => op(ORA, IMM, 2), 0x0A => op(ASL, ACC, 2), 0x0B => inv(IMM, 2),
      0x0C => inv(ABS, 4),     0x0D => op(ORA, ABS, 4), 0x0E => op(ASL, ABS, 6), 0x0F => inv(ABS, 6),

      0x10 => op(BPL, REL, 2), 0x11 => op(ORA, IZY, 5), 0x12 => inv(OTH, 2), 0x13 => inv(IZY, 8),
      0x14 => inv(ZPX, 4),     0x15 => op(ORA, ZPX, 4), 0x16 => op(ASL, ZPX, 6), 0x17 => inv(ZPX, 6),
      0x18 => op(CLC, IMP, 2), 0x19 => op(ORA, ABY, 4), 0x1A => inv(IMP, 2), 0x1B => inv(ABY, 7),
      0x1C => inv(ABX, 4),     0x1D => op(ORA, ABX, 4), 0x1E => op(ASL, ABX, 7), 0x1F => inv(ABX, 7),

      0x20 => op(JSR, ABS, 6), 0x21 => op(AND, IZX, 6), 0x22 => inv(OTH, 2), 0x23 => inv(IZX, 8),
      0x24 => op(BIT, ZP0, 3), 0x25 => op(AND, ZP0, 3), 0x26 => op(ROL, ZP0, 5), 0x27 => inv(ZP0, 5),
      0x28 => op(PLP, IMP, 4), 0x29 => op(AND, IMM, 2), 0x2A => op(ROL, ACC, 2), 0x2B => inv(IMM, 2),
      0x2C => op(BIT, ABS, 4), 0x2D => op(AND, ABS, 4), 0x2E => op(ROL, ABS, 6), 0x2F => inv(ABS, 6),

      0x30 => op(BMI, REL, 2), 0x31 => op(AND, IZY, 5), 0x32 => inv(OTH, 2), 0x33 => inv(IZY, 8),
      0x34 => inv(ZPX, 4),     0x35 => op(AND, ZPX, 4), 0x36 => op(ROL, ZPX, 6), 0x37 => inv(ZPX, 6),
      0x38 => op(SEC, IMP, 2), 0x39 => op(AND, ABY, 4), 0x3A => inv(IMP, 2), 0x3B => inv(ABY, 7),
      0x3C => inv(ABX, 4),     0x3D => op(AND, ABX, 4), 0x3E => op(ROL, ABX, 7), 0x3F => inv(ABX, 7),

      0x40 => op(RTI, IMP, 6), 0x41 => op(EOR, IZX, 6), 0x42 => inv(OTH, 2), 0x43 => inv(IZX, 8),
      0x44 => inv(ZP0, 3),     0x45 => op(EOR, ZP0, 3), 0x46 => op(LSR, ZP0, 5), 0x47 => inv(ZP0, 5),
      0x48 => op(PHA, IMP, 3), 0x49 => op(EOR, IMM, 2), 0x4A => op(LSR, ACC, 2), 0x4B => inv(IMM, 2),
      0x4C => op(JMP, ABS, 3), 0x4D => op(EOR, ABS, 4), 0x4E => op(LSR, ABS, 6), 0x4F => inv(ABS, 6),

      0x50 => op(BVC, REL, 2), 0x51 => op(EOR, IZY, 5), 0x52 => inv(OTH, 2), 0x53 => inv(IZY, 8),
      0x54 => inv(ZPX, 4),     0x55 => op(EOR, ZPX, 4), 0x56 => op(LSR, ZPX, 6), 0x57 => inv(ZPX, 6),
      0x58 => op(CLI, IMP, 2), 0x59 => op(EOR, ABY, 4), 0x5A => inv(IMP, 2), 0x5B => inv(ABY, 7),
      0x5C => inv(ABX, 4),     0x5D => op(EOR, ABX, 4), 0x5E => op(LSR, ABX, 7), 0x5F => inv(ABX, 7),

      0x60 => op(RTS, IMP, 6), 0x61 => op(ADC, IZX, 6), 0x62 => inv(OTH, 2), 0x63 => inv(IZX, 8),
      0x64 => inv(ZP0, 3),     0x65 => op(ADC, ZP0, 3), 0x66 => op(ROR, ZP0, 5), 0x67 => inv(ZP0, 5),
      0x68 => op(PLA, IMP, 4), 0x69 => op(ADC, IMM, 2), 0x6A => op(ROR, ACC, 2), 0x6B => inv(IMM, 2),
      0x6C => op(JMP, IND, 5), 0x6D => op(ADC, ABS, 4), 0x6E => op(ROR, ABS, 6), 0x6F => inv(ABS, 6),

      0x70 => op(BVS, REL, 2), 0x71 => op(ADC, IZY, 5), 0x72 => inv(OTH, 2), 0x73 => inv(IZY, 8),
      0x74 => inv(ZPX, 4),     0x75 => op(ADC, ZPX, 4), 0x76 => op(ROR, ZPX, 6), 0x77 => inv(ZPX, 6),
      0x78 => op(SEI, IMP, 2), 0x79 => op(ADC, ABY, 4), 0x7A => inv(IMP, 2), 0x7B => inv(ABY, 7),
      0x7C => inv(ABX, 4),     0x7D => op(ADC, ABX, 4), 0x7E => op(ROR, ABX, 7), 0x7F => inv(ABX, 7),

      0x80 => inv(IMM, 2),     0x81 => op(STA, IZX, 6), 0x82 => inv(IMM, 2), 0x83 => inv(IZX, 6),
      0x84 => op(STY, ZP0, 3), 0x85 => op(STA, ZP0, 3), 0x86 => op(STX, ZP0, 3), 0x87 => inv(ZP0, 3),
      0x88 => op(DEY, IMP, 2), 0x89 => inv(IMM, 2),     0x8A => op(TXA, IMP, 2), 0x8B => inv(IMM, 2),
      0x8C => op(STY, ABS, 4), 0x8D => op(STA, ABS, 4), 0x8E => op(STX, ABS, 4), 0x8F => inv(ABS, 4),

      0x90 => op(BCC, REL, 2), 0x91 => op(STA, IZY, 6), 0x92 => inv(OTH, 2), 0x93 => inv(IZY, 6),
      0x94 => op(STY, ZPX, 4), 0x95 => op(STA, ZPX, 4), 0x96 => op(STX, ZPY, 4), 0x97 => inv(ZPY, 4),
      0x98 => op(TYA, IMP, 2), 0x99 => op(STA, ABY, 5), 0x9A => op(TXS, IMP, 2), 0x9B => inv(ABY, 5),
      0x9C => inv(ABX, 5),     0x9D => op(STA, ABX, 5), 0x9E => inv(ABY, 5), 0x9F => inv(ABY, 5),

      0xA0 => op(LDY, IMM, 2), 0xA1 => op(LDA, IZX, 6), 0xA2 => op(LDX, IMM, 2), 0xA3 => inv(IZX, 6),
      0xA4 => op(LDY, ZP0, 3), 0xA5 => op(LDA, ZP0, 3), 0xA6 => op(LDX, ZP0, 3), 0xA7 => inv(ZP0, 3),
      0xA8 => op(TAY, IMP, 2), 0xA9 => op(LDA, IMM, 2), 0xAA => op(TAX, IMP, 2), 0xAB => inv(IMM, 2),
      0xAC => op(LDY, ABS, 4), 0xAD => op(LDA, ABS, 4), 0xAE => op(LDX, ABS, 4), 0xAF => inv(ABS, 4),

      0xB0 => op(BCS, REL, 2), 0xB1 => op(LDA, IZY, 5), 0xB2 => inv(OTH, 2), 0xB3 => inv(IZY, 5),
      0xB4 => op(LDY, ZPX, 4), 0xB5 => op(LDA, ZPX, 4), 0xB6 => op(LDX, ZPY, 4), 0xB7 => inv(ZPY, 4),
      0xB8 => op(CLV, IMP, 2), 0xB9 => op(LDA, ABY, 4), 0xBA => op(TSX, IMP, 2), 0xBB => inv(ABY, 4),
      0xBC => op(LDY, ABX, 4), 0xBD => op(LDA, ABX, 4), 0xBE => op(LDX, ABY, 4), 0xBF => inv(ABY, 4),

      0xC0 => op(CPY, IMM, 2), 0xC1 => op(CMP, IZX, 6), 0xC2 => inv(IMM, 2), 0xC3 => inv(IZX, 8),
      0xC4 => op(CPY, ZP0, 3), 0xC5 => op(CMP, ZP0, 3), 0xC6 => op(DEC, ZP0, 5), 0xC7 => inv(ZP0, 5),
      0xC8 => op(INY, IMP, 2), 0xC9 => op(CMP, IMM, 2), 0xCA => op(DEX, IMP, 2), 0xCB => inv(IMM, 2),
      0xCC => op(CPY, ABS, 4), 0xCD => op(CMP, ABS, 4), 0xCE => op(DEC, ABS, 6), 0xCF => inv(ABS, 6),

      0xD0 => op(BNE, REL, 2), 0xD1 => op(CMP, IZY, 5), 0xD2 => inv(OTH, 2), 0xD3 => inv(IZY, 8),
      0xD4 => inv(ZPX, 4),     0xD5 => op(CMP, ZPX, 4), 0xD6 => op(DEC, ZPX, 6), 0xD7 => inv(ZPX, 6),
      0xD8 => op(CLD, IMP, 2), 0xD9 => op(CMP, ABY, 4), 0xDA => inv(IMP, 2), 0xDB => inv(ABY, 7),
      0xDC => inv(ABX, 4),     0xDD => op(CMP, ABX, 4), 0xDE => op(DEC, ABX, 7), 0xDF => inv(ABX, 7),

      0xE0 => op(CPX, IMM, 2), 0xE1 => op(SBC, IZX, 6), 0xE2 => inv(IMM, 2), 0xE3 => inv(IZX, 8),
      0xE4 => op(CPX, ZP0, 3), 0xE5 => op(SBC, ZP0, 3), 0xE6 => op(INC, ZP0, 5), 0xE7 => inv(ZP0, 5),
      0xE8 => op(INX, IMP, 2), 0xE9 => op(SBC, IMM, 2), 0xEA => op(NOP, IMP, 2), 0xEB => inv(IMM, 2),
      0xEC => op(CPX, ABS, 4), 0xED => op(SBC, ABS, 4), 0xEE => op(INC, ABS, 6), 0xEF => inv(ABS, 6),

      0xF0 => op(BEQ, REL, 2), 0xF1 => op(SBC, IZY, 5), 0xF2 => inv(OTH, 2), 0xF3 => inv(IZY, 8),
      0xF4 => inv(ZPX, 4),     0xF5 => op(SBC, ZPX, 4), 0xF6 => op(INC, ZPX, 6), 0xF7 => inv(ZPX, 6),
      0xF8 => op(SED, IMP, 2), 0xF9 => op(SBC, ABY, 4), 0xFA => inv(IMP, 2), 0xFB => inv(ABY, 7),
      0xFC => inv(ABX, 4),     0xFD => op(SBC, ABX, 4), 0xFE => op(INC, ABX, 7), 0xFF => inv(ABX, 7),
    }
  };
}

impl From<u8> for &'static Operation {
  fn from(opcode: u8) -> Self {
    // The map covers every opcode byte, so the lookup is total.
    &OPCODE_MAP[&opcode]
  }
}
