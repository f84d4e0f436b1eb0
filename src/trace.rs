use crate::cpu6502::{AddressingMode, Operation};
use crate::nes::Nes;

/// Format the instruction at the current program counter as a
/// nestest-style log line:
///
/// ```text
/// C000  4C F5 C5  JMP $C5F5                       A:00 X:00 Y:00 P:24 SP:FD
/// ```
///
/// Only side-effect-free bus reads are used, so tracing never perturbs
/// the machine being traced.
pub fn trace(nes: &Nes) -> String {
  let pc = nes.cpu.pc;
  let opcode = nes.safe_cpu_read(pc);
  let operation: &Operation = opcode.into();

  use AddressingMode::*;

  let operand_len = match operation.addressing_mode {
    IMP | ACC | OTH => 0,
    IMM | ZP0 | ZPX | ZPY | IZX | IZY | REL => 1,
    ABS | ABX | ABY | IND => 2,
  };

  let mut raw = vec![opcode];
  for i in 1..=operand_len {
    raw.push(nes.safe_cpu_read(pc.wrapping_add(i)));
  }

  let raw_bytes = raw
    .iter()
    .map(|byte| format!("{:02X}", byte))
    .collect::<Vec<String>>()
    .join(" ");

  let abs_operand = || ((raw[2] as u16) << 8) | raw[1] as u16;
  let operand = match operation.addressing_mode {
    IMP | OTH => String::new(),
    ACC => "A".to_string(),
    IMM => format!("#${:02X}", raw[1]),
    ZP0 => format!("${:02X}", raw[1]),
    ZPX => format!("${:02X},X", raw[1]),
    ZPY => format!("${:02X},Y", raw[1]),
    ABS => format!("${:04X}", abs_operand()),
    ABX => format!("${:04X},X", abs_operand()),
    ABY => format!("${:04X},Y", abs_operand()),
    IND => format!("(${:04X})", abs_operand()),
    IZX => format!("(${:02X},X)", raw[1]),
    IZY => format!("(${:02X}),Y", raw[1]),
    REL => {
      // Branch target relative to the following instruction.
      let target = pc.wrapping_add(2).wrapping_add(raw[1] as i8 as i16 as u16);
      format!("${:04X}", target)
    }
  };

  format!(
    "{:04X}  {:<8} {}{:?} {:<26}  A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X}",
    pc,
    raw_bytes,
    if operation.undocumented { "*" } else { " " },
    operation.instruction,
    operand,
    nes.cpu.a,
    nes.cpu.x,
    nes.cpu.y,
    nes.cpu.status,
    nes.cpu.s
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cart::Cart;
  use crate::nes::Region;
  use pretty_assertions::assert_eq;

  fn test_nes(program: &[u8]) -> Nes {
    let image = crate::test_utils::program_image(program, None);
    let mut nes = Nes::new(Cart::new(&image).unwrap(), Region::Ntsc);
    nes.reset();
    nes.step(); // drain the reset sequence
    nes
  }

  #[test]
  fn formats_immediate_and_implied_instructions() {
    let mut nes = test_nes(&[0xA2, 0x01, 0xCA]);
    nes.cpu.a = 1;
    nes.cpu.x = 2;
    nes.cpu.y = 3;

    let expected = format!(
      "8000  A2 01     LDX #$01{}A:01 X:02 Y:03 P:24 SP:FD",
      " ".repeat(24)
    );
    assert_eq!(trace(&nes), expected);

    nes.step();
    let expected = format!(
      "8002  CA        DEX{}A:01 X:01 Y:03 P:24 SP:FD",
      " ".repeat(29)
    );
    assert_eq!(trace(&nes), expected);
  }

  #[test]
  fn formats_absolute_and_indirect_operands() {
    let nes = test_nes(&[0x4C, 0xF5, 0xC5]);
    let expected = format!(
      "8000  4C F5 C5  JMP $C5F5{}A:00 X:00 Y:00 P:24 SP:FD",
      " ".repeat(23)
    );
    assert_eq!(trace(&nes), expected);

    let nes = test_nes(&[0x6C, 0xFF, 0x02]);
    assert!(trace(&nes).contains("JMP ($02FF)"));
  }

  #[test]
  fn formats_branch_targets_as_absolute_addresses() {
    let nes = test_nes(&[0xF0, 0x04]);
    assert!(trace(&nes).starts_with("8000  F0 04     BEQ $8006"));

    // Negative displacement.
    let nes = test_nes(&[0xF0, 0xFC]);
    assert!(trace(&nes).starts_with("8000  F0 FC     BEQ $7FFE"));
  }

  #[test]
  fn marks_undocumented_opcodes() {
    let nes = test_nes(&[0x04, 0x33]);
    assert!(trace(&nes).starts_with("8000  04 33    *INV $33"));
  }

  #[test]
  fn formats_indexed_indirect_operands() {
    let nes = test_nes(&[0xA1, 0x20]);
    assert!(trace(&nes).contains("LDA ($20,X)"));

    let nes = test_nes(&[0xB1, 0x20]);
    assert!(trace(&nes).contains("LDA ($20),Y"));
  }
}
