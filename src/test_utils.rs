//! Shared iNES image builders for tests.

use crate::cart::{CHR_BANK_SIZE, HEADER_SIZE, PRG_BANK_SIZE};

/// Minimal iNES image. PRG bytes are filled with $42 and CHR bytes with
/// $43 so tests can tell the sections apart.
pub fn build_image(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> Vec<u8> {
  let mut data = vec![
    0x4E, 0x45, 0x53, 0x1A, // magic
    prg_banks, chr_banks, flags6, flags7, // sizes + flags
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // extensions, unused
  ];
  data.resize(HEADER_SIZE + prg_banks as usize * PRG_BANK_SIZE, 0x42);
  let total = data.len() + chr_banks as usize * CHR_BANK_SIZE;
  data.resize(total, 0x43);
  data
}

/// Single-bank NROM image (CHR RAM) with `program` at $8000 and the
/// reset vector pointing there. When `nmi_offset` is given, the NMI
/// vector points at `$8000 + nmi_offset`.
pub fn program_image(program: &[u8], nmi_offset: Option<u8>) -> Vec<u8> {
  let mut image = build_image(1, 0, 0x00, 0x00);
  for (i, byte) in program.iter().enumerate() {
    image[HEADER_SIZE + i] = *byte;
  }
  // $FFFC maps to PRG offset $3FFC in a mirrored 16 KiB bank.
  image[HEADER_SIZE + 0x3FFC] = 0x00;
  image[HEADER_SIZE + 0x3FFD] = 0x80;
  if let Some(offset) = nmi_offset {
    image[HEADER_SIZE + 0x3FFA] = offset;
    image[HEADER_SIZE + 0x3FFB] = 0x80;
  }
  image
}
