pub mod nrom;

use nrom::Nrom;

/// Result of asking a mapper to translate a CPU or PPU address.
pub enum MappedRead {
  /// The access lands at this offset into the matching ROM/RAM bank.
  Offset(usize),
  /// The address does not belong to the cartridge.
  Skip,
}

pub enum MappedWrite {
  Offset(usize),
  /// The cartridge claims the address but the backing store is read-only;
  /// the write is consumed and dropped (some boards use such writes as
  /// control signals, NROM does not).
  Discarded,
  Skip,
}

/// Cartridge-side address translation.
///
/// A mapper never touches the byte stores itself; it only turns bus
/// addresses into offsets so the cartridge can index its PRG or CHR data.
pub trait Mapper {
  fn cpu_map_read(&self, addr: u16) -> MappedRead;
  fn cpu_map_write(&self, addr: u16) -> MappedWrite;
  fn ppu_map_read(&self, addr: u16) -> MappedRead;
  fn ppu_map_write(&self, addr: u16) -> MappedWrite;
}

/// Build the mapper for an iNES mapper id. Only NROM (id 0) is supported;
/// anything else fails cartridge construction.
pub fn from_id(id: u8, prg_banks: usize, chr_banks: usize) -> Result<Box<dyn Mapper>, String> {
  match id {
    0 => Ok(Box::new(Nrom::new(prg_banks, chr_banks)?)),
    _ => Err(format!("Unsupported mapper {:03}", id)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_nrom_is_supported() {
    assert!(from_id(0, 1, 1).is_ok());
    assert_eq!(from_id(1, 8, 0).err().unwrap(), "Unsupported mapper 001");
    assert_eq!(from_id(66, 2, 1).err().unwrap(), "Unsupported mapper 066");
  }
}
