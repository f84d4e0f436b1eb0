use super::{MappedRead, MappedWrite, Mapper};

/// Mapper 0. No bank switching: 16 KiB PRG mirrored across $8000-$FFFF, or
/// 32 KiB PRG mapped flat; CHR is an 8 KiB ROM, or RAM when the header
/// declares zero CHR banks.
pub struct Nrom {
  prg_mask: u16,
  chr_writable: bool,
}

impl Nrom {
  pub fn new(prg_banks: usize, chr_banks: usize) -> Result<Nrom, String> {
    let prg_mask = match prg_banks {
      1 => 0x3FFF,
      2 => 0x7FFF,
      n => return Err(format!("NROM supports 1 or 2 PRG banks, got {}", n)),
    };

    Ok(Nrom {
      prg_mask,
      chr_writable: chr_banks == 0,
    })
  }
}

impl Mapper for Nrom {
  fn cpu_map_read(&self, addr: u16) -> MappedRead {
    if addr >= 0x8000 {
      MappedRead::Offset((addr & self.prg_mask) as usize)
    } else {
      MappedRead::Skip
    }
  }

  fn cpu_map_write(&self, addr: u16) -> MappedWrite {
    if addr >= 0x8000 {
      MappedWrite::Discarded
    } else {
      MappedWrite::Skip
    }
  }

  fn ppu_map_read(&self, addr: u16) -> MappedRead {
    if addr <= 0x1FFF {
      MappedRead::Offset(addr as usize)
    } else {
      MappedRead::Skip
    }
  }

  fn ppu_map_write(&self, addr: u16) -> MappedWrite {
    if addr > 0x1FFF {
      MappedWrite::Skip
    } else if self.chr_writable {
      MappedWrite::Offset(addr as usize)
    } else {
      MappedWrite::Discarded
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn offset(mapped: MappedRead) -> Option<usize> {
    match mapped {
      MappedRead::Offset(o) => Some(o),
      MappedRead::Skip => None,
    }
  }

  #[test]
  fn single_bank_mirrors_upper_half() {
    let nrom = Nrom::new(1, 1).unwrap();
    assert_eq!(offset(nrom.cpu_map_read(0x8000)), Some(0x0000));
    assert_eq!(offset(nrom.cpu_map_read(0xC000)), Some(0x0000));
    assert_eq!(offset(nrom.cpu_map_read(0xFFFC)), Some(0x3FFC));
    assert_eq!(offset(nrom.cpu_map_read(0x7FFF)), None);
  }

  #[test]
  fn double_bank_maps_flat() {
    let nrom = Nrom::new(2, 1).unwrap();
    assert_eq!(offset(nrom.cpu_map_read(0x8000)), Some(0x0000));
    assert_eq!(offset(nrom.cpu_map_read(0xC000)), Some(0x4000));
    assert_eq!(offset(nrom.cpu_map_read(0xFFFF)), Some(0x7FFF));
  }

  #[test]
  fn rejects_oversized_prg() {
    assert!(Nrom::new(3, 1).is_err());
    assert!(Nrom::new(0, 1).is_err());
  }

  #[test]
  fn chr_rom_discards_writes_chr_ram_accepts_them() {
    let rom = Nrom::new(1, 1).unwrap();
    assert!(matches!(rom.ppu_map_write(0x1234), MappedWrite::Discarded));

    let ram = Nrom::new(1, 0).unwrap();
    assert!(matches!(ram.ppu_map_write(0x1234), MappedWrite::Offset(0x1234)));
    assert!(matches!(ram.ppu_map_write(0x2000), MappedWrite::Skip));
  }
}
