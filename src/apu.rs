/// APU register stub.
///
/// Audio synthesis lives outside this core, but the bus still has to
/// decode $4000-$4013, $4015 and the $4017 frame-counter write so that
/// programs poking the APU neither crash nor leak into other devices.
/// Reads return an open-bus zero; writes are consumed and dropped.
pub struct Apu;

impl Apu {
  pub fn new() -> Apu {
    Apu
  }

  pub fn cpu_read(&mut self, addr: u16) -> Option<u8> {
    match addr {
      0x4000..=0x4013 | 0x4015 => Some(0x00),
      _ => None,
    }
  }

  pub fn cpu_write(&mut self, addr: u16, _data: u8) -> Option<()> {
    match addr {
      // $4017 is the frame counter on writes; reads of $4017 belong to
      // the second controller port and are claimed by `Peripherals`.
      0x4000..=0x4013 | 0x4015 | 0x4017 => Some(()),
      _ => None,
    }
  }
}
