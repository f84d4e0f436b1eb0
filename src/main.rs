use docopt::Docopt;
use log::error;
use serde::Deserialize;

use nesling::nes::{Nes, Region};
use nesling::trace::trace;

const USAGE: &'static str = "
Headless NES core runner.

Usage:
  nesling <rom> [--region=<region>] [--frames=<n>] [--trace]
  nesling (-h | --help)

Options:
  -h --help          Show this screen.
  --region=<region>  Video standard, ntsc or pal [default: ntsc].
  --frames=<n>       Number of frames to emulate [default: 60].
  --trace            Print a nestest-style line per instruction.
";

#[derive(Deserialize)]
struct Args {
  arg_rom: String,
  flag_region: String,
  flag_frames: u64,
  flag_trace: bool,
}

fn main() {
  env_logger::init();

  let args: Args = Docopt::new(USAGE)
    .and_then(|d| d.deserialize())
    .unwrap_or_else(|e| e.exit());

  let region = match args.flag_region.to_lowercase().as_str() {
    "ntsc" => Region::Ntsc,
    "pal" => Region::Pal,
    other => {
      error!("unknown region {:?}; expected ntsc or pal", other);
      std::process::exit(1);
    }
  };

  let mut nes = match Nes::from_file(&args.arg_rom, region) {
    Ok(nes) => nes,
    Err(msg) => {
      error!("{}", msg);
      std::process::exit(1);
    }
  };
  nes.reset();

  if args.flag_trace {
    // Instruction-stepped so every executed opcode gets a line; frames
    // still advance through the same master clock.
    let mut frames = 0;
    nes.step();
    while frames < args.flag_frames {
      println!("{}", trace(&nes));
      nes.step();
      if nes.ppu.frame_complete {
        nes.ppu.frame_complete = false;
        frames += 1;
      }
    }
  } else {
    for _ in 0..args.flag_frames {
      nes.frame();
    }
  }

  println!("{} frames emulated ({:?})", args.flag_frames, region);
}
