use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::error;

use wfs::wfs::mkfs::{self, MkfsOptions};
use wfs::wfs::RaidMode;

const EXIT_FAILURE: i32 = 1;

/// Format disk images as one wfs set.
#[derive(Debug, Parser)]
#[clap(name = "mkfs", version)]
struct BinArgs {
  /// Raid mode: 0, 1 or 1v
  #[clap(short = 'r')]
  raid: RaidMode,

  /// Disk image, repeated once per disk
  #[clap(short = 'd', required = true)]
  disks: Vec<PathBuf>,

  /// Number of inodes, rounded up to a multiple of 32
  #[clap(short = 'i')]
  inodes: usize,

  /// Data blocks per disk, rounded up to a multiple of 32
  #[clap(short = 'b')]
  blocks: usize,
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let args = match BinArgs::try_parse() {
    Ok(args) => args,
    Err(message) => {
      println!("mkfs: invalid arguments: {message}");
      exit(EXIT_FAILURE);
    },
  };

  let options = MkfsOptions {
    raid: args.raid,
    disks: args.disks,
    num_inodes: args.inodes,
    num_data_blocks: args.blocks,
  };

  if let Err(errno) = mkfs::format(&options) {
    error!("mkfs: {errno}");
    exit(errno.errno());
  }
}

// vim:ts=2 sw=2
