use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::error;

use wfs::wfs::disk::DiskSet;
use wfs::wfs::verify::verify;

const EXIT_FAILURE: i32 = 1;
const EXIT_DIVERGED: i32 = 2;

/// Compare the replicated regions of every disk in a wfs set.
#[derive(Debug, Parser)]
#[clap(name = "wfsck", version)]
struct BinArgs {
  /// Disk images of one set, in any order
  #[clap(required = true)]
  disks: Vec<PathBuf>,
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

  let args = match BinArgs::try_parse() {
    Ok(args) => args,
    Err(message) => {
      println!("wfsck: invalid arguments: {message}");
      exit(EXIT_FAILURE);
    },
  };

  let report = match DiskSet::open(&args.disks).and_then(|disks| verify(&disks)) {
    Ok(report) => report,
    Err(errno) => {
      error!("wfsck: {errno}");
      exit(EXIT_FAILURE);
    },
  };

  println!("{report}");
  if !report.is_consistent() {
    exit(EXIT_DIVERGED);
  }
}

// vim:ts=2 sw=2
