use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::{debug, error};

use wfs::config::MountConfig;
use wfs::wfs::fuse::FuseAdapter;
use wfs::wfs::WfsFilesystem;

const EXIT_FAILURE: i32 = 1;

/// Mount a wfs disk set.
///
/// `wfs disk1 disk2 [-o opt]... mountpoint`
#[derive(Debug, Parser)]
#[clap(name = "wfs", version)]
struct BinArgs {
  /// YAML file with `disks`, `mountpoint`, `options` and `log_level`
  #[clap(short, long)]
  config: Option<PathBuf>,

  /// Mount option, may be repeated or comma separated
  #[clap(short = 'o')]
  options: Vec<String>,

  /// Stay in the foreground (the only mode there is)
  #[clap(short = 'f', takes_value = false)]
  foreground: bool,

  /// Single-threaded dispatch (the only mode there is)
  #[clap(short = 's', takes_value = false)]
  single_threaded: bool,

  /// Disk images followed by the mountpoint
  paths: Vec<PathBuf>,
}

fn main() {
  let args = match BinArgs::try_parse() {
    Ok(args) => args,
    Err(message) => {
      println!("wfs: invalid arguments: {message}");
      exit(EXIT_FAILURE);
    },
  };

  let config = match &args.config {
    Some(path) => match MountConfig::load(path) {
      Ok(config) => config,
      Err(err) => {
        println!("wfs: {err}");
        exit(EXIT_FAILURE);
      },
    },
    None => MountConfig::default(),
  };

  let mut paths = args.paths;
  let mountpoint = if paths.len() > 1 || config.mountpoint.is_none() { paths.pop() } else { None };
  let options = args
    .options
    .iter()
    .flat_map(|option| option.split(','))
    .filter(|option| !option.is_empty())
    .map(str::to_owned)
    .collect();
  let config = config.merge(paths, mountpoint, options);

  let level = config.log_level.clone().unwrap_or_else(|| "info".to_owned());
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
  debug!(
    "wfs: foreground: {}, single-threaded: {} (dispatch is always both)",
    args.foreground, args.single_threaded
  );

  let (disks, mountpoint) = match config.validate() {
    Ok(valid) => valid,
    Err(err) => {
      error!("{err}");
      exit(EXIT_FAILURE);
    },
  };

  let fs = match WfsFilesystem::mount(disks) {
    Ok(fs) => fs,
    Err(errno) => {
      error!("wfs: can't mount: {errno}");
      exit(EXIT_FAILURE);
    },
  };

  if let Err(errno) = FuseAdapter::new(fs).mount(mountpoint, &config.options) {
    error!("wfs: {}: {errno}", mountpoint.display());
    exit(EXIT_FAILURE);
  }
}


// vim:ts=2 sw=2
