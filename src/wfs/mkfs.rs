//! Image builder: lays out and initialises a fresh disk set.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::{debug, info};
use uuid::Uuid;

use crate::util::{unixtime, Owner};

use super::bitmap::with_bit;
use super::errno::Errno;
use super::fs::FileMode;
use super::layout::{Inode, Layout, Superblock, MAX_DISKS, MIN_DISKS, NO_BLOCK, N_BLOCKS, ROOT_INODE_NUMBER};
use super::raid::RaidMode;

/// Counts are rounded up to a multiple of this.
pub const ROUND_TO: usize = 32;

#[derive(Debug, Clone)]
pub struct MkfsOptions {
  pub raid: RaidMode,
  pub disks: Vec<PathBuf>,
  pub num_inodes: usize,
  pub num_data_blocks: usize,
}

fn round_up(count: usize) -> usize {
  (count + ROUND_TO - 1) / ROUND_TO * ROUND_TO
}

/// Bytes an image needs for the given (unrounded) counts.
pub fn required_size(num_inodes: usize, num_data_blocks: usize) -> usize {
  Layout::for_counts(round_up(num_inodes), round_up(num_data_blocks)).end()
}

/// Format every image in `options.disks` as one set. Returns the superblock
/// written to each disk, in argument order.
pub fn format(options: &MkfsOptions) -> Result<Vec<Superblock>, Errno> {
  if options.disks.len() < MIN_DISKS {
    return Err(Errno::InvalidArgument("mkfs: not enough disks"));
  }
  if options.disks.len() > MAX_DISKS {
    return Err(Errno::InvalidArgument("mkfs: too many disks"));
  }
  if options.num_inodes == 0 || options.num_data_blocks == 0 {
    return Err(Errno::InvalidArgument("mkfs: inode and block counts must be positive"));
  }

  let layout = Layout::for_counts(round_up(options.num_inodes), round_up(options.num_data_blocks));

  // Check every image before touching any of them
  for path in &options.disks {
    let len = std::fs::metadata(path)?.len() as usize;
    if len < layout.end() {
      return Err(Errno::NoSpace("mkfs: disk image too small for the requested counts"));
    }
  }

  let ids = options
    .disks
    .iter()
    .map(|_| Uuid::new_v4().to_string())
    .collect::<Vec<_>>();

  let owner = Owner::effective();
  let now = unixtime();
  let root = Inode {
    num: ROOT_INODE_NUMBER as i32,
    mode: FileMode::dir(0o755),
    uid: owner.uid,
    gid: owner.gid,
    size: 0,
    nlinks: 1,
    atim: now,
    mtim: now,
    ctim: now,
    blocks: [NO_BLOCK; N_BLOCKS],
  };

  let mut inode_bitmap = vec![0u8; layout.inode_bitmap_len()];
  let (index, byte) = with_bit(&inode_bitmap, ROOT_INODE_NUMBER, true);
  inode_bitmap[index] = byte;
  let data_bitmap = vec![0u8; layout.data_bitmap_len()];

  let mut superblocks = Vec::with_capacity(ids.len());
  for (path, id) in options.disks.iter().zip(&ids) {
    let superblock = Superblock {
      num_inodes: layout.num_inodes as u64,
      num_data_blocks: layout.num_data_blocks as u64,
      i_bitmap_ptr: layout.inode_bitmap() as i64,
      d_bitmap_ptr: layout.data_bitmap() as i64,
      i_blocks_ptr: layout.inode_table() as i64,
      d_blocks_ptr: layout.data_region() as i64,
      raid: options.raid,
      id: id.clone(),
      disks: ids.clone(),
    };

    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&superblock.encode())?;
    file.seek(SeekFrom::Start(layout.inode_bitmap() as u64))?;
    file.write_all(&inode_bitmap)?;
    file.seek(SeekFrom::Start(layout.data_bitmap() as u64))?;
    file.write_all(&data_bitmap)?;
    file.seek(SeekFrom::Start(layout.inode(ROOT_INODE_NUMBER) as u64))?;
    file.write_all(&root.encode())?;
    file.sync_all()?;

    debug!("mkfs: formatted {} as {id}", path.display());
    superblocks.push(superblock);
  }

  info!(
    "mkfs: {} disks in {} mode, {} inodes, {} data blocks per disk",
    ids.len(),
    options.raid,
    layout.num_inodes,
    layout.num_data_blocks
  );
  Ok(superblocks)
}


// vim:ts=2 sw=2
