//! Inode table access and the two bitmap allocators.

use log::{debug, warn};

use crate::util::unixtime;

use super::bitmap::{count_set, first_fit, is_set, with_bit};
use super::diskfs::WfsFilesystem;
use super::errno::Errno;
use super::fs::{FileMode, InodeNumber};
use super::layout::{Inode, BLOCK_SIZE, FREE, INODE_SIZE, NO_BLOCK, N_BLOCKS, SENTINEL_BYTE};
use super::raid::{Mutation, Physical, RaidMode};

/// Free and total counts across the mounted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
  pub inodes: usize,
  pub free_inodes: usize,
  pub blocks: usize,
  pub free_blocks: usize,
}

impl WfsFilesystem {
  pub fn read_inode(&self, num: InodeNumber) -> Result<Inode, Errno> {
    let layout = self.disks.layout()?;
    if num >= layout.num_inodes {
      return Err(Errno::NotFound("wfs.read_inode: inode number out of range"));
    }
    Inode::decode(self.disks.read_metadata(layout.inode(num), INODE_SIZE)?)
  }

  pub(super) fn write_inode(&mut self, inode: &Inode) -> Result<(), Errno> {
    let layout = self.disks.layout()?;
    let num = usize::try_from(inode.num)
      .map_err(|_| Errno::InvalidArgument("wfs.write_inode: released inode"))?;
    self
      .disks
      .commit(Mutation::Metadata { offset: layout.inode(num) }, &inode.encode())
  }

  /// Claim the first free inode and initialise it with `mode`.
  pub fn alloc_inode(&mut self, mode: FileMode) -> Result<Inode, Errno> {
    let layout = self.disks.layout()?;
    let bitmap = self.disks.read_metadata(layout.inode_bitmap(), layout.inode_bitmap_len())?;
    let (_, num) = first_fit(layout.num_inodes, 1, |_, bit| is_set(bitmap, bit))
      .ok_or(Errno::NoSpace("wfs.alloc_inode: no free inodes"))?;
    let (index, byte) = with_bit(bitmap, num, true);

    self
      .disks
      .commit(Mutation::Metadata { offset: layout.inode_bitmap() + index }, &[byte])?;

    let now = unixtime();
    let inode = Inode {
      num: num as i32,
      mode,
      uid: self.owner.uid,
      gid: self.owner.gid,
      size: 0,
      // regular files start at two links, everything else at one
      nlinks: if mode.is_file() { 2 } else { 1 },
      atim: now,
      mtim: now,
      ctim: now,
      blocks: [NO_BLOCK; N_BLOCKS],
    };
    self.write_inode(&inode)?;

    debug!("wfs.alloc_inode: claimed inode {num} (mode {:o})", mode.get_raw());
    Ok(inode)
  }

  /// Clear the bitmap bit and mark the slot released. Contents stay stale.
  pub fn free_inode(&mut self, num: InodeNumber) -> Result<(), Errno> {
    let layout = self.disks.layout()?;
    if num >= layout.num_inodes {
      return Err(Errno::NotFound("wfs.free_inode: inode number out of range"));
    }
    let bitmap = self.disks.read_metadata(layout.inode_bitmap(), layout.inode_bitmap_len())?;
    if !is_set(bitmap, num) {
      warn!("wfs.free_inode: inode {num} was not allocated");
    }
    let (index, byte) = with_bit(bitmap, num, false);

    self
      .disks
      .commit(Mutation::Metadata { offset: layout.inode_bitmap() + index }, &[byte])?;
    self
      .disks
      .commit(Mutation::Metadata { offset: layout.inode(num) }, &FREE.to_le_bytes())?;

    debug!("wfs.free_inode: released inode {num}");
    Ok(())
  }

  /// Claim a data block and fill it with the sentinel pattern, so it can
  /// serve as an empty directory page straight away.
  ///
  /// Striped sets scan every disk at each bit position before moving on,
  /// which hands out consecutive logical numbers round-robin.
  pub fn alloc_block(&mut self) -> Result<i64, Errno> {
    let layout = self.disks.layout()?;
    let lanes = match self.disks.raid() {
      RaidMode::Raid0 => self.disks.len(),
      RaidMode::Raid1 | RaidMode::Raid1v => 1,
    };
    let bitmaps = (0..lanes)
      .map(|disk| self.disks.read_data_bitmap(disk))
      .collect::<Result<Vec<_>, _>>()?;

    let (disk, offset) = first_fit(layout.num_data_blocks, lanes, |lane, bit| is_set(bitmaps[lane], bit))
      .ok_or(Errno::NoSpace("wfs.alloc_block: no free data blocks"))?;
    let (index, byte) = with_bit(bitmaps[disk], offset, true);

    self
      .disks
      .commit(Mutation::DataBitmap { disk, offset: layout.data_bitmap() + index }, &[byte])?;

    let logical = self.disks.logical(disk, offset);
    self
      .disks
      .commit(Mutation::Data { logical, within: 0 }, &[SENTINEL_BYTE; BLOCK_SIZE])?;

    debug!("wfs.alloc_block: claimed logical block {logical} (disk {disk}, offset {offset})");
    Ok(logical)
  }

  /// Clear the bitmap bit of a logical block. The block is not scrubbed.
  pub fn free_block(&mut self, logical: i64) -> Result<(), Errno> {
    let layout = self.disks.layout()?;
    let Physical { disk, offset } = self.disks.translate(logical)?;
    let bitmap = self.disks.read_data_bitmap(disk)?;
    if !is_set(bitmap, offset) {
      warn!("wfs.free_block: logical block {logical} was not allocated");
    }
    let (index, byte) = with_bit(bitmap, offset, false);

    self
      .disks
      .commit(Mutation::DataBitmap { disk, offset: layout.data_bitmap() + index }, &[byte])?;

    debug!("wfs.free_block: released logical block {logical}");
    Ok(())
  }

  pub fn usage(&self) -> Result<Usage, Errno> {
    let layout = self.disks.layout()?;
    let inode_bitmap = self.disks.read_metadata(layout.inode_bitmap(), layout.inode_bitmap_len())?;
    let used_inodes = count_set(inode_bitmap, layout.num_inodes);

    let lanes = if self.disks.raid().is_mirrored() { 1 } else { self.disks.len() };
    let mut used_blocks = 0;
    for disk in 0..lanes {
      used_blocks += count_set(self.disks.read_data_bitmap(disk)?, layout.num_data_blocks);
    }
    let blocks = self.disks.logical_blocks()?;

    Ok(Usage {
      inodes: layout.num_inodes,
      free_inodes: layout.num_inodes - used_inodes,
      blocks,
      free_blocks: blocks - used_blocks,
    })
  }
}


// vim:ts=2 sw=2
