//! Replication: the single mutation entrypoint of a mounted disk set.
//!
//! Nothing else writes into a mapping, so every mutation is fanned out
//! according to the raid mode the set was formatted with.

use std::fmt;

use log::trace;

use super::disk::DiskSet;
use super::errno::Errno;
use super::layout::BLOCK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RaidMode {
  /// Data blocks striped round-robin, metadata copied everywhere
  Raid0 = 0,
  /// Every byte mirrored on every disk
  Raid1 = 1,
  /// Mirrored like `Raid1`; mirrors are not compared on read
  Raid1v = 2,
}

impl RaidMode {
  pub fn is_mirrored(&self) -> bool {
    matches!(self, RaidMode::Raid1 | RaidMode::Raid1v)
  }
}

impl TryFrom<u32> for RaidMode {
  type Error = Errno;

  fn try_from(tag: u32) -> Result<Self, Self::Error> {
    match tag {
      0 => Ok(RaidMode::Raid0),
      1 => Ok(RaidMode::Raid1),
      2 => Ok(RaidMode::Raid1v),
      tag => Err(Errno::InvalidDisk(format!("unknown raid mode {tag}"))),
    }
  }
}

impl std::str::FromStr for RaidMode {
  type Err = Errno;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "0" => Ok(RaidMode::Raid0),
      "1" => Ok(RaidMode::Raid1),
      "1v" => Ok(RaidMode::Raid1v),
      _ => Err(Errno::InvalidArgument("raid mode must be one of 0, 1, 1v")),
    }
  }
}

impl fmt::Display for RaidMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RaidMode::Raid0 => write!(f, "raid0"),
      RaidMode::Raid1 => write!(f, "raid1"),
      RaidMode::Raid1v => write!(f, "raid1v"),
    }
  }
}

/// Where a logical data block physically lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Physical {
  pub disk: usize,
  pub offset: usize,
}

/// What a write touches. The variant decides the fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
  /// Superblock, inode bitmap or inode table: same offset on every disk
  Metadata { offset: usize },
  /// Byte `offset` (absolute) of `disk`'s data bitmap
  DataBitmap { disk: usize, offset: usize },
  /// `within` bytes into logical data block `logical`
  Data { logical: i64, within: usize },
}

impl DiskSet {
  /// Logical data-block number to its disk and in-disk block offset.
  pub fn translate(&self, logical: i64) -> Result<Physical, Errno> {
    let layout = self.layout()?;
    let logical = usize::try_from(logical)
      .map_err(|_| Errno::out_of_bounds("raid.translate: negative block number"))?;

    let physical = match self.raid() {
      RaidMode::Raid0 => Physical {
        disk: logical % self.len(),
        offset: logical / self.len(),
      },
      RaidMode::Raid1 | RaidMode::Raid1v => Physical { disk: 0, offset: logical },
    };

    if physical.offset >= layout.num_data_blocks {
      return Err(Errno::out_of_bounds("raid.translate: block number past data region"));
    }
    Ok(physical)
  }

  /// Inverse of `translate`.
  pub fn logical(&self, disk: usize, offset: usize) -> i64 {
    match self.raid() {
      RaidMode::Raid0 => (offset * self.len() + disk) as i64,
      RaidMode::Raid1 | RaidMode::Raid1v => offset as i64,
    }
  }

  /// Number of logical data blocks addressable in this set.
  pub fn logical_blocks(&self) -> Result<usize, Errno> {
    let per_disk = self.layout()?.num_data_blocks;
    Ok(match self.raid() {
      RaidMode::Raid0 => per_disk * self.len(),
      RaidMode::Raid1 | RaidMode::Raid1v => per_disk,
    })
  }

  /// Contents of logical block `logical`, read from the disk that owns it.
  pub fn read_block(&self, logical: i64) -> Result<&[u8], Errno> {
    let layout = self.layout()?;
    let Physical { disk, offset } = self.translate(logical)?;
    self.disks[disk].bytes(layout.data_block(offset), BLOCK_SIZE)
  }

  /// Data bitmap of `disk`. Mirrored sets keep one shared bitmap.
  pub fn read_data_bitmap(&self, disk: usize) -> Result<&[u8], Errno> {
    let layout = self.layout()?;
    let disk = if self.raid().is_mirrored() { 0 } else { disk };
    self
      .disks
      .get(disk)
      .ok_or_else(|| Errno::out_of_bounds("raid.read_data_bitmap: no such disk"))?
      .bytes(layout.data_bitmap(), layout.data_bitmap_len())
  }

  /// The only way bytes reach a mapping.
  ///
  /// Mirrored sets write every mutation to every disk. Striped sets write
  /// metadata to every disk and data blocks and data-bitmap bytes to the
  /// owning disk only. Disks are written in order; a failure part way leaves
  /// earlier disks already mutated.
  pub fn commit(&mut self, mutation: Mutation, data: &[u8]) -> Result<(), Errno> {
    let layout = self.layout()?;
    let (owner, offset) = match mutation {
      Mutation::Metadata { offset } => (None, offset),
      Mutation::DataBitmap { disk, offset } => (Some(disk), offset),
      Mutation::Data { logical, within } => {
        if within + data.len() > BLOCK_SIZE {
          return Err(Errno::out_of_bounds("raid.commit: write crosses block boundary"));
        }
        let Physical { disk, offset } = self.translate(logical)?;
        (Some(disk), layout.data_block(offset) + within)
      },
    };

    trace!("raid.commit: {mutation:?} {} bytes at {offset}", data.len());

    match (self.raid(), owner) {
      (RaidMode::Raid0, Some(disk)) => self
        .disks
        .get_mut(disk)
        .ok_or_else(|| Errno::out_of_bounds("raid.commit: no such disk"))?
        .write_at(offset, data),
      _ => {
        for disk in self.disks.iter_mut() {
          disk.write_at(offset, data)?;
        }
        Ok(())
      },
    }
  }
}


// vim:ts=2 sw=2
