//! Disk mapping: opens every image of a set, maps it read-write and checks
//! that the images actually form the set their superblocks describe.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::{debug, info, warn};
use memmap2::MmapMut;

use super::errno::Errno;
use super::layout::{Layout, Superblock};
use super::raid::RaidMode;

/// One mapped image.
#[derive(Debug)]
pub struct Disk {
  path: PathBuf,
  map: MmapMut,
  superblock: Superblock,
}

impl Disk {
  pub fn open(path: &Path) -> Result<Self, Errno> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .open(path)?;

    // SAFETY: a single mounting process owns the images for the lifetime of the mount
    let map = unsafe { MmapMut::map_mut(&file)? };
    let superblock = Superblock::decode(&map)?;

    if !superblock.is_member() {
      return Err(Errno::InvalidDisk(format!(
        "{}: id {:?} is not in its own disk set",
        path.display(),
        superblock.id
      )));
    }

    debug!("disk.open: mapped {} ({} bytes, id {})", path.display(), map.len(), superblock.id);

    Ok(Self {
      path: path.to_owned(),
      map,
      superblock,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  pub fn superblock(&self) -> &Superblock {
    &self.superblock
  }

  pub fn id(&self) -> &str {
    &self.superblock.id
  }

  /// Bounds-checked view of `len` bytes at `offset`.
  pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], Errno> {
    offset
      .checked_add(len)
      .and_then(|end| self.map.get(offset..end))
      .ok_or_else(|| Errno::out_of_bounds("disk.bytes: range past end of image"))
  }

  /// Raw write into the mapping. Only the raid layer calls this.
  pub(super) fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), Errno> {
    let target = offset
      .checked_add(data.len())
      .and_then(|end| self.map.get_mut(offset..end))
      .ok_or_else(|| Errno::out_of_bounds("disk.write_at: range past end of image"))?;
    target.copy_from_slice(data);
    Ok(())
  }

  pub fn flush(&self) -> Result<(), Errno> {
    self.map.flush()?;
    Ok(())
  }
}

/// The mounted set of disks: process-wide state built once at mount time.
/// `disks[0]` is the main disk that serves every metadata read.
#[derive(Debug)]
pub struct DiskSet {
  pub(super) disks: Vec<Disk>,
  raid: RaidMode,
}

impl DiskSet {
  /// Map every image in `paths` and validate the set.
  ///
  /// The disk count recorded in the first image must equal the number of
  /// images supplied, so a partial mirror set never mounts. Mirrored sets
  /// keep argument order, so the first image supplied serves every read.
  /// Striped sets are reordered by their position in the first image's
  /// member list, which fixes each disk's stripe index regardless of
  /// argument order.
  pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Errno> {
    if paths.is_empty() {
      return Err(Errno::InvalidDisk("no disk images supplied".to_owned()));
    }

    let disks = paths
      .iter()
      .map(|path| Disk::open(path.as_ref()))
      .collect::<Result<Vec<_>, _>>()?;

    let first = disks[0].superblock().clone();
    if first.num_disks() != disks.len() {
      return Err(Errno::InvalidDisk(format!(
        "set has {} disks, {} supplied",
        first.num_disks(),
        disks.len()
      )));
    }

    let layout = Layout::of(&first)?;
    let mut indexed = Vec::with_capacity(disks.len());
    for disk in disks {
      let sb = disk.superblock();
      if !sb.same_layout(&first) {
        return Err(Errno::InvalidDisk(format!(
          "{}: geometry differs from {}",
          disk.path().display(),
          paths[0].as_ref().display()
        )));
      }
      if disk.len() < layout.end() {
        return Err(Errno::InvalidDisk(format!(
          "{}: image is {} bytes, layout needs {}",
          disk.path().display(),
          disk.len(),
          layout.end()
        )));
      }
      let index = first
        .disks
        .iter()
        .position(|id| id == disk.id())
        .ok_or_else(|| Errno::InvalidDisk(format!("{}: not a member of this set", disk.path().display())))?;
      indexed.push((index, disk));
    }

    if !indexed.iter().map(|(index, _)| *index).all_unique() {
      return Err(Errno::InvalidDisk("same disk supplied twice".to_owned()));
    }

    let raid = first.raid;
    let disks = match raid {
      RaidMode::Raid0 => indexed
        .into_iter()
        .sorted_by_key(|(index, _)| *index)
        .map(|(_, disk)| disk)
        .collect::<Vec<_>>(),
      RaidMode::Raid1 | RaidMode::Raid1v => indexed.into_iter().map(|(_, disk)| disk).collect(),
    };

    if raid == RaidMode::Raid1v {
      warn!("disk.open: raid1v mirrors are written but never compared on read");
    }
    info!(
      "disk.open: mounted {} disks in {} mode ({} inodes, {} data blocks per disk)",
      disks.len(),
      raid,
      layout.num_inodes,
      layout.num_data_blocks
    );

    Ok(Self { disks, raid })
  }

  pub fn raid(&self) -> RaidMode {
    self.raid
  }

  pub fn len(&self) -> usize {
    self.disks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.disks.is_empty()
  }

  pub fn disks(&self) -> &[Disk] {
    &self.disks
  }

  pub fn main(&self) -> &Disk {
    &self.disks[0]
  }

  /// Recomputed from the main disk's superblock on each call.
  pub fn layout(&self) -> Result<Layout, Errno> {
    Layout::of(self.main().superblock())
  }

  /// Metadata read, always served by the main disk.
  pub fn read_metadata(&self, offset: usize, len: usize) -> Result<&[u8], Errno> {
    self.main().bytes(offset, len)
  }

  pub fn flush(&self) -> Result<(), Errno> {
    for disk in &self.disks {
      disk.flush()?;
    }
    Ok(())
  }
}

impl Drop for DiskSet {
  fn drop(&mut self) {
    if let Err(err) = self.flush() {
      warn!("disk.drop: flush failed: {err}");
    }
  }
}


// vim:ts=2 sw=2
