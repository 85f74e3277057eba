//! Directory pages: fixed-size `{name, inode}` slots inside a directory's
//! data blocks. A slot with inode `-1` is free.

use log::debug;

use super::diskfs::WfsFilesystem;
use super::errno::Errno;
use super::fs::InodeNumber;
use super::layout::{DirEntry, Inode, BLOCK_SIZE, DENTRY_SIZE, FREE, NO_BLOCK};
use super::raid::Mutation;

/// Position of one dentry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
  /// Index into the directory's pointer array
  pointer: usize,
  logical: i64,
  entry: usize,
}

impl Slot {
  fn within(&self) -> usize {
    self.entry * DENTRY_SIZE
  }
}

impl WfsFilesystem {
  /// Every allocated block of `dir`, entries in slot order.
  fn pages<'a>(&'a self, dir: &'a Inode) -> impl Iterator<Item = Result<(usize, i64, Vec<DirEntry>), Errno>> + 'a {
    dir
      .blocks
      .iter()
      .enumerate()
      .filter(|&(_, &logical)| logical != NO_BLOCK)
      .map(move |(pointer, &logical)| {
        let block = self.disks.read_block(logical)?;
        let entries = block.chunks(DENTRY_SIZE).map(DirEntry::decode).collect();
        Ok((pointer, logical, entries))
      })
  }

  /// First slot satisfying `want`, in block-pointer then slot order.
  fn find_slot<F>(&self, dir: &Inode, want: F) -> Result<Option<(Slot, DirEntry)>, Errno>
  where
    F: Fn(&DirEntry) -> bool,
  {
    for page in self.pages(dir) {
      let (pointer, logical, entries) = page?;
      if let Some((entry, dentry)) = entries.into_iter().enumerate().find(|(_, dentry)| want(dentry)) {
        return Ok(Some((Slot { pointer, logical, entry }, dentry)));
      }
    }
    Ok(None)
  }

  /// Live entries of `dir`.
  pub fn entries(&self, dir: &Inode) -> Result<Vec<DirEntry>, Errno> {
    let mut live = Vec::new();
    for page in self.pages(dir) {
      let (_, _, entries) = page?;
      live.extend(entries.into_iter().filter(|dentry| !dentry.is_free()));
    }
    Ok(live)
  }

  /// Inode number behind `name` in `dir`, if any. First match wins.
  pub fn find_entry(&self, dir: &Inode, name: &str) -> Result<Option<InodeNumber>, Errno> {
    Ok(
      self
        .find_slot(dir, |dentry| !dentry.is_free() && dentry.is_named(name))?
        .map(|(_, dentry)| dentry.num as InodeNumber),
    )
  }

  /// Place `{name, target}` into the first free slot of directory `dir_num`,
  /// growing the directory by one block when every page is full.
  pub fn insert_entry(&mut self, dir_num: InodeNumber, name: &str, target: InodeNumber) -> Result<(), Errno> {
    let dentry = DirEntry::new(name, target as i32)?;
    let mut dir = self.read_inode(dir_num)?;

    let slot = match self.find_slot(&dir, DirEntry::is_free)? {
      Some((slot, _)) => slot,
      None => {
        let pointer = dir
          .blocks
          .iter()
          .position(|&logical| logical == NO_BLOCK)
          .ok_or(Errno::NoSpace("wfs.insert_entry: directory is full"))?;
        let logical = self.alloc_block()?;
        dir.blocks[pointer] = logical;
        dir.size += BLOCK_SIZE as i64;
        self.write_inode(&dir)?;
        Slot { pointer, logical, entry: 0 }
      },
    };

    self
      .disks
      .commit(Mutation::Data { logical: slot.logical, within: slot.within() }, &dentry.encode())?;

    debug!("wfs.insert_entry: {name} -> inode {target} in dir {dir_num} ({slot:?})");
    Ok(())
  }

  /// Free the slot holding `name` in directory `dir_num` and return the inode
  /// it pointed at. The name bytes stay behind. A page whose last live entry
  /// goes away is released and its pointer cleared.
  pub fn remove_entry(&mut self, dir_num: InodeNumber, name: &str) -> Result<InodeNumber, Errno> {
    let mut dir = self.read_inode(dir_num)?;
    let (slot, dentry) = self
      .find_slot(&dir, |dentry| !dentry.is_free() && dentry.is_named(name))?
      .ok_or(Errno::NotFound("wfs.remove_entry: no such entry"))?;

    self.disks.commit(
      Mutation::Data { logical: slot.logical, within: slot.within() + DirEntry::NUM_AT },
      &FREE.to_le_bytes(),
    )?;

    let page_empty = self
      .disks
      .read_block(slot.logical)?
      .chunks(DENTRY_SIZE)
      .map(DirEntry::decode)
      .all(|dentry| dentry.is_free());
    if page_empty {
      self.free_block(slot.logical)?;
      dir.blocks[slot.pointer] = NO_BLOCK;
      dir.size = (dir.size - BLOCK_SIZE as i64).max(0);
      self.write_inode(&dir)?;
    }

    debug!("wfs.remove_entry: {name} (inode {}) from dir {dir_num}", dentry.num);
    Ok(dentry.num as InodeNumber)
  }

  /// Empty means no block pointer is set.
  pub fn is_empty_dir(&self, dir: &Inode) -> bool {
    dir.blocks.iter().all(|&logical| logical == NO_BLOCK)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::mkimages;
  use crate::wfs::fs::FileMode;
  use crate::wfs::layout::{DENTRIES_PER_BLOCK, N_BLOCKS, ROOT_INODE_NUMBER};
  use crate::wfs::raid::RaidMode;

  fn names(fs: &WfsFilesystem, dir: InodeNumber) -> Vec<String> {
    let dir = fs.read_inode(dir).unwrap();
    fs.entries(&dir).unwrap().iter().map(DirEntry::name).collect()
  }

  #[test]
  fn insert_grows_directory_by_a_block() {
    let set = mkimages(RaidMode::Raid1, 2, 32, 64);
    let mut fs = WfsFilesystem::mount(&set.paths()).unwrap();

    fs.insert_entry(ROOT_INODE_NUMBER, "a", 5).unwrap();
    fs.insert_entry(ROOT_INODE_NUMBER, "b", 6).unwrap();

    let root = fs.read_inode(ROOT_INODE_NUMBER).unwrap();
    assert_eq!(root.allocated_blocks(), 1);
    assert_eq!(root.size, BLOCK_SIZE as i64);
    assert_eq!(fs.find_entry(&root, "b").unwrap(), Some(6));
    assert_eq!(fs.find_entry(&root, "c").unwrap(), None);
    assert_eq!(names(&fs, ROOT_INODE_NUMBER), vec!["a", "b"]);
  }

  #[test]
  fn freed_slots_are_reused_in_place() {
    let set = mkimages(RaidMode::Raid1, 2, 32, 64);
    let mut fs = WfsFilesystem::mount(&set.paths()).unwrap();

    for (i, name) in ["a", "b", "c"].iter().enumerate() {
      fs.insert_entry(ROOT_INODE_NUMBER, name, i + 1).unwrap();
    }
    assert_eq!(fs.remove_entry(ROOT_INODE_NUMBER, "b").unwrap(), 2);
    fs.insert_entry(ROOT_INODE_NUMBER, "d", 4).unwrap();

    assert_eq!(names(&fs, ROOT_INODE_NUMBER), vec!["a", "d", "c"]);
  }

  #[test]
  fn second_page_is_allocated_when_first_is_full() {
    let set = mkimages(RaidMode::Raid0, 2, 32, 64);
    let mut fs = WfsFilesystem::mount(&set.paths()).unwrap();

    for i in 0..=DENTRIES_PER_BLOCK {
      fs.insert_entry(ROOT_INODE_NUMBER, &format!("f{i}"), 1).unwrap();
    }

    let root = fs.read_inode(ROOT_INODE_NUMBER).unwrap();
    assert_eq!(&root.blocks[..2], &[0, 1]);
    assert_eq!(fs.entries(&root).unwrap().len(), DENTRIES_PER_BLOCK + 1);
  }

  #[test]
  fn directory_capacity_is_bounded() {
    let set = mkimages(RaidMode::Raid1, 2, 32, 64);
    let mut fs = WfsFilesystem::mount(&set.paths()).unwrap();

    for i in 0..N_BLOCKS * DENTRIES_PER_BLOCK {
      fs.insert_entry(ROOT_INODE_NUMBER, &format!("f{i}"), 1).unwrap();
    }
    let result = fs.insert_entry(ROOT_INODE_NUMBER, "one-too-many", 1);
    assert!(matches!(result, Err(Errno::NoSpace(_))));
  }

  #[test]
  fn removing_last_entry_of_a_page_releases_it() {
    let set = mkimages(RaidMode::Raid1, 2, 32, 64);
    let mut fs = WfsFilesystem::mount(&set.paths()).unwrap();
    let dir = fs.alloc_inode(FileMode::dir(0o755)).unwrap().num as InodeNumber;

    fs.insert_entry(dir, "only", 9).unwrap();
    assert!(!fs.is_empty_dir(&fs.read_inode(dir).unwrap()));

    fs.remove_entry(dir, "only").unwrap();
    let inode = fs.read_inode(dir).unwrap();
    assert!(fs.is_empty_dir(&inode));
    assert_eq!(inode.size, 0);
    assert_eq!(fs.usage().unwrap().free_blocks, 64);
  }

  #[test]
  fn removing_unknown_entry_is_not_found() {
    let set = mkimages(RaidMode::Raid1, 2, 32, 64);
    let mut fs = WfsFilesystem::mount(&set.paths()).unwrap();

    assert!(matches!(fs.remove_entry(ROOT_INODE_NUMBER, "ghost"), Err(Errno::NotFound(_))));
  }
}

// vim:ts=2 sw=2
