//! The mounted filesystem: operation handlers composed from the path
//! resolver, the directory pages, the allocators and the raid layer.

use std::path::Path;

use log::{debug, info};

use crate::util::{unixtime, Owner};

use super::disk::DiskSet;
use super::errno::Errno;
use super::fs::{join_path, split_path, FileMode, FileModeType, FileStat, Filesystem, InodeNumber};
use super::layout::{DirEntry, Inode, BLOCK_SIZE, NO_BLOCK, N_BLOCKS, ROOT_INODE_NUMBER};
use super::raid::Mutation;

/// Largest regular file the direct pointers can describe.
pub const MAX_FILE_SIZE: u64 = (N_BLOCKS * BLOCK_SIZE) as u64;

/// Mount state: the validated disk set and the identity new inodes get.
#[derive(Debug)]
pub struct WfsFilesystem {
  pub(super) disks: DiskSet,
  pub(super) owner: Owner,
}

impl WfsFilesystem {
  /// Map and validate the images in `paths` and mount them.
  pub fn mount<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Errno> {
    Ok(Self::new(DiskSet::open(paths)?))
  }

  pub fn new(disks: DiskSet) -> Self {
    Self {
      disks,
      owner: Owner::effective(),
    }
  }

  pub fn owner(&self) -> Owner {
    self.owner
  }

  pub fn disks(&self) -> &DiskSet {
    &self.disks
  }

  pub fn flush(&self) -> Result<(), Errno> {
    self.disks.flush()
  }

  fn stat_inode(&self, num: InodeNumber) -> Result<FileStat, Errno> {
    let inode = self.read_inode(num)?;

    Ok(FileStat {
      inode_number: num,
      mode: inode.mode,
      uid: inode.uid,
      gid: inode.gid,
      size: inode.size.max(0) as u64,
      links_count: inode.nlinks.max(0) as u32,
      atime: inode.atim,
      mtime: inode.mtim,
      ctime: inode.ctim,
      blocks: inode.allocated_blocks() as u64,
      block_size: BLOCK_SIZE as u32,
    })
  }

  /// Bump modify and change time after the directory's entries changed.
  fn touch_dir(&mut self, num: InodeNumber) -> Result<(), Errno> {
    let mut dir = self.read_inode(num)?;
    let now = unixtime();
    dir.mtim = now;
    dir.ctim = now;
    self.write_inode(&dir)
  }

  /// Parent directory inode and final name of `pathname`.
  fn parent_of(&self, pathname: &str) -> Result<(InodeNumber, String), Errno> {
    let (everything_else, name) = split_path(pathname)?;
    if name == "/" {
      return Err(Errno::AlreadyExists("wfs: the root directory always exists"));
    }
    let parent = self.resolve(&join_path(&everything_else), Some(FileModeType::Dir))?;
    Ok((parent, name))
  }

  fn create(&mut self, pathname: &str, mode: FileMode) -> Result<FileStat, Errno> {
    let (parent, name) = self.parent_of(pathname)?;
    DirEntry::validate_name(&name)?;

    let parent_inode = self.read_inode(parent)?;
    if self.find_entry(&parent_inode, &name)?.is_some() {
      return Err(Errno::AlreadyExists("wfs.create: file exists"));
    }

    let inode = self.alloc_inode(mode)?;
    let num = inode.num as InodeNumber;
    if let Err(errno) = self.insert_entry(parent, &name, num) {
      self.free_inode(num)?;
      return Err(errno);
    }
    self.touch_dir(parent)?;

    debug!("wfs.create: {pathname} -> inode {num}");
    self.stat_inode(num)
  }

  /// Release the entry, every owned block and the inode itself.
  fn release(&mut self, pathname: &str, num: InodeNumber) -> Result<(), Errno> {
    let (parent, name) = self.parent_of(pathname)?;
    self.remove_entry(parent, &name)?;

    let inode = self.read_inode(num)?;
    for &logical in inode.blocks.iter().filter(|&&logical| logical != NO_BLOCK) {
      self.free_block(logical)?;
    }
    self.free_inode(num)?;
    self.touch_dir(parent)
  }

  /// Copy `data` into the file starting at `offset`, allocating blocks for
  /// unset pointers. `written` tracks progress so a failure part way still
  /// leaves the inode describing what landed.
  fn write_blocks(&mut self, inode: &mut Inode, data: &[u8], offset: usize, written: &mut usize) -> Result<(), Errno> {
    while *written < data.len() {
      let position = offset + *written;
      let index = position / BLOCK_SIZE;
      let within = position % BLOCK_SIZE;
      let chunk = (BLOCK_SIZE - within).min(data.len() - *written);

      let logical = match inode.blocks[index] {
        NO_BLOCK => {
          let logical = self.alloc_block()?;
          // file blocks start zeroed so holes read back as zeros
          self.disks.commit(Mutation::Data { logical, within: 0 }, &[0u8; BLOCK_SIZE])?;
          inode.blocks[index] = logical;
          logical
        },
        logical => logical,
      };

      self
        .disks
        .commit(Mutation::Data { logical, within }, &data[*written..*written + chunk])?;
      *written += chunk;
    }
    Ok(())
  }
}

impl Filesystem for WfsFilesystem {
  fn stat(&self, pathname: &str)
    -> Result<FileStat, Errno> {
    let num = self.resolve(pathname, None)?;
    self.stat_inode(num)
  }

  fn lookup_path(&self, pathname: &str)
    -> Result<InodeNumber, Errno> {
    self.resolve(pathname, None)
  }

  fn create_file(&mut self, pathname: &str, mode: FileMode)
    -> Result<FileStat, Errno> {
    self.create(pathname, mode.with_type(FileModeType::File))
  }

  fn create_dir(&mut self, pathname: &str, mode: FileMode)
    -> Result<FileStat, Errno> {
    self.create(pathname, mode.with_type(FileModeType::Dir))
  }

  fn remove_file(&mut self, pathname: &str)
    -> Result<(), Errno> {
    let num = self.resolve(pathname, Some(FileModeType::File))?;
    self.release(pathname, num)?;

    info!("wfs.remove_file: {pathname} (inode {num})");
    Ok(())
  }

  fn remove_dir(&mut self, pathname: &str)
    -> Result<(), Errno> {
    let num = self.resolve(pathname, Some(FileModeType::Dir))?;
    if num == ROOT_INODE_NUMBER {
      return Err(Errno::InvalidArgument("wfs.remove_dir: cannot remove the root directory"));
    }

    // Guard for live entries
    if !self.is_empty_dir(&self.read_inode(num)?) {
      return Err(Errno::NotEmpty("wfs.remove_dir: directory not empty"));
    }
    self.release(pathname, num)?;

    info!("wfs.remove_dir: {pathname} (inode {num})");
    Ok(())
  }

  fn read_file(&self, pathname: &str, buf: &mut [u8], offset: u64)
    -> Result<usize, Errno> {
    let num = self.resolve(pathname, Some(FileModeType::File))?;
    let inode = self.read_inode(num)?;

    let size = inode.size.max(0) as u64;
    if offset >= size {
      return Ok(0);
    }
    let offset = offset as usize;
    let len = buf.len().min((size as usize) - offset);

    let mut done = 0;
    while done < len {
      let position = offset + done;
      let index = position / BLOCK_SIZE;
      let within = position % BLOCK_SIZE;
      let chunk = (BLOCK_SIZE - within).min(len - done);
      if index >= N_BLOCKS {
        break;
      }

      let target = &mut buf[done..done + chunk];
      match inode.blocks[index] {
        NO_BLOCK => target.fill(0),
        logical => target.copy_from_slice(&self.disks.read_block(logical)?[within..within + chunk]),
      }
      done += chunk;
    }

    debug!("wfs.read_file: {pathname} {done} bytes at {offset}");
    Ok(done)
  }

  fn write_file(&mut self, pathname: &str, data: &[u8], offset: u64)
    -> Result<usize, Errno> {
    let num = self.resolve(pathname, Some(FileModeType::File))?;
    let mut inode = self.read_inode(num)?;

    let end = offset.checked_add(data.len() as u64).unwrap_or(u64::MAX);
    if end > MAX_FILE_SIZE {
      return Err(Errno::NoSpace("wfs.write_file: file exceeds its direct blocks"));
    }

    let mut written = 0;
    let result = self.write_blocks(&mut inode, data, offset as usize, &mut written);

    if written > 0 {
      inode.size = inode.size.max((offset as usize + written) as i64);
    }
    let now = unixtime();
    inode.mtim = now;
    inode.ctim = now;
    self.write_inode(&inode)?;

    debug!("wfs.write_file: {pathname} {written} bytes at {offset}");
    match result {
      Err(errno) if written == 0 => Err(errno),
      _ => Ok(written),
    }
  }

  fn read_dir(&self, pathname: &str, filler: &mut dyn FnMut(&str))
    -> Result<(), Errno> {
    let num = self.resolve(pathname, Some(FileModeType::Dir))?;
    let dir = self.read_inode(num)?;

    filler(".");
    filler("..");
    for entry in self.entries(&dir)? {
      filler(&entry.name());
    }
    Ok(())
  }

  fn truncate(&mut self, pathname: &str, size: u64)
    -> Result<(), Errno> {
    let num = self.resolve(pathname, Some(FileModeType::File))?;
    if size > MAX_FILE_SIZE {
      return Err(Errno::NoSpace("wfs.truncate: file exceeds its direct blocks"));
    }
    let mut inode = self.read_inode(num)?;
    let size = size as usize;

    // whole blocks past the new end go back to the allocator
    let keep = (size + BLOCK_SIZE - 1) / BLOCK_SIZE;
    for index in keep..N_BLOCKS {
      let logical = inode.blocks[index];
      if logical != NO_BLOCK {
        self.free_block(logical)?;
        inode.blocks[index] = NO_BLOCK;
      }
    }

    // zero the cut-off tail so growing again reads zeros
    let within = size % BLOCK_SIZE;
    if within != 0 && (size as i64) < inode.size {
      let logical = inode.blocks[size / BLOCK_SIZE];
      if logical != NO_BLOCK {
        let tail = vec![0u8; BLOCK_SIZE - within];
        self.disks.commit(Mutation::Data { logical, within }, &tail)?;
      }
    }

    let now = unixtime();
    inode.size = size as i64;
    inode.mtim = now;
    inode.ctim = now;
    self.write_inode(&inode)
  }

  fn set_times(&mut self, pathname: &str, atime: Option<i64>, mtime: Option<i64>)
    -> Result<(), Errno> {
    let num = self.resolve(pathname, None)?;
    let mut inode = self.read_inode(num)?;

    if let Some(atime) = atime {
      inode.atim = atime;
    }
    if let Some(mtime) = mtime {
      inode.mtim = mtime;
    }
    inode.ctim = unixtime();
    self.write_inode(&inode)
  }

  fn name(&self) -> &'static str {
    "wfs"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::mkimages;
  use crate::wfs::layout::{DENTRIES_PER_BLOCK, INODE_SIZE};
  use crate::wfs::raid::RaidMode;

  fn mount(raid: RaidMode, disks: usize) -> (crate::util::ImageSet, WfsFilesystem) {
    let set = mkimages(raid, disks, 32, 64);
    let fs = WfsFilesystem::mount(&set.paths()).unwrap();
    (set, fs)
  }

  fn read_all(fs: &WfsFilesystem, pathname: &str) -> Vec<u8> {
    let mut buf = vec![0u8; MAX_FILE_SIZE as usize];
    let n = fs.read_file(pathname, &mut buf, 0).unwrap();
    buf.truncate(n);
    buf
  }

  #[test]
  fn striped_scenario() {
    let (_set, mut fs) = mount(RaidMode::Raid0, 2);

    fs.create_dir("/a", FileMode::dir(0o755)).unwrap();
    fs.create_file("/a/b.txt", FileMode::file(0o644)).unwrap();
    assert_eq!(fs.write_file("/a/b.txt", b"hello", 0).unwrap(), 5);

    let mut buf = [0u8; 5];
    assert_eq!(fs.read_file("/a/b.txt", &mut buf, 0).unwrap(), 5);
    assert_eq!(&buf, b"hello");
    assert_eq!(fs.list_dir("/a").unwrap(), vec![".", "..", "b.txt"]);
  }

  #[test]
  fn stat_agrees_with_lookup() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_dir("/d", FileMode::dir(0o750)).unwrap();
    let created = fs.create_file("/d/f", FileMode::file(0o640)).unwrap();

    let stat = fs.stat("/d/f").unwrap();
    assert_eq!(stat, created);
    assert_eq!(stat.inode_number, fs.lookup_path("/d/f").unwrap());
    assert_eq!(stat.mode, FileMode::file(0o640));
    assert_eq!(stat.uid, fs.owner().uid);
    assert_eq!(stat.size, 0);

    let root = fs.stat("/").unwrap();
    assert!(root.mode.is_dir());
    assert_eq!(root.inode_number, ROOT_INODE_NUMBER);
    assert!(matches!(fs.stat("/missing"), Err(Errno::NotFound(_))));
  }

  #[test]
  fn create_refuses_duplicates_and_bad_parents() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();

    assert!(matches!(fs.create_file("/f", FileMode::file(0o644)), Err(Errno::AlreadyExists(_))));
    assert!(matches!(fs.create_dir("/f", FileMode::dir(0o755)), Err(Errno::AlreadyExists(_))));
    assert!(matches!(fs.create_file("/f/g", FileMode::file(0o644)), Err(Errno::NotFound(_))));
    assert!(matches!(fs.create_file("/nope/g", FileMode::file(0o644)), Err(Errno::NotFound(_))));
    assert!(matches!(fs.create_dir("/", FileMode::dir(0o755)), Err(Errno::AlreadyExists(_))));
    assert!(matches!(
      fs.create_file(&format!("/{}", "x".repeat(40)), FileMode::file(0o644)),
      Err(Errno::NameTooLong(_))
    ));
  }

  #[test]
  fn create_updates_parent_mtime() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.set_times("/", Some(1), Some(1)).unwrap();

    fs.create_file("/f", FileMode::file(0o644)).unwrap();
    assert!(fs.stat("/").unwrap().mtime > 1);
  }

  #[test]
  fn files_are_recreatable() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);

    fs.create_file("/f", FileMode::file(0o644)).unwrap();
    fs.write_file("/f", b"old", 0).unwrap();
    fs.remove_file("/f").unwrap();
    assert!(matches!(fs.stat("/f"), Err(Errno::NotFound(_))));

    let again = fs.create_file("/f", FileMode::file(0o644)).unwrap();
    assert_eq!(again.size, 0);
    assert_eq!(read_all(&fs, "/f"), b"");
    assert_eq!(fs.usage().unwrap().free_inodes, 30);
  }

  #[test]
  fn remove_file_releases_blocks() {
    let (_set, mut fs) = mount(RaidMode::Raid0, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();
    fs.write_file("/f", &[1u8; 3 * BLOCK_SIZE], 0).unwrap();
    let before = fs.usage().unwrap().free_blocks;

    fs.remove_file("/f").unwrap();
    // three data blocks plus the root page that held the only entry
    assert_eq!(fs.usage().unwrap().free_blocks, before + 4);
    assert!(matches!(fs.remove_file("/f"), Err(Errno::NotFound(_))));
  }

  #[test]
  fn remove_checks_types() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();
    fs.create_dir("/d", FileMode::dir(0o755)).unwrap();

    assert!(matches!(fs.remove_file("/d"), Err(Errno::NotFound(_))));
    assert!(matches!(fs.remove_dir("/f"), Err(Errno::NotFound(_))));
    assert!(matches!(fs.remove_dir("/"), Err(Errno::InvalidArgument(_))));
  }

  #[test]
  fn remove_dir_requires_empty() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_dir("/d", FileMode::dir(0o755)).unwrap();
    fs.create_file("/d/a", FileMode::file(0o644)).unwrap();
    fs.create_dir("/d/b", FileMode::dir(0o755)).unwrap();

    assert!(matches!(fs.remove_dir("/d"), Err(Errno::NotEmpty(_))));

    fs.remove_file("/d/a").unwrap();
    assert!(matches!(fs.remove_dir("/d"), Err(Errno::NotEmpty(_))));
    fs.remove_dir("/d/b").unwrap();
    fs.remove_dir("/d").unwrap();

    assert_eq!(fs.list_dir("/").unwrap(), vec![".", ".."]);
    let usage = fs.usage().unwrap();
    assert_eq!(usage.free_inodes, usage.inodes - 1);
    assert_eq!(usage.free_blocks, usage.blocks);
  }

  #[test]
  fn small_write_round_trips() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();

    fs.write_file("/f", b"hello world", 0).unwrap();
    assert_eq!(read_all(&fs, "/f"), b"hello world");
    assert_eq!(fs.stat("/f").unwrap().size, 11);
  }

  #[test]
  fn multi_block_write_round_trips() {
    let (_set, mut fs) = mount(RaidMode::Raid0, 3);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();
    let data = (0..3 * BLOCK_SIZE + 100).map(|i| (i % 251) as u8).collect::<Vec<_>>();

    assert_eq!(fs.write_file("/f", &data, 0).unwrap(), data.len());
    assert_eq!(read_all(&fs, "/f"), data);
    assert_eq!(fs.stat("/f").unwrap().blocks, 4);

    let mut middle = vec![0u8; 600];
    assert_eq!(fs.read_file("/f", &mut middle, 500).unwrap(), 600);
    assert_eq!(middle, &data[500..1100]);
  }

  #[test]
  fn reads_are_clamped_to_size() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();
    fs.write_file("/f", b"abcdef", 0).unwrap();

    let mut buf = [0u8; 64];
    assert_eq!(fs.read_file("/f", &mut buf, 4).unwrap(), 2);
    assert_eq!(&buf[..2], b"ef");
    assert_eq!(fs.read_file("/f", &mut buf, 6).unwrap(), 0);
    assert_eq!(fs.read_file("/f", &mut buf, 100).unwrap(), 0);
    assert!(matches!(fs.read_file("/", &mut buf, 0), Err(Errno::NotFound(_))));
  }

  // Overwrites keep the existing block and size is max(size, end),
  // not size + length.
  #[test]
  fn overwrite_reuses_block_and_keeps_size() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();
    fs.write_file("/f", b"hello world", 0).unwrap();
    let blocks_before = fs.usage().unwrap().free_blocks;

    fs.write_file("/f", b"HELLO", 0).unwrap();
    assert_eq!(read_all(&fs, "/f"), b"HELLO world");
    assert_eq!(fs.stat("/f").unwrap().size, 11);
    assert_eq!(fs.usage().unwrap().free_blocks, blocks_before);

    fs.write_file("/f", b"!!", 11).unwrap();
    assert_eq!(read_all(&fs, "/f"), b"HELLO world!!");
  }

  #[test]
  fn sparse_write_reads_zeros_in_the_hole() {
    let (_set, mut fs) = mount(RaidMode::Raid0, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();

    fs.write_file("/f", b"end", (2 * BLOCK_SIZE) as u64).unwrap();
    let all = read_all(&fs, "/f");
    assert_eq!(all.len(), 2 * BLOCK_SIZE + 3);
    assert!(all[..2 * BLOCK_SIZE].iter().all(|&b| b == 0));
    assert_eq!(fs.stat("/f").unwrap().blocks, 1);
  }

  #[test]
  fn writes_past_direct_blocks_are_no_space() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();

    let result = fs.write_file("/f", b"x", MAX_FILE_SIZE);
    assert!(matches!(result, Err(Errno::NoSpace(_))));
    assert_eq!(fs.write_file("/f", &vec![7u8; MAX_FILE_SIZE as usize], 0).unwrap(), MAX_FILE_SIZE as usize);
  }

  #[test]
  fn write_to_directory_is_not_found() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    assert!(matches!(fs.write_file("/", b"x", 0), Err(Errno::NotFound(_))));
  }

  #[test]
  fn truncate_releases_and_zeroes() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();
    fs.write_file("/f", &[9u8; 2 * BLOCK_SIZE], 0).unwrap();

    fs.truncate("/f", 10).unwrap();
    assert_eq!(fs.stat("/f").unwrap().size, 10);
    assert_eq!(fs.stat("/f").unwrap().blocks, 1);

    fs.truncate("/f", 20).unwrap();
    let all = read_all(&fs, "/f");
    assert_eq!(&all[..10], &[9u8; 10]);
    assert_eq!(&all[10..], &[0u8; 10]);

    fs.truncate("/f", 0).unwrap();
    assert_eq!(fs.stat("/f").unwrap().blocks, 0);
  }

  #[test]
  fn set_times_overrides_timestamps() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_file("/f", FileMode::file(0o644)).unwrap();

    fs.set_times("/f", Some(100), None).unwrap();
    let stat = fs.stat("/f").unwrap();
    assert_eq!(stat.atime, 100);
    assert_ne!(stat.mtime, 100);

    fs.set_times("/f", None, Some(200)).unwrap();
    assert_eq!(fs.stat("/f").unwrap().mtime, 200);
  }

  #[test]
  fn inode_exhaustion_through_create() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);

    // inode 0 is the root
    for i in 1..32 {
      fs.create_file(&format!("/f{i}"), FileMode::file(0o644)).unwrap();
    }
    assert!(matches!(fs.create_file("/last", FileMode::file(0o644)), Err(Errno::NoSpace(_))));
    assert_eq!(fs.usage().unwrap().free_inodes, 0);
    assert!(matches!(fs.stat("/last"), Err(Errno::NotFound(_))));
  }

  #[test]
  fn full_directory_rolls_back_the_inode() {
    let set = mkimages(RaidMode::Raid1, 2, 256, 64);
    let mut fs = WfsFilesystem::mount(&set.paths()).unwrap();

    for i in 0..N_BLOCKS * DENTRIES_PER_BLOCK {
      fs.create_file(&format!("/f{i}"), FileMode::file(0o644)).unwrap();
    }
    let free = fs.usage().unwrap().free_inodes;
    assert!(matches!(fs.create_file("/overflow", FileMode::file(0o644)), Err(Errno::NoSpace(_))));
    assert_eq!(fs.usage().unwrap().free_inodes, free);
  }

  #[test]
  fn mirrors_stay_identical() {
    let (_set, mut fs) = mount(RaidMode::Raid1, 2);
    fs.create_dir("/a", FileMode::dir(0o755)).unwrap();
    fs.create_file("/a/f", FileMode::file(0o644)).unwrap();
    fs.write_file("/a/f", &[3u8; 700], 0).unwrap();
    fs.create_file("/g", FileMode::file(0o644)).unwrap();
    fs.remove_file("/g").unwrap();

    let layout = fs.disks().layout().unwrap();
    let len = layout.end() - layout.inode_bitmap();
    let main = fs.disks().disks()[0].bytes(layout.inode_bitmap(), len).unwrap();
    let mirror = fs.disks().disks()[1].bytes(layout.inode_bitmap(), len).unwrap();
    assert!(main == mirror);
  }

  #[test]
  fn striped_metadata_matches_on_every_disk() {
    let (_set, mut fs) = mount(RaidMode::Raid0, 3);
    fs.create_dir("/a", FileMode::dir(0o755)).unwrap();
    fs.create_file("/a/f", FileMode::file(0o644)).unwrap();
    fs.write_file("/a/f", &[5u8; 1500], 0).unwrap();

    let layout = fs.disks().layout().unwrap();
    let inode = fs.read_inode(fs.lookup_path("/a/f").unwrap()).unwrap();
    let at = layout.inode(inode.num as usize);
    for disk in fs.disks().disks() {
      assert_eq!(disk.bytes(at, INODE_SIZE).unwrap(), &inode.encode()[..]);
    }
  }

  #[test]
  fn state_survives_remount() {
    let set = mkimages(RaidMode::Raid0, 2, 32, 64);
    {
      let mut fs = WfsFilesystem::mount(&set.paths()).unwrap();
      fs.create_dir("/keep", FileMode::dir(0o755)).unwrap();
      fs.create_file("/keep/me", FileMode::file(0o644)).unwrap();
      fs.write_file("/keep/me", b"persisted", 0).unwrap();
      fs.flush().unwrap();
    }

    let mut paths = set.paths();
    paths.reverse();
    let fs = WfsFilesystem::mount(&paths).unwrap();
    assert_eq!(read_all(&fs, "/keep/me"), b"persisted");
  }
}

// vim:ts=2 sw=2
