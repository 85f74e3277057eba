//! FUSE dispatch: translates kernel requests into path-based calls on a
//! mounted `WfsFilesystem`.
//!
//! FUSE addresses files by inode number while the handlers take paths, so
//! the adapter remembers the path of every inode the kernel has been told
//! about. FUSE reserves inode 1 for the root, hence `ino = inode + 1`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
  FileAttr, FileType, MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
  ReplyStatfs, ReplyWrite, Request, TimeOrNow, FUSE_ROOT_ID,
};
use libc::{c_int, ENOENT};
use log::{debug, info, warn};

use super::diskfs::WfsFilesystem;
use super::errno::Errno;
use super::fs::{FileMode, FileModeType, FileStat, Filesystem, InodeNumber};
use super::layout::{BLOCK_SIZE, MAX_NAME};

const TTL: Duration = Duration::from_secs(1);

fn to_ino(num: InodeNumber) -> u64 {
  num as u64 + FUSE_ROOT_ID
}

fn to_system_time(secs: i64) -> SystemTime {
  match u64::try_from(secs) {
    Ok(secs) => UNIX_EPOCH + Duration::from_secs(secs),
    Err(_) => UNIX_EPOCH,
  }
}

fn to_unix(time: TimeOrNow) -> i64 {
  let time = match time {
    TimeOrNow::SpecificTime(time) => time,
    TimeOrNow::Now => SystemTime::now(),
  };
  time
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| elapsed.as_secs() as i64)
    .unwrap_or(0)
}

fn file_type(mode: FileMode) -> FileType {
  match mode.file_type() {
    FileModeType::Dir => FileType::Directory,
    FileModeType::Char => FileType::CharDevice,
    FileModeType::Block => FileType::BlockDevice,
    FileModeType::File | FileModeType::Other => FileType::RegularFile,
  }
}

fn file_attr(stat: &FileStat) -> FileAttr {
  FileAttr {
    ino: to_ino(stat.inode_number),
    size: stat.size,
    blocks: stat.blocks,
    atime: to_system_time(stat.atime),
    mtime: to_system_time(stat.mtime),
    ctime: to_system_time(stat.ctime),
    crtime: to_system_time(stat.ctime),
    kind: file_type(stat.mode),
    perm: stat.mode.permissions() as u16,
    nlink: stat.links_count,
    uid: stat.uid,
    gid: stat.gid,
    rdev: 0,
    blksize: stat.block_size,
    flags: 0,
  }
}

fn child_path(parent: &str, name: &str) -> String {
  match parent {
    "/" => format!("/{name}"),
    parent => format!("{parent}/{name}"),
  }
}

/// Mount-option strings as accepted on the command line, with `fsname`
/// naming the mount.
pub fn mount_options(fsname: &str, options: &[String]) -> Vec<MountOption> {
  let mut mount_options = vec![MountOption::FSName(fsname.to_owned())];
  mount_options.extend(options.iter().map(|option| match option.as_str() {
    "allow_other" => MountOption::AllowOther,
    "allow_root" => MountOption::AllowRoot,
    "auto_unmount" => MountOption::AutoUnmount,
    "default_permissions" => MountOption::DefaultPermissions,
    "ro" => MountOption::RO,
    "rw" => MountOption::RW,
    "sync" => MountOption::Sync,
    "async" => MountOption::Async,
    other => MountOption::CUSTOM(other.to_owned()),
  }));
  mount_options
}

#[derive(Debug)]
pub struct FuseAdapter {
  fs: WfsFilesystem,
  paths: HashMap<u64, String>,
}

impl FuseAdapter {
  pub fn new(fs: WfsFilesystem) -> Self {
    let paths = HashMap::from([(FUSE_ROOT_ID, "/".to_owned())]);
    Self { fs, paths }
  }

  /// Serve requests on `mountpoint` until it is unmounted.
  pub fn mount(self, mountpoint: &Path, options: &[String]) -> Result<(), Errno> {
    let options = mount_options(self.fs.name(), options);
    info!("fuse.mount: serving {} with {options:?}", mountpoint.display());
    fuser::mount2(self, mountpoint, &options)?;
    Ok(())
  }

  fn path(&self, ino: u64) -> Result<String, Errno> {
    self
      .paths
      .get(&ino)
      .cloned()
      .ok_or(Errno::NotFound("fuse.path: inode was never looked up"))
  }

  fn child(&self, parent: u64, name: &OsStr) -> Result<String, Errno> {
    let name = name
      .to_str()
      .ok_or(Errno::InvalidArgument("fuse.child: name is not utf-8"))?;
    Ok(child_path(&self.path(parent)?, name))
  }

  /// Stat `pathname` and remember it under its inode number.
  fn remember(&mut self, pathname: String) -> Result<FileAttr, Errno> {
    let attr = file_attr(&self.fs.stat(&pathname)?);
    self.paths.insert(attr.ino, pathname);
    Ok(attr)
  }

  fn entry(&mut self, parent: u64, name: &OsStr) -> Result<FileAttr, Errno> {
    let pathname = self.child(parent, name)?;
    self.remember(pathname)
  }

  fn forget_path(&mut self, pathname: &str) {
    self.paths.retain(|_, path| path != pathname);
  }

  fn setattr_inner(&mut self, ino: u64, size: Option<u64>, atime: Option<TimeOrNow>, mtime: Option<TimeOrNow>)
    -> Result<FileAttr, Errno> {
    let pathname = self.path(ino)?;
    if let Some(size) = size {
      self.fs.truncate(&pathname, size)?;
    }
    if atime.is_some() || mtime.is_some() {
      self.fs.set_times(&pathname, atime.map(to_unix), mtime.map(to_unix))?;
    }
    Ok(file_attr(&self.fs.stat(&pathname)?))
  }

  fn readdir_inner(&mut self, ino: u64) -> Result<Vec<(u64, FileType, String)>, Errno> {
    let pathname = self.path(ino)?;
    let names = self.fs.list_dir(&pathname)?;

    let mut listing = Vec::with_capacity(names.len());
    for name in names {
      let entry = match name.as_str() {
        "." => (ino, FileType::Directory, name),
        ".." => {
          let parent = match pathname.rsplit_once('/') {
            Some(("", _)) | None => "/".to_owned(),
            Some((parent, _)) => parent.to_owned(),
          };
          (to_ino(self.fs.lookup_path(&parent)?), FileType::Directory, name)
        },
        _ => {
          let attr = self.remember(child_path(&pathname, &name))?;
          (attr.ino, attr.kind, name)
        },
      };
      listing.push(entry);
    }
    Ok(listing)
  }

  fn reply_errno(operation: &str, errno: &Errno) -> c_int {
    match errno {
      Errno::NotFound(_) => debug!("fuse.{operation}: {errno}"),
      _ => warn!("fuse.{operation}: {errno}"),
    }
    errno.errno()
  }
}

impl fuser::Filesystem for FuseAdapter {
  fn destroy(&mut self) {
    if let Err(errno) = self.fs.flush() {
      warn!("fuse.destroy: flush failed: {errno}");
    }
    info!("fuse.destroy: unmounted");
  }

  fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
    match self.entry(parent, name) {
      Ok(attr) => reply.entry(&TTL, &attr, 0),
      Err(errno) => reply.error(Self::reply_errno("lookup", &errno)),
    }
  }

  fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
    let attr = self
      .path(ino)
      .and_then(|pathname| self.fs.stat(&pathname))
      .map(|stat| file_attr(&stat));
    match attr {
      Ok(attr) => reply.attr(&TTL, &attr),
      Err(errno) => reply.error(Self::reply_errno("getattr", &errno)),
    }
  }

  fn setattr(
    &mut self,
    _req: &Request<'_>,
    ino: u64,
    _mode: Option<u32>,
    _uid: Option<u32>,
    _gid: Option<u32>,
    size: Option<u64>,
    atime: Option<TimeOrNow>,
    mtime: Option<TimeOrNow>,
    _ctime: Option<SystemTime>,
    _fh: Option<u64>,
    _crtime: Option<SystemTime>,
    _chgtime: Option<SystemTime>,
    _bkuptime: Option<SystemTime>,
    _flags: Option<u32>,
    reply: ReplyAttr,
  ) {
    match self.setattr_inner(ino, size, atime, mtime) {
      Ok(attr) => reply.attr(&TTL, &attr),
      Err(errno) => reply.error(Self::reply_errno("setattr", &errno)),
    }
  }

  fn mknod(
    &mut self,
    _req: &Request<'_>,
    parent: u64,
    name: &OsStr,
    mode: u32,
    umask: u32,
    _rdev: u32,
    reply: ReplyEntry,
  ) {
    let created = self.child(parent, name).and_then(|pathname| {
      self.fs.create_file(&pathname, FileMode::new(mode & !umask))?;
      self.remember(pathname)
    });
    match created {
      Ok(attr) => reply.entry(&TTL, &attr, 0),
      Err(errno) => reply.error(Self::reply_errno("mknod", &errno)),
    }
  }

  fn mkdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, mode: u32, umask: u32, reply: ReplyEntry) {
    let created = self.child(parent, name).and_then(|pathname| {
      self.fs.create_dir(&pathname, FileMode::new(mode & !umask))?;
      self.remember(pathname)
    });
    match created {
      Ok(attr) => reply.entry(&TTL, &attr, 0),
      Err(errno) => reply.error(Self::reply_errno("mkdir", &errno)),
    }
  }

  fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
    let removed = self.child(parent, name).and_then(|pathname| {
      self.fs.remove_file(&pathname)?;
      self.forget_path(&pathname);
      Ok(())
    });
    match removed {
      Ok(()) => reply.ok(),
      Err(errno) => reply.error(Self::reply_errno("unlink", &errno)),
    }
  }

  fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
    let removed = self.child(parent, name).and_then(|pathname| {
      self.fs.remove_dir(&pathname)?;
      self.forget_path(&pathname);
      Ok(())
    });
    match removed {
      Ok(()) => reply.ok(),
      Err(errno) => reply.error(Self::reply_errno("rmdir", &errno)),
    }
  }

  fn read(
    &mut self,
    _req: &Request<'_>,
    ino: u64,
    _fh: u64,
    offset: i64,
    size: u32,
    _flags: i32,
    _lock_owner: Option<u64>,
    reply: ReplyData,
  ) {
    let mut buf = vec![0u8; size as usize];
    let read = self
      .path(ino)
      .and_then(|pathname| self.fs.read_file(&pathname, &mut buf, offset.max(0) as u64));
    match read {
      Ok(n) => reply.data(&buf[..n]),
      Err(errno) => reply.error(Self::reply_errno("read", &errno)),
    }
  }

  fn write(
    &mut self,
    _req: &Request<'_>,
    ino: u64,
    _fh: u64,
    offset: i64,
    data: &[u8],
    _write_flags: u32,
    _flags: i32,
    _lock_owner: Option<u64>,
    reply: ReplyWrite,
  ) {
    let written = self
      .path(ino)
      .and_then(|pathname| self.fs.write_file(&pathname, data, offset.max(0) as u64));
    match written {
      Ok(n) => reply.written(n as u32),
      Err(errno) => reply.error(Self::reply_errno("write", &errno)),
    }
  }

  fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
    let listing = match self.readdir_inner(ino) {
      Ok(listing) => listing,
      Err(errno) => return reply.error(Self::reply_errno("readdir", &errno)),
    };

    for (index, (ino, kind, name)) in listing.into_iter().enumerate().skip(offset.max(0) as usize) {
      // true means the reply buffer is full
      if reply.add(ino, (index + 1) as i64, kind, name) {
        break;
      }
    }
    reply.ok();
  }

  fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
    match self.fs.usage() {
      Ok(usage) => reply.statfs(
        usage.blocks as u64,
        usage.free_blocks as u64,
        usage.free_blocks as u64,
        usage.inodes as u64,
        usage.free_inodes as u64,
        BLOCK_SIZE as u32,
        (MAX_NAME - 1) as u32,
        BLOCK_SIZE as u32,
      ),
      Err(errno) => reply.error(Self::reply_errno("statfs", &errno)),
    }
  }
}


// vim:ts=2 sw=2
