use itertools::Itertools;

use crate::util::fixedpoint;

use super::errno::Errno;

pub type InodeNumber = usize;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFBLK: u32 = 0o060000;

/// Raw `mode_t`: file type in the `S_IFMT` bits, permissions below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileModeType {
  File,
  Dir,
  Char,
  Block,
  Other,
}

impl FileMode {
  pub fn new(raw: u32) -> Self {
    Self(raw)
  }

  pub fn file(permissions: u32) -> Self {
    Self(S_IFREG | (permissions & 0o7777))
  }

  pub fn dir(permissions: u32) -> Self {
    Self(S_IFDIR | (permissions & 0o7777))
  }

  pub fn file_type(&self) -> FileModeType {
    match self.0 & S_IFMT {
      S_IFREG => FileModeType::File,
      S_IFDIR => FileModeType::Dir,
      S_IFCHR => FileModeType::Char,
      S_IFBLK => FileModeType::Block,
      _ => FileModeType::Other,
    }
  }

  pub fn permissions(&self) -> u32 {
    self.0 & 0o7777
  }

  /// Same permissions, type bits replaced.
  pub fn with_type(&self, file_type: FileModeType) -> Self {
    let bits = match file_type {
      FileModeType::File => S_IFREG,
      FileModeType::Dir => S_IFDIR,
      FileModeType::Char => S_IFCHR,
      FileModeType::Block => S_IFBLK,
      FileModeType::Other => self.0 & S_IFMT,
    };
    Self(bits | self.permissions())
  }

  pub fn is_dir(&self) -> bool {
    self.file_type() == FileModeType::Dir
  }

  pub fn is_file(&self) -> bool {
    self.file_type() == FileModeType::File
  }

  pub fn get_raw(&self) -> u32 {
    self.0
  }
}

/// Attributes reported by `Filesystem::stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
  pub inode_number: InodeNumber,
  pub mode: FileMode,
  pub uid: u32,
  pub gid: u32,
  pub size: u64,
  pub links_count: u32,
  pub atime: i64,
  pub mtime: i64,
  pub ctime: i64,
  /// Allocated data blocks
  pub blocks: u64,
  pub block_size: u32,
}

/// Path-based filesystem operations, one call per dispatched request.
pub trait Filesystem {
  fn stat(&self, pathname: &str)
    -> Result<FileStat, Errno>;

  /// Inode number `pathname` resolves to.
  fn lookup_path(&self, pathname: &str)
    -> Result<InodeNumber, Errno>;

  fn create_file(&mut self, pathname: &str, mode: FileMode)
    -> Result<FileStat, Errno>;

  fn create_dir(&mut self, pathname: &str, mode: FileMode)
    -> Result<FileStat, Errno>;

  fn remove_file(&mut self, pathname: &str)
    -> Result<(), Errno>;

  fn remove_dir(&mut self, pathname: &str)
    -> Result<(), Errno>;

  /// Fill `buf` from `offset`; returns the number of bytes copied.
  fn read_file(&self, pathname: &str, buf: &mut [u8], offset: u64)
    -> Result<usize, Errno>;

  fn write_file(&mut self, pathname: &str, data: &[u8], offset: u64)
    -> Result<usize, Errno>;

  /// Hand every entry name, `.` and `..` included, to `filler`.
  fn read_dir(&self, pathname: &str, filler: &mut dyn FnMut(&str))
    -> Result<(), Errno>;

  fn truncate(&mut self, pathname: &str, size: u64)
    -> Result<(), Errno>;

  fn set_times(&mut self, pathname: &str, atime: Option<i64>, mtime: Option<i64>)
    -> Result<(), Errno>;

  fn name(&self) -> &'static str;

  fn list_dir(&self, pathname: &str) -> Result<Vec<String>, Errno> {
    let mut names = Vec::new();
    self.read_dir(pathname, &mut |name| names.push(name.to_owned()))?;
    Ok(names)
  }
}

/// Split an absolute path into its parent components and final component.
/// The root splits into no parents and `"/"`.
pub fn split_path(pathname: &str) -> Result<(Vec<String>, String), Errno> {
  // Guard for empty `pathname`
  match &pathname {
    pathname if pathname.is_empty() => {
      return Err(Errno::InvalidArgument("fs.split_path: zero-length path"))
    },
    pathname if !pathname.starts_with('/') => {
      return Err(Errno::InvalidArgument("fs.split_path: path must start with '/'"))
    },
    _ => (),
  };

  // Replace all adjacent slashes
  let pathname = fixedpoint(|pathname| pathname.replace("//", "/"), pathname.to_owned());

  // Base case: return root directory '/'
  if pathname == "/" {
    return Ok((Vec::new(), "/".to_owned()));
  }

  let mut components = pathname
    .trim_matches('/')
    .split('/')
    .map(str::to_owned)
    .collect::<Vec<_>>();
  let final_component = components
    .pop()
    .ok_or(Errno::InvalidArgument("fs.split_path: no final component"))?;

  Ok((components, final_component))
}

/// `"/a/b"` for `["a", "b"]`.
pub fn join_path(components: &[String]) -> String {
  format!("/{}", components.iter().join("/"))
}



// vim:ts=2 sw=2
