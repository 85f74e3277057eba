use std::io;

use libc::c_int;
use thiserror::Error;

/// Every failure a wfs operation can report. The `&'static str` payloads name
/// the operation that failed, e.g. `"wfs.lookup_path: no such file or directory"`.
#[derive(Debug, Error)]
pub enum Errno {
  /// Path component or target does not exist, or has the wrong type
  #[error("{0}")]
  NotFound(&'static str),
  /// Create over an existing entry
  #[error("{0}")]
  AlreadyExists(&'static str),
  /// Directory removal with live entries
  #[error("{0}")]
  NotEmpty(&'static str),
  /// Inode or data bitmap exhausted, or a pointer array is full
  #[error("{0}")]
  NoSpace(&'static str),
  /// Image is not part of the set, or the set is incomplete
  #[error("invalid disk: {0}")]
  InvalidDisk(String),
  /// Malformed path or argument
  #[error("{0}")]
  InvalidArgument(&'static str),
  /// Name does not fit into a directory entry
  #[error("{0}")]
  NameTooLong(&'static str),
  /// Open, map or flush failure
  #[error("i/o error: {0}")]
  IOError(#[from] io::Error),
}

impl Errno {
  /// Errno value handed back across the dispatch boundary.
  pub fn errno(&self) -> c_int {
    match self {
      Errno::NotFound(_) => libc::ENOENT,
      Errno::AlreadyExists(_) => libc::EEXIST,
      Errno::NotEmpty(_) => libc::ENOTEMPTY,
      Errno::NoSpace(_) => libc::ENOSPC,
      Errno::InvalidDisk(_) => libc::EINVAL,
      Errno::InvalidArgument(_) => libc::EINVAL,
      Errno::NameTooLong(_) => libc::ENAMETOOLONG,
      Errno::IOError(err) => err.raw_os_error().unwrap_or(libc::EIO),
    }
  }

  pub(crate) fn out_of_bounds(what: &'static str) -> Self {
    Errno::IOError(io::Error::new(io::ErrorKind::UnexpectedEof, what))
  }
}


// vim:ts=2 sw=2
