use chrono::Utc;

/// Apply `f` until the value stops changing.
pub fn fixedpoint<T, F>(f: F, mut value: T) -> T
where
  T: PartialEq + Clone,
  F: Fn(T) -> T,
{
  loop {
    let next = f(value.clone());
    if next == value {
      return value;
    }
    value = next;
  }
}

/// Seconds since the epoch, the resolution inode timestamps carry.
pub fn unixtime() -> i64 {
  Utc::now().timestamp()
}

/// Identity recorded on newly created inodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
  pub uid: u32,
  pub gid: u32,
}

impl Owner {
  /// Effective uid/gid of this process.
  pub fn effective() -> Self {
    // SAFETY: geteuid/getegid cannot fail and touch no memory
    unsafe {
      Self {
        uid: libc::geteuid(),
        gid: libc::getegid(),
      }
    }
  }
}

#[cfg(test)]
pub use self::images::{mkimages, ImageSet};



// vim:ts=2 sw=2
