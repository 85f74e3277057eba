//! A user-space filesystem over raw disk images, with RAID-0 striping and
//! RAID-1 mirroring across the images of one set.

pub mod alloc;
pub mod bitmap;
pub mod dir;
pub mod disk;
pub mod diskfs;
pub mod errno;
pub mod fs;
pub mod layout;
pub mod lookup;
pub mod mkfs;
pub mod raid;
pub mod verify;

#[cfg(feature = "fuse")]
pub mod fuse;

pub use self::diskfs::WfsFilesystem;
pub use self::errno::Errno;
pub use self::fs::{FileMode, FileStat, Filesystem};
pub use self::raid::RaidMode;

// vim:ts=2 sw=2
