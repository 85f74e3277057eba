use log::trace;

use super::diskfs::WfsFilesystem;
use super::errno::Errno;
use super::fs::{FileModeType, InodeNumber};
use super::layout::ROOT_INODE_NUMBER;

impl WfsFilesystem {
  /// Walk `pathname` from the root inode and return the inode it names.
  ///
  /// Every component but the last must be a directory. When `filter` is
  /// given, the final inode must have that type or the lookup fails with
  /// `NotFound`. `"/"` resolves to the root without touching any block.
  pub fn resolve(&self, pathname: &str, filter: Option<FileModeType>) -> Result<InodeNumber, Errno> {
    if !pathname.starts_with('/') {
      return Err(Errno::InvalidArgument("wfs.lookup_path: path must start with '/'"));
    }

    let mut current = ROOT_INODE_NUMBER;
    for component in pathname.split('/').filter(|component| !component.is_empty()) {
      let inode = self.read_inode(current)?;
      if !inode.mode.is_dir() {
        return Err(Errno::NotFound("wfs.lookup_path: not a directory"));
      }

      current = self
        .find_entry(&inode, component)?
        .ok_or(Errno::NotFound("wfs.lookup_path: no such file or directory"))?;
      trace!("wfs.lookup_path: {component} -> inode {current}");
    }

    if let Some(filter) = filter {
      if self.read_inode(current)?.mode.file_type() != filter {
        return Err(Errno::NotFound("wfs.lookup_path: wrong file type"));
      }
    }

    Ok(current)
  }
}


// vim:ts=2 sw=2
