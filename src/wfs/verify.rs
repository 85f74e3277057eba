//! Offline mirror check: digests the replicated regions of every disk and
//! reports which disks disagree with the main one. Nothing is repaired.

use std::fmt;
use std::ops::Range;

use log::{debug, warn};
use sha2::{Digest, Sha256};

use super::disk::DiskSet;
use super::errno::Errno;
use super::raid::RaidMode;

/// Digest of one region on one disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDigest {
  pub region: &'static str,
  pub disk: usize,
  pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
  pub raid: RaidMode,
  pub digests: Vec<RegionDigest>,
  /// `(region, disk)` pairs whose digest differs from disk 0's
  pub mismatches: Vec<(&'static str, usize)>,
}

impl MirrorReport {
  pub fn is_consistent(&self) -> bool {
    self.mismatches.is_empty()
  }
}

impl fmt::Display for MirrorReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for digest in &self.digests {
      writeln!(f, "disk {} {:<12} {}", digest.disk, digest.region, digest.sha256)?;
    }
    match self.mismatches.len() {
      0 => write!(f, "{}: all replicated regions agree", self.raid),
      n => write!(f, "{}: {n} replicated regions diverge", self.raid),
    }
  }
}

fn sha256(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

/// Byte ranges every disk of the set must hold identically.
fn replicated_regions(disks: &DiskSet) -> Result<Vec<(&'static str, Range<usize>)>, Errno> {
  let layout = disks.layout()?;
  let inode_bitmap = layout.inode_bitmap()..layout.inode_bitmap() + layout.inode_bitmap_len();
  let inode_table = layout.inode_table()..layout.data_region();

  Ok(match disks.raid() {
    RaidMode::Raid1 | RaidMode::Raid1v => vec![
      ("inode-bitmap", inode_bitmap),
      ("data-bitmap", layout.data_bitmap()..layout.data_bitmap() + layout.data_bitmap_len()),
      ("inode-table", inode_table),
      ("data", layout.data_region()..layout.end()),
    ],
    RaidMode::Raid0 => vec![("inode-bitmap", inode_bitmap), ("inode-table", inode_table)],
  })
}

pub fn verify(disks: &DiskSet) -> Result<MirrorReport, Errno> {
  let mut digests = Vec::new();
  let mut mismatches = Vec::new();

  for (region, range) in replicated_regions(disks)? {
    let mut reference = None;
    for (index, disk) in disks.disks().iter().enumerate() {
      let sha256 = sha256(disk.bytes(range.start, range.len())?);
      debug!("verify: disk {index} {region} {sha256}");

      match &reference {
        None => reference = Some(sha256.clone()),
        Some(main) if *main != sha256 => {
          warn!("verify: disk {index} ({}) diverges in {region}", disk.path().display());
          mismatches.push((region, index));
        },
        Some(_) => (),
      }
      digests.push(RegionDigest { region, disk: index, sha256 });
    }
  }

  Ok(MirrorReport {
    raid: disks.raid(),
    digests,
    mismatches,
  })
}


// vim:ts=2 sw=2
