//! Bit-exact encodings of the on-disk records and the address arithmetic
//! that locates them inside an image.
//!
//! ```text
//!            d_bitmap_ptr       d_blocks_ptr
//!                 v                  v
//! +----+---------+---------+--------+--------------------------+
//! | SB | IBITMAP | DBITMAP | INODES |       DATA BLOCKS        |
//! +----+---------+---------+--------+--------------------------+
//! 0    ^                   ^
//!  i_bitmap_ptr        i_blocks_ptr
//! ```

use std::sync::OnceLock;

use fancy_regex::Regex;

use super::errno::Errno;
use super::fs::FileMode;
use super::raid::RaidMode;

pub const BLOCK_SIZE: usize = 512;
/// Name bytes in a directory entry, including the terminating NUL
pub const MAX_NAME: usize = 28;
pub const DISK_ID_SIZE: usize = 128;
pub const MIN_DISKS: usize = 2;
pub const MAX_DISKS: usize = 16;

pub const D_BLOCK: usize = 6;
pub const IND_BLOCK: usize = D_BLOCK + 1;
pub const N_BLOCKS: usize = IND_BLOCK + 1;

pub const SUPERBLOCK_SIZE: usize = 2240;
pub const INODE_SIZE: usize = 120;
pub const DENTRY_SIZE: usize = 32;
pub const DENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DENTRY_SIZE;

/// Block pointer slot with no block behind it
pub const NO_BLOCK: i64 = -1;
/// `Inode::num` of a released inode, `DirEntry::num` of an empty slot
pub const FREE: i32 = -1;
/// Byte pattern of a freshly allocated block: every dentry slot reads as empty
pub const SENTINEL_BYTE: u8 = 0xff;

pub const ROOT_INODE_NUMBER: usize = 0;

fn le_u32(bytes: &[u8], at: usize) -> u32 {
  let mut buf = [0u8; 4];
  buf.copy_from_slice(&bytes[at..at + 4]);
  u32::from_le_bytes(buf)
}

fn le_i32(bytes: &[u8], at: usize) -> i32 {
  le_u32(bytes, at) as i32
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
  let mut buf = [0u8; 8];
  buf.copy_from_slice(&bytes[at..at + 8]);
  u64::from_le_bytes(buf)
}

fn le_i64(bytes: &[u8], at: usize) -> i64 {
  le_u64(bytes, at) as i64
}

/// Entry-name pattern, compiled on first use.
fn name_pattern() -> Option<&'static Regex> {
  static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"^[^/\x00]+$").ok()).as_ref()
}

/// NUL-terminated string out of a fixed-size field.
fn c_string(field: &[u8]) -> Option<String> {
  let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
  String::from_utf8(field[..end].to_vec()).ok()
}

fn put_c_string(field: &mut [u8], value: &str) {
  field.fill(0);
  let len = value.len().min(field.len() - 1);
  field[..len].copy_from_slice(&value.as_bytes()[..len]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
  pub num_inodes: u64,
  pub num_data_blocks: u64,
  pub i_bitmap_ptr: i64,
  pub d_bitmap_ptr: i64,
  pub i_blocks_ptr: i64,
  pub d_blocks_ptr: i64,
  pub raid: RaidMode,
  /// Identity of the disk this copy was read from
  pub id: String,
  /// Identities of every member, in the order the set was formatted
  pub disks: Vec<String>,
}

impl Superblock {
  const RAID_AT: usize = 48;
  const ID_AT: usize = 52;
  const DISKS_AT: usize = Self::ID_AT + DISK_ID_SIZE;
  const NUM_DISKS_AT: usize = 2232;

  pub fn decode(bytes: &[u8]) -> Result<Self, Errno> {
    if bytes.len() < SUPERBLOCK_SIZE {
      return Err(Errno::InvalidDisk(format!(
        "superblock needs {SUPERBLOCK_SIZE} bytes, image has {}",
        bytes.len()
      )));
    }

    let raid = RaidMode::try_from(le_u32(bytes, Self::RAID_AT))?;
    let num_disks = le_u64(bytes, Self::NUM_DISKS_AT) as usize;
    if num_disks == 0 || num_disks > MAX_DISKS {
      return Err(Errno::InvalidDisk(format!("superblock declares {num_disks} disks")));
    }

    let id = c_string(&bytes[Self::ID_AT..Self::ID_AT + DISK_ID_SIZE])
      .ok_or_else(|| Errno::InvalidDisk("disk id is not utf-8".to_owned()))?;
    let disks = (0..num_disks)
      .map(|i| {
        let at = Self::DISKS_AT + i * DISK_ID_SIZE;
        c_string(&bytes[at..at + DISK_ID_SIZE])
          .ok_or_else(|| Errno::InvalidDisk(format!("member id #{i} is not utf-8")))
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      num_inodes: le_u64(bytes, 0),
      num_data_blocks: le_u64(bytes, 8),
      i_bitmap_ptr: le_i64(bytes, 16),
      d_bitmap_ptr: le_i64(bytes, 24),
      i_blocks_ptr: le_i64(bytes, 32),
      d_blocks_ptr: le_i64(bytes, 40),
      raid,
      id,
      disks,
    })
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut bytes = vec![0u8; SUPERBLOCK_SIZE];
    bytes[0..8].copy_from_slice(&self.num_inodes.to_le_bytes());
    bytes[8..16].copy_from_slice(&self.num_data_blocks.to_le_bytes());
    bytes[16..24].copy_from_slice(&self.i_bitmap_ptr.to_le_bytes());
    bytes[24..32].copy_from_slice(&self.d_bitmap_ptr.to_le_bytes());
    bytes[32..40].copy_from_slice(&self.i_blocks_ptr.to_le_bytes());
    bytes[40..48].copy_from_slice(&self.d_blocks_ptr.to_le_bytes());
    bytes[Self::RAID_AT..Self::RAID_AT + 4].copy_from_slice(&(self.raid as u32).to_le_bytes());
    put_c_string(&mut bytes[Self::ID_AT..Self::ID_AT + DISK_ID_SIZE], &self.id);
    for (i, disk) in self.disks.iter().take(MAX_DISKS).enumerate() {
      let at = Self::DISKS_AT + i * DISK_ID_SIZE;
      put_c_string(&mut bytes[at..at + DISK_ID_SIZE], disk);
    }
    let num_disks = self.disks.len().min(MAX_DISKS) as u64;
    bytes[Self::NUM_DISKS_AT..Self::NUM_DISKS_AT + 8].copy_from_slice(&num_disks.to_le_bytes());
    bytes
  }

  pub fn num_disks(&self) -> usize {
    self.disks.len()
  }

  /// A disk belongs to the set iff its own id is listed.
  pub fn is_member(&self) -> bool {
    self.disks.iter().any(|disk| *disk == self.id)
  }

  /// Same geometry and raid mode, identities aside.
  pub fn same_layout(&self, other: &Superblock) -> bool {
    self.num_inodes == other.num_inodes
      && self.num_data_blocks == other.num_data_blocks
      && self.i_bitmap_ptr == other.i_bitmap_ptr
      && self.d_bitmap_ptr == other.d_bitmap_ptr
      && self.i_blocks_ptr == other.i_blocks_ptr
      && self.d_blocks_ptr == other.d_blocks_ptr
      && self.raid == other.raid
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
  pub num: i32,
  pub mode: FileMode,
  pub uid: u32,
  pub gid: u32,
  pub size: i64,
  pub nlinks: i32,
  pub atim: i64,
  pub mtim: i64,
  pub ctim: i64,
  /// Logical data-block numbers, `NO_BLOCK` when unset
  pub blocks: [i64; N_BLOCKS],
}

impl Inode {
  const BLOCKS_AT: usize = 56;

  pub fn decode(bytes: &[u8]) -> Result<Self, Errno> {
    if bytes.len() < INODE_SIZE {
      return Err(Errno::out_of_bounds("inode record truncated"));
    }

    let mut blocks = [NO_BLOCK; N_BLOCKS];
    for (i, block) in blocks.iter_mut().enumerate() {
      *block = le_i64(bytes, Self::BLOCKS_AT + i * 8);
    }

    Ok(Self {
      num: le_i32(bytes, 0),
      mode: FileMode(le_u32(bytes, 4)),
      uid: le_u32(bytes, 8),
      gid: le_u32(bytes, 12),
      size: le_i64(bytes, 16),
      nlinks: le_i32(bytes, 24),
      atim: le_i64(bytes, 32),
      mtim: le_i64(bytes, 40),
      ctim: le_i64(bytes, 48),
      blocks,
    })
  }

  pub fn encode(&self) -> [u8; INODE_SIZE] {
    let mut bytes = [0u8; INODE_SIZE];
    bytes[0..4].copy_from_slice(&self.num.to_le_bytes());
    bytes[4..8].copy_from_slice(&self.mode.get_raw().to_le_bytes());
    bytes[8..12].copy_from_slice(&self.uid.to_le_bytes());
    bytes[12..16].copy_from_slice(&self.gid.to_le_bytes());
    bytes[16..24].copy_from_slice(&self.size.to_le_bytes());
    bytes[24..28].copy_from_slice(&self.nlinks.to_le_bytes());
    bytes[32..40].copy_from_slice(&self.atim.to_le_bytes());
    bytes[40..48].copy_from_slice(&self.mtim.to_le_bytes());
    bytes[48..56].copy_from_slice(&self.ctim.to_le_bytes());
    for (i, block) in self.blocks.iter().enumerate() {
      let at = Self::BLOCKS_AT + i * 8;
      bytes[at..at + 8].copy_from_slice(&block.to_le_bytes());
    }
    bytes
  }

  /// Occupied pointer slots.
  pub fn allocated_blocks(&self) -> usize {
    self.blocks.iter().filter(|&&block| block != NO_BLOCK).count()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
  pub name: [u8; MAX_NAME],
  pub num: i32,
}

impl DirEntry {
  /// Byte offset of `num` inside an entry
  pub const NUM_AT: usize = MAX_NAME;

  pub fn new(name: &str, num: i32) -> Result<Self, Errno> {
    Self::validate_name(name)?;

    let mut field = [0u8; MAX_NAME];
    field[..name.len()].copy_from_slice(name.as_bytes());
    Ok(Self { name: field, num })
  }

  /// Names must fit a dentry with room for NUL and must not contain `/`.
  pub fn validate_name(name: &str) -> Result<(), Errno> {
    if name.len() > MAX_NAME - 1 {
      return Err(Errno::NameTooLong("wfs.dentry: name does not fit a directory entry"));
    }

    let re = name_pattern().ok_or(Errno::InvalidArgument("wfs.dentry: bad name pattern"))?;
    match re.is_match(name) {
      Ok(true) if name != "." && name != ".." => Ok(()),
      _ => Err(Errno::InvalidArgument("wfs.dentry: invalid entry name")),
    }
  }

  pub fn decode(bytes: &[u8]) -> Self {
    let mut name = [0u8; MAX_NAME];
    name.copy_from_slice(&bytes[..MAX_NAME]);
    Self { name, num: le_i32(bytes, Self::NUM_AT) }
  }

  pub fn encode(&self) -> [u8; DENTRY_SIZE] {
    let mut bytes = [0u8; DENTRY_SIZE];
    bytes[..MAX_NAME].copy_from_slice(&self.name);
    bytes[Self::NUM_AT..].copy_from_slice(&self.num.to_le_bytes());
    bytes
  }

  pub fn is_free(&self) -> bool {
    self.num == FREE
  }

  pub fn name_bytes(&self) -> &[u8] {
    let end = self.name.iter().position(|&b| b == 0).unwrap_or(MAX_NAME);
    &self.name[..end]
  }

  pub fn name(&self) -> String {
    String::from_utf8_lossy(self.name_bytes()).into_owned()
  }

  pub fn is_named(&self, name: &str) -> bool {
    self.name_bytes() == name.as_bytes()
  }
}

/// Absolute byte offsets of every region, derived from a superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
  pub num_inodes: usize,
  pub num_data_blocks: usize,
  i_bitmap: usize,
  d_bitmap: usize,
  i_blocks: usize,
  d_blocks: usize,
}

impl Layout {
  pub fn of(superblock: &Superblock) -> Result<Self, Errno> {
    let offset = |value: i64, what: &str| {
      usize::try_from(value).map_err(|_| Errno::InvalidDisk(format!("negative {what} offset")))
    };

    Ok(Self {
      num_inodes: superblock.num_inodes as usize,
      num_data_blocks: superblock.num_data_blocks as usize,
      i_bitmap: offset(superblock.i_bitmap_ptr, "inode bitmap")?,
      d_bitmap: offset(superblock.d_bitmap_ptr, "data bitmap")?,
      i_blocks: offset(superblock.i_blocks_ptr, "inode table")?,
      d_blocks: offset(superblock.d_blocks_ptr, "data region")?,
    })
  }

  /// Layout a fresh image gets for the given (already rounded) counts.
  pub fn for_counts(num_inodes: usize, num_data_blocks: usize) -> Self {
    let i_bitmap = SUPERBLOCK_SIZE;
    let d_bitmap = i_bitmap + (num_inodes + 7) / 8;
    let d_bitmap_end = d_bitmap + (num_data_blocks + 7) / 8;
    let i_blocks = (d_bitmap_end + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE;
    let d_blocks = i_blocks + num_inodes * BLOCK_SIZE;

    Self { num_inodes, num_data_blocks, i_bitmap, d_bitmap, i_blocks, d_blocks }
  }

  pub fn inode_bitmap(&self) -> usize {
    self.i_bitmap
  }

  pub fn inode_bitmap_len(&self) -> usize {
    (self.num_inodes + 7) / 8
  }

  pub fn data_bitmap(&self) -> usize {
    self.d_bitmap
  }

  pub fn data_bitmap_len(&self) -> usize {
    (self.num_data_blocks + 7) / 8
  }

  pub fn inode_table(&self) -> usize {
    self.i_blocks
  }

  /// Start of inode `num`'s slot.
  pub fn inode(&self, num: usize) -> usize {
    self.i_blocks + num * BLOCK_SIZE
  }

  pub fn data_region(&self) -> usize {
    self.d_blocks
  }

  /// Start of the physical block `offset` within one disk's data region.
  pub fn data_block(&self, offset: usize) -> usize {
    self.d_blocks + offset * BLOCK_SIZE
  }

  /// First byte past the data region; images must be at least this long.
  pub fn end(&self) -> usize {
    self.d_blocks + self.num_data_blocks * BLOCK_SIZE
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn superblock() -> Superblock {
    let layout = Layout::for_counts(32, 224);
    Superblock {
      num_inodes: 32,
      num_data_blocks: 224,
      i_bitmap_ptr: layout.inode_bitmap() as i64,
      d_bitmap_ptr: layout.data_bitmap() as i64,
      i_blocks_ptr: layout.inode_table() as i64,
      d_blocks_ptr: layout.data_region() as i64,
      raid: RaidMode::Raid1,
      id: "disk-b".to_owned(),
      disks: vec!["disk-a".to_owned(), "disk-b".to_owned()],
    }
  }

  #[test]
  fn superblock_matches_c_layout() {
    let bytes = superblock().encode();

    assert_eq!(bytes.len(), SUPERBLOCK_SIZE);
    assert_eq!(&bytes[0..8], &32u64.to_le_bytes());
    assert_eq!(&bytes[48..52], &1u32.to_le_bytes());
    assert_eq!(&bytes[52..58], b"disk-b");
    assert_eq!(&bytes[180..186], b"disk-a");
    assert_eq!(&bytes[308..314], b"disk-b");
    assert_eq!(&bytes[2232..2240], &2u64.to_le_bytes());
    assert_eq!(Superblock::decode(&bytes).unwrap(), superblock());
  }

  #[test]
  fn superblock_rejects_garbage() {
    let mut bytes = superblock().encode();
    bytes[48] = 9;
    assert!(matches!(Superblock::decode(&bytes), Err(Errno::InvalidDisk(_))));

    let bytes = superblock().encode();
    assert!(matches!(Superblock::decode(&bytes[..100]), Err(Errno::InvalidDisk(_))));
  }

  #[test]
  fn membership_is_by_own_id() {
    let mut sb = superblock();
    assert!(sb.is_member());
    sb.id = "stranger".to_owned();
    assert!(!sb.is_member());
  }

  #[test]
  fn layout_is_block_aligned() {
    let layout = Layout::for_counts(32, 224);

    assert_eq!(layout.inode_bitmap(), SUPERBLOCK_SIZE);
    assert_eq!(layout.data_bitmap(), SUPERBLOCK_SIZE + 4);
    assert_eq!(layout.inode_table() % BLOCK_SIZE, 0);
    assert!(layout.inode_table() >= layout.data_bitmap() + 28);
    assert_eq!(layout.data_region(), layout.inode_table() + 32 * BLOCK_SIZE);
    assert_eq!(layout.inode(3), layout.inode_table() + 3 * BLOCK_SIZE);
    assert_eq!(layout.end(), layout.data_region() + 224 * BLOCK_SIZE);
    assert_eq!(Layout::of(&superblock()).unwrap(), layout);
  }

  #[test]
  fn inode_fields_land_on_c_offsets() {
    let inode = Inode {
      num: 7,
      mode: FileMode(0o100644),
      uid: 1000,
      gid: 100,
      size: 513,
      nlinks: 2,
      atim: 1,
      mtim: 2,
      ctim: 3,
      blocks: [4, NO_BLOCK, NO_BLOCK, NO_BLOCK, NO_BLOCK, NO_BLOCK, NO_BLOCK, NO_BLOCK],
    };
    let bytes = inode.encode();

    assert_eq!(&bytes[16..24], &513i64.to_le_bytes());
    assert_eq!(&bytes[56..64], &4i64.to_le_bytes());
    assert_eq!(&bytes[64..72], &(-1i64).to_le_bytes());
    assert_eq!(Inode::decode(&bytes).unwrap(), inode);
    assert_eq!(inode.allocated_blocks(), 1);
  }

  #[test]
  fn sentinel_block_reads_as_free_entries() {
    let block = [SENTINEL_BYTE; BLOCK_SIZE];
    assert!(block
      .chunks(DENTRY_SIZE)
      .map(DirEntry::decode)
      .all(|entry| entry.is_free()));
  }

  #[test]
  fn dentry_names_are_bounded() {
    assert!(DirEntry::new(&"a".repeat(MAX_NAME - 1), 1).is_ok());
    assert!(matches!(DirEntry::new(&"a".repeat(MAX_NAME), 1), Err(Errno::NameTooLong(_))));
    assert!(matches!(DirEntry::new("a/b", 1), Err(Errno::InvalidArgument(_))));
    assert!(matches!(DirEntry::new("", 1), Err(Errno::InvalidArgument(_))));
    assert!(matches!(DirEntry::new("..", 1), Err(Errno::InvalidArgument(_))));

    let entry = DirEntry::new("b.txt", 3).unwrap();
    assert!(entry.is_named("b.txt"));
    assert!(!entry.is_named("b.tx"));
    assert_eq!(DirEntry::decode(&entry.encode()), entry);
  }

  #[test]
  fn name_pattern_is_compiled_once() {
    let first = name_pattern().unwrap();
    DirEntry::validate_name("x").unwrap();
    DirEntry::validate_name("y").unwrap();
    assert!(std::ptr::eq(first, name_pattern().unwrap()));
  }
}

// vim:ts=2 sw=2
