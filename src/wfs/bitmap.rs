/// Bit `bit` of `bitmap`, least significant bit of each byte first.
pub fn is_set(bitmap: &[u8], bit: usize) -> bool {
  bitmap
    .get(bit / 8)
    .map(|byte| byte & (1 << (bit % 8)) != 0)
    .unwrap_or(false)
}

/// The byte holding `bit` after setting it to `value`, with its index.
/// Callers commit that single byte.
pub fn with_bit(bitmap: &[u8], bit: usize, value: bool) -> (usize, u8) {
  let index = bit / 8;
  let byte = bitmap.get(index).copied().unwrap_or(0);
  let mask = 1 << (bit % 8);

  (index, if value { byte | mask } else { byte & !mask })
}

/// First-fit scan shared by the inode and data allocators.
///
/// Walks bit positions `0..limit` and, for each, every lane `0..lanes`;
/// returns the first `(lane, bit)` whose bit is clear. With one lane this is
/// a plain scan, with several it yields round-robin placement.
pub fn first_fit<F>(limit: usize, lanes: usize, is_set: F) -> Option<(usize, usize)>
where
  F: Fn(usize, usize) -> bool,
{
  (0..limit)
    .flat_map(|bit| (0..lanes).map(move |lane| (lane, bit)))
    .find(|&(lane, bit)| !is_set(lane, bit))
}

pub fn count_set(bitmap: &[u8], limit: usize) -> usize {
  (0..limit).filter(|&bit| is_set(bitmap, bit)).count()
}


// vim:ts=2 sw=2
