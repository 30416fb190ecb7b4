use crate::constants::{HASH_PRIME, HASH_SEED};

/// FNV-1a style rolling hash over raw field-name bytes, escapes included.
///
/// The state can be carried across buffer refills: hashing `a` then `b` with
/// two `update` calls yields the same value as hashing `a ++ b` at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawNameHasher {
    state: u64,
}

impl Default for RawNameHasher {
    fn default() -> Self {
        Self { state: HASH_SEED }
    }
}

impl RawNameHasher {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.state ^= u64::from(byte);
        self.state = self.state.wrapping_mul(HASH_PRIME);
    }

    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    pub fn finish(&self) -> u64 {
        self.state
    }
}

pub fn raw_name_hash(bytes: &[u8]) -> u64 {
    let mut hasher = RawNameHasher::new();
    hasher.update(bytes);
    hasher.finish()
}
