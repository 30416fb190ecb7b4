pub const DEFAULT_BUFFER_SIZE: usize = 4096;

pub const MAX_NUMBER_DIGITS: usize = 100;

pub const MAX_STRING_BUFFER: usize = 128 * 1024 * 1024;

pub const MAX_BUFFER_SIZE: usize = 128 * 1024 * 1024;

pub const MAX_DEPTH: usize = 256;

/// Bytes kept around a failure offset in `ErrorDetail::Context` messages.
pub const ERROR_CONTEXT_BYTES: usize = 20;

pub const HASH_SEED: u64 = 0x811c_9dc5;

pub const HASH_PRIME: u64 = 0x0100_0193;

pub const NULL: &[u8] = b"null";
pub const TRUE: &[u8] = b"true";
pub const FALSE: &[u8] = b"false";

/// New capacity for a buffer that must hold at least `required` bytes.
#[inline]
pub(crate) fn grown_capacity(current: usize, required: usize) -> usize {
    let grown = current.saturating_add(current / 2);
    grown.max(required).max(16)
}

#[inline]
pub(crate) fn is_ascii_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

/// Length of the Unicode space separator encoded at the start of `bytes`, if
/// any. Callers must supply at least three bytes unless input ends sooner.
pub(crate) fn unicode_whitespace_len(bytes: &[u8]) -> Option<usize> {
    match bytes {
        [0xC2, 0xA0, ..] => Some(2),
        [0xE1, 0x9A, 0x80, ..] => Some(3),
        [0xE2, 0x80, 0x80..=0x8A | 0xA8 | 0xA9 | 0xAF, ..] => Some(3),
        [0xE2, 0x81, 0x9F, ..] => Some(3),
        [0xE3, 0x80, 0x80, ..] => Some(3),
        _ => None,
    }
}

#[inline]
pub(crate) fn is_number_byte(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}
