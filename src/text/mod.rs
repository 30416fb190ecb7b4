pub mod hash;
pub mod string;

pub use hash::{raw_name_hash, RawNameHasher};
pub use string::{
    escape_into, escape_utf16_into, is_plain_ascii, unescape, unescape_bounded_into, unescape_into,
    write_quoted,
};
