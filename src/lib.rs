//! Streaming JSON tokenizer and generator.
//!
//! [`Reader`] pulls tokens from a byte slice or any `Read`, and [`Writer`]
//! turns begin/end/name/value calls into JSON bytes. Both keep their buffers
//! in a [`Recycler`] between documents. The functions at the crate root go
//! through `serde_json::Value` and the shared recycler.
//!
//! ```
//! use quill_json::{DecodeOptions, Reader};
//!
//! let mut reader = Reader::from_slice(br#"{"id": 7, "tags": ["a"]}"#, &DecodeOptions::default());
//! reader.begin_object()?;
//! assert!(reader.has_next_field()?);
//! assert_eq!(reader.next_field()?, "id");
//! assert_eq!(reader.read_i64()?, 7);
//! assert!(reader.has_next_field()?);
//! assert_eq!(reader.next_field()?, "tags");
//! reader.skip_value()?;
//! assert!(!reader.has_next_field()?);
//! reader.end_object()?;
//! reader.finish()?;
//! # Ok::<(), quill_json::Error>(())
//! ```

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod names;
pub mod num;
pub mod options;
pub mod pool;
pub mod text;
pub mod value;

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use crate::decode::{Input, Reader, ReaderParts, Token};
pub use crate::encode::{Writer, WriterParts};
pub use crate::error::{Error, ErrorKind, ErrorStage, Location};
pub use crate::names::NameTable;
pub use crate::num::Decimal;
pub use crate::options::{DecodeOptions, EncodeOptions, ErrorDetail};
pub use crate::pool::{PoolStrategy, PooledReader, PooledWriter, Recycler, RecyclerPool};

pub type Result<T> = std::result::Result<T, Error>;

pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    to_string_with_options(value, &EncodeOptions::default())
}

pub fn to_string_with_options<T: Serialize + ?Sized>(
    value: &T,
    options: &EncodeOptions,
) -> Result<String> {
    encode::to_string(value, options)
}

pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    to_vec_with_options(value, &EncodeOptions::default())
}

pub fn to_vec_with_options<T: Serialize + ?Sized>(
    value: &T,
    options: &EncodeOptions,
) -> Result<Vec<u8>> {
    encode::to_vec(value, options)
}

pub fn to_writer<T: Serialize + ?Sized, W: Write>(writer: W, value: &T) -> Result<()> {
    to_writer_with_options(writer, value, &EncodeOptions::default())
}

pub fn to_writer_with_options<T: Serialize + ?Sized, W: Write>(
    writer: W,
    value: &T,
    options: &EncodeOptions,
) -> Result<()> {
    encode::to_writer(writer, value, options)
}

pub fn from_str<T: DeserializeOwned>(input: &str) -> Result<T> {
    from_str_with_options(input, &DecodeOptions::default())
}

pub fn from_str_with_options<T: DeserializeOwned>(
    input: &str,
    options: &DecodeOptions,
) -> Result<T> {
    decode::from_str(input, options)
}

pub fn from_slice<T: DeserializeOwned>(input: &[u8]) -> Result<T> {
    from_slice_with_options(input, &DecodeOptions::default())
}

pub fn from_slice_with_options<T: DeserializeOwned>(
    input: &[u8],
    options: &DecodeOptions,
) -> Result<T> {
    decode::from_slice(input, options)
}

pub fn from_reader<T: DeserializeOwned, R: Read>(reader: R) -> Result<T> {
    from_reader_with_options(reader, &DecodeOptions::default())
}

pub fn from_reader_with_options<T: DeserializeOwned, R: Read>(
    reader: R,
    options: &DecodeOptions,
) -> Result<T> {
    decode::from_reader(reader, options)
}

/// Every top-level value of a whitespace-separated JSON stream.
pub fn values_from_slice(input: &[u8]) -> Result<Vec<Value>> {
    decode::values_from_slice(input, &DecodeOptions::default())
}

pub fn validate_slice(input: &[u8]) -> Result<()> {
    validate_slice_with_options(input, &DecodeOptions::default())
}

pub fn validate_slice_with_options(input: &[u8], options: &DecodeOptions) -> Result<()> {
    decode::validate_slice(input, options)
}

pub fn validate_str(input: &str) -> Result<()> {
    validate_slice(input.as_bytes())
}
