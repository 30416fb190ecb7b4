use std::io::Write;
use std::sync::Arc;

use serde::Serialize;

mod writer;

pub use writer::Writer;

use crate::error::ErrorStage;
use crate::names::NameTable;
use crate::pool::Recycler;
use crate::value::write_value;
use crate::{EncodeOptions, Error, Result};

/// Reusable writer state kept by a pool between documents.
#[derive(Debug, Default)]
pub struct WriterParts {
    pub(crate) buffer: Vec<u8>,
    pub(crate) frames: writer::Frames,
    pub(crate) tables: Vec<Option<Arc<NameTable>>>,
    pub(crate) pending_text: String,
}

impl WriterParts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.frames.clear();
        self.tables.clear();
        self.pending_text.clear();
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity() + self.pending_text.capacity()
    }
}

/// Serializes `value` to JSON bytes.
///
/// ```
/// use quill_json::EncodeOptions;
/// use serde_json::json;
///
/// let bytes = quill_json::encode::to_vec(&json!({"id": 1}), &EncodeOptions::default())?;
/// assert_eq!(bytes, br#"{"id":1}"#);
/// # Ok::<(), quill_json::Error>(())
/// ```
pub fn to_vec<T: Serialize + ?Sized>(value: &T, options: &EncodeOptions) -> Result<Vec<u8>> {
    let value = to_json_value(value)?;
    let recycler = Recycler::shared();
    let mut writer = recycler.acquire_writer_with(None, options);
    write_value(&mut writer, &value)?;
    writer.finish()?;
    Ok(writer.as_bytes().to_vec())
}

pub fn to_string<T: Serialize + ?Sized>(value: &T, options: &EncodeOptions) -> Result<String> {
    let bytes = to_vec(value, options)?;
    String::from_utf8(bytes).map_err(|err| Error::encode(format!("invalid utf-8: {err}")))
}

/// Streams `value` into `sink`, flushing every `buffer_size` bytes. A failed
/// serialization leaves the sink without its final flush.
pub fn to_writer<T: Serialize + ?Sized, W: Write>(
    sink: W,
    value: &T,
    options: &EncodeOptions,
) -> Result<()> {
    let value = to_json_value(value)?;
    let recycler = Recycler::shared();
    let mut writer = recycler.acquire_writer_with(Some(Box::new(sink)), options);
    let result = write_value(&mut writer, &value).and_then(|()| writer.finish());
    if result.is_err() {
        writer.mark_incomplete();
    }
    result
}

fn to_json_value<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|err| Error::serde(&err, ErrorStage::Encode))
}
