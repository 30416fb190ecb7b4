use std::io::Read;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

mod reader;
mod scanner;

pub use reader::Reader;
pub use scanner::Input;

use crate::error::ErrorStage;
use crate::names::NameTable;
use crate::pool::Recycler;
use crate::value::read_value;
use crate::{DecodeOptions, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    BeginArray,
    EndArray,
    BeginObject,
    EndObject,
    FieldName,
    String,
    Number,
    Boolean,
    Null,
}

/// Reusable reader state: the stream window, scratch buffers and stacks.
/// A pool keeps these between documents; the input is attached per use.
#[derive(Debug, Default)]
pub struct ReaderParts {
    pub(crate) buffer: Vec<u8>,
    pub(crate) scratch: Vec<u8>,
    pub(crate) raw: Vec<u8>,
    pub(crate) frames: reader::Frames,
    pub(crate) tables: Vec<Option<Arc<NameTable>>>,
}

impl ReaderParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties every buffer, keeping capacity.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scratch.clear();
        self.raw.clear();
        self.frames.clear();
        self.tables.clear();
    }

    /// Bytes currently allocated across the buffers.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity() + self.scratch.capacity() + self.raw.capacity()
    }
}

pub fn from_slice<T: DeserializeOwned>(input: &[u8], options: &DecodeOptions) -> Result<T> {
    let recycler = Recycler::shared();
    let mut reader = recycler.acquire_reader_with(Input::Slice(input), options);
    let value = read_document(&mut reader)?;
    from_value(value)
}

pub fn from_str<T: DeserializeOwned>(input: &str, options: &DecodeOptions) -> Result<T> {
    from_slice(input.as_bytes(), options)
}

pub fn from_reader<T: DeserializeOwned, R: Read>(read: R, options: &DecodeOptions) -> Result<T> {
    let recycler = Recycler::shared();
    let mut reader = recycler.acquire_reader_with(Input::Stream(Box::new(read)), options);
    let value = read_document(&mut reader)?;
    from_value(value)
}

/// Checks that `input` is well formed without building any values. With
/// `json_stream` set, every top-level value is checked.
pub fn validate_slice(input: &[u8], options: &DecodeOptions) -> Result<()> {
    let recycler = Recycler::shared();
    let mut reader = recycler.acquire_reader_with(Input::Slice(input), options);
    if options.json_stream {
        while reader.has_next_value()? {
            reader.skip_value()?;
        }
        return Ok(());
    }
    reader.skip_value()?;
    reader.finish()
}

/// Every top-level value of a JSON stream.
pub fn values_from_slice(input: &[u8], options: &DecodeOptions) -> Result<Vec<Value>> {
    let options = options.clone().with_json_stream(true);
    let recycler = Recycler::shared();
    let mut reader = recycler.acquire_reader_with(Input::Slice(input), &options);
    let mut values = Vec::new();
    while reader.has_next_value()? {
        values.push(read_value(&mut reader)?);
    }
    Ok(values)
}

fn read_document(reader: &mut Reader<'_>) -> Result<Value> {
    let value = read_value(reader)?;
    reader.finish()?;
    Ok(value)
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| Error::serde(&err, ErrorStage::Decode))
}
