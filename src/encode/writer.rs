use std::io::Write;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_bigint::BigInt;
use smallvec::SmallVec;

use crate::constants::{grown_capacity, FALSE, NULL, TRUE};
use crate::encode::WriterParts;
use crate::error::ErrorStage;
use crate::names::NameTable;
use crate::num::{self, Decimal};
use crate::text::{escape_utf16_into, write_quoted};
use crate::{EncodeOptions, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Array,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    scope: Scope,
    has_sibling: bool,
}

pub(crate) type Frames = SmallVec<[Frame; 16]>;

/// Field name waiting for the next value. Nothing is written until the value
/// arrives, so a suppressed value drops its name as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingName {
    None,
    /// Held in `Writer::pending_text`.
    Text,
    /// Index into the active name table.
    Position(usize),
}

/// Generator turning begin/end/name/value calls into JSON bytes.
///
/// Output accumulates in memory, or streams to a sink once `buffer_size`
/// bytes are pending. Dropping a writer with a sink flushes what is left
/// unless `mark_incomplete` was called.
pub struct Writer<'a> {
    buffer: Vec<u8>,
    sink: Option<Box<dyn Write + 'a>>,
    frames: Frames,
    /// Active name table per open object.
    tables: Vec<Option<Arc<NameTable>>>,
    pending: PendingName,
    pending_text: String,
    options: EncodeOptions,
    flushed: u64,
    top_written: bool,
    incomplete: bool,
    closed: bool,
}

impl<'a> Writer<'a> {
    pub fn new(options: &EncodeOptions) -> Self {
        Self::from_parts(WriterParts::new(), None, options)
    }

    pub fn to_sink<W: Write + 'a>(sink: W, options: &EncodeOptions) -> Self {
        Self::from_parts(WriterParts::new(), Some(Box::new(sink)), options)
    }

    pub fn from_parts(
        parts: WriterParts,
        sink: Option<Box<dyn Write + 'a>>,
        options: &EncodeOptions,
    ) -> Self {
        let WriterParts {
            mut buffer,
            mut frames,
            mut tables,
            mut pending_text,
        } = parts;
        buffer.clear();
        frames.clear();
        tables.clear();
        pending_text.clear();
        if buffer.capacity() < options.buffer_size {
            buffer.reserve_exact(options.buffer_size);
        }
        Self {
            buffer,
            sink,
            frames,
            tables,
            pending: PendingName::None,
            pending_text,
            options: options.clone(),
            flushed: 0,
            top_written: false,
            incomplete: false,
            closed: false,
        }
    }

    /// Flushes to the sink (unless incomplete) and hands back the buffers.
    pub fn into_parts(mut self) -> WriterParts {
        self.take_parts()
    }

    /// Flushes and detaches the sink, then moves the reusable buffers out.
    pub(crate) fn take_parts(&mut self) -> WriterParts {
        self.release_sink();
        let mut parts = WriterParts {
            buffer: std::mem::take(&mut self.buffer),
            frames: std::mem::take(&mut self.frames),
            tables: std::mem::take(&mut self.tables),
            pending_text: std::mem::take(&mut self.pending_text),
        };
        parts.clear();
        parts
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Total bytes produced: flushed to the sink plus still buffered.
    pub fn size(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    /// Buffered bytes not yet flushed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn begin_array(&mut self) -> Result<()> {
        self.before_value()?;
        self.buffer.push(b'[');
        self.frames.push(Frame {
            scope: Scope::Array,
            has_sibling: false,
        });
        Ok(())
    }

    pub fn end_array(&mut self) -> Result<()> {
        self.end(Scope::Array)?;
        self.buffer.push(b']');
        self.after_value()
    }

    pub fn begin_object(&mut self) -> Result<()> {
        self.open_object(None)
    }

    /// Opens an object whose fields may be named by table position.
    pub fn begin_object_with(&mut self, table: &Arc<NameTable>) -> Result<()> {
        self.open_object(Some(Arc::clone(table)))
    }

    pub fn end_object(&mut self) -> Result<()> {
        if self.pending != PendingName::None {
            return Err(Error::encode("field name without a value"));
        }
        self.end(Scope::Object)?;
        self.tables.pop();
        self.buffer.push(b'}');
        self.after_value()
    }

    /// Names the next value. Nothing is written until that value arrives.
    pub fn name(&mut self, name: &str) -> Result<()> {
        self.check_name()?;
        self.pending_text.clear();
        self.pending_text.push_str(name);
        self.pending = PendingName::Text;
        Ok(())
    }

    /// Names the next value by its position in the active name table.
    pub fn name_at(&mut self, position: usize) -> Result<()> {
        self.check_name()?;
        self.pending = PendingName::Position(position);
        Ok(())
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.before_value()?;
        self.reserve(value.len() + 2);
        write_quoted(&mut self.buffer, value);
        self.after_value()
    }

    /// Writes a string given as UTF-16 code units.
    pub fn write_utf16(&mut self, units: &[u16]) -> Result<()> {
        self.before_value()?;
        self.reserve(units.len() + 2);
        self.buffer.push(b'"');
        escape_utf16_into(&mut self.buffer, units)?;
        self.buffer.push(b'"');
        self.after_value()
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.before_value()?;
        self.buffer
            .extend_from_slice(if value { TRUE } else { FALSE });
        self.after_value()
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.before_value()?;
        num::write_i64(&mut self.buffer, value);
        self.after_value()
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.before_value()?;
        num::write_u64(&mut self.buffer, value);
        self.after_value()
    }

    /// Non-finite values are written as the strings `"NaN"`, `"Infinity"` and
    /// `"-Infinity"`.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.before_value()?;
        num::write_f64(&mut self.buffer, value);
        self.after_value()
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.before_value()?;
        num::write_f32(&mut self.buffer, value);
        self.after_value()
    }

    pub fn write_decimal(&mut self, value: &Decimal) -> Result<()> {
        self.before_value()?;
        self.buffer.extend_from_slice(value.to_string().as_bytes());
        self.after_value()
    }

    pub fn write_big_integer(&mut self, value: &BigInt) -> Result<()> {
        self.before_value()?;
        self.buffer
            .extend_from_slice(value.to_str_radix(10).as_bytes());
        self.after_value()
    }

    /// Base64 (standard alphabet, padded) string.
    pub fn write_binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.before_value()?;
        let encoded_len = base64::encoded_len(bytes.len(), true)
            .ok_or_else(|| Error::encode("binary value too large to encode"))?;
        self.reserve(encoded_len + 2);
        self.buffer.push(b'"');
        let start = self.buffer.len();
        self.buffer.resize(start + encoded_len, 0);
        STANDARD
            .encode_slice(bytes, &mut self.buffer[start..])
            .map_err(|err| Error::encode(format!("base64 encoding failed: {err}")))?;
        self.buffer.push(b'"');
        self.after_value()
    }

    /// Copies pre-encoded JSON verbatim. The bytes are not validated.
    pub fn write_raw(&mut self, json: &[u8]) -> Result<()> {
        self.before_value()?;
        self.reserve(json.len());
        self.buffer.extend_from_slice(json);
        self.after_value()
    }

    /// Inside an object with `serialize_nulls` off, drops the field instead.
    pub fn write_null(&mut self) -> Result<()> {
        if !self.options.serialize_nulls && self.suppress_field()? {
            return Ok(());
        }
        self.before_value()?;
        self.buffer.extend_from_slice(NULL);
        self.after_value()
    }

    /// Inside an object with `serialize_empty` off, drops the field instead.
    pub fn empty_array(&mut self) -> Result<()> {
        if !self.options.serialize_empty && self.suppress_field()? {
            return Ok(());
        }
        self.before_value()?;
        self.buffer.extend_from_slice(b"[]");
        self.after_value()
    }

    /// Inside an object with `serialize_empty` off, drops the field instead.
    pub fn empty_object(&mut self) -> Result<()> {
        if !self.options.serialize_empty && self.suppress_field()? {
            return Ok(());
        }
        self.before_value()?;
        self.buffer.extend_from_slice(b"{}");
        self.after_value()
    }

    /// Stops this writer from flushing or closing its sink, so a failed
    /// document is never committed. Buffered bytes are discarded on drop.
    pub fn mark_incomplete(&mut self) {
        self.incomplete = true;
    }

    /// Writes buffered bytes to the sink and flushes it. No-op without a
    /// sink or after `mark_incomplete`.
    pub fn flush(&mut self) -> Result<()> {
        if self.incomplete || self.closed {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        if !self.buffer.is_empty() {
            sink.write_all(&self.buffer)
                .map_err(|err| Error::io(&err, ErrorStage::Encode))?;
            self.flushed += self.buffer.len() as u64;
            self.buffer.clear();
        }
        sink.flush()
            .map_err(|err| Error::io(&err, ErrorStage::Encode))
    }

    /// Flushes and drops the sink. Further writes stay in the buffer.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.flush();
        self.closed = true;
        self.sink = None;
        result
    }

    /// Fails unless exactly one complete document (or a JSON stream of them)
    /// was written, then flushes to the sink if there is one.
    pub fn finish(&mut self) -> Result<()> {
        if self.pending != PendingName::None {
            return Err(Error::encode("field name without a value"));
        }
        if let Some(frame) = self.frames.last() {
            return Err(Error::encode(match frame.scope {
                Scope::Array => "unclosed array",
                Scope::Object => "unclosed object",
            }));
        }
        if !self.top_written {
            return Err(Error::encode("nothing was written"));
        }
        self.flush()
    }

    /// Finishes the document and takes the buffered output.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.finish()?;
        Ok(std::mem::take(&mut self.buffer))
    }

    pub fn finish_string(self) -> Result<String> {
        let bytes = self.into_bytes()?;
        String::from_utf8(bytes).map_err(|err| Error::encode(format!("invalid utf-8: {err}")))
    }

    /// Discards all output state, keeping the sink and buffer capacity.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.frames.clear();
        self.tables.clear();
        self.pending = PendingName::None;
        self.pending_text.clear();
        self.flushed = 0;
        self.top_written = false;
        self.incomplete = false;
    }

    fn open_object(&mut self, table: Option<Arc<NameTable>>) -> Result<()> {
        self.before_value()?;
        self.buffer.push(b'{');
        self.frames.push(Frame {
            scope: Scope::Object,
            has_sibling: false,
        });
        self.tables.push(table);
        Ok(())
    }

    fn end(&mut self, scope: Scope) -> Result<()> {
        match self.frames.last() {
            Some(frame) if frame.scope == scope => {
                self.frames.pop();
                Ok(())
            }
            _ => Err(Error::encode(match scope {
                Scope::Array => "end_array without a matching begin_array",
                Scope::Object => "end_object without a matching begin_object",
            })),
        }
    }

    fn check_name(&self) -> Result<()> {
        match self.frames.last() {
            Some(frame) if frame.scope == Scope::Object => {}
            _ => return Err(Error::encode("field names are only valid inside an object")),
        }
        if self.pending != PendingName::None {
            return Err(Error::encode("a field name is already pending"));
        }
        Ok(())
    }

    /// Drops the pending field when inside an object. Returns false when the
    /// value must be written anyway (array element or top level).
    fn suppress_field(&mut self) -> Result<bool> {
        match self.frames.last() {
            Some(frame) if frame.scope == Scope::Object => {
                if self.pending == PendingName::None {
                    return Err(Error::encode("a value inside an object needs a name"));
                }
                self.pending = PendingName::None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Emits the separator and any pending name in front of a value.
    fn before_value(&mut self) -> Result<()> {
        let Some(frame) = self.frames.last().copied() else {
            if self.top_written {
                if !self.options.json_stream {
                    return Err(Error::encode(
                        "a second top-level value requires json_stream",
                    ));
                }
                self.buffer.push(b'\n');
            }
            self.top_written = true;
            return Ok(());
        };
        if frame.scope == Scope::Object && self.pending == PendingName::None {
            return Err(Error::encode("a value inside an object needs a name"));
        }
        if frame.has_sibling {
            self.buffer.push(b',');
        }
        if let Some(top) = self.frames.last_mut() {
            top.has_sibling = true;
        }
        self.write_pending_name()
    }

    fn write_pending_name(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.pending, PendingName::None) {
            PendingName::None => {}
            PendingName::Text => {
                self.reserve(self.pending_text.len() + 3);
                write_quoted(&mut self.buffer, &self.pending_text);
                self.buffer.push(b':');
            }
            PendingName::Position(position) => {
                let key = self
                    .tables
                    .last()
                    .and_then(Option::as_ref)
                    .and_then(|table| table.key(position))
                    .ok_or_else(|| {
                        Error::encode(format!(
                            "no field at position {position} in the active name table"
                        ))
                    })?;
                self.buffer.extend_from_slice(key);
            }
        }
        Ok(())
    }

    fn after_value(&mut self) -> Result<()> {
        if self.sink.is_some() && !self.incomplete && self.buffer.len() >= self.options.buffer_size
        {
            return self.drain_to_sink();
        }
        Ok(())
    }

    fn drain_to_sink(&mut self) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        sink.write_all(&self.buffer)
            .map_err(|err| Error::io(&err, ErrorStage::Encode))?;
        self.flushed += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Grows the buffer by half again (or to fit) when `additional` bytes
    /// would not fit.
    fn reserve(&mut self, additional: usize) {
        let required = self.buffer.len() + additional;
        let capacity = self.buffer.capacity();
        if required <= capacity {
            return;
        }
        let grown = grown_capacity(capacity, required);
        tracing::trace!(from = capacity, to = grown, "growing write buffer");
        self.buffer.reserve_exact(grown - self.buffer.len());
    }

    fn release_sink(&mut self) {
        if self.sink.is_none() || self.closed {
            return;
        }
        if !self.incomplete {
            if let Err(err) = self.flush() {
                tracing::warn!(error = %err, "failed to flush writer on release");
            }
        }
        self.sink = None;
        self.closed = true;
    }
}

impl Drop for Writer<'_> {
    fn drop(&mut self) {
        self.release_sink();
    }
}

impl std::fmt::Debug for Writer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("size", &self.size())
            .field("depth", &self.frames.len())
            .field("pending", &self.pending)
            .field("incomplete", &self.incomplete)
            .finish()
    }
}
