use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;

use crate::decode::{Input, Reader, ReaderParts};
use crate::encode::{Writer, WriterParts};
use crate::pool::{Lease, PoolStrategy, RecyclerPool};
use crate::{DecodeOptions, EncodeOptions};

static SHARED: OnceLock<Recycler> = OnceLock::new();

/// Pools of reader and writer state plus the options new instances start
/// with. `Recycler::shared()` is the process-wide default; build your own to
/// isolate a component or a test.
#[derive(Debug)]
pub struct Recycler {
    writers: PoolStrategy<WriterParts>,
    readers: PoolStrategy<ReaderParts>,
    encode: EncodeOptions,
    decode: DecodeOptions,
}

impl Recycler {
    pub fn new(writers: PoolStrategy<WriterParts>, readers: PoolStrategy<ReaderParts>) -> Self {
        Self {
            writers,
            readers,
            encode: EncodeOptions::default(),
            decode: DecodeOptions::default(),
        }
    }

    pub fn shared() -> &'static Recycler {
        SHARED.get_or_init(Recycler::default)
    }

    pub fn with_encode_options(mut self, options: EncodeOptions) -> Self {
        self.encode = options;
        self
    }

    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode = options;
        self
    }

    pub fn encode_options(&self) -> &EncodeOptions {
        &self.encode
    }

    pub fn decode_options(&self) -> &DecodeOptions {
        &self.decode
    }

    pub fn writer_pool(&self) -> &PoolStrategy<WriterParts> {
        &self.writers
    }

    pub fn reader_pool(&self) -> &PoolStrategy<ReaderParts> {
        &self.readers
    }

    /// A writer collecting output in memory.
    pub fn acquire_writer(&self) -> PooledWriter<'_, 'static> {
        self.acquire_writer_with(None, &self.encode)
    }

    /// A writer streaming output to `sink`.
    pub fn acquire_writer_to<'a, W: Write + 'a>(&self, sink: W) -> PooledWriter<'_, 'a> {
        self.acquire_writer_with(Some(Box::new(sink)), &self.encode)
    }

    pub fn acquire_writer_with<'a>(
        &self,
        sink: Option<Box<dyn Write + 'a>>,
        options: &EncodeOptions,
    ) -> PooledWriter<'_, 'a> {
        let (parts, stripe) = self.writers.acquire().into_parts();
        PooledWriter {
            pool: &self.writers,
            stripe,
            writer: Writer::from_parts(parts, sink, options),
        }
    }

    pub fn acquire_reader<'a>(&self, bytes: &'a [u8]) -> PooledReader<'_, 'a> {
        self.acquire_reader_with(Input::Slice(bytes), &self.decode)
    }

    pub fn acquire_stream_reader<'a, R: Read + 'a>(&self, read: R) -> PooledReader<'_, 'a> {
        self.acquire_reader_with(Input::Stream(Box::new(read)), &self.decode)
    }

    pub fn acquire_reader_with<'a>(
        &self,
        input: Input<'a>,
        options: &DecodeOptions,
    ) -> PooledReader<'_, 'a> {
        let (parts, stripe) = self.readers.acquire().into_parts();
        PooledReader {
            pool: &self.readers,
            stripe,
            reader: Reader::from_parts(parts, input, options),
        }
    }
}

impl Default for Recycler {
    fn default() -> Self {
        Self::new(PoolStrategy::hybrid(), PoolStrategy::hybrid())
    }
}

/// Exclusive use of a pooled `Writer`. Its buffers return to the pool when
/// the guard is dropped, after flushing any sink that was not marked
/// incomplete.
pub struct PooledWriter<'r, 'a> {
    pool: &'r PoolStrategy<WriterParts>,
    stripe: Option<usize>,
    writer: Writer<'a>,
}

impl PooledWriter<'_, '_> {
    /// Returns the writer to its pool now.
    pub fn recycle(self) {
        drop(self);
    }
}

impl<'a> Deref for PooledWriter<'_, 'a> {
    type Target = Writer<'a>;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl DerefMut for PooledWriter<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

impl Drop for PooledWriter<'_, '_> {
    fn drop(&mut self) {
        let parts = self.writer.take_parts();
        self.pool.release(Lease::from_parts(parts, self.stripe));
    }
}

impl std::fmt::Debug for PooledWriter<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledWriter")
            .field("stripe", &self.stripe)
            .field("writer", &self.writer)
            .finish()
    }
}

/// Exclusive use of a pooled `Reader`, returned to the pool on drop.
pub struct PooledReader<'r, 'a> {
    pool: &'r PoolStrategy<ReaderParts>,
    stripe: Option<usize>,
    reader: Reader<'a>,
}

impl PooledReader<'_, '_> {
    pub fn recycle(self) {
        drop(self);
    }
}

impl<'a> Deref for PooledReader<'_, 'a> {
    type Target = Reader<'a>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl DerefMut for PooledReader<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}

impl Drop for PooledReader<'_, '_> {
    fn drop(&mut self) {
        let parts = self.reader.take_parts();
        self.pool.release(Lease::from_parts(parts, self.stripe));
    }
}

impl std::fmt::Debug for PooledReader<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledReader")
            .field("stripe", &self.stripe)
            .field("reader", &self.reader)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Token;

    fn isolated() -> Recycler {
        Recycler::new(PoolStrategy::bounded(2), PoolStrategy::bounded(2))
    }

    #[rstest::rstest]
    fn test_writer_buffers_are_reused() {
        let recycler = isolated();
        {
            let mut writer = recycler.acquire_writer();
            writer.begin_array().unwrap();
            writer.write_str(&"x".repeat(10_000)).unwrap();
            writer.end_array().unwrap();
            writer.finish().unwrap();
        }
        let writer = recycler.acquire_writer();
        assert!(writer.as_bytes().is_empty());
        assert_eq!(writer.size(), 0);
        let counts = recycler.writer_pool().stats().snapshot();
        assert_eq!((counts.created, counts.reused), (1, 1));
    }

    #[rstest::rstest]
    fn test_released_guards_keep_grown_buffers() {
        let recycler = isolated();
        {
            let mut writer = recycler.acquire_writer();
            writer.write_str(&"y".repeat(50_000)).unwrap();
        }
        let lease = recycler.writer_pool().acquire();
        assert!(lease.value().capacity() >= 50_000);
        assert!(lease.value().buffer.is_empty());
        recycler.writer_pool().release(lease);

        let input = format!("[\"{}\"]", "z\\n".repeat(1_000));
        {
            let mut reader = recycler.acquire_reader(input.as_bytes());
            reader.begin_array().unwrap();
            assert_eq!(reader.read_string().unwrap().len(), 2_000);
        }
        let lease = recycler.reader_pool().acquire();
        assert!(lease.value().scratch.capacity() >= 2_000);
        assert!(lease.value().scratch.is_empty());
    }

    #[rstest::rstest]
    fn test_pooled_sink_is_flushed_on_release() {
        let recycler = isolated();
        let mut out = Vec::new();
        let mut writer = recycler.acquire_writer_to(&mut out);
        writer.write_bool(true).unwrap();
        writer.recycle();
        assert_eq!(out, b"true");
    }

    #[rstest::rstest]
    fn test_incomplete_pooled_sink_is_not_flushed() {
        let recycler = isolated();
        let mut out = Vec::new();
        {
            let mut writer = recycler.acquire_writer_to(&mut out);
            writer.begin_array().unwrap();
            writer.mark_incomplete();
        }
        assert!(out.is_empty());
        assert!(!recycler.acquire_writer().is_incomplete());
    }

    #[rstest::rstest]
    fn test_reader_state_resets_between_documents() {
        let recycler = isolated();
        {
            let mut reader = recycler.acquire_reader(br#"{"a":["#);
            reader.begin_object().unwrap();
            assert_eq!(reader.next_field().unwrap(), "a");
            reader.begin_array().unwrap();
        }
        let mut reader = recycler.acquire_reader(b"[true]");
        assert_eq!(reader.depth(), 0);
        assert_eq!(reader.peek_token().unwrap(), Some(Token::BeginArray));
        reader.begin_array().unwrap();
        assert!(reader.read_bool().unwrap());
        reader.end_array().unwrap();
        reader.finish().unwrap();
        assert_eq!(recycler.reader_pool().stats().reused(), 1);
    }

    #[rstest::rstest]
    fn test_stream_reader() {
        let recycler = isolated().with_decode_options(DecodeOptions::default().with_buffer_size(4));
        let mut reader = recycler.acquire_stream_reader(&b"\"streamed text\""[..]);
        assert_eq!(reader.read_string().unwrap(), "streamed text");
    }

    #[rstest::rstest]
    fn test_shared_is_single_instance() {
        assert!(std::ptr::eq(Recycler::shared(), Recycler::shared()));
    }
}
