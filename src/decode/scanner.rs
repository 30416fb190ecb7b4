use std::io::{ErrorKind as IoErrorKind, Read};
use std::ops::Range;

use memchr::memchr2;

use crate::constants::{
    grown_capacity, is_ascii_whitespace, is_number_byte, unicode_whitespace_len,
    ERROR_CONTEXT_BYTES,
};
use crate::error::ErrorStage;
use crate::text::RawNameHasher;
use crate::{DecodeOptions, Error, Result};

/// Source of reader bytes.
pub enum Input<'a> {
    /// Whole document in memory; the window is the slice itself.
    Slice(&'a [u8]),
    /// Chunked source, read into a refillable window.
    Stream(Box<dyn Read + 'a>),
}

impl std::fmt::Debug for Input<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice(bytes) => f.debug_tuple("Slice").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Raw string content located in the window: `window[start..end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StringSpan {
    pub start: usize,
    pub end: usize,
    /// At least one backslash escape occurs inside.
    pub escaped: bool,
}

/// Byte window over the input with `(pos, limit)` cursors.
///
/// Bytes before `pos` are consumed. A refill discards them unless a mark is
/// set, in which case everything from the mark on is kept (and the window
/// grows when the kept region fills it).
pub(crate) struct Scanner<'a> {
    input: Input<'a>,
    buf: Vec<u8>,
    /// Raw-capture bytes that were shifted out of the window by a refill.
    raw_side: Vec<u8>,
    pos: usize,
    limit: usize,
    /// Bytes discarded from the front of the window so far.
    consumed: u64,
    eof: bool,
    mark: Option<usize>,
    capture: Option<usize>,
    max_buffer_size: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(
        input: Input<'a>,
        mut buf: Vec<u8>,
        mut raw_side: Vec<u8>,
        options: &DecodeOptions,
    ) -> Self {
        raw_side.clear();
        let limit = match &input {
            Input::Slice(bytes) => bytes.len(),
            Input::Stream(_) => {
                let size = buf.capacity().max(options.buffer_size).max(1);
                buf.clear();
                buf.resize(size, 0);
                0
            }
        };
        Self {
            input,
            buf,
            raw_side,
            pos: 0,
            limit,
            consumed: 0,
            eof: false,
            mark: None,
            capture: None,
            max_buffer_size: options.max_buffer_size.max(1),
        }
    }

    /// Detaches the input and hands back the window and raw-capture buffers.
    pub(crate) fn take_buffers(&mut self) -> (Vec<u8>, Vec<u8>) {
        self.release_input();
        (
            std::mem::take(&mut self.buf),
            std::mem::take(&mut self.raw_side),
        )
    }

    /// Drops the input source. Later reads see end of input.
    pub(crate) fn release_input(&mut self) {
        self.input = Input::Slice(&[]);
        self.pos = 0;
        self.limit = 0;
        self.mark = None;
        self.capture = None;
        self.eof = true;
    }

    #[inline]
    pub(crate) fn window(&self) -> &[u8] {
        match &self.input {
            Input::Slice(bytes) => bytes,
            Input::Stream(_) => &self.buf[..self.limit],
        }
    }

    #[inline]
    pub(crate) fn advance(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.limit);
    }

    /// Absolute offset of `pos` from the start of the input.
    pub(crate) fn offset(&self) -> u64 {
        self.consumed + self.pos as u64
    }

    pub(crate) fn set_mark(&mut self, at: usize) {
        self.mark = Some(at);
    }

    pub(crate) fn take_mark(&mut self) -> Option<usize> {
        self.mark.take()
    }

    /// Reads more input into the window. Returns false at end of input.
    pub(crate) fn fill(&mut self) -> Result<bool> {
        let Input::Stream(reader) = &mut self.input else {
            return Ok(false);
        };
        if self.eof {
            return Ok(false);
        }

        let keep_from = self.mark.unwrap_or(self.pos).min(self.pos);
        if let Some(start) = self.capture {
            if start < keep_from {
                self.raw_side.extend_from_slice(&self.buf[start..keep_from]);
                if self.raw_side.len() > self.max_buffer_size {
                    return Err(Error::buffer_limit(format!(
                        "raw value exceeds the limit of {} bytes",
                        self.max_buffer_size
                    )));
                }
                self.capture = Some(keep_from);
            }
        }
        if keep_from > 0 {
            self.buf.copy_within(keep_from..self.limit, 0);
            self.limit -= keep_from;
            self.pos -= keep_from;
            self.consumed += keep_from as u64;
            if let Some(mark) = self.mark.as_mut() {
                *mark -= keep_from;
            }
            if let Some(start) = self.capture.as_mut() {
                *start -= keep_from;
            }
        }

        if self.limit == self.buf.len() {
            if self.buf.len() >= self.max_buffer_size {
                return Err(Error::buffer_limit(format!(
                    "value does not fit in the {} byte read buffer",
                    self.max_buffer_size
                )));
            }
            let grown = grown_capacity(self.buf.len(), self.limit + 1).min(self.max_buffer_size);
            tracing::trace!(from = self.buf.len(), to = grown, "growing read window");
            self.buf.resize(grown, 0);
        }

        loop {
            match reader.read(&mut self.buf[self.limit..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(false);
                }
                Ok(read) => {
                    self.limit += read;
                    return Ok(true);
                }
                Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::io(&err, ErrorStage::Decode)),
            }
        }
    }

    /// Makes at least `count` bytes available past `pos` if the input has them.
    pub(crate) fn ensure(&mut self, count: usize) -> Result<bool> {
        while self.limit - self.pos < count {
            if !self.fill()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    #[inline]
    pub(crate) fn peek(&mut self) -> Result<Option<u8>> {
        if self.pos == self.limit && !self.fill()? {
            return Ok(None);
        }
        Ok(Some(self.window()[self.pos]))
    }

    /// Skips JSON and Unicode whitespace, returning the next byte unconsumed.
    pub(crate) fn skip_whitespace(&mut self) -> Result<Option<u8>> {
        loop {
            let Some(byte) = self.peek()? else {
                return Ok(None);
            };
            if is_ascii_whitespace(byte) {
                self.pos += 1;
                continue;
            }
            if matches!(byte, 0xC2 | 0xE1 | 0xE2 | 0xE3) {
                self.ensure(3)?;
                if let Some(len) = unicode_whitespace_len(&self.window()[self.pos..]) {
                    self.pos += len;
                    continue;
                }
            }
            return Ok(Some(byte));
        }
    }

    /// Consumes `literal` (`true`, `false` or `null`).
    pub(crate) fn expect_literal(&mut self, literal: &[u8]) -> Result<()> {
        let complete = self.ensure(literal.len())?;
        let available = &self.window()[self.pos..];
        let compared = available.len().min(literal.len());
        if available[..compared] != literal[..compared] {
            return Err(Error::malformed(format!(
                "invalid literal, expected '{}'",
                literal.escape_ascii()
            )));
        }
        if !complete {
            return Err(Error::premature_end(format!(
                "unexpected end of input in '{}'",
                literal.escape_ascii()
            )));
        }
        self.pos += literal.len();
        Ok(())
    }

    /// Scans string content up to and including the closing quote; `pos` must
    /// sit just past the opening quote. The span is valid until the next
    /// refill, so callers that keep it must set a mark at `span.start`.
    pub(crate) fn scan_string(
        &mut self,
        mut hasher: Option<&mut RawNameHasher>,
    ) -> Result<StringSpan> {
        self.mark = Some(self.pos);
        let mut escaped = false;
        loop {
            if self.pos == self.limit && !self.fill()? {
                self.mark = None;
                return Err(Error::premature_end("unterminated string"));
            }
            let rest = &self.window()[self.pos..];
            match memchr2(b'"', b'\\', rest) {
                None => {
                    if let Some(hasher) = hasher.as_mut() {
                        hasher.update(rest);
                    }
                    self.pos = self.limit;
                }
                Some(found) if rest[found] == b'"' => {
                    if let Some(hasher) = hasher.as_mut() {
                        hasher.update(&rest[..found]);
                    }
                    let end = self.pos + found;
                    self.pos = end + 1;
                    let start = self.mark.take().unwrap_or(end);
                    return Ok(StringSpan {
                        start,
                        end,
                        escaped,
                    });
                }
                Some(found) => {
                    escaped = true;
                    if let Some(hasher) = hasher.as_mut() {
                        hasher.update(&rest[..=found]);
                    }
                    self.pos += found + 1;
                    // The escaped byte itself can never end the string.
                    if self.pos == self.limit && !self.fill()? {
                        self.mark = None;
                        return Err(Error::premature_end("unterminated escape sequence"));
                    }
                    if let Some(hasher) = hasher.as_mut() {
                        hasher.write_byte(self.window()[self.pos]);
                    }
                    self.pos += 1;
                }
            }
        }
    }

    /// Consumes a run of number bytes and returns its range in the window.
    pub(crate) fn scan_number(&mut self) -> Result<Range<usize>> {
        self.mark = Some(self.pos);
        loop {
            let window = self.window();
            let run = window[self.pos..]
                .iter()
                .take_while(|&&byte| is_number_byte(byte))
                .count();
            self.pos += run;
            if self.pos < self.limit || !self.fill()? {
                break;
            }
        }
        let start = self.mark.take().unwrap_or(self.pos);
        Ok(start..self.pos)
    }

    /// Starts recording the raw bytes consumed from `pos` on.
    pub(crate) fn begin_capture(&mut self) {
        self.raw_side.clear();
        self.capture = Some(self.pos);
    }

    /// Bytes consumed since `begin_capture`.
    pub(crate) fn end_capture(&mut self) -> &[u8] {
        let start = self.capture.take().unwrap_or(self.pos);
        if self.raw_side.is_empty() {
            return match &self.input {
                Input::Slice(bytes) => &bytes[start..self.pos],
                Input::Stream(_) => &self.buf[start..self.pos],
            };
        }
        self.raw_side.extend_from_slice(&self.buf[start..self.pos]);
        &self.raw_side
    }

    /// Input surrounding `pos`, for error messages.
    pub(crate) fn snippet(&self) -> String {
        let window = self.window();
        let pos = self.pos.min(window.len());
        let start = pos.saturating_sub(ERROR_CONTEXT_BYTES);
        let end = (pos + ERROR_CONTEXT_BYTES).min(window.len());
        String::from_utf8_lossy(&window[start..end]).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    /// Hands out at most `chunk` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let count = self.chunk.min(buf.len()).min(self.data.len());
            buf[..count].copy_from_slice(&self.data[..count]);
            self.data = &self.data[count..];
            Ok(count)
        }
    }

    fn stream(data: &[u8], chunk: usize, buffer_size: usize) -> Scanner<'_> {
        let options = DecodeOptions::default().with_buffer_size(buffer_size);
        Scanner::new(
            Input::Stream(Box::new(Trickle { data, chunk })),
            Vec::new(),
            Vec::new(),
            &options,
        )
    }

    #[rstest::rstest]
    fn test_skip_unicode_whitespace_split_across_reads() {
        let text = "\u{3000}\u{00A0} \u{2028}x";
        let mut scanner = stream(text.as_bytes(), 1, 2);
        assert_eq!(scanner.skip_whitespace().unwrap(), Some(b'x'));
        assert_eq!(scanner.offset(), (text.len() - 1) as u64);
    }

    #[rstest::rstest]
    fn test_non_whitespace_multibyte_is_returned() {
        let options = DecodeOptions::default();
        let mut scanner = Scanner::new(
            Input::Slice("\u{200B}".as_bytes()),
            Vec::new(),
            Vec::new(),
            &options,
        );
        assert_eq!(scanner.skip_whitespace().unwrap(), Some(0xE2));
    }

    #[rstest::rstest]
    fn test_string_spanning_refills_grows_window() {
        let data = br#"abcdefghij\"klmnop" tail"#;
        let mut scanner = stream(data, 3, 4);
        let mut hasher = RawNameHasher::new();
        let span = scanner.scan_string(Some(&mut hasher)).unwrap();
        assert!(span.escaped);
        assert_eq!(
            &scanner.window()[span.start..span.end],
            br#"abcdefghij\"klmnop"#
        );
        assert_eq!(
            hasher.finish(),
            crate::text::raw_name_hash(br#"abcdefghij\"klmnop"#)
        );
    }

    #[rstest::rstest]
    fn test_unterminated_string_is_premature_end() {
        let mut scanner = stream(b"abc", 1, 4);
        let err = scanner.scan_string(None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PrematureEnd);
    }

    #[rstest::rstest]
    fn test_window_limit() {
        let data = [b'7'; 64];
        let options = DecodeOptions::default()
            .with_buffer_size(4)
            .with_max_buffer_size(16);
        let mut scanner = Scanner::new(
            Input::Stream(Box::new(Trickle {
                data: &data,
                chunk: 8,
            })),
            Vec::new(),
            Vec::new(),
            &options,
        );
        let err = scanner.scan_number().unwrap_err();
        assert_eq!(err.kind, ErrorKind::BufferLimitExceeded);
    }

    #[rstest::rstest]
    fn test_capture_spanning_refills() {
        let data = br#"[1, "two", 3] rest"#;
        let mut scanner = stream(data, 2, 4);
        scanner.begin_capture();
        for _ in 0..13 {
            assert!(scanner.peek().unwrap().is_some());
            scanner.advance(1);
        }
        assert_eq!(scanner.end_capture(), br#"[1, "two", 3]"#);
    }

    #[rstest::rstest]
    fn test_literals() {
        let options = DecodeOptions::default();
        let mut scanner = Scanner::new(Input::Slice(b"nul"), Vec::new(), Vec::new(), &options);
        assert_eq!(
            scanner.expect_literal(b"null").unwrap_err().kind,
            ErrorKind::PrematureEnd
        );
        let mut scanner = Scanner::new(Input::Slice(b"nope"), Vec::new(), Vec::new(), &options);
        assert_eq!(
            scanner.expect_literal(b"null").unwrap_err().kind,
            ErrorKind::MalformedToken
        );
    }
}
