use std::io::Read;
use std::ops::Range;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_bigint::BigInt;
use smallvec::SmallVec;

use crate::constants::{FALSE, NULL, TRUE};
use crate::decode::scanner::{Input, Scanner, StringSpan};
use crate::decode::{ReaderParts, Token};
use crate::error::Location;
use crate::names::NameTable;
use crate::num::{self, Decimal};
use crate::options::ErrorDetail;
use crate::text::{unescape_bounded_into, RawNameHasher};
use crate::{DecodeOptions, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Array,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Start,
    AfterValue,
    AfterComma,
    AfterName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    scope: Scope,
    state: State,
}

pub(crate) type Frames = SmallVec<[Frame; 16]>;

/// Where decoded text lives after a string or field name was scanned.
#[derive(Debug, Clone, Copy)]
enum TextAt {
    Window(usize, usize),
    Scratch,
    Table(usize),
}

/// Pull tokenizer over a byte slice or a chunked stream.
///
/// Every read positions on the next value itself: callers drive arrays with
/// `has_next_element` and objects with `has_next_field` + `next_field`, and
/// separators are validated along the way. Errors are final; a reader that
/// returned one should be dropped or recycled.
pub struct Reader<'a> {
    scanner: Scanner<'a>,
    frames: Frames,
    /// Active name table per open object.
    tables: Vec<Option<Arc<NameTable>>>,
    scratch: Vec<u8>,
    options: DecodeOptions,
    current: Option<Token>,
    top_done: bool,
}

impl<'a> Reader<'a> {
    pub fn from_slice(bytes: &'a [u8], options: &DecodeOptions) -> Self {
        Self::from_parts(ReaderParts::new(), Input::Slice(bytes), options)
    }

    pub fn from_reader<R: Read + 'a>(read: R, options: &DecodeOptions) -> Self {
        Self::from_parts(ReaderParts::new(), Input::Stream(Box::new(read)), options)
    }

    pub fn from_parts(parts: ReaderParts, input: Input<'a>, options: &DecodeOptions) -> Self {
        let ReaderParts {
            buffer,
            mut scratch,
            raw,
            mut frames,
            mut tables,
        } = parts;
        scratch.clear();
        frames.clear();
        tables.clear();
        Self {
            scanner: Scanner::new(input, buffer, raw, options),
            frames,
            tables,
            scratch,
            options: options.clone(),
            current: None,
            top_done: false,
        }
    }

    /// Releases the buffers for reuse by another reader.
    pub fn into_parts(mut self) -> ReaderParts {
        self.take_parts()
    }

    /// Moves the reusable buffers out, leaving this reader at end of input.
    pub(crate) fn take_parts(&mut self) -> ReaderParts {
        let (buffer, raw) = self.scanner.take_buffers();
        let mut parts = ReaderParts {
            buffer,
            scratch: std::mem::take(&mut self.scratch),
            raw,
            frames: std::mem::take(&mut self.frames),
            tables: std::mem::take(&mut self.tables),
        };
        parts.clear();
        parts
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// The last token consumed.
    pub fn current_token(&self) -> Option<Token> {
        self.current
    }

    pub fn location(&self) -> Location {
        Location {
            offset: self.scanner.offset(),
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Classifies the next token without consuming it. Returns `None` once the
    /// top-level value is complete.
    pub fn peek_token(&mut self) -> Result<Option<Token>> {
        let result = self.peek_inner();
        self.located(result)
    }

    pub fn begin_array(&mut self) -> Result<()> {
        let result = self.begin(Scope::Array, None);
        self.located(result)
    }

    pub fn end_array(&mut self) -> Result<()> {
        let result = self.end(Scope::Array);
        self.located(result)
    }

    /// True when another element follows; consumes the separating comma.
    pub fn has_next_element(&mut self) -> Result<bool> {
        let result = self.next_element();
        self.located(result)
    }

    pub fn begin_object(&mut self) -> Result<()> {
        let result = self.begin(Scope::Object, None);
        self.located(result)
    }

    /// Opens an object whose field names are resolved against `table`.
    pub fn begin_object_with(&mut self, table: &Arc<NameTable>) -> Result<()> {
        let result = self.begin(Scope::Object, Some(Arc::clone(table)));
        self.located(result)
    }

    pub fn end_object(&mut self) -> Result<()> {
        let result = self.end(Scope::Object);
        self.located(result)
    }

    /// True when another field follows; consumes the separating comma.
    pub fn has_next_field(&mut self) -> Result<bool> {
        let result = self.next_field_follows();
        self.located(result)
    }

    /// Reads a field name and its colon. Names found in the active table are
    /// returned as the table's canonical instance.
    pub fn next_field(&mut self) -> Result<&str> {
        let at = match self.field_name() {
            Ok(at) => at,
            Err(err) => return Err(self.fail(err)),
        };
        self.text(at).map_err(|err| self.fail(err))
    }

    /// Position of the field just read in the active name table, if it was
    /// resolved through the table.
    pub fn next_field_position(&mut self) -> Result<Option<usize>> {
        match self.field_name() {
            Ok(TextAt::Table(position)) => Ok(Some(position)),
            Ok(_) => Ok(None),
            Err(err) => Err(self.fail(err)),
        }
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let result = self.bool_value();
        self.located(result)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_integer("an integer", num::parse_i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_integer("an integer", num::parse_i32)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_integer("an integer", num::parse_i64)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_integer("an unsigned integer", num::parse_u64)
    }

    /// Also accepts the quoted `"NaN"`, `"Infinity"` and `"-Infinity"` forms
    /// the writer emits for non-finite values.
    pub fn read_f64(&mut self) -> Result<f64> {
        let result = self.float_value();
        self.located(result)
    }

    pub fn read_decimal(&mut self) -> Result<Decimal> {
        let result = self.big_number(num::parse_decimal);
        self.located(result)
    }

    pub fn read_big_integer(&mut self) -> Result<BigInt> {
        let result = self.big_number(num::parse_big_integer);
        self.located(result)
    }

    /// Validated text of the next number, for callers choosing their own
    /// representation.
    pub fn read_number_text(&mut self) -> Result<&str> {
        let range = match self.number_literal() {
            Ok(range) => range,
            Err(err) => return Err(self.fail(err)),
        };
        std::str::from_utf8(&self.scanner.window()[range])
            .map_err(|_| self.fail(Error::malformed("number is not ascii")))
    }

    /// Borrowed from the input when the string has no escapes, otherwise
    /// from an internal scratch buffer.
    pub fn read_string(&mut self) -> Result<&str> {
        let at = match self.string_value() {
            Ok(at) => at,
            Err(err) => return Err(self.fail(err)),
        };
        self.text(at).map_err(|err| self.fail(err))
    }

    /// Base64 (standard alphabet, padded) string decoded to bytes.
    pub fn read_binary(&mut self) -> Result<Vec<u8>> {
        let result = self.string_value().and_then(|at| {
            let text = self.text(at)?;
            STANDARD
                .decode(text)
                .map_err(|err| Error::malformed(format!("invalid base64: {err}")))
        });
        self.located(result)
    }

    /// Exact bytes of the next value, whitespace inside it included.
    pub fn read_raw(&mut self) -> Result<&[u8]> {
        let result = self.raw_value();
        if let Err(err) = result {
            let _ = self.scanner.end_capture();
            return Err(self.fail(err));
        }
        Ok(self.scanner.end_capture())
    }

    /// Consumes the next value if it is `null`.
    pub fn is_null(&mut self) -> Result<bool> {
        let result = self.null_value();
        self.located(result)
    }

    pub fn read_null(&mut self) -> Result<()> {
        let result = match self.null_value() {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::malformed("expected null")),
            Err(err) => Err(err),
        };
        self.located(result)
    }

    pub fn skip_value(&mut self) -> Result<()> {
        let result = self.skip();
        self.located(result)
    }

    /// Skips the value of an unrecognized field, or fails with `UnknownField`
    /// when `fail_on_unknown_field` is set.
    pub fn skip_field(&mut self, name: &str) -> Result<()> {
        if self.options.fail_on_unknown_field {
            return Err(self.fail(Error::unknown_field(name)));
        }
        self.skip_value()
    }

    /// True when another top-level value follows (JSON streams).
    pub fn has_next_value(&mut self) -> Result<bool> {
        let result = self.next_value();
        self.located(result)
    }

    /// Requires that only whitespace remains.
    pub fn finish(&mut self) -> Result<()> {
        let result = self.finish_inner();
        self.located(result)
    }

    /// Drops the input source. Further reads see end of input.
    pub fn close(&mut self) {
        self.scanner.release_input();
        self.frames.clear();
        self.tables.clear();
        self.current = None;
        self.top_done = true;
    }

    fn located<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|err| self.fail(err))
    }

    fn fail(&self, err: Error) -> Error {
        if err.location.is_some() {
            return err;
        }
        let location = self.location();
        let message = match self.options.error_detail {
            ErrorDetail::Minimal => return err,
            ErrorDetail::Position => format!("{} at offset {}", err.message, location.offset),
            ErrorDetail::Context => format!(
                "{} at offset {}, near '{}'",
                err.message,
                location.offset,
                self.scanner.snippet()
            ),
        };
        Error { message, ..err }.with_location(location)
    }

    fn set_state(&mut self, state: State) {
        if let Some(frame) = self.frames.last_mut() {
            frame.state = state;
        }
    }

    fn value_done(&mut self) {
        match self.frames.last_mut() {
            Some(frame) => frame.state = State::AfterValue,
            None => self.top_done = true,
        }
    }

    fn next_byte(&mut self, expected: &str) -> Result<u8> {
        self.scanner
            .skip_whitespace()?
            .ok_or_else(|| Error::premature_end(format!("unexpected end of input, expected {expected}")))
    }

    fn expect_frame(&self, scope: Scope) -> Result<Frame> {
        match self.frames.last() {
            Some(frame) if frame.scope == scope => Ok(*frame),
            _ => Err(Error::malformed(match scope {
                Scope::Array => "not inside an array",
                Scope::Object => "not inside an object",
            })),
        }
    }

    /// Positions on the first byte of the next value, consuming a pending
    /// comma. Idempotent until the value itself is consumed.
    fn value_start(&mut self) -> Result<u8> {
        let Some(frame) = self.frames.last().copied() else {
            if self.top_done {
                return Err(Error::malformed(
                    "unexpected content after the top-level value",
                ));
            }
            return self.next_byte("a value");
        };
        match (frame.scope, frame.state) {
            (Scope::Array, State::Start) => match self.next_byte("a value")? {
                b']' => Err(Error::malformed("expected a value, found ']'")),
                byte => Ok(byte),
            },
            (Scope::Array, State::AfterComma) => match self.next_byte("a value")? {
                b']' => Err(trailing_comma()),
                byte => Ok(byte),
            },
            (Scope::Array, _) => match self.next_byte("',' or ']'")? {
                b',' => {
                    self.scanner.advance(1);
                    self.set_state(State::AfterComma);
                    self.value_start()
                }
                b']' => Err(Error::malformed("no more elements in array")),
                other => Err(unexpected(other, "',' or ']'")),
            },
            (Scope::Object, State::AfterName) => self.next_byte("a value"),
            (Scope::Object, _) => Err(Error::malformed("expected a field name before the value")),
        }
    }

    fn begin(&mut self, scope: Scope, table: Option<Arc<NameTable>>) -> Result<()> {
        let (open, token) = match scope {
            Scope::Array => (b'[', Token::BeginArray),
            Scope::Object => (b'{', Token::BeginObject),
        };
        let byte = self.value_start()?;
        if byte != open {
            return Err(unexpected(byte, if open == b'[' { "'['" } else { "'{'" }));
        }
        if self.frames.len() >= self.options.max_depth {
            return Err(Error::depth_limit(self.options.max_depth));
        }
        self.scanner.advance(1);
        self.frames.push(Frame {
            scope,
            state: State::Start,
        });
        if scope == Scope::Object {
            self.tables.push(table);
        }
        self.current = Some(token);
        Ok(())
    }

    fn end(&mut self, scope: Scope) -> Result<()> {
        let (close, expected, token) = match scope {
            Scope::Array => (b']', "']'", Token::EndArray),
            Scope::Object => (b'}', "'}'", Token::EndObject),
        };
        let frame = self.expect_frame(scope)?;
        if frame.state == State::AfterName {
            return Err(Error::malformed("expected a value after the field name"));
        }
        let byte = self.next_byte(expected)?;
        if byte != close {
            return Err(unexpected(byte, expected));
        }
        if frame.state == State::AfterComma {
            return Err(trailing_comma());
        }
        self.scanner.advance(1);
        self.frames.pop();
        if scope == Scope::Object {
            self.tables.pop();
        }
        self.current = Some(token);
        self.value_done();
        Ok(())
    }

    fn next_element(&mut self) -> Result<bool> {
        let frame = self.expect_frame(Scope::Array)?;
        match frame.state {
            State::Start => Ok(self.next_byte("a value or ']'")? != b']'),
            State::AfterComma => self.element_after_comma(),
            State::AfterValue | State::AfterName => match self.next_byte("',' or ']'")? {
                b',' => {
                    self.scanner.advance(1);
                    self.set_state(State::AfterComma);
                    self.element_after_comma()
                }
                b']' => Ok(false),
                other => Err(unexpected(other, "',' or ']'")),
            },
        }
    }

    fn element_after_comma(&mut self) -> Result<bool> {
        match self.next_byte("a value")? {
            b']' => Err(trailing_comma()),
            _ => Ok(true),
        }
    }

    fn next_field_follows(&mut self) -> Result<bool> {
        let frame = self.expect_frame(Scope::Object)?;
        match frame.state {
            State::Start => match self.next_byte("a field name or '}'")? {
                b'}' => Ok(false),
                b'"' => Ok(true),
                other => Err(unexpected(other, "a field name or '}'")),
            },
            State::AfterComma => self.field_after_comma(),
            State::AfterValue => match self.next_byte("',' or '}'")? {
                b',' => {
                    self.scanner.advance(1);
                    self.set_state(State::AfterComma);
                    self.field_after_comma()
                }
                b'}' => Ok(false),
                other => Err(unexpected(other, "',' or '}'")),
            },
            State::AfterName => Err(Error::malformed("expected a value after the field name")),
        }
    }

    fn field_after_comma(&mut self) -> Result<bool> {
        match self.next_byte("a field name")? {
            b'"' => Ok(true),
            b'}' => Err(trailing_comma()),
            other => Err(unexpected(other, "a field name")),
        }
    }

    fn field_name(&mut self) -> Result<TextAt> {
        if !self.next_field_follows()? {
            return Err(Error::malformed("expected a field name, found '}'"));
        }
        self.scanner.advance(1);

        let hashing = matches!(self.tables.last(), Some(Some(table)) if !table.is_degraded());
        let mut hasher = RawNameHasher::new();
        let span = self
            .scanner
            .scan_string(hashing.then_some(&mut hasher))?;

        let resolved = match self.tables.last() {
            Some(Some(table)) if hashing => {
                table.resolve(hasher.finish(), &self.scanner.window()[span.start..span.end])
            }
            _ => None,
        };
        let at = match resolved {
            Some(position) => TextAt::Table(position),
            None if span.escaped => {
                self.decode_escaped(span)?;
                TextAt::Scratch
            }
            None => {
                self.scanner.set_mark(span.start);
                TextAt::Window(0, span.end - span.start)
            }
        };

        if let Err(err) = self.expect_colon() {
            self.scanner.take_mark();
            return Err(err);
        }
        let at = match at {
            TextAt::Window(_, len) => {
                let start = self.scanner.take_mark().unwrap_or(0);
                TextAt::Window(start, start + len)
            }
            other => other,
        };
        self.set_state(State::AfterName);
        self.current = Some(Token::FieldName);
        Ok(at)
    }

    fn expect_colon(&mut self) -> Result<()> {
        match self.next_byte("':'")? {
            b':' => {
                self.scanner.advance(1);
                Ok(())
            }
            other => Err(unexpected(other, "':'")),
        }
    }

    fn decode_escaped(&mut self, span: StringSpan) -> Result<()> {
        self.scratch.clear();
        unescape_bounded_into(
            &self.scanner.window()[span.start..span.end],
            &mut self.scratch,
            self.options.max_string_buffer,
        )
    }

    fn text(&self, at: TextAt) -> Result<&str> {
        let bytes = match at {
            TextAt::Table(position) => {
                return self
                    .tables
                    .last()
                    .and_then(Option::as_ref)
                    .and_then(|table| table.name(position))
                    .ok_or_else(|| Error::malformed("field name is not in the active table"));
            }
            TextAt::Scratch => &self.scratch[..],
            TextAt::Window(start, end) => {
                let raw = &self.scanner.window()[start..end];
                if let Some(&control) = raw.iter().find(|&&byte| byte < 0x20) {
                    return Err(Error::malformed(format!(
                        "unescaped control character 0x{control:02x} in string"
                    )));
                }
                raw
            }
        };
        std::str::from_utf8(bytes)
            .map_err(|err| Error::malformed(format!("invalid utf-8 in string: {err}")))
    }

    fn string_value(&mut self) -> Result<TextAt> {
        match self.value_start()? {
            b'"' => {}
            b'n' => return Err(Error::unexpected_null("a string")),
            other => return Err(unexpected(other, "a string")),
        }
        self.scanner.advance(1);
        let span = self.scanner.scan_string(None)?;
        let at = if span.escaped {
            self.decode_escaped(span)?;
            TextAt::Scratch
        } else {
            TextAt::Window(span.start, span.end)
        };
        self.value_done();
        self.current = Some(Token::String);
        Ok(at)
    }

    /// `None` when the value was `null`.
    fn number_range(&mut self, expected: &str) -> Result<Option<Range<usize>>> {
        match self.value_start()? {
            b'n' => {
                self.scanner.expect_literal(NULL)?;
                self.value_done();
                self.current = Some(Token::Null);
                Ok(None)
            }
            b'-' | b'0'..=b'9' => {
                let range = self.scanner.scan_number()?;
                self.value_done();
                self.current = Some(Token::Number);
                Ok(Some(range))
            }
            other => Err(unexpected(other, expected)),
        }
    }

    fn null_primitive<T: Default>(&self, expected: &str) -> Result<T> {
        if self.options.strict_numbers {
            Err(Error::unexpected_null(expected))
        } else {
            Ok(T::default())
        }
    }

    fn read_integer<T: Default>(
        &mut self,
        expected: &str,
        parse: fn(&[u8]) -> Result<T>,
    ) -> Result<T> {
        let result = match self.number_range(expected) {
            Ok(Some(range)) => parse(&self.scanner.window()[range]),
            Ok(None) => self.null_primitive(expected),
            Err(err) => Err(err),
        };
        self.located(result)
    }

    fn float_value(&mut self) -> Result<f64> {
        if self.value_start()? == b'"' {
            let at = self.string_value()?;
            return match self.text(at)? {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(Error::malformed(format!(
                    "expected a number, found \"{other}\""
                ))),
            };
        }
        match self.number_range("a number")? {
            Some(range) => num::parse_f64(&self.scanner.window()[range]),
            None => self.null_primitive("a number"),
        }
    }

    fn big_number<T>(&mut self, parse: fn(&[u8], usize) -> Result<T>) -> Result<T> {
        match self.number_range("a number")? {
            Some(range) => parse(
                &self.scanner.window()[range],
                self.options.max_number_digits,
            ),
            None => Err(Error::unexpected_null("a number")),
        }
    }

    fn number_literal(&mut self) -> Result<Range<usize>> {
        let range = self
            .number_range("a number")?
            .ok_or_else(|| Error::unexpected_null("a number"))?;
        let shape = num::validate(&self.scanner.window()[range.clone()])?;
        if shape.digit_count() > self.options.max_number_digits {
            return Err(Error::number_too_long(self.options.max_number_digits));
        }
        Ok(range)
    }

    fn bool_value(&mut self) -> Result<bool> {
        let value = match self.value_start()? {
            b't' => {
                self.scanner.expect_literal(TRUE)?;
                true
            }
            b'f' => {
                self.scanner.expect_literal(FALSE)?;
                false
            }
            b'n' => {
                self.scanner.expect_literal(NULL)?;
                self.value_done();
                self.current = Some(Token::Null);
                return self.null_primitive("a boolean");
            }
            other => return Err(unexpected(other, "a boolean")),
        };
        self.value_done();
        self.current = Some(Token::Boolean);
        Ok(value)
    }

    fn null_value(&mut self) -> Result<bool> {
        if self.value_start()? != b'n' {
            return Ok(false);
        }
        self.scanner.expect_literal(NULL)?;
        self.value_done();
        self.current = Some(Token::Null);
        Ok(true)
    }

    fn skip(&mut self) -> Result<()> {
        match self.value_start()? {
            b'{' => {
                self.begin(Scope::Object, None)?;
                while self.next_field_follows()? {
                    self.field_name()?;
                    self.skip()?;
                }
                self.end(Scope::Object)
            }
            b'[' => {
                self.begin(Scope::Array, None)?;
                while self.next_element()? {
                    self.skip()?;
                }
                self.end(Scope::Array)
            }
            b'"' => {
                self.scanner.advance(1);
                self.scanner.scan_string(None)?;
                self.value_done();
                self.current = Some(Token::String);
                Ok(())
            }
            b't' | b'f' => self.bool_value().map(drop),
            b'n' => self.null_value().map(drop),
            b'-' | b'0'..=b'9' => {
                let range = self.scanner.scan_number()?;
                num::validate(&self.scanner.window()[range])?;
                self.value_done();
                self.current = Some(Token::Number);
                Ok(())
            }
            other => Err(unexpected(other, "a value")),
        }
    }

    fn raw_value(&mut self) -> Result<()> {
        self.value_start()?;
        self.scanner.begin_capture();
        self.skip()
    }

    fn peek_inner(&mut self) -> Result<Option<Token>> {
        let Some(frame) = self.frames.last().copied() else {
            if self.top_done {
                return Ok(None);
            }
            return match self.scanner.skip_whitespace()? {
                Some(byte) => classify(byte).map(Some),
                None => Ok(None),
            };
        };
        match (frame.scope, frame.state) {
            (Scope::Array, _) => {
                if self.next_element()? {
                    classify(self.value_start()?).map(Some)
                } else {
                    Ok(Some(Token::EndArray))
                }
            }
            (Scope::Object, State::AfterName) => classify(self.value_start()?).map(Some),
            (Scope::Object, _) => Ok(Some(if self.next_field_follows()? {
                Token::FieldName
            } else {
                Token::EndObject
            })),
        }
    }

    fn next_value(&mut self) -> Result<bool> {
        if !self.frames.is_empty() {
            return Err(Error::malformed(
                "has_next_value is only valid between top-level values",
            ));
        }
        let Some(byte) = self.scanner.skip_whitespace()? else {
            return Ok(false);
        };
        if self.top_done && !self.options.json_stream {
            return Err(unexpected(byte, "end of input"));
        }
        self.top_done = false;
        Ok(true)
    }

    fn finish_inner(&mut self) -> Result<()> {
        if let Some(frame) = self.frames.last() {
            return Err(Error::premature_end(match frame.scope {
                Scope::Array => "unclosed array",
                Scope::Object => "unclosed object",
            }));
        }
        match self.scanner.skip_whitespace()? {
            None => Ok(()),
            Some(byte) => Err(unexpected(byte, "end of input")),
        }
    }
}

impl std::fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("offset", &self.scanner.offset())
            .field("depth", &self.frames.len())
            .field("current", &self.current)
            .finish()
    }
}

fn classify(byte: u8) -> Result<Token> {
    Ok(match byte {
        b'{' => Token::BeginObject,
        b'[' => Token::BeginArray,
        b'"' => Token::String,
        b't' | b'f' => Token::Boolean,
        b'n' => Token::Null,
        b'-' | b'0'..=b'9' => Token::Number,
        other => return Err(unexpected(other, "a value")),
    })
}

fn unexpected(byte: u8, expected: &str) -> Error {
    Error::malformed(format!("expected {expected}, found '{}'", byte.escape_ascii()))
}

fn trailing_comma() -> Error {
    Error::malformed("trailing comma before closing bracket")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn reader(input: &str) -> Reader<'_> {
        Reader::from_slice(input.as_bytes(), &DecodeOptions::default())
    }

    #[rstest::rstest]
    fn test_object_walk() {
        let mut reader = reader(r#" { "id" : 12, "tags": ["a", "b\n"], "ok": true } "#);
        reader.begin_object().unwrap();
        assert!(reader.has_next_field().unwrap());
        assert_eq!(reader.next_field().unwrap(), "id");
        assert_eq!(reader.read_i64().unwrap(), 12);
        assert!(reader.has_next_field().unwrap());
        assert_eq!(reader.next_field().unwrap(), "tags");
        reader.begin_array().unwrap();
        let mut tags = Vec::new();
        while reader.has_next_element().unwrap() {
            tags.push(reader.read_string().unwrap().to_string());
        }
        reader.end_array().unwrap();
        assert_eq!(tags, ["a", "b\n"]);
        assert_eq!(reader.next_field().unwrap(), "ok");
        assert!(reader.read_bool().unwrap());
        assert!(!reader.has_next_field().unwrap());
        reader.end_object().unwrap();
        assert_eq!(reader.current_token(), Some(Token::EndObject));
        reader.finish().unwrap();
    }

    #[rstest::rstest]
    fn test_missing_comma_fails_on_second_element() {
        let mut reader = reader("[ 42 43]");
        reader.begin_array().unwrap();
        assert!(reader.has_next_element().unwrap());
        assert_eq!(reader.read_i64().unwrap(), 42);
        let err = reader.has_next_element().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
    }

    #[rstest::rstest]
    fn test_trailing_comma_fails() {
        let mut reader = reader("[ 42, 43, ]");
        reader.begin_array().unwrap();
        assert_eq!(reader.read_i64().unwrap(), 42);
        assert_eq!(reader.read_i64().unwrap(), 43);
        let err = reader.read_i64().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert!(err.message.contains("trailing comma"));
    }

    #[rstest::rstest]
    #[case(r#"{"a" 1}"#)]
    #[case(r#"{"a":1,}"#)]
    #[case(r#"{"a":1 "b":2}"#)]
    #[case(r#"[1,,2]"#)]
    #[case(r#"{1:2}"#)]
    #[case(r#"[tru]"#)]
    fn test_malformed_documents(#[case] input: &str) {
        let mut reader = reader(input);
        let err = reader.skip_value().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken, "{input}");
    }

    #[rstest::rstest]
    #[case(r#"{"a":1"#)]
    #[case(r#"["abc"#)]
    #[case("[1,")]
    #[case("")]
    fn test_truncated_documents(#[case] input: &str) {
        let mut reader = reader(input);
        let err = reader.skip_value().unwrap_err();
        assert_eq!(err.kind, ErrorKind::PrematureEnd, "{input}");
    }

    #[rstest::rstest]
    fn test_mismatched_end() {
        let mut reader = reader("[1]");
        reader.begin_array().unwrap();
        assert_eq!(reader.read_i64().unwrap(), 1);
        assert_eq!(reader.end_object().unwrap_err().kind, ErrorKind::MalformedToken);
    }

    #[rstest::rstest]
    fn test_peek_token_does_not_consume() {
        let mut reader = reader(r#"[null, {"k": -1.5}]"#);
        assert_eq!(reader.peek_token().unwrap(), Some(Token::BeginArray));
        reader.begin_array().unwrap();
        assert_eq!(reader.peek_token().unwrap(), Some(Token::Null));
        assert_eq!(reader.peek_token().unwrap(), Some(Token::Null));
        assert!(reader.is_null().unwrap());
        assert_eq!(reader.peek_token().unwrap(), Some(Token::BeginObject));
        reader.begin_object().unwrap();
        assert_eq!(reader.peek_token().unwrap(), Some(Token::FieldName));
        reader.next_field().unwrap();
        assert_eq!(reader.peek_token().unwrap(), Some(Token::Number));
        assert_eq!(reader.read_f64().unwrap(), -1.5);
        assert_eq!(reader.peek_token().unwrap(), Some(Token::EndObject));
        reader.end_object().unwrap();
        assert_eq!(reader.peek_token().unwrap(), Some(Token::EndArray));
        reader.end_array().unwrap();
        assert_eq!(reader.peek_token().unwrap(), None);
    }

    #[rstest::rstest]
    fn test_null_policy_for_primitives() {
        let mut strict = reader("[null]");
        strict.begin_array().unwrap();
        assert_eq!(strict.read_i32().unwrap_err().kind, ErrorKind::UnexpectedNull);

        let options = DecodeOptions::default().with_strict_numbers(false);
        let mut lenient = Reader::from_slice(b"[null, null, null]", &options);
        lenient.begin_array().unwrap();
        assert_eq!(lenient.read_i32().unwrap(), 0);
        assert!(!lenient.read_bool().unwrap());
        assert_eq!(lenient.read_f64().unwrap(), 0.0);
        lenient.end_array().unwrap();
    }

    #[rstest::rstest]
    fn test_name_table_resolution() {
        let table = Arc::new(NameTable::of(["statusCode", "body"]));
        let mut reader = reader(r#"{"statusCode":200,"body":"ok","extra":[1,{"x":2}]}"#);
        reader.begin_object_with(&table).unwrap();
        assert_eq!(reader.next_field_position().unwrap(), Some(0));
        assert_eq!(reader.read_i32().unwrap(), 200);
        assert_eq!(reader.next_field().unwrap(), "body");
        assert_eq!(reader.read_string().unwrap(), "ok");
        assert_eq!(reader.next_field_position().unwrap(), None);
        reader.skip_field("extra").unwrap();
        reader.end_object().unwrap();
    }

    #[rstest::rstest]
    fn test_unknown_field_policy() {
        let options = DecodeOptions::default().with_fail_on_unknown_field(true);
        let mut reader = Reader::from_slice(br#"{"extra":1}"#, &options);
        reader.begin_object().unwrap();
        reader.next_field().unwrap();
        let err = reader.skip_field("extra").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
    }

    #[rstest::rstest]
    fn test_read_raw_preserves_bytes() {
        let mut reader = reader(r#"{"payload": {"a": [1, 2 ], "b":"é"}, "n": 1}"#);
        reader.begin_object().unwrap();
        reader.next_field().unwrap();
        assert_eq!(
            reader.read_raw().unwrap(),
            r#"{"a": [1, 2 ], "b":"é"}"#.as_bytes()
        );
        assert_eq!(reader.next_field().unwrap(), "n");
        assert_eq!(reader.read_raw().unwrap(), b"1");
        reader.end_object().unwrap();
    }

    #[rstest::rstest]
    fn test_binary_and_specials() {
        let mut reader = reader(r#"["aGVsbG8=", "NaN", "-Infinity", "!!"]"#);
        reader.begin_array().unwrap();
        assert_eq!(reader.read_binary().unwrap(), b"hello");
        assert!(reader.read_f64().unwrap().is_nan());
        assert_eq!(reader.read_f64().unwrap(), f64::NEG_INFINITY);
        assert_eq!(reader.read_binary().unwrap_err().kind, ErrorKind::MalformedToken);
    }

    #[rstest::rstest]
    fn test_depth_limit() {
        let options = DecodeOptions::default().with_max_depth(3);
        let mut reader = Reader::from_slice(b"[[[[1]]]]", &options);
        let err = reader.skip_value().unwrap_err();
        assert_eq!(err.kind, ErrorKind::DepthLimitExceeded);
    }

    #[rstest::rstest]
    fn test_json_stream_values() {
        let options = DecodeOptions::default().with_json_stream(true);
        let mut reader = Reader::from_slice(b"1\n{\"a\":2}\n \"x\"\n", &options);
        let mut kinds = Vec::new();
        while reader.has_next_value().unwrap() {
            kinds.push(reader.peek_token().unwrap());
            reader.skip_value().unwrap();
        }
        assert_eq!(
            kinds,
            [Some(Token::Number), Some(Token::BeginObject), Some(Token::String)]
        );
    }

    #[rstest::rstest]
    fn test_second_top_level_value_needs_stream_mode() {
        let mut reader = reader("1 2");
        assert_eq!(reader.read_i64().unwrap(), 1);
        assert_eq!(reader.finish().unwrap_err().kind, ErrorKind::MalformedToken);
    }

    #[rstest::rstest]
    fn test_error_detail_levels() {
        let minimal = DecodeOptions::default().with_error_detail(ErrorDetail::Minimal);
        let err = Reader::from_slice(b"[x]", &minimal).skip_value().unwrap_err();
        assert_eq!(err.location, None);

        let err = reader("[x]").skip_value().unwrap_err();
        assert_eq!(err.location, Some(Location { offset: 1 }));
        assert!(err.message.ends_with("at offset 1"));

        let context = DecodeOptions::default().with_error_detail(ErrorDetail::Context);
        let err = Reader::from_slice(b"[x]", &context).skip_value().unwrap_err();
        assert!(err.message.contains("near '[x]'"));
    }

    #[rstest::rstest]
    fn test_big_numbers() {
        let mut reader = reader("[123456789012345678901234567890, 1.50e-2, 1e400]");
        reader.begin_array().unwrap();
        assert_eq!(
            reader.read_big_integer().unwrap().to_string(),
            "123456789012345678901234567890"
        );
        let decimal = reader.read_decimal().unwrap();
        assert_eq!(decimal.to_string(), "0.0150");
        assert_eq!(reader.read_f64().unwrap(), f64::INFINITY);
    }

    #[rstest::rstest]
    fn test_integer_overflow_is_malformed() {
        let mut reader = reader("[2147483648]");
        reader.begin_array().unwrap();
        let err = reader.read_i32().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
    }

    #[rstest::rstest]
    fn test_close_releases_input() {
        let mut reader = reader("[1]");
        reader.close();
        assert_eq!(reader.peek_token().unwrap(), None);
        let parts = reader.into_parts();
        assert!(parts.frames.is_empty());
    }

    #[rstest::rstest]
    #[case(r#"["a\tbcdefg"]"#, true)]
    #[case(r#"["a\tbcdefgh"]"#, false)]
    #[case(r#"{"a\tbcdefgh": 1}"#, false)]
    #[case(r#"["abcdefghijklmnop"]"#, true)]
    fn test_string_scratch_limit(#[case] input: &str, #[case] fits: bool) {
        let options = DecodeOptions::default().with_max_string_buffer(8);
        let mut reader = Reader::from_slice(input.as_bytes(), &options);
        let result = match reader.peek_token().unwrap() {
            Some(Token::BeginArray) => {
                reader.begin_array().unwrap();
                reader.read_string().map(str::len)
            }
            _ => {
                reader.begin_object().unwrap();
                reader.next_field().map(str::len)
            }
        };
        if fits {
            assert!(result.unwrap() >= 8);
        } else {
            assert_eq!(result.unwrap_err().kind, ErrorKind::BufferLimitExceeded);
        }
    }
}
