use serde::Deserialize;

use crate::constants::{
    DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE, MAX_DEPTH, MAX_NUMBER_DIGITS, MAX_STRING_BUFFER,
};

/// How much diagnostic context decode errors carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorDetail {
    /// Description only.
    Minimal,
    /// Description plus byte offset.
    #[default]
    Position,
    /// Description, byte offset and a snippet of the surrounding input.
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncodeOptions {
    /// Emit `"field":null` instead of omitting the field.
    pub serialize_nulls: bool,
    /// Emit `[]`/`{}` instead of omitting the field.
    pub serialize_empty: bool,
    /// Separate consecutive top-level values with a newline.
    pub json_stream: bool,
    /// Initial buffer capacity, and the flush threshold when writing to a sink.
    pub buffer_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            serialize_nulls: true,
            serialize_empty: true,
            json_stream: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serialize_nulls(mut self, serialize_nulls: bool) -> Self {
        self.serialize_nulls = serialize_nulls;
        self
    }

    pub fn with_serialize_empty(mut self, serialize_empty: bool) -> Self {
        self.serialize_empty = serialize_empty;
        self
    }

    pub fn with_json_stream(mut self, json_stream: bool) -> Self {
        self.json_stream = json_stream;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(16);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecodeOptions {
    /// Raise `UnknownField` instead of skipping unrecognized fields.
    pub fail_on_unknown_field: bool,
    /// Raise `UnexpectedNull` when a number or boolean read finds `null`.
    pub strict_numbers: bool,
    /// Accept whitespace separated top-level values.
    pub json_stream: bool,
    pub error_detail: ErrorDetail,
    /// Initial stream window size.
    pub buffer_size: usize,
    pub max_number_digits: usize,
    /// Cap on decoded (unescaped) string length.
    pub max_string_buffer: usize,
    /// Cap on stream window growth for values that span refills.
    pub max_buffer_size: usize,
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            fail_on_unknown_field: false,
            strict_numbers: true,
            json_stream: false,
            error_detail: ErrorDetail::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_number_digits: MAX_NUMBER_DIGITS,
            max_string_buffer: MAX_STRING_BUFFER,
            max_buffer_size: MAX_BUFFER_SIZE,
            max_depth: MAX_DEPTH,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fail_on_unknown_field(mut self, fail: bool) -> Self {
        self.fail_on_unknown_field = fail;
        self
    }

    pub fn with_strict_numbers(mut self, strict: bool) -> Self {
        self.strict_numbers = strict;
        self
    }

    pub fn with_json_stream(mut self, json_stream: bool) -> Self {
        self.json_stream = json_stream;
        self
    }

    pub fn with_error_detail(mut self, detail: ErrorDetail) -> Self {
        self.error_detail = detail;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_max_number_digits(mut self, digits: usize) -> Self {
        self.max_number_digits = digits;
        self
    }

    pub fn with_max_string_buffer(mut self, bytes: usize) -> Self {
        self.max_string_buffer = bytes;
        self
    }

    pub fn with_max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = bytes;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}
