use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An unexpected byte where a structural or value token was expected.
    MalformedToken,
    /// Input ended in the middle of a token or document.
    PrematureEnd,
    /// A string, raw span or stream window outgrew its configured cap.
    BufferLimitExceeded,
    /// A number has more digits than `max_number_digits` allows.
    NumberTooLong,
    /// A field was skipped while `fail_on_unknown_field` is set.
    UnknownField,
    /// `null` was found where a strict number or boolean was read.
    UnexpectedNull,
    DepthLimitExceeded,
    Io,
    Serde,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Encode,
    Decode,
    Unknown,
}

/// Byte offset from the start of the input (or output) stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub offset: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub stage: ErrorStage,
    pub message: String,
    pub location: Option<Location>,
}

impl Error {
    pub fn new(kind: ErrorKind, stage: ErrorStage, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            message: message.into(),
            location: None,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedToken, ErrorStage::Decode, message)
    }

    pub fn premature_end(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PrematureEnd, ErrorStage::Decode, message)
    }

    pub fn buffer_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BufferLimitExceeded, ErrorStage::Decode, message)
    }

    pub fn number_too_long(max_digits: usize) -> Self {
        Self::new(
            ErrorKind::NumberTooLong,
            ErrorStage::Decode,
            format!("number exceeds the limit of {max_digits} digits"),
        )
    }

    pub fn unknown_field(name: &str) -> Self {
        Self::new(
            ErrorKind::UnknownField,
            ErrorStage::Decode,
            format!("unknown field \"{name}\""),
        )
    }

    pub fn unexpected_null(expected: &str) -> Self {
        Self::new(
            ErrorKind::UnexpectedNull,
            ErrorStage::Decode,
            format!("expected {expected}, found null"),
        )
    }

    pub fn depth_limit(max_depth: usize) -> Self {
        Self::new(
            ErrorKind::DepthLimitExceeded,
            ErrorStage::Decode,
            format!("nesting exceeds the limit of {max_depth} levels"),
        )
    }

    /// Generator misuse: unbalanced scopes, names outside objects and so on.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedToken, ErrorStage::Encode, message)
    }

    pub fn io(err: &io::Error, stage: ErrorStage) -> Self {
        Self::new(ErrorKind::Io, stage, format!("i/o failed: {err}"))
    }

    pub fn serde(err: &serde_json::Error, stage: ErrorStage) -> Self {
        let action = match stage {
            ErrorStage::Encode => "serialize",
            _ => "deserialize",
        };
        Self::new(ErrorKind::Serde, stage, format!("{action} failed: {err}"))
    }

    pub fn with_stage(mut self, stage: ErrorStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_eof(&self) -> bool {
        self.kind == ErrorKind::PrematureEnd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_display_is_message() {
        let err = Error::malformed("expected ':'");
        assert_eq!(err.to_string(), "expected ':'");
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert_eq!(err.stage, ErrorStage::Decode);
    }

    #[rstest::rstest]
    fn test_encode_errors_carry_encode_stage() {
        let err = Error::encode("unbalanced end_array");
        assert_eq!(err.stage, ErrorStage::Encode);
        assert_eq!(err.kind, ErrorKind::MalformedToken);
    }

    #[rstest::rstest]
    fn test_location_is_attached() {
        let err = Error::premature_end("unexpected end of input")
            .with_location(Location { offset: 17 });
        assert!(err.is_eof());
        assert_eq!(err.location, Some(Location { offset: 17 }));
    }
}
