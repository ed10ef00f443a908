use thiserror::Error;

/// Boxed error from the transport stream.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Parse-fatal errors.
///
/// None of these are retried internally; the whole parse must be restarted
/// with a fresh byte stream. Filter rejections are not errors, they only
/// omit the part from the result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Boundary token missing from `Content-Type`, empty, or over 70 bytes.
    #[error("invalid multipart boundary")]
    MalformedBoundary,

    /// Bad or missing `Content-Disposition` in a part header block.
    #[error("invalid part: bad or missing content disposition")]
    MalformedPart,

    /// One part's header block is too large.
    #[error("part header block is larger than {0} bytes")]
    HeaderTooLarge(usize),

    /// Field name is too long.
    #[error("field name is longer than {0} bytes")]
    FieldNameTooLong(usize),

    /// A non-file field's value is too large.
    #[error("field value is larger than {0} bytes")]
    FieldValueTooLong(usize),

    /// Too many non-file fields.
    #[error("more than {0} non-file fields")]
    TooManyFields(usize),

    /// A file part's payload is too large.
    #[error("file is larger than {0} bytes")]
    FileTooLarge(usize),

    /// Too many file parts.
    #[error("more than {0} files")]
    TooManyFiles(usize),

    /// Too many parts overall.
    #[error("more than {0} parts")]
    TooManyParts(usize),

    /// Storage engine open/write/finalize failure.
    #[error("storage i/o failed")]
    Io(#[from] std::io::Error),

    /// The transport errored or ended before the final boundary was seen.
    #[error("transport aborted before the final boundary")]
    TransportAbort(#[source] Option<BoxError>),
}
