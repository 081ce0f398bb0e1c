//! Error types for MIME operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
///
/// Decoding is lenient: most of these are recorded on the part they concern
/// rather than returned for the whole message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Header line that is not a `name: value` field.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Date header that does not follow any accepted grammar.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Multipart body that cannot be split (e.g. no boundary parameter).
    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(String),

    /// Multipart nesting exceeded the fixed depth limit.
    #[error("MIME nesting deeper than {limit} levels")]
    TooDeeplyNested {
        /// The depth limit that was exceeded.
        limit: usize,
    },
}
