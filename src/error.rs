use thiserror::Error;

/// Errors raised while embedding fonts into an SVG document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedError {
    /// The input text is not well-formed XML. No output is produced.
    #[error("malformed document at byte {position}: {message}")]
    MalformedDocument { position: usize, message: String },
}

impl EmbedError {
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn from_xml(position: usize, err: quick_xml::Error) -> Self {
        Self::malformed(position, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EmbedError>;
