use thiserror::Error;

/// Structural failure while parsing a single markup construct.
///
/// Always recoverable: callers skip the construct or annotate the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("text is not a template invocation wrapped in {{{{ }}}}: {text}")]
    NotWrapped { text: String },
    #[error("template invocation has no closing }}}}: {text}")]
    Unterminated { text: String },
}

impl FormatError {
    pub fn text(&self) -> &str {
        match self {
            Self::NotWrapped { text } | Self::Unterminated { text } => text,
        }
    }
}
