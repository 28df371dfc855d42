use thiserror::Error;

/// Errors raised while building filter rules from their declared shape
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: must be list or priority ({})", crate::priority::Priority::labels().join(", "))]
    InvalidPriority { field: String },

    #[error("{field}: must be a list")]
    NotAList { field: String },

    #[error("{field}: list must not be empty")]
    EmptyList { field: String },

    #[error("{field}: {value}: must be a string")]
    NotAString { field: String, value: String },

    #[error("rule must be a map")]
    NotAMap,

    #[error("{field}: {value}: expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("{field}: {pattern}: {source}")]
    InvalidRegex {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors that stop a filtering run
#[derive(Debug, Error)]
pub enum FilterError {
    /// The entry source failed part way through; formatters were still flushed.
    #[error("reading journal entries failed: {0}")]
    Source(#[from] crate::journal::SourceError),

    /// The output could not be written; formatters were not flushed.
    #[error("writing output failed: {0}")]
    Sink(#[source] std::io::Error),
}

impl FilterError {
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, FilterError::Sink(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}
