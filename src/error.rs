use thiserror::Error;

/// Failure of one load, as shown to the user.
///
/// The display text is what ends up in the view's error slot, so backend
/// messages are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Backend or transport failure.
    #[error("{message}")]
    Query { message: String },

    /// Something the load depends on is missing (connection, credentials).
    #[error("{message}")]
    MissingPrecondition { message: String },

    /// Payload did not have the expected shape.
    #[error("{message}")]
    Shape { message: String },

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),
}

impl LoadError {
    pub fn query(message: impl Into<String>) -> Self {
        LoadError::Query {
            message: message.into(),
        }
    }

    pub fn missing(message: impl Into<String>) -> Self {
        LoadError::MissingPrecondition {
            message: message.into(),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        LoadError::Shape {
            message: message.into(),
        }
    }

    /// Short category name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Query { .. } => "query",
            LoadError::MissingPrecondition { .. } => "precondition",
            LoadError::Shape { .. } => "shape",
            LoadError::UnknownCollection(_) => "unknown_collection",
            LoadError::UnsupportedQuery(_) => "unsupported_query",
        }
    }
}

impl From<rusqlite::Error> for LoadError {
    fn from(err: rusqlite::Error) -> Self {
        LoadError::query(err.to_string())
    }
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
