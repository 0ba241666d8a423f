use thiserror::Error;

/// Failure while making a text's index document resident.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown text '{0}'")]
    UnknownText(String),

    #[error("Failed to fetch {path}: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch {path} ({status})")]
    Status {
        path: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to read {0} outside the site root")]
    OutsideRoot(String),

    #[error("Malformed index document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure while parsing a query string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("expecting term or field, found nothing")]
    MissingTerm,

    #[error("expecting term, found nothing after field '{0}'")]
    MissingFieldTerm(String),

    #[error("unrecognised field '{field}', possible fields: {known}")]
    UnknownField { field: String, known: String },

    #[error("edit distance must be numeric, found '{0}'")]
    InvalidEditDistance(String),

    #[error("boost must be numeric, found '{0}'")]
    InvalidBoost(String),
}

/// A submission the session refused before changing any state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("select at least one text to search")]
    NoTextsSelected,
}
