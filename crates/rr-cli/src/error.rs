use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("Host lookup failed: {0}")]
    Lookup(#[source] std::io::Error),

    #[error("{0}")]
    Usage(String),
}
