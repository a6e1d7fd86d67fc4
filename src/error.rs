use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Jira API error: {0}")]
    Api(String),

    #[error("storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed {collection} payload for id {id}: {message}")]
    Malformed {
        collection: &'static str,
        id: u64,
        message: String,
    },

    #[error("rule {rule} failed: {message}")]
    Rule { rule: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Api(e.to_string())
    }
}

impl Error {
    /// Wrap an IO error with the path it occurred on.
    pub fn storage(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
