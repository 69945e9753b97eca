use thiserror::Error;

/// Error produced by a reference collaborator. Kept opaque so that the
/// underlying driver error reaches the caller unchanged.
pub type FetchError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (no primary keys, bad table name, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// The reference capability failed. Never retried internally.
    #[error("lookup failed in '{collaborator}': {source}")]
    Lookup {
        collaborator: String,
        #[source]
        source: FetchError,
    },

    /// Source ingestion failed while reading CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error (file read, report write, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sink used outside its open/close lifecycle.
    #[error("sink error: {0}")]
    Sink(String),
}

impl ReconError {
    pub fn lookup(collaborator: impl Into<String>, source: impl Into<FetchError>) -> Self {
        ReconError::Lookup {
            collaborator: collaborator.into(),
            source: source.into(),
        }
    }

    /// Name of the failing collaborator, if this is a lookup failure.
    pub fn collaborator(&self) -> Option<&str> {
        match self {
            ReconError::Lookup { collaborator, .. } => Some(collaborator),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_keeps_inner_error() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = ReconError::lookup("warehouse", inner);
        assert_eq!(err.collaborator(), Some("warehouse"));
        assert_eq!(err.to_string(), "lookup failed in 'warehouse': socket timed out");

        let source = std::error::Error::source(&err).unwrap();
        let io = source.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);
    }

    #[test]
    fn lookup_from_message() {
        let err = ReconError::lookup("memory", "boom");
        assert!(err.to_string().ends_with("boom"));
        assert_eq!(ReconError::Sink("closed".into()).collaborator(), None);
    }
}
