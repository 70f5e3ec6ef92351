use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration found (looked in {0})")]
    Missing(String),
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A rich-text step blob that could not be interpreted at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("steps blob has no <steps> envelope")]
    MissingEnvelope,
    #[error("step element starting at byte {0} is never closed")]
    UnclosedStep(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("test case has no title")]
    MissingTitle,
    #[error("test case '{0}' has no test case id tag")]
    MissingId(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("unexpected response from {url}: {reason}")]
    Shape { url: String, reason: String },
}
