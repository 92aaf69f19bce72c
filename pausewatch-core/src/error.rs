use thiserror::Error;

/// The five error categories that can surface out of the core, per the
/// account-level error taxonomy: configuration, authentication, service,
/// state, and user-initiated cancellation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("service error ({kind}/{region}): {message}")]
    Service {
        kind: &'static str,
        region: String,
        message: String,
    },

    #[error("state error: {0}")]
    State(String),

    #[error(transparent)]
    StateIo(#[from] std::io::Error),

    #[error(transparent)]
    StateJson(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn service(kind: &'static str, region: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Service {
            kind,
            region: region.into(),
            message: message.into(),
        }
    }

    /// True for the two variants backed by `std::io::Error` / `serde_json::Error`,
    /// which are both reported as "state" failures at the CLI boundary.
    pub fn is_state(&self) -> bool {
        matches!(self, Error::State(_) | Error::StateIo(_) | Error::StateJson(_))
    }
}
