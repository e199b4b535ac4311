//! Error taxonomy for the client.
//!
//! Transport, dispatch, and directory failures are classified so callers can
//! distinguish "server not there" from everything else. Malformed inbound
//! frames get their own type; they are logged and dropped, never fatal.

use tokio_tungstenite::tungstenite;

/// Failures of the session channel transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel refuses to initialize without a bearer credential.
    #[error("A bearer token is required to open the session channel")]
    MissingCredential,

    #[error("Server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TransportError {
    /// Classify a tungstenite error: connection-level failures mean the
    /// server is unavailable, everything else passes through.
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        match &err {
            tungstenite::Error::Io(io_err)
                if matches!(
                    io_err.kind(),
                    std::io::ErrorKind::ConnectionRefused
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                ) =>
            {
                Self::Unavailable
            }
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Unavailable
            }
            _ => Self::Other(err.into()),
        }
    }
}

/// A frame the client could not interpret.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unexpected frame: {0}")]
    Unexpected(String),
}

/// Failures submitting a dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The server answered but refused the dispatch.
    #[error("Dispatch rejected ({status}): {message}")]
    Rejected { status: String, message: String },

    #[error("Server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

/// Failures reading the agent directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Directory request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DirectoryError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}
