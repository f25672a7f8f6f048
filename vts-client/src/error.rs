// vts-client/src/error.rs
use std::time::Duration;

use thiserror::Error;

/// Failure to deliver a call or to obtain its reply
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("agent error: {0}")]
    Agent(#[from] ic_agent::AgentError),

    #[error("{0}")]
    Unavailable(String),
}

/// Client-side failure of a remote call.
///
/// Backend error symbols never appear here; they arrive as the `Err` side of
/// the `VtsResult` a call returns.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport failure calling {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to encode arguments for {method}: {source}")]
    Encode {
        method: String,
        #[source]
        source: candid::Error,
    },

    #[error("reply from {method} does not match the service interface: {source}")]
    Decode {
        method: String,
        #[source]
        source: candid::Error,
    },

    #[error("invalid identity: {0}")]
    Identity(String),

    #[error("invalid client configuration: {0}")]
    Configuration(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("login did not complete within {0:?}")]
    Timeout(Duration),

    #[error("login was cancelled")]
    Cancelled,

    #[error("invalid login state: {0}")]
    InvalidState(#[from] jsonwebtoken::errors::Error),

    #[error("no pending login matches this state")]
    UnknownLogin,

    #[error("delegation rejected: {0}")]
    Delegation(String),

    #[error("too many logins in flight")]
    Busy,

    #[error("identity store error: {0}")]
    Store(String),

    #[error("identity store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("identity store encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("invalid session key: {0}")]
    InvalidKey(String),
}
