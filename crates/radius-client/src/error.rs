//! Client error types

use radius_proto::PacketError;
use std::io;
use thiserror::Error;

/// Outcome delivered to a request callback when no response is available
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Every attempt elapsed without an authentic response
    #[error("Request timed out")]
    Timeout,

    /// The request was canceled before it completed
    #[error("Request canceled")]
    Canceled,

    /// A follow-up attempt could not be built
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    /// The socket for a follow-up attempt could not be opened
    #[error("Socket error: {0}")]
    Io(io::ErrorKind),
}

/// Errors returned synchronously while setting up a request
#[derive(Error, Debug)]
pub enum ClientError {
    /// RADIUS packet encoding error
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A zero timeout leaves no time for any attempt
    #[error("Timeout must be non-zero")]
    ZeroTimeout,

    /// Server name could not be resolved
    #[error("Failed to resolve {server}: {source}")]
    Resolve {
        server: String,
        #[source]
        source: io::Error,
    },

    /// Server name resolved to nothing
    #[error("No addresses for {0}")]
    NoAddresses(String),
}

impl From<ClientError> for RequestError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Packet(e) => RequestError::Packet(e),
            ClientError::Io(e) => RequestError::Io(e.kind()),
            ClientError::Resolve { source, .. } => RequestError::Io(source.kind()),
            ClientError::ZeroTimeout => RequestError::Io(io::ErrorKind::InvalidInput),
            ClientError::NoAddresses(_) => RequestError::Io(io::ErrorKind::NotFound),
        }
    }
}
