//! Error types shared by the greeter client and server.
//!
//! This module defines the central `Error` enum and implements conversions in
//! both directions between it and `tonic::Status`, so client code can surface
//! call failures with their gRPC code and server code can reply with an
//! appropriate status.
//!
//! ## Error Cases
//! - `Connection`: The channel to the server could not be established.
//! - `Rpc`: A call failed with a server- or transport-reported status.
//! - `Unexpected`: Any other failure while running a call.
//! - `NotConnected`: A call was issued before `connect()`.
//! - `InvalidAddress` / `InvalidConfig`: Rejected user input.
//! - `InvalidRequest`: The server rejected a malformed request.
//! - `ChannelError`: An internal communication failure between tasks.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the greeter client and server.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The channel to `address` could not be established.
    #[error("Failed to connect to {address}: {reason}")]
    Connection { address: String, reason: String },

    /// A call failed with a gRPC status.
    #[error("gRPC error: {code:?}, details: {details}")]
    Rpc { code: Code, details: String },

    /// A call failed for a reason outside the gRPC status model.
    #[error("Unexpected error: {context}")]
    Unexpected { context: String },

    /// The client has no open connection.
    #[error("Client is not connected")]
    NotConnected,

    /// A server address could not be parsed.
    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Configuration values failed validation.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Returns the gRPC status code carried by an [`Error::Rpc`].
    pub const fn code(&self) -> Option<Code> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::Rpc {
            code: status.code(),
            details: status.message().to_owned(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Connection { address, reason } => {
                Status::unavailable(format!("Failed to connect to {address}: {reason}"))
            }
            Error::Rpc { code, details } => Status::new(code, details),
            Error::Unexpected { context } => Status::unknown(context),
            Error::NotConnected => Status::failed_precondition("Client is not connected"),
            Error::InvalidAddress { address, reason } => {
                Status::invalid_argument(format!("Invalid address {address:?}: {reason}"))
            }
            Error::InvalidConfig { reason } | Error::InvalidRequest { reason } => {
                Status::invalid_argument(reason)
            }
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
