//! Shared protocol bindings, error definitions and address types.
//!
//! ## Submodules
//!
//! - [`error`] - Error taxonomy shared by client and server.
//! - [`types`] - Server addresses and defaults.
//! - [`proto`] - Generated `Greeter` service and message definitions.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/helloworld.proto`.
///
/// ## Service
///
/// - `SayHello` - one `HelloRequest`, one `HelloReply`.
/// - `SayHelloStream` - one `HelloRequest`, a server-terminated stream of
///   `HelloReply`.
pub mod proto {
    tonic::include_proto!("helloworld");

    /// Encoded descriptor set for `tonic-reflection`.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("helloworld_descriptor");
}
