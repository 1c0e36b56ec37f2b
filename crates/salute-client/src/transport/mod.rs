//! The seam between the client and the wire.
//!
//! A [`Connector`] opens one connection to a server and hands back a
//! [`Transport`]. A transport issues calls; clones of it share the same
//! underlying connection, and any number of calls may be in flight on it at
//! once. Multiplexing is the transport's job: the gRPC implementation in
//! [`grpc`] relies on HTTP/2 streams over a single `tonic` channel.
//!
//! The traits use the request and reply types generated from
//! `helloworld.proto` directly, and report call failures as [`Status`] so that
//! every transport shares the same error taxonomy.

pub mod grpc;

use core::pin::Pin;
use futures::Stream;
use salute_core::{
    Result,
    proto::{HelloReply, HelloRequest},
    types::ServerAddr,
};
use tonic::Status;

pub use grpc::{GrpcConnector, GrpcTransport};

/// Replies of one server-streaming call, in server order.
pub type ReplyStream = Pin<Box<dyn Stream<Item = core::result::Result<HelloReply, Status>> + Send>>;

/// Opens connections to a greeter server.
pub trait Connector: Clone + Send + Sync + 'static {
    type Transport: Transport;

    /// Establishes a connection to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`salute_core::Error::Connection`] if the server cannot be
    /// reached.
    fn connect(&self, addr: &ServerAddr) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// An open connection able to carry concurrent calls.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Sends one request and waits for its single reply.
    fn say_hello(
        &self,
        request: HelloRequest,
    ) -> impl Future<Output = core::result::Result<HelloReply, Status>> + Send;

    /// Opens a server-streaming call. Replies are pulled lazily from the
    /// returned stream.
    fn say_hello_stream(
        &self,
        request: HelloRequest,
    ) -> impl Future<Output = core::result::Result<ReplyStream, Status>> + Send;

    /// Releases this handle on the connection. The connection itself goes away
    /// once every clone has been closed or dropped.
    fn close(self) -> impl Future<Output = ()> + Send;
}
