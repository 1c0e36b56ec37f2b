#![doc = include_str!("../README.md")]

pub mod batch;
pub mod client;
pub mod config;
pub mod consumer;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod testing;

pub use batch::{
    BatchEntry, BatchResults, BatchRunner, ErrorMarker, process_stream_batch, process_unary_batch,
};
pub use client::{Caller, Client, MessageStream, create_client};
pub use config::{ClientConfig, Compression, ConnectionArgs};
pub use consumer::{StopHandle, StreamConsumer, StreamOutcome};
pub use transport::{Connector, GrpcConnector, GrpcTransport, Transport};
