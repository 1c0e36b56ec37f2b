//! gRPC service implementation.
//!
//! - [`handler`] - gRPC service entry point (`GreeterService`).

pub mod handler;
