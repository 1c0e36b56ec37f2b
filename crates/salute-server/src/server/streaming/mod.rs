//! Server-side production of `SayHelloStream` responses.
//!
//! - [`coordinator`] - Feeds greetings into the response channel.

pub mod coordinator;
