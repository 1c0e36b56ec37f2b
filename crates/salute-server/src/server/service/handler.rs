//! gRPC service implementation for unary and streaming greetings.
//!
//! This module defines [`GreeterService`], the concrete implementation of the
//! [`Greeter`] gRPC service defined in `helloworld.proto`.
//!
//! ## Responsibilities
//!
//! - Validate incoming names and enforce limits.
//! - Answer `SayHello` directly.
//! - Dispatch `SayHelloStream` to a feeder task via [`feed_greetings`].
//! - Refuse new work and drain in-flight streams on shutdown.

use crate::server::{config::ServerConfig, streaming::coordinator::feed_greetings};
use core::pin::Pin;
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use salute_core::{
    Error,
    proto::{HelloReply, HelloRequest, greeter_server::Greeter},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

/// Greeter service answering `SayHello` and `SayHelloStream`.
///
/// Cloning is cheap; clones share the shutdown state and the in-flight stream
/// counter.
#[derive(Clone)]
pub struct GreeterService {
    config: ServerConfig,
    shutdown_token: CancellationToken,
    accepting: Arc<AtomicBool>,
    streams_inflight: Arc<AtomicUsize>,
}

impl GreeterService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            shutdown_token: CancellationToken::new(),
            accepting: Arc::new(AtomicBool::new(true)),
            streams_inflight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `SayHelloStream` calls still being fed.
    pub fn streams_inflight(&self) -> usize {
        self.streams_inflight.load(Ordering::Acquire)
    }

    /// Gracefully shuts the service down.
    ///
    /// - Refuses new requests.
    /// - Waits up to `shutdown_timeout` for in-flight streams to finish.
    /// - Cancels whatever is left; those clients receive `UNAVAILABLE`.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new requests ===
        tracing::info!("Refusing new requests");
        self.accepting.store(false, Ordering::Release);

        // === Phase 1: Wait for in-flight streams to drain ===
        tracing::info!("Draining in-flight streams ({} active)", self.streams_inflight());
        let drained = timeout(self.config.shutdown_timeout, async {
            while self.streams_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight streams drained successfully"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.streams_inflight()
            ),
        }

        // === Phase 2: Cancel any remaining work ===
        self.shutdown_token.cancel();
    }

    fn validate(&self, request: &HelloRequest) -> Result<(), Error> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown);
        }

        if request.name.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "Name must not be empty".to_string(),
            });
        }

        if request.name.len() > self.config.max_name_len {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "Name length {} exceeds maximum allowed ({})",
                    request.name.len(),
                    self.config.max_name_len
                ),
            });
        }

        Ok(())
    }
}

/// Decrements the in-flight counter when a feeder task ends, however it ends.
struct InflightGuard(Arc<AtomicUsize>);

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[tonic::async_trait]
impl Greeter for GreeterService {
    type SayHelloStreamStream = Pin<Box<dyn Stream<Item = Result<HelloReply, Status>> + Send>>;

    #[tracing::instrument(skip_all, fields(name = %req.get_ref().name))]
    async fn say_hello(&self, req: Request<HelloRequest>) -> Result<Response<HelloReply>, Status> {
        let request = req.into_inner();
        if let Err(e) = self.validate(&request) {
            tracing::warn!("Rejected SayHello: {e}");
            return Err(e.into());
        }

        Ok(Response::new(HelloReply {
            message: format!("Hello, {}!", request.name),
        }))
    }

    #[tracing::instrument(skip_all, fields(name = %req.get_ref().name))]
    async fn say_hello_stream(
        &self,
        req: Request<HelloRequest>,
    ) -> Result<Response<Self::SayHelloStreamStream>, Status> {
        let request = req.into_inner();
        if let Err(e) = self.validate(&request) {
            tracing::warn!("Rejected SayHelloStream: {e}");
            return Err(e.into());
        }

        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<HelloReply, Status>>(self.config.stream_buffer_size);

        self.streams_inflight.fetch_add(1, Ordering::AcqRel);
        let guard = InflightGuard(Arc::clone(&self.streams_inflight));
        let interval = self.config.stream_interval;
        let shutdown = self.shutdown_token.clone();

        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = feed_greetings(request.name, resp_tx, interval, shutdown).await {
                tracing::debug!("Stream ended early: {e}");
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
