//! Greeter server wiring.
//!
//! - [`config`] - CLI/environment configuration.
//! - [`service`] - The `Greeter` implementation.
//! - [`streaming`] - Feeder task behind `SayHelloStream`.
//! - [`telemetry`] - Log subscriber setup.

pub mod config;
pub mod service;
pub mod streaming;
pub mod telemetry;

use config::ServerConfig;
use futures::Stream;
use salute_core::proto::{FILE_DESCRIPTOR_SET, greeter_server::GreeterServer};
use service::handler::GreeterService;
use tokio::io::{AsyncRead, AsyncWrite};
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_reflection::server::Builder;

/// Serves the greeter, health and reflection services on `incoming` until
/// `shutdown` resolves.
///
/// When `shutdown` fires the health status flips to not-serving and the
/// [`GreeterService`] drains in-flight streams before the server stops.
pub async fn serve_with_incoming<I, IO, IE, F>(
    incoming: I,
    config: ServerConfig,
    shutdown: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<Box<dyn std::error::Error + Send + Sync>>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<GreeterServer<GreeterService>>()
        .await;

    let service = GreeterService::new(config);

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let drain = {
        let service = service.clone();
        async move {
            shutdown.await;
            tracing::info!("Shutdown requested, draining in-flight streams");

            // 1. Publish the status
            health_reporter
                .set_not_serving::<GreeterServer<GreeterService>>()
                .await;

            // 2. Perform graceful shutdown
            service.shutdown().await;
        }
    };

    Server::builder()
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_greeter_service(service))
        .serve_with_incoming_shutdown(incoming, drain)
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn build_greeter_service(service: GreeterService) -> GreeterServer<GreeterService> {
    GreeterServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}
