use clap::Parser;
use salute_server::server::{
    config::{CliArgs, ServerConfig},
    serve_with_incoming,
    telemetry::init_telemetry,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry(&config.log_level)?;

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&listener.local_addr()?.to_string(), &config);

    serve_with_incoming(TcpListenerStream::new(listener), config, shutdown_signal()).await
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting greeter on {} with full config: {:#?}", addr, config);
    } else {
        tracing::info!(
            "Starting greeter on {} (stream interval {:?})",
            addr,
            config.stream_interval
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
