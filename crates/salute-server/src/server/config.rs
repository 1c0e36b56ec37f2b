use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `salute-server` binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults suitable for local development and tests.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "salute-server",
    version,
    about = "A gRPC greeter with unary and server-streaming greetings"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Example: "0.0.0.0:50051"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Delay between consecutive messages of a `SayHelloStream` response, in
    /// milliseconds. Zero sends the whole stream as fast as the client reads.
    ///
    /// Environment variable: `STREAM_INTERVAL_MS`
    #[arg(long, env = "STREAM_INTERVAL_MS", default_value_t = 0)]
    pub stream_interval_ms: u64,

    /// Capacity of the response buffer between the feeder task and the gRPC
    /// stream.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Longest name, in bytes, accepted in a `HelloRequest`.
    ///
    /// Environment variable: `MAX_NAME_LEN`
    #[arg(long, env = "MAX_NAME_LEN", default_value_t = 1024)]
    pub max_name_len: usize,

    /// Seconds to wait for in-flight streams to finish during shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Default log filter when `RUST_LOG` is not set.
    ///
    /// Environment variable: `LOG_LEVEL`
    #[arg(long, env = "LOG_LEVEL", default_value_t = String::from("info"))]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub stream_interval: Duration,
    pub stream_buffer_size: usize,
    pub max_name_len: usize,
    pub shutdown_timeout: Duration,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: String::from("0.0.0.0:50051"),
            stream_interval: Duration::ZERO,
            stream_buffer_size: 8,
            max_name_len: 1024,
            shutdown_timeout: Duration::from_secs(3),
            log_level: String::from("info"),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.max_name_len == 0 {
            bail!("MAX_NAME_LEN must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            stream_interval: Duration::from_millis(args.stream_interval_ms),
            stream_buffer_size: args.stream_buffer_size,
            max_name_len: args.max_name_len,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            log_level: args.log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(std::iter::once("salute-server").chain(args.iter().copied()))?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn defaults_match_config_default() {
        let config = parse(&[]).unwrap();
        let default = ServerConfig::default();
        assert_eq!(config.server_addr, default.server_addr);
        assert_eq!(config.stream_interval, default.stream_interval);
        assert_eq!(config.stream_buffer_size, default.stream_buffer_size);
        assert_eq!(config.max_name_len, default.max_name_len);
        assert_eq!(config.shutdown_timeout, default.shutdown_timeout);
    }

    #[test]
    fn converts_millis_and_seconds() {
        let config = parse(&["--stream-interval-ms", "250", "--shutdown-timeout", "10"]).unwrap();
        assert_eq!(config.stream_interval, Duration::from_millis(250));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn rejects_zero_buffer_and_name_len() {
        assert!(parse(&["--stream-buffer-size", "0"]).is_err());
        assert!(parse(&["--max-name-len", "0"]).is_err());
    }
}
