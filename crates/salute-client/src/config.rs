//! Client configuration.
//!
//! [`ConnectionArgs`] is the `clap` view of the settings (every flag can also
//! come from the environment or a `.env` file); [`ClientConfig`] is the
//! validated form the client and connector are built from.

use clap::{Args, ValueEnum};
use core::{fmt, time::Duration};
use salute_core::{
    Error, Result,
    types::{DEFAULT_HOST, DEFAULT_PORT, ServerAddr},
};
use tonic::codec::CompressionEncoding;

/// Message compression negotiated with the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    #[default]
    None,
    Deflate,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Deflate => write!(f, "deflate"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Deflate => Some(CompressionEncoding::Deflate),
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

/// Connection settings shared by every `salute` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Greeter server host.
    ///
    /// Environment variable: `SALUTE_HOST`
    #[arg(long, env = "SALUTE_HOST", default_value_t = String::from(DEFAULT_HOST))]
    pub host: String,

    /// Greeter server port.
    ///
    /// Environment variable: `SALUTE_PORT`
    #[arg(long, env = "SALUTE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// How long to wait for the connection to be established, in
    /// milliseconds.
    ///
    /// Environment variable: `SALUTE_CONNECT_TIMEOUT_MS`
    #[arg(long, env = "SALUTE_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    /// Deadline applied to every call, in milliseconds. Unset means no
    /// deadline; streams then run until the server ends them.
    ///
    /// Environment variable: `SALUTE_REQUEST_TIMEOUT_MS`
    #[arg(long, env = "SALUTE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Compression for requests and accepted for responses.
    ///
    /// Environment variable: `SALUTE_COMPRESSION`
    #[arg(long, env = "SALUTE_COMPRESSION", value_enum, default_value_t = Compression::None)]
    pub compression: Compression,
}

/// Validated client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub addr: ServerAddr,
    pub connect_timeout: Duration,
    pub request_timeout: Option<Duration>,
    pub compression: Compression,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: ServerAddr::default(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: None,
            compression: Compression::None,
        }
    }
}

impl ClientConfig {
    pub fn new(addr: ServerAddr) -> Self {
        Self {
            addr,
            ..Self::default()
        }
    }
}

impl TryFrom<ConnectionArgs> for ClientConfig {
    type Error = Error;

    fn try_from(args: ConnectionArgs) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidConfig {
            reason: reason.to_string(),
        };

        if args.host.is_empty() {
            return Err(invalid("SALUTE_HOST must not be empty"));
        }
        if args.port == 0 {
            return Err(invalid("SALUTE_PORT must be greater than 0"));
        }
        if args.connect_timeout_ms == 0 {
            return Err(invalid("SALUTE_CONNECT_TIMEOUT_MS must be greater than 0"));
        }
        if args.request_timeout_ms == Some(0) {
            return Err(invalid("SALUTE_REQUEST_TIMEOUT_MS must be greater than 0"));
        }

        Ok(Self {
            addr: ServerAddr::new(args.host, args.port),
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            request_timeout: args.request_timeout_ms.map(Duration::from_millis),
            compression: args.compression,
        })
    }
}
