//! # Server Addresses
//!
//! A [`ServerAddr`] names the single server a client talks to. It is kept as a
//! `host` plus `port` pair rather than a URI because the transport is always
//! plaintext HTTP/2; [`ServerAddr::endpoint_uri`] renders the `http://` form
//! the channel builder expects.
//!
//! IPv6 literals are accepted in brackets (`[::1]:50051`) and stored without
//! them.

use crate::{Error, Result};
use core::fmt;
use core::str::FromStr;

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 50051;

/// Address of one greeter server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerAddr {
    host: String,
    port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the plaintext URI used to build a transport endpoint.
    pub fn endpoint_uri(&self) -> String {
        format!("http://{self}")
    }
}

impl Default for ServerAddr {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, port) = rest
                .split_once("]:")
                .ok_or_else(|| invalid("expected `[host]:port`"))?;
            (host, port)
        } else {
            s.rsplit_once(':')
                .ok_or_else(|| invalid("expected `host:port`"))?
        };

        if host.is_empty() {
            return Err(invalid("host must not be empty"));
        }
        if !s.starts_with('[') && host.contains(':') {
            return Err(invalid("IPv6 hosts must be wrapped in brackets"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| invalid(&format!("bad port: {e}")))?;
        if port == 0 {
            return Err(invalid("port must be greater than 0"));
        }

        Ok(Self::new(host, port))
    }
}
