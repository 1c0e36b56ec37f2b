use super::{Connector, ReplyStream, Transport};
use crate::config::{ClientConfig, Compression};
use core::time::Duration;
use salute_core::{
    Error, Result,
    proto::{HelloReply, HelloRequest, greeter_client::GreeterClient},
    types::ServerAddr,
};
use tonic::{
    Request, Status,
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

/// Opens plaintext HTTP/2 channels with `tonic`.
#[derive(Clone, Debug)]
pub struct GrpcConnector {
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
    compression: Compression,
}

impl GrpcConnector {
    /// Connector with default timeouts and no compression.
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::default())
    }

    /// Connector using the timeouts and compression in `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            request_timeout: config.request_timeout,
            compression: config.compression,
        }
    }
}

impl Default for GrpcConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for GrpcConnector {
    type Transport = GrpcTransport;

    async fn connect(&self, addr: &ServerAddr) -> Result<GrpcTransport> {
        let failed = |reason: String| Error::Connection {
            address: addr.to_string(),
            reason,
        };

        let mut endpoint = Endpoint::from_shared(addr.endpoint_uri())
            .map_err(|e| failed(e.to_string()))?
            .connect_timeout(self.connect_timeout);
        if let Some(request_timeout) = self.request_timeout {
            endpoint = endpoint.timeout(request_timeout);
        }

        let channel = endpoint.connect().await.map_err(|e| failed(e.to_string()))?;

        let mut client = GreeterClient::new(channel);
        if let Some(encoding) = Option::<CompressionEncoding>::from(self.compression) {
            client = client
                .send_compressed(encoding)
                .accept_compressed(encoding);
        }

        Ok(GrpcTransport { client })
    }
}

/// A `tonic` channel bound to the generated `Greeter` client.
///
/// Clones share the HTTP/2 connection; each call runs on its own stream.
#[derive(Clone, Debug)]
pub struct GrpcTransport {
    client: GreeterClient<Channel>,
}

impl Transport for GrpcTransport {
    fn say_hello(
        &self,
        request: HelloRequest,
    ) -> impl Future<Output = core::result::Result<HelloReply, Status>> + Send {
        let mut client = self.client.clone();
        async move {
            client
                .say_hello(Request::new(request))
                .await
                .map(tonic::Response::into_inner)
        }
    }

    fn say_hello_stream(
        &self,
        request: HelloRequest,
    ) -> impl Future<Output = core::result::Result<ReplyStream, Status>> + Send {
        let mut client = self.client.clone();
        async move {
            let streaming = client
                .say_hello_stream(Request::new(request))
                .await?
                .into_inner();
            Ok(Box::pin(streaming) as ReplyStream)
        }
    }

    async fn close(self) {
        // The channel shuts down once the last clone is dropped.
        drop(self.client);
    }
}
