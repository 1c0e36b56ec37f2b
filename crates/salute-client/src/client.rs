//! Connection lifecycle and the three greeter calls.
//!
//! A [`Client`] owns at most one open connection. It starts disconnected;
//! [`Client::connect`] opens the connection and [`Client::close`] releases it.
//! Both are idempotent. Calls never connect implicitly: issuing one on a
//! disconnected client fails with [`Error::NotConnected`].
//!
//! Calls are made through a [`Caller`], an owned handle on the open
//! connection. The client's own call methods borrow one internally; tasks that
//! must own their call (batch fan-out, stream consumers) take a clone via
//! [`Client::caller`]. Every caller handed out shares the client's connection
//! state: once the client is closed (or dropped), new calls on any of them fail
//! with [`Error::NotConnected`], pending unary calls are abandoned and open
//! streams end with that error at the next message.

use crate::config::ClientConfig;
use crate::transport::{Connector, GrpcConnector, Transport};
use core::pin::Pin;
use futures::{Stream, StreamExt, TryStreamExt, stream};
use salute_core::{Error, Result, proto::HelloRequest, types::ServerAddr};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Lazily produced greetings from one `SayHelloStream` call.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Greeter client bound to one server address.
pub struct Client<C: Connector = GrpcConnector> {
    addr: ServerAddr,
    connector: C,
    // Present iff connected.
    caller: Option<Caller<C::Transport>>,
}

impl Client<GrpcConnector> {
    /// Creates a disconnected gRPC client for `addr` with default settings.
    pub fn new(addr: ServerAddr) -> Self {
        Self::with_connector(addr, GrpcConnector::new())
    }

    /// Creates a disconnected gRPC client from validated settings.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_connector(config.addr.clone(), GrpcConnector::from_config(config))
    }
}

impl<C: Connector> Client<C> {
    /// Creates a disconnected client that opens connections with `connector`.
    pub const fn with_connector(addr: ServerAddr, connector: C) -> Self {
        Self {
            addr,
            connector,
            caller: None,
        }
    }

    /// Address this client connects to.
    pub const fn addr(&self) -> &ServerAddr {
        &self.addr
    }

    /// Whether a connection is currently open.
    pub const fn is_connected(&self) -> bool {
        self.caller.is_some()
    }

    /// Opens the connection. Does nothing if the client is already connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the server cannot be reached. The
    /// failure is logged before it is returned.
    pub async fn connect(&mut self) -> Result<()> {
        if self.caller.is_some() {
            tracing::debug!(server = %self.addr, "Already connected");
            return Ok(());
        }

        match self.connector.connect(&self.addr).await {
            Ok(transport) => {
                tracing::info!(server = %self.addr, "Connected to gRPC server");
                self.caller = Some(Caller {
                    addr: self.addr.clone(),
                    transport,
                    closed: CancellationToken::new(),
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!(server = %self.addr, "Failed to connect to gRPC server: {e}");
                Err(e)
            }
        }
    }

    /// Closes the connection. Safe to call any number of times, including on a
    /// client that never connected.
    ///
    /// Callers taken from this connection stop working as well.
    pub async fn close(&mut self) {
        if let Some(caller) = self.caller.take() {
            caller.closed.cancel();
            caller.transport.close().await;
            tracing::info!(server = %self.addr, "gRPC connection closed");
        }
    }

    /// Returns an owned handle for issuing calls on the open connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the client is not connected.
    pub fn caller(&self) -> Result<Caller<C::Transport>> {
        self.connected().cloned()
    }

    /// See [`Caller::say_hello`].
    pub async fn say_hello(&self, name: &str) -> Result<String> {
        self.connected()?.say_hello(name).await
    }

    /// See [`Caller::say_hello_stream`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] up front; call failures surface from
    /// the stream.
    pub fn say_hello_stream(&self, name: &str) -> Result<MessageStream> {
        Ok(self.connected()?.say_hello_stream(name))
    }

    /// See [`Caller::collect_all_stream_messages`].
    pub async fn collect_all_stream_messages(&self, name: &str) -> Result<Vec<String>> {
        self.connected()?.collect_all_stream_messages(name).await
    }

    fn connected(&self) -> Result<&Caller<C::Transport>> {
        self.caller.as_ref().ok_or(Error::NotConnected)
    }
}

impl<C: Connector> Drop for Client<C> {
    fn drop(&mut self) {
        if let Some(caller) = &self.caller {
            caller.closed.cancel();
        }
    }
}

/// Connects a default gRPC client to `addr`.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the server cannot be reached.
pub async fn create_client(addr: ServerAddr) -> Result<Client> {
    let mut client = Client::new(addr);
    client.connect().await?;
    Ok(client)
}

/// Owned handle on an open connection.
///
/// Cloning is cheap and every clone issues calls over the same connection.
/// A caller is only usable while the [`Client`] it came from stays connected.
#[derive(Clone, Debug)]
pub struct Caller<T> {
    addr: ServerAddr,
    transport: T,
    // Cancelled when the owning client closes.
    closed: CancellationToken,
}

impl<T: Transport> Caller<T> {
    /// Address of the server this handle calls.
    pub const fn addr(&self) -> &ServerAddr {
        &self.addr
    }

    /// Whether the owning client has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Sends one greeting request and returns the reply's message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] with the call's status code and details. The
    /// failure is logged and never retried. Returns [`Error::NotConnected`]
    /// if the connection is closed before the reply arrives.
    pub async fn say_hello(&self, name: &str) -> Result<String> {
        if self.is_closed() {
            return Err(Error::NotConnected);
        }

        let request = HelloRequest {
            name: name.to_owned(),
        };

        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(Error::NotConnected),
            reply = self.transport.say_hello(request) => match reply {
                Ok(reply) => Ok(reply.message),
                Err(status) => Err(call_failed(&self.addr, status)),
            },
        }
    }

    /// Opens a streaming greeting call.
    ///
    /// Nothing is sent until the stream is first polled. Messages are yielded
    /// one by one as the server sends them, in server order. A failure is
    /// yielded as an error item at the point it happens and ends the stream;
    /// messages already yielded stay valid. Closing the connection ends the
    /// stream with [`Error::NotConnected`].
    pub fn say_hello_stream(&self, name: &str) -> MessageStream {
        let request = HelloRequest {
            name: name.to_owned(),
        };
        let transport = self.transport.clone();
        let addr = self.addr.clone();
        let closed = self.closed.clone();

        let replies = stream::once(async move { transport.say_hello_stream(request).await })
            .try_flatten()
            .map(move |item| {
                item.map(|reply| reply.message)
                    .map_err(|status| call_failed(&addr, status))
            })
            .boxed();

        stream::unfold(Some(replies), move |state| {
            let closed = closed.clone();
            async move {
                let mut replies = state?;
                let item = tokio::select! {
                    biased;
                    () = closed.cancelled() => Err(Error::NotConnected),
                    item = replies.next() => item?,
                };
                // An error is the last item.
                let next = item.is_ok().then_some(replies);
                Some((item, next))
            }
        })
        .boxed()
    }

    /// Drains a streaming call into its messages, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns the first failure; messages received before it are discarded.
    pub async fn collect_all_stream_messages(&self, name: &str) -> Result<Vec<String>> {
        self.say_hello_stream(name).try_collect().await
    }
}

fn call_failed(addr: &ServerAddr, status: Status) -> Error {
    tracing::error!(
        server = %addr,
        "gRPC error: {:?}, details: {}",
        status.code(),
        status.message()
    );
    Error::from(status)
}
