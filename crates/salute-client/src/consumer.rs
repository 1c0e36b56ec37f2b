//! Callback-driven consumption of a streaming call, with cooperative stop.
//!
//! A [`StreamConsumer`] runs one `SayHelloStream` call to completion and
//! hands every message to a callback. A [`StopHandle`] (or
//! [`StreamConsumer::stop`]) asks a running consumer to stop. The request is
//! observed once per received message, before that message is processed: a
//! stop issued while the consumer is waiting on the server takes effect when
//! the next message arrives. Callers that need a hard deadline wrap the
//! consumer's future in `tokio::time::timeout`; dropping the future releases
//! the call and resets the consumer.
//!
//! A consumer is bound to its client's connection. Closing the client fails a
//! running stream at the next message and every later run with
//! [`Error::NotConnected`].
//!
//! Failures are logged and reported through [`StreamOutcome`], never raised.

use crate::client::{Caller, Client};
use crate::transport::{Connector, Transport};
use futures::StreamExt;
use portable_atomic::{AtomicBool, Ordering};
use salute_core::{Error, Result};
use std::sync::Arc;

/// How a consumer run ended.
#[derive(Debug)]
pub enum StreamOutcome {
    /// The server ended the stream; every message was processed.
    Completed { received: usize },
    /// A stop request was observed before the stream ended.
    Stopped { received: usize },
    /// The call failed after `received` messages had been processed.
    Failed { received: usize, error: Error },
}

impl StreamOutcome {
    /// Number of messages handed to the callback.
    pub const fn received(&self) -> usize {
        match self {
            Self::Completed { received }
            | Self::Stopped { received }
            | Self::Failed { received, .. } => *received,
        }
    }

    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Shared running flag of a [`StreamConsumer`].
///
/// Cheap to clone and `Send`, so a timer task or signal handler can stop a
/// consumer running elsewhere.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Requests the consumer to stop at the next message boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn start(&self) {
        self.running.store(true, Ordering::Release);
    }
}

/// Clears the running flag however a run ends, including the run's future
/// being dropped mid-stream.
struct RunGuard<'a>(&'a StopHandle);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Drives streaming calls and dispatches each message to a callback.
///
/// A consumer is reusable: each `start*` call runs one stream. Runs take
/// `&mut self`, so one consumer never runs two streams at once.
pub struct StreamConsumer<T> {
    caller: Caller<T>,
    handle: StopHandle,
}

impl<T: Transport> StreamConsumer<T> {
    /// Binds a consumer to the client's open connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if `client` is not connected.
    pub fn new<C>(client: &Client<C>) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        Ok(Self::from_caller(client.caller()?))
    }

    pub fn from_caller(caller: Caller<T>) -> Self {
        Self {
            caller,
            handle: StopHandle::default(),
        }
    }

    /// Returns a handle that can stop this consumer from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.handle.clone()
    }

    /// Requests the running stream to stop at the next message boundary.
    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Runs a stream for `name`, discarding its messages.
    pub async fn start(&mut self, name: &str) -> StreamOutcome {
        self.start_with_callback(name, |_| async {}).await
    }

    /// Runs a stream for `name`, calling a synchronous `callback` per message.
    pub async fn start_with_sync_callback<F>(&mut self, name: &str, mut callback: F) -> StreamOutcome
    where
        F: FnMut(&str),
    {
        self.start_with_callback(name, move |message| {
            callback(&message);
            futures::future::ready(())
        })
        .await
    }

    /// Runs a stream for `name`, awaiting `callback` for every message.
    ///
    /// The running flag is set on entry and checked before each message is
    /// processed; a message that arrives after a stop request is dropped. The
    /// flag is cleared on every exit path.
    pub async fn start_with_callback<F, Fut>(&mut self, name: &str, mut callback: F) -> StreamOutcome
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.handle.start();
        let _guard = RunGuard(&self.handle);

        let mut stream = self.caller.say_hello_stream(name);
        let mut received = 0;

        loop {
            match stream.next().await {
                None => {
                    tracing::debug!(name, received, "Stream completed");
                    return StreamOutcome::Completed { received };
                }
                Some(Err(error)) => {
                    tracing::error!(name, received, "Error in stream: {error}");
                    return StreamOutcome::Failed { received, error };
                }
                Some(Ok(message)) => {
                    if !self.handle.is_running() {
                        tracing::info!(name, received, "Stream stopped");
                        return StreamOutcome::Stopped { received };
                    }
                    received += 1;
                    callback(message).await;
                }
            }
        }
    }
}
