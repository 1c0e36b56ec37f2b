//! In-memory [`Connector`] for unit tests.
//!
//! Replies follow the greeter's contract (`Hello, {name}!` and a
//! `Hi` / `Hi again` / `Bye` stream) unless the [`Script`] says otherwise.
//! Counters record connects, closes and calls so tests can check lifecycle
//! and concurrency.

use crate::transport::{Connector, ReplyStream, Transport};
use core::time::Duration;
use futures::{StreamExt, stream};
use portable_atomic::{AtomicUsize, Ordering};
use salute_core::{
    Error, Result,
    proto::{HelloReply, HelloRequest},
    types::ServerAddr,
};
use std::sync::Arc;
use tonic::Status;

#[derive(Clone, Debug)]
pub struct Script {
    pub refuse_connect: bool,
    /// Names whose calls fail with `UNAVAILABLE`.
    pub failing: Vec<String>,
    /// Names whose calls panic.
    pub panicking: Vec<String>,
    pub stream_len: usize,
    /// Ends streams with `ABORTED` after this many messages.
    pub stream_fail_after: Option<usize>,
    /// Applied before every unary reply and every stream message.
    pub delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            refuse_connect: false,
            failing: Vec::new(),
            panicking: Vec::new(),
            stream_len: 3,
            stream_fail_after: None,
            delay: Duration::ZERO,
        }
    }
}

impl Script {
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn panicking(mut self, name: &str) -> Self {
        self.panicking.push(name.to_string());
        self
    }

    fn check(&self, name: &str) -> core::result::Result<(), Status> {
        if self.panicking.iter().any(|n| n == name) {
            panic!("scripted panic for {name}");
        }
        if self.failing.iter().any(|n| n == name) {
            return Err(Status::unavailable(format!("greeter down for {name}")));
        }
        Ok(())
    }
}

pub fn greeting(name: &str, index: usize, len: usize) -> String {
    if index == 0 {
        format!("Hi {name}")
    } else if index + 1 == len {
        format!("Bye {name}")
    } else {
        format!("Hi again {name}")
    }
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    closes: AtomicUsize,
    open: AtomicUsize,
    unary_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    unary_completed: AtomicUsize,
    inflight: AtomicUsize,
    max_inflight: AtomicUsize,
}

/// Counts a unary call as in flight until its future finishes or is dropped.
struct Inflight(Arc<Counters>);

impl Inflight {
    fn enter(counters: Arc<Counters>) -> Self {
        let now = counters.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_inflight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for Inflight {
    fn drop(&mut self) {
        self.0.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug)]
pub struct MockConnector {
    script: Arc<Script>,
    counters: Arc<Counters>,
}

impl MockConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            counters: Arc::default(),
        }
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed.
    pub fn open(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn unary_calls(&self) -> usize {
        self.counters.unary_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.counters.stream_calls.load(Ordering::SeqCst)
    }

    /// Unary calls that ran to the end of their scripted delay.
    pub fn unary_completed(&self) -> usize {
        self.counters.unary_completed.load(Ordering::SeqCst)
    }

    /// Unary calls currently in flight.
    pub fn inflight(&self) -> usize {
        self.counters.inflight.load(Ordering::SeqCst)
    }

    /// Highest number of unary calls observed in flight at once.
    pub fn max_inflight(&self) -> usize {
        self.counters.max_inflight.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, addr: &ServerAddr) -> Result<MockTransport> {
        if self.script.refuse_connect {
            return Err(Error::Connection {
                address: addr.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        Ok(MockTransport {
            script: Arc::clone(&self.script),
            counters: Arc::clone(&self.counters),
        })
    }
}

#[derive(Clone, Debug)]
pub struct MockTransport {
    script: Arc<Script>,
    counters: Arc<Counters>,
}

impl Transport for MockTransport {
    fn say_hello(
        &self,
        request: HelloRequest,
    ) -> impl Future<Output = core::result::Result<HelloReply, Status>> + Send {
        let script = Arc::clone(&self.script);
        let counters = Arc::clone(&self.counters);
        counters.unary_calls.fetch_add(1, Ordering::SeqCst);

        async move {
            let inflight = Inflight::enter(Arc::clone(&counters));
            if !script.delay.is_zero() {
                tokio::time::sleep(script.delay).await;
            }
            counters.unary_completed.fetch_add(1, Ordering::SeqCst);
            drop(inflight);

            script.check(&request.name)?;
            Ok(HelloReply {
                message: format!("Hello, {}!", request.name),
            })
        }
    }

    fn say_hello_stream(
        &self,
        request: HelloRequest,
    ) -> impl Future<Output = core::result::Result<ReplyStream, Status>> + Send {
        let script = Arc::clone(&self.script);
        self.counters.stream_calls.fetch_add(1, Ordering::SeqCst);

        async move {
            script.check(&request.name)?;

            let len = script.stream_len;
            let sent = script.stream_fail_after.map_or(len, |n| n.min(len));
            let mut items: Vec<core::result::Result<HelloReply, Status>> = (0..sent)
                .map(|i| {
                    Ok(HelloReply {
                        message: greeting(&request.name, i, len),
                    })
                })
                .collect();
            if script.stream_fail_after.is_some() {
                items.push(Err(Status::aborted("stream reset by peer")));
            }

            let delay = script.delay;
            let replies = stream::iter(items).then(move |item| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                item
            });
            Ok(Box::pin(replies) as ReplyStream)
        }
    }

    async fn close(self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}
