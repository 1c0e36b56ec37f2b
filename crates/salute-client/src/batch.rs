//! Concurrent, failure-isolated batches of greeter calls.
//!
//! A [`BatchRunner`] opens one connection, launches one task per input name
//! (all sharing that connection), waits for every task to settle and closes
//! the connection again. A failing or panicking task only affects its own
//! entry: siblings keep running and the batch still returns a result for
//! every input. Dropping an unfinished batch aborts its in-flight calls and
//! releases the connection.
//!
//! ## Duplicate names
//!
//! Every occurrence of a name runs as its own call and keeps its own entry in
//! [`BatchResults`]. When results are collapsed to a map
//! ([`BatchResults::into_map`], [`BatchResults::get`]) the last occurrence in
//! input order wins, regardless of which call finished last.

use crate::client::{Caller, Client};
use crate::config::ClientConfig;
use crate::transport::{Connector, GrpcConnector};
use salute_core::{Error, Result, types::ServerAddr};
use std::collections::HashMap;
use tokio::task::{JoinError, JoinSet};

/// Outcome of one input of a batch.
#[derive(Debug)]
pub struct BatchEntry<V> {
    /// Position of the name in the input.
    pub index: usize,
    pub name: String,
    pub outcome: Result<V>,
}

/// Per-name outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchResults<V> {
    entries: Vec<BatchEntry<V>>,
}

impl<V> BatchResults<V> {
    fn new(entries: Vec<BatchEntry<V>>) -> Self {
        Self { entries }
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in input order.
    pub fn iter(&self) -> impl Iterator<Item = &BatchEntry<V>> {
        self.entries.iter()
    }

    /// Outcome for `name`; the last occurrence wins for duplicate names.
    pub fn get(&self, name: &str) -> Option<&Result<V>> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.outcome)
    }

    /// Number of entries whose call succeeded.
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_ok()).count()
    }

    /// Entries whose call failed, in input order.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().err().map(|err| (e.name.as_str(), err)))
    }

    /// Collapses the entries into one outcome per distinct name.
    pub fn into_map(self) -> HashMap<String, Result<V>> {
        // Later inserts overwrite earlier ones: last in input order wins.
        self.entries
            .into_iter()
            .map(|entry| (entry.name, entry.outcome))
            .collect()
    }
}

impl<V: ErrorMarker> BatchResults<V> {
    /// Collapses the entries into one value per distinct name, replacing each
    /// failure with its error marker.
    pub fn into_marked(self) -> HashMap<String, V> {
        self.into_map()
            .into_iter()
            .map(|(name, outcome)| {
                let value = outcome.unwrap_or_else(|err| V::error_marker(&err));
                (name, value)
            })
            .collect()
    }
}

impl<V> IntoIterator for BatchResults<V> {
    type Item = BatchEntry<V>;
    type IntoIter = std::vec::IntoIter<BatchEntry<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Value stored in place of a result when a failure is flattened into a
/// plain map.
pub trait ErrorMarker {
    fn error_marker(err: &Error) -> Self;
}

impl ErrorMarker for String {
    fn error_marker(err: &Error) -> Self {
        format!("Error: {err}")
    }
}

impl ErrorMarker for Vec<String> {
    fn error_marker(err: &Error) -> Self {
        vec![String::error_marker(err)]
    }
}

/// Runs batches of calls against one server.
#[derive(Clone, Debug)]
pub struct BatchRunner<C: Connector = GrpcConnector> {
    addr: ServerAddr,
    connector: C,
}

impl BatchRunner<GrpcConnector> {
    /// Runner for `addr` with default gRPC settings.
    pub fn new(addr: ServerAddr) -> Self {
        Self::with_connector(addr, GrpcConnector::new())
    }

    /// Runner built from validated client settings.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_connector(config.addr.clone(), GrpcConnector::from_config(config))
    }
}

impl<C: Connector> BatchRunner<C> {
    pub const fn with_connector(addr: ServerAddr, connector: C) -> Self {
        Self { addr, connector }
    }

    /// Sends one `SayHello` per name, concurrently.
    ///
    /// # Errors
    ///
    /// Only fails if the connection cannot be opened. Call failures are
    /// recorded per entry.
    pub async fn run_unary<S: AsRef<str>>(&self, names: &[S]) -> Result<BatchResults<String>> {
        self.run(names, |caller, name| async move { caller.say_hello(&name).await })
            .await
    }

    /// Drains one `SayHelloStream` per name, concurrently.
    ///
    /// # Errors
    ///
    /// Only fails if the connection cannot be opened. Call failures are
    /// recorded per entry.
    pub async fn run_stream<S: AsRef<str>>(&self, names: &[S]) -> Result<BatchResults<Vec<String>>> {
        self.run(names, |caller, name| async move {
            caller.collect_all_stream_messages(&name).await
        })
        .await
    }

    async fn run<S, V, F, Fut>(&self, names: &[S], call: F) -> Result<BatchResults<V>>
    where
        S: AsRef<str>,
        V: Send + 'static,
        F: Fn(Caller<C::Transport>, String) -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if names.is_empty() {
            return Ok(BatchResults::new(Vec::new()));
        }

        let mut client = Client::with_connector(self.addr.clone(), self.connector.clone());
        client.connect().await?;
        let caller = client.caller()?;

        tracing::info!(server = %self.addr, calls = names.len(), "Running batch");

        // Every task is spawned before any is awaited. Dropping the set (the
        // batch future was cancelled) aborts whatever is still running.
        let mut tasks = JoinSet::new();
        let mut index_of = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let handle = tasks.spawn(call(caller.clone(), name.as_ref().to_owned()));
            index_of.insert(handle.id(), index);
        }
        drop(caller);

        // Gather, not fail-fast: each task settles on its own.
        let mut settled: Vec<Option<Result<V>>> = names.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (e.id(), Err(task_failed(&e))),
            };
            if let Some(&index) = index_of.get(&id) {
                settled[index] = Some(outcome);
            }
        }

        let entries: Vec<_> = names
            .iter()
            .zip(settled)
            .enumerate()
            .map(|(index, (name, outcome))| {
                let name = name.as_ref().to_owned();
                let outcome = outcome.unwrap_or_else(|| {
                    Err(Error::Unexpected {
                        context: "batch task vanished".to_string(),
                    })
                });
                if let Err(e) = &outcome {
                    tracing::warn!(server = %self.addr, index, name = %name, "Batch call failed: {e}");
                }
                BatchEntry {
                    index,
                    name,
                    outcome,
                }
            })
            .collect();

        client.close().await;

        let results = BatchResults::new(entries);
        tracing::info!(
            server = %self.addr,
            succeeded = results.succeeded(),
            failed = results.len() - results.succeeded(),
            "Batch finished"
        );
        Ok(results)
    }
}

fn task_failed(err: &JoinError) -> Error {
    let context = if err.is_panic() {
        "batch call panicked".to_string()
    } else {
        "batch call was cancelled".to_string()
    };
    Error::Unexpected { context }
}

/// Sends `SayHello` for every name to `addr` over one gRPC connection.
///
/// # Errors
///
/// Only fails if the connection cannot be opened.
pub async fn process_unary_batch<S: AsRef<str>>(
    names: &[S],
    addr: ServerAddr,
) -> Result<BatchResults<String>> {
    BatchRunner::new(addr).run_unary(names).await
}

/// Collects `SayHelloStream` for every name from `addr` over one gRPC
/// connection.
///
/// # Errors
///
/// Only fails if the connection cannot be opened.
pub async fn process_stream_batch<S: AsRef<str>>(
    names: &[S],
    addr: ServerAddr,
) -> Result<BatchResults<Vec<String>>> {
    BatchRunner::new(addr).run_stream(names).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, Script};
    use core::time::Duration;
    use std::collections::HashSet;

    fn runner(script: Script) -> (BatchRunner<MockConnector>, MockConnector) {
        let connector = MockConnector::new(script);
        (
            BatchRunner::with_connector(ServerAddr::default(), connector.clone()),
            connector,
        )
    }

    #[tokio::test]
    async fn unary_batch_maps_every_name() {
        let (runner, connector) = runner(Script::default());

        let results = runner.run_unary(&["Alice", "Bob"]).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results.succeeded(), 2);
        let map = results.into_marked();
        assert_eq!(map.len(), 2);
        assert_eq!(map["Alice"], "Hello, Alice!");
        assert_eq!(map["Bob"], "Hello, Bob!");
        assert_eq!(connector.unary_calls(), 2);
    }

    #[tokio::test]
    async fn stream_batch_keeps_message_order() {
        let (runner, _) = runner(Script::default());

        let map = runner.run_stream(&["Alice", "Bob"]).await.unwrap().into_marked();

        assert_eq!(map["Alice"], ["Hi Alice", "Hi again Alice", "Bye Alice"]);
        assert_eq!(map["Bob"], ["Hi Bob", "Hi again Bob", "Bye Bob"]);
    }

    #[tokio::test]
    async fn failing_call_is_isolated() {
        let (runner, _) = runner(Script::default().failing("Mallory"));

        let results = runner.run_unary(&["Alice", "Mallory", "Bob"]).await.unwrap();

        assert_eq!(results.succeeded(), 2);
        let failed: Vec<_> = results.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "Mallory");
        assert_eq!(failed[0].1.code(), Some(tonic::Code::Unavailable));

        let map = results.into_marked();
        assert_eq!(map["Alice"], "Hello, Alice!");
        assert_eq!(map["Bob"], "Hello, Bob!");
        assert!(map["Mallory"].starts_with("Error: "));
        assert!(map["Mallory"].contains("greeter down for Mallory"));
    }

    #[tokio::test]
    async fn failing_stream_gets_single_marker() {
        let (runner, _) = runner(Script::default().failing("Mallory"));

        let map = runner.run_stream(&["Alice", "Mallory"]).await.unwrap().into_marked();

        assert_eq!(map["Alice"].len(), 3);
        assert_eq!(map["Mallory"].len(), 1);
        assert!(map["Mallory"][0].starts_with("Error: "));
    }

    #[tokio::test]
    async fn panicking_call_becomes_unexpected_error() {
        let (runner, connector) = runner(Script::default().panicking("Trent"));

        let results = runner.run_unary(&["Trent", "Alice"]).await.unwrap();

        assert!(matches!(results.get("Trent"), Some(Err(Error::Unexpected { .. }))));
        assert_eq!(results.get("Alice").unwrap().as_ref().unwrap(), "Hello, Alice!");
        assert_eq!(connector.open(), 0);
    }

    #[tokio::test]
    async fn connection_is_closed_after_batch_with_failures() {
        let (runner, connector) = runner(Script::default().failing("Mallory"));

        runner.run_unary(&["Mallory", "Alice"]).await.unwrap();
        runner.run_stream(&["Mallory", "Alice"]).await.unwrap();

        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.closes(), 2);
        assert_eq!(connector.open(), 0);
    }

    #[tokio::test]
    async fn connect_failure_fails_the_batch() {
        let (runner, _) = runner(Script {
            refuse_connect: true,
            ..Script::default()
        });

        let err = runner.run_unary(&["Alice"]).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test]
    async fn empty_batch_does_not_connect() {
        let (runner, connector) = runner(Script::default());
        let results = runner.run_unary::<&str>(&[]).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_run_concurrently() {
        let (runner, connector) = runner(Script {
            delay: Duration::from_millis(100),
            ..Script::default()
        });
        let names: Vec<String> = (0..16).map(|i| format!("user-{i}")).collect();

        let start = tokio::time::Instant::now();
        let results = runner.run_unary(&names).await.unwrap();

        assert_eq!(results.succeeded(), 16);
        assert_eq!(connector.max_inflight(), 16);
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_batch_aborts_in_flight_calls() {
        let (runner, connector) = runner(Script {
            delay: Duration::from_secs(1),
            ..Script::default()
        });

        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), runner.run_unary(&["Alice", "Bob"]))
                .await;
        assert!(cancelled.is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(connector.unary_calls(), 2);
        assert_eq!(connector.inflight(), 0);
        assert_eq!(connector.unary_completed(), 0);
    }

    #[tokio::test]
    async fn key_set_equals_deduplicated_input() {
        let (runner, _) = runner(Script::default());
        let names = ["Alice", "Bob", "Alice", "Carol", "Bob"];

        let results = runner.run_unary(&names).await.unwrap();
        assert_eq!(results.len(), 5);

        let keys: HashSet<String> = results.into_map().into_keys().collect();
        let expected: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn duplicate_names_keep_last_occurrence_in_input_order() {
        let (runner, _) = runner(Script::default());

        let results = runner.run_unary(&["Alice", "Alice"]).await.unwrap();

        let indices: Vec<_> = results.iter().map(|e| e.index).collect();
        assert_eq!(indices, [0, 1]);
        let entries: Vec<_> = results.into_iter().collect();
        assert!(entries.iter().all(|e| e.name == "Alice"));
    }

    #[test]
    fn last_occurrence_wins_when_collapsing() {
        let results = BatchResults::new(vec![
            BatchEntry {
                index: 0,
                name: "Alice".to_string(),
                outcome: Err(Error::NotConnected),
            },
            BatchEntry {
                index: 1,
                name: "Alice".to_string(),
                outcome: Ok("second".to_string()),
            },
        ]);

        assert_eq!(results.get("Alice").unwrap().as_ref().unwrap(), "second");
        assert_eq!(results.into_marked()["Alice"], "second");
    }
}
