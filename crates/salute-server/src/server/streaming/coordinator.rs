use core::time::Duration;
use salute_core::{Error, proto::HelloReply};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Greetings sent, in order, for one `SayHelloStream` call.
pub fn stream_greetings(name: &str) -> [String; 3] {
    [
        format!("Hi {name}"),
        format!("Hi again {name}"),
        format!("Bye {name}"),
    ]
}

/// Sends the greetings for `name` into the response stream channel.
///
/// # Arguments
///
/// - `name`: The validated name from the request.
/// - `resp_tx`: Channel used to stream replies back to the client.
/// - `interval`: Delay before every message after the first.
/// - `shutdown`: Cancelled when the service shuts down.
///
/// # Behavior
///
/// - Messages are sent in order; the stream ends after the last one.
/// - On shutdown the client receives `UNAVAILABLE` and the feeder stops.
/// - If the client disconnects mid-stream the feeder returns a
///   [`Error::ChannelError`] without sending anything else.
pub async fn feed_greetings(
    name: String,
    resp_tx: mpsc::Sender<Result<HelloReply, Status>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> salute_core::Result<()> {
    for (i, message) in stream_greetings(&name).into_iter().enumerate() {
        if i > 0 && !interval.is_zero() {
            tokio::select! {
                () = shutdown.cancelled() => {
                    // Best effort: the client may already be gone.
                    if let Err(e) = resp_tx.send(Err(Error::ServiceShutdown.into())).await {
                        tracing::debug!("Failed to forward shutdown: {e}");
                    }
                    return Err(Error::ServiceShutdown);
                }
                () = tokio::time::sleep(interval) => {}
            }
        }

        if resp_tx.send(Ok(HelloReply { message })).await.is_err() {
            return Err(Error::ChannelError {
                context: format!("Client hung up after {i} greetings"),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_three_greetings_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        feed_greetings("Alice".to_string(), tx, Duration::ZERO, CancellationToken::new())
            .await
            .unwrap();

        let mut messages = Vec::new();
        while let Some(reply) = rx.recv().await {
            messages.push(reply.unwrap().message);
        }
        assert_eq!(messages, ["Hi Alice", "Hi again Alice", "Bye Alice"]);
    }

    #[tokio::test]
    async fn stops_when_client_hangs_up() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = feed_greetings("Bob".to_string(), tx, Duration::ZERO, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChannelError { .. }));
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_paced_stream() {
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let err = feed_greetings("Carol".to_string(), tx, Duration::from_secs(60), shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceShutdown));

        assert_eq!(rx.recv().await.unwrap().unwrap().message, "Hi Carol");
        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert!(rx.recv().await.is_none());
    }
}
