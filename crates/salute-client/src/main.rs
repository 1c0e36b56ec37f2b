use clap::{Parser, Subcommand};
use core::time::Duration;
use futures::StreamExt;
use salute_client::{
    BatchRunner, Client, ClientConfig, ConnectionArgs, StreamConsumer, StreamOutcome,
    telemetry::init_tracing,
};

/// Command-line client for the greeter service.
#[derive(Parser, Debug)]
#[command(name = "salute", version, about = "Talk to a gRPC greeter")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Default log filter when `RUST_LOG` is not set.
    ///
    /// Environment variable: `SALUTE_LOG_LEVEL`
    #[arg(long, env = "SALUTE_LOG_LEVEL", default_value_t = String::from("warn"), global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Call(Call),
    /// Greet many names concurrently over one connection.
    Batch {
        #[arg(required = true)]
        names: Vec<String>,
        /// Collect greeting streams instead of single greetings.
        #[arg(long)]
        stream: bool,
    },
}

/// Commands that run over one client connection.
#[derive(Subcommand, Debug)]
enum Call {
    /// Send one greeting and print the reply.
    Hello { name: String },
    /// Print streamed greetings as they arrive.
    Stream { name: String },
    /// Collect a whole greeting stream, then print it.
    Collect { name: String },
    /// Consume a greeting stream through a callback, optionally stopping early.
    Watch {
        name: String,
        /// Stop after this many messages.
        #[arg(long)]
        stop_after: Option<usize>,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    let config = ClientConfig::try_from(cli.connection)?;

    match cli.command {
        Command::Batch { names, stream } => run_batch(&config, &names, stream).await,
        Command::Call(call) => {
            let mut client = Client::from_config(&config);
            client.connect().await?;
            let result = run_call(&client, call).await;
            client.close().await;
            result
        }
    }
}

async fn run_call(client: &Client, call: Call) -> anyhow::Result<()> {
    match call {
        Call::Hello { name } => {
            println!("{}", client.say_hello(&name).await?);
        }
        Call::Stream { name } => {
            let mut stream = client.say_hello_stream(&name)?;
            while let Some(message) = stream.next().await {
                println!("{}", message?);
            }
        }
        Call::Collect { name } => {
            let messages = client.collect_all_stream_messages(&name).await?;
            println!("{messages:?}");
        }
        Call::Watch {
            name,
            stop_after,
            timeout_secs,
        } => {
            let mut consumer = StreamConsumer::new(client)?;
            let handle = consumer.stop_handle();
            let mut seen = 0;

            let run = consumer.start_with_sync_callback(&name, |message| {
                println!("{message}");
                seen += 1;
                if stop_after.is_some_and(|limit| seen >= limit) {
                    handle.stop();
                }
            });

            match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
                Ok(StreamOutcome::Failed { error, .. }) => return Err(error.into()),
                Ok(outcome) => eprintln!("{} messages ({outcome:?})", outcome.received()),
                Err(_) => eprintln!("gave up after {timeout_secs}s"),
            }
        }
    }
    Ok(())
}

async fn run_batch(config: &ClientConfig, names: &[String], stream: bool) -> anyhow::Result<()> {
    let runner = BatchRunner::from_config(config);

    if stream {
        for entry in runner.run_stream(names).await? {
            match entry.outcome {
                Ok(messages) => println!("{}: {messages:?}", entry.name),
                Err(e) => println!("{}: Error: {e}", entry.name),
            }
        }
    } else {
        for entry in runner.run_unary(names).await? {
            match entry.outcome {
                Ok(message) => println!("{}: {message}", entry.name),
                Err(e) => println!("{}: Error: {e}", entry.name),
            }
        }
    }

    Ok(())
}
