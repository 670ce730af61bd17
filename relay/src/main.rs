use anyhow::Context;
use clap::Parser;
use rankedturbo_core::rating::Rating;
use rankedturbo_relay::{
    stdio::{Input, Output, SharedRoster, StdioHost, StdioPresentation},
    Session, SessionConfig,
};
use rankedturbo_store::{HttpStore, StoreClient};
use std::time::Duration;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    spawn,
    sync::mpsc,
};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Settles Ranked Turbo ratings for an engine speaking JSON lines over stdin/stdout.
#[derive(Parser)]
struct Options {
    /// Base URL of the rating store.
    #[clap(short, long, env = "RANKEDTURBO_STORE_URL")]
    store_url: Url,

    /// Rating given to players with no stored rating.
    #[clap(short, long, env = "RANKEDTURBO_BASELINE", default_value = "500")]
    baseline: Rating,

    /// Seconds between a winner being decided and ratings being settled.
    #[clap(long, env = "RANKEDTURBO_SETTLE_DELAY", default_value = "2.0", value_parser = parse_seconds)]
    settle_delay: Duration,

    /// Seconds between settling and reading ratings back from the store.
    #[clap(long, env = "RANKEDTURBO_VERIFY_DELAY", default_value = "0.2", value_parser = parse_seconds)]
    verify_delay: Duration,

    /// Seconds between the match starting and players being sent their rating.
    #[clap(long, env = "RANKEDTURBO_START_PUSH_DELAY", default_value = "0.5", value_parser = parse_seconds)]
    start_push_delay: Duration,
}

impl Options {
    fn config(&self) -> SessionConfig {
        SessionConfig {
            settle_delay: self.settle_delay,
            verify_delay: self.verify_delay,
            start_push_delay: self.start_push_delay,
        }
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|err| format!("{err}"))?;
    Duration::try_from_secs_f64(secs).map_err(|err| format!("{err}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let opt = Options::parse();

    let store = StoreClient::new(HttpStore::new(opt.store_url.clone())?).with_baseline(opt.baseline);
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let writer = spawn(write_output(output_rx));

    let (input_tx, input_rx) = mpsc::channel(64);
    let reader = spawn(read_input(input_tx));

    let mut session = Session::new(
        StdioHost::new(SharedRoster::default(), output_tx.clone()),
        StdioPresentation::new(output_tx),
        store,
        opt.config(),
    );
    tracing::info!(store = %opt.store_url, config = ?opt.config(), "relay started");
    session.run_with(input_rx, |session, input| input.apply(session)).await;

    // Dropping the session closes the output channel, letting the writer drain and exit.
    drop(session);
    reader.await??;
    writer.await??;
    Ok(())
}

async fn read_input(inputs: mpsc::Sender<Input>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Input::parse(line) {
            Ok(input) => {
                if inputs.send(input).await.is_err() {
                    tracing::warn!("session stopped, discarding input");
                    break;
                }
            }
            Err(err) => tracing::warn!("skipping input: {err:#}"),
        }
    }
    tracing::info!("input closed");
    Ok(())
}

async fn write_output(mut output: mpsc::UnboundedReceiver<Output>) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    while let Some(message) = output.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }
    Ok(())
}
