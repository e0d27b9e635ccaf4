//! rebg-watch - follow live trace state from the terminal
//!
//! Subscribes to the selected cells and prints every update as one JSON
//! line on stdout. Logs go to stderr.

use futures::stream::{BoxStream, SelectAll};
use futures::StreamExt;
use rebg_client::SynchronizationContext;
use rebg_protocol::Command;
use rebg_utils::{config_file, init_logging_with_config, LogConfig, LogOutput, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

mod cli;
mod render;

use cli::Args;
use render::field_line;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    let mut log_config = LogConfig::client();
    if let Some(level) = &args.log_level {
        log_config = log_config.with_filter(level.clone());
    }
    if args.log_file {
        log_config = log_config.with_output(LogOutput::Both);
    }
    init_logging_with_config(log_config)?;
    tracing::debug!("CLI args: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("rebg-watch error: {}", e);
            eprintln!("Error: {}", e);
            if e.is_config() {
                eprintln!("Default config location: {}", config_file().display());
            }
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.client_config()?;
    tracing::info!(endpoint = %config.endpoint, "Watching trace backend");

    let ctx = SynchronizationContext::new(&config);

    let mut updates: SelectAll<BoxStream<'static, Value>> = SelectAll::new();
    let decode = args.decode;
    for field in args.selected_fields() {
        updates.push(
            ctx.publish(field)
                .map(move |value| field_line(field, &value, decode))
                .boxed(),
        );
    }
    updates.push(
        ctx.connectivity()
            .map(|connected| json!({ "connected": connected }))
            .boxed(),
    );

    if let Some(idx) = args.registers {
        ctx.enqueue_send(Command::Registers(idx));
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = args.stdin;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }

            update = updates.next() => match update {
                Some(line) => println!("{}", line),
                None => break,
            },

            line = stdin.next_line(), if stdin_open => match line? {
                Some(line) if !line.trim().is_empty() => ctx.enqueue_send(line),
                Some(_) => {}
                None => stdin_open = false,
            },
        }
    }

    ctx.shutdown().await;
    Ok(())
}
