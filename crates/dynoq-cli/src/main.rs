use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dynoq_core::{
    Command, EngineConfig, Envelope, Event, Message, MessageId, PushError, Queue, QueueEngine,
    RocksDbStorage, SystemClock,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "dynoq", about = "Drive a dynoq work queue from the command line")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config and DYNOQ_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a message
    Push {
        /// Message kind, e.g. "start_stage"
        kind: String,

        /// Message payload (stored as UTF-8 bytes)
        payload: String,

        /// Push an event instead of a command
        #[arg(long)]
        event: bool,

        /// Delay before the message becomes visible, in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },

    /// Lease the next visible message
    Poll,

    /// Acknowledge a leased message
    Ack {
        /// Message id
        id: MessageId,
    },

    /// Give a lease back so the message is redelivered right away
    Abandon {
        /// Message id
        id: MessageId,

        /// Lease token printed by `poll`
        token: MessageId,
    },

    /// Show queue statistics
    Stats,
}

const CONFIG_PATHS: [&str; 2] = ["dynoq.toml", "/etc/dynoq/dynoq.toml"];

fn parse_config(path: &Path) -> Result<EngineConfig, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading {}: {e}", path.display()))?;
    toml::from_str(&contents).map_err(|e| format!("error parsing {}: {e}", path.display()))
}

/// Resolve the engine config: an explicit `--config` path must exist,
/// otherwise the first well-known path found wins, otherwise defaults.
fn load_config(explicit: Option<&Path>) -> Result<EngineConfig, String> {
    if let Some(path) = explicit {
        let config = parse_config(path)?;
        info!(path = %path.display(), "loaded configuration");
        return Ok(config);
    }

    for path in CONFIG_PATHS.iter().map(Path::new) {
        if path.exists() {
            let config = parse_config(path)?;
            info!(path = %path.display(), "loaded configuration");
            return Ok(config);
        }
    }

    info!("no config file found, using defaults");
    Ok(EngineConfig::default())
}

/// `--data-dir` beats `DYNOQ_DATA_DIR`, which beats the config file.
fn resolve_data_dir(flag: Option<String>, env: Option<String>, config: &EngineConfig) -> String {
    flag.or(env)
        .unwrap_or_else(|| config.storage.data_dir.clone())
}

fn open_queue(cli_config: Option<&Path>, data_dir: Option<String>) -> QueueEngine<Envelope> {
    let mut config = load_config(cli_config).unwrap_or_else(|e| fail(&e));
    config.storage.data_dir =
        resolve_data_dir(data_dir, std::env::var("DYNOQ_DATA_DIR").ok(), &config);

    let storage = match RocksDbStorage::open(&config.storage.data_dir) {
        Ok(storage) => Arc::new(storage),
        Err(e) => fail(&format!(
            "cannot open data directory {}: {e}",
            config.storage.data_dir
        )),
    };

    QueueEngine::start(config, storage, Arc::new(SystemClock::new()))
        .unwrap_or_else(|e| fail(&e.to_string()))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn build_message(kind: String, payload: String, event: bool) -> Envelope {
    if event {
        Event::new(kind, payload.into_bytes()).into()
    } else {
        Command::new(kind, payload.into_bytes()).into()
    }
}

fn cmd_push(queue: &QueueEngine<Envelope>, message: Envelope, delay_ms: u64) {
    let id = message.id();
    match queue.push_delayed(message, Duration::from_millis(delay_ms)) {
        Ok(()) if delay_ms == 0 => println!("Pushed {id}"),
        Ok(()) => println!("Pushed {id} (visible in {delay_ms}ms)"),
        Err(PushError::Duplicate { id, state }) => {
            fail(&format!("message {id} already exists ({state})"))
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn cmd_poll(queue: &QueueEngine<Envelope>) {
    match queue.poll() {
        Ok(Some(delivery)) => {
            let message = &delivery.message;
            let kind = match message {
                Envelope::Command(_) => "command",
                Envelope::Event(_) => "event",
            };
            println!("Id:       {}", message.id());
            println!("Type:     {kind}");
            println!("Kind:     {}", message.kind());
            println!("Payload:  {}", String::from_utf8_lossy(message.payload()));
            println!("Attempt:  {}", delivery.attempt);
            println!("Token:    {}", delivery.lease_token);
        }
        Ok(None) => println!("No visible messages."),
        Err(e) => fail(&e.to_string()),
    }
}

fn cmd_ack(queue: &QueueEngine<Envelope>, id: MessageId) {
    match queue.ack_id(id) {
        Ok(()) => println!("Acked {id}"),
        Err(e) => fail(&e.to_string()),
    }
}

fn cmd_abandon(queue: &QueueEngine<Envelope>, id: MessageId, token: MessageId) {
    match queue.abandon_lease(id, token) {
        Ok(()) => println!("Abandoned {id}"),
        Err(e) => fail(&e.to_string()),
    }
}

fn cmd_stats(queue: &QueueEngine<Envelope>) {
    match queue.stats() {
        Ok(stats) => {
            println!("Queue: {}", queue.queue_name());
            println!("  Ready:    {}", stats.ready);
            println!("  Delayed:  {}", stats.delayed);
            println!("  Leased:   {}", stats.leased);
            if let Some(at) = stats.next_delayed_at_ns {
                println!("  Next delayed at:  {at}ns");
            }
            if let Some(at) = stats.next_lease_expiry_ns {
                println!("  Next lease expiry: {at}ns");
            }
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn main() {
    dynoq_core::telemetry::init_tracing("warn");

    let cli = Cli::parse();
    let queue = open_queue(cli.config.as_deref(), cli.data_dir);

    match cli.command {
        Commands::Push {
            kind,
            payload,
            event,
            delay_ms,
        } => cmd_push(&queue, build_message(kind, payload, event), delay_ms),
        Commands::Poll => cmd_poll(&queue),
        Commands::Ack { id } => cmd_ack(&queue, id),
        Commands::Abandon { id, token } => cmd_abandon(&queue, id, token),
        Commands::Stats => cmd_stats(&queue),
    }

    if let Err(e) = queue.shutdown() {
        fail(&e.to_string());
    }
}
