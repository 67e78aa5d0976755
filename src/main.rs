#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use chilib::cli::{Cli, Command, PantryAction};
use chilib::client::{CopilotClient, ProtocolOutcome};
use chilib::config::Config;
use chilib::context::{Context, StaticSignals};
use chilib::gateway::run_gateway;
use chilib::intent::{IntentMode, detect_user_intent};
use chilib::protocol::fallback::fallback_protocol;
use chilib::providers::create_provider;
use chilib::storage::{ChatMessage, MessageStore, today_key};
use clap::Parser;
use futures_util::StreamExt;
use std::io::Write as _;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS before any client is
    // built; reqwest and axum both depend on it.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = Config::load_or_init()?;

    match cli.command {
        Command::Serve { host, port } => run_serve(config, host, port).await,
        Command::Protocol {
            sleep_hours,
            meetings,
            pantry,
            offline,
            gateway,
        } => run_protocol(config, sleep_hours, meetings, pantry, offline, gateway).await,
        Command::Chat {
            message,
            stream,
            gateway,
        } => run_chat(config, message, stream, gateway).await,
        Command::Pantry { action } => run_pantry(config, action).await,
    }
}

async fn run_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Err(e) = config.require_upstream() {
        tracing::warn!("{e}; protocol requests will fail until credentials are set");
    }
    let provider = create_provider(&config);
    let config = Arc::new(config);
    if let Err(e) = provider.warmup().await {
        tracing::debug!("provider warmup failed: {e}");
    }
    run_gateway(config, provider).await?;
    Ok(())
}

async fn open_store(config: &Config) -> Result<MessageStore> {
    let path = config.storage.resolve_db_path(&config.workspace_dir);
    Ok(MessageStore::open(&path).await?)
}

fn gateway_base(config: &Config, flag: Option<String>) -> String {
    flag.unwrap_or_else(|| format!("http://{}:{}", config.gateway.host, config.gateway.port))
}

async fn run_protocol(
    config: Config,
    sleep_hours: Option<f64>,
    meetings: Option<u32>,
    extra_pantry: Vec<String>,
    offline: bool,
    gateway: Option<String>,
) -> Result<()> {
    let store = open_store(&config).await?;
    let mut pantry = store.pantry_items().await?;
    pantry.extend(extra_pantry);

    let signals = StaticSignals {
        sleep_hours,
        meetings_today: meetings,
    };
    let ctx = Context::assemble(&signals, pantry);

    let outcome = if offline {
        ProtocolOutcome::Protocol(fallback_protocol(&ctx))
    } else {
        let client = CopilotClient::new(gateway_base(&config, gateway));
        client.request_protocol(&ctx).await
    };

    match outcome {
        ProtocolOutcome::Protocol(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
        ProtocolOutcome::Capability(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

async fn run_chat(
    config: Config,
    message: String,
    stream: bool,
    gateway: Option<String>,
) -> Result<()> {
    let store = open_store(&config).await?;
    let day = today_key();
    store.purge_except(&day).await?;

    let pantry = store.pantry_items().await?;
    let ctx = Context::assemble(&StaticSignals::default(), pantry);
    let intent = detect_user_intent(&message);

    store
        .append_message(&day, &ChatMessage::user(message.as_str()))
        .await?;

    // Recognized topics answer locally; schedule-flavored messages refresh
    // the protocol instead of opening a chat turn.
    if let Some(reply) = intent.reply {
        println!("{reply}");
        store
            .append_message(&day, &ChatMessage::ai(reply.as_str()))
            .await?;
        return Ok(());
    }

    if intent.mode == IntentMode::Protocol {
        let client = CopilotClient::new(gateway_base(&config, gateway));
        let outcome = client.request_protocol(&ctx).await;
        match outcome {
            ProtocolOutcome::Protocol(doc) => {
                println!("Here's your refreshed protocol:");
                println!("{}", serde_json::to_string_pretty(&doc)?);
            }
            ProtocolOutcome::Capability(value) => {
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
        return Ok(());
    }

    let client = CopilotClient::new(gateway_base(&config, gateway));
    let history = store.messages_for(&day).await?;

    let reply = if stream {
        let mut printed = 0;
        let mut last = String::new();
        {
            let mut chunks = client.chat_stream(&history, &ctx);
            while let Some(buffer) = chunks.next().await {
                // Each item is the whole reply so far; print only the suffix.
                print!("{}", &buffer[printed.min(buffer.len())..]);
                std::io::stdout().flush()?;
                printed = buffer.len();
                last = buffer;
            }
        }
        println!();
        last
    } else {
        let reply = client.chat(&history, &ctx).await;
        println!("{reply}");
        reply
    };

    store
        .append_message(&day, &ChatMessage::ai(reply.as_str()))
        .await?;
    Ok(())
}

async fn run_pantry(config: Config, action: PantryAction) -> Result<()> {
    let store = open_store(&config).await?;
    match action {
        PantryAction::List => {
            for item in store.pantry_items().await? {
                println!("{item}");
            }
        }
        PantryAction::Add { item } => {
            store.add_pantry_item(&item).await?;
            println!("added: {item}");
        }
        PantryAction::Remove { item } => {
            if store.remove_pantry_item(&item).await? {
                println!("removed: {item}");
            } else {
                println!("not in pantry: {item}");
            }
        }
    }
    Ok(())
}
