//! # attune
//!
//! Terminal front end for the adaptive assistant: bootstraps the session
//! documents, keeps a live session open and renders what the server pushes.

#![deny(unsafe_code)]

mod repl;

use std::sync::Arc;

use anyhow::{Context, Result};
use attune_client::events::{self, SessionEvent};
use attune_client::{
    BootstrapClient, ConnectionState, EventDispatcher, SessionClient, SessionConfig, WsConnector,
};
use attune_core::wire::CHAT_RESPONSE;
use attune_core::{InboundMessage, TaskId};
use attune_settings::AttuneSettings;
use attune_store::{SessionStore, TaskFilter};
use attune_telemetry::TelemetryConfig;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::repl::{ReplCommand, HELP};

/// Adaptive assistant client.
#[derive(Parser, Debug)]
#[command(name = "attune", about = "Adaptive assistant client")]
struct Cli {
    /// Backend base URL (overrides settings).
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open an interactive chat session.
    Chat {
        /// Context sent with every chat message and the initial UI request.
        #[arg(long, default_value = "")]
        context: String,
    },
    /// Check that the backend is up.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = attune_settings::load_settings().context("failed to load settings")?;
    if let Some(base_url) = cli.base_url {
        settings.server.base_url = base_url;
        settings.server.ws_url = None;
    }

    let telemetry = TelemetryConfig {
        log_level: settings.logging.level.clone(),
        json: settings.logging.json,
        ..TelemetryConfig::default()
    };
    if let Err(e) = attune_telemetry::init_telemetry(&telemetry) {
        eprintln!("logging disabled: {e}");
    }

    match cli.command {
        Command::Chat { context } => chat(&settings, &context).await,
        Command::Health => health(&settings).await,
    }
}

async fn health(settings: &AttuneSettings) -> Result<()> {
    let client = BootstrapClient::from_settings(settings)?;
    let status = client
        .health()
        .await
        .with_context(|| format!("health check against {} failed", client.base_url()))?;
    println!("{} ({})", status.status, client.base_url());
    if !status.is_healthy() {
        anyhow::bail!("backend reports {}", status.status);
    }
    Ok(())
}

async fn chat(settings: &AttuneSettings, context: &str) -> Result<()> {
    let store = Arc::new(SessionStore::new());

    let bootstrap = BootstrapClient::from_settings(settings)?;
    match bootstrap.fetch_all(context).await {
        Ok(docs) => store.load_bootstrap(docs),
        Err(e) => store.record_bootstrap_error(e.to_string()),
    }
    if let Some(error) = store.bootstrap_error() {
        println!("! could not load your profile: {error}");
    }

    let dispatcher: Arc<EventDispatcher> = Arc::new(EventDispatcher::new());
    let _subscription = store.attach(&dispatcher);
    register_printers(&dispatcher);

    let config = SessionConfig::from_settings(settings)?;
    info!(url = %config.url, "starting session");
    let client = SessionClient::spawn(config, Arc::new(WsConnector), Arc::clone(&dispatcher));
    client.connect().await?;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Say(text) => {
                if client.state() != ConnectionState::Connected {
                    println!("! not connected ({}), message not sent", client.state());
                    continue;
                }
                let _ = store.record_user_message(text.clone());
                if let Err(e) = client.send_chat_message(text, context).await {
                    println!("! {e}");
                }
            }
            ReplCommand::Tasks => print_tasks(&store),
            ReplCommand::Done(id) => match store.toggle_task_status(&TaskId::from_raw(id)) {
                Ok(status) => println!("task is now {status}"),
                Err(e) => println!("! {e}"),
            },
            ReplCommand::Ui(ctx) => {
                let ctx = ctx.unwrap_or_else(|| context.to_owned());
                if let Err(e) = client.request_ui_update(ctx).await {
                    println!("! {e}");
                }
            }
            ReplCommand::Layout => {
                let view = store.resolver().resolve();
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            ReplCommand::Profile => print_profile(&store),
            ReplCommand::Reconnect => client.reconnect().await?,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
            ReplCommand::Unknown(line) => println!("unknown command: {line} (try /help)"),
        }
    }

    client.disconnect().await?;
    client.shutdown().await;
    Ok(())
}

fn register_printers(dispatcher: &EventDispatcher) {
    let _ = dispatcher.on(CHAT_RESPONSE, |event: &SessionEvent| {
        if let Some(InboundMessage::ChatResponse(resp)) = event.as_message() {
            println!("assistant> {}", resp.response);
            if let Some(tasks) = resp.tasks.as_ref().filter(|t| !t.is_empty()) {
                println!("  ({} new task(s), /tasks to list)", tasks.len());
            }
        }
        Ok(())
    });
    let _ = dispatcher.on(events::CONNECTED, |_: &SessionEvent| {
        println!("* connected");
        Ok(())
    });
    let _ = dispatcher.on(events::DISCONNECTED, |_: &SessionEvent| {
        println!("* disconnected");
        Ok(())
    });
    let _ = dispatcher.on(events::MAX_RECONNECT_ATTEMPTS_REACHED, |_: &SessionEvent| {
        warn!("giving up on automatic reconnects");
        println!("* connection lost; /reconnect to try again");
        Ok(())
    });
}

fn print_profile(store: &SessionStore) {
    if !store.has_personality_data() {
        println!("no profile yet");
        return;
    }
    let profile = store.profile();
    for (name, score) in profile.trait_scores() {
        println!("  {name:<20} {score:.2}");
    }
    println!("{} recorded interaction(s)", profile.interaction_history().len());
    let adaptations = store.adaptations();
    let agents = adaptations.agents();
    if !agents.is_empty() {
        println!("adapted agents: {}", agents.join(", "));
    }
}

fn print_tasks(store: &SessionStore) {
    let grouping = store.resolver().task_grouping();
    let groups = store.grouped_tasks(TaskFilter::All, grouping);
    if groups.is_empty() {
        println!("no tasks yet");
        return;
    }
    for group in groups {
        println!("[{}]", group.key);
        for task in group.tasks {
            let mark = if task.status() == attune_core::TaskStatus::Completed { "x" } else { " " };
            println!("  [{mark}] {} ({}, {})", task.title(), task.priority(), task.id);
        }
    }
    let counts = store.task_counts();
    println!(
        "{} total, {} completed, {} high priority",
        counts.total, counts.completed, counts.high_priority
    );
}
