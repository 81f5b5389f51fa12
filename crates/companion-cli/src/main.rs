use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use companion_core::{
    channel_notifier, Availability, Config, ConversationSession, OllamaClient, OpenAIClient,
    ProviderSelection, ProviderSelector, RequestHandle, RequestOutcome, SessionEvent,
};

#[derive(Parser)]
#[command(name = "companion")]
#[command(about = "Desktop companion assistant: local, cloud or stand-in chat")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the local model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Skip the local server even if it is preferred in settings
    #[arg(long, global = true)]
    no_local: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation (streams answers; Ctrl-C cancels)
    Chat,
    /// Ask a single question
    Ask {
        /// Your question
        question: String,
        /// Wait for the complete answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// List models the configured backends offer
    Models,
    /// Show which provider would be selected and why
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Chat => chat(&config).await?,
        Commands::Ask { question, no_stream } => ask(&config, &question, !no_stream).await?,
        Commands::Models => list_models(&config).await?,
        Commands::Probe => probe(&config).await,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Config::load_or_default(),
    }
    .apply_env();

    if let Some(model) = &cli.model {
        config.local.model = model.clone();
    }
    if cli.no_local {
        config.local.prefer_local = false;
    }
    Ok(config)
}

async fn start_session(config: &Config) -> (ProviderSelection, ConversationSession, mpsc::UnboundedReceiver<SessionEvent>) {
    println!("{}", "Looking for a provider...".dimmed());
    let selection = ProviderSelector::select(config).await;
    println!("{} {}", "Using".green(), selection.label.bold());

    let (notifier, events) = channel_notifier();
    let session = ConversationSession::with_notifier(
        Arc::clone(&selection.adapter),
        config.session.clone(),
        notifier,
    );
    (selection, session, events)
}

async fn chat(config: &Config) -> Result<()> {
    let (_selection, session, mut events) = start_session(config).await;
    println!(
        "{}",
        "Type a message. /clear starts over, /quit leaves.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_history();
                println!("{}", "History cleared.".yellow());
                continue;
            }
            prompt => {
                let handle = session.submit_prompt_streaming(prompt);
                render(&session, handle, &mut events).await?;
            }
        }
    }

    Ok(())
}

async fn ask(config: &Config, question: &str, stream: bool) -> Result<()> {
    let (_selection, session, mut events) = start_session(config).await;
    let handle = if stream {
        session.submit_prompt_streaming(question)
    } else {
        session.submit_prompt(question)
    };
    render(&session, handle, &mut events).await
}

/// Prints events until the request is done; Ctrl-C cancels it.
async fn render(
    session: &ConversationSession,
    handle: RequestHandle,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    let mut printer = Printer::default();
    let wait = handle.wait();
    tokio::pin!(wait);

    let outcome = loop {
        tokio::select! {
            outcome = &mut wait => break outcome,
            Some(event) = events.recv() => printer.show(event)?,
            _ = tokio::signal::ctrl_c() => {
                if session.cancel() {
                    print!("{}", " [cancelled]".yellow());
                }
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        printer.show(event)?;
    }

    if outcome == RequestOutcome::Cancelled {
        printer.end_line();
    }
    Ok(())
}

/// Streamed text already on screen for the current answer.
#[derive(Default)]
struct Printer {
    shown: String,
}

impl Printer {
    fn show(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::StateChanged(state) => {
                tracing::debug!(state = state.as_str(), "session state");
            }
            SessionEvent::PartialText { text, .. } => {
                if self.shown.is_empty() {
                    print!("{} ", "companion>".magenta().bold());
                }
                if let Some(delta) = text.get(self.shown.len()..) {
                    print!("{delta}");
                }
                self.shown = text;
                std::io::stdout().flush()?;
            }
            SessionEvent::ResponseText(text) => {
                if !self.shown.is_empty() && text == self.shown {
                    println!();
                } else {
                    self.end_line();
                    if text.starts_with("Sorry, an error occurred") {
                        println!("{} {}", "companion>".magenta().bold(), text.red());
                    } else {
                        println!("{} {}", "companion>".magenta().bold(), text);
                    }
                }
                self.shown.clear();
            }
        }
        Ok(())
    }

    fn end_line(&mut self) {
        if !self.shown.is_empty() {
            println!();
            self.shown.clear();
        }
    }
}

async fn list_models(config: &Config) -> Result<()> {
    println!("{}", format!("Local models at {}:", config.local.endpoint).bold().blue());
    let client = OllamaClient::new(&config.local.endpoint);
    match client.list_models(config.probe.catalog_timeout()).await {
        Ok(models) if models.is_empty() => println!("  {}", "(none installed)".dimmed()),
        Ok(models) => {
            for model in models {
                let marker = if companion_core::ai::ollama::model_matches(&model, &config.local.model) {
                    "*".green().to_string()
                } else {
                    " ".to_string()
                };
                println!(" {marker} {model}");
            }
        }
        Err(e) => println!("  {} {}", "unavailable:".red(), e),
    }

    println!("\n{}", "Cloud models:".bold().blue());
    for model in OpenAIClient::list_models() {
        let marker = if model == config.cloud.model { "*".green().to_string() } else { " ".to_string() };
        println!(" {marker} {model}");
    }
    Ok(())
}

async fn probe(config: &Config) {
    let selection = ProviderSelector::select(config).await;

    println!("{}", "Providers (in priority order):".bold().blue());
    for candidate in &selection.candidates {
        let status = match &candidate.availability {
            Availability::Available => candidate.availability.to_string().green(),
            Availability::Unavailable(_) => candidate.availability.to_string().red(),
            _ => candidate.availability.to_string().dimmed(),
        };
        let endpoint = candidate.endpoint.as_deref().unwrap_or("-");
        println!(
            "  {:<10} {:<16} {:<32} {}",
            candidate.kind.display_name(),
            candidate.model,
            endpoint,
            status
        );
    }
    println!("\n{} {}", "Selected:".bold(), selection.label.green());
}
