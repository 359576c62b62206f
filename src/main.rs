use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kirin_core::{ChatController, OllamaClient};
use tracing::info;

mod app;
mod config;
mod handler;
mod tui;
mod ui;

use app::App;
use config::Config;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "kirin")]
#[command(about = "Chat with a streaming assistant backend from the terminal", version)]
struct Cli {
    /// Backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Model to send turns to
    #[arg(short, long)]
    model: Option<String>,

    /// Wait for complete replies instead of streaming them
    #[arg(long)]
    no_stream: bool,

    /// List the models the backend offers and exit
    #[arg(long)]
    list_models: bool,

    /// Persist the effective settings to the config file
    #[arg(long)]
    save: bool,
}

fn log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("kirin")
        .join("logs")
        .join("kirin.log")
}

/// Log to a file; stdout/stderr belong to the TUI
fn init_logging() -> Result<()> {
    let path = log_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let log_file = File::create(&path)
        .with_context(|| format!("Could not create log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn effective_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if cli.no_stream {
        config.stream = Some(false);
    }
    Ok(config)
}

async fn list_models(client: &OllamaClient) -> Result<()> {
    let models = client
        .list_models()
        .await
        .with_context(|| format!("Could not reach {}", client.base_url()))?;

    if models.is_empty() {
        println!("No models found on {}", client.base_url());
    }
    for model in models {
        println!("{}", model);
    }
    Ok(())
}

async fn run(app: &mut App) -> Result<()> {
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    while !app.should_quit {
        app.apply_updates();
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event),
            Some(event) = app.controller.next_event() => app.controller.handle_event(event),
            else => break,
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config = effective_config(&cli)?;
    if cli.save {
        config.save()?;
        info!("Saved settings to {}", Config::get_config_path()?.display());
    }

    let client = OllamaClient::new(config.base_url());
    if cli.list_models {
        return list_models(&client).await;
    }

    let settings = config.chat_settings();
    info!(
        "Starting chat against {} with model {}",
        client.base_url(),
        settings.model
    );
    let (controller, updates) = ChatController::new(Arc::new(client), settings);
    let mut app = App::new(controller, updates);

    tui::install_panic_hook();
    let result = run(&mut app).await;
    tui::restore()?;
    result
}
