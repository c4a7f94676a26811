use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use agent_chat_core::Config;
use app::App;
use tui::{EventHandler, Tui};

/// Filter for the log file, e.g. `AGENT_CHAT_LOG=debug`
const LOG_ENV_VAR: &str = "AGENT_CHAT_LOG";

/// Send tracing output to a file; stdout and stderr belong to the TUI.
fn init_logging() -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agent-chat");
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("agent-chat.log");
    let log_file = std::fs::File::create(&log_path)?;

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    Ok(log_path)
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event, events.sender())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = init_logging()?;

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not load config, using defaults");
        Config::new()
    });
    info!(base_url = %config.base_url, on_failure = config.on_failure.as_str(), log = %log_path.display(), "starting agent-chat");

    let mut app = App::new(config)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}
