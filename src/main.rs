use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

mod agent;
mod app;
mod config;
mod handler;
mod stream;
mod tui;
mod ui;

use app::{App, TurnEvent};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::load().unwrap_or_else(|_| Config::new());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let (turn_tx, turn_rx) = mpsc::unbounded_channel();
    let app = App::new(&config, turn_tx);

    let result = run(&mut terminal, app, turn_rx).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    mut app: App,
    mut turn_rx: mpsc::UnboundedReceiver<TurnEvent>,
) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(&mut app, event)?,
            Some(event) = turn_rx.recv() => app.on_turn_event(event),
        }
    }

    Ok(())
}

/// Logs go to a file; the terminal itself belongs to the TUI.
fn init_logging() -> Result<()> {
    let log_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("weather-chat");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("weather-chat.log"))?;
    tracing_subscriber::fmt()
        .with_writer(std::sync::Arc::new(log_file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    Ok(())
}
