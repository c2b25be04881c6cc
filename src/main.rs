use anyhow::Result;
use assistant_core::{BackendClient, Config, Session};
use clap::Parser;
use tracing::{info, warn};

mod app;
mod cli;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use cli::Cli;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_dir.clone())?;

    let file_config = Config::load().unwrap_or_else(|e| {
        warn!("could not read config, using defaults: {}", e);
        Config::new()
    });
    let config = cli.apply(file_config);
    if cli.save_config {
        config.save()?;
        info!(path = ?Config::get_config_path().ok(), "saved config");
    }

    let client = BackendClient::from_config(&config)?;
    info!(server = %client.base_url(), "starting assistant");

    let mut app = App::new(Session::with_greeting(config.greeting()), client);
    app.start_health_check();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(tui::TICK_RATE);

    while !app.should_quit {
        app.poll_tasks().await;
        app.sync_render();
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }

    Ok(())
}
