use anyhow::Result;

mod api;
mod app;
mod config;
mod handler;
mod tui;
mod ui;

use api::BackendClient;
use app::App;
use config::Config;
use tui::EventHandler;

const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());

    // Env var wins over config, config over the localhost default
    let base_url = std::env::var("ORCHESTRA_URL")
        .ok()
        .or_else(|| config.backend_url.clone())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(BackendClient::new(&base_url), events.sender(), &config);
    app.spawn_initial_load();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
