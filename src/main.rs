use std::sync::Arc;

use anyhow::Result;

mod api;
mod app;
mod config;
mod handler;
mod state;
mod tui;
mod ui;

use api::{ChatApi, ChatTransport};
use app::App;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());
    let transport: Arc<dyn ChatTransport> = Arc::new(ChatApi::new(&config.api_url()));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(Arc::clone(&transport));
    let mut app = App::new(transport);

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        // Join a finished send before drawing so the reply (or the rollback)
        // is visible in the same frame
        app.poll_send().await;

        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
