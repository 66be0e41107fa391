use std::io;
use std::time::Duration;

use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

mod api;
mod app;
mod auth;
mod config;
mod dashboard;
mod db;
mod error;
mod models;
mod query;
mod tui;

use app::App;
use config::Config;
use error::Result;
use tui::{draw, handle_key_event};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = Config::load()?;

    // Check for --status flag (headless snapshot)
    let headless_status = args.len() >= 2 && args[1] == "--status";

    let mut app = App::new(&config).await?;

    if headless_status {
        let result = print_status(&app).await;
        app.shutdown();
        return result;
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    app.shutdown();

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

async fn print_status(app: &App) -> Result<()> {
    app.refresh_blocking().await?;

    let status = app.status();
    println!("{} | {}", status.label.label(), status.last_run_text);
    if let Some(draft_id) = status.draft_id {
        println!("Latest draft: {}", draft_id);
    }

    let Some(dashboard) = app.dashboard() else {
        println!("Sign in to view run history.");
        return Ok(());
    };
    let rows = dashboard.history_rows();
    if rows.is_empty() {
        println!("No runs yet.");
    }
    for row in rows {
        println!("{:<16} {:<20} {}  {}", row.copy, row.when, row.id, row.topics);
        if let Some(message) = row.message {
            println!("{:<16} {}", "", message);
        }
    }
    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        // Poll for completed background writes
        app.poll_results();

        // Poll for events with timeout so cache updates get redrawn
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.editing, app.show_help) {
                        let should_quit = app.handle_action(action).await?;
                        if should_quit {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
