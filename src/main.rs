mod action;
mod api;
mod app;
mod auth;
mod cache;
mod config;
mod editor;
mod error;
mod event;
mod feed;
mod follow;
mod http;
mod profile;
mod session;
mod tui;
mod types;
mod ui;

use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::action::Action;
use crate::api::ShelfApi;
use crate::app::App;
use crate::config::Config;
use crate::event::Event;
use crate::feed::ViewMode;
use crate::http::HttpApi;
use crate::session::Session;
use crate::tui::EventHandler;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Browse PixelShelf from the terminal.
struct Cli {
    /// Feed tab to open: trending, following, assets or creators
    #[arg(long)]
    tab: Option<String>,
    /// Initial search query
    #[arg(long)]
    search: Option<String>,
    /// Tag filter; may be repeated, only the first one is sent
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// Asset type filter (2d, 3d, audio, ...)
    #[arg(long = "type")]
    asset_type: Option<String>,
    /// Initial view mode
    #[arg(long, value_parser = ["grid", "list"])]
    view: Option<String>,
    /// Load more pages with `m` instead of scrolling
    #[arg(long)]
    paged: bool,
    /// PixelShelf instance to talk to
    #[arg(long)]
    base_url: Option<String>,
    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        let feed = &mut config.feed;
        if let Some(tab) = self.tab {
            feed.active_tab = tab;
        }
        if self.search.is_some() {
            feed.search_query = self.search;
        }
        if !self.tags.is_empty() {
            feed.selected_tags = self.tags;
        }
        if self.asset_type.is_some() {
            feed.selected_type = self.asset_type;
        }
        if let Some(view) = self.view {
            feed.default_view_mode = if view == "list" {
                ViewMode::List
            } else {
                ViewMode::Grid
            };
        }
        if self.paged {
            feed.infinite_scroll = false;
        }
        if let Some(base_url) = self.base_url {
            config.api.base_url = base_url;
        }
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = log_file
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let mut config = Config::load();
    cli.apply(&mut config);

    let token = auth::load_token(&config.api);
    let api: Arc<dyn ShelfApi> = Arc::new(HttpApi::new(
        &config.api.base_url,
        token,
        config.api.timeout_secs,
    )?);

    let session = match api.current_user().await {
        Ok(user) => Session::new(user),
        Err(e) => {
            warn!(error = %e, "session lookup failed, continuing signed out");
            Session::anonymous()
        }
    };
    info!(signed_in = session.is_authenticated(), "session resolved");

    let result = run(api, session, config).await;

    // Restore terminal
    tui::restore()?;

    result
}

async fn run(
    api: Arc<dyn ShelfApi>,
    session: Session,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut terminal = tui::init()?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut app = App::new(api, session, config, action_tx.clone());

    let size = terminal.size()?;
    app.update(Action::Resize(size.width, size.height));
    action_tx.send(app.handle_event(Event::Init))?;

    let tick_rate = Duration::from_millis(250);
    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = EventHandler::new(tick_rate, render_rate);

    loop {
        let mut edit_request = None;

        tokio::select! {
            Some(event) = events.next() => {
                if event.is_quit() {
                    app.update(Action::Quit);
                    break;
                }

                match event {
                    Event::Render => {
                        terminal.draw(|frame| ui::render(frame, &app))?;
                    }
                    _ => {
                        let action = app.handle_event(event);
                        if !matches!(action, Action::None) {
                            action_tx.send(action)?;
                        }
                    }
                }
            }
            Some(action) = action_rx.recv() => match action {
                Action::SuspendForEditor(text) => edit_request = Some(text),
                action => app.update(action),
            },
        }

        if let Some(text) = edit_request {
            // Stop reading stdin so the editor gets every keystroke
            drop(events);
            let editor_cmd = editor::detect_editor();
            let edited = tui::suspend_for(&mut terminal, || editor::edit_text(&text, &editor_cmd))?;
            events = EventHandler::new(tick_rate, render_rate);
            action_tx.send(Action::EditorClosed(edited.map_err(|e| e.to_string())))?;
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
