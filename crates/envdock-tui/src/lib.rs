//! TUI application for envdock
//!
//! Built with Ratatui on top of the core environment manager.

pub mod app;
mod create_state;
mod event;
mod settings;
mod toast;
pub mod ui;
pub mod widgets;

pub use app::{App, AppResult, ConfirmAction, View};
pub use create_state::{CreateDialogState, CreateField};
pub use event::{Event, EventHandler};
pub use settings::SettingsState;
pub use toast::Toasts;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use envdock_core::EnvironmentManager;
use ratatui::prelude::*;
use std::io;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;

/// Run the TUI application
pub async fn run(manager: Arc<EnvironmentManager>, toasts: Toasts) -> AppResult<()> {
    // Suppress tracing output during TUI (a stray log line would corrupt
    // the display). The guard restores the previous subscriber on drop.
    let _guard = tracing::subscriber::set_default(
        tracing_subscriber::registry().with(tracing_subscriber::layer::Identity::new()),
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app and run
    let mut app = App::new(manager, toasts).await;
    let res = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}
