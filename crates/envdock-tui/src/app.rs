//! Main TUI application state and logic

use crate::create_state::{CreateDialogState, CreateField};
use crate::event::{Event, EventHandler};
use crate::settings::SettingsState;
use crate::toast::Toasts;
use crate::ui;
use crate::widgets::TextInputState;
use crossterm::event::{KeyCode, KeyModifiers};
use envdock_api::{Environment, StreamHandle};
use envdock_core::{
    CreateProgress, CreateStep, EnvironmentManager, LogLineBuffer, LogScrollState, NoticeKind,
    ViewState,
};
use ratatui::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] envdock_core::CoreError),
}

pub type AppResult<T> = Result<T, AppError>;

/// Current view in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Environment list with the folder strip
    Main,
    /// Creation dialog (including its prerequisite sub-dialogs)
    Create,
    /// Live log viewer
    Logs,
    /// User settings dialog
    Settings,
    /// Folder manager
    Folders,
    /// Folder picker for moving an environment
    MoveToFolder,
    /// Rename prompt
    Rename,
    /// Help overlay
    Help,
    /// Confirmation dialog
    Confirm,
}

/// Pending confirmation
#[derive(Debug, Clone)]
pub enum ConfirmAction {
    Delete(String),
}

/// Messages from background tasks back into the event loop
pub enum Msg {
    /// A background refresh or operation finished; re-clamp selection
    Refreshed,
    /// The creation sequence advanced (None when it failed and was
    /// already surfaced as a toast)
    CreateAdvanced(Option<CreateProgress>),
    /// Image pull progress percentage
    PullProgress(f64),
    /// A raw log chunk tagged with its stream generation
    LogChunk { generation: u64, chunk: String },
}

/// Folder manager edit mode
#[derive(Debug, Clone)]
pub enum FolderEdit {
    Create,
    Rename(String),
}

/// Folder manager state
#[derive(Default)]
pub struct FolderPanelState {
    pub selected: usize,
    pub edit: Option<FolderEdit>,
    pub input: TextInputState,
}

/// Rename prompt state
pub struct RenamePrompt {
    pub id: String,
    pub input: TextInputState,
}

/// Application state
pub struct App {
    /// Environment manager, shared with background tasks
    pub manager: Arc<EnvironmentManager>,
    /// Toast queue shared with the manager's notifier
    pub toasts: Toasts,
    pub view: View,
    /// Snapshot of the core model, taken before each draw
    pub state: ViewState,
    /// Selected row in the environment list
    pub selected: usize,
    /// Selected entry in the folder strip
    pub folder_idx: usize,
    /// Creation dialog, present while View::Create
    pub create: Option<CreateDialogState>,
    /// Settings dialog, present while View::Settings
    pub settings_state: Option<SettingsState>,
    pub folder_panel: FolderPanelState,
    /// Selected option in the move-to-folder picker
    pub folder_pick: usize,
    pub rename: Option<RenamePrompt>,
    pub confirm_action: Option<ConfirmAction>,
    /// Assembled log lines for the viewer
    pub logs: LogLineBuffer,
    pub log_scroll: LogScrollState,
    /// Name of the environment whose logs are open
    pub log_env: Option<String>,
    log_stream: Option<StreamHandle>,
    /// Bumped on every open/close; chunks from older streams are inert
    log_generation: u64,
    /// Viewport height of the log view, written during draw
    pub log_viewport: usize,
    /// Latest pull percentage while the pull dialog is open
    pub pull_progress: f64,
    pull_tasks: Vec<JoinHandle<()>>,
    last_poll: Instant,
    pub should_quit: bool,
    msg_tx: mpsc::UnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
}

impl App {
    /// Create the application and kick off the initial load
    pub async fn new(manager: Arc<EnvironmentManager>, toasts: Toasts) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();

        // Initial load runs in the background so the UI comes up
        // immediately with the "connecting" gate.
        let mgr = Arc::clone(&manager);
        let tx = msg_tx.clone();
        tokio::spawn(async move {
            let _ = mgr.bootstrap().await;
            let _ = tx.send(Msg::Refreshed);
        });

        let state = manager.view().await;
        Self {
            manager,
            toasts,
            view: View::Main,
            state,
            selected: 0,
            folder_idx: 0,
            create: None,
            settings_state: None,
            folder_panel: FolderPanelState::default(),
            folder_pick: 0,
            rename: None,
            confirm_action: None,
            logs: LogLineBuffer::new(),
            log_scroll: LogScrollState::default(),
            log_env: None,
            log_stream: None,
            log_generation: 0,
            log_viewport: 0,
            pull_progress: 0.0,
            pull_tasks: Vec::new(),
            last_poll: Instant::now(),
            should_quit: false,
            msg_tx,
            msg_rx,
        }
    }

    /// Run the application main loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> AppResult<()> {
        let mut events = EventHandler::new(Duration::from_millis(250));

        while !self.should_quit {
            self.state = self.manager.view().await;
            terminal.draw(|frame| ui::draw(frame, self))?;

            tokio::select! {
                event = events.next() => {
                    if let Some(e) = event {
                        self.handle_event(e).await?;
                    }
                }
                msg = self.msg_rx.recv() => {
                    if let Some(m) = msg {
                        self.handle_msg(m).await;
                    }
                }
            }
        }

        Ok(())
    }

    pub fn selected_environment(&self) -> Option<&Environment> {
        self.state.environments.get(self.selected)
    }

    async fn handle_event(&mut self, event: Event) -> AppResult<()> {
        match event {
            Event::Key(key) => self.handle_key(key.code, key.modifiers).await?,
            Event::Tick => self.on_tick(),
            Event::Resize(_, _) => {}
        }
        Ok(())
    }

    /// Spawn a refresh when the poll interval has elapsed. The manager
    /// deduplicates overlapping fetches and drops stale responses.
    fn on_tick(&mut self) {
        if !matches!(self.view, View::Main | View::Logs | View::Create) {
            return;
        }
        if self.last_poll.elapsed() < self.manager.poll_interval() {
            return;
        }
        self.last_poll = Instant::now();
        let mgr = Arc::clone(&self.manager);
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let _ = mgr.refresh().await;
            let _ = tx.send(Msg::Refreshed);
        });
    }

    async fn handle_msg(&mut self, msg: Msg) {
        match msg {
            Msg::Refreshed => self.clamp_selection(),
            Msg::CreateAdvanced(progress) => self.handle_create_progress(progress),
            Msg::PullProgress(value) => self.pull_progress = value,
            Msg::LogChunk { generation, chunk } => {
                if generation == self.log_generation && self.view == View::Logs {
                    self.logs.push_chunk(&chunk);
                }
            }
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.state.environments.len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        let folders = self.state.folders.len();
        if self.folder_idx >= folders {
            self.folder_idx = folders.saturating_sub(1);
        }
    }

    fn handle_create_progress(&mut self, progress: Option<CreateProgress>) {
        match progress {
            Some(CreateProgress::Created(_)) => {
                self.create = None;
                self.view = View::Main;
            }
            Some(CreateProgress::NeedsInstall) => {
                // The install prompt renders off create_step; nothing to do
            }
            Some(CreateProgress::NeedsPull { .. }) => {
                self.pull_progress = 0.0;
                self.start_pull();
            }
            // Failure was toasted by the manager; the form stays open
            None => {}
        }
    }

    /// Drive the image pull in the background, forwarding progress
    fn start_pull(&mut self) {
        let (ptx, mut prx) = mpsc::unbounded_channel();

        let tx = self.msg_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(value) = prx.recv().await {
                if tx.send(Msg::PullProgress(value)).is_err() {
                    break;
                }
            }
        });

        let mgr = Arc::clone(&self.manager);
        let tx = self.msg_tx.clone();
        let puller = tokio::spawn(async move {
            let progress = match mgr.pull_pending_image(ptx).await {
                Ok(()) => mgr.pull_complete().await.ok(),
                Err(_) => None,
            };
            let _ = tx.send(Msg::CreateAdvanced(progress));
        });

        self.pull_tasks = vec![forwarder, puller];
    }

    async fn cancel_pull(&mut self) {
        for task in self.pull_tasks.drain(..) {
            task.abort();
        }
        self.manager.cancel_pull().await;
    }

    // ==================== Key handling ====================

    async fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> AppResult<()> {
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Ok(());
        }

        match self.view {
            View::Main => self.handle_main_key(code).await?,
            View::Create => self.handle_create_key(code).await?,
            View::Logs => self.handle_logs_key(code),
            View::Settings => self.handle_settings_key(code).await?,
            View::Folders => self.handle_folders_key(code).await?,
            View::MoveToFolder => self.handle_move_key(code).await?,
            View::Rename => self.handle_rename_key(code).await?,
            View::Help => self.view = View::Main,
            View::Confirm => self.handle_confirm_key(code).await?,
        }
        Ok(())
    }

    async fn handle_main_key(&mut self, code: KeyCode) -> AppResult<()> {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.state.environments.len();
                if len > 0 {
                    self.selected = (self.selected + 1).min(len - 1);
                }
            }
            KeyCode::Left | KeyCode::BackTab => self.cycle_folder(false).await,
            KeyCode::Right | KeyCode::Tab => self.cycle_folder(true).await,
            KeyCode::Enter | KeyCode::Char('a') => self.toggle_selected().await,
            KeyCode::Char('n') => {
                let form = self.manager.open_create().await;
                self.create = Some(CreateDialogState::new(form));
                self.view = View::Create;
            }
            KeyCode::Char('d') => {
                let target = self
                    .selected_environment()
                    .filter(|e| !self.state.is_busy(&e.id))
                    .map(|e| e.id.clone());
                if let Some(id) = target {
                    self.confirm_action = Some(ConfirmAction::Delete(id));
                    self.view = View::Confirm;
                }
            }
            KeyCode::Char('D') => {
                if let Some(env) = self.selected_environment() {
                    let id = env.id.clone();
                    let mgr = Arc::clone(&self.manager);
                    let tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        let _ = mgr.duplicate(&id).await;
                        let _ = tx.send(Msg::Refreshed);
                    });
                }
            }
            KeyCode::Char('r') => {
                let target = self
                    .selected_environment()
                    .map(|e| (e.id.clone(), e.name.clone()));
                if let Some((id, name)) = target {
                    self.rename = Some(RenamePrompt {
                        id,
                        input: TextInputState::with_value(&name),
                    });
                    self.view = View::Rename;
                }
            }
            KeyCode::Char('m') => {
                if self.selected_environment().is_some() {
                    self.folder_pick = 0;
                    self.view = View::MoveToFolder;
                }
            }
            KeyCode::Char('l') => self.open_logs().await,
            KeyCode::Char('s') => {
                self.settings_state = Some(SettingsState::from_settings(&self.state.settings));
                self.view = View::Settings;
            }
            KeyCode::Char('f') => {
                self.folder_panel = FolderPanelState::default();
                self.view = View::Folders;
            }
            KeyCode::Char('?') => self.view = View::Help,
            _ => {}
        }
        Ok(())
    }

    async fn cycle_folder(&mut self, forward: bool) {
        let len = self.state.folders.len();
        if len == 0 {
            return;
        }
        self.folder_idx = if forward {
            (self.folder_idx + 1) % len
        } else {
            (self.folder_idx + len - 1) % len
        };
        let id = self.state.folders[self.folder_idx].id.clone();
        self.manager.select_folder(&id).await;
        self.selected = 0;
    }

    /// Activate a stopped environment or deactivate a running one.
    /// No-op while the id is busy.
    async fn toggle_selected(&mut self) {
        let Some(env) = self.selected_environment() else {
            return;
        };
        if self.state.is_busy(&env.id) {
            return;
        }
        let id = env.id.clone();
        let running = env.status.is_running();
        let mgr = Arc::clone(&self.manager);
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            if running {
                let _ = mgr.deactivate(&id).await;
            } else {
                let _ = mgr.activate(&id).await;
            }
            let _ = tx.send(Msg::Refreshed);
        });
    }

    async fn handle_confirm_key(&mut self, code: KeyCode) -> AppResult<()> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                if let Some(ConfirmAction::Delete(id)) = self.confirm_action.take() {
                    let mgr = Arc::clone(&self.manager);
                    let tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        let _ = mgr.delete(&id).await;
                        let _ = tx.send(Msg::Refreshed);
                    });
                }
                self.view = View::Main;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm_action = None;
                self.view = View::Main;
            }
            _ => {}
        }
        Ok(())
    }

    async fn handle_create_key(&mut self, code: KeyCode) -> AppResult<()> {
        // Prerequisite sub-dialogs take precedence over the form
        match self.state.create_step {
            CreateStep::InstallPrereqOpen => {
                match code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                        let mgr = Arc::clone(&self.manager);
                        let tx = self.msg_tx.clone();
                        tokio::spawn(async move {
                            let progress = mgr.confirm_install().await.ok();
                            let _ = tx.send(Msg::CreateAdvanced(progress));
                        });
                    }
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                        self.manager.decline_install().await;
                    }
                    _ => {}
                }
                return Ok(());
            }
            CreateStep::PullImageOpen => {
                if code == KeyCode::Esc {
                    self.cancel_pull().await;
                }
                return Ok(());
            }
            // Checks and submission are in flight; ignore input
            CreateStep::CheckingPath | CreateStep::CheckingImage | CreateStep::Submitting => {
                return Ok(());
            }
            CreateStep::Editing | CreateStep::Closed => {}
        }

        let Some(dialog) = self.create.as_mut() else {
            self.view = View::Main;
            return Ok(());
        };

        if dialog.editing {
            match code {
                KeyCode::Enter => dialog.commit_edit(),
                KeyCode::Esc => dialog.cancel_edit(),
                KeyCode::Backspace => dialog.input.backspace(),
                KeyCode::Delete => dialog.input.delete(),
                KeyCode::Left => dialog.input.move_left(),
                KeyCode::Right => dialog.input.move_right(),
                KeyCode::Home => dialog.input.home(),
                KeyCode::End => dialog.input.end(),
                KeyCode::Char(c) => dialog.input.insert(c),
                _ => {}
            }
            return Ok(());
        }

        match code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.create = None;
                self.manager.close_create().await;
                self.view = View::Main;
            }
            KeyCode::Tab | KeyCode::Down => dialog.next_field(),
            KeyCode::BackTab | KeyCode::Up => dialog.prev_field(),
            KeyCode::Enter => dialog.begin_edit(),
            KeyCode::Left => match dialog.field {
                CreateField::EnvType => dialog.cycle_env_type(false),
                CreateField::Release => dialog.cycle_release(&self.state.tags, false),
                _ => {}
            },
            KeyCode::Right => match dialog.field {
                CreateField::EnvType => dialog.cycle_env_type(true),
                CreateField::Release => dialog.cycle_release(&self.state.tags, true),
                _ => {}
            },
            KeyCode::Char('j') if dialog.field == CreateField::Mounts => dialog.mount_down(),
            KeyCode::Char('k') if dialog.field == CreateField::Mounts => dialog.mount_up(),
            KeyCode::Char(' ') if dialog.field == CreateField::Mounts => {
                dialog.toggle_mount_action()
            }
            KeyCode::Char('x') if dialog.field == CreateField::Mounts => dialog.remove_mount_row(),
            KeyCode::Char('s') => self.submit_create(),
            _ => {}
        }
        Ok(())
    }

    /// Validate locally, then hand the form to the flow in the background
    fn submit_create(&mut self) {
        let Some(dialog) = self.create.as_mut() else {
            return;
        };
        if let Err(e) = dialog.form.validate(&self.state.all_environments) {
            dialog.error = Some(e.to_string());
            return;
        }
        dialog.error = None;

        let form = dialog.form.clone();
        let mgr = Arc::clone(&self.manager);
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let progress = mgr.begin_create(&form).await.ok();
            let _ = tx.send(Msg::CreateAdvanced(progress));
        });
    }

    // ==================== Logs ====================

    async fn open_logs(&mut self) {
        let Some(env) = self.selected_environment() else {
            return;
        };
        let (id, name) = (env.id.clone(), env.name.clone());

        self.log_generation += 1;
        let generation = self.log_generation;
        self.logs.clear();
        self.log_scroll = LogScrollState::default();

        let (tx, mut rx) = mpsc::unbounded_channel();
        match self.manager.open_logs(&id, tx).await {
            Ok(handle) => {
                self.log_stream = Some(handle);
                let msg_tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    while let Some(chunk) = rx.recv().await {
                        if msg_tx.send(Msg::LogChunk { generation, chunk }).is_err() {
                            break;
                        }
                    }
                });
                self.log_env = Some(name);
                self.view = View::Logs;
            }
            Err(e) => {
                self.toasts
                    .push(NoticeKind::Error, &format!("Log stream failed: {}", e));
            }
        }
    }

    /// Tear down the stream and buffer; any chunk still in flight carries
    /// a stale generation and is dropped.
    fn close_logs(&mut self) {
        if let Some(handle) = self.log_stream.take() {
            handle.close();
        }
        self.logs.clear();
        self.log_generation += 1;
        self.log_env = None;
        self.view = View::Main;
    }

    fn handle_logs_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.close_logs(),
            KeyCode::Up | KeyCode::Char('k') => self.log_scroll.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.log_scroll
                    .scroll_down(1, self.logs.len(), self.log_viewport)
            }
            KeyCode::PageUp => self.log_scroll.scroll_up(self.log_viewport),
            KeyCode::PageDown => {
                self.log_scroll
                    .scroll_down(self.log_viewport, self.logs.len(), self.log_viewport)
            }
            KeyCode::Char('G') | KeyCode::End => self
                .log_scroll
                .scroll_to_bottom(self.logs.len(), self.log_viewport),
            KeyCode::Home => {
                self.log_scroll.auto_scroll = false;
                self.log_scroll.offset = 0;
            }
            _ => {}
        }
    }

    // ==================== Settings ====================

    async fn handle_settings_key(&mut self, code: KeyCode) -> AppResult<()> {
        let Some(settings) = self.settings_state.as_mut() else {
            self.view = View::Main;
            return Ok(());
        };

        if settings.editing {
            match code {
                KeyCode::Enter => settings.commit_edit(),
                KeyCode::Esc => settings.cancel_edit(),
                KeyCode::Backspace => settings.input.backspace(),
                KeyCode::Delete => settings.input.delete(),
                KeyCode::Left => settings.input.move_left(),
                KeyCode::Right => settings.input.move_right(),
                KeyCode::Home => settings.input.home(),
                KeyCode::End => settings.input.end(),
                KeyCode::Char(c) => settings.input.insert(c),
                _ => {}
            }
            return Ok(());
        }

        match code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.settings_state = None;
                self.view = View::Main;
            }
            KeyCode::Up | KeyCode::Char('k') | KeyCode::BackTab => settings.prev_field(),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => settings.next_field(),
            KeyCode::Enter => settings.begin_edit(),
            KeyCode::Char('s') => match settings.build(&self.state.settings) {
                Ok(payload) => {
                    let mgr = Arc::clone(&self.manager);
                    let tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        let _ = mgr.update_settings(payload).await;
                        let _ = tx.send(Msg::Refreshed);
                    });
                    self.settings_state = None;
                    self.view = View::Main;
                }
                Err(e) => settings.error = Some(e),
            },
            _ => {}
        }
        Ok(())
    }

    // ==================== Folder manager ====================

    async fn handle_folders_key(&mut self, code: KeyCode) -> AppResult<()> {
        if let Some(edit) = self.folder_panel.edit.clone() {
            match code {
                KeyCode::Enter => {
                    let name = self.folder_panel.input.value().to_string();
                    self.folder_panel.edit = None;
                    let mgr = Arc::clone(&self.manager);
                    let tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        match edit {
                            FolderEdit::Create => {
                                let _ = mgr.create_folder(&name).await;
                            }
                            FolderEdit::Rename(id) => {
                                let _ = mgr.rename_folder(&id, &name).await;
                            }
                        }
                        let _ = tx.send(Msg::Refreshed);
                    });
                }
                KeyCode::Esc => self.folder_panel.edit = None,
                KeyCode::Backspace => self.folder_panel.input.backspace(),
                KeyCode::Char(c) => self.folder_panel.input.insert(c),
                KeyCode::Left => self.folder_panel.input.move_left(),
                KeyCode::Right => self.folder_panel.input.move_right(),
                _ => {}
            }
            return Ok(());
        }

        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.view = View::Main,
            KeyCode::Up | KeyCode::Char('k') => {
                self.folder_panel.selected = self.folder_panel.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.state.folders.len();
                if len > 0 {
                    self.folder_panel.selected = (self.folder_panel.selected + 1).min(len - 1);
                }
            }
            KeyCode::Char('n') => {
                self.folder_panel.edit = Some(FolderEdit::Create);
                self.folder_panel.input = TextInputState::new();
            }
            KeyCode::Char('r') => {
                if let Some(folder) = self.state.folders.get(self.folder_panel.selected) {
                    // Reserved folders are rejected by the manager with a
                    // toast and zero network calls
                    self.folder_panel.edit = Some(FolderEdit::Rename(folder.id.clone()));
                    self.folder_panel.input = TextInputState::with_value(&folder.name);
                }
            }
            KeyCode::Char('d') => {
                if let Some(folder) = self.state.folders.get(self.folder_panel.selected) {
                    let id = folder.id.clone();
                    let mgr = Arc::clone(&self.manager);
                    let tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        let _ = mgr.delete_folder(&id).await;
                        let _ = tx.send(Msg::Refreshed);
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ==================== Move to folder ====================

    /// Options in the move picker: "no folder" plus the user folders
    pub fn move_options(&self) -> Vec<(Option<String>, String)> {
        let mut options = vec![(None, "(no folder)".to_string())];
        options.extend(
            self.state
                .folders
                .iter()
                .filter(|f| !envdock_core::is_reserved(&f.id))
                .map(|f| (Some(f.id.clone()), f.name.clone())),
        );
        options
    }

    async fn handle_move_key(&mut self, code: KeyCode) -> AppResult<()> {
        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.view = View::Main,
            KeyCode::Up | KeyCode::Char('k') => {
                self.folder_pick = self.folder_pick.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.move_options().len();
                self.folder_pick = (self.folder_pick + 1).min(len - 1);
            }
            KeyCode::Enter => {
                let target = self.move_options().into_iter().nth(self.folder_pick);
                if let (Some(env), Some((folder, _))) = (self.selected_environment(), target) {
                    let id = env.id.clone();
                    let mgr = Arc::clone(&self.manager);
                    let tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        let _ = mgr.move_to_folder(&id, folder.as_deref()).await;
                        let _ = tx.send(Msg::Refreshed);
                    });
                }
                self.view = View::Main;
            }
            _ => {}
        }
        Ok(())
    }

    // ==================== Rename ====================

    async fn handle_rename_key(&mut self, code: KeyCode) -> AppResult<()> {
        let Some(prompt) = self.rename.as_mut() else {
            self.view = View::Main;
            return Ok(());
        };
        match code {
            KeyCode::Enter => {
                let id = prompt.id.clone();
                let name = prompt.input.value().to_string();
                self.rename = None;
                self.view = View::Main;

                let mgr = Arc::clone(&self.manager);
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let _ = mgr.rename(&id, &name).await;
                    let _ = tx.send(Msg::Refreshed);
                });
            }
            KeyCode::Esc => {
                self.rename = None;
                self.view = View::Main;
            }
            KeyCode::Backspace => prompt.input.backspace(),
            KeyCode::Left => prompt.input.move_left(),
            KeyCode::Right => prompt.input.move_right(),
            KeyCode::Char(c) => prompt.input.insert(c),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envdock_config::GlobalConfig;
    use envdock_core::test_support::{mock_environment, MockApi, MockCall};
    use envdock_core::Notifier;

    async fn test_app(api: Arc<MockApi>) -> App {
        let toasts = Toasts::new();
        let manager = Arc::new(EnvironmentManager::new(
            api as Arc<dyn envdock_api::EnvdockApi>,
            Arc::new(toasts.clone()) as Arc<dyn Notifier>,
            GlobalConfig::default(),
        ));
        let mut app = App::new(Arc::clone(&manager), toasts).await;
        // Deterministic state for key tests
        manager.refresh().await.ok();
        app.state = manager.view().await;
        app
    }

    #[tokio::test]
    async fn test_quit_keys() {
        let mut app = test_app(Arc::new(MockApi::new())).await;
        app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE)
            .await
            .unwrap();
        assert!(app.should_quit);

        let mut app = test_app(Arc::new(MockApi::new())).await;
        app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL)
            .await
            .unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_open_create_dialog() {
        let mut app = test_app(Arc::new(MockApi::new())).await;
        app.handle_key(KeyCode::Char('n'), KeyModifiers::NONE)
            .await
            .unwrap();
        assert_eq!(app.view, View::Create);
        assert!(app.create.is_some());
        assert_eq!(app.manager.view().await.create_step, CreateStep::Editing);
    }

    #[tokio::test]
    async fn test_close_create_dialog() {
        let mut app = test_app(Arc::new(MockApi::new())).await;
        app.handle_key(KeyCode::Char('n'), KeyModifiers::NONE)
            .await
            .unwrap();
        app.state = app.manager.view().await;
        app.handle_key(KeyCode::Esc, KeyModifiers::NONE)
            .await
            .unwrap();
        assert_eq!(app.view, View::Main);
        assert!(app.create.is_none());
        assert_eq!(app.manager.view().await.create_step, CreateStep::Closed);
    }

    #[tokio::test]
    async fn test_submit_invalid_form_shows_inline_error() {
        let api = Arc::new(MockApi::new());
        let mut app = test_app(Arc::clone(&api)).await;
        app.handle_key(KeyCode::Char('n'), KeyModifiers::NONE)
            .await
            .unwrap();
        app.state = app.manager.view().await;

        // Empty name: submit must fail locally
        app.handle_key(KeyCode::Char('s'), KeyModifiers::NONE)
            .await
            .unwrap();
        assert!(app.create.as_ref().unwrap().error.is_some());
        assert_eq!(api.count_calls(|c| matches!(c, MockCall::Create { .. })), 0);
    }

    #[tokio::test]
    async fn test_folder_cycle_selects_in_manager() {
        let api = Arc::new(MockApi::new());
        let mut app = test_app(Arc::clone(&api)).await;
        assert_eq!(app.state.folders.len(), 2);

        app.handle_key(KeyCode::Tab, KeyModifiers::NONE)
            .await
            .unwrap();
        assert_eq!(app.folder_idx, 1);
        assert_eq!(app.manager.view().await.selected_folder, "deleted");

        app.handle_key(KeyCode::Tab, KeyModifiers::NONE)
            .await
            .unwrap();
        assert_eq!(app.manager.view().await.selected_folder, "all");
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let api = Arc::new(MockApi::new());
        *api.list_result.lock().unwrap() = Ok(vec![mock_environment("1", "a")]);
        let mut app = test_app(Arc::clone(&api)).await;

        app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE)
            .await
            .unwrap();
        assert_eq!(app.view, View::Confirm);
        assert!(matches!(
            app.confirm_action,
            Some(ConfirmAction::Delete(ref id)) if id == "1"
        ));
        assert_eq!(api.count_calls(|c| matches!(c, MockCall::Delete { .. })), 0);

        // Declining leaves everything untouched
        app.handle_key(KeyCode::Esc, KeyModifiers::NONE)
            .await
            .unwrap();
        assert_eq!(app.view, View::Main);
        assert!(app.confirm_action.is_none());
        assert_eq!(api.count_calls(|c| matches!(c, MockCall::Delete { .. })), 0);
    }

    #[tokio::test]
    async fn test_stale_log_chunks_are_dropped() {
        let mut app = test_app(Arc::new(MockApi::new())).await;
        app.view = View::Logs;
        app.log_generation = 2;

        app.handle_msg(Msg::LogChunk {
            generation: 1,
            chunk: "stale\n".to_string(),
        })
        .await;
        assert!(app.logs.is_empty());

        app.handle_msg(Msg::LogChunk {
            generation: 2,
            chunk: "fresh\n".to_string(),
        })
        .await;
        assert_eq!(app.logs.lines(), &["fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_close_logs_clears_buffer_and_bumps_generation() {
        let mut app = test_app(Arc::new(MockApi::new())).await;
        app.view = View::Logs;
        let generation = app.log_generation;
        app.logs.push_chunk("line\n");

        app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE)
            .await
            .unwrap();
        assert_eq!(app.view, View::Main);
        assert!(app.logs.is_empty());
        assert!(app.log_generation > generation);
    }

    #[tokio::test]
    async fn test_toggle_skips_busy_environment() {
        let api = Arc::new(MockApi::new());
        *api.list_result.lock().unwrap() = Ok(vec![mock_environment("1", "a")]);
        let mut app = test_app(Arc::clone(&api)).await;
        app.state.activating.insert("1".to_string());

        app.handle_key(KeyCode::Enter, KeyModifiers::NONE)
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(
            api.count_calls(|c| matches!(c, MockCall::Activate { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_move_options_exclude_reserved() {
        let api = Arc::new(MockApi::new());
        *api.settings_result.lock().unwrap() = Ok(envdock_api::UserSettings {
            folders: vec![envdock_api::Folder {
                id: "f1".to_string(),
                name: "Projects".to_string(),
                icon: None,
            }],
            ..Default::default()
        });
        let mut app = test_app(Arc::clone(&api)).await;
        app.manager.load_settings().await.unwrap();
        app.state = app.manager.view().await;

        let options = app.move_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].0, None);
        assert_eq!(options[1].0.as_deref(), Some("f1"));
    }
}
