use super::*;
use crate::app::FolderEdit;
use envdock_core::{CreateStep, NoticeKind};

pub(super) fn draw_header_with_folders(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = app
        .state
        .folders
        .iter()
        .enumerate()
        .map(|(i, folder)| {
            if i == app.folder_idx {
                Line::from(Span::styled(
                    folder.name.clone(),
                    Style::default().fg(Color::White).bold(),
                ))
            } else {
                Line::from(Span::styled(
                    folder.name.clone(),
                    Style::default().fg(Color::Gray),
                ))
            }
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(" envdock - ComfyUI Environment Manager ")
                .title_style(Style::default().fg(Color::Cyan).bold())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .select(app.folder_idx)
        .style(Style::default())
        .highlight_style(Style::default())
        .divider(" │ ");

    frame.render_widget(tabs, area);
}

pub(super) fn draw_disconnection_warning(frame: &mut Frame, area: Rect) {
    let warning = Paragraph::new("Cannot reach the backend. Retrying; showing last known state.")
        .style(Style::default().fg(Color::Black).bg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(warning, area);
}

/// Build context-sensitive footer help for the environment list view
fn environment_list_footer(app: &App) -> String {
    if app.state.environments.is_empty() {
        return "n: New  Tab: Folders  f: Manage folders  s: Settings  ?: Help  q: Quit"
            .to_string();
    }

    let mut keys = Vec::new();
    if let Some(env) = app.selected_environment() {
        if app.state.is_busy(&env.id) {
            keys.push("(busy)");
        } else if env.status.is_running() {
            keys.push("Enter: Deactivate");
            keys.push("l: Logs");
        } else {
            keys.push("Enter: Activate");
        }
        keys.push("d: Delete");
        keys.push("D: Duplicate");
        keys.push("r: Rename");
        keys.push("m: Move");
    }

    format!(
        "j/k: Navigate  Tab: Folders  {}  n: New  ?: Help  q: Quit",
        keys.join("  ")
    )
}

/// Draw the footer with context-sensitive help
pub(super) fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    let help_text: String = match app.view {
        View::Main => environment_list_footer(app),
        View::Create => match app.state.create_step {
            CreateStep::InstallPrereqOpen => "y/Enter: Install  n/Esc: Back".to_string(),
            CreateStep::PullImageOpen => "Esc: Cancel pull".to_string(),
            CreateStep::CheckingPath | CreateStep::CheckingImage | CreateStep::Submitting => {
                "Working...".to_string()
            }
            _ => {
                let editing = app.create.as_ref().map(|d| d.editing).unwrap_or(false);
                if editing {
                    "Enter: Confirm  Esc: Cancel  Type to edit".to_string()
                } else {
                    "Tab/j/k: Navigate  Enter: Edit  ←/→: Cycle  Space: Toggle mount  s: Create  Esc: Close"
                        .to_string()
                }
            }
        },
        View::Logs => "j/k: Scroll  PgUp/PgDn: Page  G/End: Follow  Esc/q: Back".to_string(),
        View::Settings => {
            let editing = app
                .settings_state
                .as_ref()
                .map(|s| s.editing)
                .unwrap_or(false);
            if editing {
                "Enter: Confirm  Esc: Cancel  Type to edit".to_string()
            } else {
                "j/k: Navigate  Enter: Edit  s: Save  Esc: Close".to_string()
            }
        }
        View::Folders => {
            if app.folder_panel.edit.is_some() {
                "Enter: Confirm  Esc: Cancel  Type to edit".to_string()
            } else {
                "j/k: Navigate  n: New  r: Rename  d: Delete  Esc: Close".to_string()
            }
        }
        View::MoveToFolder => "j/k: Navigate  Enter: Move  Esc: Cancel".to_string(),
        View::Rename => "Enter: Rename  Esc: Cancel".to_string(),
        View::Help => "Press any key to close".to_string(),
        View::Confirm => "y/Enter: Yes  n/Esc: No".to_string(),
    };

    let footer = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(footer, area);
}

/// Render live toasts stacked in the bottom-right corner of the content
pub(super) fn draw_toasts(frame: &mut Frame, app: &App, area: Rect) {
    let toasts = app.toasts.visible();
    if toasts.is_empty() {
        return;
    }

    let width = area.width.min(46);
    for (i, toast) in toasts.iter().rev().take(4).enumerate() {
        let y = area.bottom().saturating_sub(1 + i as u16);
        if y < area.y {
            break;
        }
        let rect = Rect {
            x: area.right().saturating_sub(width),
            y,
            width,
            height: 1,
        };

        let style = match toast.kind {
            NoticeKind::Success => Style::default().fg(Color::Black).bg(Color::Green),
            NoticeKind::Error => Style::default().fg(Color::White).bg(Color::Red),
            NoticeKind::Info => Style::default().fg(Color::Black).bg(Color::Cyan),
        };

        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(format!(" {} ", toast.message)).style(style),
            rect,
        );
    }
}

/// Folder panel title helper, marks the edit mode
pub(super) fn folder_panel_title(edit: &Option<FolderEdit>) -> &'static str {
    match edit {
        Some(FolderEdit::Create) => " Folders - New ",
        Some(FolderEdit::Rename(_)) => " Folders - Rename ",
        None => " Folders ",
    }
}
