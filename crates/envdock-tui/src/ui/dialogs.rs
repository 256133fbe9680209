use super::*;
use crate::app::ConfirmAction;
use crate::create_state::CreateField;
use crate::settings::SettingsField;
use envdock_core::{is_reserved, CreateStep};

/// Render an edit buffer with a visible cursor bar
fn edit_display(input: &crate::widgets::TextInputState) -> String {
    let cursor = input.cursor();
    let before = &input.value()[..cursor];
    let after = &input.value()[cursor..];
    format!("{}│{}", before, after)
}

pub(super) fn draw_create_dialog(frame: &mut Frame, app: &App, area: Rect) {
    let Some(dialog) = app.create.as_ref() else {
        return;
    };

    let mut items: Vec<ListItem> = Vec::new();

    for field in CreateField::ORDER {
        let is_focused = dialog.field == field;
        let style = if is_focused {
            Style::default().bg(Color::DarkGray).fg(Color::White)
        } else {
            Style::default()
        };

        if field == CreateField::Mounts {
            items.push(ListItem::new(Line::from(Span::styled(
                format!(" {}", field.label()),
                style.bold(),
            ))));
            if dialog.form.mounts.is_empty() {
                items.push(ListItem::new(Line::from(Span::styled(
                    "   (none)",
                    Style::default().fg(Color::DarkGray),
                ))));
            }
            for (i, entry) in dialog.form.mounts.iter().enumerate() {
                let row_style = if is_focused && i == dialog.mount_row {
                    Style::default().bg(Color::DarkGray).fg(Color::White)
                } else {
                    Style::default()
                };
                items.push(ListItem::new(Line::from(vec![
                    Span::styled(format!("   {:<16}", entry.directory), row_style),
                    Span::styled(format!("[{}]", entry.action), row_style.fg(Color::Cyan)),
                ])));
            }
            continue;
        }

        let value = if dialog.editing && is_focused {
            edit_display(&dialog.input)
        } else {
            let v = dialog.field_value(field);
            if v.is_empty() {
                "(not set)".to_string()
            } else {
                v
            }
        };

        items.push(ListItem::new(Line::from(vec![
            Span::styled(format!(" {:<18}", field.label()), style.bold()),
            Span::styled(value, style),
        ])));
    }

    if let Some(error) = &dialog.error {
        items.push(ListItem::new(Line::from("")));
        items.push(ListItem::new(Line::from(Span::styled(
            format!(" {}", error),
            Style::default().fg(Color::Red),
        ))));
    }

    let list = List::new(items).block(
        Block::default()
            .title(" New Environment ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

/// Overlay for the prerequisite steps of the creation sequence
pub(super) fn draw_create_sub_dialog(frame: &mut Frame, app: &App, area: Rect) {
    match app.state.create_step {
        CreateStep::CheckingPath | CreateStep::CheckingImage | CreateStep::Submitting => {
            let label = match app.state.create_step {
                CreateStep::CheckingPath => "Checking ComfyUI path...",
                CreateStep::CheckingImage => "Checking base image...",
                _ => "Creating environment...",
            };
            let popup = popup_rect(40, 15, 36, 3, area);
            frame.render_widget(Clear, popup);
            let busy = Paragraph::new(label)
                .alignment(Alignment::Center)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Yellow)),
                );
            frame.render_widget(busy, popup);
        }
        CreateStep::InstallPrereqOpen => {
            let popup = popup_rect(50, 25, 44, 6, area);
            frame.render_widget(Clear, popup);
            let prompt = Paragraph::new(
                "No ComfyUI installation was found at that path.\n\n\
                 Install it there now?",
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(" Install ComfyUI ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)),
            );
            frame.render_widget(prompt, popup);
        }
        CreateStep::PullImageOpen => {
            let popup = popup_rect(50, 20, 44, 5, area);
            frame.render_widget(Clear, popup);
            let ratio = (app.pull_progress / 100.0).clamp(0.0, 1.0);
            let gauge = Gauge::default()
                .block(
                    Block::default()
                        .title(" Pulling image ")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .gauge_style(Style::default().fg(Color::Cyan))
                .ratio(ratio)
                .label(format!("{:.0}%", app.pull_progress));
            frame.render_widget(gauge, popup);
        }
        _ => {}
    }
}

pub(super) fn draw_confirm_dialog(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ConfirmAction::Delete(id)) = app.confirm_action.as_ref() else {
        return;
    };
    let name = app
        .state
        .all_environments
        .iter()
        .find(|e| &e.id == id)
        .map(|e| e.name.as_str())
        .unwrap_or(id.as_str());

    let popup = popup_rect(45, 20, 40, 6, area);
    frame.render_widget(Clear, popup);
    let prompt = Paragraph::new(format!("Delete environment '{}'?", name))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(" Confirm ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    frame.render_widget(prompt, popup);
}

pub(super) fn draw_settings_dialog(frame: &mut Frame, app: &App, area: Rect) {
    let Some(settings) = app.settings_state.as_ref() else {
        return;
    };

    let mut items: Vec<ListItem> = Vec::new();
    for field in SettingsField::ORDER {
        let is_focused = settings.field == field;
        let style = if is_focused {
            Style::default().bg(Color::DarkGray).fg(Color::White)
        } else {
            Style::default()
        };

        let value = if settings.editing && is_focused {
            edit_display(&settings.input)
        } else {
            let v = settings.field_value(field);
            if v.is_empty() {
                "(not set)".to_string()
            } else {
                v.to_string()
            }
        };

        items.push(ListItem::new(Line::from(vec![
            Span::styled(format!(" {:<18}", field.label()), style.bold()),
            Span::styled(value, style),
        ])));
    }

    if let Some(error) = &settings.error {
        items.push(ListItem::new(Line::from("")));
        items.push(ListItem::new(Line::from(Span::styled(
            format!(" {}", error),
            Style::default().fg(Color::Red),
        ))));
    }

    let list = List::new(items).block(
        Block::default()
            .title(" Settings ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

pub(super) fn draw_folder_panel(frame: &mut Frame, app: &App, area: Rect) {
    let mut items: Vec<ListItem> = app
        .state
        .folders
        .iter()
        .enumerate()
        .map(|(i, folder)| {
            let reserved = is_reserved(&folder.id);
            let mut style = if i == app.folder_panel.selected {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            if reserved {
                style = style.fg(Color::DarkGray);
            }
            let label = if reserved {
                format!(" {} (built-in)", folder.name)
            } else {
                format!(" {}", folder.name)
            };
            ListItem::new(Line::from(Span::styled(label, style)))
        })
        .collect();

    if app.folder_panel.edit.is_some() {
        items.push(ListItem::new(Line::from("")));
        items.push(ListItem::new(Line::from(vec![
            Span::styled(" Name: ", Style::default().bold()),
            Span::raw(edit_display(&app.folder_panel.input)),
        ])));
    }

    let list = List::new(items).block(
        Block::default()
            .title(folder_panel_title(&app.folder_panel.edit))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

pub(super) fn draw_move_picker(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .move_options()
        .into_iter()
        .enumerate()
        .map(|(i, (_, name))| {
            let style = if i == app.folder_pick {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(format!(" {}", name), style)))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Move to Folder ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

pub(super) fn draw_rename_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let Some(prompt) = app.rename.as_ref() else {
        return;
    };
    let paragraph = Paragraph::new(edit_display(&prompt.input)).block(
        Block::default()
            .title(" Rename ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(paragraph, area);
}

pub(super) fn draw_help(frame: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("Environment List", Style::default().bold().underlined())),
        Line::from(""),
        Line::from("  j/Down      Move selection down"),
        Line::from("  k/Up        Move selection up"),
        Line::from("  Tab/→       Next folder"),
        Line::from("  Shift+Tab/← Previous folder"),
        Line::from(""),
        Line::from("  Enter/a     Activate or deactivate the environment"),
        Line::from("  n           New environment"),
        Line::from("  d           Delete environment"),
        Line::from("  D           Duplicate environment"),
        Line::from("  r           Rename environment"),
        Line::from("  m           Move to folder"),
        Line::from("  l           Logs (running environments)"),
        Line::from(""),
        Line::from("  f           Manage folders"),
        Line::from("  s           Settings"),
        Line::from("  ?           Show this help"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(Span::styled("Creation Dialog", Style::default().bold().underlined())),
        Line::from(""),
        Line::from("  Tab/j/k     Move between fields"),
        Line::from("  Enter       Edit the focused text field"),
        Line::from("  ←/→         Cycle release or environment type"),
        Line::from("  Space       Toggle mount/copy on the focused mount row"),
        Line::from("  x           Remove the focused mount row"),
        Line::from("  s           Create"),
    ];

    let help = Paragraph::new(text)
        .block(Block::default().title(" Help ").borders(Borders::ALL))
        .wrap(Wrap { trim: true });

    frame.render_widget(help, area);
}
