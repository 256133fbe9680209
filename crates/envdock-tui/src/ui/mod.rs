//! UI rendering for the TUI application

mod dialogs;
mod environments;
mod header_footer;
mod logs;

use crate::app::{App, View};
use crate::widgets::popup_rect;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Gauge, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
};

use dialogs::*;
use environments::*;
use header_footer::*;
use logs::*;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
    let area = frame.size();

    let show_warning = !app.state.connected;

    let chunks = if show_warning {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header with folder tabs
                Constraint::Length(3), // Warning banner
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Footer
            ])
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header with folder tabs
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Footer
            ])
            .split(area)
    };

    draw_header_with_folders(frame, app, chunks[0]);

    let content_area;
    let footer_area;

    if show_warning {
        draw_disconnection_warning(frame, chunks[1]);
        content_area = chunks[2];
        footer_area = chunks[3];
    } else {
        content_area = chunks[1];
        footer_area = chunks[2];
    }

    match app.view {
        View::Main => draw_environments(frame, app, content_area),
        View::Create => {
            draw_environments(frame, app, content_area);
            let popup = popup_rect(70, 80, 54, 22, content_area);
            frame.render_widget(Clear, popup);
            draw_create_dialog(frame, app, popup);
            draw_create_sub_dialog(frame, app, area);
        }
        View::Logs => draw_logs(frame, app, content_area),
        View::Settings => {
            draw_environments(frame, app, content_area);
            let popup = popup_rect(60, 50, 50, 12, content_area);
            frame.render_widget(Clear, popup);
            draw_settings_dialog(frame, app, popup);
        }
        View::Folders => {
            draw_environments(frame, app, content_area);
            let popup = popup_rect(50, 60, 40, 12, content_area);
            frame.render_widget(Clear, popup);
            draw_folder_panel(frame, app, popup);
        }
        View::MoveToFolder => {
            draw_environments(frame, app, content_area);
            let popup = popup_rect(40, 50, 34, 9, content_area);
            frame.render_widget(Clear, popup);
            draw_move_picker(frame, app, popup);
        }
        View::Rename => {
            draw_environments(frame, app, content_area);
            let popup = popup_rect(50, 20, 40, 5, content_area);
            frame.render_widget(Clear, popup);
            draw_rename_prompt(frame, app, popup);
        }
        View::Help => draw_help(frame, content_area),
        View::Confirm => {
            draw_environments(frame, app, content_area);
            draw_confirm_dialog(frame, app, area);
        }
    }

    draw_footer(frame, app, footer_area);
    draw_toasts(frame, app, content_area);
}
