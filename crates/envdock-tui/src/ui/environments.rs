use super::*;
use envdock_api::{Environment, EnvironmentStatus};
use ratatui::widgets::TableState;

pub(super) fn draw_environments(frame: &mut Frame, app: &mut App, area: Rect) {
    if app.state.environments.is_empty() {
        let message = if app.state.selected_folder == envdock_core::DELETED_FOLDER_ID {
            "No deleted environments.".to_string()
        } else {
            "No environments in this folder.\n\n\
             Press 'n' to create one."
                .to_string()
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title(" Environments ").borders(Borders::ALL))
            .wrap(Wrap { trim: true });

        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from(" "),
        Cell::from("Name"),
        Cell::from("Status"),
        Cell::from("Release"),
        Cell::from("Port"),
        Cell::from("Image"),
    ])
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
    .bottom_margin(1);

    let rows: Vec<Row> = app
        .state
        .environments
        .iter()
        .map(|env| environment_row(app, env))
        .collect();

    let widths = [
        Constraint::Length(3),  // Status icon
        Constraint::Length(24), // Name
        Constraint::Length(14), // Status
        Constraint::Length(10), // Release
        Constraint::Length(6),  // Port
        Constraint::Min(16),    // Image (takes remaining)
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title(" Environments ").borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White))
        .highlight_symbol("▶ ");

    let mut table_state = TableState::default();
    table_state.select(Some(app.selected.min(app.state.environments.len() - 1)));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn environment_row<'a>(app: &App, env: &'a Environment) -> Row<'a> {
    let (status_symbol, status_text, status_color) = if app.state.deleting.contains(&env.id) {
        ("◐", "deleting...".to_string(), Color::Yellow)
    } else if app.state.activating.contains(&env.id) {
        ("◐", "working...".to_string(), Color::Yellow)
    } else {
        let symbol = match env.status {
            EnvironmentStatus::Running => "●",
            EnvironmentStatus::Exited => "○",
            EnvironmentStatus::Created => "◔",
            EnvironmentStatus::Dead => "✗",
            EnvironmentStatus::Unknown => "?",
        };
        let color = match env.status {
            EnvironmentStatus::Running => Color::Green,
            EnvironmentStatus::Exited => Color::DarkGray,
            EnvironmentStatus::Created => Color::Cyan,
            EnvironmentStatus::Dead => Color::Red,
            EnvironmentStatus::Unknown => Color::DarkGray,
        };
        (symbol, env.status.to_string(), color)
    };

    let release = env
        .options
        .comfyui_release
        .clone()
        .unwrap_or_else(|| "-".to_string());
    let port = env.options.port.clone().unwrap_or_else(|| "-".to_string());

    Row::new(vec![
        Cell::from(status_symbol).style(Style::default().fg(status_color)),
        Cell::from(env.name.clone()).style(Style::default().bold()),
        Cell::from(status_text).style(Style::default().fg(status_color)),
        Cell::from(release),
        Cell::from(port),
        Cell::from(env.image.clone()).style(Style::default().fg(Color::DarkGray)),
    ])
}
