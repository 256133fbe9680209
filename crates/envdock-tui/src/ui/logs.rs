use super::*;
use ratatui::widgets::block::{Position, Title};

pub(super) fn draw_logs(frame: &mut Frame, app: &mut App, area: Rect) {
    let viewport = area.height.saturating_sub(2) as usize;
    app.log_viewport = viewport;
    app.log_scroll.follow(app.logs.len(), viewport);

    let lines = app.logs.display_lines();
    let offset = app.log_scroll.offset.min(lines.len());
    let visible: Vec<Line> = lines
        .iter()
        .skip(offset)
        .take(viewport)
        .map(|l| Line::from(l.to_string()))
        .collect();

    let title = match &app.log_env {
        Some(name) => format!(" Logs - {} ", name),
        None => " Logs ".to_string(),
    };
    let marker = if app.log_scroll.auto_scroll {
        " following "
    } else {
        " paused "
    };

    let paragraph = Paragraph::new(visible).block(
        Block::default()
            .title(title)
            .title(
                Title::from(marker)
                    .position(Position::Bottom)
                    .alignment(Alignment::Right),
            )
            .borders(Borders::ALL),
    );

    frame.render_widget(paragraph, area);
}
