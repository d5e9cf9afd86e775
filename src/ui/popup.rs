use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

fn title_span(title: &str) -> Span<'static> {
    Span::styled(
        format!(" {} ", title),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
}

/// Centered informational popup; any key closes it
pub fn render_message(frame: &mut Frame, title: &str, message: &[&str]) {
    let height = message.len() as u16 + 4;
    let area = centered_rect(64, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];
    lines.extend(message.iter().map(|m| Line::from(m.to_string())));
    lines.push(Line::from(Span::styled(
        "press any key",
        Style::default().fg(Color::DarkGray),
    )));

    let popup = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title_span(title)))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(popup, area);
}

/// Field errors of a rejected form, with the way back into the editor
pub fn render_errors(frame: &mut Frame, title: &str, errors: &[String]) {
    let height = (errors.len() as u16 + 4).min(frame.area().height);
    let area = centered_rect(70, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines: Vec<Line> = errors
        .iter()
        .map(|e| Line::from(Span::styled(format!("- {}", e), Style::default().fg(Color::Red))))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("[e]", Style::default().fg(Color::Green)),
        Span::raw("dit again  "),
        Span::styled("[any key]", Style::default().fg(Color::Gray)),
        Span::raw(" close, draft is kept"),
    ]));

    let popup = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title_span(title)))
        .wrap(Wrap { trim: false });

    frame.render_widget(popup, area);
}

/// Rect of the given size centered in `outer`, clipped to it
fn centered_rect(width: u16, height: u16, outer: Rect) -> Rect {
    let popup_width = width.min(outer.width);
    let popup_height = height.min(outer.height);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((outer.height.saturating_sub(popup_height)) / 2),
            Constraint::Length(popup_height),
            Constraint::Min(0),
        ])
        .split(outer);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((outer.width.saturating_sub(popup_width)) / 2),
            Constraint::Length(popup_width),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    horizontal[1]
}
