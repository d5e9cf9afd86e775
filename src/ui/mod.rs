mod feed;
mod popup;
mod profile;

use chrono::{DateTime, Utc};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::action::InputKind;
use crate::app::{App, Popup, Screen};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match app.screen {
        Screen::Feed => feed::render(frame, app, chunks[1]),
        Screen::Profile => profile::render(frame, app, chunks[1]),
    }

    render_status_bar(frame, app, chunks[2]);

    match &app.popup {
        Some(Popup::SignIn) => popup::render_message(
            frame,
            "Sign in required",
            &[
                "This needs a signed-in PixelShelf account.",
                "Set PIXELSHELF_TOKEN (or api.token_command) and restart.",
            ],
        ),
        Some(Popup::Validation(errors)) => {
            let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            popup::render_errors(frame, "Profile not saved", &lines);
        }
        None => {}
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.screen {
        Screen::Feed => format!("pixelshelf - {}", app.feeds.active()),
        Screen::Profile => match &app.profile {
            Some(profile) => format!("pixelshelf - {} (@{})", profile.name, profile.username),
            None => "pixelshelf - Profile".to_string(),
        },
    };
    let user = match app.session.current_user() {
        Some(user) => format!("@{} ", user.username),
        None => "not signed in ".to_string(),
    };

    let width = area.width as usize;
    let padding = width.saturating_sub(title.chars().count() + user.chars().count());
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(user, Style::default().fg(Color::Gray)),
    ]))
    .style(Style::default().bg(Color::DarkGray));

    frame.render_widget(header, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some((kind, buffer)) = &app.input {
        let prompt = match kind {
            InputKind::Search => "Search: ",
            InputKind::Tags => "Tags (comma separated): ",
        };
        Line::from(vec![
            Span::styled(prompt, Style::default().fg(Color::Yellow)),
            Span::raw(buffer.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ])
    } else if let Some(notification) = &app.notification {
        let color = if notification.is_error {
            Color::Red
        } else {
            Color::Green
        };
        Line::from(Span::styled(
            notification.message.clone(),
            Style::default().fg(color),
        ))
    } else if app.saving_profile {
        Line::from(Span::styled(
            "Saving profile...",
            Style::default().fg(Color::Yellow),
        ))
    } else {
        let help = match app.screen {
            Screen::Feed => {
                "1-4/Tab: tabs | hjkl: nav | Enter: open | /: search | #: tags | y: type | s: sort | v: view | i: paging | f: follow | p: profile | q: quit"
            }
            Screen::Profile => "f: follow | e: edit profile | o: open | Y: yank url | r: reload | q: back",
        };
        Line::from(Span::styled(help, Style::default().fg(Color::Gray)))
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

/// `[Follow]` / `[Following]` control, or nothing on the user's own card
fn follow_span(app: &App, user_id: &str, baseline: bool) -> Option<Span<'static>> {
    let (label, pending) = app.follow_control(user_id, baseline)?;
    let style = if pending {
        Style::default().fg(Color::DarkGray)
    } else if label == "Following" {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    };
    Some(Span::styled(format!("[{}]", label), style))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn format_age(created_at: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(created_at);
    if age.num_days() > 0 {
        format!("{}d", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h", age.num_hours())
    } else {
        format!("{}m", age.num_minutes().max(0))
    }
}
