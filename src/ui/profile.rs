use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use super::follow_span;
use crate::app::App;
use crate::types::Profile;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(profile) = &app.profile else {
        let message = if app.profile_loading {
            Span::styled("Loading profile...", Style::default().fg(Color::Yellow))
        } else {
            Span::styled("Profile unavailable", Style::default().fg(Color::Gray))
        };
        let empty = Paragraph::new(Line::from(message))
            .block(Block::default().borders(Borders::ALL).title(" Profile "));
        frame.render_widget(empty, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    render_summary(frame, app, profile, chunks[0]);
    render_details(frame, app, profile, chunks[1]);
}

fn render_summary(frame: &mut Frame, app: &App, profile: &Profile, area: Rect) {
    let mut first = vec![
        Span::styled(
            profile.name.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  @{}  ", profile.username),
            Style::default().fg(Color::Cyan),
        ),
    ];
    match follow_span(app, &profile.id, profile.is_following) {
        Some(control) => first.push(control),
        None => first.push(Span::styled(
            "(you) e: edit profile",
            Style::default().fg(Color::DarkGray),
        )),
    }

    let counts = Line::from(Span::styled(
        format!(
            "{} followers  {} following",
            profile.followers, profile.following
        ),
        Style::default().fg(Color::Gray),
    ));
    let location = Line::from(Span::styled(
        profile.location.clone().unwrap_or_default(),
        Style::default().fg(Color::Gray),
    ));

    let summary = Paragraph::new(vec![Line::from(first), counts, location])
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(summary, area);
}

fn render_details(frame: &mut Frame, app: &App, profile: &Profile, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();

    if let Some(bio) = profile.bio.as_deref().filter(|b| !b.is_empty()) {
        lines.push(Line::from(bio.to_string()));
        lines.push(Line::from(""));
    }

    let social = &profile.social;
    for (name, value) in [
        ("website", &social.website),
        ("twitter", &social.twitter),
        ("github", &social.github),
        ("linkedin", &social.linkedin),
    ] {
        if !value.is_empty() {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<10}", name), label),
                Span::raw(value.clone()),
            ]));
        }
    }
    lines.push(Line::from(vec![
        Span::styled(format!("{:<10}", "page"), label),
        Span::styled(
            app.web_url(&format!("u/{}", profile.username)),
            Style::default().fg(Color::Blue),
        ),
    ]));

    let details = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" About "))
        .wrap(Wrap { trim: false });
    frame.render_widget(details, area);
}
