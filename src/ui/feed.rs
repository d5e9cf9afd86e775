use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs, Wrap};
use ratatui::Frame;

use super::{follow_span, format_age, truncate};
use crate::app::{App, FeedGeometry};
use crate::feed::{FeedSource, GridLayout, RetrievalMode};
use crate::types::{Asset, Creator, Item};

const SIDECARD_WIDTH: u16 = 42;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_tabs(frame, app, chunks[0]);
    render_filters(frame, app, chunks[1]);
    render_cards(frame, app, chunks[2]);
    render_footer(frame, app, chunks[3]);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<String> = FeedSource::ALL
        .iter()
        .enumerate()
        .map(|(i, source)| format!("[{}] {}", i + 1, source))
        .collect();

    let paging = match app.feeds.mode() {
        RetrievalMode::Infinite => "infinite",
        RetrievalMode::Paged => "paged",
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default().borders(Borders::ALL).title(Span::styled(
                format!(" {} view | {} ", app.view.view_mode(), paging),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
        )
        .select(app.feeds.active().index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(tabs, area);
}

fn render_filters(frame: &mut Frame, app: &App, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);

    let mut spans = vec![
        Span::styled(" sort ", label),
        Span::styled(app.feeds.sort_for(app.feeds.active()).to_string(), value),
    ];
    if let Some(search) = app.feeds.search() {
        spans.push(Span::styled("  search ", label));
        spans.push(Span::styled(format!("\"{}\"", search), value));
    }
    if let Some((first, rest)) = app.feeds.selected_tags().split_first() {
        spans.push(Span::styled("  tag ", label));
        spans.push(Span::styled(format!("#{}", first), value));
        if !rest.is_empty() {
            spans.push(Span::styled(format!(" (+{} ignored)", rest.len()), label));
        }
    }
    if let Some(asset_type) = app.feeds.selected_type() {
        spans.push(Span::styled("  type ", label));
        spans.push(Span::styled(asset_type.to_string(), value));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_placeholder(frame: &mut Frame, area: Rect, lines: Vec<Line<'static>>) {
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    let top = area.height / 3;
    let inner = Rect {
        y: area.y + top,
        height: area.height.saturating_sub(top),
        ..area
    };
    frame.render_widget(paragraph, inner);
}

fn render_cards(frame: &mut Frame, app: &App, area: Rect) {
    let feed = app.feeds.select_active_feed(&app.session);

    if feed.needs_sign_in {
        render_placeholder(
            frame,
            area,
            vec![
                Line::from(Span::styled(
                    "Sign in to see what the creators you follow are making",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Set PIXELSHELF_TOKEN or configure api.token_command, then restart.",
                    Style::default().fg(Color::Gray),
                )),
            ],
        );
        return;
    }

    if feed.data.is_empty() {
        let line = if feed.is_loading {
            Line::from(Span::styled("Loading...", Style::default().fg(Color::Yellow)))
        } else if let Some(error) = feed.error {
            Line::from(Span::styled(
                format!("Could not load {}: {} (r to retry)", feed.source, error),
                Style::default().fg(Color::Red),
            ))
        } else {
            Line::from(Span::styled(
                "Nothing here yet",
                Style::default().fg(Color::Gray),
            ))
        };
        render_placeholder(frame, area, vec![line]);
        return;
    }

    let geometry = app.feed_geometry();
    let (cards_area, side_area) = if geometry.layout.has_sidecard() && area.width > SIDECARD_WIDTH * 2
    {
        let split = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(SIDECARD_WIDTH)])
            .split(area);
        (split[0], Some(split[1]))
    } else {
        (area, None)
    };

    render_grid(frame, app, &feed.data, geometry, cards_area);

    if let Some(side_area) = side_area {
        if let Some(item) = feed.data.get(app.selected) {
            render_sidecard(frame, item, side_area);
        }
    }
}

fn render_grid(frame: &mut Frame, app: &App, items: &[&Item], geometry: FeedGeometry, area: Rect) {
    let card_height = geometry.card_height as u16;
    let compact = !matches!(geometry.layout, GridLayout::Columns(_));

    for (offset, row) in (app.scroll_row..app.scroll_row + geometry.visible_rows).enumerate() {
        let y = area.y + offset as u16 * card_height;
        if y + card_height > area.y + area.height {
            break;
        }
        let row_area = Rect {
            y,
            height: card_height,
            ..area
        };
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![
                Constraint::Ratio(1, geometry.columns as u32);
                geometry.columns
            ])
            .split(row_area);

        for (column, cell) in cells.iter().enumerate() {
            let index = row * geometry.columns + column;
            let Some(item) = items.get(index) else {
                return;
            };
            render_card(frame, app, item, index == app.selected, compact, *cell);
        }
    }
}

fn render_card(frame: &mut Frame, app: &App, item: &Item, selected: bool, compact: bool, area: Rect) {
    let border = if selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title_style = if selected {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let width = area.width.saturating_sub(4) as usize;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Span::styled(
            format!(" {} ", truncate(item.title(), width)),
            title_style,
        ));

    let lines = match item {
        Item::Asset(asset) if compact => vec![asset_summary(asset, width)],
        Item::Asset(asset) => asset_lines(asset, width),
        Item::Creator(creator) if compact => vec![creator_summary(app, creator, width)],
        Item::Creator(creator) => creator_lines(app, creator, width),
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn meta() -> Style {
    Style::default().fg(Color::Gray)
}

fn asset_summary(asset: &Asset, width: usize) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("@{}", asset.author), Style::default().fg(Color::Cyan)),
        Span::styled(
            truncate(
                &format!(
                    "  {}  {} likes  {} comments  {}",
                    asset.asset_type,
                    asset.likes,
                    asset.comments,
                    format_age(asset.created_at)
                ),
                width.saturating_sub(asset.author.chars().count() + 1),
            ),
            meta(),
        ),
    ])
}

fn asset_lines(asset: &Asset, width: usize) -> Vec<Line<'static>> {
    let tags = asset
        .tags
        .iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ");
    vec![
        Line::from(vec![
            Span::styled(
                truncate(&format!("@{}", asset.author), width),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(Span::styled(
            truncate(&format!("{} | {}", asset.asset_type, format_age(asset.created_at)), width),
            meta(),
        )),
        Line::from(Span::styled(truncate(&tags, width), Style::default().fg(Color::Magenta))),
        Line::from(Span::styled(
            truncate(
                &format!("{} likes  {} comments", asset.likes, asset.comments),
                width,
            ),
            meta(),
        )),
    ]
}

fn creator_summary(app: &App, creator: &Creator, width: usize) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            format!("@{}", creator.username),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("  {} followers  {} assets  ", creator.followers, creator.assets),
            meta(),
        ),
    ];
    if let Some(control) = follow_span(app, &creator.id, creator.is_following) {
        spans.push(control);
    }
    let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    if used > width {
        spans.truncate(1);
    }
    Line::from(spans)
}

fn creator_lines(app: &App, creator: &Creator, width: usize) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            truncate(&format!("@{}", creator.username), width),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(Span::styled(
            truncate(creator.bio.as_deref().unwrap_or(""), width),
            Style::default().fg(Color::White),
        )),
        Line::from(Span::styled(
            truncate(
                &format!("{} followers  {} assets", creator.followers, creator.assets),
                width,
            ),
            meta(),
        )),
    ];
    if let Some(control) = follow_span(app, &creator.id, creator.is_following) {
        lines.push(Line::from(control));
    }
    lines
}

fn render_sidecard(frame: &mut Frame, item: &Item, area: Rect) {
    let heading = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let mut lines = vec![Line::from(Span::styled(item.title().to_string(), heading))];
    match item {
        Item::Asset(asset) => {
            lines.push(Line::from(Span::styled(
                format!("by @{} | {}", asset.author, asset.asset_type),
                Style::default().fg(Color::Cyan),
            )));
            lines.push(Line::from(""));
            if let Some(description) = &asset.description {
                lines.push(Line::from(description.clone()));
                lines.push(Line::from(""));
            }
            if !asset.tags.is_empty() {
                let tags = asset
                    .tags
                    .iter()
                    .map(|t| format!("#{}", t))
                    .collect::<Vec<_>>()
                    .join(" ");
                lines.push(Line::from(Span::styled(
                    tags,
                    Style::default().fg(Color::Magenta),
                )));
            }
            lines.push(Line::from(Span::styled(
                format!(
                    "{} likes  {} comments  {} ago",
                    asset.likes,
                    asset.comments,
                    format_age(asset.created_at)
                ),
                meta(),
            )));
        }
        Item::Creator(creator) => {
            lines.push(Line::from(Span::styled(
                format!("@{}", creator.username),
                Style::default().fg(Color::Cyan),
            )));
            lines.push(Line::from(""));
            if let Some(bio) = &creator.bio {
                lines.push(Line::from(bio.clone()));
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(
                format!(
                    "{} followers  {} assets",
                    creator.followers, creator.assets
                ),
                meta(),
            )));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        item.url().to_string(),
        Style::default().fg(Color::DarkGray),
    )));

    let card = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Details "),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(card, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let feed = app.feeds.select_active_feed(&app.session);
    if feed.needs_sign_in || feed.data.is_empty() {
        return;
    }

    let count = Span::styled(
        format!(" {} of {} loaded  ", app.selected + 1, feed.data.len()),
        meta(),
    );
    let state = if let Some(error) = feed.error {
        Span::styled(
            format!("{} (r to retry)", error),
            Style::default().fg(Color::Red),
        )
    } else if feed.is_loading_more {
        Span::styled("Loading more...", Style::default().fg(Color::Yellow))
    } else if feed.has_more && app.feeds.mode() == RetrievalMode::Paged {
        Span::styled("m: load more", Style::default().fg(Color::Cyan))
    } else if feed.has_more {
        Span::styled("scroll for more", meta())
    } else {
        Span::styled("End of feed", meta())
    };

    frame.render_widget(Paragraph::new(Line::from(vec![count, state])), area);
}
