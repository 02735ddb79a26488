use lyra_core::time::format_time;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
};

use crate::{
    router::{Router, tab_names},
    state::AppState,
};

/// Draw the TUI interface
pub fn draw(f: &mut Frame, state: &AppState, router: &Router) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Route content
            Constraint::Length(3), // Mini player
            Constraint::Length(3), // Controls
        ])
        .split(f.area());

    draw_tabs(f, chunks[0], router);
    if let Some(route) = router.current() {
        route.render(f, chunks[1], state);
    }
    draw_mini_player(f, chunks[2], state);
    draw_controls(f, chunks[3], router);
}

fn draw_tabs(f: &mut Frame, area: Rect, router: &Router) {
    let names = tab_names();
    let selected = names
        .iter()
        .position(|name| *name == router.current_name())
        .unwrap_or(0);

    let tabs = Tabs::new(names.iter().copied())
        .block(Block::default().borders(Borders::ALL).title(" Lyra "))
        .select(selected)
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

/// Persistent now-playing bar shown under every route
fn draw_mini_player(f: &mut Frame, area: Rect, state: &AppState) {
    let view = state.mini_player.view();

    let (text, style) = match (&view.error, &view.track) {
        (Some(error), _) => (format!("Error: {}", error), Style::default().fg(Color::Red)),
        (None, Some(track)) => {
            let icon = if view.is_playing { "▶" } else { "⏸" };
            let text = format!(
                "{} {}  |  {} / {}  |  {}  |  Vol: {:3.0}%",
                icon,
                track.display_title(),
                format_time(view.position),
                format_time(view.duration),
                view.repeat_mode,
                state.volume * 100.0
            );
            let color = if view.is_playing { Color::Green } else { Color::Yellow };
            (text, Style::default().fg(color))
        }
        (None, None) => (state.status_message.clone(), Style::default().fg(Color::DarkGray)),
    };

    let paragraph = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(" Now Playing "));

    f.render_widget(paragraph, area);
}

/// Draw the controls help section
fn draw_controls(f: &mut Frame, area: Rect, router: &Router) {
    let items = router.current().map(|route| route.help_items()).unwrap_or_default();

    let mut controls = Vec::with_capacity(items.len() * 2);
    for (key, label) in items {
        let key_color = match key {
            "Q" => Color::Red,
            "Tab" => Color::Magenta,
            _ => Color::Yellow,
        };
        controls.push(Span::styled(format!("[{}]", key), Style::default().fg(key_color)));
        controls.push(Span::raw(format!(" {}  ", label)));
    }

    let paragraph = Paragraph::new(Line::from(controls))
        .block(Block::default().borders(Borders::ALL).title(" Controls "));

    f.render_widget(paragraph, area);
}
