use lyra_core::{PlaybackEngine, commands::PlayerCommand, time::format_time};
use ratatui::{
    Frame,
    crossterm::event::KeyCode,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};

use crate::{
    observer::{Observer, PlayerView},
    router::{RouteAction, RouteHandler},
    state::AppState,
};

const SEEK_STEP: f32 = 5.0;
const VOLUME_STEP: f32 = 0.1;

// ==================================================================
// Playback Route Implementation
// ==================================================================

pub struct PlaybackRoute {
    observer: Observer,
}

impl PlaybackRoute {
    pub fn new() -> Self {
        Self {
            observer: Observer::new("Playback route"),
        }
    }
}

impl RouteHandler for PlaybackRoute {
    fn render(&self, frame: &mut Frame, area: Rect, _state: &AppState) {
        draw_playback_panel(frame, area, &self.observer.view());
    }

    fn handle_input(
        &mut self,
        key: KeyCode,
        state: &mut AppState,
        engine: &PlaybackEngine,
    ) -> anyhow::Result<RouteAction> {
        let position = self.observer.view().position;
        match key {
            KeyCode::Up => {
                engine.execute(PlayerCommand::SetVolume(state.volume + VOLUME_STEP));
            }
            KeyCode::Down => {
                engine.execute(PlayerCommand::SetVolume(state.volume - VOLUME_STEP));
            }
            KeyCode::Right => {
                engine.execute(PlayerCommand::Seek(position + SEEK_STEP));
            }
            KeyCode::Left => {
                engine.execute(PlayerCommand::Seek((position - SEEK_STEP).max(0.0)));
            }
            _ => {}
        }
        state.volume = engine.volume();
        Ok(RouteAction::None)
    }

    fn name(&self) -> &str {
        "Playback"
    }

    fn on_enter(&mut self, _state: &mut AppState, engine: &PlaybackEngine) -> anyhow::Result<()> {
        self.observer.attach(engine);
        Ok(())
    }

    fn on_exit(&mut self, _state: &mut AppState, engine: &PlaybackEngine) -> anyhow::Result<()> {
        self.observer.detach(engine);
        Ok(())
    }

    fn help_items(&self) -> Vec<(&str, &str)> {
        vec![
            ("Space", "Play/Pause"),
            ("N/P", "Next/Prev"),
            ("L", "Repeat"),
            ("←/→", "Seek"),
            ("↑/↓", "Volume"),
            ("Tab", "Switch Tab"),
            ("Q", "Quit"),
        ]
    }
}

/// Draw the playback panel
fn draw_playback_panel(f: &mut Frame, area: Rect, view: &PlayerView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Now playing info
            Constraint::Length(3), // Progress bar
            Constraint::Min(0),    // Spacer
        ])
        .split(area);

    draw_now_playing(f, chunks[0], view);
    draw_progress(f, chunks[1], view);
}

/// Draw the now playing section
fn draw_now_playing(f: &mut Frame, area: Rect, view: &PlayerView) {
    let block = Block::default()
        .title(" 🎵 Now Playing ")
        .borders(Borders::ALL)
        .border_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(track) = &view.track else {
        let text = Paragraph::new("No audio loaded").style(Style::default().fg(Color::DarkGray));
        f.render_widget(text, inner);
        return;
    };

    let artist = if track.artist.is_empty() {
        "Unknown Artist"
    } else {
        track.artist.as_str()
    };
    let state_line = if view.is_playing { "▶ Playing" } else { "⏸ Paused" };

    let mut text = vec![
        Line::from(vec![Span::styled(
            track.display_title(),
            Style::default().fg(Color::White).bold(),
        )]),
        Line::from(vec![Span::styled(artist, Style::default().fg(Color::Gray))]),
        Line::from(vec![Span::styled(
            format!("{}  ·  {}", state_line, view.repeat_mode),
            Style::default().fg(Color::DarkGray),
        )]),
    ];
    if let Some(error) = &view.error {
        text.push(Line::from(Span::styled(
            error.as_str(),
            Style::default().fg(Color::Red),
        )));
    }

    f.render_widget(Paragraph::new(text), inner);
}

/// Draw the progress bar
fn draw_progress(f: &mut Frame, area: Rect, view: &PlayerView) {
    let progress_pct = view.progress.clamp(0.0, 100.0) as u16;
    let label = format!("{} / {}", format_time(view.position), format_time(view.duration));

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
        .percent(progress_pct)
        .label(label);

    f.render_widget(gauge, area);
}
