use std::cell::RefCell;

use lyra_core::{PlaybackEngine, Track, commands::PlayerCommand};
use ratatui::{
    Frame,
    crossterm::event::KeyCode,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::{
    observer::Observer,
    router::{RouteAction, RouteHandler},
    routes::playback::PlaybackRoute,
    state::AppState,
};

/// Queue route
pub struct QueueRoute {
    observer: Observer,
    /// Queue as of the last time the route was shown or used
    tracks: Vec<Track>,
    // RefCell allows selecting the current row from render()
    list_state: RefCell<ListState>,
}

impl QueueRoute {
    pub fn new() -> Self {
        Self {
            observer: Observer::new("Queue route"),
            tracks: Vec::new(),
            list_state: RefCell::new(ListState::default()),
        }
    }

    fn refresh(&mut self, engine: &PlaybackEngine) {
        let queue = engine.state().queue;
        let selected = self.list_state.get_mut();
        if selected.selected().is_none() {
            selected.select(queue.current_index.or(Some(0)));
        }
        self.tracks = queue.tracks;
    }

    fn move_selection(&mut self, forward: bool) {
        let len = self.tracks.len();
        if len == 0 {
            return;
        }
        let state = self.list_state.get_mut();
        let i = match state.selected() {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        state.select(Some(i));
    }
}

impl RouteHandler for QueueRoute {
    fn render(&self, frame: &mut Frame, area: Rect, _state: &AppState) {
        let current_id = self.observer.view().track.as_ref().map(|t| t.id.clone());

        let block = Block::default()
            .title(format!(" Queue ({} tracks) ", self.tracks.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        if self.tracks.is_empty() {
            let empty_msg = Paragraph::new("Queue is empty. Pass files or a directory on the command line.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty_msg, area);
            return;
        }

        let items: Vec<ListItem> = self
            .tracks
            .iter()
            .map(|track| {
                let is_current = current_id.as_deref() == Some(track.id.as_str());
                let prefix = if is_current { "▶ " } else { "  " };
                let style = if is_current {
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                let line = if track.artist.is_empty() {
                    format!("{}{}", prefix, track.display_title())
                } else {
                    format!("{}{} - {}", prefix, track.display_title(), track.artist)
                };
                ListItem::new(line).style(style)
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");

        frame.render_stateful_widget(list, area, &mut *self.list_state.borrow_mut());
    }

    fn handle_input(
        &mut self,
        key: KeyCode,
        _state: &mut AppState,
        engine: &PlaybackEngine,
    ) -> anyhow::Result<RouteAction> {
        self.refresh(engine);
        match key {
            KeyCode::Up => self.move_selection(false),
            KeyCode::Down => self.move_selection(true),
            KeyCode::Enter => {
                let selected = self.list_state.get_mut().selected();
                if let Some(track) = selected.and_then(|i| self.tracks.get(i)) {
                    engine.execute(PlayerCommand::Play {
                        track: track.clone(),
                        queue: Some(self.tracks.clone()),
                    });
                    return Ok(RouteAction::Replace(Box::new(PlaybackRoute::new())));
                }
            }
            _ => {}
        }
        Ok(RouteAction::None)
    }

    fn name(&self) -> &str {
        "Queue"
    }

    fn on_enter(&mut self, _state: &mut AppState, engine: &PlaybackEngine) -> anyhow::Result<()> {
        self.refresh(engine);
        self.observer.attach(engine);
        Ok(())
    }

    fn on_exit(&mut self, _state: &mut AppState, engine: &PlaybackEngine) -> anyhow::Result<()> {
        self.observer.detach(engine);
        Ok(())
    }

    fn help_items(&self) -> Vec<(&str, &str)> {
        vec![
            ("↑/↓", "Navigate"),
            ("Enter", "Play"),
            ("N/P", "Next/Prev"),
            ("L", "Repeat"),
            ("Tab", "Switch Tab"),
            ("Q", "Quit"),
        ]
    }
}
