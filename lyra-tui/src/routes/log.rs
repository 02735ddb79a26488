use lyra_core::PlaybackEngine;
use ratatui::{
    Frame,
    crossterm::event::KeyCode,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders},
};
use tui_logger::TuiLoggerWidget;

use crate::{
    router::{RouteAction, RouteHandler},
    state::AppState,
};

/// Log route showing everything captured by tui-logger
pub struct LogRoute;

impl RouteHandler for LogRoute {
    fn render(&self, frame: &mut Frame, area: Rect, _state: &AppState) {
        let log_widget = TuiLoggerWidget::default()
            .block(
                Block::default()
                    .title(" 📋 Log ")
                    .borders(Borders::ALL)
                    .border_style(
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
            )
            .style(Style::default().fg(Color::White));

        frame.render_widget(log_widget, area);
    }

    fn handle_input(
        &mut self,
        _key: KeyCode,
        _state: &mut AppState,
        _engine: &PlaybackEngine,
    ) -> anyhow::Result<RouteAction> {
        Ok(RouteAction::None)
    }

    fn name(&self) -> &str {
        "Log"
    }
}
