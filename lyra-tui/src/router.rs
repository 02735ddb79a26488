use anyhow::Result;
use lyra_core::PlaybackEngine;
use ratatui::{Frame, crossterm::event::KeyCode, layout::Rect};

use crate::{
    routes::{log::LogRoute, playback::PlaybackRoute, queue::QueueRoute},
    state::AppState,
};

/// Trait that all routes must implement
pub trait RouteHandler {
    /// Render this route's UI
    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState);

    /// Handle keyboard input for this route
    fn handle_input(
        &mut self,
        key: KeyCode,
        state: &mut AppState,
        engine: &PlaybackEngine,
    ) -> Result<RouteAction>;

    /// Get the display name for tabs
    fn name(&self) -> &str;

    /// Called when the route becomes visible
    fn on_enter(&mut self, _state: &mut AppState, _engine: &PlaybackEngine) -> Result<()> {
        Ok(())
    }

    /// Called when the route is hidden
    fn on_exit(&mut self, _state: &mut AppState, _engine: &PlaybackEngine) -> Result<()> {
        Ok(())
    }

    fn help_items(&self) -> Vec<(&str, &str)> {
        vec![("Tab", "Switch Tab"), ("Q", "Quit")]
    }
}

/// Actions that can be returned from route handlers
pub enum RouteAction {
    /// Stay on current route
    None,
    /// Replace current route with a new one
    Replace(Box<dyn RouteHandler>),
    /// Quit the application
    Quit,
}

/// Router manages the navigation stack
pub struct Router {
    /// Stack of route handlers, last element is current route
    stack: Vec<Box<dyn RouteHandler>>,
}

impl Router {
    /// Show the first route
    pub fn start(
        mut initial_route: Box<dyn RouteHandler>,
        state: &mut AppState,
        engine: &PlaybackEngine,
    ) -> Result<Self> {
        initial_route.on_enter(state, engine)?;
        Ok(Self {
            stack: vec![initial_route],
        })
    }

    /// Get current route (top of stack)
    pub fn current(&self) -> Option<&dyn RouteHandler> {
        self.stack.last().map(|route| route.as_ref())
    }

    /// Get mutable reference to current route
    pub fn current_mut(&mut self) -> Option<&mut Box<dyn RouteHandler>> {
        self.stack.last_mut()
    }

    pub fn current_name(&self) -> &str {
        self.current().map_or("", |route| route.name())
    }

    /// Execute a route action. Returns true when the app should quit.
    pub fn execute_action(
        &mut self,
        action: RouteAction,
        state: &mut AppState,
        engine: &PlaybackEngine,
    ) -> Result<bool> {
        match action {
            RouteAction::None => Ok(false),
            RouteAction::Replace(route) => {
                self.replace(route, state, engine)?;
                Ok(false)
            }
            RouteAction::Quit => Ok(true),
        }
    }

    /// Replace current route (tab switching)
    pub fn replace(
        &mut self,
        mut new_route: Box<dyn RouteHandler>,
        state: &mut AppState,
        engine: &PlaybackEngine,
    ) -> Result<()> {
        if let Some(mut old_route) = self.stack.pop() {
            old_route.on_exit(state, engine)?;
        }
        new_route.on_enter(state, engine)?;
        self.stack.push(new_route);
        Ok(())
    }

    /// Hide every route, detaching whatever they subscribed. A failing
    /// route does not keep the others attached; the first error is returned.
    pub fn shutdown(&mut self, state: &mut AppState, engine: &PlaybackEngine) -> Result<()> {
        let mut result = Ok(());
        while let Some(mut route) = self.stack.pop() {
            if let Err(e) = route.on_exit(state, engine) {
                log::error!("Route {} failed to exit: {:#}", route.name(), e);
                result = result.and(Err(e));
            }
        }
        result
    }
}

/// Get a route handler for a given tab name
pub fn route_for_name(name: &str) -> Box<dyn RouteHandler> {
    match name {
        "Queue" => Box::new(QueueRoute::new()),
        "Log" => Box::new(LogRoute),
        _ => Box::new(PlaybackRoute::new()),
    }
}

/// Get all main tab names in order
pub fn tab_names() -> &'static [&'static str] {
    &["Playback", "Queue", "Log"]
}
