use std::io;
use std::time::Duration;

use lyra_core::{
    EngineConfig, PlaybackEngine, backend::RodioDevice, commands::PlayerCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
};

mod library;
mod observer;
mod router;
mod routes;
mod state;
mod ui;

use router::{Router, route_for_name, tab_names};
use routes::playback::PlaybackRoute;
use state::AppState;

fn main() -> anyhow::Result<()> {
    // Initialize tui_logger for TUI log display
    tui_logger::init_logger(log::LevelFilter::Debug)
        .map_err(|e| anyhow::anyhow!("Failed to init tui_logger: {:?}", e))?;
    tui_logger::set_default_level(log::LevelFilter::Debug);

    log::info!("Starting Lyra");

    // Audio files or directories from command line args
    let args: Vec<String> = std::env::args().skip(1).collect();
    let tracks = library::collect_tracks(&args);

    // The one engine for this process, lent to every observer
    let device = RodioDevice::open_default()?;
    let engine = PlaybackEngine::new(Box::new(device), EngineConfig::default());

    if let Some(first) = tracks.first().cloned() {
        engine.play(first, Some(tracks));
    }

    run_tui(&engine)
}

fn run_tui(engine: &PlaybackEngine) -> anyhow::Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut state = AppState::new();
    state.mini_player.attach(engine);
    let mut router = Router::start(Box::new(PlaybackRoute::new()), &mut state, engine)?;

    let result = event_loop(&mut terminal, &mut state, &mut router, engine);
    let shutdown = router.shutdown(&mut state, engine);
    state.mini_player.detach(engine);

    // Restore terminal before reporting any error
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.and(shutdown)
}

fn event_loop(
    terminal: &mut ratatui::Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    router: &mut Router,
    engine: &PlaybackEngine,
) -> anyhow::Result<()> {
    loop {
        // Deliver device callbacks to the engine and its listeners
        engine.pump();
        state.volume = engine.volume();

        terminal.draw(|f| ui::draw(f, state, router))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && handle_global_keys(key.code, state, engine, router)?
                {
                    return Ok(());
                }
            }
        }
    }
}

/// Handle global keys and delegate route-specific input to router
fn handle_global_keys(
    key: KeyCode,
    state: &mut AppState,
    engine: &PlaybackEngine,
    router: &mut Router,
) -> anyhow::Result<bool> {
    match key {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Char(' ') => {
            engine.execute(PlayerCommand::TogglePlay);
            return Ok(false);
        }
        KeyCode::Char('s') => {
            engine.execute(PlayerCommand::Stop);
            return Ok(false);
        }
        KeyCode::Char('n') => {
            engine.execute(PlayerCommand::Next);
            return Ok(false);
        }
        KeyCode::Char('p') => {
            engine.execute(PlayerCommand::Previous);
            return Ok(false);
        }
        KeyCode::Char('l') => {
            engine.execute(PlayerCommand::CycleRepeatMode);
            return Ok(false);
        }
        KeyCode::Tab => {
            // Cycle through tabs
            let tabs = tab_names();
            let current_idx = tabs
                .iter()
                .position(|n| *n == router.current_name())
                .unwrap_or(0);
            let next_idx = (current_idx + 1) % tabs.len();
            router.replace(route_for_name(tabs[next_idx]), state, engine)?;
            return Ok(false);
        }
        _ => {}
    }

    // Delegate to the current route's input handler
    let action = match router.current_mut() {
        Some(route) => route.handle_input(key, state, engine)?,
        None => return Ok(false),
    };
    router.execute_action(action, state, engine)
}
