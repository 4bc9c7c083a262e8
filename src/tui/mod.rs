pub mod app;
pub mod ui;

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use crate::commands::open_board;
use crate::error::CareResult;
use crate::lifecycle::Action;
use crate::scheduler::Scheduler;
use app::{App, InputMode};
use ui::ui;

/// Poll interval while the copied acknowledgment may need clearing.
const NOTICE_POLL: Duration = Duration::from_millis(250);
/// Poll interval when nothing is ticking.
const IDLE_POLL: Duration = Duration::from_secs(30);

pub fn run_tui() -> CareResult<()> {
    // Fail before touching the terminal if nobody is signed in.
    let board = open_board()?;
    let mut app = App::new(board);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    app.board.stop_countdowns();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

fn poll_timeout<S: Scheduler>(app: &App<S>) -> Duration {
    let at = Instant::now();
    let tick = app.board.ticker().timeout(at).unwrap_or(IDLE_POLL);
    if app.input_mode == InputMode::Share {
        tick.min(NOTICE_POLL)
    } else {
        tick
    }
}

/// Runs until the user quits. An invalid session ends the loop with
/// `Unauthorized` so the caller can ask for a new sign-in.
fn run_app<B: Backend, S: Scheduler>(terminal: &mut Terminal<B>, app: &mut App<S>) -> CareResult<()> {
    loop {
        if let Some(e) = app.take_fatal() {
            return Err(e);
        }
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(poll_timeout(app))? {
            app.on_tick();
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match app.input_mode {
                InputMode::Normal => match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Down | KeyCode::Char('j') => app.next(),
                    KeyCode::Up | KeyCode::Char('k') => app.previous(),
                    KeyCode::Char('a') => app.begin_action(Action::Accept),
                    KeyCode::Char('s') => app.begin_action(Action::Start),
                    KeyCode::Char('c') => app.begin_action(Action::Complete),
                    KeyCode::Char('x') => app.begin_action(Action::Reject),
                    KeyCode::Char('f') => app.cycle_filter(),
                    KeyCode::Char(']') | KeyCode::Right => app.next_page(),
                    KeyCode::Char('[') | KeyCode::Left => app.previous_page(),
                    KeyCode::Char('r') => app.reload(),
                    KeyCode::Char('w') => app.open_share(),
                    KeyCode::Esc => app.dismiss(),
                    _ => {}
                },
                InputMode::Notes(_) => match key.code {
                    KeyCode::Enter => app.submit_notes(),
                    KeyCode::Esc => app.cancel_input(),
                    KeyCode::Char(c) => app.input_buffer.push(c),
                    KeyCode::Backspace => {
                        app.input_buffer.pop();
                    }
                    _ => {}
                },
                InputMode::Share => match key.code {
                    KeyCode::Down | KeyCode::Char('j') => app.share_next(),
                    KeyCode::Up | KeyCode::Char('k') => app.share_previous(),
                    KeyCode::Enter => app.share_selected(),
                    KeyCode::Esc | KeyCode::Char('q') => app.cancel_input(),
                    _ => {}
                },
            }
        }
        // Keys can arrive faster than the tick; keep countdowns current.
        app.on_tick();
    }
}
