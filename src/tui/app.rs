use std::time::Instant;

use chrono::Utc;
use ratatui::widgets::TableState;

use crate::board::Board;
use crate::error::CareError;
use crate::lifecycle::{can_transition, Action};
use crate::models::Status;
use crate::scheduler::Scheduler;
use crate::share::Channel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    /// Collecting notes before applying the action.
    Notes(Action),
    Share,
}

pub struct App<S: Scheduler> {
    pub board: Board<S>,
    pub state: TableState,
    pub share_state: TableState,
    pub input_mode: InputMode,
    pub input_buffer: String,
    /// Load, conflict and session failures. Dismissed with Esc.
    pub banner: Option<String>,
    /// Validation failures shown next to the action bar.
    pub inline: Option<String>,
    /// Last share payload, shown under the share menu.
    pub shared: Option<String>,
    /// Failure that ends the session, e.g. an expired sign-in.
    pub fatal: Option<CareError>,
}

/// Filter order when cycling with `f`.
const FILTERS: [Option<Status>; 6] = [
    None,
    Some(Status::Assigned),
    Some(Status::Accepted),
    Some(Status::InProgress),
    Some(Status::Completed),
    Some(Status::Rejected),
];

impl<S: Scheduler> App<S> {
    /// Creates the app and loads the first page. A failed load is reported
    /// in the banner rather than aborting.
    pub fn new(board: Board<S>) -> App<S> {
        let mut share_state = TableState::default();
        share_state.select(Some(0));
        let mut app = App {
            board,
            state: TableState::default(),
            share_state,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            banner: None,
            inline: None,
            shared: None,
            fatal: None,
        };
        app.reload();
        app
    }

    fn report(&mut self, e: CareError) {
        if matches!(e, CareError::Unauthorized) {
            self.fatal = Some(e);
        } else if e.is_inline() {
            self.inline = Some(e.to_string());
        } else {
            self.banner = Some(e.to_string());
        }
    }

    fn settle_selection(&mut self) {
        let len = self.board.assignments().len();
        if len == 0 {
            self.state.select(None);
        } else if let Some(i) = self.state.selected() {
            if i >= len {
                self.state.select(Some(len - 1));
            }
        } else {
            self.state.select(Some(0));
        }
    }

    /// Reloads the current page from the scheduler.
    pub fn reload(&mut self) {
        if let Err(e) = self.board.refresh() {
            self.report(e);
        }
        self.settle_selection();
    }

    pub fn next(&mut self) {
        let len = self.board.assignments().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.board.assignments().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn selected_id(&self) -> Option<u64> {
        self.state
            .selected()
            .and_then(|i| self.board.assignments().get(i))
            .map(|a| a.id)
    }

    /// Starts an action on the selected row. Completing and rejecting ask
    /// for notes first.
    pub fn begin_action(&mut self, action: Action) {
        self.inline = None;
        let Some(id) = self.selected_id() else { return };
        match action {
            Action::Complete | Action::Reject => {
                let allowed = self
                    .board
                    .store()
                    .get(id)
                    .map(|a| can_transition(a.status, action.target()))
                    .unwrap_or(false);
                if allowed {
                    self.input_mode = InputMode::Notes(action);
                    self.input_buffer.clear();
                } else {
                    self.apply(id, action, None);
                }
            }
            Action::Accept | Action::Start => self.apply(id, action, None),
        }
    }

    /// Applies the pending action with the typed notes.
    pub fn submit_notes(&mut self) {
        if let InputMode::Notes(action) = self.input_mode {
            let notes = std::mem::take(&mut self.input_buffer);
            self.input_mode = InputMode::Normal;
            if let Some(id) = self.selected_id() {
                self.apply(id, action, Some(notes));
            }
        }
    }

    fn apply(&mut self, id: u64, action: Action, notes: Option<String>) {
        if let Err(e) = self.board.request_transition(id, action.target(), notes.as_deref()) {
            self.report(e);
        }
        self.settle_selection();
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
    }

    pub fn cycle_filter(&mut self) {
        let current = self.board.store().filter();
        let pos = FILTERS.iter().position(|f| *f == current).unwrap_or(0);
        let next = FILTERS[(pos + 1) % FILTERS.len()];
        if let Err(e) = self.board.change_filter(next) {
            self.report(e);
        }
        self.state.select(None);
        self.settle_selection();
    }

    pub fn next_page(&mut self) {
        let page = self.board.store().page();
        if page < self.board.store().total_pages() {
            self.turn_to(page + 1);
        }
    }

    pub fn previous_page(&mut self) {
        let page = self.board.store().page();
        if page > 1 {
            self.turn_to(page - 1);
        }
    }

    fn turn_to(&mut self, page: u32) {
        if let Err(e) = self.board.change_page(page) {
            self.report(e);
        }
        self.state.select(None);
        self.settle_selection();
    }

    pub fn open_share(&mut self) {
        self.shared = None;
        self.input_mode = InputMode::Share;
    }

    pub fn share_next(&mut self) {
        let i = self.share_state.selected().map_or(0, |i| (i + 1) % Channel::ALL.len());
        self.share_state.select(Some(i));
    }

    pub fn share_previous(&mut self) {
        let i = match self.share_state.selected() {
            Some(0) | None => Channel::ALL.len() - 1,
            Some(i) => i - 1,
        };
        self.share_state.select(Some(i));
    }

    /// Builds the payload for the highlighted channel.
    pub fn share_selected(&mut self) {
        let channel = Channel::ALL[self.share_state.selected().unwrap_or(0)];
        match self.board.share_referral(channel, Instant::now()) {
            Ok(payload) => self.shared = Some(payload.as_str().to_string()),
            Err(e) => {
                // Referral UI degrades instead of blocking the board.
                tracing::warn!(error = %e, "share unavailable");
                self.input_mode = InputMode::Normal;
                self.banner = Some(format!("Referral sharing unavailable: {}", e));
            }
        }
    }

    pub fn dismiss(&mut self) {
        self.banner = None;
        self.inline = None;
    }

    /// Takes the error that should end the run loop, if any.
    pub fn take_fatal(&mut self) -> Option<CareError> {
        self.fatal.take()
    }

    /// Advances countdowns. Returns whether a redraw is needed.
    pub fn on_tick(&mut self) -> bool {
        self.board.tick(Utc::now(), Instant::now())
    }
}
