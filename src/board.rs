//! The assignment board: the single entry point the CLI and the terminal UI
//! drive. It owns the page store, the countdown ticker and the referral
//! cache for one signed-in staff member.

use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::countdown::{visible_deadlines, Countdown, Ticker};
use crate::error::{CareError, CareResult};
use crate::lifecycle;
use crate::models::{Assignment, StaffSession, Status};
use crate::referral::{ReferralSummary, ReferralTracker};
use crate::scheduler::{AssignmentPage, Scheduler};
use crate::share::{Channel, Clipboard, CopyNotice, Osc52Clipboard, ShareContext, SharePayload};
use crate::stats::Statistics;
use crate::store::{AssignmentStore, LoadTicket};

/// Where the headline statistics came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsSource {
    /// The scheduler's aggregate over every assignment.
    Aggregate,
    /// Fold over the loaded page, used when the aggregate is unavailable.
    Page,
}

pub struct Board<S: Scheduler> {
    scheduler: S,
    session: StaffSession,
    config: Config,
    store: AssignmentStore,
    referrals: ReferralTracker,
    stats: Statistics,
    stats_source: StatsSource,
    ticker: Ticker,
    clipboard: Box<dyn Clipboard>,
    copy_notice: CopyNotice,
}

impl<S: Scheduler> Board<S> {
    pub fn new(scheduler: S, session: StaffSession, config: Config) -> Board<S> {
        let store = AssignmentStore::new(session.staff_id.clone());
        let ticker = Ticker::new(config.tick_interval());
        let copy_notice = CopyNotice::new(config.copy_notice_ttl());
        Board {
            scheduler,
            session,
            config,
            store,
            referrals: ReferralTracker::new(),
            stats: Statistics::default(),
            stats_source: StatsSource::Page,
            ticker,
            clipboard: Box::new(Osc52Clipboard::stdout()),
            copy_notice,
        }
    }

    /// Replaces the terminal clipboard used by the copy channels.
    pub fn with_clipboard(mut self, clipboard: Box<dyn Clipboard>) -> Board<S> {
        self.clipboard = clipboard;
        self
    }

    /// Opens a board for whoever the scheduler reports as signed in.
    pub fn open(scheduler: S, config: Config) -> CareResult<Board<S>> {
        let session = scheduler.fetch_staff_session()?;
        info!(staff_id = %session.staff_id, category = %session.category, "session opened");
        Ok(Board::new(scheduler, session, config))
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn session(&self) -> &StaffSession {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &AssignmentStore {
        &self.store
    }

    pub fn assignments(&self) -> &[Assignment] {
        self.store.items()
    }

    pub fn statistics(&self) -> (Statistics, StatsSource) {
        (self.stats, self.stats_source)
    }

    /// Reloads the current page and everything derived from it.
    ///
    /// If the page no longer exists the store clamps it to the last page and
    /// that page is loaded instead.
    pub fn refresh(&mut self) -> CareResult<()> {
        let requested = self.store.page();
        if self.load_current()? && self.store.page() != requested {
            debug!(requested, page = self.store.page(), "page out of range, reloading last page");
            self.load_current()?;
        }
        Ok(())
    }

    fn load_current(&mut self) -> CareResult<bool> {
        let ticket = self.begin_refresh();
        let result = self
            .scheduler
            .fetch_assignments(&self.session.staff_id, ticket.filter, ticket.page);
        self.finish_refresh(ticket, result)
    }

    /// Issues a load ticket for the current filter and page. Hosts that fetch
    /// off the UI thread hand the result back through `finish_refresh`.
    pub fn begin_refresh(&mut self) -> LoadTicket {
        let ticket = self.store.begin_load();
        debug!(filter = ?ticket.filter, page = ticket.page, "loading assignments");
        ticket
    }

    /// Applies a fetched page. Returns `Ok(false)` when a later request
    /// superseded `ticket`; nothing changes in that case.
    pub fn finish_refresh(&mut self, ticket: LoadTicket, result: CareResult<AssignmentPage>) -> CareResult<bool> {
        if !self.store.finish_load(ticket, result)? {
            return Ok(false);
        }
        self.after_mutation()?;
        Ok(true)
    }

    /// Switches the status filter, returning to page 1. The previous filter
    /// and page stay selected if loading fails.
    pub fn change_filter(&mut self, filter: Option<Status>) -> CareResult<()> {
        let (previous_filter, previous_page) = (self.store.filter(), self.store.page());
        self.store.set_filter(filter);
        if let Err(e) = self.refresh() {
            self.store.set_filter(previous_filter);
            self.store.set_page(previous_page)?;
            return Err(e);
        }
        Ok(())
    }

    /// Moves to another page. The previous page stays selected if loading fails.
    pub fn change_page(&mut self, page: u32) -> CareResult<()> {
        let previous = self.store.page();
        self.store.set_page(page)?;
        if let Err(e) = self.refresh() {
            self.store.set_page(previous)?;
            return Err(e);
        }
        Ok(())
    }

    /// Validates, persists and then applies a status change.
    ///
    /// Invalid moves fail locally without reaching the scheduler. The held
    /// assignment is only replaced once the scheduler accepts the change; on
    /// `Conflict` the assignment is fetched again so a retry starts from the
    /// stored status.
    pub fn request_transition(&mut self, id: u64, to: Status, notes: Option<&str>) -> CareResult<Assignment> {
        let current = self
            .store
            .get(id)
            .ok_or_else(|| CareError::NotFound(format!("assignment {}", id)))?;
        lifecycle::check(current, to)?;
        let from = current.status;

        self.store.mark_updating(id)?;
        let result = self.scheduler.persist_transition(id, to, notes);
        self.store.clear_updating(id);

        match result {
            Ok(updated) => {
                info!(assignment_id = id, %from, %to, "transition applied");
                self.store.apply_local_transition(id, updated.clone())?;
                self.after_mutation()?;
                Ok(updated)
            }
            Err(CareError::Conflict { id, current }) => {
                warn!(assignment_id = id, %current, "transition conflicted, refetching");
                match self.scheduler.fetch_assignment(id) {
                    Ok(fresh) => {
                        self.store.apply_local_transition(id, fresh)?;
                        self.after_mutation()?;
                    }
                    Err(e) => warn!(assignment_id = id, error = %e, "refetch after conflict failed"),
                }
                Err(CareError::Conflict { id, current })
            }
            Err(e) => {
                warn!(assignment_id = id, error = %e, "transition not stored, keeping {}", from);
                Err(e)
            }
        }
    }

    fn after_mutation(&mut self) -> CareResult<()> {
        self.recompute_statistics()?;
        self.sync_countdowns(Utc::now(), Instant::now());
        Ok(())
    }

    /// Recomputes the headline numbers from scratch.
    ///
    /// Prefers the scheduler's aggregate; any failure other than an invalid
    /// session falls back to folding the loaded page.
    pub fn recompute_statistics(&mut self) -> CareResult<()> {
        match self.scheduler.fetch_statistics(&self.session.staff_id) {
            Ok(stats) => {
                self.stats = stats;
                self.stats_source = StatsSource::Aggregate;
            }
            Err(CareError::Unauthorized) => return Err(CareError::Unauthorized),
            Err(e) => {
                warn!(error = %e, "aggregate statistics unavailable, using loaded page");
                self.stats = self.store.page_statistics(Local::now().date_naive());
                self.stats_source = StatsSource::Page;
            }
        }
        Ok(())
    }

    /// Points the ticker at the countdowns of the rows currently held.
    pub fn sync_countdowns(&mut self, now: DateTime<Utc>, at: Instant) {
        let deadlines = visible_deadlines(self.store.items());
        self.ticker.sync(&deadlines, now, at);
    }

    /// Advances the shared tick. Returns whether countdowns changed.
    pub fn tick(&mut self, now: DateTime<Utc>, at: Instant) -> bool {
        self.ticker.tick(now, at)
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Stops every countdown, e.g. when the board is no longer on screen.
    pub fn stop_countdowns(&mut self) {
        self.ticker.clear();
    }

    pub fn countdown(&self, id: u64) -> Option<Countdown> {
        self.ticker.get(id)
    }

    pub fn is_updating(&self, id: u64) -> bool {
        self.store.is_updating(id)
    }

    /// The session's referral code, fetched once.
    pub fn referral_code(&mut self) -> CareResult<String> {
        let code = self.referrals.code(&self.scheduler, &self.session.staff_id)?;
        Ok(code.to_string())
    }

    pub fn share_context(&mut self) -> CareResult<ShareContext> {
        let code = self.referral_code()?;
        Ok(ShareContext::new(
            &code,
            &self.config.origin,
            &self.session.display_name,
            &self.config.app_name,
        ))
    }

    /// Formats the payload for `channel`. Clipboard channels copy it and
    /// raise the "copied" acknowledgment once the copy went through.
    pub fn share_referral(&mut self, channel: Channel, at: Instant) -> CareResult<SharePayload> {
        let payload = self.share_context()?.payload(channel);
        if channel.is_copy() {
            match self.clipboard.copy(payload.as_str()) {
                Ok(()) => self.copy_notice.show(at),
                Err(e) => warn!(error = %e, "payload not copied"),
            }
        }
        debug!(channel = channel.label(), "referral shared");
        Ok(payload)
    }

    pub fn copy_notice_visible(&mut self, at: Instant) -> bool {
        self.copy_notice.is_visible(at)
    }

    /// Referral totals, or `None` when they cannot be fetched.
    pub fn referral_summary(&mut self, now: DateTime<Utc>) -> Option<ReferralSummary> {
        match self.scheduler.fetch_referrals(&self.session.staff_id) {
            Ok(records) => Some(ReferralSummary::from_records(&records, now, 5)),
            Err(e) => {
                warn!(error = %e, "referrals unavailable");
                None
            }
        }
    }
}
