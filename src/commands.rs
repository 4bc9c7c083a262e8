use chrono::{Local, NaiveDate, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::board::{Board, StatsSource};
use crate::config::{data_dir, Config};
use crate::countdown::{deadline_for, shows_countdown, Countdown};
use crate::error::{CareError, CareResult};
use crate::lifecycle::{allowed_targets, Action};
use crate::models::{Assignment, Priority, StaffCategory, StaffSession, Status, TaskKind};
use crate::referral::{is_referral_eligible, ReferralSummary};
use crate::scheduler::Scheduler;
use crate::share::{Channel, SharePayload};
use crate::storage::JsonScheduler;

/// Opens the JSON scheduler in the configured data directory.
pub fn open_scheduler() -> CareResult<(JsonScheduler, Config)> {
    let config = Config::load()?;
    Ok((JsonScheduler::new(data_dir(), config.page_size), config))
}

/// Opens the board for the signed-in staff member.
pub fn open_board() -> CareResult<Board<JsonScheduler>> {
    let (scheduler, config) = open_scheduler()?;
    Board::open(scheduler, config)
}

fn parse_date(s: &str) -> CareResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| CareError::InvalidInput(format!("invalid date '{}': {}. Use YYYY-MM-DD.", s, e)))
}

/// Remaining referral window for a row, as shown in tables.
pub fn countdown_cell(a: &Assignment) -> (String, Color) {
    if !shows_countdown(a) {
        return ("-".to_string(), Color::Reset);
    }
    match deadline_for(a) {
        Some(deadline) => {
            let c = Countdown::compute(deadline, Utc::now());
            let color = if c.is_expired() {
                Color::Grey
            } else if c.is_urgent() {
                Color::Red
            } else {
                Color::Green
            };
            (c.display(), color)
        }
        None => ("-".to_string(), Color::Reset),
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Assigned => Color::Blue,
        Status::Accepted => Color::Cyan,
        Status::InProgress => Color::Yellow,
        Status::Completed => Color::Green,
        Status::Rejected => Color::Grey,
    }
}

fn priority_color(p: Priority) -> Color {
    match p {
        Priority::Urgent => Color::Red,
        Priority::High => Color::Yellow,
        Priority::Medium => Color::Reset,
        Priority::Low => Color::Grey,
    }
}

/// Lists one page of the signed-in member's assignments.
pub fn cmd_list(status: Option<Status>, page: u32) -> CareResult<()> {
    let mut board = open_board()?;
    board.change_filter(status)?;
    if page > 1 {
        board.change_page(page)?;
    }
    if board.assignments().is_empty() {
        println!("No assignments found.");
        return Ok(());
    }

    let today = Local::now().date_naive();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Task").add_attribute(Attribute::Bold),
            Cell::new("Type").add_attribute(Attribute::Bold),
            Cell::new("Priority").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Progress").add_attribute(Attribute::Bold),
            Cell::new("Referrals").add_attribute(Attribute::Bold),
            Cell::new("Window").add_attribute(Attribute::Bold),
            Cell::new("Next").add_attribute(Attribute::Bold),
        ]);

    for a in board.assignments() {
        let due = match a.task.due_date {
            Some(d) if a.is_overdue(today) => Cell::new(format!("{} (overdue)", d)).fg(Color::Red),
            Some(d) => Cell::new(d),
            None => Cell::new("-"),
        };
        let (window, window_color) = countdown_cell(a);
        let next = allowed_targets(a.status)
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(&a.task.title),
            Cell::new(a.task.kind),
            Cell::new(a.task.priority).fg(priority_color(a.task.priority)),
            due,
            Cell::new(a.status.label()).fg(status_color(a.status)),
            Cell::new(format!("{}%", a.progress)),
            Cell::new(if is_referral_eligible(a) { a.referral_count.to_string() } else { "-".into() }),
            Cell::new(window).fg(window_color),
            Cell::new(if next.is_empty() { "-".to_string() } else { next }),
        ]);
    }

    println!("{table}");
    let store = board.store();
    println!(
        "Page {} of {}{}",
        store.page(),
        store.total_pages().max(1),
        store.filter().map(|s| format!(" (status: {})", s)).unwrap_or_default()
    );
    Ok(())
}

/// Pages through the member's assignments until `id` is loaded.
fn locate(board: &mut Board<JsonScheduler>, id: u64) -> CareResult<()> {
    board.change_filter(None)?;
    loop {
        if board.store().get(id).is_some() {
            return Ok(());
        }
        let next = board.store().page() + 1;
        if next > board.store().total_pages() {
            return Err(CareError::NotFound(format!("assignment {}", id)));
        }
        board.change_page(next)?;
    }
}

/// Accepts, starts, completes or rejects an assignment.
pub fn cmd_transition(id: u64, action: Action, notes: Option<String>, silent: bool) -> CareResult<Assignment> {
    let mut board = open_board()?;
    locate(&mut board, id)?;
    let updated = board.request_transition(id, action.target(), notes.as_deref())?;
    if !silent {
        println!("Assignment {} {}.", id, action.verb());
    }
    Ok(updated)
}

/// Prints the headline statistics.
pub fn cmd_stats() -> CareResult<()> {
    let mut board = open_board()?;
    board.refresh()?;
    let (stats, source) = board.statistics();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Total", "Pending", "In Progress", "Completed", "Overdue", "Done"]);
    table.add_row(vec![
        Cell::new(stats.total),
        Cell::new(stats.pending).fg(Color::Blue),
        Cell::new(stats.in_progress).fg(Color::Yellow),
        Cell::new(stats.completed).fg(Color::Green),
        Cell::new(stats.overdue).fg(if stats.overdue > 0 { Color::Red } else { Color::Reset }),
        Cell::new(format!("{}%", stats.completion_rate())),
    ]);
    println!("{table}");
    if source == StatsSource::Page {
        println!("(aggregate unavailable; counts cover the loaded page only)");
    }
    Ok(())
}

/// Lists every running referral window.
pub fn cmd_countdown() -> CareResult<()> {
    let mut board = open_board()?;
    board.change_filter(None)?;
    let mut rows: Vec<(Assignment, Countdown)> = Vec::new();
    loop {
        let now = Utc::now();
        for a in board.assignments().iter().filter(|a| shows_countdown(a)) {
            if let Some(deadline) = deadline_for(a) {
                rows.push((a.clone(), Countdown::compute(deadline, now)));
            }
        }
        let next = board.store().page() + 1;
        if next > board.store().total_pages() {
            break;
        }
        board.change_page(next)?;
    }
    if rows.is_empty() {
        println!("No referral windows open.");
        return Ok(());
    }
    rows.sort_by_key(|(_, c)| c.remaining_ms);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["ID", "Task", "Referrals", "Remaining"]);
    for (a, c) in rows {
        let color = if c.is_expired() {
            Color::Grey
        } else if c.is_urgent() {
            Color::Red
        } else {
            Color::Green
        };
        let remaining = if c.is_expired() { format!("{} expired", c.display()) } else { c.display() };
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(&a.task.title),
            Cell::new(a.referral_count),
            Cell::new(remaining).fg(color),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_referral_code(silent: bool) -> CareResult<String> {
    let mut board = open_board()?;
    let ctx = board.share_context()?;
    if !silent {
        println!("Referral code: {}", ctx.code);
        println!("Referral link: {}", ctx.link);
    }
    Ok(ctx.code)
}

pub fn cmd_referral_list() -> CareResult<()> {
    let board = open_board()?;
    let records = board.scheduler().fetch_referrals(&board.session().staff_id)?;
    let summary = ReferralSummary::from_records(&records, Utc::now(), records.len());
    if summary.total == 0 {
        println!("No referrals yet.");
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Name", "Email", "Phone", "Joined"]);
    for r in &summary.recent {
        table.add_row(vec![
            r.name.clone(),
            r.email.clone().unwrap_or_else(|| "-".into()),
            r.phone.clone().unwrap_or_else(|| "-".into()),
            r.joined_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    println!("{} referrals, {} in the last 7 days", summary.total, summary.last_week);
    Ok(())
}

/// Prints the payload for one share channel.
pub fn cmd_share(channel: Channel, silent: bool) -> CareResult<SharePayload> {
    let mut board = open_board()?;
    let at = std::time::Instant::now();
    let payload = board.share_referral(channel, at)?;
    if !silent {
        match &payload {
            SharePayload::Mail { subject, body, url } => {
                println!("Subject: {}\n\n{}\n\n{}", subject, body, url);
            }
            other => println!("{}", other.as_str()),
        }
        if board.copy_notice_visible(at) {
            println!("Copied to clipboard.");
        }
    }
    Ok(payload)
}

pub fn cmd_session_set(staff_id: String, name: String, category: StaffCategory, silent: bool) -> CareResult<()> {
    if staff_id.trim().is_empty() {
        return Err(CareError::InvalidInput("staff id is empty".into()));
    }
    let (scheduler, _) = open_scheduler()?;
    scheduler.save_session(&StaffSession { staff_id: staff_id.clone(), display_name: name, category })?;
    if !silent {
        println!("Signed in as {}.", staff_id);
    }
    Ok(())
}

pub fn cmd_session_show() -> CareResult<()> {
    let (scheduler, _) = open_scheduler()?;
    let s = scheduler.fetch_staff_session()?;
    println!("{} ({}, {})", s.display_name, s.staff_id, s.category);
    Ok(())
}

pub fn cmd_session_clear(silent: bool) -> CareResult<()> {
    let (scheduler, _) = open_scheduler()?;
    scheduler.clear_session()?;
    if !silent {
        println!("Signed out.");
    }
    Ok(())
}

/// Defines a new task.
pub fn cmd_task_add(
    title: String,
    description: Option<String>,
    kind: TaskKind,
    priority: Priority,
    due: Option<String>,
    timer: Option<u32>,
    silent: bool,
) -> CareResult<u64> {
    let due_date = due.as_deref().map(parse_date).transpose()?;
    let (scheduler, _) = open_scheduler()?;
    let def = scheduler.define_task(&title, description.as_deref().unwrap_or(""), kind, priority, due_date, timer)?;
    if !silent {
        println!("Task defined (id = {})", def.id);
    }
    Ok(def.id)
}

pub fn cmd_task_list() -> CareResult<()> {
    let (scheduler, _) = open_scheduler()?;
    let defs = scheduler.list_definitions()?;
    if defs.is_empty() {
        println!("No task definitions found.");
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["ID", "Title", "Type", "Priority", "Due", "Timer", "Active"]);
    for d in defs {
        table.add_row(vec![
            d.id.to_string(),
            d.title,
            d.kind.to_string(),
            d.priority.to_string(),
            d.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            d.referral_timer_minutes.map(|m| format!("{}m", m)).unwrap_or_else(|| "-".into()),
            if d.active { "yes".into() } else { "no".into() },
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_assign(task_id: u64, staff_id: String, silent: bool) -> CareResult<u64> {
    let (scheduler, _) = open_scheduler()?;
    let a = scheduler.assign(task_id, &staff_id)?;
    if !silent {
        println!("Assigned task {} to {} (assignment {})", task_id, staff_id, a.id);
    }
    Ok(a.id)
}

/// Records a referral conversion against a code.
pub fn cmd_convert(code: String, name: String, email: Option<String>, phone: Option<String>, silent: bool) -> CareResult<()> {
    let (scheduler, _) = open_scheduler()?;
    let record = scheduler.record_conversion(&code, &name, email, phone)?;
    if !silent {
        println!("{} joined with code {}.", record.name, record.referral_code);
    }
    Ok(())
}

pub fn cmd_deactivate(id: u64, silent: bool) -> CareResult<()> {
    let (scheduler, _) = open_scheduler()?;
    scheduler.deactivate(id)?;
    if !silent {
        println!("Assignment {} deactivated.", id);
    }
    Ok(())
}
