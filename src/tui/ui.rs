use std::time::Instant;

use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use super::app::{App, InputMode};
use crate::board::StatsSource;
use crate::countdown::shows_countdown;
use crate::lifecycle::Action;
use crate::models::{Priority, Status};
use crate::referral::is_referral_eligible;
use crate::scheduler::Scheduler;
use crate::share::Channel;

fn status_style(status: Status) -> Style {
    match status {
        Status::Assigned => Style::default().fg(Color::Blue),
        Status::Accepted => Style::default().fg(Color::Cyan),
        Status::InProgress => Style::default().fg(Color::Yellow),
        Status::Completed => Style::default().fg(Color::Green),
        Status::Rejected => Style::default().fg(Color::DarkGray),
    }
}

pub fn ui<S: Scheduler>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Stats
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Banner / inline errors
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    render_stats(f, app, chunks[0]);
    render_table(f, app, chunks[1]);
    render_messages(f, app, chunks[2]);

    let help_text = match app.input_mode {
        InputMode::Normal => {
            "q: Quit | a: Accept | s: Start | c: Complete | x: Reject | f: Filter | [/]: Page | r: Refresh | w: Share | Esc: Dismiss"
        }
        InputMode::Notes(_) => "Enter: Save | Esc: Cancel",
        InputMode::Share => "j/k: Channel | Enter: Share | Esc: Close",
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[3]);

    match app.input_mode {
        InputMode::Notes(action) => {
            let area = centered_rect(60, 3, f.area());
            f.render_widget(Clear, area);
            let title = match action {
                Action::Complete => "Complete: Notes (Optional)",
                Action::Reject => "Reject: Reason (Optional)",
                _ => "Notes",
            };
            let input = Paragraph::new(app.input_buffer.as_str())
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL).title(title));
            f.render_widget(input, area);
        }
        InputMode::Share => render_share(f, app),
        InputMode::Normal => {}
    }
}

fn render_stats<S: Scheduler>(f: &mut Frame, app: &App<S>, area: Rect) {
    let (stats, source) = app.board.statistics();
    let mut spans = vec![
        Span::raw(format!("Total {}  ", stats.total)),
        Span::styled(format!("Pending {}  ", stats.pending), Style::default().fg(Color::Blue)),
        Span::styled(format!("In Progress {}  ", stats.in_progress), Style::default().fg(Color::Yellow)),
        Span::styled(format!("Completed {}  ", stats.completed), Style::default().fg(Color::Green)),
        Span::styled(
            format!("Overdue {}", stats.overdue),
            if stats.overdue > 0 { Style::default().fg(Color::Red) } else { Style::default() },
        ),
    ];
    if source == StatsSource::Page {
        spans.push(Span::styled("  (this page)", Style::default().fg(Color::DarkGray)));
    }
    let session = app.board.session();
    let title = format!("Clinitask - {} ({})", session.display_name, session.category);
    let p = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn render_table<S: Scheduler>(f: &mut Frame, app: &mut App<S>, area: Rect) {
    let today = Local::now().date_naive();
    let rows: Vec<Row> = app
        .board
        .assignments()
        .iter()
        .map(|a| {
            let window = if shows_countdown(a) {
                match app.board.countdown(a.id) {
                    Some(c) if c.is_expired() => Cell::from("00:00:00").style(Style::default().fg(Color::DarkGray)),
                    Some(c) if c.is_urgent() => Cell::from(c.display()).style(Style::default().fg(Color::Red)),
                    Some(c) => Cell::from(c.display()).style(Style::default().fg(Color::Green)),
                    None => Cell::from("-"),
                }
            } else {
                Cell::from("-")
            };
            let due = match a.task.due_date {
                Some(d) if a.is_overdue(today) => Cell::from(format!("{} !", d)).style(Style::default().fg(Color::Red)),
                Some(d) => Cell::from(d.to_string()),
                None => Cell::from("-"),
            };
            let priority_style = match a.task.priority {
                Priority::Urgent => Style::default().fg(Color::Red),
                Priority::High => Style::default().fg(Color::Yellow),
                _ => Style::default(),
            };
            let status = if app.board.is_updating(a.id) {
                Cell::from("Updating...")
            } else {
                Cell::from(a.status.label()).style(status_style(a.status))
            };
            Row::new(vec![
                Cell::from(a.id.to_string()),
                Cell::from(a.task.title.clone()),
                Cell::from(a.task.kind.to_string()),
                Cell::from(a.task.priority.to_string()).style(priority_style),
                due,
                status,
                Cell::from(format!("{}%", a.progress)),
                Cell::from(if is_referral_eligible(a) { a.referral_count.to_string() } else { "-".into() }),
                window,
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Min(20),
        Constraint::Length(9),
        Constraint::Length(8),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Length(6),
        Constraint::Length(9),
        Constraint::Length(10),
    ];

    let store = app.board.store();
    let filter = store.filter().map(|s| s.label()).unwrap_or("All");
    let title = format!("Assignments - {} - page {} of {}", filter, store.page(), store.total_pages().max(1));
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["ID", "Task", "Type", "Priority", "Due", "Status", "Prog", "Referrals", "Window"])
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                .bottom_margin(1),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_messages<S: Scheduler>(f: &mut Frame, app: &App<S>, area: Rect) {
    let (text, style) = if let Some(b) = &app.banner {
        (format!("{} (Esc to dismiss)", b), Style::default().fg(Color::White).bg(Color::Red))
    } else if let Some(i) = &app.inline {
        (i.clone(), Style::default().fg(Color::Yellow))
    } else {
        (String::new(), Style::default())
    };
    let p = Paragraph::new(text).style(style).block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn render_share<S: Scheduler>(f: &mut Frame, app: &mut App<S>) {
    let area = centered_rect(70, Channel::ALL.len() as u16 + 6, f.area());
    f.render_widget(Clear, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(4)])
        .split(area);

    let rows: Vec<Row> = Channel::ALL.iter().map(|c| Row::new(vec![Cell::from(c.label())])).collect();
    let list = Table::new(rows, [Constraint::Min(10)])
        .block(Block::default().borders(Borders::ALL).title("Share Referral"))
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[0], &mut app.share_state);

    let copied = app.board.copy_notice_visible(Instant::now());
    let title = if copied { "Copied!" } else { "Payload" };
    let payload = Paragraph::new(app.shared.clone().unwrap_or_default())
        .wrap(ratatui::widgets::Wrap { trim: true })
        .style(Style::default().fg(if copied { Color::Green } else { Color::Gray }))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(payload, chunks[1]);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let height = height.min(r.height);
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((r.height - height) / 2),
            Constraint::Length(height),
            Constraint::Length((r.height - height) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
