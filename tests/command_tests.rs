use clinitask::commands::*;
use clinitask::error::CareError;
use clinitask::lifecycle::Action;
use clinitask::models::{Priority, StaffCategory, Status, TaskKind};
use clinitask::scheduler::Scheduler;
use clinitask::share::{Channel, SharePayload};
use clinitask::storage::JsonScheduler;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

// Tests share the CLINITASK_DATA variable, so they run one at a time.
static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn with_test_data<F>(f: F)
where
    F: FnOnce(&Path),
{
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    env::set_var("CLINITASK_DATA", dir.path());
    f(dir.path());
    env::remove_var("CLINITASK_DATA");
}

fn sign_in() {
    cmd_session_set("dr-lee".into(), "Dr. Lee".into(), StaffCategory::Doctor, true).unwrap();
}

fn referral_task() -> u64 {
    cmd_task_add(
        "Invite new patients".into(),
        Some("Share your code".into()),
        TaskKind::NewUser,
        Priority::High,
        None,
        Some(60),
        true,
    )
    .unwrap()
}

#[test]
fn test_full_lifecycle() {
    with_test_data(|_| {
        sign_in();
        let task = cmd_task_add("Ward round".into(), None, TaskKind::Daily, Priority::Medium, None, None, true).unwrap();
        let id = cmd_assign(task, "dr-lee".into(), true).unwrap();

        assert_eq!(cmd_transition(id, Action::Accept, None, true).unwrap().status, Status::Accepted);
        let started = cmd_transition(id, Action::Start, None, true).unwrap();
        assert_eq!(started.status, Status::InProgress);
        assert!(started.started_at.is_some());

        let done = cmd_transition(id, Action::Complete, Some("  all beds seen ".into()), true).unwrap();
        assert_eq!(done.status, Status::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.notes, "all beds seen");
        assert_eq!(done.started_at, started.started_at);
    });
}

#[test]
fn test_invalid_transition_is_rejected() {
    with_test_data(|dir| {
        sign_in();
        let task = cmd_task_add("Ward round".into(), None, TaskKind::Daily, Priority::Low, None, None, true).unwrap();
        let id = cmd_assign(task, "dr-lee".into(), true).unwrap();

        let err = cmd_transition(id, Action::Start, None, true).unwrap_err();
        assert!(matches!(err, CareError::InvalidTransition { from: Status::Assigned, to: Status::InProgress }));

        let stored = JsonScheduler::new(dir, 10).fetch_assignment(id).unwrap();
        assert_eq!(stored.status, Status::Assigned);
    });
}

#[test]
fn test_requires_session() {
    with_test_data(|_| {
        assert!(matches!(cmd_transition(1, Action::Accept, None, true), Err(CareError::Unauthorized)));
        assert!(matches!(cmd_referral_code(true), Err(CareError::Unauthorized)));

        sign_in();
        cmd_session_clear(true).unwrap();
        assert!(matches!(cmd_list(None, 1), Err(CareError::Unauthorized)));
    });
}

#[test]
fn test_other_members_assignments_are_hidden() {
    with_test_data(|_| {
        sign_in();
        let task = cmd_task_add("Diet plan".into(), None, TaskKind::Weekly, Priority::Low, None, None, true).unwrap();
        let id = cmd_assign(task, "diet-ray".into(), true).unwrap();
        assert!(matches!(cmd_transition(id, Action::Accept, None, true), Err(CareError::NotFound(_))));
    });
}

#[test]
fn test_referral_code_and_conversion() {
    with_test_data(|dir| {
        sign_in();
        let task = referral_task();
        let open = cmd_assign(task, "dr-lee".into(), true).unwrap();
        let closed = cmd_assign(task, "dr-lee".into(), true).unwrap();
        cmd_transition(closed, Action::Reject, Some("on leave".into()), true).unwrap();

        let code = cmd_referral_code(true).unwrap();
        assert_eq!(code, "DOC101");
        // Issued once, then reused.
        assert_eq!(cmd_referral_code(true).unwrap(), "DOC101");

        cmd_convert(code, "Sam".into(), Some("sam@example.com".into()), None, true).unwrap();

        let scheduler = JsonScheduler::new(dir, 10);
        assert_eq!(scheduler.fetch_assignment(open).unwrap().referral_count, 1);
        assert_eq!(scheduler.fetch_assignment(closed).unwrap().referral_count, 0);
        let records = scheduler.fetch_referrals("dr-lee").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Sam");
    });
}

#[test]
fn test_unknown_code_is_not_found() {
    with_test_data(|_| {
        sign_in();
        let err = cmd_convert("NOPE1".into(), "Sam".into(), None, None, true).unwrap_err();
        assert!(matches!(err, CareError::NotFound(_)));
    });
}

#[test]
fn test_share_copy_link() {
    with_test_data(|_| {
        sign_in();
        let payload = cmd_share(Channel::CopyLink, true).unwrap();
        assert_eq!(payload, SharePayload::Text("https://app.example/register?ref=DOC101".into()));

        match cmd_share(Channel::Email, true).unwrap() {
            SharePayload::Mail { subject, url, .. } => {
                assert_eq!(subject, "Join me on Clinitask");
                assert!(url.starts_with("mailto:?subject=Join%20me%20on%20Clinitask"));
            }
            other => panic!("expected mail payload, got {:?}", other),
        }
    });
}

#[test]
fn test_deactivate_hides_assignment() {
    with_test_data(|dir| {
        sign_in();
        let task = cmd_task_add("Ward round".into(), None, TaskKind::Daily, Priority::Medium, None, None, true).unwrap();
        let id = cmd_assign(task, "dr-lee".into(), true).unwrap();
        cmd_deactivate(id, true).unwrap();

        let page = JsonScheduler::new(dir, 10).fetch_assignments("dr-lee", None, 1).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert!(matches!(cmd_transition(id, Action::Accept, None, true), Err(CareError::NotFound(_))));
    });
}

#[test]
fn test_paging_filter_and_order() {
    with_test_data(|dir| {
        sign_in();
        let task = cmd_task_add("Ward round".into(), None, TaskKind::Daily, Priority::Medium, None, None, true).unwrap();
        let ids: Vec<u64> = (0..3).map(|_| cmd_assign(task, "dr-lee".into(), true).unwrap()).collect();
        cmd_transition(ids[0], Action::Accept, None, true).unwrap();

        let scheduler = JsonScheduler::new(dir, 2);
        let first = scheduler.fetch_assignments("dr-lee", None, 1).unwrap();
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.items.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);
        let second = scheduler.fetch_assignments("dr-lee", None, 2).unwrap();
        assert_eq!(second.items.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[0]]);

        let accepted = scheduler.fetch_assignments("dr-lee", Some(Status::Accepted), 1).unwrap();
        assert_eq!(accepted.items.len(), 1);
        assert_eq!(accepted.items[0].id, ids[0]);

        // A transition found on a later page is still reachable from the CLI.
        cmd_transition(ids[0], Action::Start, None, true).unwrap();

        let stats = scheduler.fetch_statistics("dr-lee").unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.in_progress, 1);
        assert!(matches!(scheduler.fetch_statistics("someone-else"), Err(CareError::Unauthorized)));
    });
}

#[test]
fn test_bad_due_date() {
    with_test_data(|_| {
        let err = cmd_task_add(
            "Ward round".into(),
            None,
            TaskKind::Daily,
            Priority::Medium,
            Some("next week".into()),
            None,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, CareError::InvalidInput(_)));
    });
}

#[test]
fn test_concurrent_change_is_a_conflict() {
    with_test_data(|dir| {
        sign_in();
        let task = cmd_task_add("Ward round".into(), None, TaskKind::Daily, Priority::Medium, None, None, true).unwrap();
        let id = cmd_assign(task, "dr-lee".into(), true).unwrap();
        cmd_transition(id, Action::Accept, None, true).unwrap();

        let mut board = open_board().unwrap();
        board.refresh().unwrap();
        assert_eq!(board.store().get(id).unwrap().status, Status::Accepted);

        // Someone else rejects it after the board loaded.
        let path = dir.join("assignments.json");
        let mut rows: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        rows[0]["status"] = "rejected".into();
        fs::write(&path, serde_json::to_string_pretty(&rows).unwrap()).unwrap();

        let err = board.request_transition(id, Status::InProgress, None).unwrap_err();
        assert!(matches!(err, CareError::Conflict { current: Status::Rejected, .. }));
        assert_eq!(board.store().get(id).unwrap().status, Status::Rejected);

        let stored = JsonScheduler::new(dir, 10).fetch_assignment(id).unwrap();
        assert_eq!(stored.status, Status::Rejected);
        assert!(stored.started_at.is_none());
    });
}

#[test]
fn test_conversion_writes_both_files_or_neither() {
    with_test_data(|dir| {
        sign_in();
        let task = referral_task();
        let id = cmd_assign(task, "dr-lee".into(), true).unwrap();
        let code = cmd_referral_code(true).unwrap();

        // Staging the referral book fails once a directory sits in its place.
        fs::create_dir(dir.join("referrals.json.tmp")).unwrap();
        assert!(cmd_convert(code.clone(), "Sam".into(), None, None, true).is_err());

        let scheduler = JsonScheduler::new(dir, 10);
        assert_eq!(scheduler.fetch_assignment(id).unwrap().referral_count, 0);
        assert!(scheduler.fetch_referrals("dr-lee").unwrap().is_empty());
        assert!(!dir.join("assignments.json.tmp").exists());

        fs::remove_dir(dir.join("referrals.json.tmp")).unwrap();
        cmd_convert(code, "Sam".into(), None, None, true).unwrap();
        assert_eq!(scheduler.fetch_assignment(id).unwrap().referral_count, 1);
        assert_eq!(scheduler.fetch_referrals("dr-lee").unwrap().len(), 1);
    });
}
