//! # Clinitask
//!
//! Terminal task board for clinical staff. Doctors and dietitians work
//! through their assigned tasks, track referral windows that count down
//! live, and share their referral code.
//!
//! ## Usage
//!
//! ### Interactive Mode (TUI)
//!
//! ```bash
//! clinitask
//! # or explicitly
//! clinitask ui
//! ```
//!
//! #### Board Key Bindings
//!
//! *   `q`: Quit
//! *   `j`/`k`: Move selection
//! *   `a`: Accept, `s`: Start, `c`: Complete, `x`: Reject (asks for notes)
//! *   `f`: Cycle status filter
//! *   `[` / `]`: Previous / next page
//! *   `r`: Refresh
//! *   `w`: Share referral code
//! *   `Esc`: Dismiss error banner
//!
//! ### Command Line Interface (CLI)
//!
//! ```bash
//! clinitask session set dr-lee --name "Dr. Lee" --category doctor
//! clinitask task add "New patient referrals" --kind new_user --priority high --timer 1440
//! clinitask assign 1 dr-lee
//! clinitask list --status assigned
//! clinitask accept 1
//! clinitask complete 1 --notes "Onboarded three patients"
//! clinitask share whatsapp
//! ```
//!
//! ## Data Storage
//!
//! Files live in your local data directory (`~/.local/share/clinitask` on
//! Linux). Override it with the `CLINITASK_DATA` environment variable.

use std::io;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use clinitask::commands::*;
use clinitask::config::data_dir;
use clinitask::error::CareResult;
use clinitask::lifecycle::Action;
use clinitask::logging;
use clinitask::models::{Priority, StaffCategory, Status, TaskKind};
use clinitask::share::Channel;
use clinitask::tui::run_tui;

#[derive(Parser)]
#[command(name = "clinitask")]
#[command(about = "Task board for clinical staff", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List your assignments
    List {
        /// Only show assignments with this status
        #[arg(short, long)]
        status: Option<Status>,
        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Accept an assignment
    Accept {
        id: u64,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Start working on an accepted assignment
    Start {
        id: u64,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Mark an assignment as completed
    Complete {
        id: u64,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Reject an assignment
    Reject {
        id: u64,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Show assignment statistics
    Stats,
    /// Show open referral windows
    Countdown,
    /// Referral code and converted referrals
    Referral {
        #[command(subcommand)]
        command: ReferralCommands,
    },
    /// Print a share payload for your referral code
    Share {
        channel: Channel,
    },
    /// Manage the signed-in staff member
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Manage task definitions
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Assign a task definition to a staff member
    Assign {
        task_id: u64,
        staff_id: String,
    },
    /// Record a referral conversion for a code
    Convert {
        code: String,
        /// Name of the referred person
        name: String,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        phone: Option<String>,
    },
    /// Deactivate an assignment
    Deactivate {
        id: u64,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
    /// Open interactive board
    Ui,
}

#[derive(Subcommand)]
enum ReferralCommands {
    /// Show your referral code and link
    Code,
    /// List converted referrals
    List,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Sign in as a staff member
    Set {
        staff_id: String,
        /// Display name used in share messages
        #[arg(short, long)]
        name: String,
        #[arg(short, long, value_enum, default_value_t = StaffCategory::Doctor)]
        category: StaffCategory,
    },
    /// Show the signed-in staff member
    Show,
    /// Sign out
    Clear,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Define a new task
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, value_enum, default_value_t = TaskKind::Daily)]
        kind: TaskKind,
        #[arg(short, long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Due date in YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// Referral window length in minutes
        #[arg(short, long)]
        timer: Option<u32>,
    },
    /// List task definitions
    List,
}

fn run(command: Option<Commands>) -> CareResult<()> {
    match command {
        Some(Commands::List { status, page }) => cmd_list(status, page),
        Some(Commands::Accept { id, notes }) => cmd_transition(id, Action::Accept, notes, false).map(|_| ()),
        Some(Commands::Start { id, notes }) => cmd_transition(id, Action::Start, notes, false).map(|_| ()),
        Some(Commands::Complete { id, notes }) => cmd_transition(id, Action::Complete, notes, false).map(|_| ()),
        Some(Commands::Reject { id, notes }) => cmd_transition(id, Action::Reject, notes, false).map(|_| ()),
        Some(Commands::Stats) => cmd_stats(),
        Some(Commands::Countdown) => cmd_countdown(),
        Some(Commands::Referral { command }) => match command {
            ReferralCommands::Code => cmd_referral_code(false).map(|_| ()),
            ReferralCommands::List => cmd_referral_list(),
        },
        Some(Commands::Share { channel }) => cmd_share(channel, false).map(|_| ()),
        Some(Commands::Session { command }) => match command {
            SessionCommands::Set { staff_id, name, category } => cmd_session_set(staff_id, name, category, false),
            SessionCommands::Show => cmd_session_show(),
            SessionCommands::Clear => cmd_session_clear(false),
        },
        Some(Commands::Task { command }) => match command {
            TaskCommands::Add { title, description, kind, priority, due, timer } => {
                cmd_task_add(title, description, kind, priority, due, timer, false).map(|_| ())
            }
            TaskCommands::List => cmd_task_list(),
        },
        Some(Commands::Assign { task_id, staff_id }) => cmd_assign(task_id, staff_id, false).map(|_| ()),
        Some(Commands::Convert { code, name, email, phone }) => cmd_convert(code, name, email, phone, false),
        Some(Commands::Deactivate { id }) => cmd_deactivate(id, false),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "clinitask", &mut io::stdout());
            Ok(())
        }
        Some(Commands::Ui) | None => run_tui(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let ui = matches!(cli.command, Some(Commands::Ui) | None);
    if ui {
        if let Err(e) = logging::init_file(&data_dir().join("clinitask.log")) {
            eprintln!("Could not open log file: {}", e);
        }
    } else {
        logging::init_stderr();
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
