//! Task assignment board for clinical staff.
//!
//! Doctors and dietitians receive assignments of shared task definitions,
//! move them through a fixed lifecycle, and grow their referral count on
//! referral-bearing tasks whose windows count down live.

pub mod board;
pub mod commands;
pub mod config;
pub mod countdown;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod referral;
pub mod scheduler;
pub mod share;
pub mod stats;
pub mod storage;
pub mod store;
pub mod tui;

pub use board::{Board, StatsSource};
pub use error::{CareError, CareResult};
pub use models::{Assignment, StaffSession, Status};
pub use scheduler::{AssignmentPage, Scheduler};
