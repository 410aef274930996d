//! Canonical entity model for Dashlink.
//!
//! Raw remote records are loosely typed: fields go missing, carry legacy
//! spellings, or hold the wrong JSON type. This crate turns them into
//! strict, fully-defaulted entities so the UI layer never sees an
//! undefined field or a NaN.

mod entities;
mod mapper;

pub use entities::{
    AppSettings, Task, TaskStatus, Tier, UserProfile, UserTaskState, Withdrawal, WithdrawalStatus,
};
pub use mapper::{
    EntityKind, map_settings, map_task, map_task_at, map_user, map_user_at, map_user_task,
    map_withdrawal, map_withdrawal_at,
};
