//! Canonical domain entities.
//!
//! Every field has a concrete default: numeric fields are never NaN or
//! missing, enums fall back to their documented default variant, strings
//! default to empty, and timestamps to the mapping instant. Entities are
//! constructed fresh from every remote snapshot, never partially merged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription tier of a user. Defaults to `Free`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Vip,
    VipPlus,
}

impl Tier {
    /// Parses a tier string; anything unrecognized is `Free`.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for Tier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "vip" => Ok(Self::Vip),
            "vip_plus" | "vipplus" | "vip+" => Ok(Self::VipPlus),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Free => "free",
            Self::Vip => "vip",
            Self::VipPlus => "vip_plus",
        };
        write!(f, "{s}")
    }
}

/// The canonical user record backing the dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub coins: u64,
    pub tier: Tier,
    /// Reward multiplier; 1.0 means no boost. Never NaN.
    pub multiplier: f64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of a user's progress on a task. Defaults to `Available`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Available,
    Started,
    Completed,
    Claimed,
}

impl TaskStatus {
    /// Parses a status string; anything unrecognized is `Available`.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "started" | "in_progress" => Self::Started,
            "completed" | "done" => Self::Completed,
            "claimed" | "rewarded" => Self::Claimed,
            _ => Self::Available,
        }
    }
}

/// A task offered on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub reward: u64,
    pub url: String,
    pub category: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A user's progress on one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTaskState {
    pub task_id: String,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Status of a withdrawal request. Defaults to `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl WithdrawalStatus {
    /// Parses a status string; anything unrecognized is `Pending`.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Self::Approved,
            "rejected" | "declined" => Self::Rejected,
            "paid" | "sent" => Self::Paid,
            _ => Self::Pending,
        }
    }
}

/// A withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: String,
    pub amount: u64,
    pub address: String,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
}

/// Application-wide settings published by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub min_withdrawal: u64,
    pub withdrawal_fee: f64,
    pub maintenance: bool,
}
