//! Mapping from raw remote records to canonical entities.
//!
//! Every mapper is a total function: it accepts null, an empty object, a
//! partial object, or legacy/alternate field spellings, and always
//! returns a fully-populated entity. Nothing here can fail or panic;
//! unparseable fields silently take their documented defaults.
//!
//! The `*_at` inner functions thread an explicit `now` so mapping is
//! deterministic under test; the public functions pass `Utc::now()`.

use crate::entities::{
    AppSettings, Task, TaskStatus, Tier, UserProfile, UserTaskState, Withdrawal, WithdrawalStatus,
};
use chrono::{DateTime, Utc};
use dashlink_types::{RawRecord, TreePath, normalize_timestamp};
use serde_json::{Map, Value, json};

/// Record ids fall back to the path leaf; an empty id is as useless as a
/// missing one.
fn id_or<'a>(raw: &'a RawRecord, names: &[&str], fallback: &'a str) -> &'a str {
    raw.str_field(names)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

fn timestamp_or(raw: &RawRecord, names: &[&str], fallback: DateTime<Utc>) -> DateTime<Utc> {
    match raw.field(names) {
        Some(v) => normalize_timestamp(v, fallback),
        None => fallback,
    }
}

fn opt_timestamp(raw: &RawRecord, names: &[&str]) -> Option<DateTime<Utc>> {
    let v = raw.field(names)?;
    if v.is_null() {
        return None;
    }
    let marker = Utc::now();
    let ts = normalize_timestamp(v, marker);
    // Unparseable optional timestamps stay absent rather than defaulting.
    (ts != marker).then_some(ts)
}

/// Maps a raw user record to a canonical profile.
#[must_use]
pub fn map_user(raw: &RawRecord, fallback_id: &str) -> UserProfile {
    map_user_at(raw, fallback_id, Utc::now())
}

#[must_use]
pub fn map_user_at(raw: &RawRecord, fallback_id: &str, now: DateTime<Utc>) -> UserProfile {
    let tier = raw
        .str_field(&["tier", "vip_level", "plan"])
        .map(Tier::parse_or_default)
        .unwrap_or_default();
    let multiplier = raw
        .num_field(&["multiplier", "farming_multiplier"])
        .filter(|m| *m > 0.0)
        .unwrap_or(1.0);

    UserProfile {
        id: id_or(raw, &["id", "user_id", "uid"], fallback_id).to_string(),
        coins: raw.u64_field(&["coins", "balance", "points"]).unwrap_or(0),
        tier,
        multiplier,
        referral_code: raw
            .str_field(&["referral_code", "ref_code"])
            .unwrap_or("")
            .to_string(),
        referred_by: raw
            .str_field(&["referred_by", "referrer"])
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        created_at: timestamp_or(raw, &["created_at", "createdAt"], now),
        updated_at: timestamp_or(raw, &["updated_at", "updatedAt"], now),
    }
}

/// Maps a raw task record to a canonical task.
#[must_use]
pub fn map_task(raw: &RawRecord, fallback_id: &str) -> Task {
    map_task_at(raw, fallback_id, Utc::now())
}

#[must_use]
pub fn map_task_at(raw: &RawRecord, fallback_id: &str, now: DateTime<Utc>) -> Task {
    Task {
        id: id_or(raw, &["id", "task_id"], fallback_id).to_string(),
        title: raw
            .str_field(&["title", "name"])
            .unwrap_or("")
            .to_string(),
        reward: raw.u64_field(&["reward", "coins", "prize"]).unwrap_or(0),
        url: raw.str_field(&["url", "link"]).unwrap_or("").to_string(),
        category: raw
            .str_field(&["category", "type"])
            .unwrap_or("")
            .to_string(),
        active: raw.bool_field(&["active", "enabled"]).unwrap_or(true),
        created_at: timestamp_or(raw, &["created_at", "createdAt"], now),
    }
}

/// Maps a raw per-user task progress record.
#[must_use]
pub fn map_user_task(raw: &RawRecord, fallback_task_id: &str) -> UserTaskState {
    let status = raw
        .str_field(&["status", "state"])
        .map(TaskStatus::parse_or_default)
        .unwrap_or_else(|| {
            // Older builds wrote booleans instead of a status string.
            if raw.bool_field(&["claimed"]).unwrap_or(false) {
                TaskStatus::Claimed
            } else if raw.bool_field(&["completed", "done"]).unwrap_or(false) {
                TaskStatus::Completed
            } else {
                TaskStatus::Available
            }
        });

    UserTaskState {
        task_id: id_or(raw, &["task_id", "taskId"], fallback_task_id).to_string(),
        status,
        started_at: opt_timestamp(raw, &["started_at", "startedAt"]),
        completed_at: opt_timestamp(raw, &["completed_at", "completedAt"]),
    }
}

/// Maps a raw withdrawal record.
#[must_use]
pub fn map_withdrawal(raw: &RawRecord, fallback_id: &str) -> Withdrawal {
    map_withdrawal_at(raw, fallback_id, Utc::now())
}

#[must_use]
pub fn map_withdrawal_at(raw: &RawRecord, fallback_id: &str, now: DateTime<Utc>) -> Withdrawal {
    Withdrawal {
        id: id_or(raw, &["id", "withdrawal_id"], fallback_id).to_string(),
        amount: raw.u64_field(&["amount", "coins"]).unwrap_or(0),
        address: raw
            .str_field(&["address", "wallet", "wallet_address"])
            .unwrap_or("")
            .to_string(),
        status: raw
            .str_field(&["status"])
            .map(WithdrawalStatus::parse_or_default)
            .unwrap_or_default(),
        requested_at: timestamp_or(raw, &["requested_at", "created_at", "createdAt"], now),
    }
}

/// Maps the raw settings record.
#[must_use]
pub fn map_settings(raw: &RawRecord) -> AppSettings {
    AppSettings {
        min_withdrawal: raw
            .u64_field(&["min_withdrawal", "minWithdrawal"])
            .unwrap_or(0),
        withdrawal_fee: raw
            .num_field(&["withdrawal_fee", "withdrawalFee", "fee"])
            .filter(|f| *f >= 0.0)
            .unwrap_or(0.0),
        maintenance: raw
            .bool_field(&["maintenance", "maintenance_mode"])
            .unwrap_or(false),
    }
}

/// Which mapper a subscription path routes through.
///
/// Collection kinds map every child of the subtree (the store pushes the
/// whole node on each snapshot); `Raw` passes the record through
/// untouched for untyped subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Tasks,
    UserTasks,
    Withdrawals,
    Settings,
    Raw,
}

impl EntityKind {
    /// Routes a logical path to its mapper by collection root.
    #[must_use]
    pub fn for_path(path: &TreePath) -> Self {
        match path.root() {
            "entities" => Self::User,
            "tasks" => Self::Tasks,
            "userTasks" => Self::UserTasks,
            "withdrawals" => Self::Withdrawals,
            // `settings/vip` carries the UI pricing table; passed raw.
            "settings" if path.as_str() == "settings" => Self::Settings,
            _ => Self::Raw,
        }
    }

    /// Maps a raw snapshot to its canonical JSON form.
    ///
    /// `fallback_id` is the path's leaf segment (the record's address),
    /// used when the record does not carry its own id.
    #[must_use]
    pub fn map(&self, raw: &RawRecord, fallback_id: &str) -> Value {
        match self {
            Self::User => json_of(&map_user(raw, fallback_id)),
            Self::Tasks => map_collection(raw, |child, key| json_of(&map_task(child, key))),
            Self::UserTasks => {
                map_collection(raw, |child, key| json_of(&map_user_task(child, key)))
            }
            Self::Withdrawals => {
                map_collection(raw, |child, key| json_of(&map_withdrawal(child, key)))
            }
            Self::Settings => json_of(&map_settings(raw)),
            Self::Raw => raw.as_value().clone(),
        }
    }
}

fn json_of<T: serde::Serialize>(entity: &T) -> Value {
    // Entities are plain serde structs; serialization cannot fail.
    serde_json::to_value(entity).unwrap_or(Value::Null)
}

fn map_collection(raw: &RawRecord, map_child: impl Fn(&RawRecord, &str) -> Value) -> Value {
    match raw.as_value() {
        Value::Object(children) => {
            let mut out = Map::with_capacity(children.len());
            for (key, child) in children {
                out.insert(key.clone(), map_child(&RawRecord::new(child.clone()), key));
            }
            Value::Object(out)
        }
        _ => json!({}),
    }
}
