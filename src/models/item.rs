//! Tracked item model.
//!
//! An item is one issue or pull request mirrored from the remote API,
//! carrying external columns (overwritten on every sync) and overlay columns
//! (owned locally, only mutated through patches).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of tracked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Issue,
    Pr,
}

impl ItemKind {
    /// Parse a kind from its wire/path representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "issue" => Some(Self::Issue),
            "pr" => Some(Self::Pr),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issue => write!(f, "issue"),
            Self::Pr => write!(f, "pr"),
        }
    }
}

/// Triage priority. Lower value = more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Normalize a raw integer to the closed priority set.
    ///
    /// Out-of-range values collapse to `Low` (the lowest urgency), which is
    /// also the default for freshly synced rows.
    pub fn from_i64(v: i64) -> Self {
        match v {
            0 => Self::Urgent,
            1 => Self::High,
            2 => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Integer form stored in the database.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Low
    }
}

/// A tracked issue or pull request with its local overlay.
///
/// Timestamps and dates are kept as the ISO-8601-ish strings the remote API
/// hands out (timezone-tolerant parsing happens in `models::overdue`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Item kind: `issue` or `pr`.
    pub kind: String,

    /// Repository full name (`owner/name`).
    pub repo_full_name: String,

    /// The remote system's number/id for this item, as a string.
    #[serde(rename = "key")]
    pub external_key: String,

    // External columns, overwritten on every sync.
    pub title: String,
    pub state: String,
    pub url: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,

    // Overlay columns, only mutated through patches.
    pub assignee: String,
    pub assignee_group: String,
    pub note: String,
    pub estimated_resolve_at: String,
    pub sync_internal: bool,
    pub priority: i64,
    pub due_at: String,

    /// Derived at read time, never stored.
    #[sqlx(skip)]
    pub overdue_days: i64,
}

impl Item {
    /// Parse the kind column into the enum.
    pub fn kind_enum(&self) -> Option<ItemKind> {
        ItemKind::parse(&self.kind)
    }

    /// Parse the priority column into the normalized enum.
    pub fn priority_enum(&self) -> Priority {
        Priority::from_i64(self.priority)
    }

    /// Whether the remote state counts as open (case-insensitive).
    pub fn is_open(&self) -> bool {
        self.state.eq_ignore_ascii_case("open")
    }
}

/// A normalized record from the remote API, not yet bound to a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub key: String,
    pub title: String,
    pub state: String,
    pub url: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
}

/// External columns for one item, addressed by the full identity triple.
///
/// This is what the merge/upsert engine writes; overlay columns are never
/// part of it.
#[derive(Debug, Clone)]
pub struct ExternalRecord {
    pub kind: ItemKind,
    pub repo_full_name: String,
    pub external_key: String,
    pub title: String,
    pub state: String,
    pub url: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ExternalRecord {
    /// Bind a normalized remote item to a kind and repository.
    pub fn from_remote(kind: ItemKind, repo_full_name: &str, item: RemoteItem) -> Self {
        Self {
            kind,
            repo_full_name: repo_full_name.to_string(),
            external_key: item.key,
            title: item.title,
            state: item.state,
            url: item.url,
            author: item.author,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }

    /// Basic validity: a record needs an identity key, a repository, and a
    /// title to be addressable later.
    pub fn is_valid(&self) -> bool {
        !self.external_key.is_empty() && !self.repo_full_name.is_empty() && !self.title.is_empty()
    }
}

/// Sparse patch of the overlay columns.
///
/// Absent fields (`None`) leave the stored value unchanged; present fields
/// set it, so `Some("")` is an explicit clear rather than a no-op.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub assignee: Option<String>,
    pub assignee_group: Option<String>,
    pub note: Option<String>,
    pub estimated_resolve_at: Option<String>,
    pub sync_internal: Option<bool>,
    pub priority: Option<i64>,
    pub due_at: Option<String>,
}
