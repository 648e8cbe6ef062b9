//! Data models for the tracker.
//!
//! These models represent the items stored in the local SQLite database and
//! the normalized records coming back from the remote API.
//!
//! All stored models derive Serialize for the HTTP API and FromRow for SQLx.

pub mod item;
pub mod overdue;

// Re-exports for convenient access
pub use item::{ExternalRecord, Item, ItemKind, ItemPatch, Priority, RemoteItem};
pub use overdue::{effective_due_date, overdue_days, today_utc, DUE_FALLBACK_DAYS};
