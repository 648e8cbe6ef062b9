//! Service layer: remote API client, sync engine, notifications.

pub mod notify;
pub mod remote;
pub mod sync;
