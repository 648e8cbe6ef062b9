//! Repo Triage - issue and pull request tracker with local overlay fields.
//!
//! Mirrors issues and pull requests from a remote code-hosting API into
//! SQLite and overlays locally-owned triage fields that survive re-sync.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
