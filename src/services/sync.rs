//! Sync engine: drives the remote item source and the merge/upsert path.
//!
//! Repositories are processed sequentially and independently. Each
//! repository's fetch covers both issues and pull requests; its upsert runs
//! in its own transaction, so one repository's failure never corrupts rows
//! already committed for another. Failures are collected, not swallowed:
//! the report always carries them so a partial failure is never presented as
//! a clean success.

use crate::db::{items, pool::DbPool};
use crate::error::AppError;
use crate::models::{ExternalRecord, ItemKind};
use crate::services::remote::RemoteClient;
use serde::Serialize;

/// Aggregate result of one sync run.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    /// Records fetched from the remote across all repositories.
    pub fetched: i64,

    /// Records actually written; fewer than `fetched` means some were
    /// dropped by validity checks.
    pub upserted: i64,

    /// Repositories that completed fetch + upsert.
    pub repos_synced: usize,

    /// One entry per failed repository, naming the stage that failed.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// True when no repository made it through.
    pub fn all_failed(&self) -> bool {
        self.repos_synced == 0 && !self.errors.is_empty()
    }
}

/// Sync issues and pull requests for every configured repository.
pub async fn run_sync(
    pool: &DbPool,
    client: &RemoteClient,
    owner: &str,
    repos: &[String],
) -> SyncReport {
    let mut report = SyncReport::default();

    for repo in repos {
        match sync_repo(pool, client, owner, repo).await {
            Ok((fetched, upserted)) => {
                tracing::info!(repo = %repo, fetched, upserted, "repository synced");
                report.fetched += fetched;
                report.upserted += upserted;
                report.repos_synced += 1;
            }
            Err(e) => {
                tracing::warn!(repo = %repo, error = %e, "repository sync failed");
                report.errors.push(format!("{}/{}: {}", owner, repo, e));
            }
        }
    }

    report
}

/// Fetch and upsert one repository. Fetch failure aborts this repository
/// before anything is written; upsert is one transaction.
async fn sync_repo(
    pool: &DbPool,
    client: &RemoteClient,
    owner: &str,
    repo: &str,
) -> Result<(i64, i64), AppError> {
    let repo_full_name = format!("{}/{}", owner, repo);

    let issues = client.list_issues(owner, repo).await?;
    let pulls = client.list_pulls(owner, repo).await?;

    let records: Vec<ExternalRecord> = issues
        .into_iter()
        .map(|i| ExternalRecord::from_remote(ItemKind::Issue, &repo_full_name, i))
        .chain(
            pulls
                .into_iter()
                .map(|p| ExternalRecord::from_remote(ItemKind::Pr, &repo_full_name, p)),
        )
        .collect();

    let fetched = records.len() as i64;
    let upserted = items::upsert_remote(pool, &records).await?;

    Ok((fetched, upserted))
}
