//! Best-effort notification to the internal tracking endpoint.
//!
//! Fired when a patch turns `sync_internal` on. Spawn-and-forget: failures
//! are logged and swallowed, and must never fail the patch that triggered
//! them.

use crate::models::Item;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncNotification {
    kind: String,
    repo_full_name: String,
    key: String,
    title: String,
    url: String,
    assignee: String,
    priority: i64,
}

/// Spawn a fire-and-forget POST of the item to the internal endpoint.
///
/// No-op when no endpoint is configured.
pub fn spawn_internal_sync(endpoint: Option<&str>, item: &Item) {
    let Some(endpoint) = endpoint else {
        return;
    };
    let endpoint = endpoint.to_string();
    let payload = SyncNotification {
        kind: item.kind.clone(),
        repo_full_name: item.repo_full_name.clone(),
        key: item.external_key.clone(),
        title: item.title.clone(),
        url: item.url.clone(),
        assignee: item.assignee.clone(),
        priority: item.priority,
    };

    tokio::spawn(async move {
        let Some(client) = http_client() else {
            tracing::warn!("internal-sync notification skipped");
            return;
        };

        match client.post(&endpoint).json(&payload).send().await {
            Ok(res) if res.status().is_success() => {
                tracing::debug!(endpoint = %endpoint, "internal-sync notification delivered");
            }
            Ok(res) => {
                tracing::warn!(
                    endpoint = %endpoint,
                    status = res.status().as_u16(),
                    "internal-sync notification rejected"
                );
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "internal-sync notification failed");
            }
        }
    });
}

/// Process-wide client for notifications, built on first use.
fn http_client() -> Option<&'static reqwest::Client> {
    static CLIENT: OnceLock<Option<reqwest::Client>> = OnceLock::new();
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| tracing::warn!(error = %e, "notification client unavailable"))
                .ok()
        })
        .as_ref()
}
