//! Item store: listing, merge/upsert of external records, overlay patches.
//!
//! The upsert path and the patch path own disjoint column sets of the same
//! table. Upsert writes external columns only (atomic `ON CONFLICT` keyed on
//! the identity triple, so it cannot race a patch destructively); patches
//! write overlay columns only, inside a single transaction.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{overdue, ExternalRecord, Item, ItemKind, ItemPatch, Priority};
use chrono::NaiveDate;

/// Optional filters for the listing path.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub kind: Option<ItemKind>,
    pub repo_full_name: Option<String>,
}

const ITEM_COLUMNS: &str = "kind, repo_full_name, external_key, title, state, url, author, \
     created_at, updated_at, assignee, assignee_group, note, estimated_resolve_at, \
     sync_internal, priority, due_at";

/// List items matching the filter, with `overdue_days` freshly computed.
///
/// Ordered by *effective* due date descending (explicit due date, or the
/// created+14d fallback), then `updated_at` descending. The effective date
/// is derived, not stored, so the sort happens here rather than in SQL.
pub async fn list_items(
    pool: &DbPool,
    filter: &ListFilter,
    today: NaiveDate,
) -> Result<Vec<Item>, AppError> {
    let mut query = format!("SELECT {} FROM items WHERE 1=1", ITEM_COLUMNS);
    if filter.kind.is_some() {
        query.push_str(" AND kind = ?");
    }
    if filter.repo_full_name.is_some() {
        query.push_str(" AND repo_full_name = ?");
    }

    let kind = filter.kind.map(|k| k.to_string());
    let mut items: Vec<Item> = match (kind.as_deref(), filter.repo_full_name.as_deref()) {
        (Some(kind), Some(repo)) => {
            sqlx::query_as(&query)
                .bind(kind)
                .bind(repo)
                .fetch_all(pool)
                .await?
        }
        (Some(kind), None) => sqlx::query_as(&query).bind(kind).fetch_all(pool).await?,
        (None, Some(repo)) => sqlx::query_as(&query).bind(repo).fetch_all(pool).await?,
        (None, None) => sqlx::query_as(&query).fetch_all(pool).await?,
    };

    for item in &mut items {
        item.overdue_days = overdue::overdue_days(&item.due_at, &item.created_at, today);
    }

    items.sort_by(|a, b| {
        let a_due = overdue::effective_due_date(&a.due_at, &a.created_at);
        let b_due = overdue::effective_due_date(&b.due_at, &b.created_at);
        b_due
            .cmp(&a_due)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });

    Ok(items)
}

/// Fetch a single item by its identity triple.
pub async fn get_item(
    pool: &DbPool,
    kind: ItemKind,
    repo_full_name: &str,
    external_key: &str,
) -> Result<Option<Item>, AppError> {
    let query = format!(
        "SELECT {} FROM items WHERE kind = ? AND repo_full_name = ? AND external_key = ? LIMIT 1",
        ITEM_COLUMNS
    );
    let item: Option<Item> = sqlx::query_as(&query)
        .bind(kind.to_string())
        .bind(repo_full_name)
        .bind(external_key)
        .fetch_optional(pool)
        .await?;
    Ok(item)
}

/// Merge a batch of external records into the table.
///
/// One transaction per batch: a mid-batch failure rolls the whole batch
/// back. Per record, insert with overlay defaults or update only the
/// external columns of the existing row. Records failing basic validity
/// (empty key, title, or repository) are skipped and not counted.
///
/// Returns the number of records written, which callers compare against the
/// fetched count to detect silent drops. Applying the same batch twice is
/// idempotent since this is a pure overwrite-by-key of the external columns.
pub async fn upsert_remote(pool: &DbPool, records: &[ExternalRecord]) -> Result<i64, AppError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut written = 0i64;

    for record in records {
        if !record.is_valid() {
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO items (
                kind, repo_full_name, external_key,
                title, state, url, author, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(kind, repo_full_name, external_key) DO UPDATE SET
                title = excluded.title,
                state = excluded.state,
                url = excluded.url,
                author = excluded.author,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.kind.to_string())
        .bind(&record.repo_full_name)
        .bind(&record.external_key)
        .bind(&record.title)
        .bind(&record.state)
        .bind(&record.url)
        .bind(&record.author)
        .bind(&record.created_at)
        .bind(&record.updated_at)
        .execute(&mut *tx)
        .await?;

        written += 1;
    }

    tx.commit().await?;
    Ok(written)
}

/// Apply a sparse overlay patch to one item.
///
/// Loads the current row, merges only the fields present in the patch,
/// normalizes `priority` to the closed set, and writes the full overlay back
/// in one transaction. External columns are never touched here.
///
/// `note_suffix`, when given, is appended to the merged note (the patched
/// note if present, otherwise the stored one) on its own line. The read and
/// the append happen inside the same transaction, so a concurrent note edit
/// cannot slip between them.
///
/// Returns the merged record with `overdue_days` recomputed, or a distinct
/// not-found error when the identity triple is unknown.
pub async fn patch_overlay(
    pool: &DbPool,
    kind: ItemKind,
    repo_full_name: &str,
    external_key: &str,
    patch: &ItemPatch,
    note_suffix: Option<&str>,
    today: NaiveDate,
) -> Result<Item, AppError> {
    let mut tx = pool.begin().await?;

    let query = format!(
        "SELECT {} FROM items WHERE kind = ? AND repo_full_name = ? AND external_key = ? LIMIT 1",
        ITEM_COLUMNS
    );
    let item: Option<Item> = sqlx::query_as(&query)
        .bind(kind.to_string())
        .bind(repo_full_name)
        .bind(external_key)
        .fetch_optional(&mut *tx)
        .await?;

    let mut item = item.ok_or_else(|| {
        AppError::not_found_with_id(
            "Item",
            format!("{}/{}/{}", kind, repo_full_name, external_key),
        )
    })?;

    if let Some(assignee) = &patch.assignee {
        item.assignee = assignee.clone();
    }
    if let Some(group) = &patch.assignee_group {
        item.assignee_group = group.clone();
    }
    if let Some(note) = &patch.note {
        item.note = note.clone();
    }
    if let Some(estimated) = &patch.estimated_resolve_at {
        item.estimated_resolve_at = estimated.clone();
    }
    if let Some(sync_internal) = patch.sync_internal {
        item.sync_internal = sync_internal;
    }
    if let Some(priority) = patch.priority {
        item.priority = Priority::from_i64(priority).as_i64();
    }
    if let Some(due_at) = &patch.due_at {
        item.due_at = due_at.clone();
    }
    if let Some(suffix) = note_suffix {
        item.note = if item.note.trim().is_empty() {
            suffix.to_string()
        } else {
            format!("{}\n{}", item.note, suffix)
        };
    }

    sqlx::query(
        r#"
        UPDATE items SET
            assignee = ?, assignee_group = ?, note = ?, estimated_resolve_at = ?,
            sync_internal = ?, priority = ?, due_at = ?
        WHERE kind = ? AND repo_full_name = ? AND external_key = ?
        "#,
    )
    .bind(&item.assignee)
    .bind(&item.assignee_group)
    .bind(&item.note)
    .bind(&item.estimated_resolve_at)
    .bind(item.sync_internal)
    .bind(item.priority)
    .bind(&item.due_at)
    .bind(kind.to_string())
    .bind(repo_full_name)
    .bind(external_key)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    item.overdue_days = overdue::overdue_days(&item.due_at, &item.created_at, today);
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteItem;
    use tempfile::tempdir;

    async fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("test.db"))
            .await
            .unwrap();
        (dir, pool)
    }

    fn record(key: &str, title: &str) -> ExternalRecord {
        ExternalRecord::from_remote(
            ItemKind::Issue,
            "acme/widgets",
            RemoteItem {
                key: key.into(),
                title: title.into(),
                state: "open".into(),
                url: format!("https://example.com/{}", key),
                author: "alice".into(),
                created_at: "2024-01-01T00:00:00Z".into(),
                updated_at: "2024-01-02T00:00:00Z".into(),
            },
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::parse_from_str("2024-02-01", "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_upsert_skips_invalid_records() {
        let (_dir, pool) = test_pool().await;

        let records = vec![record("1", "valid"), record("", "no key"), record("2", "")];
        let written = upsert_remote(&pool, &records).await.unwrap();
        assert_eq!(written, 1);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_overlay_defaults() {
        let (_dir, pool) = test_pool().await;

        upsert_remote(&pool, &[record("7", "first sight")])
            .await
            .unwrap();

        let item = get_item(&pool, ItemKind::Issue, "acme/widgets", "7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.assignee, "");
        assert_eq!(item.priority, Priority::Low.as_i64());
        assert!(!item.sync_internal);
    }

    #[tokio::test]
    async fn test_patch_normalizes_priority() {
        let (_dir, pool) = test_pool().await;
        upsert_remote(&pool, &[record("1", "t")]).await.unwrap();

        let patch = ItemPatch {
            priority: Some(42),
            ..Default::default()
        };
        let item = patch_overlay(&pool, ItemKind::Issue, "acme/widgets", "1", &patch, None, today())
            .await
            .unwrap();
        assert_eq!(item.priority, Priority::Low.as_i64());

        let patch = ItemPatch {
            priority: Some(0),
            ..Default::default()
        };
        let item = patch_overlay(&pool, ItemKind::Issue, "acme/widgets", "1", &patch, None, today())
            .await
            .unwrap();
        assert_eq!(item.priority, Priority::Urgent.as_i64());
    }

    #[tokio::test]
    async fn test_note_suffix_appends_to_stored_note_in_same_write() {
        let (_dir, pool) = test_pool().await;
        upsert_remote(&pool, &[record("3", "t")]).await.unwrap();

        let seed = ItemPatch {
            note: Some("triaged by alice".into()),
            ..Default::default()
        };
        patch_overlay(&pool, ItemKind::Issue, "acme/widgets", "3", &seed, None, today())
            .await
            .unwrap();

        // A patch without a note still picks up the stored one as the base.
        let patch = ItemPatch {
            sync_internal: Some(false),
            ..Default::default()
        };
        let item = patch_overlay(
            &pool,
            ItemKind::Issue,
            "acme/widgets",
            "3",
            &patch,
            Some("[skip-sync] vendor fork"),
            today(),
        )
        .await
        .unwrap();
        assert_eq!(item.note, "triaged by alice\n[skip-sync] vendor fork");

        // A patched note replaces the base before the suffix lands.
        let patch = ItemPatch {
            note: Some(String::new()),
            ..Default::default()
        };
        let item = patch_overlay(
            &pool,
            ItemKind::Issue,
            "acme/widgets",
            "3",
            &patch,
            Some("[skip-sync] stale"),
            today(),
        )
        .await
        .unwrap();
        assert_eq!(item.note, "[skip-sync] stale");
    }

    #[tokio::test]
    async fn test_patch_unknown_identity_is_not_found() {
        let (_dir, pool) = test_pool().await;

        let err = patch_overlay(
            &pool,
            ItemKind::Pr,
            "acme/widgets",
            "999",
            &ItemPatch::default(),
            None,
            today(),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_listing_orders_by_effective_due_date() {
        let (_dir, pool) = test_pool().await;

        let mut a = record("a", "explicit jan 10");
        a.created_at = "2023-12-01T00:00:00Z".into();
        let mut b = record("b", "explicit jan 5");
        b.created_at = "2023-12-01T00:00:00Z".into();
        let mut c = record("c", "fallback jan 8");
        // No due date: falls due created + 14d = 2024-01-08.
        c.created_at = "2023-12-25T00:00:00Z".into();
        upsert_remote(&pool, &[a, b, c]).await.unwrap();

        for (key, due) in [("a", "2024-01-10"), ("b", "2024-01-05")] {
            let patch = ItemPatch {
                due_at: Some(due.into()),
                ..Default::default()
            };
            patch_overlay(&pool, ItemKind::Issue, "acme/widgets", key, &patch, None, today())
                .await
                .unwrap();
        }

        let items = list_items(&pool, &ListFilter::default(), today())
            .await
            .unwrap();
        let keys: Vec<&str> = items.iter().map(|i| i.external_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_listing_filters() {
        let (_dir, pool) = test_pool().await;

        let issue = record("1", "an issue");
        let pr = ExternalRecord::from_remote(
            ItemKind::Pr,
            "acme/gadgets",
            RemoteItem {
                key: "2".into(),
                title: "a pr".into(),
                state: "open".into(),
                url: String::new(),
                author: "bob".into(),
                created_at: "2024-01-01".into(),
                updated_at: "2024-01-01".into(),
            },
        );
        upsert_remote(&pool, &[issue, pr]).await.unwrap();

        let filter = ListFilter {
            kind: Some(ItemKind::Pr),
            ..Default::default()
        };
        let items = list_items(&pool, &filter, today()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].external_key, "2");

        let filter = ListFilter {
            repo_full_name: Some("acme/widgets".into()),
            ..Default::default()
        };
        let items = list_items(&pool, &filter, today()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].external_key, "1");
    }
}
