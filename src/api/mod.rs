//! HTTP API for the tracker.
//!
//! Routes mirror the dashboard's needs: item listing with fresh
//! overdue-days, sparse overlay patches, and the sync trigger. The reason
//! rule for un-synced items is enforced here, at the caller boundary, so the
//! patch engine itself stays field-oriented.

use crate::config::AppConfig;
use crate::db::items::{self, ListFilter};
use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{overdue, Item, ItemKind, ItemPatch};
use crate::services::notify;
use crate::services::remote::{RemoteClient, RemoteClientConfig};
use crate::services::sync::{self, SyncReport};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Shared state for the axum routes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<AppConfig>,
}

// ── Error handling ───────────────────────────────────────────────────────────

/// JSON error response shape for the frontend.
#[derive(Serialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::RemoteApi { .. } | AppError::Network { .. } => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILED")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        (
            status,
            Json(ApiError {
                code: code.to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<sqlx::Error> for ApiErr {
    fn from(err: sqlx::Error) -> Self {
        Self(AppError::from(err))
    }
}

// ── Request/response types ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListQuery {
    kind: Option<String>,
    repo: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    items: Vec<Item>,
}

/// Patch body: the overlay fields plus the ephemeral reason.
///
/// The reason is not an overlay column; it is appended to the note as a
/// tagged suffix inside the patch transaction. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct PatchBody {
    #[serde(flatten)]
    patch: ItemPatch,
    reason: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    time: String,
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router with CORS.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/items", get(list_items))
        .route("/api/items/{kind}/{owner}/{repo}/{key}", patch(patch_item))
        .route("/api/sync", post(trigger_sync))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = match origin.parse::<HeaderValue>() {
        Ok(value) => AllowOrigin::exact(value),
        Err(_) => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /api/health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    })
}

/// GET /api/items?kind=&repo= — list items with fresh overdue-days.
async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiErr> {
    let kind = match params.kind.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(ItemKind::parse(raw).ok_or_else(|| {
            ApiErr::from(AppError::invalid_input_field(
                format!("Unknown kind '{}'", raw),
                "kind",
            ))
        })?),
    };

    let filter = ListFilter {
        kind,
        repo_full_name: params.repo.filter(|r| !r.is_empty()),
    };

    let items = items::list_items(&state.db, &filter, overdue::today_utc()).await?;
    Ok(Json(ListResponse { items }))
}

/// PATCH /api/items/{kind}/{owner}/{repo}/{key} — sparse overlay patch.
async fn patch_item(
    State(state): State<AppState>,
    Path((kind, owner, repo, key)): Path<(String, String, String, String)>,
    Json(body): Json<PatchBody>,
) -> Result<Json<Item>, ApiErr> {
    let kind = ItemKind::parse(&kind).ok_or_else(|| {
        ApiErr::from(AppError::invalid_input_field(
            format!("Unknown kind '{}'", kind),
            "kind",
        ))
    })?;
    let repo_full_name = format!("{}/{}", owner, repo);

    let patch = body.patch;

    // Turning internal sync off requires a reason. It rides into the patch
    // engine as a tagged note suffix, appended inside the patch transaction
    // so a concurrent note edit cannot be overwritten from a stale base.
    let note_suffix = if patch.sync_internal == Some(false) {
        let reason = body
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                ApiErr::from(AppError::invalid_input_field(
                    "A non-empty reason is required when disabling internal sync",
                    "reason",
                ))
            })?;
        Some(skip_sync_suffix(reason))
    } else {
        None
    };

    let item = items::patch_overlay(
        &state.db,
        kind,
        &repo_full_name,
        &key,
        &patch,
        note_suffix.as_deref(),
        overdue::today_utc(),
    )
    .await?;

    if patch.sync_internal == Some(true) {
        notify::spawn_internal_sync(state.config.notify_endpoint.as_deref(), &item);
    }

    Ok(Json(item))
}

/// Tag a skip-sync reason for appending to the note.
fn skip_sync_suffix(reason: &str) -> String {
    format!("[skip-sync] {}", reason)
}

/// POST /api/sync — fetch and upsert all configured repositories.
///
/// Partial-failure policy: repositories are independent; the response always
/// carries per-repository errors. 502 only when every repository failed.
async fn trigger_sync(State(state): State<AppState>) -> Result<Response, ApiErr> {
    let config = &state.config;

    let token = config.remote_token.as_ref().ok_or_else(|| {
        ApiErr::from(AppError::invalid_input(
            "Remote access credential is not configured",
        ))
    })?;

    let client = RemoteClient::new(RemoteClientConfig {
        base_url: config.remote_base_url.clone(),
        token: token.clone(),
        timeout_secs: config.remote_timeout_secs,
    })?;

    let report: SyncReport =
        sync::run_sync(&state.db, &client, &config.remote_owner, &config.repos).await;

    tracing::info!(
        fetched = report.fetched,
        upserted = report.upserted,
        repos_synced = report.repos_synced,
        failed = report.errors.len(),
        "sync run finished"
    );

    let status = if report.all_failed() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)).into_response())
}
