//! Remote code-hosting API client.
//!
//! Walks the paged issue/pull endpoints for a repository and normalizes the
//! loosely-typed JSON records into [`RemoteItem`]s. The remote API has
//! drifted across versions, so every logical field is extracted by probing an
//! ordered list of candidate keys and taking the first present, non-empty
//! value; new API shapes are supported by extending the lists.

use crate::error::AppError;
use crate::models::RemoteItem;
use reqwest::{header, Client, Response, StatusCode};
use serde_json::Value;

/// Hard ceiling on pages walked per endpoint, guarding against a looping or
/// misbehaving remote.
pub const MAX_PAGES: u32 = 50;

/// Page size requested from the remote.
const PER_PAGE: u32 = 100;

/// Remote API client configuration.
#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    /// Base URL of the remote instance (e.g. `https://api.gitcode.com`).
    pub base_url: String,

    /// Access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Remote API client.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    config: RemoteClientConfig,
}

impl RemoteClient {
    /// Create a new remote client.
    ///
    /// The credential is sent as `Authorization: Bearer` and, for
    /// compatibility with older deployments, duplicated in the legacy
    /// `PRIVATE-TOKEN` header.
    pub fn new(config: RemoteClientConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| AppError::invalid_input_field("Invalid token format", "token"))?;
        let mut legacy = header::HeaderValue::from_str(&config.token)
            .map_err(|_| AppError::invalid_input_field("Invalid token format", "token"))?;
        legacy.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert("PRIVATE-TOKEN", legacy);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the full URL for an API path.
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v5{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    /// List all issues of a repository, normalized.
    pub async fn list_issues(&self, owner: &str, repo: &str) -> Result<Vec<RemoteItem>, AppError> {
        let endpoint = format!(
            "/repos/{}/{}/issues",
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        );
        self.list_paged(&endpoint).await
    }

    /// List all pull requests of a repository, normalized.
    pub async fn list_pulls(&self, owner: &str, repo: &str) -> Result<Vec<RemoteItem>, AppError> {
        let endpoint = format!(
            "/repos/{}/{}/pulls",
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        );
        self.list_paged(&endpoint).await
    }

    /// Walk all pages of a list endpoint until an empty page or the page
    /// ceiling, normalizing as we go.
    ///
    /// Any transport or decode failure aborts the whole walk; retry is a
    /// policy the caller may layer on.
    async fn list_paged(&self, endpoint: &str) -> Result<Vec<RemoteItem>, AppError> {
        let mut out = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = self.api_url(endpoint);
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("state", "all".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?;

            let raw = self.handle_response(response, endpoint).await?;
            if raw.is_empty() {
                break;
            }

            let before = out.len();
            out.extend(raw.iter().filter_map(normalize_record));
            tracing::debug!(
                endpoint,
                page,
                raw = raw.len(),
                kept = out.len() - before,
                "fetched page"
            );
        }

        tracing::debug!(endpoint, total = out.len(), "page walk complete");
        Ok(out)
    }

    /// Decode a list response, mapping non-2xx statuses and undecodable
    /// bodies to transport errors.
    async fn handle_response(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<Vec<Value>, AppError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<Vec<Value>>()
                .await
                .map_err(|e| AppError::remote_api(format!("Failed to decode page: {}", e)));
        }

        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let body_message = serde_json::from_str::<Value>(&body).ok().and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .map(|m| match m.as_str() {
                    Some(s) => s.to_string(),
                    None => m.to_string(),
                })
        });

        let message = match (status, &body_message) {
            (StatusCode::UNAUTHORIZED, _) => "Credential rejected by remote".to_string(),
            (StatusCode::FORBIDDEN, _) => "Access denied".to_string(),
            (StatusCode::NOT_FOUND, _) => "Repository not found".to_string(),
            (StatusCode::TOO_MANY_REQUESTS, _) => "Rate limit exceeded".to_string(),
            (_, Some(msg)) => msg.clone(),
            _ => format!("Request failed ({}): {}", status_code, body.trim()),
        };

        Err(AppError::remote_api_full(message, status_code, endpoint))
    }
}

/// Normalize one raw record into a [`RemoteItem`].
///
/// Returns `None` when no usable identity key exists; such records cannot be
/// addressed later and are dropped silently.
pub fn normalize_record(raw: &Value) -> Option<RemoteItem> {
    let key = first_string(raw, &["number", "iid", "id"]);
    if key.is_empty() {
        return None;
    }

    Some(RemoteItem {
        key,
        title: first_string(raw, &["title"]),
        state: first_string(raw, &["state"]),
        url: first_string(raw, &["html_url", "web_url", "url"]),
        author: extract_author(raw),
        created_at: first_string(raw, &["created_at", "createdAt"]),
        updated_at: first_string(raw, &["updated_at", "updatedAt"]),
    })
}

/// The author can be a nested `user` or `author` object, or a flat string.
fn extract_author(raw: &Value) -> String {
    for nested in ["user", "author"] {
        if let Some(obj) = raw.get(nested) {
            if obj.is_object() {
                let name = first_string(obj, &["login", "username", "name"]);
                if !name.is_empty() {
                    return name;
                }
            }
        }
    }
    first_string(raw, &["author"])
}

/// Probe ordered candidate keys, returning the first present, non-empty
/// value stringified.
fn first_string(raw: &Value, keys: &[&str]) -> String {
    for key in keys {
        if let Some(v) = raw.get(key) {
            let s = value_to_string(v);
            if !s.is_empty() {
                return s;
            }
        }
    }
    String::new()
}

/// Stringify a scalar JSON value; identity keys in particular arrive as
/// either strings or numbers depending on the API version.
fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.to_string()
            }
        }
        _ => String::new(),
    }
}
