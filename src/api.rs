//! Blocking JSON client for the REST API.

use crate::error::{Error, Result};
use crate::services::ClientConfig;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PER_PAGE: u32 = 200;

// ============ API Types ============

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    id: String,
    #[serde(default)]
    message: String,
}

// ============ Client ============

pub struct ApiClient {
    http: Client,
    base: String,
    token: String,
    trace: bool,
}

impl ApiClient {
    /// Build a client. Fails with [`Error::Auth`] when no token is configured.
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        if cfg.access_token.is_empty() {
            return Err(Error::Auth(
                "no access token; run `oceanctl auth init` or pass --access-token".into(),
            ));
        }
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| Error::transport(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base: cfg.api_url.trim_end_matches('/').to_string(),
            token: cfg.access_token.clone(),
            trace: cfg.trace,
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base, path)
        }
    }

    fn send(&self, req: RequestBuilder, method: &str, url: &str) -> Result<Response> {
        if self.trace {
            tracing::trace!(method, url, "request");
        }
        let resp = req
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json")
            .send()
            .map_err(|e| Error::transport(format!("{} {}: {}", method, url, e)))?;
        if self.trace {
            tracing::trace!(method, url, status = resp.status().as_u16(), "response");
        }
        check(resp)
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let resp = self.send(self.http.get(&url), "GET", &url)?;
        decode(resp)
    }

    pub fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        let resp = self.send(self.http.post(&url).json(body), "POST", &url)?;
        decode(resp)
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.send(self.http.delete(&url), "DELETE", &url)?;
        Ok(())
    }

    /// Fetch every page of a list endpoint, collecting the array under `key`.
    pub fn list<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        let mut next = Some(format!("{}{}per_page={}", path, sep, PER_PAGE));
        let mut items = Vec::new();

        while let Some(page) = next.take() {
            let body: Value = self.get(&page)?;
            if let Some(arr) = body.get(key) {
                let batch: Vec<T> = serde_json::from_value(arr.clone())
                    .map_err(|e| Error::transport(format!("decoding {}: {}", key, e)))?;
                items.extend(batch);
            }
            next = body
                .pointer("/links/pages/next")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from);
        }
        Ok(items)
    }
}

fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&text)
        .map(|e| {
            if e.message.is_empty() {
                e.id
            } else {
                e.message
            }
        })
        .unwrap_or(text);
    let message = format!("{} ({})", message.trim(), status.as_u16());

    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::CONFLICT
        | StatusCode::PRECONDITION_FAILED
        | StatusCode::UNPROCESSABLE_ENTITY => Error::Conflict(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(message),
        _ => Error::Transport(message),
    })
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json()
        .map_err(|e| Error::transport(format!("decoding response: {}", e)))
}
