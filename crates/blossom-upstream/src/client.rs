//! UpstreamClient: ordered failover fetch across Blossom servers (spec §4.3)

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::UpstreamError;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub data: Bytes,
    pub mime_type: Option<String>,
    pub server_url: String,
}

/// Prepend `https://` to a hint lacking a scheme.
fn normalize_hint(hint: &str) -> String {
    if hint.starts_with("http://") || hint.starts_with("https://") {
        hint.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", hint.trim_end_matches('/'))
    }
}

pub struct UpstreamClient {
    servers: Vec<String>,
    client: Client,
}

impl UpstreamClient {
    pub fn new(servers: Vec<String>) -> Self {
        let client = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .expect("reqwest client configuration is infallible here");

        Self {
            servers: servers.into_iter().map(|s| s.trim_end_matches('/').to_string()).collect(),
            client,
        }
    }

    /// `normalized(hints) ++ (configured \ hints)`, preserving order and
    /// avoiding exact-string duplicates.
    fn effective_servers(&self, hints: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(hints.len() + self.servers.len());
        for hint in hints {
            let normalized = normalize_hint(hint);
            if !out.contains(&normalized) {
                out.push(normalized);
            }
        }
        for server in &self.servers {
            if !out.contains(server) {
                out.push(server.clone());
            }
        }
        out
    }

    pub async fn fetch(&self, sha256: &str, hints: &[String]) -> Result<FetchResult, UpstreamError> {
        let servers = self.effective_servers(hints);

        if servers.is_empty() {
            return Err(UpstreamError::AllFailed("no upstream servers configured".to_string()));
        }

        let mut reasons = Vec::new();
        let mut all_404 = true;

        for server in &servers {
            let url = format!("{}/{}", server, sha256);
            debug!("Fetching {} from {}", sha256, url);

            let response = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    all_404 = false;
                    reasons.push(format!("{}: {}", server, e));
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                reasons.push(format!("{}: 404", server));
                continue;
            }
            if status.is_server_error() {
                all_404 = false;
                reasons.push(format!("{}: {}", server, status));
                continue;
            }
            if !status.is_success() {
                all_404 = false;
                reasons.push(format!("{}: {}", server, status));
                continue;
            }

            let mime_type = response
                .headers()
                .get("content-type")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string());

            let data = match response.bytes().await {
                Ok(b) => b,
                Err(e) => {
                    all_404 = false;
                    reasons.push(format!("{}: body read failed: {}", server, e));
                    continue;
                }
            };

            return Ok(FetchResult {
                data,
                mime_type,
                server_url: server.clone(),
            });
        }

        warn!("all {} upstream servers failed for {}", servers.len(), sha256);
        if all_404 {
            Err(UpstreamError::NotFound)
        } else {
            Err(UpstreamError::AllFailed(reasons.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_hint_adds_scheme() {
        assert_eq!(normalize_hint("blossom.example.com"), "https://blossom.example.com");
        assert_eq!(normalize_hint("http://blossom.example.com/"), "http://blossom.example.com");
    }

    #[test]
    fn effective_servers_puts_hints_first_without_duplicates() {
        let client = UpstreamClient::new(vec!["https://a.example".to_string(), "https://b.example".to_string()]);
        let order = client.effective_servers(&["https://a.example".to_string(), "c.example".to_string()]);
        assert_eq!(
            order,
            vec![
                "https://a.example".to_string(),
                "https://c.example".to_string(),
                "https://b.example".to_string(),
            ]
        );
    }
}
