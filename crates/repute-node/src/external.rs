//! Clients for the authoritative reputation store.
//!
//! - [`HttpReputationClient`] talks to the owning service over HTTP:
//!   `GET`/`PUT {endpoint}/characters/{id}/factions/{faction}/reputation`
//!   with a `{ "value": f64 }` body.
//! - [`DetachedReputation`] stands in when no endpoint is configured.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use repute_core::error::{ConfigurationError, ExternalPushError};
use repute_core::traits::ReputationSystem;

#[derive(Debug, Serialize, Deserialize)]
struct ReputationBody {
    value: f64,
}

/// HTTP client for the authoritative reputation store.
#[derive(Debug, Clone)]
pub struct HttpReputationClient {
    client: Client,
    endpoint: Url,
    timeout_ms: u64,
}

impl HttpReputationClient {
    /// Client for the store at `endpoint`, with every request bounded by `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ConfigurationError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ConfigurationError::Invalid(format!("reputation endpoint {endpoint:?}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(ConfigurationError::Invalid(format!(
                "reputation endpoint {endpoint} cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigurationError::Invalid(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// `{endpoint}/characters/{character}/factions/{faction}/reputation`,
    /// with both ids percent-encoded as single path segments.
    pub fn reputation_url(&self, character_id: &str, faction_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["characters", character_id, "factions", faction_id, "reputation"]);
        }
        url
    }

    fn transport_error(&self, e: reqwest::Error) -> ExternalPushError {
        if e.is_timeout() {
            ExternalPushError::Timeout(self.timeout_ms)
        } else {
            ExternalPushError::Transport(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ExternalPushError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ExternalPushError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ReputationSystem for HttpReputationClient {
    async fn current_value(&self, character_id: &str, faction_id: &str) -> Result<f64, ExternalPushError> {
        let response = self
            .client
            .get(self.reputation_url(character_id, faction_id))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let body: ReputationBody = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ExternalPushError::Malformed(e.to_string()))?;
        if !body.value.is_finite() {
            return Err(ExternalPushError::Malformed(format!("non-finite value {}", body.value)));
        }
        Ok(body.value)
    }

    async fn push_value(
        &self,
        character_id: &str,
        faction_id: &str,
        new_value: f64,
    ) -> Result<(), ExternalPushError> {
        let response = self
            .client
            .put(self.reputation_url(character_id, faction_id))
            .json(&ReputationBody { value: new_value })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check_status(response).await?;
        Ok(())
    }
}

/// In-process stand-in used when no endpoint is configured.
///
/// Remembers the last value pushed for each pair; unknown pairs read as 0.
#[derive(Debug, Default)]
pub struct DetachedReputation {
    values: DashMap<(String, String), f64>,
}

impl DetachedReputation {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReputationSystem for DetachedReputation {
    async fn current_value(&self, character_id: &str, faction_id: &str) -> Result<f64, ExternalPushError> {
        Ok(self
            .values
            .get(&(character_id.to_string(), faction_id.to_string()))
            .map(|v| *v)
            .unwrap_or(0.0))
    }

    async fn push_value(
        &self,
        character_id: &str,
        faction_id: &str,
        new_value: f64,
    ) -> Result<(), ExternalPushError> {
        self.values
            .insert((character_id.to_string(), faction_id.to_string()), new_value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Read headers plus `content-length` bytes of body.
    async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    /// Serve exactly one request with a canned response; hand back the raw request.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let request = read_request(&mut sock).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            request
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn url_encodes_segments() {
        let client = HttpReputationClient::new("http://rep.local/api/", Duration::from_secs(1)).unwrap();
        let url = client.reputation_url("char 1", "tyger/claws");
        assert_eq!(
            url.as_str(),
            "http://rep.local/api/characters/char%201/factions/tyger%2Fclaws/reputation"
        );
    }

    #[test]
    fn bad_endpoint_is_a_config_error() {
        assert!(HttpReputationClient::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpReputationClient::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn reads_current_value() {
        let (endpoint, server) = one_shot_server("200 OK", r#"{"value":42.5}"#).await;
        let client = HttpReputationClient::new(&endpoint, Duration::from_secs(2)).unwrap();
        let v = client.current_value("v", "arasaka").await.unwrap();
        assert_eq!(v, 42.5);
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /characters/v/factions/arasaka/reputation"));
    }

    #[tokio::test]
    async fn pushes_value_as_json() {
        let (endpoint, server) = one_shot_server("204 No Content", "").await;
        let client = HttpReputationClient::new(&endpoint, Duration::from_secs(2)).unwrap();
        client.push_value("v", "militech", -12.25).await.unwrap();
        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /characters/v/factions/militech/reputation"));
        assert!(request.contains(r#"{"value":-12.25}"#), "{request}");
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let (endpoint, _server) = one_shot_server("503 Service Unavailable", r#"{"error":"down"}"#).await;
        let client = HttpReputationClient::new(&endpoint, Duration::from_secs(2)).unwrap();
        let err = client.push_value("v", "f", 1.0).await.unwrap_err();
        assert!(matches!(err, ExternalPushError::Rejected { status: 503, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let (endpoint, _server) = one_shot_server("200 OK", r#"{"score":1}"#).await;
        let client = HttpReputationClient::new(&endpoint, Duration::from_secs(2)).unwrap();
        let err = client.current_value("v", "f").await.unwrap_err();
        assert!(matches!(err, ExternalPushError::Malformed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let client = HttpReputationClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = client.current_value("v", "f").await.unwrap_err();
        assert!(matches!(err, ExternalPushError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn detached_remembers_pushes() {
        let rep = DetachedReputation::new();
        assert_eq!(rep.current_value("v", "f").await.unwrap(), 0.0);
        rep.push_value("v", "f", 33.0).await.unwrap();
        assert_eq!(rep.current_value("v", "f").await.unwrap(), 33.0);
        assert_eq!(rep.current_value("v", "other").await.unwrap(), 0.0);
    }
}
