//! The content-store transport contract.
//!
//! Hidden behind a small trait so the GitHub Contents API client is
//! swappable for an in-memory fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use rosterwatch_domain::Error;

/// Outcome of a `get`: the document may not exist yet (first run).
pub enum GetOutcome {
    Found { bytes: Vec<u8>, version: String },
    NotFound,
}

/// Outcome of a `put_if_match` rejected by the precondition.
pub struct ConflictError {
    pub remote_bytes: Vec<u8>,
    pub remote_version: String,
}

pub enum PutOutcome {
    Ok { version: String },
    /// Version precondition failed (409/422) — caller should re-fetch and
    /// merge local edits over `remote_bytes` before retrying.
    Conflict(ConflictError),
    /// Transient failure (403/429/5xx) — no version conflict, just retry
    /// the same write after `retry_after` (or a caller-chosen backoff).
    Retryable { retry_after: Option<Duration> },
}

#[async_trait]
pub trait ContentStoreTransport: Send + Sync {
    async fn get(&self) -> Result<GetOutcome, Error>;

    /// `version` is `None` when creating the document for the first time.
    async fn put_if_match(
        &self,
        version: Option<&str>,
        bytes: Vec<u8>,
        message: &str,
    ) -> Result<PutOutcome, Error>;
}

#[async_trait]
impl<T: ContentStoreTransport + ?Sized> ContentStoreTransport for std::sync::Arc<T> {
    async fn get(&self) -> Result<GetOutcome, Error> {
        (**self).get().await
    }

    async fn put_if_match(
        &self,
        version: Option<&str>,
        bytes: Vec<u8>,
        message: &str,
    ) -> Result<PutOutcome, Error> {
        (**self).put_if_match(version, bytes, message).await
    }
}

#[async_trait]
impl<T: ContentStoreTransport + ?Sized> ContentStoreTransport for Box<T> {
    async fn get(&self) -> Result<GetOutcome, Error> {
        (**self).get().await
    }

    async fn put_if_match(
        &self,
        version: Option<&str>,
        bytes: Vec<u8>,
        message: &str,
    ) -> Result<PutOutcome, Error> {
        (**self).put_if_match(version, bytes, message).await
    }
}

/// GitHub Contents API transport: `GET/PUT /repos/{repo}/contents/{path}`.
pub mod github {
    use super::*;
    use base64::Engine as _;
    use rosterwatch_domain::config::GithubConfig;
    use serde::Deserialize;

    pub struct GithubTransport {
        client: reqwest::Client,
        repo: String,
        branch: String,
        path: String,
        api_base: String,
        token: String,
    }

    impl GithubTransport {
        pub fn new(config: &GithubConfig, token: String) -> Result<Self, Error> {
            let client = reqwest::Client::builder()
                .user_agent("rosterwatch")
                .build()
                .map_err(|e| Error::Http(e.to_string()))?;
            Ok(Self {
                client,
                repo: config.repo.clone(),
                branch: config.branch.clone(),
                path: config.document_path(),
                api_base: config.api_base.clone(),
                token,
            })
        }

        fn contents_url(&self) -> String {
            format!(
                "{}/repos/{}/contents/{}",
                self.api_base.trim_end_matches('/'),
                self.repo,
                self.path
            )
        }
    }

    /// Parse a `Retry-After` header given in seconds. GitHub's own rate-limit
    /// responses always use the seconds form, never an HTTP date.
    fn retry_after_duration(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get(reqwest::header::RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    #[derive(Deserialize)]
    struct ContentsResponse {
        content: String,
        sha: String,
    }

    #[async_trait]
    impl ContentStoreTransport for GithubTransport {
        async fn get(&self) -> Result<GetOutcome, Error> {
            let resp = self
                .client
                .get(self.contents_url())
                .query(&[("ref", self.branch.as_str())])
                .header("Authorization", format!("Bearer {}", self.token))
                .header("Accept", "application/vnd.github+json")
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(GetOutcome::NotFound);
            }
            if !resp.status().is_success() {
                return Err(Error::Http(format!(
                    "GET contents failed: {}",
                    resp.status()
                )));
            }
            let parsed: ContentsResponse =
                resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
            let cleaned: String = parsed.content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .map_err(|e| Error::Other(format!("bad base64 from GitHub: {e}")))?;
            Ok(GetOutcome::Found {
                bytes,
                version: parsed.sha,
            })
        }

        async fn put_if_match(
            &self,
            version: Option<&str>,
            bytes: Vec<u8>,
            message: &str,
        ) -> Result<PutOutcome, Error> {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            let mut body = serde_json::json!({
                "message": message,
                "content": encoded,
                "branch": self.branch,
            });
            if let Some(sha) = version {
                body["sha"] = serde_json::Value::String(sha.to_string());
            }

            let resp = self
                .client
                .put(self.contents_url())
                .header("Authorization", format!("Bearer {}", self.token))
                .header("Accept", "application/vnd.github+json")
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            let status = resp.status();
            if status == reqwest::StatusCode::CONFLICT
                || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
            {
                let remote = self.get().await?;
                return match remote {
                    GetOutcome::Found { bytes, version } => {
                        Ok(PutOutcome::Conflict(ConflictError {
                            remote_bytes: bytes,
                            remote_version: version,
                        }))
                    }
                    GetOutcome::NotFound => Err(Error::StoreFatal(
                        "conflict on PUT but document vanished on re-fetch".into(),
                    )),
                };
            }
            if status == reqwest::StatusCode::FORBIDDEN
                || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error()
            {
                let retry_after = retry_after_duration(resp.headers());
                return Ok(PutOutcome::Retryable { retry_after });
            }
            if !status.is_success() {
                return Err(Error::StoreFatal(format!("PUT contents failed: {status}")));
            }

            #[derive(Deserialize)]
            struct PutResponse {
                content: ContentShaOnly,
            }
            #[derive(Deserialize)]
            struct ContentShaOnly {
                sha: String,
            }
            let parsed: PutResponse =
                resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
            Ok(PutOutcome::Ok {
                version: parsed.content.sha,
            })
        }
    }
}

/// In-memory transport used by engine/gateway tests.
#[cfg(any(test, feature = "test-util"))]
pub mod memory {
    use super::*;
    use tokio::sync::Mutex;

    pub struct MemoryTransport {
        state: Mutex<Option<(Vec<u8>, String)>>,
        next_version: std::sync::atomic::AtomicU64,
    }

    impl MemoryTransport {
        pub fn empty() -> Self {
            Self {
                state: Mutex::new(None),
                next_version: std::sync::atomic::AtomicU64::new(1),
            }
        }

        pub fn seeded(bytes: Vec<u8>) -> Self {
            Self {
                state: Mutex::new(Some((bytes, "v1".to_string()))),
                next_version: std::sync::atomic::AtomicU64::new(2),
            }
        }
    }

    #[async_trait]
    impl ContentStoreTransport for MemoryTransport {
        async fn get(&self) -> Result<GetOutcome, Error> {
            match &*self.state.lock().await {
                Some((bytes, version)) => Ok(GetOutcome::Found {
                    bytes: bytes.clone(),
                    version: version.clone(),
                }),
                None => Ok(GetOutcome::NotFound),
            }
        }

        async fn put_if_match(
            &self,
            version: Option<&str>,
            bytes: Vec<u8>,
            _message: &str,
        ) -> Result<PutOutcome, Error> {
            let mut guard = self.state.lock().await;
            let current_version = guard.as_ref().map(|(_, v)| v.clone());
            if current_version.as_deref() != version {
                return match guard.clone() {
                    Some((remote_bytes, remote_version)) => {
                        Ok(PutOutcome::Conflict(ConflictError {
                            remote_bytes,
                            remote_version,
                        }))
                    }
                    None => Err(Error::StoreFatal("version mismatch against empty store".into())),
                };
            }
            let new_version = format!(
                "v{}",
                self.next_version
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            );
            *guard = Some((bytes, new_version.clone()));
            Ok(PutOutcome::Ok {
                version: new_version,
            })
        }
    }
}
