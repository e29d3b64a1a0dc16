//! Grade fetching — the probe side of the monitor.
//!
//! Provides the `GradeFetcher` trait plus the shipped implementation:
//! - **EamsClient** — talks to the records gateway over HTTP: bearer-token
//!   login, final/usual grade rows per term, transparent re-login when the
//!   gateway invalidates a session
//!
//! The session cache is guarded by a mutex and a generation counter so a
//! straggling fetch from a timed-out cycle cannot write a stale session back
//! after `reset_session` has run.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::FetcherConfig;
use crate::models::{Snapshot, UsualGradeRecord};

const LOGIN_PATH: &str = "/auth/login";
const FINAL_GRADES_PATH: &str = "/grades/final";
const USUAL_GRADES_PATH: &str = "/grades/usual";

// ============================================================================
// GradeFetcher trait
// ============================================================================

/// Account identity used for one probe. Never persisted; both binaries read
/// it from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account: String,
    pub password: String,
}

impl Credentials {
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
        }
    }
}

/// One authenticated probe against the records service.
#[async_trait]
pub trait GradeFetcher: Send + Sync {
    /// Every grade row currently visible for the term, in page order. Absent
    /// cells map onto empty strings.
    async fn fetch(&self, credentials: &Credentials, term_id: i32)
        -> Result<Snapshot, FetchError>;

    /// Drop any cached session state so the next fetch authenticates from
    /// scratch. Default: nothing cached, nothing to drop.
    async fn reset_session(&self) {}

    /// Fetcher name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Login rejected: {0}")]
    Auth(String),

    #[error("Gateway error ({code}): {message}")]
    Gateway { code: u16, message: String },

    #[error("Expected data missing from response: {0}")]
    MissingData(String),

    #[error("All {attempts} fetch attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl FetchError {
    /// Credential problems are terminal for the cycle; retrying them only
    /// risks an account lockout.
    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Auth(_))
    }
}

// ============================================================================
// Gateway API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct LoginRequest {
    account: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorResponse {
    error: Option<String>,
}

/// Cached login state. `generation` is bumped on every reset; a fetch unit
/// that logged in under an older generation must not store its token back.
#[derive(Debug, Default)]
struct SessionSlot {
    token: Option<String>,
    generation: u64,
}

// ============================================================================
// EamsClient
// ============================================================================

/// HTTP client for the records gateway.
pub struct EamsClient {
    client: Client,
    config: FetcherConfig,
    session: Mutex<SessionSlot>,
}

impl EamsClient {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        // The upstream service pins sessions to cookies in addition to the
        // bearer token.
        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            config,
            session: Mutex::new(SessionSlot::default()),
        })
    }

    /// Periodic ("usual") grade rows for the term. Only the one-shot probe
    /// asks for these; the monitor loop watches final grades.
    pub async fn usual_grades(
        &self,
        credentials: &Credentials,
        term_id: i32,
    ) -> Result<Vec<UsualGradeRecord>, FetchError> {
        self.rows_with_relogin(credentials, USUAL_GRADES_PATH, term_id)
            .await
    }

    async fn fetch_with_retry(
        &self,
        credentials: &Credentials,
        term_id: i32,
    ) -> Result<Snapshot, FetchError> {
        let attempts = self.config.retries as usize;
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(attempts);

        let result = RetryIf::spawn(
            retry_strategy,
            || self.fetch_once(credentials, term_id),
            |e: &FetchError| !e.is_auth(),
        )
        .await;

        match result {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                tracing::error!(attempts = attempts, error = %e, "All fetch attempts failed");
                Err(FetchError::RetryExhausted {
                    attempts,
                    last: e.to_string(),
                })
            }
        }
    }

    async fn fetch_once(
        &self,
        credentials: &Credentials,
        term_id: i32,
    ) -> Result<Snapshot, FetchError> {
        let rows = self
            .rows_with_relogin(credentials, FINAL_GRADES_PATH, term_id)
            .await?;
        Ok(Snapshot::new(rows))
    }

    /// Fetch rows with the cached session, logging in again once if the
    /// gateway reports the session stale.
    async fn rows_with_relogin<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        path: &str,
        term_id: i32,
    ) -> Result<Vec<T>, FetchError> {
        let token = self.session_token(credentials).await?;
        match self.grade_rows(&token, path, term_id).await {
            Err(FetchError::Gateway { code: 401, .. }) => {
                tracing::debug!("Gateway dropped the session, logging in again");
                self.invalidate().await;
                let token = self.session_token(credentials).await?;
                self.grade_rows(&token, path, term_id).await
            }
            other => other,
        }
    }

    /// The cached token, or a fresh login. The mutex is not held across the
    /// login round trip; the generation read before it decides whether the
    /// new token may be cached afterwards.
    async fn session_token(&self, credentials: &Credentials) -> Result<String, FetchError> {
        let generation = {
            let slot = self.session.lock().await;
            if let Some(token) = &slot.token {
                return Ok(token.clone());
            }
            slot.generation
        };

        let token = self.login(credentials).await?;

        let mut slot = self.session.lock().await;
        if slot.generation == generation {
            slot.token = Some(token.clone());
        } else {
            tracing::debug!("Session was reset mid-login, discarding token writeback");
        }
        Ok(token)
    }

    async fn invalidate(&self) {
        let mut slot = self.session.lock().await;
        slot.token = None;
    }

    async fn login(&self, credentials: &Credentials) -> Result<String, FetchError> {
        let url = format!("{}{}", self.config.base_url, LOGIN_PATH);
        let request = LoginRequest {
            account: credentials.account.clone(),
            password: credentials.password.clone(),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        // 409 is the gateway's "account already logged in elsewhere" answer.
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::CONFLICT
        {
            let message = read_error_message(response).await;
            tracing::warn!(code = status.as_u16(), message = %message, "Login rejected");
            return Err(FetchError::Auth(message));
        }
        if !status.is_success() {
            let message = read_error_message(response).await;
            return Err(FetchError::Gateway {
                code: status.as_u16(),
                message,
            });
        }

        let body: LoginResponse = response.json().await?;
        if body.token.is_empty() {
            return Err(FetchError::MissingData(
                "login response carried no session token".to_string(),
            ));
        }
        Ok(body.token)
    }

    async fn grade_rows<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        term_id: i32,
    ) -> Result<Vec<T>, FetchError> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("semesterId", term_id.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_error_message(response).await;
            return Err(FetchError::Gateway {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

/// Prefer the gateway's structured `{"error": "..."}` body, fall back to the
/// raw text.
async fn read_error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<GatewayErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or(body)
}

#[async_trait]
impl GradeFetcher for EamsClient {
    async fn fetch(
        &self,
        credentials: &Credentials,
        term_id: i32,
    ) -> Result<Snapshot, FetchError> {
        self.fetch_with_retry(credentials, term_id).await
    }

    async fn reset_session(&self) {
        let mut slot = self.session.lock().await;
        slot.token = None;
        slot.generation += 1;
        tracing::debug!(generation = slot.generation, "Fetcher session reset");
    }

    fn name(&self) -> &str {
        "eams-gateway"
    }
}

// ============================================================================
// TESTS
// ============================================================================
