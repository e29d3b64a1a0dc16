//! Alert delivery for newly appeared grades.
//!
//! Provides the `Notifier` trait with two backends:
//! - **LogNotifier** — renders the alert into the daemon's own log
//! - **NtfyNotifier** — publishes to an ntfy topic (`POST {server}/{topic}`
//!   with the title as a query parameter and the lines as the body)
//!
//! Every alert shows one line per record: the course name and the final
//! result, with a placeholder when the score cell is still empty.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::GradeRecord;

/// Shown in place of an empty final-result cell.
const SCORE_PENDING: &str = "pending";

/// Outbound bound for one publish; a stuck delivery may stall the monitor
/// loop for at most this long.
const NTFY_TIMEOUT: Duration = Duration::from_secs(10);

const TOPIC_PREFIX: &str = "grades-";
const TOPIC_RANDOM_HEX_CHARS: usize = 24;

// ============================================================================
// Notifier trait
// ============================================================================

/// Delivers one user-visible alert for a batch of newly appeared records.
/// Called synchronously by the monitor loop.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, added: &[GradeRecord]) -> Result<(), NotifyError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ntfy server error ({code}): {message}")]
    Server { code: u16, message: String },
}

// ============================================================================
// Alert rendering
// ============================================================================

/// One line per record: `«course name»: «final result»`.
pub fn build_message(added: &[GradeRecord]) -> String {
    added
        .iter()
        .map(|record| {
            let score = if record.final_score.is_empty() {
                SCORE_PENDING
            } else {
                record.final_score.as_str()
            };
            format!("{}: {}", record.course_name, score)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_title(count: usize) -> String {
    if count == 1 {
        "New grade published".to_string()
    } else {
        format!("{} new grades published", count)
    }
}

/// Random ntfy topic: `grades-` plus 24 hex characters. Generated once at
/// startup when the ntfy backend is selected without a configured topic.
pub fn generate_topic() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", TOPIC_PREFIX, &hex[..TOPIC_RANDOM_HEX_CHARS])
}

// ============================================================================
// LogNotifier
// ============================================================================

/// Writes the alert to the log. The default backend; cannot fail.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, added: &[GradeRecord]) -> Result<(), NotifyError> {
        tracing::info!(count = added.len(), "{}", build_title(added.len()));
        for line in build_message(added).lines() {
            tracing::info!("  {}", line);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

// ============================================================================
// NtfyNotifier
// ============================================================================

#[derive(Debug, Deserialize)]
struct NtfyPublishResponse {
    id: String,
    time: i64,
    topic: String,
}

/// Publishes alerts to an ntfy topic.
pub struct NtfyNotifier {
    client: Client,
    publish_url: String,
}

impl NtfyNotifier {
    pub fn new(server: &str, topic: &str) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(NTFY_TIMEOUT).build()?;
        let publish_url = format!("{}/{}", server.trim_end_matches('/'), topic);

        Ok(Self {
            client,
            publish_url,
        })
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn notify(&self, added: &[GradeRecord]) -> Result<(), NotifyError> {
        let title = build_title(added.len());
        let message = build_message(added);

        let response = self
            .client
            .post(&self.publish_url)
            .query(&[("title", title.as_str())])
            .body(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Server {
                code: status.as_u16(),
                message,
            });
        }

        let published: NtfyPublishResponse = response.json().await?;
        tracing::debug!(
            id = %published.id,
            topic = %published.topic,
            time = published.time,
            "ntfy alert published"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "ntfy"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(name: &str, score: &str) -> GradeRecord {
        GradeRecord {
            semester: "2024-2025-1".to_string(),
            course_code: "A1".to_string(),
            course_id: "01".to_string(),
            course_name: name.to_string(),
            course_type: "Required".to_string(),
            credit: "4".to_string(),
            final_exam_score: String::new(),
            overall_score: String::new(),
            makeup_score: String::new(),
            final_score: score.to_string(),
            gpa: String::new(),
        }
    }

    #[test]
    fn test_message_renders_name_and_final_result() {
        let message = build_message(&[record("Calculus", "91"), record("Physics", "88")]);
        assert_eq!(message, "Calculus: 91\nPhysics: 88");
    }

    #[test]
    fn test_message_uses_placeholder_for_empty_score() {
        let message = build_message(&[record("Calculus", "")]);
        assert_eq!(message, "Calculus: pending");
    }

    #[test]
    fn test_title_singular_and_plural() {
        assert_eq!(build_title(1), "New grade published");
        assert_eq!(build_title(3), "3 new grades published");
    }

    #[test]
    fn test_generated_topic_shape() {
        let topic = generate_topic();
        assert!(topic.starts_with("grades-"));
        let suffix = &topic["grades-".len()..];
        assert_eq!(suffix.len(), 24);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_topic(), topic);
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        let result = notifier.notify(&[record("Calculus", "91")]).await;
        assert!(result.is_ok());
        assert_eq!(notifier.name(), "log");
    }

    #[tokio::test]
    async fn test_ntfy_publish_sends_title_and_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/grades-test"))
            .and(query_param("title", "2 new grades published"))
            .and(body_string("Calculus: 91\nPhysics: pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg-1",
                "time": 1727000000,
                "topic": "grades-test"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = NtfyNotifier::new(&server.uri(), "grades-test").unwrap();
        let result = notifier
            .notify(&[record("Calculus", "91"), record("Physics", "")])
            .await;

        assert!(result.is_ok(), "Expected Ok, got {:?}", result.err());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_ntfy_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("too many requests"))
            .mount(&server)
            .await;

        let notifier = NtfyNotifier::new(&server.uri(), "grades-test").unwrap();
        let result = notifier.notify(&[record("Calculus", "91")]).await;

        match result {
            Err(NotifyError::Server { code, message }) => {
                assert_eq!(code, 429);
                assert_eq!(message, "too many requests");
            }
            other => panic!("Expected Server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ntfy_trailing_slash_on_server_is_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/grades-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg-1",
                "time": 1727000000,
                "topic": "grades-test"
            })))
            .mount(&server)
            .await;

        let base = format!("{}/", server.uri());
        let notifier = NtfyNotifier::new(&base, "grades-test").unwrap();
        assert!(notifier.notify(&[record("Calculus", "91")]).await.is_ok());
    }
}
