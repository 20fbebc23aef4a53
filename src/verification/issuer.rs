//! Verification code issuer contract.
//!
//! Code generation, delivery and the equality policy all live behind
//! `CodeIssuer`; the wizard only ever holds the returned ticket.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::VerificationError;

/// Opaque proof that a code was issued to a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCode {
    pub id: Uuid,
    pub recipient: String,
    pub issued_at: DateTime<Utc>,
}

/// Issues one-time codes and judges submissions against them.
#[async_trait]
pub trait CodeIssuer: Send + Sync {
    /// Issue (and deliver) a new code. Any earlier code for the same
    /// recipient stops being valid.
    async fn issue(&self, recipient: &str) -> Result<IssuedCode, VerificationError>;

    /// Whether `attempt` is the code behind `ticket`.
    async fn check(&self, ticket: &IssuedCode, attempt: &str) -> Result<bool, VerificationError>;
}

/// Number of digits in generated codes.
const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone)]
struct ActiveCode {
    ticket_id: Uuid,
    code: String,
}

/// Process-local issuer. "Delivery" is a log line.
pub struct InMemoryCodeIssuer {
    active: RwLock<HashMap<String, ActiveCode>>,
}

impl InMemoryCodeIssuer {
    pub fn new() -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
        }
    }

    fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        (0..CODE_LENGTH)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    /// The code currently valid for `recipient`. Stands in for reading the
    /// user's inbox in tests and the CLI host.
    pub async fn peek(&self, recipient: &str) -> Option<String> {
        self.active
            .read()
            .await
            .get(recipient)
            .map(|active| active.code.clone())
    }
}

impl Default for InMemoryCodeIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodeIssuer for InMemoryCodeIssuer {
    async fn issue(&self, recipient: &str) -> Result<IssuedCode, VerificationError> {
        let ticket = IssuedCode {
            id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            issued_at: Utc::now(),
        };
        let code = Self::generate_code();

        tracing::info!(
            recipient,
            ticket_id = %ticket.id,
            "Verification code issued"
        );
        tracing::debug!(recipient, code = %code, "Verification code delivered");

        self.active.write().await.insert(
            recipient.to_string(),
            ActiveCode {
                ticket_id: ticket.id,
                code,
            },
        );
        Ok(ticket)
    }

    async fn check(&self, ticket: &IssuedCode, attempt: &str) -> Result<bool, VerificationError> {
        let active = self.active.read().await;
        Ok(match active.get(&ticket.recipient) {
            Some(current) => current.ticket_id == ticket.id && current.code == attempt.trim(),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_code_is_six_digits() {
        let issuer = InMemoryCodeIssuer::new();
        issuer.issue("ada@example.com").await.unwrap();
        let code = issuer.peek("ada@example.com").await.unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn check_accepts_current_code() {
        let issuer = InMemoryCodeIssuer::new();
        let ticket = issuer.issue("ada@example.com").await.unwrap();
        let code = issuer.peek("ada@example.com").await.unwrap();
        assert!(issuer.check(&ticket, &code).await.unwrap());
        assert!(!issuer.check(&ticket, "not-it").await.unwrap());
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_ticket() {
        let issuer = InMemoryCodeIssuer::new();
        let first = issuer.issue("ada@example.com").await.unwrap();
        let first_code = issuer.peek("ada@example.com").await.unwrap();

        let second = issuer.issue("ada@example.com").await.unwrap();
        let second_code = issuer.peek("ada@example.com").await.unwrap();

        assert!(!issuer.check(&first, &first_code).await.unwrap());
        assert!(issuer.check(&second, &second_code).await.unwrap());
    }
}
