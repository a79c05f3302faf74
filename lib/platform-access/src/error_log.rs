//! Error log records written for failed logins.
//!
//! Each recoverable login failure writes one record. Its id travels back to
//! the browser in the `error_id` query parameter so a support engineer can
//! find the record from a user's screenshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lark_login_core::ErrorLogId;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A persisted error log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    id: ErrorLogId,
    title: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl ErrorRecord {
    /// Creates a record with a freshly generated id.
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: ErrorLogId::new(),
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> ErrorLogId {
        self.id
    }

    /// Returns the short title used to group records.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the detailed message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns when the record was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// The host's error log.
#[async_trait]
pub trait ErrorLog: Send + Sync {
    /// Persists `record`.
    async fn record(&self, record: &ErrorRecord) -> Result<(), Report<StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_id_and_text() {
        let record = ErrorRecord::new("Lark OAuth Callback Error", "Email a@b.c not found!");
        assert!(record.id().to_string().starts_with("err_"));
        assert_eq!(record.title(), "Lark OAuth Callback Error");
        assert_eq!(record.message(), "Email a@b.c not found!");
    }

    #[test]
    fn records_get_distinct_ids() {
        let a = ErrorRecord::new("t", "m");
        let b = ErrorRecord::new("t", "m");
        assert_ne!(a.id(), b.id());
    }
}
