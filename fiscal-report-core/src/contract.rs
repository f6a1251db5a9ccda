//! # contract: collaborator interfaces for report distribution
//!
//! The pipeline talks to the outside world only through the traits in this
//! module, so production clients (Drive, SMTP, local disk) and test mocks are
//! interchangeable.
//!
//! ## Traits
//! - [`DistributionStore`]: files a finished report somewhere durable.
//! - [`FolderStore`]: a folder/file backend (e.g. Google Drive) that
//!   [`crate::distribute::FolderDistribution`] turns into a [`DistributionStore`].
//! - [`Notifier`]: sends the report to the configured recipients.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; the mocks are exported behind the
//!   `test-export-mocks` feature so the binary crate's tests can use them.
//!
//! ## Errors
//! - All methods return [`BoxError`]; implementors convert their own error
//!   types at the boundary.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::payload::Submission;

/// Error type shared by all collaborator traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A named binary file travelling with a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    /// Declared MIME type, if the sender provided one.
    pub content_type: Option<String>,
}

impl Attachment {
    pub const FALLBACK_CONTENT_TYPE: &'static str = "application/octet-stream";

    /// Declared MIME type, or `application/octet-stream`.
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or(Self::FALLBACK_CONTENT_TYPE)
    }
}

/// Everything a store needs to file one processed submission.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub submission: Submission,
    /// The payload exactly as received, for side-car copies.
    pub raw_payload: Value,
    /// Rendered PDF bytes.
    pub report: Vec<u8>,
    pub certificate: Option<Attachment>,
    /// Processing date (UTC) used in file names.
    pub as_of: NaiveDate,
}

/// What a store wrote, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreReceipt {
    /// Identifiers or paths of the files written.
    pub files: Vec<String>,
    /// Identifiers or paths of the client folders used.
    pub folders: Vec<String>,
}

/// A message to the support recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Files a processed submission in durable storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DistributionStore: Send + Sync {
    /// Short name used in logs (e.g. `drive`, `mirror`).
    fn name(&self) -> &'static str;

    async fn deliver(&self, delivery: &Delivery) -> Result<StoreReceipt, BoxError>;
}

/// A hierarchical folder backend addressed by opaque folder ids.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// Id of the non-trashed folder called `name` directly under `parent`, if any.
    async fn find_folder(&self, name: &str, parent: &str) -> Result<Option<String>, BoxError>;

    /// Creates folder `name` under `parent` and returns its id.
    async fn create_folder(&self, name: &str, parent: &str) -> Result<String, BoxError>;

    /// Uploads `file` into `folder` and returns the new file id.
    async fn upload_file(&self, folder: &str, file: &Attachment) -> Result<String, BoxError>;
}

/// Sends notifications to the configured recipients.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_type_falls_back_to_octet_stream() {
        let mut file = Attachment {
            filename: "cert.pfx".into(),
            content: vec![1, 2, 3],
            content_type: None,
        };
        assert_eq!(file.content_type_or_default(), "application/octet-stream");
        file.content_type = Some("  ".into());
        assert_eq!(file.content_type_or_default(), "application/octet-stream");
        file.content_type = Some("application/x-pkcs12".into());
        assert_eq!(file.content_type_or_default(), "application/x-pkcs12");
    }
}
