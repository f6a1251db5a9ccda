//! High-level pipeline: parse → render → distribute for one form submission.
//!
//! # Responsibilities
//! - Decode the raw JSON payload into a [`Submission`]
//! - Render the report on the blocking thread pool
//! - Hand the result to every configured [`DistributionStore`] and the
//!   [`Notifier`] concurrently, logging each outcome independently
//! - Provide the naming rules shared by all stores (client folder, dated
//!   file names)
//!
//! # Error Handling
//! Only an unreadable payload or a failed render stops a run
//! ([`PipelineError`]). Store and notifier failures are logged and collected
//! in the [`DistributionReport`]; one failing collaborator never prevents the
//! others from running.
//!
//! # Navigation
//! - Main entrypoint: [`Pipeline::process`]
//! - Drive-like backends: [`FolderDistribution`]

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::contract::{
    Attachment, BoxError, Delivery, DistributionStore, FolderStore, Notification, Notifier,
    StoreReceipt,
};
use crate::payload::Submission;
use crate::report;

pub const REPORT_ATTACHMENT_NAME: &str = "parametrizacao-fiscal.pdf";
pub const REPORT_CONTENT_TYPE: &str = "application/pdf";
pub const NOTIFICATION_SUBJECT: &str = "Parametrização Fiscal - SupraTech";
pub const NOTIFICATION_BODY: &str = "Segue em anexo a parametrização fiscal preenchida.";

const MISSING_TAX_ID: &str = "SEM-CNPJ";
const MISSING_LEGAL_NAME: &str = "SEM-NOME";

static FORBIDDEN_IN_NAMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("folder name pattern compiles"));

/// Replaces every character that folder backends reject with `-` and trims.
pub fn sanitize_name(raw: &str) -> String {
    FORBIDDEN_IN_NAMES.replace_all(raw, "-").trim().to_string()
}

/// `"{cnpj} - {razaoSocial}"`, sanitized, with placeholders for blanks.
pub fn client_folder_name(submission: &Submission) -> String {
    let company = submission.company.as_ref();
    let tax_id = company
        .and_then(|c| c.tax_id.as_ref())
        .filter(|v| v.is_truthy())
        .map(|v| v.display())
        .unwrap_or_else(|| MISSING_TAX_ID.to_string());
    let legal_name = company
        .and_then(|c| c.legal_name.as_ref())
        .filter(|v| v.is_truthy())
        .map(|v| v.display())
        .unwrap_or_else(|| MISSING_LEGAL_NAME.to_string());
    sanitize_name(&format!("{tax_id} - {legal_name}"))
}

/// `YYYY-MM-DD - parametrizacao-fiscal.pdf`
pub fn report_filename(as_of: NaiveDate) -> String {
    format!("{} - {REPORT_ATTACHMENT_NAME}", as_of.format("%Y-%m-%d"))
}

/// `YYYY-MM-DD - payload.json`
pub fn payload_filename(as_of: NaiveDate) -> String {
    format!("{} - payload.json", as_of.format("%Y-%m-%d"))
}

/// The support email for a delivery: fixed subject and body, the report and
/// the certificate (when present) attached.
pub fn notification_for(delivery: &Delivery) -> Notification {
    let mut attachments = vec![Attachment {
        filename: REPORT_ATTACHMENT_NAME.to_string(),
        content: delivery.report.clone(),
        content_type: Some(REPORT_CONTENT_TYPE.to_string()),
    }];
    if let Some(certificate) = &delivery.certificate {
        attachments.push(certificate.clone());
    }
    Notification {
        subject: NOTIFICATION_SUBJECT.to_string(),
        body: NOTIFICATION_BODY.to_string(),
        attachments,
    }
}

/// A [`DistributionStore`] over any [`FolderStore`]: files the report under
/// `root/documentType/clientFolder/` for each selected document type.
pub struct FolderDistribution<S> {
    store: S,
    root_folder: String,
}

impl<S: FolderStore> FolderDistribution<S> {
    pub fn new(store: S, root_folder: impl Into<String>) -> Self {
        Self {
            store,
            root_folder: root_folder.into(),
        }
    }

    /// Id of folder `name` under `parent`, created only if the lookup finds none.
    pub async fn ensure_folder(&self, name: &str, parent: &str) -> Result<String, BoxError> {
        if let Some(existing) = self.store.find_folder(name, parent).await? {
            debug!(folder = name, folder_id = %existing, "Reusing existing folder");
            return Ok(existing);
        }
        let created = self.store.create_folder(name, parent).await?;
        info!(folder = name, folder_id = %created, "Created folder");
        Ok(created)
    }
}

#[async_trait]
impl<S: FolderStore> DistributionStore for FolderDistribution<S> {
    fn name(&self) -> &'static str {
        "drive"
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<StoreReceipt, BoxError> {
        let client_folder = client_folder_name(&delivery.submission);
        let report = Attachment {
            filename: report_filename(delivery.as_of),
            content: delivery.report.clone(),
            content_type: Some(REPORT_CONTENT_TYPE.to_string()),
        };

        let mut receipt = StoreReceipt::default();
        for document in delivery.submission.selected_documents() {
            let document_folder = self.ensure_folder(document, &self.root_folder).await?;
            let client_folder_id = self.ensure_folder(&client_folder, &document_folder).await?;

            let report_id = self.store.upload_file(&client_folder_id, &report).await?;
            info!(document = %document, folder_id = %client_folder_id, filename = %report.filename, "Uploaded report");
            receipt.files.push(report_id);

            if let Some(certificate) = &delivery.certificate {
                let file = Attachment {
                    content_type: Some(certificate.content_type_or_default().to_string()),
                    ..certificate.clone()
                };
                let certificate_id = self.store.upload_file(&client_folder_id, &file).await?;
                info!(document = %document, folder_id = %client_folder_id, filename = %file.filename, "Uploaded certificate");
                receipt.files.push(certificate_id);
            }
            receipt.folders.push(client_folder_id);
        }
        Ok(receipt)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("payload is not a valid submission: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("report rendering failed: {0}")]
    Render(#[from] tokio::task::JoinError),
}

/// Outcome of one collaborator.
#[derive(Debug)]
pub struct StoreOutcome {
    pub store: &'static str,
    pub result: Result<StoreReceipt, String>,
}

/// What happened to one submission after rendering.
#[derive(Debug)]
pub struct DistributionReport {
    pub submission_id: Uuid,
    pub report_bytes: usize,
    pub stores: Vec<StoreOutcome>,
    pub notification: Result<(), String>,
}

impl DistributionReport {
    pub fn all_succeeded(&self) -> bool {
        self.notification.is_ok() && self.stores.iter().all(|s| s.result.is_ok())
    }
}

/// Runs stores and notifier concurrently for an already rendered delivery.
pub async fn distribute(
    delivery: &Delivery,
    stores: &[Arc<dyn DistributionStore>],
    notifier: &dyn Notifier,
) -> (Vec<StoreOutcome>, Result<(), String>) {
    let store_runs = join_all(stores.iter().map(|store| async move {
        let name = store.name();
        let result = match store.deliver(delivery).await {
            Ok(receipt) => {
                info!(store = name, files = receipt.files.len(), "Delivery stored");
                Ok(receipt)
            }
            Err(e) => {
                error!(store = name, error = ?e, "Store failed");
                Err(e.to_string())
            }
        };
        StoreOutcome {
            store: name,
            result,
        }
    }));

    let notify_run = async {
        match notifier.notify(notification_for(delivery)).await {
            Ok(()) => {
                info!("Notification sent");
                Ok(())
            }
            Err(e) => {
                error!(error = ?e, "Notification failed");
                Err(e.to_string())
            }
        }
    };

    futures::join!(store_runs, notify_run)
}

/// The per-submission pipeline with its collaborators.
#[derive(Clone)]
pub struct Pipeline {
    stores: Vec<Arc<dyn DistributionStore>>,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(stores: Vec<Arc<dyn DistributionStore>>, notifier: Arc<dyn Notifier>) -> Self {
        Self { stores, notifier }
    }

    /// Parses, renders and distributes one submission.
    pub async fn process(
        &self,
        raw_payload: &str,
        certificate: Option<Attachment>,
        as_of: NaiveDate,
    ) -> Result<DistributionReport, PipelineError> {
        let submission_id = Uuid::new_v4();
        let span = info_span!("submission", submission_id = %submission_id);
        self.run(submission_id, raw_payload, certificate, as_of)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        submission_id: Uuid,
        raw_payload: &str,
        certificate: Option<Attachment>,
        as_of: NaiveDate,
    ) -> Result<DistributionReport, PipelineError> {
        info!(bytes = raw_payload.len(), certificate = certificate.is_some(), "Processing submission");

        let raw: Value = serde_json::from_str(raw_payload).map_err(|e| {
            error!(error = %e, "Payload is not valid JSON");
            PipelineError::InvalidPayload(e)
        })?;
        let submission = Submission::from_value(raw.clone()).map_err(|e| {
            error!(error = %e, "Payload is not a submission object");
            PipelineError::InvalidPayload(e)
        })?;
        debug!(documents = ?submission.selected_documents(), "Payload parsed");

        let to_render = submission.clone();
        let report = tokio::task::spawn_blocking(move || report::generate(&to_render))
            .await
            .map_err(|e| {
                error!(error = ?e, "Report rendering task failed");
                PipelineError::Render(e)
            })?;
        info!(bytes = report.len(), "Report rendered");

        let delivery = Delivery {
            submission,
            raw_payload: raw,
            report,
            certificate,
            as_of,
        };
        let (stores, notification) =
            distribute(&delivery, &self.stores, self.notifier.as_ref()).await;

        let outcome = DistributionReport {
            submission_id,
            report_bytes: delivery.report.len(),
            stores,
            notification,
        };
        info!(succeeded = outcome.all_succeeded(), "Submission processed");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(value: Value) -> Submission {
        Submission::from_value(value).unwrap()
    }

    #[test]
    fn sanitizes_forbidden_characters() {
        assert_eq!(sanitize_name(r#" a\b/c:d*e?f"g<h>i|j "#), "a-b-c-d-e-f-g-h-i-j");
    }

    #[test]
    fn client_folder_uses_tax_id_and_legal_name() {
        let s = submission(json!({"empresa": {"cnpj": "12.345/0001-99", "razaoSocial": "ACME: Ltda"}}));
        assert_eq!(client_folder_name(&s), "12.345-0001-99 - ACME- Ltda");
    }

    #[test]
    fn client_folder_defaults_when_company_is_blank() {
        assert_eq!(client_folder_name(&submission(json!({}))), "SEM-CNPJ - SEM-NOME");
        let s = submission(json!({"empresa": {"cnpj": "", "razaoSocial": "Loja"}}));
        assert_eq!(client_folder_name(&s), "SEM-CNPJ - Loja");
    }

    #[test]
    fn dated_file_names() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(report_filename(day), "2025-03-07 - parametrizacao-fiscal.pdf");
        assert_eq!(payload_filename(day), "2025-03-07 - payload.json");
    }

    #[test]
    fn notification_attaches_report_and_certificate() {
        let delivery = Delivery {
            submission: Submission::default(),
            raw_payload: json!({}),
            report: b"%PDF-1.7".to_vec(),
            certificate: Some(Attachment {
                filename: "empresa.pfx".into(),
                content: vec![9; 4],
                content_type: Some("application/x-pkcs12".into()),
            }),
            as_of: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        };
        let n = notification_for(&delivery);
        assert_eq!(n.subject, NOTIFICATION_SUBJECT);
        assert_eq!(n.body, NOTIFICATION_BODY);
        assert_eq!(n.attachments.len(), 2);
        assert_eq!(n.attachments[0].filename, "parametrizacao-fiscal.pdf");
        assert_eq!(n.attachments[0].content_type.as_deref(), Some("application/pdf"));
        assert_eq!(n.attachments[1].filename, "empresa.pfx");
    }
}
