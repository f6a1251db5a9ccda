//! Local-disk copy of every delivery: `base/documentType/clientFolder/` holds
//! the dated report, the certificate and a pretty-printed payload side-car.

use std::path::PathBuf;

use async_trait::async_trait;
use fiscal_report_core::contract::{BoxError, Delivery, DistributionStore, StoreReceipt};
use fiscal_report_core::distribute::{
    client_folder_name, payload_filename, report_filename, sanitize_name,
};
use tokio::fs;
use tracing::{debug, info};

pub struct LocalMirror {
    base_dir: PathBuf,
}

impl LocalMirror {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

fn path_segment(name: &str) -> String {
    match sanitize_name(name).as_str() {
        "" | "." | ".." => "_".to_string(),
        clean => clean.to_string(),
    }
}

#[async_trait]
impl DistributionStore for LocalMirror {
    fn name(&self) -> &'static str {
        "mirror"
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<StoreReceipt, BoxError> {
        let client_folder = client_folder_name(&delivery.submission);
        let report_name = report_filename(delivery.as_of);
        let payload_json = serde_json::to_vec_pretty(&delivery.raw_payload)?;

        let mut receipt = StoreReceipt::default();
        for document in delivery.submission.selected_documents() {
            // Names come from the form; keep them from escaping the base directory.
            let dir = self.base_dir.join(path_segment(document)).join(&client_folder);
            fs::create_dir_all(&dir).await?;
            debug!(dir = ?dir, "Mirror folder ready");

            let report_path = dir.join(&report_name);
            fs::write(&report_path, &delivery.report).await?;
            receipt.files.push(report_path.display().to_string());

            if let Some(certificate) = &delivery.certificate {
                let certificate_path = dir.join(path_segment(&certificate.filename));
                fs::write(&certificate_path, &certificate.content).await?;
                receipt.files.push(certificate_path.display().to_string());
            }

            let payload_path = dir.join(payload_filename(delivery.as_of));
            fs::write(&payload_path, &payload_json).await?;
            receipt.files.push(payload_path.display().to_string());

            info!(document = %document, dir = ?dir, "Mirrored delivery to disk");
            receipt.folders.push(dir.display().to_string());
        }
        Ok(receipt)
    }
}
