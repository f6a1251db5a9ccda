#![doc = "Google Drive v3 implementation of the core `FolderStore` contract, authenticated with a service account."]
//
//! # Drive client
//!
//! [`DriveClient`] talks to the Drive v3 REST API with `reqwest`:
//! - folder lookup by name and parent (`files.list`, non-trashed folders only)
//! - folder creation (`files.create`)
//! - file upload (`files.create` with `uploadType=multipart`)
//!
//! All calls set `supportsAllDrives`, so shared drives work as roots.
//!
//! ## Authentication
//! A service-account JSON key (the file `GOOGLE_APPLICATION_CREDENTIALS`
//! points at) is exchanged for an OAuth access token through the JWT bearer
//! grant. The token is cached behind an async mutex and refreshed shortly
//! before it expires.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fiscal_report_core::contract::{Attachment, BoxError, FolderStore};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("could not read service account file: {0}")]
    Io(#[from] std::io::Error),
    #[error("service account file is not valid JSON: {0}")]
    Credentials(#[from] serde_json::Error),
    #[error("service account private key rejected: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("drive request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("drive API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// The fields of a Google service-account key file this client uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct DriveClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl DriveClient {
    pub fn new(key: ServiceAccountKey) -> Result<Self, DriveError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        info!(client_email = %key.client_email, "Initialized Drive client from service account");
        Ok(Self {
            http: reqwest::Client::new(),
            key,
            signing_key,
            api_base: DEFAULT_API_BASE.to_string(),
            token: Mutex::new(None),
        })
    }

    pub async fn from_service_account_file(path: &Path) -> Result<Self, DriveError> {
        let raw = tokio::fs::read(path).await.map_err(|e| {
            error!(error = ?e, path = ?path, "Failed to read service account file");
            e
        })?;
        let key: ServiceAccountKey = serde_json::from_slice(&raw)?;
        Self::new(key)
    }

    /// Points the client at another API host (used against local test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<String, DriveError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, DriveError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let body: TokenResponse = ensure_success(response).await?.json().await?;
        debug!(expires_in = body.expires_in, "Obtained Drive access token");
        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.api_base)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, DriveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(status = status.as_u16(), body = %body, "Drive API error");
    Err(DriveError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Quotes `value` for use inside a single-quoted Drive query string.
fn query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// The `files.list` query for a non-trashed folder called `name` under `parent`.
pub fn folder_query(name: &str, parent: &str) -> String {
    format!(
        "mimeType='{FOLDER_MIME_TYPE}' and name='{}' and trashed=false and '{}' in parents",
        query_literal(name),
        query_literal(parent)
    )
}

/// A `multipart/related` body with JSON metadata followed by the media part.
fn related_body(boundary: &str, metadata: &serde_json::Value, file: &Attachment) -> Vec<u8> {
    let mut body = Vec::with_capacity(file.content.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {}\r\n\r\n",
            file.content_type_or_default()
        )
        .as_bytes(),
    );
    body.extend_from_slice(&file.content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl FolderStore for DriveClient {
    async fn find_folder(&self, name: &str, parent: &str) -> Result<Option<String>, BoxError> {
        let token = self.access_token().await?;
        let query = folder_query(name, parent);
        let response = self
            .http
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id, name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(DriveError::from)?;
        let list: FileList = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(DriveError::from)?;
        let found = list.files.into_iter().next().map(|f| f.id);
        debug!(folder = name, parent, found = found.is_some(), "Drive folder lookup");
        Ok(found)
    }

    async fn create_folder(&self, name: &str, parent: &str) -> Result<String, BoxError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(self.files_url())
            .bearer_auth(token)
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent],
            }))
            .send()
            .await
            .map_err(DriveError::from)?;
        let created: DriveFile = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(DriveError::from)?;
        info!(folder = name, parent, folder_id = %created.id, "Drive folder created");
        Ok(created.id)
    }

    async fn upload_file(&self, folder: &str, file: &Attachment) -> Result<String, BoxError> {
        let token = self.access_token().await?;
        let content_hash = format!("{:x}", Sha256::digest(&file.content));
        let boundary = format!("fiscal-report-{}", Uuid::new_v4().simple());
        let metadata = json!({
            "name": file.filename,
            "parents": [folder],
        });

        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", "id"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(related_body(&boundary, &metadata, file))
            .send()
            .await
            .map_err(DriveError::from)?;
        let uploaded: DriveFile = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(DriveError::from)?;
        info!(
            folder_id = folder,
            filename = %file.filename,
            bytes = file.content.len(),
            sha256 = %content_hash,
            file_id = %uploaded.id,
            "Uploaded file to Drive"
        );
        Ok(uploaded.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_query_escapes_quotes() {
        assert_eq!(
            folder_query("D'Ávila - Loja", "root"),
            "mimeType='application/vnd.google-apps.folder' and name='D\\'Ávila - Loja' and trashed=false and 'root' in parents"
        );
    }

    #[test]
    fn related_body_has_metadata_then_media() {
        let file = Attachment {
            filename: "a.pdf".into(),
            content: b"%PDF".to_vec(),
            content_type: Some("application/pdf".into()),
        };
        let body = related_body("XYZ", &json!({"name": "a.pdf"}), &file);
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--XYZ\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"a.pdf\"}\r\n"));
        assert!(text.contains("--XYZ\r\nContent-Type: application/pdf\r\n\r\n%PDF\r\n--XYZ--\r\n"));
    }
}
