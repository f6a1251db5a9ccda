/// `load_config` module: Loads the static YAML service config and injects secrets from the environment.
///
/// This module is the only place where the YAML file and the environment are read and mapped
/// to strongly-typed settings for the intake service.
///
/// # Responsibilities
/// - Parse the YAML file (server, mail, optional drive, optional mirror sections)
/// - Inject SMTP credentials and the documented overrides (`PORT`, `MAIL_FROM_NAME`,
///   `DRIVE_ROOT_FOLDER_ID`, `GOOGLE_APPLICATION_CREDENTIALS`) from the environment
/// - Fail fast with a clear message when anything required is missing, before the
///   service binds its port
///
/// # Errors
/// All errors use `anyhow::Error` with context and are surfaced at the CLI boundary.
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const DEFAULT_BIND: &str = "0.0.0.0:3333";
const DEFAULT_FROM_NAME: &str = "Sistema";

/// Fully resolved settings for `serve`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub mail: MailSettings,
    pub drive: Option<DriveSettings>,
    pub mirror: Option<MirrorSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub recipients: Vec<String>,
    pub from_name: String,
    pub smtp: SmtpSettings,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Implicit TLS when true, STARTTLS otherwise.
    pub secure: bool,
}

// The password never reaches the logs.
impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("secure", &self.secure)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveSettings {
    pub root_folder_id: String,
    pub credentials_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: ServerSection,
    mail: MailSection,
    drive: Option<DriveSection>,
    mirror: Option<MirrorSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    bind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MailSection {
    #[serde(default)]
    recipients: Vec<String>,
    from_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveSection {
    root_folder_id: Option<String>,
    credentials_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct MirrorSection {
    base_dir: PathBuf,
}

/// Non-empty value of an environment variable.
fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required_env(name: &str) -> Result<String> {
    env_value(name).ok_or_else(|| {
        error!(variable = name, "Required environment variable missing");
        anyhow!("environment variable {name} must be set")
    })
}

/// Loads the YAML config at `path` and merges in the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let raw: RawConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    let bind = resolve_bind(raw.server.bind.as_deref())?;
    let mail = resolve_mail(raw.mail)?;
    let drive = raw.drive.map(resolve_drive).transpose()?;
    let mirror = raw.mirror.map(|m| MirrorSettings { base_dir: m.base_dir });

    if drive.is_none() && mirror.is_none() {
        warn!("Neither drive nor mirror configured; reports will only be emailed");
    }

    info!(
        bind = %bind,
        recipients = mail.recipients.len(),
        drive = drive.is_some(),
        mirror = mirror.is_some(),
        "Configuration loaded"
    );
    Ok(ServiceConfig {
        bind,
        mail,
        drive,
        mirror,
    })
}

fn resolve_bind(configured: Option<&str>) -> Result<SocketAddr> {
    let mut bind: SocketAddr = configured
        .unwrap_or(DEFAULT_BIND)
        .parse()
        .with_context(|| format!("server.bind is not a socket address: {configured:?}"))?;
    if let Some(port) = env_value("PORT") {
        let port: u16 = port
            .parse()
            .with_context(|| format!("PORT must be a port number, got {port:?}"))?;
        bind.set_port(port);
    }
    Ok(bind)
}

fn resolve_mail(section: MailSection) -> Result<MailSettings> {
    let recipients: Vec<String> = section
        .recipients
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    if recipients.is_empty() {
        bail!("mail.recipients must list at least one address");
    }

    let from_name = env_value("MAIL_FROM_NAME")
        .or(section.from_name)
        .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string());

    let port_raw = required_env("SMTP_PORT")?;
    let port: u16 = port_raw
        .parse()
        .with_context(|| format!("SMTP_PORT must be a port number, got {port_raw:?}"))?;
    let smtp = SmtpSettings {
        host: required_env("SMTP_HOST")?,
        port,
        user: required_env("SMTP_USER")?,
        password: required_env("SMTP_PASS")?,
        secure: env_value("SMTP_SECURE").is_some_and(|v| v.eq_ignore_ascii_case("true")),
    };

    Ok(MailSettings {
        recipients,
        from_name,
        smtp,
    })
}

fn resolve_drive(section: DriveSection) -> Result<DriveSettings> {
    let root_folder_id = env_value("DRIVE_ROOT_FOLDER_ID")
        .or(section.root_folder_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| anyhow!("drive.root_folder_id (or DRIVE_ROOT_FOLDER_ID) must be set"))?;
    let credentials_path = env_value("GOOGLE_APPLICATION_CREDENTIALS")
        .map(PathBuf::from)
        .or(section.credentials_path)
        .ok_or_else(|| {
            anyhow!("drive.credentials_path (or GOOGLE_APPLICATION_CREDENTIALS) must be set")
        })?;
    if !credentials_path.is_file() {
        error!(path = ?credentials_path, "Service account credentials not found");
        bail!("service account credentials not found at {credentials_path:?}");
    }
    Ok(DriveSettings {
        root_folder_id,
        credentials_path,
    })
}
