use crate::error::{ErrorContext, Result, UploaderError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "EMOTOBOOTH_CONFIG";
/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "uploader.json";

pub const TWILIO_SID_ENV: &str = "TWILLIO_SID";
pub const TWILIO_TOKEN_ENV: &str = "TWILLIO_TOKEN";
pub const TWILIO_TO_ENV: &str = "TWILLIO_TO";
pub const TWILIO_FROM_ENV: &str = "TWILLIO_FROM";
pub const STATUS_INTERVAL_ENV: &str = "EMOTOBOOTH_STATUS_INTERVAL_SECS";

pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploaderConfig {
    pub watch_dir: PathBuf,
    pub include_existing: bool,
    pub max_depth: usize,
    pub ignored_names: Vec<String>,
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub upload_timeout_secs: u64,
    /// How long a new file's size must hold still before it is queued; 0 disables
    pub write_settle_ms: u64,
    pub rescan_interval_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("in"),
            include_existing: true,
            max_depth: 1,
            ignored_names: vec![".DS_Store".to_string()],
            endpoint: "http://localhost:8080/photo".to_string(),
            username: "user".to_string(),
            password: "pass123".to_string(),
            upload_timeout_secs: 120,
            write_settle_ms: 250,
            rescan_interval_secs: None,
            log_dir: None,
        }
    }
}

impl UploaderConfig {
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint).map_err(|e| {
            UploaderError::Config(format!("endpoint '{}' is not a URL: {}", self.endpoint, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UploaderError::Config(format!(
                "endpoint must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.upload_timeout_secs == 0 {
            return Err(UploaderError::Config(
                "uploadTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.rescan_interval_secs == Some(0) {
            return Err(UploaderError::Config(
                "rescanIntervalSecs must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }

    pub fn rescan_interval(&self) -> Option<Duration> {
        self.rescan_interval_secs.map(Duration::from_secs)
    }

    /// Expand `~`, create the folder if it is missing and return its canonical path.
    ///
    /// Watch events report canonical paths on some platforms (macOS resolves
    /// `/var` to `/private/var`), so the root has to be canonical too.
    pub fn resolve_watch_dir(&self) -> Result<PathBuf> {
        let raw = self.watch_dir.to_string_lossy();
        let expanded = PathBuf::from(shellexpand::tilde(&raw).as_ref());

        if !expanded.exists() {
            fs::create_dir_all(&expanded)
                .context(&format!("Failed to create watch dir {}", expanded.display()))?;
        }

        let resolved = expanded
            .canonicalize()
            .context(&format!("Failed to resolve watch dir {}", expanded.display()))?;

        if !resolved.is_dir() {
            return Err(UploaderError::Config(format!(
                "watch path is not a directory: {}",
                resolved.display()
            )));
        }

        Ok(resolved)
    }
}

/// Load the uploader config.
///
/// Precedence: the file named by `EMOTOBOOTH_CONFIG`, then `uploader.json`
/// in the working directory, then built-in defaults.
pub fn load_config() -> Result<UploaderConfig> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(shellexpand::tilde(&path).as_ref());
        return load_config_from(&path);
    }

    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return load_config_from(local);
    }

    let config = UploaderConfig::default();
    config.validate()?;
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<UploaderConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        UploaderError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let config: UploaderConfig = serde_json::from_str(&content).map_err(|e| {
        UploaderError::Config(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    config.validate()?;
    Ok(config)
}

/// Messaging credentials for periodic status reports.
#[derive(Clone)]
pub struct NotifierConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub to: Option<String>,
    pub from: Option<String>,
    pub interval: Duration,
    pub api_base: String,
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("to", &self.to)
            .field("from", &self.from)
            .field("interval", &self.interval)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl NotifierConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Returns `None` unless both the account SID and auth token are present.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let account_sid = non_empty(TWILIO_SID_ENV)?;
        let auth_token = non_empty(TWILIO_TOKEN_ENV)?;

        let interval = non_empty(STATUS_INTERVAL_ENV)
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STATUS_INTERVAL);

        Some(Self {
            account_sid,
            auth_token,
            to: non_empty(TWILIO_TO_ENV),
            from: non_empty(TWILIO_FROM_ENV),
            interval,
            api_base: DEFAULT_TWILIO_API_BASE.to_string(),
        })
    }
}
