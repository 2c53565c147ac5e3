//! # Ops Configuration
//!
//! ## Load Order (later overrides earlier)
//! 1. Default values
//! 2. Config file (`ops.toml` in the platform config dir, or `--config`)
//! 3. `BRANCHBOOK_*` environment variables
//!
//! ## Example
//! ```toml
//! [database]
//! path = "/var/lib/branchbook/branchbook.db"
//! max_connections = 5
//!
//! [invoicing]
//! list_page_cap = 10
//! unlink_on_delete = false
//!
//! [notifications]
//! enabled = true
//! poll_interval_secs = 5
//! max_attempts = 5
//!
//! [notifications.smtp]
//! host = "smtp.example.com"
//! username = "mailer"
//! password = "..."
//! from_email = "noreply@example.com"
//!
//! [reconcile]
//! interval_secs = 3600
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use branchbook_db::Database;
use branchbook_invoicing::{InvoiceLifecycle, InvoicingSettings, Stores};
use branchbook_notify::NotifySettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "branchbook", "branchbook")
        .map(|dirs| dirs.data_dir().join("branchbook.db"))
        .unwrap_or_else(|| PathBuf::from("./branchbook.db"))
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Seconds between full reconciliation passes. 0 disables the loop.
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval(),
        }
    }
}

fn default_reconcile_interval() -> u64 {
    3600
}

impl ReconcileSettings {
    pub fn is_enabled(&self) -> bool {
        self.interval_secs > 0
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// =============================================================================
// OpsConfig
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Shared with services that embed `branchbook-invoicing` against the
    /// same database, so the reconciler and the request path agree.
    #[serde(default)]
    pub invoicing: InvoicingSettings,

    #[serde(default)]
    pub notifications: NotifySettings,

    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

impl OpsConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ops config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.invoicing.list_page_cap == 0 {
            return Err(ConfigError::Invalid(
                "invoicing.list_page_cap must be greater than 0".into(),
            ));
        }

        let notify = &self.notifications;
        if notify.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "notifications.poll_interval_secs must be greater than 0".into(),
            ));
        }
        if notify.batch_size == 0 || notify.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "notifications.batch_size and max_attempts must be greater than 0".into(),
            ));
        }
        if notify.initial_backoff_secs > notify.max_backoff_secs {
            return Err(ConfigError::Invalid(format!(
                "notifications.initial_backoff_secs ({}) exceeds max_backoff_secs ({})",
                notify.initial_backoff_secs, notify.max_backoff_secs
            )));
        }

        if let Some(smtp) = &notify.smtp {
            if smtp.host.trim().is_empty() {
                return Err(ConfigError::Invalid("notifications.smtp.host must not be empty".into()));
            }
            if !smtp.from_email.contains('@') {
                return Err(ConfigError::Invalid(format!(
                    "notifications.smtp.from_email is not an address: {}",
                    smtp.from_email
                )));
            }
        }

        Ok(())
    }

    /// Applies `BRANCHBOOK_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BRANCHBOOK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(cap) = lookup("BRANCHBOOK_LIST_PAGE_CAP") {
            match cap.parse::<u32>() {
                Ok(c) => self.invoicing.list_page_cap = c,
                Err(_) => warn!(value = %cap, "Ignoring invalid BRANCHBOOK_LIST_PAGE_CAP"),
            }
        }

        if let Some(flag) = lookup("BRANCHBOOK_UNLINK_ON_DELETE") {
            match parse_flag(&flag) {
                Some(b) => self.invoicing.unlink_on_delete = b,
                None => warn!(value = %flag, "Ignoring invalid BRANCHBOOK_UNLINK_ON_DELETE"),
            }
        }

        if let Some(flag) = lookup("BRANCHBOOK_NOTIFICATIONS_ENABLED") {
            match parse_flag(&flag) {
                Some(b) => self.notifications.enabled = b,
                None => warn!(value = %flag, "Ignoring invalid BRANCHBOOK_NOTIFICATIONS_ENABLED"),
            }
        }

        if let Some(secs) = lookup("BRANCHBOOK_RECONCILE_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.reconcile.interval_secs = s;
            }
        }

        // Secrets stay out of the file; the section itself must exist.
        if let Some(smtp) = self.notifications.smtp.as_mut() {
            if let Some(host) = lookup("BRANCHBOOK_SMTP_HOST") {
                smtp.host = host;
            }
            if let Some(username) = lookup("BRANCHBOOK_SMTP_USERNAME") {
                smtp.username = username;
            }
            if let Some(password) = lookup("BRANCHBOOK_SMTP_PASSWORD") {
                smtp.password = password;
            }
        } else if lookup("BRANCHBOOK_SMTP_PASSWORD").is_some() {
            warn!("BRANCHBOOK_SMTP_PASSWORD set but no [notifications.smtp] section configured");
        }
    }

    /// Invoice services over `db`, carrying the `[invoicing]` settings.
    pub fn lifecycle(&self, db: &Database) -> InvoiceLifecycle {
        InvoiceLifecycle::new(Stores::sqlite(db), self.invoicing.clone())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "branchbook", "branchbook")
            .map(|dirs| dirs.config_dir().join("ops.toml"))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = OpsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.invoicing.list_page_cap, 10);
        assert!(!config.invoicing.unlink_on_delete);
        assert!(config.notifications.enabled);
        assert!(config.notifications.smtp.is_none());
        assert_eq!(config.reconcile.interval_secs, 3600);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: OpsConfig = toml::from_str(
            r#"
            [database]
            path = "/tmp/bb.db"

            [invoicing]
            unlink_on_delete = true

            [notifications.smtp]
            host = "smtp.example.com"
            username = "mailer"
            password = "secret"
            from_email = "noreply@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/bb.db"));
        assert_eq!(config.database.max_connections, 5);
        assert!(config.invoicing.unlink_on_delete);
        assert_eq!(config.invoicing.list_page_cap, 10);
        assert_eq!(config.notifications.max_attempts, 5);

        let smtp = config.notifications.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from_name, "Branchbook");
    }

    #[test]
    fn test_env_overrides() {
        let mut config: OpsConfig = toml::from_str(
            r#"
            [notifications.smtp]
            host = "smtp.example.com"
            username = "mailer"
            password = "from-file"
            from_email = "noreply@example.com"
            "#,
        )
        .unwrap();

        config.apply_overrides(env(&[
            ("BRANCHBOOK_DB_PATH", "/data/bb.db"),
            ("BRANCHBOOK_LIST_PAGE_CAP", "25"),
            ("BRANCHBOOK_UNLINK_ON_DELETE", "yes"),
            ("BRANCHBOOK_NOTIFICATIONS_ENABLED", "false"),
            ("BRANCHBOOK_RECONCILE_INTERVAL_SECS", "0"),
            ("BRANCHBOOK_SMTP_PASSWORD", "from-env"),
        ]));

        assert_eq!(config.database.path, PathBuf::from("/data/bb.db"));
        assert_eq!(config.invoicing.list_page_cap, 25);
        assert!(config.invoicing.unlink_on_delete);
        assert!(!config.notifications.enabled);
        assert!(!config.reconcile.is_enabled());
        assert_eq!(config.notifications.smtp.unwrap().password, "from-env");
    }

    #[test]
    fn test_invalid_env_values_ignored() {
        let mut config = OpsConfig::default();
        config.apply_overrides(env(&[
            ("BRANCHBOOK_LIST_PAGE_CAP", "lots"),
            ("BRANCHBOOK_UNLINK_ON_DELETE", "maybe"),
        ]));
        assert_eq!(config.invoicing.list_page_cap, 10);
        assert!(!config.invoicing.unlink_on_delete);
    }

    #[test]
    fn test_config_validation() {
        let mut config = OpsConfig::default();
        config.invoicing.list_page_cap = 0;
        assert!(config.validate().is_err());

        let mut config = OpsConfig::default();
        config.notifications.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = OpsConfig::default();
        config.notifications.initial_backoff_secs = 7200;
        assert!(config.validate().is_err());

        let mut config = OpsConfig::default();
        config.notifications.smtp = Some(branchbook_notify::SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: "secret".to_string(),
            from_email: "nobody".to_string(),
            from_name: "Branchbook".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = OpsConfig::load(Some(PathBuf::from("/nonexistent/branchbook/ops.toml")));
        assert!(config.is_ok());
    }

    #[tokio::test]
    async fn test_lifecycle_carries_invoicing_section() {
        let config: OpsConfig = toml::from_str(
            r#"
            [invoicing]
            list_page_cap = 25
            unlink_on_delete = true
            "#,
        )
        .unwrap();
        let db = Database::new(branchbook_db::DbConfig::in_memory()).await.unwrap();

        let lifecycle = config.lifecycle(&db);
        assert_eq!(lifecycle.settings().list_page_cap, 25);
        assert!(lifecycle.settings().unlink_on_delete);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&OpsConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[invoicing]"));
        assert!(toml_str.contains("[notifications]"));
        assert!(toml_str.contains("[reconcile]"));
    }
}
