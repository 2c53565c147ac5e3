//! Dispatcher and SMTP settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// When false the dispatcher is not started and notices stay queued.
    pub enabled: bool,
    pub poll_interval_secs: u64,
    /// Maximum entries sent per poll.
    pub batch_size: u32,
    /// Attempts after which an entry is abandoned.
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// Without SMTP settings notices go to the log sink.
    pub smtp: Option<SmtpSettings>,
}

impl Default for NotifySettings {
    fn default() -> Self {
        NotifySettings {
            enabled: true,
            poll_interval_secs: 5,
            batch_size: 50,
            max_attempts: 5,
            initial_backoff_secs: 30,
            max_backoff_secs: 3600,
            smtp: None,
        }
    }
}

impl NotifySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Delay before the next attempt of an entry that has already failed
    /// `attempts` times: `initial × 2^attempts`, capped at the maximum.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let factor = 1u64.checked_shl(attempts).unwrap_or(u64::MAX);
        let secs = self
            .initial_backoff_secs
            .saturating_mul(factor)
            .min(self.max_backoff_secs);
        Duration::from_secs(secs)
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Branchbook".to_string()
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let settings = NotifySettings::default();
        assert_eq!(settings.backoff(0), Duration::from_secs(30));
        assert_eq!(settings.backoff(1), Duration::from_secs(60));
        assert_eq!(settings.backoff(3), Duration::from_secs(240));
        assert_eq!(settings.backoff(10), Duration::from_secs(3600));
        assert_eq!(settings.backoff(200), Duration::from_secs(3600));
    }

    #[test]
    fn test_smtp_debug_redacts_password() {
        let smtp = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: "hunter2".to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: "Branchbook".to_string(),
        };
        assert!(!format!("{smtp:?}").contains("hunter2"));
    }
}
