//! Runtime configuration from environment variables

use std::time::Duration;

/// Server configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: String,
    /// Path to the team roster JSON file
    pub team_file: String,
    /// Human who receives conversations the responder hands off
    pub escalation_agent: String,
    /// Default owner for auto-provisioned contacts
    pub default_owner: String,
    pub responder: ResponderConfig,
    /// Tone descriptor forwarded on every responder call
    pub tone: String,
    /// Next-action offset for auto-provisioned contacts
    pub followup_days: i64,
}

/// Responder gateway endpoint configuration
#[derive(Debug, Clone, Default)]
pub struct ResponderConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ResponderConfig {
    pub fn from_env() -> Self {
        let timeout_secs = std::env::var("INBOXD_RESPONDER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        Self {
            url: std::env::var("INBOXD_RESPONDER_URL").ok(),
            api_key: std::env::var("INBOXD_RESPONDER_KEY").ok(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = std::env::var("INBOXD_DB_PATH").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.inboxd/inboxd.db")
        });

        let port = std::env::var("INBOXD_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Self {
            port,
            db_path,
            team_file: std::env::var("INBOXD_TEAM_FILE")
                .unwrap_or_else(|_| "team.json".to_string()),
            escalation_agent: std::env::var("INBOXD_ESCALATION_AGENT").unwrap_or_default(),
            default_owner: std::env::var("INBOXD_DEFAULT_OWNER").unwrap_or_default(),
            responder: ResponderConfig::from_env(),
            tone: std::env::var("INBOXD_TONE")
                .unwrap_or_else(|_| "friendly and concise".to_string()),
            followup_days: std::env::var("INBOXD_FOLLOWUP_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for tests: no responder endpoint, fixed routing targets
    pub fn for_tests(escalation_agent: &str, default_owner: &str) -> Self {
        Self {
            port: 0,
            db_path: ":memory:".to_string(),
            team_file: String::new(),
            escalation_agent: escalation_agent.to_string(),
            default_owner: default_owner.to_string(),
            responder: ResponderConfig {
                url: None,
                api_key: None,
                timeout: Duration::from_secs(5),
            },
            tone: "friendly and concise".to_string(),
            followup_days: 3,
        }
    }
}
