use serde::{Deserialize, Serialize};

/// Desktop browser string stamped on outbound requests unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScraperConfig {
    /// Where the product catalog lives, e.g. `sqlite://catalog.db`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether outbound requests go through the proxy manager.
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,

    /// Base URL of the proxy manager service; proxies are fetched from
    /// `{proxy_service_url}/proxy`.
    #[serde(default)]
    pub proxy_service_url: Option<String>,

    /// Base URL of the application itself, used by the product page spider.
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Maximum number of fetches in flight during one spider run.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Wall-clock cap for one spider job attempt.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// How many times a failed spider job is attempted before giving up.
    #[serde(default = "default_job_attempts")]
    pub job_max_attempts: u32,
}

fn default_database_url() -> String {
    "sqlite://catalog.db".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_use_proxy() -> bool {
    true
}

fn default_app_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_concurrency() -> usize {
    num_cpus::get().min(16)
}

fn default_request_timeout() -> u64 {
    30
}

fn default_job_timeout() -> u64 {
    300
}

fn default_job_attempts() -> u32 {
    3
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            user_agent: default_user_agent(),
            use_proxy: default_use_proxy(),
            proxy_service_url: None,
            app_url: default_app_url(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            job_timeout_secs: default_job_timeout(),
            job_max_attempts: default_job_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_file_uses_defaults() {
        let config: ScraperConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.use_proxy);
        assert_eq!(config.job_timeout_secs, 300);
        assert_eq!(config.job_max_attempts, 3);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config: ScraperConfig =
            serde_json::from_str(r#"{"use_proxy": false, "nonsense": 1}"#).unwrap();
        assert!(!config.use_proxy);
    }
}
