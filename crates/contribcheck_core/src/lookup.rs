use std::env;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde_json::Value;

use crate::Reporter;

const DEFAULT_USER_AGENT: &str = "contribcheck/0.2 (MassMessage delivery list audit)";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_BACKOFF_FACTOR: u64 = 2;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Tunables for the MediaWiki API client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_factor: u64,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl ClientOptions {
    /// Defaults with `CONTRIBCHECK_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::with_overrides(|name| env::var(name).ok())
    }

    // Override lookup is injected so the parsing is testable without
    // mutating process environment state.
    fn with_overrides(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(value) = override_u64(&get, "CONTRIBCHECK_HTTP_TIMEOUT_MS") {
            options.timeout = Duration::from_millis(value);
        }
        if let Some(value) = override_u64(&get, "CONTRIBCHECK_HTTP_RETRIES") {
            options.max_retries = value.min(u32::MAX as u64) as u32;
        }
        if let Some(value) = override_u64(&get, "CONTRIBCHECK_BACKOFF_FACTOR") {
            options.backoff_factor = value;
        }
        if let Some(value) = get("CONTRIBCHECK_USER_AGENT")
            && !value.trim().is_empty()
        {
            options.user_agent = value.trim().to_string();
        }
        options
    }
}

fn override_u64(get: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    get(name).and_then(|value| value.trim().parse::<u64>().ok())
}

/// Source of last-edit timestamps for (username, site) pairs. The pipeline
/// only needs this single lookup, which keeps it testable without a network.
pub trait LastEditSource {
    fn last_edit(&self, username: &str, site: &str, reporter: &dyn Reporter) -> String;
}

/// Blocking MediaWiki API client with bounded retries and exponential
/// backoff between attempts.
pub struct ContribClient {
    client: Client,
    options: ClientOptions,
}

impl ContribClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, options })
    }

    /// Fetch the most recent contribution timestamp for `username` on
    /// `site`. Returns an empty string both when the user has no
    /// contributions there and when every attempt failed; exhaustion is
    /// reported, never raised.
    pub fn fetch_last_edit(&self, username: &str, site: &str, reporter: &dyn Reporter) -> String {
        let api_url = format!("https://{site}/w/api.php");
        let params = [
            ("action", "query"),
            ("list", "usercontribs"),
            ("ucuser", username),
            ("uclimit", "1"),
            ("ucprop", "timestamp"),
            ("format", "json"),
        ];

        for attempt in 1..=self.options.max_retries.max(1) {
            match self.attempt(&api_url, &params) {
                Ok(Some(timestamp)) => return timestamp,
                // No contributions on this site: a valid empty outcome.
                Ok(None) => return String::new(),
                Err(error) => {
                    if attempt >= self.options.max_retries {
                        reporter.error(&format!(
                            "failed to get data for {username}@{site} after {} attempts: {error}",
                            self.options.max_retries
                        ));
                        return String::new();
                    }
                    let delay = backoff_delay(attempt, self.options.backoff_factor);
                    reporter.info(&format!(
                        "request failed for {username}@{site} ({error}), retrying in {}s...",
                        delay.as_secs()
                    ));
                    sleep(delay);
                }
            }
        }
        String::new()
    }

    fn attempt(&self, api_url: &str, params: &[(&str, &str)]) -> Result<Option<String>> {
        let response = self
            .client
            .get(api_url)
            .header("User-Agent", self.options.user_agent.clone())
            .query(params)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status.as_u16());
        }
        let payload: Value = response
            .json()
            .context("failed to decode API JSON response")?;
        extract_timestamp(&payload)
    }
}

impl LastEditSource for ContribClient {
    fn last_edit(&self, username: &str, site: &str, reporter: &dyn Reporter) -> String {
        self.fetch_last_edit(username, site, reporter)
    }
}

/// Delay taken after failed attempt `attempt` (1-indexed):
/// `factor^(attempt - 1)` seconds, so 1s, 2s, 4s, 8s with the default
/// factor of 2.
pub fn backoff_delay(attempt: u32, factor: u64) -> Duration {
    Duration::from_secs(factor.saturating_pow(attempt.saturating_sub(1)))
}

/// Pull the most recent contribution timestamp out of a `usercontribs`
/// response body. `Ok(None)` is the valid zero-contributions outcome; a
/// body without the expected shape is an error so the caller retries.
pub fn extract_timestamp(payload: &Value) -> Result<Option<String>> {
    let contribs = payload
        .get("query")
        .and_then(|value| value.get("usercontribs"))
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("invalid usercontribs response shape"))?;
    let Some(first) = contribs.first() else {
        return Ok(None);
    };
    let timestamp = first
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("contribution entry without a timestamp"))?;
    Ok(Some(timestamp.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{ClientOptions, backoff_delay, extract_timestamp};

    #[test]
    fn backoff_schedule_doubles_per_attempt() {
        assert_eq!(backoff_delay(1, 2), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(4, 2), Duration::from_secs(8));
    }

    #[test]
    fn default_options_match_documented_values() {
        let options = ClientOptions::default();
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.backoff_factor, 2);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert!(options.user_agent.starts_with("contribcheck/"));
    }

    #[test]
    fn env_overrides_replace_each_default() {
        let vars: std::collections::HashMap<&str, &str> = [
            ("CONTRIBCHECK_HTTP_TIMEOUT_MS", "2500"),
            ("CONTRIBCHECK_HTTP_RETRIES", "3"),
            ("CONTRIBCHECK_BACKOFF_FACTOR", "4"),
            ("CONTRIBCHECK_USER_AGENT", "audit-bot/1.0"),
        ]
        .into_iter()
        .collect();

        let options =
            ClientOptions::with_overrides(|name| vars.get(name).map(|value| value.to_string()));
        assert_eq!(options.timeout, Duration::from_millis(2500));
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.backoff_factor, 4);
        assert_eq!(options.user_agent, "audit-bot/1.0");
    }

    #[test]
    fn malformed_or_blank_overrides_keep_defaults() {
        let vars: std::collections::HashMap<&str, &str> = [
            ("CONTRIBCHECK_HTTP_TIMEOUT_MS", "soon"),
            ("CONTRIBCHECK_HTTP_RETRIES", ""),
            ("CONTRIBCHECK_USER_AGENT", "   "),
        ]
        .into_iter()
        .collect();

        let options =
            ClientOptions::with_overrides(|name| vars.get(name).map(|value| value.to_string()));
        let defaults = ClientOptions::default();
        assert_eq!(options.timeout, defaults.timeout);
        assert_eq!(options.max_retries, defaults.max_retries);
        assert_eq!(options.backoff_factor, defaults.backoff_factor);
        assert_eq!(options.user_agent, defaults.user_agent);
    }

    #[test]
    fn extract_timestamp_returns_first_contribution() {
        let payload = json!({
            "query": {
                "usercontribs": [
                    {"timestamp": "2023-05-01T12:00:00Z"},
                    {"timestamp": "2023-04-01T12:00:00Z"}
                ]
            }
        });
        let timestamp = extract_timestamp(&payload).expect("valid shape");
        assert_eq!(timestamp.as_deref(), Some("2023-05-01T12:00:00Z"));
    }

    #[test]
    fn extract_timestamp_treats_empty_list_as_no_edits() {
        let payload = json!({"query": {"usercontribs": []}});
        let timestamp = extract_timestamp(&payload).expect("valid shape");
        assert_eq!(timestamp, None);
    }

    #[test]
    fn extract_timestamp_rejects_malformed_bodies() {
        assert!(extract_timestamp(&json!({})).is_err());
        assert!(extract_timestamp(&json!({"query": {}})).is_err());
        assert!(
            extract_timestamp(&json!({"query": {"usercontribs": [{"user": "X"}]}})).is_err()
        );
    }
}
