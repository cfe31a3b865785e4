use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub max_text_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty, // Human-readable lines
    Json,   // One JSON object per event
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            max_sessions: 64,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama3-8b-8192".to_string(),
            api_key: None,
            request_timeout_secs: 60,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { max_text_chars: 2500 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve from the process environment. Load `.env` first if wanted.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("REPORT_BIND_ADDR") {
            config.server.bind_addr = addr;
        }
        config.server.max_upload_bytes = parse_or(
            "REPORT_MAX_UPLOAD_BYTES",
            get("REPORT_MAX_UPLOAD_BYTES"),
            config.server.max_upload_bytes,
        );
        config.server.max_sessions = parse_or(
            "REPORT_MAX_SESSIONS",
            get("REPORT_MAX_SESSIONS"),
            config.server.max_sessions,
        );

        if let Some(url) = get("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = get("LLM_MODEL") {
            config.llm.model = model;
        }
        config.llm.api_key = get("GROQ_APIKEY");
        config.llm.request_timeout_secs = parse_or(
            "LLM_TIMEOUT_SECS",
            get("LLM_TIMEOUT_SECS"),
            config.llm.request_timeout_secs,
        );

        config.ingest.max_text_chars = parse_or(
            "REPORT_MAX_TEXT_CHARS",
            get("REPORT_MAX_TEXT_CHARS"),
            config.ingest.max_text_chars,
        );

        if let Some(format) = get("LOG_FORMAT") {
            config.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                other => {
                    warn!(value = other, "Unknown LOG_FORMAT, using pretty");
                    LogFormat::Pretty
                }
            };
        }
        if let Some(filter) = get("RUST_LOG") {
            config.logging.filter = filter;
        }

        config
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match raw {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(key, value = %value, default = %default, "Invalid number, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None);

        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.server.max_sessions, 64);
        assert_eq!(config.llm.model, "llama3-8b-8192");
        assert_eq!(config.llm.api_key, None);
        assert_eq!(config.ingest.max_text_chars, 2500);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn environment_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("REPORT_BIND_ADDR", "127.0.0.1:8080"),
            ("REPORT_MAX_SESSIONS", "8"),
            ("GROQ_APIKEY", " secret "),
            ("LLM_MODEL", "llama-3.1-8b-instant"),
            ("REPORT_MAX_TEXT_CHARS", "4000"),
            ("LOG_FORMAT", "JSON"),
            ("RUST_LOG", "api=debug"),
        ]));

        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.server.max_sessions, 8);
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.ingest.max_text_chars, 4000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, "api=debug");
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LLM_TIMEOUT_SECS", "soon"),
            ("REPORT_MAX_UPLOAD_BYTES", "-1"),
        ]));

        assert_eq!(config.llm.request_timeout_secs, 60);
        assert_eq!(config.server.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn blank_key_is_unset() {
        let config = AppConfig::from_lookup(lookup(&[("GROQ_APIKEY", "   ")]));
        assert_eq!(config.llm.api_key, None);
    }

    #[test]
    fn api_key_is_not_serialized() {
        let config = AppConfig::from_lookup(lookup(&[("GROQ_APIKEY", "secret")]));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
