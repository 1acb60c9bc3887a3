use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use mochiport_api::ai::{AzureOpenAiConfig, DEFAULT_API_VERSION, DEFAULT_SYSTEM_PROMPT};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

const DEFAULT_SWEEP_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub use_mock_database: bool,
    pub use_mock_ai: bool,
    /// Only set when endpoint, key and deployment are all present.
    pub azure: Option<AzureOpenAiConfig>,
    pub system_prompt: String,
    pub jwt_secret: Option<String>,
    pub cors_origin: Option<String>,
    /// `None` disables the overdue sweep.
    pub sweep_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(p) => p.parse().with_context(|| format!("Invalid PORT '{}'", p))?,
            None => 3001,
        };

        let jwt_secret = get("JWT_SECRET");
        if let Some(secret) = &jwt_secret {
            if PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
                bail!("JWT_SECRET is still a placeholder. Set a random secret or leave it unset.");
            }
        }

        let azure = match (
            get("AZURE_OPENAI_ENDPOINT"),
            get("AZURE_OPENAI_API_KEY"),
            get("AZURE_OPENAI_DEPLOYMENT_NAME"),
        ) {
            (Some(endpoint), Some(api_key), Some(deployment)) => Some(AzureOpenAiConfig {
                endpoint,
                api_key,
                deployment,
                api_version: get("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            }),
            _ => None,
        };

        let sweep_secs = match get("REMINDER_SWEEP_INTERVAL_SECS") {
            Some(s) => s
                .parse::<u64>()
                .with_context(|| format!("Invalid REMINDER_SWEEP_INTERVAL_SECS '{}'", s))?,
            None => DEFAULT_SWEEP_SECS,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_path: PathBuf::from(get("DATABASE_PATH").unwrap_or_else(|| "mochiport.db".into())),
            use_mock_database: flag(get("USE_MOCK_DATABASE")),
            use_mock_ai: flag(get("USE_MOCK_AI_SERVICE")),
            azure,
            system_prompt: get("AI_SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            jwt_secret,
            cors_origin: get("CORS_ORIGIN"),
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Permissive when no origin is configured.
    pub fn cors_layer(&self) -> Result<CorsLayer> {
        let Some(origin) = &self.cors_origin else {
            return Ok(CorsLayer::permissive());
        };
        let origin = HeaderValue::from_str(origin)
            .with_context(|| format!("Invalid CORS_ORIGIN '{}'", origin))?;
        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
    }
}

fn flag(value: Option<String>) -> bool {
    value.is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr().unwrap().to_string(), "0.0.0.0:3001");
        assert_eq!(cfg.database_path, PathBuf::from("mochiport.db"));
        assert!(!cfg.use_mock_database);
        assert!(cfg.azure.is_none());
        assert!(cfg.jwt_secret.is_none());
        assert_eq!(cfg.sweep_interval, Some(Duration::from_secs(60)));
        assert_eq!(cfg.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn flags_and_overrides() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("USE_MOCK_DATABASE", "TRUE"),
            ("USE_MOCK_AI_SERVICE", "no"),
            ("REMINDER_SWEEP_INTERVAL_SECS", "0"),
            ("JWT_SECRET", "  "),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.use_mock_database);
        assert!(!cfg.use_mock_ai);
        assert_eq!(cfg.sweep_interval, None);
        assert!(cfg.jwt_secret.is_none());
    }

    #[test]
    fn azure_needs_all_three_settings() {
        let partial = config(&[
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "key"),
        ])
        .unwrap();
        assert!(partial.azure.is_none());

        let full = config(&[
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "key"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt-4o"),
        ])
        .unwrap();
        let azure = full.azure.unwrap();
        assert_eq!(azure.deployment, "gpt-4o");
        assert_eq!(azure.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("JWT_SECRET", "dev-secret-change-me")]).is_err());
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("REMINDER_SWEEP_INTERVAL_SECS", "-5")]).is_err());
        assert!(config(&[("CORS_ORIGIN", "bad\norigin")]).unwrap().cors_layer().is_err());
    }
}
