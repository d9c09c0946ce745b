//! Configuration loaded from environment variables.
//!
//! Required credentials are validated at startup: a missing API key
//! fails the process before any request is accepted, never mid-pipeline.

use std::time::Duration;

/// HTTP server configuration.
///
/// | Env Var                | Default                 |
/// |------------------------|-------------------------|
/// | `HOST`                 | `0.0.0.0`               |
/// | `PORT`                 | `3000`                  |
/// | `CORS_ORIGINS`         | `http://localhost:5173` |
/// | `REQUEST_TIMEOUT_SECS` | `300`                   |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Generous by default: a pipeline run waits on external models.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
        }
    }
}

/// Pipeline configuration: external service credentials and generator
/// timing knobs.
///
/// | Env Var                  | Default  | Required            |
/// |--------------------------|----------|---------------------|
/// | `DATA_DIR`               | `./data` | no                  |
/// | `MOCK_GENERATION`        | `false`  | no                  |
/// | `IMAGE_API_URL`          | —        | unless mock         |
/// | `IMAGE_API_KEY`          | —        | unless mock         |
/// | `LLM_API_URL`            | —        | unless mock         |
/// | `LLM_API_KEY`            | —        | unless mock         |
/// | `LLM_MODEL`              | `gpt-4o-mini` | no             |
/// | `LLM_TIMEOUT_SECS`       | `60`     | no                  |
/// | `CLOUDINARY_CLOUD_NAME`  | —        | unless mock         |
/// | `CLOUDINARY_API_KEY`     | —        | unless mock         |
/// | `CLOUDINARY_API_SECRET`  | —        | unless mock         |
/// | `POLL_INTERVAL_SECS`     | `3`      | no                  |
/// | `MAX_POLL_ATTEMPTS`      | `40`     | no                  |
/// | `PANEL_DELAY_SECS`       | `2`      | no                  |
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub data_dir: String,
    /// Short-circuits the image service, object storage and LLM with
    /// in-process mocks.
    pub mock: bool,
    pub image_api_url: String,
    pub image_api_key: String,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub panel_delay: Duration,
}

impl PipelineSettings {
    pub fn from_env() -> Self {
        let mock = std::env::var("MOCK_GENERATION")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let required = |key: &str| -> String {
            match std::env::var(key) {
                Ok(v) if !v.trim().is_empty() => v,
                _ if mock => String::new(),
                _ => panic!("{key} must be set (or enable MOCK_GENERATION)"),
            }
        };

        let parsed = |key: &str, default: &str| -> u64 {
            std::env::var(key)
                .unwrap_or_else(|_| default.into())
                .parse()
                .unwrap_or_else(|_| panic!("{key} must be a valid integer"))
        };

        Self {
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()),
            mock,
            image_api_url: required("IMAGE_API_URL"),
            image_api_key: required("IMAGE_API_KEY"),
            llm_api_url: required("LLM_API_URL"),
            llm_api_key: required("LLM_API_KEY"),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            llm_timeout: Duration::from_secs(parsed("LLM_TIMEOUT_SECS", "60")),
            cloudinary_cloud_name: required("CLOUDINARY_CLOUD_NAME"),
            cloudinary_api_key: required("CLOUDINARY_API_KEY"),
            cloudinary_api_secret: required("CLOUDINARY_API_SECRET"),
            poll_interval: Duration::from_secs(parsed("POLL_INTERVAL_SECS", "3")),
            max_poll_attempts: parsed("MAX_POLL_ATTEMPTS", "40") as u32,
            panel_delay: Duration::from_secs(parsed("PANEL_DELAY_SECS", "2")),
        }
    }

    /// Mock settings rooted at a specific data directory; used by
    /// integration tests.
    pub fn mocked(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            mock: true,
            image_api_url: String::new(),
            image_api_key: String::new(),
            llm_api_url: String::new(),
            llm_api_key: String::new(),
            llm_model: String::new(),
            llm_timeout: Duration::from_secs(5),
            cloudinary_cloud_name: String::new(),
            cloudinary_api_key: String::new(),
            cloudinary_api_secret: String::new(),
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: 40,
            panel_delay: Duration::ZERO,
        }
    }
}
