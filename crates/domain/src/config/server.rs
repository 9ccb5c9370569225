use serde::{Deserialize, Serialize};

fn d_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// HTTP API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_bind_addr")]
    pub bind_addr: String,
    /// Origins allowed in the CORS envelope. A single entry of `"*"` is
    /// fully permissive; entries ending `:*` match any port on that host.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: d_bind_addr(),
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Overlay the `ALLOWED_ORIGIN` environment variable (comma-separated)
    /// over the config file value.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var("ALLOWED_ORIGIN") {
            self.allowed_origins = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        self
    }
}
