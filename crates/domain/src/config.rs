//! Top-level configuration. Loaded from `config.toml` with every section
//! defaulted via `Config::default()` and overlaid by `toml::from_str`.

mod audit;
mod budget;
mod feed;
mod github;
mod schedule;
mod server;

pub use audit::AuditConfig;
pub use budget::BudgetConfig;
pub use feed::FeedConfig;
pub use github::GithubConfig;
pub use schedule::{CleanupConfig, ScheduleConfig};
pub use server::ServerConfig;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Config {
    /// Validate the resolved config, returning warnings/errors. Does not
    /// check the `GITHUB_TOKEN` environment variable — that's a `doctor`
    /// concern, not a config-shape concern.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.github.repo.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "github.repo must be set (owner/name)".into(),
            });
        } else if !self.github.repo.contains('/') {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: format!(
                    "github.repo '{}' should be 'owner/name'",
                    self.github.repo
                ),
            });
        }

        if self.audit.slice_size == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "audit.slice_size must be > 0".into(),
            });
        }

        if self.audit.block_size == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "audit.block_size must be > 0".into(),
            });
        }

        if self.budget.subreq_budget_per_tick == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "budget.subreq_budget_per_tick is 0 — every tick will do no work".into(),
            });
        }

        if self.server.allowed_origins.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "server.allowed_origins is empty — the dashboard will be blocked by CORS"
                    .into(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).expect("serialize");
        let parsed: Config = toml::from_str(&serialized).expect("parse");
        assert_eq!(parsed.audit.slice_size, config.audit.slice_size);
    }

    #[test]
    fn empty_repo_is_an_error() {
        let config = Config::default();
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == ConfigSeverity::Error && i.message.contains("github.repo")));
    }

    #[test]
    fn well_formed_repo_passes() {
        let mut config = Config::default();
        config.github.repo = "acme/roster-store".into();
        config.server.allowed_origins = vec!["https://dashboard.example".into()];
        let issues = config.validate();
        assert!(issues.iter().all(|i| i.severity != ConfigSeverity::Error));
    }
}
