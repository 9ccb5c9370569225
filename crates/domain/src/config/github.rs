use serde::{Deserialize, Serialize};

fn d_branch() -> String {
    "main".to_string()
}

fn d_dir() -> String {
    "cf-cache".to_string()
}

fn d_api_base() -> String {
    "https://api.github.com".to_string()
}

/// Content-store transport settings, overridable via `GITHUB_REPO`,
/// `GITHUB_BRANCH`, `GITHUB_DIR`. The token itself is never held here —
/// it's resolved directly from `GITHUB_TOKEN` at the point of use, so it
/// never sits in a struct that might get logged or serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// `owner/name`.
    #[serde(default)]
    pub repo: String,
    #[serde(default = "d_branch")]
    pub branch: String,
    #[serde(default = "d_dir")]
    pub dir: String,
    #[serde(default = "d_api_base")]
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            branch: d_branch(),
            dir: d_dir(),
            api_base: d_api_base(),
        }
    }
}

impl GithubConfig {
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(repo) = std::env::var("GITHUB_REPO") {
            self.repo = repo;
        }
        if let Ok(branch) = std::env::var("GITHUB_BRANCH") {
            self.branch = branch;
        }
        if let Ok(dir) = std::env::var("GITHUB_DIR") {
            self.dir = dir;
        }
        self
    }

    pub fn document_path(&self) -> String {
        format!("{}/store.json", self.dir.trim_end_matches('/'))
    }
}
