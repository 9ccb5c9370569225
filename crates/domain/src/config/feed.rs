use serde::{Deserialize, Serialize};

fn d_feed_url() -> String {
    "https://data.vatsim.net/v3/vatsim-data.json".to_string()
}

fn d_members_base_url() -> String {
    "https://api.vatsim.net/v2/members".to_string()
}

fn d_connections_base_url() -> String {
    "https://api.vatsim.net/v2/connections".to_string()
}

/// Live network data-feed endpoints. The feed's wire format beyond the
/// fields rosterwatch reads is someone else's concern — only these base
/// URLs are ours to configure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "d_feed_url")]
    pub feed_url: String,
    #[serde(default = "d_members_base_url")]
    pub members_base_url: String,
    #[serde(default = "d_connections_base_url")]
    pub connections_base_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            feed_url: d_feed_url(),
            members_base_url: d_members_base_url(),
            connections_base_url: d_connections_base_url(),
        }
    }
}

impl FeedConfig {
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("FEED_URL") {
            self.feed_url = url;
        }
        if let Ok(url) = std::env::var("MEMBERS_BASE_URL") {
            self.members_base_url = url;
        }
        if let Ok(url) = std::env::var("CONNECTIONS_BASE_URL") {
            self.connections_base_url = url;
        }
        self
    }
}
