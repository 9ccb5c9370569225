//! The live network data feed.
//!
//! Hidden behind a trait, the same seam-behind-I/O idiom as the store
//! transport, so presence and audit logic can run against a fake feed in
//! tests instead of the real network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rosterwatch_domain::{Cid, Error};
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnlineController {
    pub cid: Cid,
    pub callsign: String,
    pub frequency: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub callsign: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[async_trait]
pub trait DataFeed: Send + Sync {
    /// Currently online controllers, `_ATIS` callsigns already filtered.
    async fn online_controllers(&self) -> Result<Vec<OnlineController>, Error>;

    /// `GET /members/<cid>` — 200 means the member exists.
    async fn member_exists(&self, cid: &Cid) -> Result<bool, Error>;

    /// `GET /connections?cid=<cid>` — completed controlling sessions.
    async fn sessions(&self, cid: &Cid) -> Result<Vec<Session>, Error>;
}

#[derive(Deserialize)]
struct RawController {
    cid: String,
    callsign: String,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawFeed {
    controllers: Vec<RawController>,
}

#[derive(Deserialize)]
struct RawSession {
    callsign: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawConnections {
    #[serde(default)]
    sessions: Vec<RawSession>,
}

pub struct HttpDataFeed {
    client: reqwest::Client,
    feed_url: String,
    members_base_url: String,
    connections_base_url: String,
}

impl HttpDataFeed {
    pub fn new(feed_url: String, members_base_url: String, connections_base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            feed_url,
            members_base_url,
            connections_base_url,
        }
    }
}

#[async_trait]
impl DataFeed for HttpDataFeed {
    async fn online_controllers(&self) -> Result<Vec<OnlineController>, Error> {
        let raw: RawFeed = self
            .client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        raw.controllers
            .into_iter()
            .filter(|c| !c.callsign.ends_with("_ATIS"))
            .map(|c| {
                Ok(OnlineController {
                    cid: Cid::parse(&c.cid)?,
                    callsign: c.callsign,
                    frequency: c.frequency,
                    name: c.name,
                })
            })
            .collect()
    }

    async fn member_exists(&self, cid: &Cid) -> Result<bool, Error> {
        let url = format!("{}/{}", self.members_base_url.trim_end_matches('/'), cid);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(resp.status().is_success())
    }

    async fn sessions(&self, cid: &Cid) -> Result<Vec<Session>, Error> {
        let resp: RawConnections = self
            .client
            .get(&self.connections_base_url)
            .query(&[("cid", cid.as_str())])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(resp
            .sessions
            .into_iter()
            .map(|s| Session {
                callsign: s.callsign,
                start: s.start,
                end: s.end,
            })
            .collect())
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct FakeDataFeed {
        pub online: Mutex<Vec<OnlineController>>,
        pub members: Mutex<HashMap<String, bool>>,
        pub sessions: Mutex<HashMap<String, Vec<Session>>>,
    }

    #[async_trait]
    impl DataFeed for FakeDataFeed {
        async fn online_controllers(&self) -> Result<Vec<OnlineController>, Error> {
            Ok(self.online.lock().await.clone())
        }

        async fn member_exists(&self, cid: &Cid) -> Result<bool, Error> {
            Ok(*self
                .members
                .lock()
                .await
                .get(cid.as_str())
                .unwrap_or(&true))
        }

        async fn sessions(&self, cid: &Cid) -> Result<Vec<Session>, Error> {
            Ok(self
                .sessions
                .lock()
                .await
                .get(cid.as_str())
                .cloned()
                .unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_controller_filters_atis() {
        let raw = RawFeed {
            controllers: vec![
                RawController {
                    cid: "123456".into(),
                    callsign: "KJFK_TWR".into(),
                    frequency: None,
                    name: None,
                },
                RawController {
                    cid: "654321".into(),
                    callsign: "KJFK_ATIS".into(),
                    frequency: None,
                    name: None,
                },
            ],
        };
        let filtered: Vec<_> = raw
            .controllers
            .into_iter()
            .filter(|c| !c.callsign.ends_with("_ATIS"))
            .collect();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].callsign, "KJFK_TWR");
    }
}
