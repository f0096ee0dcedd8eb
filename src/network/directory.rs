//! Directory Service: known nets and their minimum ranks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A logical voice channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInfo {
    pub room_id: String,
    #[serde(default)]
    pub name: String,
    /// Lowest rank allowed to transmit and send tactical traffic
    #[serde(default)]
    pub min_rank: Option<String>,
}

impl NetInfo {
    pub fn new(room_id: impl Into<String>, min_rank: Option<&str>) -> Self {
        let room_id = room_id.into();
        Self {
            name: room_id.clone(),
            room_id,
            min_rank: min_rank.map(str::to_string),
        }
    }
}

#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn nets(&self) -> Vec<NetInfo>;

    async fn net(&self, room_id: &str) -> Option<NetInfo> {
        self.nets()
            .await
            .into_iter()
            .find(|net| net.room_id == room_id)
    }
}

/// Directory backed by a fixed list, usually from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    nets: Vec<NetInfo>,
}

impl StaticDirectory {
    pub fn new(nets: Vec<NetInfo>) -> Self {
        Self { nets }
    }
}

#[async_trait]
impl DirectoryService for StaticDirectory {
    async fn nets(&self) -> Vec<NetInfo> {
        self.nets.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let directory = StaticDirectory::new(vec![
            NetInfo::new("OPS-1", Some("Scout")),
            NetInfo::new("LOBBY", None),
        ]);
        let net = directory.net("OPS-1").await.unwrap();
        assert_eq!(net.min_rank.as_deref(), Some("Scout"));
        assert!(directory.net("MISSING").await.is_none());
        assert_eq!(directory.nets().await.len(), 2);
    }
}
