use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::media::MediaType;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid snapshot JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// `UserData` block of a server item
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserDataSnapshot {
    pub is_favorite: bool,
    pub played: bool,
    pub play_count: u64,
    pub last_played_date: Option<DateTime<Utc>>,
    pub playback_position_ticks: u64,
}

/// One item as returned by a server's items listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ItemSnapshot {
    pub id: String,
    pub name: Option<String>,
    pub original_title: Option<String>,
    pub production_year: Option<u32>,
    #[serde(rename = "Type")]
    pub media_type: MediaType,
    pub series_name: Option<String>,
    pub season_name: Option<String>,
    pub index_number: Option<u32>,
    pub episode_title: Option<String>,
    pub provider_ids: BTreeMap<String, String>,
    pub user_data: Option<UserDataSnapshot>,
}

/// Raw items listing for one server
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ServerSnapshot {
    #[serde(default)]
    pub items: Vec<ItemSnapshot>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotShape {
    Listing(ServerSnapshot),
    Bare(Vec<ItemSnapshot>),
}

impl ServerSnapshot {
    /// Parse either an `{"Items": [...]}` listing or a bare array of items
    pub fn from_json(data: &str) -> Result<Self, SnapshotError> {
        let shape: SnapshotShape = serde_json::from_str(data)?;
        Ok(match shape {
            SnapshotShape::Listing(snapshot) => snapshot,
            SnapshotShape::Bare(items) => ServerSnapshot { items },
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        let data = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&data)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "Items": [
            {
                "Id": "101",
                "Name": "Heat",
                "Type": "Movie",
                "ProductionYear": 1995,
                "ProviderIds": { "Imdb": "tt0113277", "Tmdb": "949" },
                "UserData": {
                    "IsFavorite": true,
                    "Played": true,
                    "PlayCount": 2,
                    "LastPlayedDate": "2024-02-03T04:05:06.0000000Z",
                    "PlaybackPositionTicks": 0
                }
            },
            { "Id": "102", "Type": "BoxSet" }
        ],
        "TotalRecordCount": 2
    }"#;

    #[test]
    fn test_parse_items_listing() {
        let snapshot = ServerSnapshot::from_json(LISTING).unwrap();
        assert_eq!(snapshot.len(), 2);

        let heat = &snapshot.items[0];
        assert_eq!(heat.id, "101");
        assert_eq!(heat.media_type, MediaType::Movie);
        assert_eq!(heat.production_year, Some(1995));
        assert_eq!(heat.provider_ids.get("Tmdb").map(String::as_str), Some("949"));
        let user_data = heat.user_data.as_ref().unwrap();
        assert!(user_data.is_favorite);
        assert_eq!(user_data.play_count, 2);
        assert!(user_data.last_played_date.is_some());

        assert_eq!(snapshot.items[1].media_type, MediaType::Unknown);
        assert!(snapshot.items[1].user_data.is_none());
    }

    #[test]
    fn test_parse_bare_array() {
        let snapshot = ServerSnapshot::from_json(r#"[{ "Id": "7", "Name": "Alien" }]"#).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.items[0].name.as_deref(), Some("Alien"));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = ServerSnapshot::from_json("{ nope").unwrap_err();
        assert!(matches!(err, SnapshotError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ServerSnapshot::from_path(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }
}
