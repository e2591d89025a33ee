use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::media::MediaType;
use crate::server_state::ServerMediaState;
use crate::snapshot::ItemSnapshot;

/// Where a record stands relative to its copies on other servers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Fewer than two servers hold valid state, nothing to compare against
    NoServerPairs,
    /// Every server with valid state agrees
    Equal,
    /// At least one server lags behind the most recently played copy
    NeedsUpdating,
}

/// One media title as seen on one or more servers
///
/// Identity fields describe the title itself; `servers` holds the per-server
/// user state keyed by server name. A record becomes "merged" once more than
/// one server holds valid state for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    /// Provider name -> provider ID (e.g. "Imdb" -> "tt0111161")
    pub provider_ids: BTreeMap<String, String>,
    pub servers: BTreeMap<String, ServerMediaState>,
}

impl MediaRecord {
    pub fn new(name: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            name: name.into(),
            media_type,
            ..Self::default()
        }
    }

    /// Builder-style helper to attach one provider ID
    pub fn with_provider(mut self, provider: impl Into<String>, id: impl Into<String>) -> Self {
        self.add_provider(provider, id);
        self
    }

    /// Builder-style helper to attach state for one server
    pub fn with_server_state(mut self, server: impl Into<String>, state: ServerMediaState) -> Self {
        self.set_server_state(server, state);
        self
    }

    /// Build a record from one item of a server snapshot
    pub fn from_item(item: &ItemSnapshot, server: &str) -> Self {
        let mut record = Self {
            name: Self::compute_name(item),
            original_title: item.original_title.clone().filter(|t| !t.is_empty()),
            year: item.production_year,
            media_type: item.media_type,
            series_name: item.series_name.clone().filter(|s| !s.is_empty()),
            provider_ids: BTreeMap::new(),
            servers: BTreeMap::new(),
        };

        for (provider, id) in &item.provider_ids {
            record.add_provider(provider.clone(), id.clone());
        }

        let mut state = ServerMediaState::new(item.id.clone());
        if let Some(user_data) = &item.user_data {
            state.is_favorite = user_data.is_favorite;
            state.played = user_data.played;
            state.play_count = user_data.play_count;
            state.last_played = user_data.last_played_date;
            state.playback_position_ticks = user_data.playback_position_ticks;
        }
        record.servers.insert(server.to_string(), state);
        record
    }

    /// Display name for an item; episodes become `Series - S01E02 - Title`
    pub fn compute_name(item: &ItemSnapshot) -> String {
        let name = item.name.clone().unwrap_or_default();
        if item.media_type != MediaType::Episode {
            return name;
        }

        let series = item.series_name.as_deref().unwrap_or_default();
        let mut season = item.season_name.clone().unwrap_or_default();
        if let Some(number) = season
            .rsplit(' ')
            .next()
            .and_then(|word| word.parse::<u32>().ok())
        {
            season = format!("S{:02}", number);
        }

        let mut display = format!(
            "{} - {}E{:02}",
            series,
            season,
            item.index_number.unwrap_or_default()
        );
        if let Some(episode_title) = item.episode_title.as_deref().filter(|t| !t.is_empty()) {
            display.push_str(" - ");
            display.push_str(episode_title);
        }
        if !name.is_empty() {
            display.push_str(" - ");
            display.push_str(&name);
        }
        display
    }

    pub fn add_provider(&mut self, provider: impl Into<String>, id: impl Into<String>) {
        self.provider_ids.insert(provider.into(), id.into());
    }

    pub fn provider_id(&self, provider: &str) -> Option<&str> {
        self.provider_ids.get(provider).map(String::as_str)
    }

    /// Provider IDs for this record.
    ///
    /// With `include_empty == false`, providers reported with an empty ID are skipped.
    pub fn provider_ids(&self, include_empty: bool) -> BTreeMap<String, String> {
        self.provider_ids
            .iter()
            .filter(|(_, id)| include_empty || !id.is_empty())
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect()
    }

    pub fn has_provider_ids(&self) -> bool {
        self.provider_ids.values().any(|id| !id.is_empty())
    }

    /// `name.id` pairs, lowercased and comma joined, as servers accept for provider searches
    pub fn provider_list(&self) -> String {
        self.provider_ids
            .iter()
            .filter(|(_, id)| !id.is_empty())
            .map(|(name, id)| format!("{}.{}", name.to_lowercase(), id.to_lowercase()))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn server_state(&self, server: &str) -> Option<&ServerMediaState> {
        self.servers.get(server)
    }

    pub fn set_server_state(&mut self, server: impl Into<String>, state: ServerMediaState) {
        self.servers.insert(server.into(), state);
    }

    pub fn media_id(&self, server: &str) -> Option<&str> {
        self.servers
            .get(server)
            .filter(|state| state.is_valid())
            .map(|state| state.media_id.as_str())
    }

    pub fn is_valid_for_server(&self, server: &str) -> bool {
        self.servers.get(server).is_some_and(ServerMediaState::is_valid)
    }

    pub fn valid_server_count(&self) -> usize {
        self.servers.values().filter(|state| state.is_valid()).count()
    }

    pub fn is_merged(&self) -> bool {
        self.valid_server_count() > 1
    }

    pub fn can_be_synced(&self) -> bool {
        self.is_merged()
    }

    /// Take over `other`'s state for `server`.
    ///
    /// Provider IDs this record lacks are filled in from `other`; existing IDs
    /// are kept. Absorbing the same record twice has no further effect.
    pub fn absorb_other(&mut self, other: &MediaRecord, server: &str) {
        let Some(state) = other.servers.get(server) else {
            return;
        };
        self.servers.insert(server.to_string(), state.clone());

        for (provider, id) in &other.provider_ids {
            if id.is_empty() {
                continue;
            }
            let slot = self.provider_ids.entry(provider.clone()).or_default();
            if slot.is_empty() {
                *slot = id.clone();
            }
        }

        if self.original_title.is_none() {
            self.original_title = other.original_title.clone();
        }
        if self.year.is_none() {
            self.year = other.year;
        }
        if self.series_name.is_none() {
            self.series_name = other.series_name.clone();
        }
    }

    /// The valid server state that was played most recently
    pub fn newest_state(&self) -> Option<(&str, &ServerMediaState)> {
        let mut newest: Option<(&str, &ServerMediaState)> = None;
        for (server, state) in &self.servers {
            if !state.is_valid() {
                continue;
            }
            match newest {
                Some((_, current)) if state.last_played <= current.last_played => {}
                _ => newest = Some((server.as_str(), state)),
            }
        }
        newest
    }

    pub fn needs_updating(&self, server: &str) -> bool {
        let Some(state) = self.servers.get(server).filter(|s| s.is_valid()) else {
            return false;
        };
        match self.newest_state() {
            Some((_, newest)) => !state.user_data_equal(newest),
            None => false,
        }
    }

    pub fn all_user_data_equal(&self) -> bool {
        let valid: Vec<&ServerMediaState> =
            self.servers.values().filter(|state| state.is_valid()).collect();
        valid.windows(2).all(|pair| pair[0].user_data_equal(pair[1]))
    }

    pub fn sync_status(&self) -> SyncStatus {
        if !self.can_be_synced() {
            SyncStatus::NoServerPairs
        } else if self.all_user_data_equal() {
            SyncStatus::Equal
        } else {
            SyncStatus::NeedsUpdating
        }
    }
}
