use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Playback positions are reported in 100ns ticks
pub const TICKS_PER_MSEC: u64 = 10_000;

/// User state for one media item as stored on one server
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerMediaState {
    /// Server-scoped item ID; empty when the item was never loaded from this server
    pub media_id: String,
    pub is_favorite: bool,
    pub played: bool,
    pub play_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played: Option<DateTime<Utc>>,
    pub playback_position_ticks: u64,
}

/// The `UserData` object a server accepts when pushing state back
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UserDataPayload {
    pub is_favorite: bool,
    pub played: bool,
    pub play_count: u64,
    pub last_played_date: Option<String>,
    pub playback_position_ticks: i64,
}

impl ServerMediaState {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.media_id.is_empty()
    }

    pub fn playback_position_msecs(&self) -> u64 {
        self.playback_position_ticks / TICKS_PER_MSEC
    }

    pub fn set_playback_position_msecs(&mut self, msecs: u64) {
        self.playback_position_ticks = msecs.saturating_mul(TICKS_PER_MSEC);
    }

    /// Playback position as `H:MM:SS`, or `None` when nothing has been played
    pub fn playback_position(&self) -> Option<String> {
        let msecs = self.playback_position_msecs();
        if msecs == 0 {
            return None;
        }
        let secs = msecs / 1000;
        Some(format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60))
    }

    /// Compare user state with another server's copy.
    ///
    /// Last-played timestamps only take part when both sides have one.
    pub fn user_data_equal(&self, other: &ServerMediaState) -> bool {
        if self.is_valid() != other.is_valid() {
            return false;
        }

        let mut equal = self.is_favorite == other.is_favorite
            && self.played == other.played
            && self.play_count == other.play_count
            && self.playback_position_ticks == other.playback_position_ticks;
        if let (Some(lhs), Some(rhs)) = (self.last_played, other.last_played) {
            equal = equal && lhs == rhs;
        }
        equal
    }

    pub fn user_data_json(&self) -> UserDataPayload {
        UserDataPayload {
            is_favorite: self.is_favorite,
            played: self.played,
            play_count: self.play_count,
            last_played_date: self
                .last_played
                .map(|ts| ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
            playback_position_ticks: i64::try_from(self.playback_position_ticks)
                .unwrap_or(i64::MAX - 1),
        }
    }
}
