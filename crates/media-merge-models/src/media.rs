use serde::{Deserialize, Serialize};
use std::fmt;

/// Item kinds reported by media servers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum MediaType {
    Movie,
    Episode,
    Series,
    Season,
    Video,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MediaType {
    pub fn is_episodic(&self) -> bool {
        matches!(self, MediaType::Episode | MediaType::Season | MediaType::Series)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaType::Movie => "Movie",
            MediaType::Episode => "Episode",
            MediaType::Series => "Series",
            MediaType::Season => "Season",
            MediaType::Video => "Video",
            MediaType::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}
