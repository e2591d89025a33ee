use media_merge_models::{NameKeyCache, SyncStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::arena::RecordId;
use crate::merge::{MergeMedia, MergedMedia};

/// Records on different servers that look like the same title by name but
/// were not merged because they share no provider ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCollision {
    pub key: String,
    pub year: Option<u32>,
    #[serde(skip)]
    pub records: Vec<RecordId>,
    pub servers: Vec<String>,
}

/// Summary of a merged record set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub total: usize,
    /// Records holding state for more than one server
    pub merged: usize,
    pub equal: usize,
    pub needs_updating: usize,
    pub single_server: usize,
    /// server -> number of canonical records present there
    pub per_server: BTreeMap<String, usize>,
    /// server -> number of records whose state on that server lags behind
    pub stale_per_server: BTreeMap<String, usize>,
    pub name_collisions: Vec<NameCollision>,
}

impl MergeReport {
    pub fn build(engine: &MergeMedia, merged: &MergedMedia) -> Self {
        let mut report = MergeReport {
            total: merged.len(),
            ..MergeReport::default()
        };

        for id in &merged.records {
            let Some(record) = engine.record(*id) else {
                continue;
            };
            match record.sync_status() {
                SyncStatus::NoServerPairs => report.single_server += 1,
                SyncStatus::Equal => report.equal += 1,
                SyncStatus::NeedsUpdating => report.needs_updating += 1,
            }
            if record.is_merged() {
                report.merged += 1;
            }
            for (server, state) in &record.servers {
                if !state.is_valid() {
                    continue;
                }
                *report.per_server.entry(server.clone()).or_default() += 1;
                if record.needs_updating(server) {
                    *report.stale_per_server.entry(server.clone()).or_default() += 1;
                }
            }
        }
        report
    }

    /// Also list unmerged records whose normalized names and years collide
    pub fn with_name_collisions(
        mut self,
        engine: &MergeMedia,
        merged: &MergedMedia,
        names: &mut NameKeyCache,
    ) -> Self {
        self.name_collisions = find_name_collisions(engine, merged, names);
        self
    }
}

/// Group single-server records by (name key, year) and keep groups that span
/// more than one server
pub fn find_name_collisions(
    engine: &MergeMedia,
    merged: &MergedMedia,
    names: &mut NameKeyCache,
) -> Vec<NameCollision> {
    let mut groups: BTreeMap<(String, Option<u32>), Vec<RecordId>> = BTreeMap::new();
    for id in &merged.records {
        let Some(record) = engine.record(*id) else {
            continue;
        };
        if record.is_merged() {
            continue;
        }
        let key = names.name_key(&record.name);
        if key.is_empty() {
            continue;
        }
        groups.entry((key, record.year)).or_default().push(*id);
    }

    let mut collisions = Vec::new();
    for ((key, year), records) in groups {
        let mut servers: Vec<String> = records
            .iter()
            .filter_map(|id| engine.record(*id))
            .flat_map(|record| record.servers.keys().cloned())
            .collect();
        servers.sort();
        servers.dedup();
        if servers.len() < 2 {
            continue;
        }
        debug!(key = %key, servers = ?servers, "Unmerged records share a title");
        collisions.push(NameCollision {
            key,
            year,
            records,
            servers,
        });
    }
    collisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Progress;
    use chrono::{TimeZone, Utc};
    use media_merge_models::{MediaRecord, MediaType, ServerMediaState};

    fn record(name: &str, server: &str, media_id: &str, played: bool, imdb: Option<&str>) -> MediaRecord {
        let mut state = ServerMediaState::new(media_id);
        state.played = played;
        if played {
            state.last_played = Some(Utc.with_ymd_and_hms(2024, 6, 1, 21, 0, 0).unwrap());
        }
        let mut record = MediaRecord::new(name, MediaType::Movie).with_server_state(server, state);
        if let Some(imdb) = imdb {
            record.add_provider("imdb", imdb);
        }
        record
    }

    fn merged_engine() -> (MergeMedia, MergedMedia) {
        let mut engine = MergeMedia::new();
        engine.ingest("den", record("Heat", "den", "1", true, Some("tt1")));
        engine.ingest("attic", record("Heat", "attic", "2", false, Some("tt1")));
        engine.ingest("den", record("Alien", "den", "3", true, Some("tt2")));
        engine.ingest("attic", record("Alien", "attic", "4", true, Some("tt2")));
        engine.ingest("den", record("The Thing", "den", "5", false, None));
        engine.ingest("attic", record("Thing", "attic", "6", false, None));

        let progress = Progress::headless();
        engine.merge(&progress).unwrap();
        let merged = engine.get_merged_data(&progress);
        (engine, merged)
    }

    #[test]
    fn test_report_counts_statuses() {
        let (engine, merged) = merged_engine();
        let report = MergeReport::build(&engine, &merged);

        assert_eq!(report.total, 4);
        assert_eq!(report.merged, 2);
        assert_eq!(report.equal, 1);
        assert_eq!(report.needs_updating, 1);
        assert_eq!(report.single_server, 2);
        assert_eq!(report.per_server.get("den"), Some(&3));
        assert_eq!(report.stale_per_server.get("attic"), Some(&1));
        assert!(report.name_collisions.is_empty());
    }

    #[test]
    fn test_name_collisions_list_unmerged_lookalikes() {
        let (engine, merged) = merged_engine();
        let mut names = NameKeyCache::new();
        let report = MergeReport::build(&engine, &merged).with_name_collisions(&engine, &merged, &mut names);

        assert_eq!(report.name_collisions.len(), 1);
        let collision = &report.name_collisions[0];
        assert_eq!(collision.key, "thing");
        assert_eq!(collision.servers, vec!["attic".to_string(), "den".to_string()]);
        assert_eq!(collision.records.len(), 2);
    }
}
