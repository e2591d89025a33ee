// Cross-server entity resolution: collapse records that share provider IDs

use media_merge_models::MediaRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::arena::{RecordArena, RecordId};
use crate::progress::Progress;

/// media ID -> record, for one server
pub type MediaIdIndex = BTreeMap<String, RecordId>;

/// server name -> media ID -> record
pub type ServerIndex = BTreeMap<String, MediaIdIndex>;

/// provider name -> provider ID -> record, for one server
type ProviderIndex = HashMap<String, HashMap<String, RecordId>>;

pub const MERGE_TITLE: &str = "Merging media data";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("Merge cancelled")]
    Cancelled,
}

/// Counters from one merge pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Per-server resolution passes that ran
    pub passes: usize,
    pub records_visited: usize,
    /// Index slots repointed at a canonical record
    pub replacements: usize,
    /// Records whose provider IDs named more than one other record
    pub ambiguous: usize,
    /// Replacements dropped because they led back to their own source
    pub cycles_dropped: usize,
}

/// Canonical records plus the per-server index that points at them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedMedia {
    /// Distinct canonical records, ordered by handle
    pub records: Vec<RecordId>,
    pub by_server: ServerIndex,
}

impl MergedMedia {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_for(&self, server: &str, media_id: &str) -> Option<RecordId> {
        self.by_server.get(server)?.get(media_id).copied()
    }
}

/// One queued "this slot holds a duplicate of that record" relation
struct Replacement {
    key: String,
    source: RecordId,
    target: RecordId,
}

/// Entity resolution and merge engine
///
/// Records are ingested per server, indexed by their server media ID and by
/// every non-empty provider ID they carry. [`MergeMedia::merge`] then finds
/// records on different servers that share provider IDs and collapses them
/// onto one canonical record. The provider search index is scratch state: it
/// only lives between ingestion and the end of the next merge.
#[derive(Debug, Default)]
pub struct MergeMedia {
    arena: RecordArena,
    media_map: ServerIndex,
    provider_search: BTreeMap<String, ProviderIndex>,
}

impl MergeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` and register it under `server`
    pub fn ingest(&mut self, server: &str, record: MediaRecord) -> RecordId {
        let id = self.arena.insert(record);
        self.add_media_info(server, id);
        id
    }

    /// Register an already stored record under `(server, media ID)` and index
    /// its provider IDs. Returns false when the handle is stale or the record
    /// has no media ID on `server`.
    pub fn add_media_info(&mut self, server: &str, id: RecordId) -> bool {
        let Some(record) = self.arena.get(id) else {
            return false;
        };
        let Some(media_id) = record.media_id(server) else {
            warn!(server = server, name = %record.name, "Record has no media ID for server, not indexed");
            return false;
        };
        let providers = record.provider_ids(false);

        self.media_map
            .entry(server.to_string())
            .or_default()
            .insert(media_id.to_string(), id);

        if !providers.is_empty() {
            let search = self.provider_search.entry(server.to_string()).or_default();
            for (provider, provider_id) in providers {
                search.entry(provider).or_default().insert(provider_id, id);
            }
        }
        true
    }

    /// Forget `id` on `server`, in both the per-server and provider search index
    pub fn remove_media(&mut self, server: &str, id: RecordId) -> bool {
        let Some(record) = self.arena.get(id) else {
            return false;
        };
        let Some(media_id) = record.media_id(server) else {
            return false;
        };
        let providers = record.provider_ids(false);

        let removed = match self.media_map.get_mut(server) {
            Some(index) if index.get(media_id) == Some(&id) => {
                index.remove(media_id);
                true
            }
            _ => false,
        };

        if let Some(search) = self.provider_search.get_mut(server) {
            for (provider, provider_id) in &providers {
                if let Some(ids) = search.get_mut(provider) {
                    if ids.get(provider_id) == Some(&id) {
                        ids.remove(provider_id);
                    }
                    if ids.is_empty() {
                        search.remove(provider);
                    }
                }
            }
            if search.is_empty() {
                self.provider_search.remove(server);
            }
        }
        removed
    }

    pub fn records(&self) -> &RecordArena {
        &self.arena
    }

    pub fn record(&self, id: RecordId) -> Option<&MediaRecord> {
        self.arena.get(id)
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.media_map.keys().map(String::as_str).collect()
    }

    pub fn media_count(&self, server: &str) -> usize {
        self.media_map.get(server).map_or(0, BTreeMap::len)
    }

    /// Servers other than `server` that currently have provider search data
    pub fn other_servers(&self, server: &str) -> Vec<&str> {
        self.provider_search
            .keys()
            .filter(|name| name.as_str() != server)
            .map(String::as_str)
            .collect()
    }

    /// Servers whose provider search index knows `(provider, provider_id)`
    pub fn servers_with_provider(&self, provider: &str, provider_id: &str) -> Vec<&str> {
        self.provider_search
            .iter()
            .filter(|(_, search)| {
                search
                    .get(provider)
                    .is_some_and(|ids| ids.contains_key(provider_id))
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Collapse duplicates across servers.
    ///
    /// Every unordered pair of servers runs a resolution pass for each side.
    /// A cancelled merge rolls back completely: all indices and records are
    /// dropped and [`MergeError::Cancelled`] is returned.
    #[instrument(skip_all, fields(servers = self.media_map.len()))]
    pub fn merge(&mut self, progress: &Progress) -> Result<MergeStats, MergeError> {
        progress.reset_progress();
        progress.set_title(MERGE_TITLE);
        let total: usize = self.media_map.values().map(BTreeMap::len).sum();
        progress.set_maximum(total as u64 * 3);

        let servers: Vec<String> = self.media_map.keys().cloned().collect();
        let mut stats = MergeStats::default();
        let mut outcome = self.merge_pairs(&servers, progress, &mut stats);
        if outcome.is_ok() && progress.was_canceled() {
            outcome = Err(MergeError::Cancelled);
        }

        self.provider_search.clear();

        match outcome {
            Ok(()) => {
                info!(
                    records = total,
                    passes = stats.passes,
                    replacements = stats.replacements,
                    ambiguous = stats.ambiguous,
                    "Merged media across {} servers",
                    servers.len()
                );
                Ok(stats)
            }
            Err(err) => {
                warn!(visited = stats.records_visited, "Merge cancelled, discarding all media data");
                self.clear();
                Err(err)
            }
        }
    }

    fn merge_pairs(
        &mut self,
        servers: &[String],
        progress: &Progress,
        stats: &mut MergeStats,
    ) -> Result<(), MergeError> {
        for (pos, lhs) in servers.iter().enumerate() {
            if progress.was_canceled() {
                return Err(MergeError::Cancelled);
            }
            for rhs in &servers[pos + 1..] {
                debug!(lhs = %lhs, rhs = %rhs, "Resolving server pair");
                self.resolve_server(lhs, progress, stats)?;
                self.resolve_server(rhs, progress, stats)?;
            }
        }
        Ok(())
    }

    /// One resolution pass over every record indexed under `server`
    fn resolve_server(
        &mut self,
        server: &str,
        progress: &Progress,
        stats: &mut MergeStats,
    ) -> Result<(), MergeError> {
        let entries: Vec<(String, RecordId)> = match self.media_map.get(server) {
            Some(index) => index.iter().map(|(key, id)| (key.clone(), *id)).collect(),
            None => return Ok(()),
        };
        stats.passes += 1;

        let mut queue: Vec<Replacement> = Vec::new();
        for (key, id) in entries {
            progress.inc_progress();
            stats.records_visited += 1;

            let providers = match self.arena.get(id) {
                Some(record) if record.has_provider_ids() => record.provider_ids(false),
                _ => BTreeMap::new(),
            };

            if !providers.is_empty() {
                let mut candidates = self.candidates(server, &providers);
                candidates.remove(&id);
                let mut candidates = candidates.into_iter();
                match (candidates.next(), candidates.next()) {
                    (None, _) => self.propagate(server, &providers, id),
                    (Some(target), None) => queue.push(Replacement {
                        key,
                        source: id,
                        target,
                    }),
                    (Some(_), Some(_)) => {
                        stats.ambiguous += 1;
                        debug!(
                            server = server,
                            record = %id,
                            name = %self.record_name(id),
                            "Provider IDs match several records, leaving record unmerged"
                        );
                    }
                }
            }

            if progress.was_canceled() {
                return Err(MergeError::Cancelled);
            }
        }

        self.apply_replacements(server, queue, stats);
        Ok(())
    }

    fn apply_replacements(&mut self, server: &str, queue: Vec<Replacement>, stats: &mut MergeStats) {
        let chains: HashMap<RecordId, RecordId> =
            queue.iter().map(|r| (r.source, r.target)).collect();

        for replacement in queue {
            let Some(canonical) = follow_chain(&chains, replacement.source, replacement.target)
            else {
                stats.cycles_dropped += 1;
                debug!(
                    server = server,
                    record = %replacement.source,
                    "Replacement chain leads back to its source, skipping"
                );
                continue;
            };

            if let Some(index) = self.media_map.get_mut(server) {
                index.insert(replacement.key, canonical);
            }
            self.arena.absorb(canonical, replacement.source, server);
            self.repoint_search(replacement.source, canonical);
            stats.replacements += 1;
        }
    }

    /// Point every provider search entry that still names `from` at `to`, so
    /// IDs `to` picked up from `from` do not resolve back to the absorbed record
    fn repoint_search(&mut self, from: RecordId, to: RecordId) {
        for search in self.provider_search.values_mut() {
            for ids in search.values_mut() {
                for slot in ids.values_mut() {
                    if *slot == from {
                        *slot = to;
                    }
                }
            }
        }
    }

    /// Every distinct record that one of `providers` resolves to on `server`
    fn candidates(&self, server: &str, providers: &BTreeMap<String, String>) -> BTreeSet<RecordId> {
        let Some(search) = self.provider_search.get(server) else {
            return BTreeSet::new();
        };
        providers
            .iter()
            .filter(|(_, provider_id)| !provider_id.is_empty())
            .filter_map(|(provider, provider_id)| search.get(provider)?.get(provider_id).copied())
            .collect()
    }

    fn unique_match(&self, server: &str, providers: &BTreeMap<String, String>) -> Option<RecordId> {
        let candidates = self.candidates(server, providers);
        if candidates.len() == 1 {
            candidates.into_iter().next()
        } else {
            None
        }
    }

    /// Make `id` findable through `providers` on every other server
    fn propagate(&mut self, server: &str, providers: &BTreeMap<String, String>, id: RecordId) {
        let others: Vec<String> = self
            .other_servers(server)
            .into_iter()
            .map(str::to_string)
            .collect();
        for other in others {
            if self.unique_match(&other, providers) == Some(id) {
                continue;
            }
            trace!(from = server, to = %other, record = %id, "Propagating record identity");
            self.set_media_for_providers(&other, providers, id);
        }
    }

    fn set_media_for_providers(&mut self, server: &str, providers: &BTreeMap<String, String>, id: RecordId) {
        let search = self.provider_search.entry(server.to_string()).or_default();
        for (provider, provider_id) in providers {
            if provider_id.is_empty() {
                continue;
            }
            search
                .entry(provider.clone())
                .or_default()
                .insert(provider_id.clone(), id);
        }
    }

    fn record_name(&self, id: RecordId) -> &str {
        self.arena.get(id).map_or("", |record| record.name.as_str())
    }

    /// Distinct records across all per-server indices, plus the index itself
    pub fn get_merged_data(&self, progress: &Progress) -> MergedMedia {
        let mut records = BTreeSet::new();
        for index in self.media_map.values() {
            for id in index.values() {
                records.insert(*id);
                progress.inc_progress();
            }
        }
        MergedMedia {
            records: records.into_iter().collect(),
            by_server: self.media_map.clone(),
        }
    }

    /// Drop all indexed data and the records behind it
    pub fn clear(&mut self) {
        self.media_map.clear();
        self.provider_search.clear();
        self.arena.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.media_map.is_empty() && self.provider_search.is_empty()
    }

    pub fn has_search_data(&self) -> bool {
        !self.provider_search.is_empty()
    }
}

/// Final record a replacement lands on, or `None` if the chain loops back
fn follow_chain(
    chains: &HashMap<RecordId, RecordId>,
    source: RecordId,
    target: RecordId,
) -> Option<RecordId> {
    let mut seen = HashSet::from([source]);
    let mut current = target;
    while let Some(next) = chains.get(&current) {
        if !seen.insert(current) {
            return None;
        }
        current = *next;
    }
    (current != source).then_some(current)
}
