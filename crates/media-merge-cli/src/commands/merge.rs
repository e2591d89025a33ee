use super::merge_ui::MergeUI;
use crate::output::{Output, OutputFormat};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use comfy_table::{Cell, Color, Table};
use media_merge_config::{Config, PathManager};
use media_merge_core::{
    CancelToken, Cancellable, MergeError, MergeMedia, MergeReport, MergeStats, MergedMedia, Progress,
};
use media_merge_models::{MediaRecord, NameKeyCache, ServerSnapshot, SyncStatus};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LOAD_TITLE: &str = "Loading snapshots";

pub struct MergeArgs {
    pub config_path: Option<PathBuf>,
    pub snapshots: Vec<(String, PathBuf)>,
    pub max_items: Option<usize>,
    pub list_items: bool,
    pub skip_name_collisions: bool,
}

/// `NAME=PATH` for `--snapshot`
pub fn parse_snapshot_arg(arg: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("Expected NAME=PATH, got '{}'", arg))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("Server name must not be empty".to_string());
    }
    if path.trim().is_empty() {
        return Err(format!("Snapshot path for '{}' must not be empty", name));
    }
    Ok((name.to_string(), PathBuf::from(path.trim())))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ServerSource {
    name: String,
    snapshot: PathBuf,
}

/// Enabled servers from the config, then command line snapshots replacing
/// or extending them by name
fn collect_sources(
    config: &Config,
    paths: &PathManager,
    overrides: Vec<(String, PathBuf)>,
) -> Vec<ServerSource> {
    let mut sources: Vec<ServerSource> = config
        .enabled_servers()
        .map(|server| ServerSource {
            name: server.name.trim().to_string(),
            snapshot: paths.resolve_snapshot(&server.snapshot),
        })
        .collect();

    for (name, snapshot) in overrides {
        match sources.iter_mut().find(|source| source.name == name) {
            Some(source) => source.snapshot = snapshot,
            None => sources.push(ServerSource { name, snapshot }),
        }
    }
    sources
}

#[derive(Debug, Clone, Default, Serialize)]
struct LoadCounts {
    loaded: usize,
    skipped: usize,
}

struct MergeRun {
    engine: MergeMedia,
    merged: MergedMedia,
    stats: MergeStats,
    loads: BTreeMap<String, LoadCounts>,
}

fn load_server(
    engine: &mut MergeMedia,
    source: &ServerSource,
    max_items: Option<usize>,
    progress: &Progress,
) -> Result<LoadCounts> {
    let snapshot = ServerSnapshot::from_path(&source.snapshot)
        .wrap_err_with(|| format!("Failed to load snapshot for server {}", source.name))?;
    let limit = max_items.map_or(snapshot.len(), |max| max.min(snapshot.len()));

    progress.reset_progress();
    progress.set_title(&format!("Loading {}", source.name));
    progress.set_maximum(limit as u64);

    let mut counts = LoadCounts::default();
    for item in snapshot.items.iter().take(limit) {
        if progress.was_canceled() {
            return Err(MergeError::Cancelled.into());
        }
        let record = MediaRecord::from_item(item, &source.name);
        if record.media_id(&source.name).is_some() {
            engine.ingest(&source.name, record);
            counts.loaded += 1;
        } else {
            counts.skipped += 1;
        }
        progress.inc_progress();
    }

    tracing::debug!(
        server = %source.name,
        loaded = counts.loaded,
        skipped = counts.skipped,
        "Loaded snapshot"
    );
    Ok(counts)
}

/// Load every snapshot, each in its own nested progress phase, then merge
fn load_and_merge(
    sources: &[ServerSource],
    max_items: Option<usize>,
    progress: &mut Progress,
) -> Result<MergeRun> {
    let mut engine = MergeMedia::new();
    let mut loads = BTreeMap::new();

    progress.reset_progress();
    progress.set_title(LOAD_TITLE);
    progress.set_maximum(sources.len() as u64);

    for source in sources {
        if progress.was_canceled() {
            engine.clear();
            return Err(MergeError::Cancelled.into());
        }
        progress.push_state();
        let result = load_server(&mut engine, source, max_items, progress);
        progress.pop_state();
        match result {
            Ok(counts) => {
                loads.insert(source.name.clone(), counts);
            }
            Err(err) => {
                engine.clear();
                return Err(err);
            }
        }
        progress.inc_progress();
    }

    let stats = engine.merge(progress)?;
    let merged = engine.get_merged_data(progress);
    Ok(MergeRun {
        engine,
        merged,
        stats,
        loads,
    })
}

fn is_cancelled(err: &color_eyre::Report) -> bool {
    matches!(err.downcast_ref::<MergeError>(), Some(MergeError::Cancelled))
}

pub async fn run_merge(args: MergeArgs, output: &Output) -> Result<()> {
    tracing::debug!("Merge command started");

    let (paths, config_file) = match &args.config_path {
        Some(path) => {
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (PathManager::from_base(base), path.clone())
        }
        None => {
            let paths = PathManager::resolve().map_err(|e| eyre!("{}", e))?;
            let file = paths.config_file();
            (paths, file)
        }
    };
    let config = Config::load_or_default(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config
        .validate()
        .wrap_err_with(|| format!("Invalid configuration in {}", config_file.display()))?;

    let sources = collect_sources(&config, &paths, args.snapshots);
    if sources.is_empty() {
        output.warn(format!(
            "No servers to merge. Add [[servers]] to {} or pass --snapshot NAME=PATH.",
            config_file.display()
        ));
        return Ok(());
    }
    let max_items = args.max_items.or(config.merge.max_items);
    let report_collisions = config.merge.report_name_collisions && !args.skip_name_collisions;

    let token = CancelToken::new();
    let watcher = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling merge");
                token.cancel();
            }
        })
    };

    let ui = MergeUI::new(!output.is_quiet() && output.format() == OutputFormat::Human);
    let bar = ui.bar();
    let worker = tokio::task::spawn_blocking(move || {
        let mut progress = Progress::new(Cancellable::new(ui, token));
        load_and_merge(&sources, max_items, &mut progress)
    });
    let result = worker.await.wrap_err("Merge worker failed")?;
    watcher.abort();
    bar.finish_and_clear();

    let run = match result {
        Ok(run) => run,
        Err(err) if is_cancelled(&err) => {
            output.warn("Merge cancelled, no results kept");
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let mut report = MergeReport::build(&run.engine, &run.merged);
    if report_collisions {
        let mut names = NameKeyCache::new();
        report = report.with_name_collisions(&run.engine, &run.merged, &mut names);
    }

    match output.format() {
        OutputFormat::Human => print_human(&run, &report, args.list_items, output),
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let mut result = json!({
                "success": true,
                "servers": run.loads,
                "stats": run.stats,
                "report": report,
            });
            if args.list_items {
                result["items"] = json!(item_rows(&run));
            }
            output.json(&result);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ItemRow {
    name: String,
    media_type: String,
    providers: BTreeMap<String, String>,
    /// server -> media ID
    servers: BTreeMap<String, String>,
    status: SyncStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stale: Vec<String>,
}

fn item_rows(run: &MergeRun) -> Vec<ItemRow> {
    run.merged
        .records
        .iter()
        .filter_map(|id| run.engine.record(*id))
        .map(|record| ItemRow {
            name: record.name.clone(),
            media_type: record.media_type.to_string(),
            providers: record.provider_ids(false),
            servers: record
                .servers
                .iter()
                .filter(|(_, state)| state.is_valid())
                .map(|(server, state)| (server.clone(), state.media_id.clone()))
                .collect(),
            status: record.sync_status(),
            stale: record
                .servers
                .keys()
                .filter(|server| record.needs_updating(server))
                .cloned()
                .collect(),
        })
        .collect()
}

fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::NoServerPairs => "single server",
        SyncStatus::Equal => "in sync",
        SyncStatus::NeedsUpdating => "needs updating",
    }
}

fn status_color(status: SyncStatus) -> Color {
    match status {
        SyncStatus::NoServerPairs => Color::DarkGrey,
        SyncStatus::Equal => Color::Green,
        SyncStatus::NeedsUpdating => Color::Yellow,
    }
}

fn print_human(run: &MergeRun, report: &MergeReport, list_items: bool, output: &Output) {
    if output.is_quiet() {
        return;
    }

    let mut servers_table = Table::new();
    servers_table.set_header(vec![
        Cell::new("Server").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Items").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Skipped").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Records").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Stale").add_attribute(comfy_table::Attribute::Bold),
    ]);
    servers_table.load_preset(comfy_table::presets::UTF8_FULL);
    servers_table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    for (server, counts) in &run.loads {
        let stale = report.stale_per_server.get(server).copied().unwrap_or(0);
        let stale_cell = if stale > 0 {
            Cell::new(stale).fg(Color::Yellow)
        } else {
            Cell::new(stale)
        };
        servers_table.add_row(vec![
            Cell::new(server),
            Cell::new(counts.loaded),
            Cell::new(counts.skipped),
            Cell::new(report.per_server.get(server).copied().unwrap_or(0)),
            stale_cell,
        ]);
    }
    println!("{}", servers_table);
    println!();

    if list_items {
        let mut items_table = Table::new();
        items_table.set_header(vec![
            Cell::new("Name").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Type").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Providers").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Servers").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Status").add_attribute(comfy_table::Attribute::Bold),
        ]);
        items_table.load_preset(comfy_table::presets::UTF8_FULL);
        items_table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
        for row in item_rows(run) {
            let providers = row
                .providers
                .iter()
                .map(|(provider, id)| format!("{}={}", provider, id))
                .collect::<Vec<_>>()
                .join(", ");
            let servers = row.servers.keys().cloned().collect::<Vec<_>>().join(", ");
            let status = if row.stale.is_empty() {
                status_label(row.status).to_string()
            } else {
                format!("{} ({})", status_label(row.status), row.stale.join(", "))
            };
            items_table.add_row(vec![
                Cell::new(&row.name),
                Cell::new(&row.media_type),
                Cell::new(providers),
                Cell::new(servers),
                Cell::new(status).fg(status_color(row.status)),
            ]);
        }
        println!("{}", items_table);
        println!();
    }

    println!(
        "{} records: {} merged, {} {}, {} {}, {} {}",
        report.total.bold(),
        report.merged,
        report.equal.green(),
        status_label(SyncStatus::Equal),
        report.needs_updating.yellow(),
        status_label(SyncStatus::NeedsUpdating),
        report.single_server.dimmed(),
        status_label(SyncStatus::NoServerPairs),
    );

    if run.stats.ambiguous > 0 {
        output.warn(format!(
            "{} records matched more than one candidate and were left unmerged (run with -v for details)",
            run.stats.ambiguous
        ));
    }
    if run.stats.cycles_dropped > 0 {
        output.warn(format!("{} circular replacements were dropped", run.stats.cycles_dropped));
    }
    for collision in &report.name_collisions {
        let year = collision.year.map(|y| format!(" ({})", y)).unwrap_or_default();
        output.warn(format!(
            "'{}'{} exists on {} without a shared provider ID",
            collision.key,
            year,
            collision.servers.join(", ")
        ));
    }

    output.success(format!(
        "Merged {} items from {} servers in {} passes",
        run.loads.values().map(|counts| counts.loaded).sum::<usize>(),
        run.loads.len(),
        run.stats.passes
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_merge_config::{MergeOptions, ServerConfig};
    use std::fs;
    use tempfile::TempDir;

    fn write_snapshot(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    const DEN: &str = r#"{"Items": [
        {"Id": "101", "Name": "Heat", "Type": "Movie", "ProductionYear": 1995,
         "ProviderIds": {"Imdb": "tt0113277"},
         "UserData": {"Played": true, "PlayCount": 1, "LastPlayedDate": "2024-05-01T20:00:00.000Z"}},
        {"Id": "102", "Name": "Alien", "Type": "Movie", "ProviderIds": {"Imdb": "tt0078748"}},
        {"Name": "No id", "Type": "Movie"}
    ]}"#;

    const ATTIC: &str = r#"[
        {"Id": "202", "Name": "Heat", "Type": "Movie", "ProviderIds": {"Imdb": "tt0113277"}},
        {"Id": "203", "Name": "Ronin", "Type": "Movie", "ProviderIds": {"Tmdb": "8195"}}
    ]"#;

    #[test]
    fn test_parse_snapshot_arg() {
        assert_eq!(
            parse_snapshot_arg("den=/data/den.json"),
            Ok(("den".to_string(), PathBuf::from("/data/den.json")))
        );
        assert!(parse_snapshot_arg("den").is_err());
        assert!(parse_snapshot_arg("=den.json").is_err());
        assert!(parse_snapshot_arg("den=").is_err());
    }

    #[test]
    fn test_collect_sources_overrides_by_name() {
        let config = Config {
            servers: vec![
                ServerConfig {
                    name: "den".to_string(),
                    enabled: true,
                    snapshot: PathBuf::from("den.json"),
                },
                ServerConfig {
                    name: "attic".to_string(),
                    enabled: false,
                    snapshot: PathBuf::from("attic.json"),
                },
            ],
            merge: MergeOptions::default(),
        };
        let paths = PathManager::from_base("/srv/mediamerge");
        let sources = collect_sources(
            &config,
            &paths,
            vec![
                ("den".to_string(), PathBuf::from("/tmp/den.json")),
                ("loft".to_string(), PathBuf::from("loft.json")),
            ],
        );

        assert_eq!(
            sources,
            vec![
                ServerSource {
                    name: "den".to_string(),
                    snapshot: PathBuf::from("/tmp/den.json"),
                },
                ServerSource {
                    name: "loft".to_string(),
                    snapshot: PathBuf::from("loft.json"),
                },
            ]
        );
    }

    #[test]
    fn test_load_and_merge_snapshots() {
        let dir = TempDir::new().unwrap();
        let sources = vec![
            ServerSource {
                name: "den".to_string(),
                snapshot: write_snapshot(dir.path(), "den.json", DEN),
            },
            ServerSource {
                name: "attic".to_string(),
                snapshot: write_snapshot(dir.path(), "attic.json", ATTIC),
            },
        ];

        let mut progress = Progress::headless();
        let run = load_and_merge(&sources, None, &mut progress).unwrap();

        assert_eq!(run.loads["den"].loaded, 2);
        assert_eq!(run.loads["den"].skipped, 1);
        assert_eq!(run.loads["attic"].loaded, 2);
        assert_eq!(run.merged.len(), 3);
        assert_eq!(progress.depth(), 0);

        let heat = run.merged.record_for("attic", "202").unwrap();
        assert_eq!(run.merged.record_for("den", "101"), Some(heat));
        let rows = item_rows(&run);
        let heat_row = rows.iter().find(|row| row.name == "Heat").unwrap();
        assert_eq!(heat_row.status, SyncStatus::NeedsUpdating);
        assert_eq!(heat_row.stale, vec!["attic".to_string()]);
    }

    #[test]
    fn test_max_items_limits_each_snapshot() {
        let dir = TempDir::new().unwrap();
        let sources = vec![ServerSource {
            name: "den".to_string(),
            snapshot: write_snapshot(dir.path(), "den.json", DEN),
        }];

        let mut progress = Progress::headless();
        let run = load_and_merge(&sources, Some(1), &mut progress).unwrap();
        assert_eq!(run.loads["den"].loaded, 1);
        assert_eq!(run.merged.len(), 1);
    }

    #[test]
    fn test_cancelled_load_keeps_nothing() {
        let dir = TempDir::new().unwrap();
        let sources = vec![ServerSource {
            name: "den".to_string(),
            snapshot: write_snapshot(dir.path(), "den.json", DEN),
        }];
        let token = CancelToken::new();
        token.cancel();

        let mut progress = Progress::new(Cancellable::new(media_merge_core::NoopSink, token));
        let err = load_and_merge(&sources, None, &mut progress).err().unwrap();
        assert!(is_cancelled(&err));
        assert_eq!(progress.depth(), 0);
    }

    #[test]
    fn test_missing_snapshot_names_server() {
        let dir = TempDir::new().unwrap();
        let sources = vec![ServerSource {
            name: "den".to_string(),
            snapshot: dir.path().join("missing.json"),
        }];

        let mut progress = Progress::headless();
        let err = load_and_merge(&sources, None, &mut progress).err().unwrap();
        assert!(!is_cancelled(&err));
        assert!(err.to_string().contains("den"));
    }
}
