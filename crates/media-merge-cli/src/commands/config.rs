use crate::output::{Output, OutputFormat};
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use media_merge_config::{Config, PathManager};
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::{Path, PathBuf};

pub fn run_config(cmd: ConfigCommands, config_path: Option<PathBuf>, output: &Output) -> Result<()> {
    let (paths, config_file) = match config_path {
        Some(path) => {
            let base = path.parent().map(PathBuf::from).unwrap_or_default();
            (PathManager::from_base(base), path)
        }
        None => {
            let paths = PathManager::resolve().map_err(|e| eyre!("{}", e))?;
            let file = paths.config_file();
            (paths, file)
        }
    };

    match cmd {
        ConfigCommands::Show => show_config(&paths, &config_file, output),
        ConfigCommands::Path => {
            match output.format() {
                OutputFormat::Human => println!("{}", config_file.display()),
                OutputFormat::Json | OutputFormat::JsonPretty => output.json(&json!({
                    "config_file": config_file.display().to_string(),
                    "exists": config_file.exists(),
                })),
            }
            Ok(())
        }
    }
}

fn show_config(paths: &PathManager, config_file: &Path, output: &Output) -> Result<()> {
    if !config_file.exists() {
        output.warn(format!("Configuration file not found at: {}", config_file.display()));
        output.info("Defaults are in effect. Add [[servers]] entries with name and snapshot to configure servers.");
    }

    let config = Config::load_or_default(config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    let validation = config.validate();

    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(());
            }

            println!("\n{}", "Configuration".bright_cyan().bold());
            println!();

            let mut info_table = Table::new();
            info_table.set_header(vec![
                Cell::new("Config File").add_attribute(comfy_table::Attribute::Bold),
                Cell::new(config_file.display().to_string()),
            ]);
            info_table.load_preset(comfy_table::presets::UTF8_FULL);
            info_table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
            println!("{}", info_table);
            println!();

            let mut servers_table = Table::new();
            servers_table.set_header(vec![
                Cell::new("Server")
                    .fg(comfy_table::Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Enabled").add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Snapshot").add_attribute(comfy_table::Attribute::Bold),
            ]);
            for server in &config.servers {
                let snapshot = paths.resolve_snapshot(&server.snapshot);
                let snapshot_cell = if snapshot.exists() {
                    Cell::new(snapshot.display().to_string())
                } else {
                    Cell::new(format!("{} (missing)", snapshot.display())).fg(comfy_table::Color::Yellow)
                };
                servers_table.add_row(vec![
                    Cell::new(&server.name),
                    Cell::new(if server.enabled { "✓".green().to_string() } else { "✗".red().to_string() }),
                    snapshot_cell,
                ]);
            }
            servers_table.load_preset(comfy_table::presets::UTF8_FULL);
            servers_table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
            if config.servers.is_empty() {
                println!("{}", "Servers: Not configured".bright_black());
            } else {
                println!("{}", servers_table);
            }
            println!();

            let mut merge_table = Table::new();
            merge_table.set_header(vec![Cell::new("Merge Options")
                .fg(comfy_table::Color::Cyan)
                .add_attribute(comfy_table::Attribute::Bold)]);
            merge_table.add_row(vec![
                Cell::new("Max items per server"),
                Cell::new(
                    config
                        .merge
                        .max_items
                        .map(|max| max.to_string())
                        .unwrap_or_else(|| "unlimited".to_string()),
                ),
            ]);
            merge_table.add_row(vec![
                Cell::new("Report name collisions"),
                Cell::new(if config.merge.report_name_collisions { "✓".green().to_string() } else { "✗".red().to_string() }),
            ]);
            merge_table.load_preset(comfy_table::presets::UTF8_FULL);
            merge_table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
            println!("{}", merge_table);

            if let Err(err) = &validation {
                output.error(format!("Invalid configuration: {}", err));
            }
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&json!({
                "config_file": config_file.display().to_string(),
                "valid": validation.is_ok(),
                "error": validation.as_ref().err().map(|err| err.to_string()),
                "config": config,
            }));
        }
    }
    Ok(())
}
