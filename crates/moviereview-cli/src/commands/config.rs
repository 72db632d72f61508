use crate::output::Output;
use crate::ConfigCommands;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use review_sync_config::{Config, CredentialStore, PathManager};
use serde_json::json;

pub async fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(output),
        ConfigCommands::Init { force } => init_config(force, output),
    }
}

fn section(title: &str, rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(title).fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn show_config(output: &Output) -> Result<()> {
    let paths = PathManager::new()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to resolve data directories: {}", e))?;
    let config_file = paths.config_file();
    let config = Config::load_or_default(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?;

    let mut credentials = CredentialStore::new(paths.credentials_file());
    credentials
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials: {}", e))?;
    let signed_in = credentials.get_access_token().is_some();

    if !output.is_human() {
        output.json(&json!({
            "config_file": config_file.display().to_string(),
            "config_file_exists": config_file.exists(),
            "reviews_dir": paths.reviews_dir().display().to_string(),
            "signed_in": signed_in,
            "signed_in_at": credentials.get_signed_in_at(),
            "config": config,
        }));
        return Ok(());
    }

    if !config_file.exists() {
        output.info(format!(
            "{} (defaults shown; run 'moviereview config init' to create it)",
            "No config file".yellow()
        ));
    }

    output.table(&section(
        "Files",
        vec![
            ("Config file", config_file.display().to_string()),
            ("Reviews", paths.reviews_dir().display().to_string()),
            ("Logs", paths.log_file().display().to_string()),
        ],
    ));
    output.table(&section(
        "API",
        vec![
            ("Base URL", config.api.base_url.clone()),
            ("Timeout", format!("{}s", config.api.timeout_secs)),
            (
                "Signed in",
                if signed_in { "✓".green().to_string() } else { "✗".red().to_string() },
            ),
        ],
    ));
    output.table(&section(
        "Sync",
        vec![
            ("Max attempts", config.sync.max_attempts.to_string()),
            ("Initial backoff", format!("{}ms", config.sync.initial_backoff_ms)),
            ("Backoff multiplier", config.sync.backoff_multiplier.to_string()),
            ("Max backoff", format!("{}ms", config.sync.max_backoff_ms)),
            ("Concurrent submissions", config.sync.max_concurrent_submissions.to_string()),
            ("Sweep on start", config.sync.sweep_on_start.to_string()),
        ],
    ));
    Ok(())
}

fn init_config(force: bool, output: &Output) -> Result<()> {
    let paths = PathManager::new()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to resolve data directories: {}", e))?;
    let config_file = paths.config_file();

    if config_file.exists() && !force {
        output.warn(format!(
            "Config file already exists at {}. Use --force to overwrite it.",
            config_file.display()
        ));
        return Ok(());
    }

    Config::default()
        .save_to_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to write config to {}: {}", config_file.display(), e))?;
    output.success(format!("Wrote default configuration to {}", config_file.display()));
    Ok(())
}
