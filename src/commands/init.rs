//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::StateDb;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

impl InitOptions {
    /// Resolve where to initialize from an optional `--config` argument.
    ///
    /// A path ending in `.toml` names the config file; anything else names
    /// the directory that will hold it.
    pub fn from_config_arg(config: Option<PathBuf>, force: bool) -> Self {
        let (base_dir, config_path) = match config {
            Some(path) if path.extension().is_some_and(|e| e == "toml") => {
                let base = path
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(Config::default_base_dir);
                (base, path)
            }
            Some(dir) => (dir.clone(), dir.join("config.toml")),
            None => {
                let base = Config::default_base_dir();
                (base.clone(), base.join("config.toml"))
            }
        };

        Self {
            base_dir,
            config_path,
            force,
        }
    }
}

/// Where init put things
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub config_path: String,
    pub db_path: String,
}

/// Write a default configuration and create the state database
pub async fn cmd_init(options: InitOptions) -> Result<InitReport> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.paths.config_file = config_path.clone();
    config.paths.db_file = config_path
        .parent()
        .map(|p| p.join("state.db"))
        .unwrap_or_else(|| base_dir.join("state.db"));
    config.paths.base_dir = base_dir;

    config.validate()?;
    config.save()?;

    let db = StateDb::connect(&config).await?;
    if !db.is_initialized().await? {
        db.init_schema().await?;
    }
    info!("Created state database at {:?}", config.paths.db_file);

    Ok(InitReport {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
    })
}

pub fn print_init_report(report: &InitReport) {
    println!("✓ readwise-notion-sync initialized");
    println!("  Config: {}", report.config_path);
    println!("  State: {}", report.db_path);
    println!("\nNext steps:");
    println!("  1. Export READWISE_TOKEN, NOTION_TOKEN and NOTION_DATABASE_ID");
    println!("  2. Check property names under [notion.properties] in the config");
    println!("  3. Run: readwise-notion-sync sync --days 7");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_state() {
        let tmp = TempDir::new().unwrap();
        let options = InitOptions::from_config_arg(Some(tmp.path().to_path_buf()), false);

        let report = cmd_init(options).await.unwrap();

        let config_path = tmp.path().join("config.toml");
        assert!(config_path.exists());
        assert!(tmp.path().join("state.db").exists());
        assert_eq!(report.config_path, config_path.display().to_string());

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded.notion.properties.external_id, "Readwise ID");
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(&path, "[sync]\nrespect_deletions = true\n").unwrap();

        let err = cmd_init(InitOptions::from_config_arg(Some(path.clone()), false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        cmd_init(InitOptions::from_config_arg(Some(path.clone()), true))
            .await
            .unwrap();
        let loaded = Config::load(&path).unwrap();
        assert!(!loaded.sync.respect_deletions);
    }
}
