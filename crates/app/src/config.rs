use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DB_FILE: &str = "tally.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. Defaults to `tally.db` in the data directory.
    pub database: Option<PathBuf>,
    /// Source label for imports whose table has no source column.
    pub default_source: Option<String>,
}

impl Config {
    /// `--db` beats the config file, which beats the data directory default.
    pub fn database_path(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = override_path {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        Ok(data_dir()?.join(DB_FILE))
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse config.toml")
    }
}

pub fn data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "tally", "Tally")
        .context("no home directory to place Tally data in")?;
    let dir = dirs.data_dir().to_path_buf();
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Config::from_toml(&s)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_file_is_accepted() {
        let cfg = Config::from_toml("default_source = \"Chase Visa\"\n").unwrap();
        assert_eq!(cfg.default_source.as_deref(), Some("Chase Visa"));
        assert!(cfg.database.is_none());
    }

    #[test]
    fn flag_overrides_configured_database() {
        let cfg = Config {
            database: Some(PathBuf::from("/srv/ledger.db")),
            default_source: None,
        };
        let path = cfg.database_path(Some(Path::new("other.db"))).unwrap();
        assert_eq!(path, PathBuf::from("other.db"));
        assert_eq!(cfg.database_path(None).unwrap(), PathBuf::from("/srv/ledger.db"));
    }
}
