use std::path::{Path, PathBuf};

use sqlshift_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// File names looked up in the working directory when no path is given.
const DEFAULT_FILES: [&str; 3] = ["sqlshift.toml", "sqlshift.yml", "sqlshift.yaml"];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path`, or the first default file present in the working
    /// directory, or the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::load_file(path),
            None => match Self::discover(Path::new(".")) {
                Some(found) => Self::load_file(&found),
                None => {
                    debug!("no config file found, using defaults");
                    Ok(AppConfig::default())
                }
            },
        }
    }

    pub fn discover(dir: &Path) -> Option<PathBuf> {
        DEFAULT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let config = Self::parse(path, &contents)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<AppConfig> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn loads_toml_with_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlshift.toml");
        fs::write(
            &path,
            "database = \"app.db\"\n\n[log]\njson = true\n",
        )
        .unwrap();

        let config = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(config.database, PathBuf::from("app.db"));
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.ledger_table, "schema_migration");
        assert!(config.log.json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn loads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlshift.yml");
        fs::write(
            &path,
            "migrations_dir: db/migrations\nledger_table: applied\nlog:\n  level: debug\n",
        )
        .unwrap();

        let config = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.ledger_table, "applied");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlshift.ini");
        fs::write(&path, "database=app.db").unwrap();

        let err = ConfigLoader::load(Some(&path)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: unsupported config extension: ini"
        );
    }

    #[test]
    fn reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlshift.toml");
        fs::write(&path, "database = [").unwrap();

        let err = ConfigLoader::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn discover_prefers_toml() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::discover(dir.path()).is_none());

        fs::write(dir.path().join("sqlshift.yml"), "{}").unwrap();
        fs::write(dir.path().join("sqlshift.toml"), "").unwrap();
        let found = ConfigLoader::discover(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "sqlshift.toml");
    }
}
