use std::fs;
use std::path::{Path, PathBuf};

use sqlshift_common::{Error, Result};
use tracing::info;

use crate::migration::{Direction, ScriptName};
use crate::scanner::{ScanOutcome, scan};

/// Create an empty `up`/`down` script pair for `name` in `dir`, numbered one
/// above the highest version already present. Returns both paths.
pub fn scaffold(dir: &Path, name: &str) -> Result<(PathBuf, PathBuf)> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(Error::InvalidName(name.to_string()));
    }

    fs::create_dir_all(dir)?;

    let version = match scan(dir)? {
        ScanOutcome::Empty => 1,
        ScanOutcome::Found(pairs) => match pairs.last_key_value() {
            Some((&latest, _)) => latest.checked_add(1).ok_or_else(|| {
                Error::Config(format!("no version left after {latest}"))
            })?,
            None => 1,
        },
    };

    let up = dir.join(ScriptName::file_name(version, name, Direction::Up));
    let down = dir.join(ScriptName::file_name(version, name, Direction::Down));
    fs::write(&up, template(version, name, Direction::Up))?;
    fs::write(&down, template(version, name, Direction::Down))?;

    info!("created migration {version} '{name}'");
    Ok((up, down))
}

fn template(version: u32, name: &str, direction: Direction) -> String {
    let hint = match direction {
        Direction::Up => "Add your schema changes here",
        Direction::Down => "Undo the up script here",
    };
    format!("-- Migration {version}: {name} ({direction})\n-- {hint}\n")
}
