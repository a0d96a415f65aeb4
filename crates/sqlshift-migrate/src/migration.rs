use std::fmt;
use std::path::Path;
use std::str::FromStr;

use sqlshift_common::{Error, Result};

/// Extension every migration script must carry.
pub const SCRIPT_EXTENSION: &str = "sql";

/// A complete migration: a version, a label and both scripts.
///
/// Migrations are applied in ascending `version` order and reverted in
/// descending order. Only the validator builds these, so a `Migration`
/// always has non-empty `up` and `down` scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    pub up: String,
    pub down: String,
}

/// Which way a script moves the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(Error::UnknownDirection(other.to_string())),
        }
    }
}

/// The parts of a `<version>.<name>.<direction>.sql` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptName<'a> {
    pub version: u32,
    pub name: &'a str,
    pub direction: Direction,
}

impl<'a> ScriptName<'a> {
    /// Parse a file name. `Ok(None)` means the file is not part of the
    /// migration set (wrong extension or wrong number of segments).
    pub fn parse(file_name: &'a str) -> Result<Option<Self>> {
        let is_script = Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext == SCRIPT_EXTENSION);
        if !is_script {
            return Ok(None);
        }

        let parts: Vec<&str> = file_name.split('.').collect();
        let &[version, name, direction, _] = parts.as_slice() else {
            return Ok(None);
        };

        let version = version
            .parse::<u32>()
            .map_err(|source| Error::InvalidVersion {
                file: file_name.to_string(),
                segment: version.to_string(),
                source,
            })?;
        let direction = direction.parse()?;

        Ok(Some(Self {
            version,
            name,
            direction,
        }))
    }

    pub fn file_name(version: u32, name: &str, direction: Direction) -> String {
        format!("{version}.{name}.{direction}.{SCRIPT_EXTENSION}")
    }
}
