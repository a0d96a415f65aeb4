//! Discovers migration scripts in a directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sqlshift_common::{Error, Result};
use tracing::{debug, warn};

use crate::migration::{Direction, ScriptName};

/// One script file as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub file: String,
    pub sql: String,
}

/// Both halves of a version, as far as the scan got. Either side may still
/// be missing; the validator decides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptPair {
    pub name: String,
    pub up: Option<Script>,
    pub down: Option<Script>,
}

impl ScriptPair {
    fn slot(&mut self, direction: Direction) -> &mut Option<Script> {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }
}

#[derive(Debug)]
pub enum ScanOutcome {
    /// The directory has no entries at all.
    Empty,
    /// Scripts grouped by version. May be empty if the directory only holds
    /// unrelated files.
    Found(BTreeMap<u32, ScriptPair>),
}

/// Read `dir` and group every `<version>.<name>.<up|down>.sql` file by
/// version. Unrelated files are skipped; a malformed version or direction
/// is an error.
pub fn scan(dir: &Path) -> Result<ScanOutcome> {
    let scan_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| Error::Scan { path, source }
    };

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    let mut entry_count = 0usize;
    for entry in fs::read_dir(dir).map_err(scan_err(dir))? {
        let entry = entry.map_err(scan_err(dir))?;
        entry_count += 1;

        // fs::metadata follows symlinks, so linked scripts count as files
        let path = entry.path();
        if !fs::metadata(&path).map_err(scan_err(&path))?.is_file() {
            debug!("skipping non-file entry {}", path.display());
            continue;
        }
        match entry.file_name().into_string() {
            Ok(file_name) => files.push((file_name, path)),
            Err(raw) => debug!("skipping non UTF-8 file name {raw:?}"),
        }
    }

    if entry_count == 0 {
        return Ok(ScanOutcome::Empty);
    }

    // read_dir order is platform dependent
    files.sort();

    let mut pairs: BTreeMap<u32, ScriptPair> = BTreeMap::new();
    for (file_name, path) in files {
        let Some(script_name) = ScriptName::parse(&file_name)? else {
            debug!("ignoring {file_name}: not a migration script");
            continue;
        };
        let (version, direction) = (script_name.version, script_name.direction);
        let name = script_name.name.to_string();

        let sql = fs::read_to_string(&path).map_err(scan_err(&path))?;
        let pair = pairs.entry(version).or_default();

        if let Some(existing) = pair.slot(direction) {
            return Err(Error::DuplicateScript {
                version,
                direction: direction.as_str(),
                first: existing.file.clone(),
                second: file_name,
            });
        }

        if !pair.name.is_empty() && pair.name != name {
            warn!(
                "version {version} has scripts named '{}' and '{name}'; the up script's name is kept",
                pair.name
            );
        }
        if pair.name.is_empty() || direction == Direction::Up {
            pair.name = name;
        }

        debug!("found {direction} script {file_name}");
        *pair.slot(direction) = Some(Script {
            file: file_name,
            sql,
        });
    }

    Ok(ScanOutcome::Found(pairs))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(dir: &Path, file: &str, sql: &str) {
        fs::write(dir.join(file), sql).unwrap();
    }

    fn found(outcome: ScanOutcome) -> BTreeMap<u32, ScriptPair> {
        match outcome {
            ScanOutcome::Found(pairs) => pairs,
            ScanOutcome::Empty => panic!("expected scripts, directory reported empty"),
        }
    }

    #[test]
    fn empty_directory_is_reported_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(scan(dir.path()).unwrap(), ScanOutcome::Empty));
    }

    #[test]
    fn groups_scripts_by_version() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.create.up.sql", "CREATE TABLE a (x INT);");
        write(dir.path(), "1.create.down.sql", "DROP TABLE a;");
        write(dir.path(), "2.addcol.up.sql", "ALTER TABLE a ADD COLUMN y INT;");

        let pairs = found(scan(dir.path()).unwrap());
        assert_eq!(pairs.len(), 2);

        let first = &pairs[&1];
        assert_eq!(first.name, "create");
        assert_eq!(first.up.as_ref().unwrap().sql, "CREATE TABLE a (x INT);");
        assert_eq!(first.down.as_ref().unwrap().file, "1.create.down.sql");

        let second = &pairs[&2];
        assert_eq!(second.name, "addcol");
        assert!(second.down.is_none());
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "readme.txt", "docs");
        write(dir.path(), "seed.sql", "INSERT INTO a VALUES (1);");
        write(dir.path(), "1.create.up.sql", "CREATE TABLE a (x INT);");
        write(dir.path(), "1.create.down.sql", "DROP TABLE a;");
        fs::create_dir(dir.path().join("2.nested.up.sql")).unwrap();

        let pairs = found(scan(dir.path()).unwrap());
        assert_eq!(pairs.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn only_unrelated_files_yields_no_scripts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "readme.txt", "docs");

        assert!(found(scan(dir.path()).unwrap()).is_empty());
    }

    #[test]
    fn invalid_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "first.create.up.sql", "SELECT 1;");

        let err = scan(dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }

    #[test]
    fn unknown_direction_names_the_token() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.create.forward.sql", "SELECT 1;");

        let err = scan(dir.path()).unwrap_err();
        assert!(matches!(&err, Error::UnknownDirection(token) if token == "forward"));
    }

    #[test]
    fn duplicate_direction_for_one_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.a.up.sql", "SELECT 1;");
        write(dir.path(), "1.b.up.sql", "SELECT 2;");

        let err = scan(dir.path()).unwrap_err();
        match err {
            Error::DuplicateScript {
                version,
                direction,
                first,
                second,
            } => {
                assert_eq!(version, 1);
                assert_eq!(direction, "up");
                assert_eq!(first, "1.a.up.sql");
                assert_eq!(second, "1.b.up.sql");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn forward_script_name_wins_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.alpha.down.sql", "DROP TABLE a;");
        write(dir.path(), "1.beta.up.sql", "CREATE TABLE a (x INT);");

        let pairs = found(scan(dir.path()).unwrap());
        assert_eq!(pairs[&1].name, "beta");
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_scripts() {
        use std::os::unix::fs::symlink;

        // mounted config volumes expose files as links into a data directory
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("..2026_10_19");
        fs::create_dir(&data).unwrap();
        write(&data, "1.create.up.sql", "CREATE TABLE a (x INT);");
        write(&data, "1.create.down.sql", "DROP TABLE a;");
        symlink(&data, dir.path().join("..data")).unwrap();
        for file in ["1.create.up.sql", "1.create.down.sql"] {
            symlink(Path::new("..data").join(file), dir.path().join(file)).unwrap();
        }

        let pairs = found(scan(dir.path()).unwrap());
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[&1];
        assert_eq!(pair.name, "create");
        assert_eq!(pair.up.as_ref().unwrap().sql, "CREATE TABLE a (x INT);");
        assert_eq!(pair.down.as_ref().unwrap().sql, "DROP TABLE a;");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_script_link_is_a_scan_error() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("1.create.up.sql");
        std::os::unix::fs::symlink(dir.path().join("gone.sql"), &link).unwrap();

        match scan(dir.path()).unwrap_err() {
            Error::Scan { path, .. } => assert_eq!(path, link),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_directory_is_a_scan_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = scan(&missing).unwrap_err();
        match err {
            Error::Scan { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }
}
