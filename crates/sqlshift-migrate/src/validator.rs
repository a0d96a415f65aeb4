use std::collections::BTreeMap;

use sqlshift_common::{Error, ErrorList, Result};

use crate::migration::{Direction, Migration};
use crate::scanner::{Script, ScriptPair};

/// Turn scanned pairs into complete migrations, ascending by version.
///
/// Every missing or blank script is reported, not just the first one, so
/// the whole set can be fixed in one go. Nothing is returned unless every
/// pair is complete.
pub fn validate(pairs: BTreeMap<u32, ScriptPair>) -> Result<Vec<Migration>> {
    let mut errors = ErrorList::new();
    let mut migrations = Vec::with_capacity(pairs.len());

    for (version, pair) in pairs {
        let up = usable(pair.up);
        let down = usable(pair.down);

        if up.is_none() {
            errors.push(missing(version, &pair.name, Direction::Up));
        }
        if down.is_none() {
            errors.push(missing(version, &pair.name, Direction::Down));
        }

        if let (Some(up), Some(down)) = (up, down) {
            migrations.push(Migration {
                version,
                name: pair.name,
                up,
                down,
            });
        }
    }

    errors.into_result()?;
    migrations.sort_by_key(|m| m.version);
    Ok(migrations)
}

fn usable(script: Option<Script>) -> Option<String> {
    script
        .map(|script| script.sql)
        .filter(|sql| !sql.trim().is_empty())
}

fn missing(version: u32, name: &str, direction: Direction) -> Error {
    Error::MissingScript {
        version,
        name: name.to_string(),
        direction: direction.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(file: &str, sql: &str) -> Option<Script> {
        Some(Script {
            file: file.to_string(),
            sql: sql.to_string(),
        })
    }

    fn pair(name: &str, up: Option<Script>, down: Option<Script>) -> ScriptPair {
        ScriptPair {
            name: name.to_string(),
            up,
            down,
        }
    }

    #[test]
    fn complete_pairs_become_ordered_migrations() {
        let mut pairs = BTreeMap::new();
        pairs.insert(
            2,
            pair(
                "addcol",
                script("2.addcol.up.sql", "ALTER TABLE a ADD COLUMN y INT;"),
                script("2.addcol.down.sql", "ALTER TABLE a DROP COLUMN y;"),
            ),
        );
        pairs.insert(
            1,
            pair(
                "create",
                script("1.create.up.sql", "CREATE TABLE a (x INT);"),
                script("1.create.down.sql", "DROP TABLE a;"),
            ),
        );

        let migrations = validate(pairs).unwrap();
        let versions: Vec<u32> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(migrations[0].down, "DROP TABLE a;");
    }

    #[test]
    fn missing_down_script_names_the_migration() {
        let mut pairs = BTreeMap::new();
        pairs.insert(5, pair("init", script("5.init.up.sql", "SELECT 1;"), None));

        let err = validate(pairs).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to find 'down' script for 'init' (version 5)"
        );
    }

    #[test]
    fn every_missing_script_is_reported() {
        let mut pairs = BTreeMap::new();
        pairs.insert(1, pair("a", script("1.a.up.sql", "SELECT 1;"), None));
        pairs.insert(2, pair("b", None, script("2.b.down.sql", "SELECT 1;")));
        pairs.insert(
            3,
            pair(
                "c",
                script("3.c.up.sql", "SELECT 1;"),
                script("3.c.down.sql", "SELECT 1;"),
            ),
        );

        let err = validate(pairs).unwrap_err();
        let parts = err.flatten();
        assert_eq!(parts.len(), 2);
        assert!(matches!(
            parts[0],
            Error::MissingScript { version: 1, direction: "down", .. }
        ));
        assert!(matches!(
            parts[1],
            Error::MissingScript { version: 2, direction: "up", .. }
        ));
    }

    #[test]
    fn blank_script_counts_as_missing() {
        let mut pairs = BTreeMap::new();
        pairs.insert(
            1,
            pair(
                "empty",
                script("1.empty.up.sql", "   \n"),
                script("1.empty.down.sql", ""),
            ),
        );

        let err = validate(pairs).unwrap_err();
        assert_eq!(err.flatten().len(), 2);
    }

    #[test]
    fn no_pairs_is_valid() {
        assert!(validate(BTreeMap::new()).unwrap().is_empty());
    }
}
