use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read migrations from '{}': {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid version '{segment}' in '{file}': {source}")]
    InvalidVersion {
        file: String,
        segment: String,
        #[source]
        source: ParseIntError,
    },

    #[error("unrecognized script type: '{0}'")]
    UnknownDirection(String),

    #[error("duplicate '{direction}' script for version {version}: '{first}' and '{second}'")]
    DuplicateScript {
        version: u32,
        direction: &'static str,
        first: String,
        second: String,
    },

    #[error("failed to find '{direction}' script for '{name}' (version {version})")]
    MissingScript {
        version: u32,
        name: String,
        direction: &'static str,
    },

    #[error("invalid migration name '{0}': use letters, digits, '_' or '-'")]
    InvalidName(String),

    #[error("failed running migration {version} '{name}': {source}")]
    Apply {
        version: u32,
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("failed reverting migration {version} '{name}': {source}")]
    Revert {
        version: u32,
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Multiple(ErrorList),
}

impl Error {
    /// Combine two errors into one aggregate, flattening any existing lists.
    pub fn join(first: Error, second: Error) -> Error {
        let mut list = ErrorList::new();
        list.push(first);
        list.push(second);
        Error::Multiple(list)
    }

    /// The individual failures carried by this error: the members of a
    /// `Multiple`, or the error itself.
    pub fn flatten(&self) -> Vec<&Error> {
        match self {
            Error::Multiple(list) => list.iter().collect(),
            other => vec![other],
        }
    }
}

/// Ordered collection of independent failures.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: Error) {
        match error {
            Error::Multiple(nested) => self.0.extend(nested.0),
            other => self.0.push(other),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Error> {
        self.0
    }

    /// `Ok(())` when nothing was collected, the lone error when exactly one
    /// was, otherwise `Error::Multiple`.
    pub fn into_result(mut self) -> Result<()> {
        match self.0.len() {
            0 => Ok(()),
            1 => Err(self.0.remove(0)),
            _ => Err(Error::Multiple(self)),
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl IntoIterator for ErrorList {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
