//! Atomic one-file-per-record JSON storage.
//!
//! Both file-backed repositories keep each record in its own `<name>.json`
//! inside a capability-scoped directory. Writes go to a uniquely named
//! temporary file which is then renamed over the target, so readers in other
//! processes observe either the previous or the next record, never a torn
//! one.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{ErrorKind, Write};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const RECORD_EXTENSION: &str = "json";

/// Errors raised by [`JsonDirectory`].
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem access failed.
    #[error("storage I/O failed for '{path}': {source}")]
    Io {
        /// Directory or record path involved.
        path: Utf8PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded.
    #[error("record '{record}' is not valid JSON: {source}")]
    Json {
        /// Record name.
        record: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A blocking storage task did not complete.
    #[error("storage task failed: {0}")]
    Task(String),
}

/// A directory of JSON records addressed by name.
#[derive(Debug, Clone)]
pub struct JsonDirectory {
    path: Utf8PathBuf,
    dir: Arc<Dir>,
}

impl JsonDirectory {
    /// Opens `path`, creating it and its parents when missing.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] when the directory cannot be created
    /// or opened.
    pub fn open(path: &Utf8Path) -> Result<Self, PersistenceError> {
        let io_error = |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(path).map_err(io_error)?;
        let dir = Dir::open_ambient_dir(path, ambient_authority()).map_err(io_error)?;
        Ok(Self {
            path: path.to_path_buf(),
            dir: Arc::new(dir),
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Writes `value` as record `name`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when encoding or any filesystem step fails.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), PersistenceError> {
        let target = record_file(name);
        let bytes = encode(name, value)?;
        let temporary = temporary_file(name);
        let written = self.write_temporary(&temporary, &bytes).and_then(|()| {
            self.dir.rename(&temporary, &self.dir, &target)
        });
        if let Err(source) = written {
            if let Err(cleanup) = self.dir.remove_file(&temporary) {
                tracing::debug!(file = %temporary, error = %cleanup, "temporary record not removed");
            }
            return Err(self.io_error(&target, source));
        }
        Ok(())
    }

    /// Writes `value` as record `name` only when no such record exists.
    ///
    /// The record appears complete or not at all. Returns `false` when
    /// another writer already holds the name.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when encoding or any filesystem step fails.
    pub fn write_new<T: Serialize>(&self, name: &str, value: &T) -> Result<bool, PersistenceError> {
        let target = record_file(name);
        let bytes = encode(name, value)?;
        let temporary = temporary_file(name);
        let linked = self
            .write_temporary(&temporary, &bytes)
            .and_then(|()| self.dir.hard_link(&temporary, &self.dir, &target));
        if let Err(cleanup) = self.dir.remove_file(&temporary) {
            tracing::debug!(file = %temporary, error = %cleanup, "temporary record not removed");
        }
        match linked {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(self.io_error(&target, err)),
        }
    }

    /// Reads record `name`, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the record is unreadable or invalid.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, PersistenceError> {
        let target = record_file(name);
        let contents = match self.dir.read_to_string(&target) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(&target, err)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| PersistenceError::Json {
                record: name.to_owned(),
                source,
            })
    }

    /// Deletes record `name`. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] for failures other than absence.
    pub fn remove(&self, name: &str) -> Result<bool, PersistenceError> {
        let target = record_file(name);
        match self.dir.remove_file(&target) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(self.io_error(&target, err)),
        }
    }

    /// Lists the names of all records, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] when the directory cannot be read.
    pub fn names(&self) -> Result<Vec<String>, PersistenceError> {
        let entries = self
            .dir
            .entries()
            .map_err(|err| self.io_error(self.path.as_str(), err))?;
        let mut names = Vec::new();
        for entry in entries {
            let file_name = entry
                .and_then(|found| found.file_name())
                .map_err(|err| self.io_error(self.path.as_str(), err))?;
            if file_name.starts_with('.') {
                continue;
            }
            if let Some(stem) = Utf8Path::new(&file_name)
                .extension()
                .filter(|extension| *extension == RECORD_EXTENSION)
                .and_then(|_| Utf8Path::new(&file_name).file_stem())
            {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Runs a storage closure on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or [`PersistenceError::Task`] when the
    /// blocking task panics or is cancelled.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T, PersistenceError> + Send + 'static,
    {
        let directory = self.clone();
        tokio::task::spawn_blocking(move || operation(&directory))
            .await
            .map_err(|err| PersistenceError::Task(err.to_string()))?
    }

    fn write_temporary(&self, temporary: &str, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = self.dir.create(temporary)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn io_error(&self, file: &str, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.join(file),
            source,
        }
    }
}

fn record_file(name: &str) -> String {
    format!("{name}.{RECORD_EXTENSION}")
}

fn temporary_file(name: &str) -> String {
    format!(".{name}.{}.tmp", Uuid::new_v4().simple())
}

fn encode<T: Serialize>(name: &str, value: &T) -> Result<Vec<u8>, PersistenceError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Json {
        record: name.to_owned(),
        source,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::JsonDirectory;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        port: u16,
    }

    #[fixture]
    fn store() -> (TempDir, JsonDirectory) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().join("records")).expect("utf8 path");
        let directory = JsonDirectory::open(&root).expect("opens");
        (temp, directory)
    }

    #[rstest]
    fn write_then_read_replaces_record(store: (TempDir, JsonDirectory)) {
        let (_temp, directory) = store;
        directory.write("cat", &Record { port: 1 }).expect("first write");
        directory.write("cat", &Record { port: 2 }).expect("second write");

        let record: Option<Record> = directory.read("cat").expect("reads");

        assert_eq!(record, Some(Record { port: 2 }));
        assert_eq!(directory.names().expect("lists"), vec!["cat".to_owned()]);
    }

    #[rstest]
    fn missing_record_reads_as_none(store: (TempDir, JsonDirectory)) {
        let (_temp, directory) = store;
        let record: Option<Record> = directory.read("absent").expect("reads");
        assert!(record.is_none());
        assert!(!directory.remove("absent").expect("removes"));
    }

    #[rstest]
    fn names_skip_temporary_and_foreign_files(store: (TempDir, JsonDirectory)) {
        let (_temp, directory) = store;
        directory.write("b", &Record { port: 2 }).expect("write");
        directory.write("a", &Record { port: 1 }).expect("write");
        std::fs::write(directory.path().join(".a.partial.tmp"), "{").expect("temp");
        std::fs::write(directory.path().join("notes.txt"), "x").expect("foreign");

        assert_eq!(
            directory.names().expect("lists"),
            vec!["a".to_owned(), "b".to_owned()]
        );
    }

    #[rstest]
    fn remove_deletes_record(store: (TempDir, JsonDirectory)) {
        let (_temp, directory) = store;
        directory.write("cat", &Record { port: 1 }).expect("write");

        assert!(directory.remove("cat").expect("removes"));
        assert!(directory.names().expect("lists").is_empty());
    }

    #[rstest]
    fn write_new_refuses_existing_record(store: (TempDir, JsonDirectory)) {
        let (_temp, directory) = store;

        assert!(directory.write_new("cat", &Record { port: 1 }).expect("first claim"));
        assert!(!directory.write_new("cat", &Record { port: 2 }).expect("second claim"));

        let record: Option<Record> = directory.read("cat").expect("reads");
        assert_eq!(record, Some(Record { port: 1 }));
        assert_eq!(directory.names().expect("lists"), vec!["cat".to_owned()]);
    }
}
