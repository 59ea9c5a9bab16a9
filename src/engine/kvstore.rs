// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A minimal durable key-value store.
//!
//! The on-disk form is the SQLite database used by the charm helpers' unit
//! data store: a table `kv(key, data)` in which every value is stored JSON
//! encoded. Values handed out by the store are the decoded strings, so a
//! database written by the charm helpers is read as is and a database
//! written here can be read by them.
//!
//! A store holds an exclusive advisory lock on a sibling lock file from the
//! moment it is opened until it is dropped, so the lock is released on
//! every exit path. Writes are staged in memory and only reach the disk on
//! `flush()`, which commits them in a single transaction. Changes that are
//! not flushed are discarded when the store is dropped.

use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::OsString,
    fmt,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use nix::fcntl::{Flock, FlockArg};
use rusqlite::{params, Connection, OpenFlags};

use crate::swift::{SwiftError, SwiftResult};

pub trait KvStore {
    fn get(&self, key: &str) -> SwiftResult<Option<Vec<u8>>>;
    fn set(&mut self, key: &str, value: &[u8]) -> SwiftResult<()>;
    fn flush(&mut self) -> SwiftResult<()>;
}

/// Hands out stores rooted at one location.
pub trait StoreProvider {
    type Store: KvStore;

    /// Make sure the directory holding the store exists. Returns true if it
    /// already existed, false if it had to be created.
    fn ensure_location(&self) -> SwiftResult<bool>;

    /// Open the store, acquiring it for the lifetime of the returned value.
    fn open(&self) -> SwiftResult<Self::Store>;
}

pub struct FileKvStore {
    path: PathBuf,
    data: BTreeMap<String, String>,
    changed: BTreeSet<String>,
    _lock: Flock<File>,
}

impl fmt::Debug for FileKvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKvStore")
            .field("path", &self.path)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("changed", &self.changed)
            .finish()
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// A value is stored as its JSON encoding. Values that are not JSON strings
/// are handed out in their JSON form.
fn decode_value(data: &str) -> SwiftResult<String> {
    Ok(match serde_json::from_str(data)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Read every entry of the kv table. A database without the table is empty.
fn read_entries(path: &Path) -> SwiftResult<BTreeMap<String, String>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let tables: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv'",
        [],
        |row| row.get(0),
    )?;
    if tables == 0 {
        return Ok(BTreeMap::new());
    }

    let mut stmt = conn.prepare("SELECT key, data FROM kv")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut entries = BTreeMap::new();
    for row in rows {
        let (key, data) = row?;
        let value = decode_value(&data)?;
        entries.insert(key, value);
    }
    Ok(entries)
}

impl FileKvStore {
    /// Open the store at path. The parent directory must exist; the database
    /// file is created on the first flush. A database file that can not be
    /// read is an error, never an empty store.
    pub fn open(path: &Path) -> SwiftResult<FileKvStore> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path(path))?;
        let lock = Flock::lock(lock_file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            SwiftError::Chained(
                format!("Failed to lock store {}", path.display()),
                Box::new(SwiftError::Nix(errno)),
            )
        })?;

        let data = if path.exists() {
            read_entries(path).map_err(|err| {
                SwiftError::Chained(
                    format!("Store {} is unreadable or corrupt", path.display()),
                    Box::new(err),
                )
            })?
        } else {
            BTreeMap::new()
        };

        Ok(FileKvStore {
            path: path.to_owned(),
            data,
            changed: BTreeSet::new(),
            _lock: lock,
        })
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> SwiftResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|v| v.clone().into_bytes()))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> SwiftResult<()> {
        let value = String::from_utf8(value.to_vec())?;
        if self.data.get(key) != Some(&value) {
            self.data.insert(key.to_owned(), value);
            self.changed.insert(key.to_owned());
        }
        Ok(())
    }

    fn flush(&mut self) -> SwiftResult<()> {
        if self.changed.is_empty() {
            return Ok(());
        }
        let mut conn = Connection::open(&self.path)?;
        let tx = conn.transaction()?;
        tx.execute(
            "CREATE TABLE IF NOT EXISTS kv (key text, data text, primary key (key))",
            [],
        )?;
        for key in &self.changed {
            if let Some(value) = self.data.get(key) {
                tx.execute(
                    "INSERT OR REPLACE INTO kv (key, data) VALUES (?1, ?2)",
                    params![key, serde_json::to_string(value)?],
                )?;
            }
        }
        tx.commit()?;
        self.changed.clear();
        Ok(())
    }
}

/// Provides FileKvStores at a fixed path.
#[derive(Clone, Debug)]
pub struct FileStoreProvider {
    path: PathBuf,
}

impl FileStoreProvider {
    pub fn new(path: &Path) -> FileStoreProvider {
        FileStoreProvider {
            path: path.to_owned(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreProvider for FileStoreProvider {
    type Store = FileKvStore;

    fn ensure_location(&self) -> SwiftResult<bool> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                fs::create_dir_all(dir)?;
                info!("Created store directory {}", dir.display());
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    fn open(&self) -> SwiftResult<FileKvStore> {
        FileKvStore::open(&self.path)
    }
}
