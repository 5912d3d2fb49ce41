// ── Durable record log ──
//
// Append-only log with dense offsets starting at 0. Backs the gate and
// dedup changelogs. A file-backed log mirrors every append as one JSON
// line and replays the file on open; an in-memory log lives as long as
// the process.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::CoreError;

pub struct DurableLog<T> {
    name: String,
    path: Option<PathBuf>,
    records: RwLock<Vec<Arc<T>>>,
    file: Option<Mutex<File>>,
    /// Offset one past the last record; bumped on every append.
    end_offset: watch::Sender<u64>,
}

impl<T> DurableLog<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn in_memory(name: impl Into<String>) -> Self {
        let (end_offset, _) = watch::channel(0);
        Self {
            name: name.into(),
            path: None,
            records: RwLock::new(Vec::new()),
            file: None,
            end_offset,
        }
    }

    /// Open (or create) a JSON-lines log at `path`, loading existing records.
    ///
    /// A trailing line that does not parse is treated as a torn write and
    /// skipped; corrupt lines elsewhere are skipped with a warning too.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::changelog(&name, e))?;
        }

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(CoreError::changelog(&name, e)),
        };

        let mut records = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(line) {
                Ok(record) => records.push(Arc::new(record)),
                Err(e) => {
                    warn!(log = %name, line = lineno + 1, error = %e, "skipping unreadable changelog line");
                }
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::changelog(&name, e))?;

        // Terminate a torn last line so the next append starts clean.
        if !contents.is_empty() && !contents.ends_with('\n') {
            file.write_all(b"\n")
                .map_err(|e| CoreError::changelog(&name, e))?;
        }

        debug!(log = %name, path = %path.display(), records = records.len(), "opened changelog");

        let (end_offset, _) = watch::channel(records.len() as u64);
        Ok(Self {
            name,
            path: Some(path),
            records: RwLock::new(records),
            file: Some(Mutex::new(file)),
            end_offset,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a record and return its offset. The record is on disk (for
    /// file-backed logs) before this returns.
    pub fn append(&self, record: T) -> Result<u64, CoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(file) = &self.file {
            let mut line =
                serde_json::to_string(&record).map_err(|e| CoreError::changelog(&self.name, e))?;
            line.push('\n');
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            file.write_all(line.as_bytes())
                .and_then(|()| file.flush())
                .map_err(|e| CoreError::changelog(&self.name, e))?;
        }

        let offset = records.len() as u64;
        records.push(Arc::new(record));
        drop(records);

        self.end_offset.send_replace(offset + 1);
        Ok(offset)
    }

    /// Every record from the earliest offset, in order.
    pub fn replay(&self) -> Vec<Arc<T>> {
        self.read_from(0)
    }

    /// Records at `offset` and later.
    pub fn read_from(&self, offset: u64) -> Vec<Arc<T>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(records.len());
        records[start..].to_vec()
    }

    pub fn len(&self) -> u64 {
        *self.end_offset.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record superseded by a later one with the same key,
    /// keeping survivors in their original order. Offsets are renumbered
    /// from 0. A file-backed log is rewritten through a temporary file and
    /// renamed into place. Returns the number of records removed.
    pub fn compact<K: Ord>(&self, key: impl Fn(&T) -> K) -> Result<usize, CoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        let mut last_index = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            last_index.insert(key(&**record), index);
        }
        let removed = records.len() - last_index.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut keep: Vec<usize> = last_index.into_values().collect();
        keep.sort_unstable();
        let survivors: Vec<Arc<T>> = keep
            .into_iter()
            .filter_map(|index| records.get(index).cloned())
            .collect();

        if let (Some(path), Some(file)) = (&self.path, &self.file) {
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            *file = self.rewrite(path, &survivors)?;
        }

        *records = survivors;
        let len = records.len() as u64;
        drop(records);

        self.end_offset.send_replace(len);
        debug!(log = %self.name, removed, kept = len, "compacted changelog");
        Ok(removed)
    }

    // Write `records` to a sibling temp file, swap it in, and return an
    // append handle on the new file.
    fn rewrite(&self, path: &Path, records: &[Arc<T>]) -> Result<File, CoreError> {
        let err = |e: &dyn std::fmt::Display| CoreError::changelog(&self.name, e);

        let mut contents = String::new();
        for record in records {
            contents.push_str(&serde_json::to_string(&**record).map_err(|e| err(&e))?);
            contents.push('\n');
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".compact");
        let tmp = PathBuf::from(tmp);
        {
            let mut out = File::create(&tmp).map_err(|e| err(&e))?;
            out.write_all(contents.as_bytes())
                .and_then(|()| out.sync_all())
                .map_err(|e| err(&e))?;
        }
        fs::rename(&tmp, path).map_err(|e| err(&e))?;

        OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| err(&e))
    }

    /// Watch the end offset (one past the last appended record).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.end_offset.subscribe()
    }
}
