use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed job store '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to replace job store '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// One planned graft: which donor glycan goes onto which protein residue.
///
/// `receiving_chain_index` holds the chain identifier and `receiving_res_index` the
/// author residue number; the field names follow the established file layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedGraft {
    pub donor_path: PathBuf,
    #[serde(default)]
    pub glycan_index: usize,
    pub receiving_chain_index: String,
    pub receiving_res_index: isize,
}

/// Paths and planned grafts for one structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub receiver_path: PathBuf,
    pub mtz_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default)]
    pub glycosylations: Vec<PlannedGraft>,
}

/// A keyed JSON store of [`JobRecord`]s, one per structure identifier.
///
/// Every mutation rewrites the whole file through a temporary file in the same
/// directory followed by a rename, so readers never observe a half-written store.
#[derive(Debug)]
pub struct JobStore {
    path: PathBuf,
    records: BTreeMap<String, JobRecord>,
}

impl JobStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&JobRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> &BTreeMap<String, JobRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts or replaces a record and persists the store.
    pub fn upsert(&mut self, id: &str, record: JobRecord) -> Result<(), StoreError> {
        self.records.insert(id.to_string(), record);
        self.persist()
    }

    /// Removes a record and persists the store if it existed.
    pub fn remove(&mut self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        let removed = self.records.remove(id);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = NamedTempFile::new_in(&dir).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut file, &self.records).map_err(|source| {
            StoreError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        file.write_all(b"\n").map_err(io_err)?;
        file.persist(&self.path).map_err(|source| StoreError::Persist {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

/// Append-only list of failed structure identifiers, one `<id>: <reason>` per line.
#[derive(Debug, Clone)]
pub struct FailureJournal {
    path: PathBuf,
}

impl FailureJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, id: &str, reason: impl fmt::Display) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        let reason = reason.to_string().replace('\n', " ");
        writeln!(file, "{id}: {reason}").map_err(io_err)
    }

    /// Reads every recorded failure in file order.
    pub fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let (id, reason) = line.split_once(": ").unwrap_or((line.as_str(), ""));
            entries.push((id.to_string(), reason.to_string()));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(dir: &Path, id: &str) -> JobRecord {
        JobRecord {
            receiver_path: dir.join(format!("{id}.pdb")),
            mtz_path: dir.join(format!("{id}.mtz")),
            output_path: dir.join(format!("out/{id}.pdb")),
            glycosylations: vec![PlannedGraft {
                donor_path: dir.join("Alpha-D-Mannose.pdb"),
                glycan_index: 0,
                receiving_chain_index: "A".into(),
                receiving_res_index: 100,
            }],
        }
    }

    #[test]
    fn missing_store_opens_empty() {
        let dir = tempdir().unwrap();
        let store = JobStore::open(dir.path().join("jobs.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn upsert_and_remove_persist_between_openings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.json");

        let mut store = JobStore::open(&path).unwrap();
        store.upsert("1abc", record(dir.path(), "1abc")).unwrap();
        store.upsert("2xyz", record(dir.path(), "2xyz")).unwrap();
        store.upsert("1abc", record(dir.path(), "1abc-v2")).unwrap();

        let reopened = JobStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(
            reopened.get("1abc").unwrap().receiver_path.ends_with("1abc-v2.pdb")
        );

        let mut store = reopened;
        assert!(store.remove("2xyz").unwrap().is_some());
        assert!(store.remove("missing").unwrap().is_none());
        let keys: Vec<_> = JobStore::open(&path).unwrap().records().keys().cloned().collect();
        assert_eq!(keys, vec!["1abc"]);
    }

    #[test]
    fn reads_records_without_glycosylations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        fs::write(
            &path,
            r#"{"5abc": {"receiver_path": "r.pdb", "mtz_path": "m.mtz", "output_path": "o.pdb"}}"#,
        )
        .unwrap();
        let store = JobStore::open(&path).unwrap();
        assert!(store.get("5abc").unwrap().glycosylations.is_empty());
    }

    #[test]
    fn malformed_store_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JobStore::open(&path), Err(StoreError::Json { .. })));
    }

    #[test]
    fn journal_appends_one_line_per_failure() {
        let dir = tempdir().unwrap();
        let journal = FailureJournal::new(dir.path().join("failed.txt"));
        assert!(journal.entries().unwrap().is_empty());

        journal.append("1abc", "timeout").unwrap();
        journal.append("2xyz", "refinement produced no output\nsecond line").unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(
            entries,
            vec![
                ("1abc".to_string(), "timeout".to_string()),
                (
                    "2xyz".to_string(),
                    "refinement produced no output second line".to_string()
                ),
            ]
        );
    }
}
