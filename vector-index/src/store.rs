//! JSONL-persisted vector store.
//!
//! Layout: one [`EmbeddingRecord`] per line, keyed by `repository/branch`
//! scope. Properties:
//! - **Append-safe**: upserts append; on load, the last line for an id
//!   wins. Malformed lines are skipped with a `warn!`.
//! - **Snapshot reads**: a run loads the file once; later writers do not
//!   affect it.
//! - **Single writer**: writers create `<path>.lock` exclusively; readers
//!   never lock.
//! - **Degraded, not dead**: a missing or unreadable store behaves as an
//!   empty one and flags `degraded` so cross-repo analysis is disabled
//!   rather than aborting the run.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::embed::cosine;
use crate::errors::StoreError;
use crate::record::EmbeddingRecord;

/// Optional constraints for [`VectorStore::query_top_k`].
#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    pub repository: Option<String>,
    pub branch: Option<String>,
    /// Exclude records from this file (a PR symbol must not match itself).
    pub exclude_file: Option<String>,
}

impl StoreFilter {
    fn accepts(&self, r: &EmbeddingRecord) -> bool {
        if let Some(repo) = &self.repository {
            if &r.repository != repo {
                return false;
            }
        }
        if let Some(branch) = &self.branch {
            if &r.branch != branch {
                return false;
            }
        }
        if let Some(excluded) = &self.exclude_file {
            if &r.file == excluded {
                return false;
            }
        }
        true
    }
}

/// Exclusive writer lease; the lock file disappears on drop.
#[derive(Debug)]
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(store_path: &Path) -> Result<Self, StoreError> {
        let path = lock_path(store_path);
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                let _ = writeln!(f, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::Locked(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut os = store_path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

/// Snapshot of the store plus (for writers) the append handle state.
#[derive(Debug)]
pub struct VectorStore {
    path: PathBuf,
    records: Vec<EmbeddingRecord>,
    by_id: HashMap<String, usize>,
    /// Dimension fixed by the first loaded/inserted record.
    dim: Option<usize>,
    lock: Option<StoreLock>,
    degraded: bool,
}

impl VectorStore {
    /// Opens a read-only snapshot. Never fails: missing or corrupt data
    /// yields an empty store with `degraded()` set (when the file existed
    /// but could not be read).
    pub fn open_read(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut store = Self {
            path: path.clone(),
            records: Vec::new(),
            by_id: HashMap::new(),
            dim: None,
            lock: None,
            degraded: false,
        };
        store.load_snapshot();
        store
    }

    /// Opens the store for writing: takes the exclusive lock, then loads
    /// the snapshot.
    pub fn open_write(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let lock = StoreLock::acquire(&path)?;
        let mut store = Self {
            path: path.clone(),
            records: Vec::new(),
            by_id: HashMap::new(),
            dim: None,
            lock: Some(lock),
            degraded: false,
        };
        store.load_snapshot();
        Ok(store)
    }

    fn load_snapshot(&mut self) {
        if !self.path.exists() {
            debug!("vector store {} absent, starting empty", self.path.display());
            return;
        }
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    "vector store {} unreadable ({e}); treating as empty",
                    self.path.display()
                );
                self.degraded = true;
                return;
            }
        };
        let reader = BufReader::new(file);
        let mut skipped = 0usize;
        for (i, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("vector store read stopped at line {} ({e})", i + 1);
                    self.degraded = true;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EmbeddingRecord>(&line) {
                Ok(r) => self.insert_in_memory(r),
                Err(e) => {
                    skipped += 1;
                    warn!("skipping malformed store line {}: {e}", i + 1);
                }
            }
        }
        if skipped > 0 {
            self.degraded = true;
        }
        info!(
            "vector store loaded: {} records from {} (skipped {})",
            self.records.len(),
            self.path.display(),
            skipped
        );
    }

    /// Last write wins for a given id; the dimension is pinned by the first
    /// record seen.
    fn insert_in_memory(&mut self, r: EmbeddingRecord) {
        if let Some(want) = self.dim {
            if r.vector.len() != want {
                warn!(
                    "dropping record {} with dim {} (store dim {})",
                    r.id,
                    r.vector.len(),
                    want
                );
                return;
            }
        } else {
            self.dim = Some(r.vector.len());
        }
        match self.by_id.get(&r.id) {
            Some(&idx) => self.records[idx] = r,
            None => {
                self.by_id.insert(r.id.clone(), self.records.len());
                self.records.push(r);
            }
        }
    }

    /// Appends (or replaces) records. Rejects mixed dimensions up front.
    pub fn upsert(&mut self, batch: Vec<EmbeddingRecord>) -> Result<usize, StoreError> {
        if self.lock.is_none() {
            return Err(StoreError::Locked(
                "store was opened read-only".to_string(),
            ));
        }
        if batch.is_empty() {
            return Ok(0);
        }
        let want = self.dim.unwrap_or(batch[0].vector.len());
        for r in &batch {
            if r.vector.len() != want {
                return Err(StoreError::DimMismatch {
                    got: r.vector.len(),
                    want,
                });
            }
        }

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let count = batch.len();
        for r in batch {
            let line = serde_json::to_string(&r)?;
            writeln!(file, "{line}")?;
            self.insert_in_memory(r);
        }
        file.flush()?;
        debug!("upserted {count} records into {}", self.path.display());
        Ok(count)
    }

    /// Removes every record of a `(repository, branch)` scope and compacts
    /// the file. Re-indexing calls this first, which makes `index`
    /// idempotent per scope.
    pub fn clear_scope(&mut self, repository: &str, branch: &str) -> Result<usize, StoreError> {
        if self.lock.is_none() {
            return Err(StoreError::Locked(
                "store was opened read-only".to_string(),
            ));
        }
        let before = self.records.len();
        self.records
            .retain(|r| !(r.repository == repository && r.branch == branch));
        self.by_id = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        if self.records.is_empty() {
            self.dim = None;
        }
        self.rewrite()?;
        Ok(before - self.records.len())
    }

    /// Compacts the file to the in-memory state via temp-file + rename.
    fn rewrite(&self) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("jsonl.tmp");
        if let Some(dir) = tmp.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        {
            let mut file = File::create(&tmp)?;
            for r in &self.records {
                let line = serde_json::to_string(r)?;
                writeln!(file, "{line}")?;
            }
            file.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Top-k most similar records by cosine, above-zero scores only,
    /// ordered by descending score then lexicographic file path.
    pub fn query_top_k(
        &self,
        vector: &[f32],
        k: usize,
        filter: &StoreFilter,
    ) -> Vec<(&EmbeddingRecord, f32)> {
        let mut scored: Vec<(&EmbeddingRecord, f32)> = self
            .records
            .iter()
            .filter(|r| filter.accepts(r))
            .map(|r| (r, cosine(vector, &r.vector)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.file.cmp(&b.0.file))
        });
        scored.truncate(k);
        scored
    }

    /// All records of one file (any scope unless filtered by the caller).
    pub fn get_by_file(&self, file: &str) -> Vec<&EmbeddingRecord> {
        self.records.iter().filter(|r| r.file == file).collect()
    }

    /// Records of one scope.
    pub fn scope(&self, repository: &str, branch: &str) -> Vec<&EmbeddingRecord> {
        self.records
            .iter()
            .filter(|r| r.repository == repository && r.branch == branch)
            .collect()
    }

    /// Every record in the snapshot.
    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when the persisted data was missing pieces or unreadable.
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_symbols::{
        Language, ParseQuality, Signature, Symbol, SymbolKind, Visibility,
    };
    use std::io::Write as _;

    fn symbol(name: &str, file: &str) -> Symbol {
        Symbol {
            file: file.into(),
            language: Language::Java,
            kind: SymbolKind::Method,
            name: name.into(),
            qualified_name: name.into(),
            signature: Signature {
                name: name.into(),
                parameters: vec![],
                return_type: None,
                visibility: Visibility::Public,
                modifiers: vec![],
                text: format!("public void {name}()"),
            },
            body: format!("public void {name}() {{}}"),
            start_line: 1,
            end_line: 1,
            calls: vec![],
            parse_quality: ParseQuality::Full,
        }
    }

    fn record(name: &str, file: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord::from_symbol("acme/app", "main", &symbol(name, file), vector, 1000)
    }

    #[test]
    fn upsert_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");

        {
            let mut store = VectorStore::open_write(&path).unwrap();
            store
                .upsert(vec![
                    record("a", "A.java", vec![1.0, 0.0]),
                    record("b", "B.java", vec![0.0, 1.0]),
                ])
                .unwrap();
        }

        let reloaded = VectorStore::open_read(&path);
        assert_eq!(reloaded.len(), 2);
        assert!(!reloaded.degraded());
    }

    #[test]
    fn duplicate_ids_keep_last_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");

        let mut store = VectorStore::open_write(&path).unwrap();
        store.upsert(vec![record("a", "A.java", vec![1.0, 0.0])]).unwrap();
        store.upsert(vec![record("a", "A.java", vec![0.0, 1.0])]).unwrap();
        drop(store);

        let reloaded = VectorStore::open_read(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.records()[0].vector, vec![0.0, 1.0]);
    }

    #[test]
    fn malformed_lines_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");

        {
            let mut store = VectorStore::open_write(&path).unwrap();
            store.upsert(vec![record("a", "A.java", vec![1.0, 0.0])]).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "{{ this is not json").unwrap();
        }

        let reloaded = VectorStore::open_read(&path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.degraded());
    }

    #[test]
    fn missing_store_is_empty_not_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_read(dir.path().join("nope.jsonl"));
        assert!(store.is_empty());
        assert!(!store.degraded());
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");
        let mut store = VectorStore::open_write(&path).unwrap();
        store.upsert(vec![record("a", "A.java", vec![1.0, 0.0])]).unwrap();
        let err = store
            .upsert(vec![record("b", "B.java", vec![1.0, 0.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, StoreError::DimMismatch { got: 3, want: 2 }));
    }

    #[test]
    fn clear_scope_is_idempotent_reindex_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");
        let mut store = VectorStore::open_write(&path).unwrap();
        store.upsert(vec![record("a", "A.java", vec![1.0, 0.0])]).unwrap();

        let removed = store.clear_scope("acme/app", "main").unwrap();
        assert_eq!(removed, 1);
        store.upsert(vec![record("a", "A.java", vec![1.0, 0.0])]).unwrap();
        drop(store);

        let reloaded = VectorStore::open_read(&path);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn top_k_ordering_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");
        let mut store = VectorStore::open_write(&path).unwrap();
        store
            .upsert(vec![
                record("exact", "B.java", vec![1.0, 0.0]),
                record("close", "C.java", vec![0.9, 0.1]),
                record("self", "A.java", vec![1.0, 0.0]),
            ])
            .unwrap();

        let filter = StoreFilter {
            exclude_file: Some("A.java".into()),
            ..Default::default()
        };
        let hits = store.query_top_k(&[1.0, 0.0], 2, &filter);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.name, "exact");
        assert!(hits[0].1 > hits[1].1);
        assert!(hits.iter().all(|(r, _)| r.file != "A.java"));
    }

    #[test]
    fn second_writer_is_locked_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");
        let _first = VectorStore::open_write(&path).unwrap();
        let second = VectorStore::open_write(&path);
        assert!(matches!(second, Err(StoreError::Locked(_))));
    }
}
