use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use kandle_core::FcpError;
use kandle_core::schema::OPEN_TIME;
use polars::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::key::CacheKey;

const ARROW_MAGIC: &[u8; 6] = b"ARROW1";
const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// Checks applied by [`ArrowCache::validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Reject files smaller than this many bytes.
    pub min_size_bytes: u64,
    /// Reject files older than this (mtime-based TTL).
    pub max_age: Option<Duration>,
    /// Verify the file digest against this lowercase hex SHA-256.
    pub expected_sha256: Option<String>,
    /// Open the file and check the schema carries `open_time`.
    pub check_schema: bool,
}

/// Daily Arrow IPC cache rooted at a directory.
///
/// Writers stage into a sibling temp file, fsync, and rename into place;
/// two concurrent writers of the same day both succeed and the late rename
/// clobbers an equivalent file byte-for-byte, never partially.
#[derive(Debug, Clone)]
pub struct ArrowCache {
    root: PathBuf,
}

impl ArrowCache {
    /// A cache rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the file for a key.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Whether a non-empty file exists for the key.
    #[must_use]
    pub fn exists(&self, key: &CacheKey) -> bool {
        fs::metadata(self.path_for(key)).is_ok_and(|m| m.is_file() && m.len() > 0)
    }

    /// Lazily scan the file for a key, sniffing the format from magic bytes.
    ///
    /// Returns `None` on any I/O or decode problem; the failure is logged and
    /// the entry behaves as a miss. The read path never deletes.
    #[must_use]
    pub fn scan(&self, key: &CacheKey) -> Option<LazyFrame> {
        let path = self.path_for(key);
        match scan_file(&path) {
            Ok(lf) => Some(lf),
            Err(err) => {
                if path.exists() {
                    warn!(path = %path.display(), error = %err, "unreadable cache file, treating as miss");
                }
                None
            }
        }
    }

    /// Read and materialize the frame for a key.
    ///
    /// `None` on miss or on any decode error (logged, recoverable).
    #[must_use]
    pub fn read(&self, key: &CacheKey) -> Option<DataFrame> {
        let lf = self.scan(key)?;
        match lf.collect() {
            Ok(df) if df.height() > 0 => Some(df),
            Ok(_) => {
                warn!(path = %self.path_for(key).display(), "empty cache file, treating as miss");
                None
            }
            Err(err) => {
                warn!(
                    path = %self.path_for(key).display(),
                    error = %err,
                    "corrupt cache file, treating as miss"
                );
                None
            }
        }
    }

    /// Persist a frame for a key, atomically.
    ///
    /// Empty frames never create files and return `Ok(None)`.
    ///
    /// # Errors
    /// Returns `FcpError::CacheInvalid` when the tree or file cannot be
    /// written.
    pub fn write(&self, key: &CacheKey, df: &mut DataFrame) -> Result<Option<PathBuf>, FcpError> {
        if df.height() == 0 {
            debug!(key = ?key.relative_path(), "skipping cache write of empty frame");
            return Ok(None);
        }

        let path = self.path_for(key);
        let parent = path
            .parent()
            .ok_or_else(|| cache_err(&path, "path has no parent directory"))?;
        fs::create_dir_all(parent).map_err(|e| cache_err(parent, e))?;

        if path.exists() {
            // Benign same-day race: the late writer clobbers an equivalent file.
            debug!(path = %path.display(), "overwriting existing cache file");
        }

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| cache_err(parent, e))?;
        IpcWriter::new(&mut tmp)
            .finish(df)
            .map_err(|e| cache_err(&path, e))?;
        tmp.as_file().sync_all().map_err(|e| cache_err(&path, e))?;
        tmp.persist(&path).map_err(|e| cache_err(&path, e))?;

        debug!(path = %path.display(), rows = df.height(), "cache file written");
        Ok(Some(path))
    }

    /// Days with a cached file for the key's series, sorted ascending.
    #[must_use]
    pub fn list_days(&self, key: &CacheKey) -> Vec<NaiveDate> {
        let dir = self.root.join(key.series_dir());
        let Ok(entries) = fs::read_dir(&dir) else {
            return vec![];
        };
        let mut days: Vec<NaiveDate> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                let stem = name.strip_suffix(".arrow").or_else(|| name.strip_suffix(".parquet"))?;
                stem.parse::<NaiveDate>().ok()
            })
            .collect();
        days.sort_unstable();
        days
    }

    /// Validate the file for a key against the given checks.
    ///
    /// # Errors
    /// Returns `FcpError::CacheInvalid` naming the first failed check.
    pub fn validate(&self, key: &CacheKey, opts: &ValidateOptions) -> Result<(), FcpError> {
        let path = self.path_for(key);
        let meta = fs::metadata(&path).map_err(|_| cache_err(&path, "file does not exist"))?;
        if !meta.is_file() {
            return Err(cache_err(&path, "not a regular file"));
        }
        if meta.len() < opts.min_size_bytes {
            return Err(cache_err(
                &path,
                format!("size {} below minimum {}", meta.len(), opts.min_size_bytes),
            ));
        }
        if let Some(max_age) = opts.max_age {
            let age = meta
                .modified()
                .ok()
                .and_then(|mtime| mtime.elapsed().ok())
                .unwrap_or(Duration::ZERO);
            if age > max_age {
                return Err(cache_err(
                    &path,
                    format!("age {}s exceeds ttl {}s", age.as_secs(), max_age.as_secs()),
                ));
            }
        }
        if let Some(expected) = &opts.expected_sha256 {
            let actual = file_sha256(&path).map_err(|e| cache_err(&path, e))?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(cache_err(
                    &path,
                    format!("sha256 mismatch: expected {expected}, got {actual}"),
                ));
            }
        }
        if opts.check_schema {
            let mut lf = scan_file(&path).map_err(|e| cache_err(&path, e))?;
            let schema = lf.collect_schema().map_err(|e| cache_err(&path, e))?;
            if !schema.contains(OPEN_TIME) {
                return Err(cache_err(&path, "schema lacks open_time"));
            }
        }
        Ok(())
    }
}

fn cache_err(path: &Path, reason: impl ToString) -> FcpError {
    FcpError::CacheInvalid {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Sniff the first bytes and pick a scanner. Extension is not trusted:
/// legacy trees carry Parquet bytes under `.arrow` names.
fn scan_file(path: &Path) -> Result<LazyFrame, FcpError> {
    let mut file = File::open(path).map_err(|e| cache_err(path, e))?;
    let mut magic = [0u8; 6];
    file.read_exact(&mut magic).map_err(|e| cache_err(path, e))?;
    drop(file);

    let path_str = path.display().to_string();
    if &magic == ARROW_MAGIC {
        return Ok(LazyFrame::scan_ipc(
            path_str.as_str().into(),
            ScanArgsIpc::default(),
        )?);
    }
    if &magic[..4] == PARQUET_MAGIC {
        debug!(path = %path.display(), "legacy parquet cache file");
        return Ok(LazyFrame::scan_parquet(
            path_str.as_str().into(),
            ScanArgsParquet::default(),
        )?);
    }
    Err(cache_err(path, "unrecognized magic bytes"))
}

fn file_sha256(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}
