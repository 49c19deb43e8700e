//! Local directory cache store.
//!
//! Every entry is a single file in the configured directory, named by the
//! BLAKE3 hash of its cache key. The file starts with one line of JSON (the
//! entry header: key, status, headers, write time) followed by the raw body.
//! Writes go to a temporary file first and are renamed into place, so
//! readers only ever see a complete entry.

use super::EntryInfoStream;
use crate::error::{ErrorKind, Result};
use crate::models::{EntryInfo, StoredResponse};
use crate::CacheStore;
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use time::UtcDateTime;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};

const ENTRY_EXTENSION: &str = "entry";
const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    key: String,
    status: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    stored_at: i64,
}

/// Local directory cache store.
///
/// # Examples
///
/// ```no_run
/// use swcache_store::store::LocalStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalStore::new("local", "/var/cache/swcache")?;
/// # Ok(())
/// # }
/// ```
pub struct LocalStore {
    name: String,
    /// Directory holding one file per entry
    root: PathBuf,
    /// Distinguishes concurrent temporary files for the same key
    sequence: AtomicU64,
}

impl LocalStore {
    /// Create a new local directory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, exists but is not a
    /// directory, or cannot be created.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidRoot(root));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(ErrorKind::Io)?;
        }
        Ok(Self {
            name: name.into(),
            root,
            sequence: AtomicU64::new(0),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = blake3::hash(key.as_bytes());
        self.root.join(format!("{}.{ENTRY_EXTENSION}", hash.to_hex()))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let hash = blake3::hash(key.as_bytes());
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!("{}.{}.{sequence}.{TEMP_EXTENSION}", hash.to_hex(), std::process::id()))
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    fn encode(key: &str, response: &StoredResponse) -> Result<Vec<u8>> {
        let header = EntryHeader {
            key: key.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            stored_at: UtcDateTime::now().unix_timestamp(),
        };
        // Compact JSON never contains a raw newline, which makes it a safe
        // header terminator.
        let mut bytes = serde_json::to_vec(&header).or_raise(|| ErrorKind::Serialize)?;
        bytes.push(b'\n');
        bytes.extend_from_slice(&response.body);
        Ok(bytes)
    }

    fn decode(path: &Path, bytes: Vec<u8>) -> Result<(EntryHeader, Vec<u8>)> {
        let corrupt = || ErrorKind::Corrupt(path.display().to_string());
        let Some(split) = bytes.iter().position(|b| *b == b'\n') else {
            exn::bail!(corrupt());
        };
        let header: EntryHeader = serde_json::from_slice(&bytes[..split]).or_raise(corrupt)?;
        Ok((header, bytes[split + 1..].to_vec()))
    }

    /// Read only the header line and derive the body size from the file length.
    async fn read_info(path: &Path) -> Result<EntryInfo> {
        let corrupt = || ErrorKind::Corrupt(path.display().to_string());
        let file = fs::File::open(path).await.map_err(ErrorKind::Io)?;
        let length = file.metadata().await.map_err(ErrorKind::Io)?.len();
        let mut line = String::new();
        let read = BufReader::new(file).read_line(&mut line).await.map_err(ErrorKind::Io)?;
        if !line.ends_with('\n') {
            exn::bail!(corrupt());
        }
        let header: EntryHeader = serde_json::from_str(line.trim_end()).or_raise(corrupt)?;
        let stored_at = UtcDateTime::from_unix_timestamp(header.stored_at).or_raise(corrupt)?;
        Ok(EntryInfo::new(header.key, length.saturating_sub(read as u64), stored_at))
    }

    fn is_entry(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
    }

    fn is_temp(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == TEMP_EXTENSION)
    }
}

#[async_trait]
impl CacheStore for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn keys_stream(&self) -> EntryInfoStream<'_> {
        Box::pin(stream! {
            let mut entries = match fs::read_dir(&self.root).await {
                Ok(entries) => entries,
                // A root removed from under us holds no entries.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
                Err(err) => {
                    yield Err(exn::Exn::from(ErrorKind::Io(err)));
                    return;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(exn::Exn::from(ErrorKind::Io(err)));
                        continue;
                    }
                };
                let path = entry.path();
                if !Self::is_entry(&path) {
                    continue;
                }
                match Self::read_info(&path).await {
                    Ok(info) => yield Ok(info),
                    // Deleted between listing and reading.
                    Err(err) if matches!(&*err, ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound) => {},
                    Err(err) => yield Err(err),
                }
            }
        })
    }

    async fn get(&self, key: &str) -> Result<Option<StoredResponse>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => exn::bail!(Self::map_io_error(err, key)),
        };
        let (header, body) = Self::decode(&path, bytes)?;
        if header.key != key {
            tracing::warn!(key, stored = %header.key, "Cache entry hash collision, treating as a miss");
            return Ok(None);
        }
        Ok(Some(StoredResponse::new(header.status, header.headers, body)))
    }

    async fn put(&self, key: &str, response: StoredResponse) -> Result<()> {
        let bytes = Self::encode(key, &response)?;
        let temp = self.temp_path(key);
        fs::write(&temp, bytes).await.map_err(|e| Self::map_io_error(e, key))?;
        if let Err(err) = fs::rename(&temp, self.entry_path(key)).await {
            _ = fs::remove_file(&temp).await;
            exn::bail!(Self::map_io_error(err, key));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => exn::bail!(Self::map_io_error(err, key)),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.root).await.map_err(ErrorKind::Io)?;
        while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
            let path = entry.path();
            if !Self::is_entry(&path) && !Self::is_temp(&path) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {},
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
                Err(err) => exn::bail!(ErrorKind::Io(err)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new("local", temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalStore::new("name", temp_dir.path()).is_ok());
        assert!(LocalStore::new("name", "relative/path").is_err());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        let err = LocalStore::new("name", &file).err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (_dir, store) = store();
        let response = StoredResponse::new(
            200,
            vec![("content-type".to_string(), "text/html".to_string())],
            "<html>\n<body></body>\n</html>",
        );
        store.put("https://example.com/", response.clone()).await.unwrap();
        assert_eq!(store.get("https://example.com/").await.unwrap(), Some(response));
        assert_eq!(store.get("https://example.com/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites_and_leaves_no_temp_files() {
        let (dir, store) = store();
        store.put("https://example.com/a.js", StoredResponse::ok("one")).await.unwrap();
        store.put("https://example.com/a.js", StoredResponse::ok("two")).await.unwrap();
        assert_eq!(store.get("https://example.com/a.js").await.unwrap().unwrap().body, b"two");
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn test_keys_lists_entries_with_body_size() {
        let (_dir, store) = store();
        store.put("https://example.com/a.css", StoredResponse::ok("12345")).await.unwrap();
        store.put("https://example.com/b.css", StoredResponse::ok("")).await.unwrap();
        let mut keys = store.keys().await.unwrap();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].key, "https://example.com/a.css");
        assert_eq!(keys[0].size, 5);
        assert_eq!(keys[1].size, 0);
    }

    #[tokio::test]
    async fn test_keys_skips_foreign_files() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("README"), b"not an entry").unwrap();
        store.put("https://example.com/", StoredResponse::ok("x")).await.unwrap();
        assert_eq!(store.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_reported() {
        let (_dir, store) = store();
        std::fs::write(store.entry_path("https://example.com/"), b"garbage without header").unwrap();
        let err = store.get("https://example.com/").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, store) = store();
        store.put("https://example.com/", StoredResponse::ok("x")).await.unwrap();
        assert!(store.delete("https://example.com/").await.unwrap());
        assert!(!store.delete("https://example.com/").await.unwrap());
        assert!(store.get("https://example.com/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_keeps_root() {
        let (dir, store) = store();
        store.put("https://example.com/a", StoredResponse::ok("a")).await.unwrap();
        store.put("https://example.com/b", StoredResponse::ok("b")).await.unwrap();
        store.clear().await.unwrap();
        assert!(dir.path().is_dir());
        assert!(store.keys().await.unwrap().is_empty());
    }
}
