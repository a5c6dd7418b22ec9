//! Account registry persistence.
//!
//! The registry is a pretty-printed JSON array of
//! `{ "user_address": ..., "data": "0x<key>" }` records. Every write goes to
//! a uniquely named staging file in the same directory, which is fsynced and
//! renamed over the registry, so the registry path only ever holds a complete
//! document. Read-modify-write cycles hold an exclusive lock on a sibling
//! `.lock` file, which serializes writers across processes.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::keystore::{KeystoreError, KeystoreResult};

/// One persisted account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// External user identifier.
    pub user_address: String,
    /// Hex-encoded private key.
    pub data: String,
}

impl std::fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRecord")
            .field("user_address", &self.user_address)
            .finish_non_exhaustive()
    }
}

/// Exclusive hold on the registry, shared by every process using the file.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RegistryLock {
    file: std::fs::File,
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Handle on the registry file and its lock file.
#[derive(Debug, Clone)]
pub struct RegistryFile {
    path: PathBuf,
    lock_path: PathBuf,
}

impl RegistryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = file_name(&path).to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File locked by [`lock`](Self::lock).
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Block until no other handle, in this or any process, holds the lock.
    pub async fn lock(&self) -> KeystoreResult<RegistryLock> {
        self.ensure_dir().await?;

        let lock_path = self.lock_path.clone();
        let opened = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let mut options = std::fs::OpenOptions::new();
            options.create(true).read(true).write(true).truncate(false);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let file = options.open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await;

        let file = flatten(opened).map_err(|e| self.io_error(&self.lock_path, e))?;
        Ok(RegistryLock { file })
    }

    /// Read all records. A missing or blank file is an empty registry.
    pub async fn load(&self) -> KeystoreResult<Vec<AccountRecord>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| KeystoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Atomically replace the registry with `records`.
    ///
    /// Callers that derive `records` from [`load`](Self::load) must hold the
    /// [`lock`](Self::lock) across both calls.
    pub async fn store(&self, records: &[AccountRecord]) -> KeystoreResult<()> {
        let dir = self.ensure_dir().await?;

        let bytes = serde_json::to_vec_pretty(records).map_err(|source| KeystoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;

        let path = self.path.clone();
        let mut prefix = OsStr::new(".").to_os_string();
        prefix.push(file_name(&self.path));
        prefix.push(".");

        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut staged = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                staged
                    .as_file()
                    .set_permissions(std::fs::Permissions::from_mode(0o600))?;
            }
            staged.write_all(&bytes)?;
            staged.as_file().sync_all()?;
            staged.persist(&path).map_err(|e| e.error)?;

            // Persist the rename itself; not all platforms allow opening a directory.
            if let Ok(dir) = std::fs::File::open(&dir) {
                let _ = dir.sync_all();
            }
            Ok(())
        })
        .await;

        flatten(written).map_err(|e| self.io_error(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "Registry written");
        Ok(())
    }

    /// Create the registry's directory and return it.
    async fn ensure_dir(&self) -> KeystoreResult<PathBuf> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| self.io_error(&dir, e))?;
        Ok(dir)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> KeystoreError {
        KeystoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

fn file_name(path: &Path) -> &OsStr {
    path.file_name().unwrap_or_else(|| OsStr::new("wallet.json"))
}

fn flatten<T>(
    joined: Result<std::io::Result<T>, tokio::task::JoinError>,
) -> std::io::Result<T> {
    joined.map_err(std::io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn record(user: &str, n: u8) -> AccountRecord {
        AccountRecord {
            user_address: user.to_string(),
            data: format!("0x{}", hex_byte(n).repeat(32)),
        }
    }

    fn hex_byte(n: u8) -> String {
        format!("{:02x}", n)
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryFile::new(dir.path().join("wallet.json"));
        assert!(registry.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let registry = RegistryFile::new(nested.join("wallet.json"));

        let records = vec![record("alice", 1), record("bob", 2)];
        registry.store(&records).await.unwrap();

        assert_eq!(registry.load().await.unwrap(), records);
        // No staging file is left behind.
        assert_eq!(entries(&nested), vec!["wallet.json".to_string()]);

        let text = std::fs::read_to_string(registry.path()).unwrap();
        assert!(text.starts_with("[\n  {"));
        assert!(text.contains("\"user_address\": \"alice\""));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_registry_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryFile::new(dir.path().join("wallet.json"));
        registry.store(&[record("alice", 1)]).await.unwrap();
        drop(registry.lock().await.unwrap());

        let mode = std::fs::metadata(registry.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let mode = std::fs::metadata(registry.lock_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_interrupted_write_leaves_registry_intact() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryFile::new(dir.path().join("wallet.json"));
        let records = vec![record("alice", 1)];
        registry.store(&records).await.unwrap();

        // A crash mid-write leaves a truncated staging file behind.
        let stale = dir.path().join(".wallet.json.crashed.tmp");
        std::fs::write(&stale, b"[{\"user_address\": \"bo").unwrap();
        assert_eq!(registry.load().await.unwrap(), records);

        // Later writes stage elsewhere and never pick up the stale file.
        let records = vec![record("alice", 1), record("bob", 2)];
        registry.store(&records).await.unwrap();
        assert_eq!(registry.load().await.unwrap(), records);
        assert_eq!(
            std::fs::read(&stale).unwrap(),
            b"[{\"user_address\": \"bo".to_vec()
        );
    }

    #[tokio::test]
    async fn test_corrupt_registry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryFile::new(dir.path().join("wallet.json"));
        std::fs::write(registry.path(), b"{not json").unwrap();

        let err = registry.load().await.unwrap_err();
        assert!(matches!(err, KeystoreError::Corrupt { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_excludes_other_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let first = RegistryFile::new(&path);
        let second = RegistryFile::new(&path);

        let held = first.lock().await.unwrap();
        let waiter = tokio::spawn(async move { second.lock().await.unwrap() });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let reacquired = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        drop(reacquired);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_never_expose_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        RegistryFile::new(&path).store(&[]).await.unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let mut readers = Vec::new();
        for _ in 0..4 {
            let path = path.clone();
            let done = done.clone();
            readers.push(tokio::task::spawn_blocking(move || {
                let mut reads = 0u32;
                while !done.load(Ordering::SeqCst) {
                    let bytes = std::fs::read(&path).unwrap();
                    let parsed: Vec<AccountRecord> = serde_json::from_slice(&bytes)
                        .expect("reader observed a partially written registry");
                    assert!(parsed.len() <= 64);
                    reads += 1;
                }
                reads
            }));
        }

        // Two handles write unrelated documents at the same time.
        let mut writers = Vec::new();
        for w in 0..2u8 {
            let registry = RegistryFile::new(&path);
            writers.push(tokio::spawn(async move {
                let mut records = Vec::new();
                for i in 0..32u8 {
                    records.push(record(&format!("writer-{}-{}", w, i), i.wrapping_add(1)));
                    registry.store(&records).await.unwrap();
                }
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }
        done.store(true, Ordering::SeqCst);

        for reader in readers {
            assert!(reader.await.unwrap() > 0);
        }
        assert_eq!(RegistryFile::new(&path).load().await.unwrap().len(), 32);
        assert_eq!(entries(dir.path()), vec!["wallet.json".to_string()]);
    }
}
