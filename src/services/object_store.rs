//! Filesystem-backed object store.
//!
//! One flat directory; the stored name *is* the metadata record.
//! Uploads stream into a `.tmp-{uuid}` file first and are renamed into
//! place only once the final name is known, so a half-written upload is
//! never listed or resolvable under a public identifier.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const TEMP_PREFIX: &str = ".tmp-";

/// Thin wrapper over the storage directory: temp-write, rename, list,
/// stat, open, and idempotent delete.
#[derive(Clone, Debug)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Stream bytes into a fresh temp file.
    ///
    /// Returns the temp path and byte count. The temp file is removed
    /// on any write or stream error, and temp names are excluded from
    /// listings, so nothing half-written ever becomes visible.
    pub async fn write_temp<S>(&self, stream: S) -> io::Result<(PathBuf, i64)>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let tmp_path = self.root.join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(err);
                }
            };
            size_bytes += chunk.len() as i64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        Ok((tmp_path, size_bytes))
    }

    /// Rename a temp file into its final encoded name.
    pub async fn commit(&self, tmp_path: &Path, name: &str) -> io::Result<()> {
        let final_path = self.path_of(name);
        match fs::rename(tmp_path, &final_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                fs::remove_file(&final_path).await?;
                fs::rename(tmp_path, &final_path).await
            }
            Err(err) => {
                let _ = fs::remove_file(tmp_path).await;
                Err(err)
            }
        }
    }

    /// Best-effort removal of an abandoned temp file.
    pub async fn discard(&self, tmp_path: &Path) {
        if let Err(err) = fs::remove_file(tmp_path).await {
            if err.kind() != ErrorKind::NotFound {
                debug!(
                    "failed to discard temp file {}: {}",
                    tmp_path.display(),
                    err
                );
            }
        }
    }

    /// Names of all stored objects. Temp files and subdirectories are
    /// skipped.
    pub async fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            names.push(name);
        }
        Ok(names)
    }

    /// Size and creation time from file attributes. Falls back to the
    /// modification time on filesystems without a birth time.
    pub async fn stat(&self, name: &str) -> io::Result<(i64, DateTime<Utc>)> {
        let meta = fs::metadata(self.path_of(name)).await?;
        let created = meta.created().or_else(|_| meta.modified())?;
        Ok((meta.len() as i64, DateTime::<Utc>::from(created)))
    }

    /// Open a stored object for reading.
    pub async fn open(&self, name: &str) -> io::Result<File> {
        File::open(self.path_of(name)).await
    }

    /// Remove a stored object.
    ///
    /// Returns `false` when the name was already absent. Sweep and
    /// single-download cleanup both race with other deleters and treat
    /// that as success.
    pub async fn delete(&self, name: &str) -> io::Result<bool> {
        match fs::remove_file(self.path_of(name)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::io::AsyncReadExt;

    fn bytes_stream(data: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> {
        stream::iter(vec![Ok(Bytes::from_static(data))])
    }

    #[tokio::test]
    async fn write_commit_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let (tmp, size) = store.write_temp(bytes_stream(b"hello world")).await.unwrap();
        assert_eq!(size, 11);
        store.commit(&tmp, "abc-2999010100-false-hi.txt").await.unwrap();

        let mut file = store.open("abc-2999010100-false-hi.txt").await.unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"hello world");

        let (stat_size, _) = store.stat("abc-2999010100-false-hi.txt").await.unwrap();
        assert_eq!(stat_size, 11);
    }

    #[tokio::test]
    async fn failed_stream_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let stream = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(ErrorKind::Other, "client went away")),
        ]);
        assert!(store.write_temp(stream).await.is_err());
        assert!(store.list().await.unwrap().is_empty());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn listing_skips_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        std::fs::write(dir.path().join(".tmp-in-flight"), b"x").unwrap();
        std::fs::write(dir.path().join("abc-2999010100-false-a.txt"), b"x").unwrap();

        let names = store.list().await.unwrap();
        assert_eq!(names, vec!["abc-2999010100-false-a.txt".to_string()]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        std::fs::write(dir.path().join("gone-soon"), b"x").unwrap();
        assert!(store.delete("gone-soon").await.unwrap());
        assert!(!store.delete("gone-soon").await.unwrap());
        assert!(!store.delete("never-existed").await.unwrap());
    }
}
