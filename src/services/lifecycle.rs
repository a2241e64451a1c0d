//! Lifecycle orchestration for stored files: upload staging,
//! identifier resolution, serve-time expiry checks, single-download
//! cleanup, and the periodic expiration sweep.

use crate::models::{
    file::{FileEntry, ObjectMeta, StoredFile},
    upload::UploadSettings,
};
use crate::services::{expiration, id_allocator::IdAllocator, key_codec, object_store::ObjectStore};
use bytes::Bytes;
use futures::Stream;
use std::{
    io,
    path::PathBuf,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use thiserror::Error;
use tokio::{fs::File, task::JoinHandle};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("stored name `{0}` is malformed")]
    MalformedName(String),
    #[error("file `{0}` has expired")]
    Expired(String),
    #[error("no live file matches `{0}`")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ShareResult<T> = Result<T, ShareError>;

/// An upload that has been written to disk under a temp name but not
/// yet given a public identifier.
#[derive(Debug)]
pub struct StagedUpload {
    tmp_path: PathBuf,
    size_bytes: i64,
}

/// An open download ready to stream out.
pub struct Download {
    pub meta: ObjectMeta,
    pub size_bytes: i64,
    pub stream: DownloadStream,
}

/// ShareService owns the lifecycle of every stored file:
/// - Stage an upload (bytes to a temp file) and finish it (mint an
///   identifier, encode the name, rename into place)
/// - Resolve a public identifier to a live file and stream it out
/// - Sweep expired and undecodable entries on a timer
///
/// The filesystem is the only shared mutable state; no lock is held
/// across requests or between requests and the sweeper.
#[derive(Clone)]
pub struct ShareService {
    /// Backing store for payload bytes and encoded names.
    pub store: ObjectStore,

    ids: Arc<IdAllocator>,
    public_url: Option<String>,
}

impl ShareService {
    pub fn new(store: ObjectStore, public_url: Option<String>) -> Self {
        Self {
            store,
            ids: Arc::new(IdAllocator::default()),
            public_url,
        }
    }

    /// Configured public base URL for share links, if any.
    pub fn public_url(&self) -> Option<&str> {
        self.public_url.as_deref()
    }

    /// Stream an incoming upload into a temp file.
    ///
    /// No public identifier exists until `finish_upload` renames the
    /// bytes into place, so an aborted upload leaves nothing
    /// resolvable.
    pub async fn stage_upload<S>(&self, stream: S) -> ShareResult<StagedUpload>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let (tmp_path, size_bytes) = self.store.write_temp(stream).await?;
        Ok(StagedUpload {
            tmp_path,
            size_bytes,
        })
    }

    /// Drop a staged upload that will not be finished.
    pub async fn abort_upload(&self, staged: StagedUpload) {
        self.store.discard(&staged.tmp_path).await;
    }

    /// Mint an identifier, encode the metadata into the final name,
    /// and rename the staged bytes into place.
    pub async fn finish_upload(
        &self,
        staged: StagedUpload,
        original_name: &str,
        settings: &UploadSettings,
    ) -> ShareResult<StoredFile> {
        let meta = ObjectMeta {
            identifier: self.ids.allocate(),
            expires: expiration::format_stamp(expiration::compute_expiration(
                &settings.expiration,
            )),
            single_download: settings.single_download,
            original_name: original_name.to_string(),
        };
        let name = key_codec::encode(&meta);

        self.store.commit(&staged.tmp_path, &name).await?;
        info!(identifier = %meta.identifier, name = %name, size = staged.size_bytes, "stored upload");

        Ok(StoredFile {
            identifier: meta.identifier,
            name,
            original_name: meta.original_name,
            size_bytes: staged.size_bytes,
        })
    }

    /// Find the live file for a public identifier.
    ///
    /// Scans every stored name: O(n) in the object count, accepted at
    /// the scale this runs at. An expired match is deleted and
    /// reported as expired; undecodable names are skipped (the sweep
    /// will collect them).
    pub async fn resolve(&self, identifier: &str) -> ShareResult<(String, ObjectMeta)> {
        for name in self.store.list().await? {
            let Some(meta) = key_codec::decode(&name) else {
                continue;
            };
            if meta.identifier != identifier {
                continue;
            }
            if expiration::is_expired(&meta.expires) {
                match self.store.delete(&name).await {
                    Ok(_) => debug!(name = %name, "removed expired file on resolve"),
                    Err(err) => warn!(name = %name, error = %err, "failed to remove expired file"),
                }
                return Err(ShareError::Expired(identifier.to_string()));
            }
            return Ok((name, meta));
        }
        Err(ShareError::NotFound(identifier.to_string()))
    }

    /// Open a download for an identifier.
    ///
    /// The expiration check happens here, at serve time, so a file
    /// cannot be streamed after its stamp has passed. A file the sweep
    /// (or a competing single-download) removed between listing and
    /// open is a not-found outcome, never a crash. For single-download
    /// files the returned stream deletes the file once the last chunk
    /// has been handed out.
    pub async fn serve(&self, identifier: &str) -> ShareResult<Download> {
        let (name, meta) = self.resolve(identifier).await?;

        let file = match self.store.open(&name).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ShareError::NotFound(identifier.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let size_bytes = file.metadata().await?.len() as i64;

        let cleanup = meta
            .single_download
            .then(|| (self.store.clone(), name.clone()));

        Ok(Download {
            meta,
            size_bytes,
            stream: DownloadStream::new(file, cleanup),
        })
    }

    /// Live files for display. Never authoritative: entries that
    /// vanish between list and stat are skipped, not reported.
    pub async fn list_live(&self) -> ShareResult<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for name in self.store.list().await? {
            let Some(meta) = key_codec::decode(&name) else {
                continue;
            };
            if expiration::is_expired(&meta.expires) {
                continue;
            }
            let (size, upload_date) = match self.store.stat(&name).await {
                Ok(stat) => stat,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            entries.push(FileEntry {
                name: meta.original_name,
                identifier: meta.identifier,
                size,
                upload_date,
                single_download: meta.single_download,
                expires: meta.expires,
            });
        }
        Ok(entries)
    }

    /// Remove every expired or undecodable entry. Returns the number
    /// removed.
    ///
    /// Per-entry failures are logged and skipped; one bad entry never
    /// aborts the rest of the sweep.
    pub async fn sweep(&self) -> usize {
        let names = match self.store.list().await {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "sweep could not list storage directory");
                return 0;
            }
        };

        let mut removed = 0;
        for name in names {
            let fault = match key_codec::decode(&name) {
                None => ShareError::MalformedName(name.clone()),
                Some(meta) if expiration::is_expired(&meta.expires) => {
                    ShareError::Expired(meta.identifier)
                }
                Some(_) => continue,
            };
            match self.store.delete(&name).await {
                Ok(true) => {
                    info!(name = %name, reason = %fault, "sweep removed file");
                    removed += 1;
                }
                Ok(false) => debug!(name = %name, "sweep target already gone"),
                Err(err) => warn!(name = %name, error = %err, "sweep failed to remove file"),
            }
        }
        removed
    }

    /// Run one sweep immediately and then on a fixed cadence, as a
    /// background task independent of request handling.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                // first tick fires immediately
                ticker.tick().await;
                let removed = service.sweep().await;
                if removed > 0 {
                    info!(removed, "expiration sweep finished");
                }
            }
        })
    }
}

/// Streams a file's bytes out and, for single-download files, removes
/// the file once the final chunk has been handed to the client.
///
/// An error or early drop leaves the file in place: only a complete
/// transfer consumes the single download. Two concurrent readers of
/// the same single-download file may both stream to completion; the
/// losing delete is a no-op. That best-effort race is accepted.
pub struct DownloadStream {
    inner: ReaderStream<File>,
    cleanup: Option<(ObjectStore, String)>,
    errored: bool,
}

impl DownloadStream {
    fn new(file: File, cleanup: Option<(ObjectStore, String)>) -> Self {
        Self {
            inner: ReaderStream::new(file),
            cleanup,
            errored: false,
        }
    }
}

impl Stream for DownloadStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                if !this.errored {
                    if let Some((store, name)) = this.cleanup.take() {
                        // the client already has every byte; failures here
                        // are logged, never surfaced
                        tokio::spawn(async move {
                            match store.delete(&name).await {
                                Ok(true) => info!(name = %name, "deleted single-download file"),
                                Ok(false) => {
                                    debug!(name = %name, "single-download file already gone")
                                }
                                Err(err) => {
                                    warn!(name = %name, error = %err, "failed to delete single-download file")
                                }
                            }
                        });
                    }
                }
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(err))) => {
                this.errored = true;
                Poll::Ready(Some(Err(err)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ShareService {
        ShareService::new(ObjectStore::new(dir.path()), None)
    }

    fn ten_bytes() -> impl Stream<Item = io::Result<Bytes>> {
        stream::iter(vec![Ok(Bytes::from_static(b"0123456789"))])
    }

    async fn upload(svc: &ShareService, name: &str, settings: &UploadSettings) -> StoredFile {
        let staged = svc.stage_upload(ten_bytes()).await.unwrap();
        svc.finish_upload(staged, name, settings).await.unwrap()
    }

    async fn read_all(mut stream: DownloadStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    fn expired_name(identifier: &str, original_name: &str) -> String {
        key_codec::encode(&ObjectMeta {
            identifier: identifier.into(),
            expires: "2000010100".into(),
            single_download: false,
            original_name: original_name.into(),
        })
    }

    #[tokio::test]
    async fn upload_then_download_twice() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let stored = upload(&svc, "report.txt", &UploadSettings::default()).await;
        assert_eq!(stored.size_bytes, 10);

        let first = svc.serve(&stored.identifier).await.unwrap();
        assert_eq!(first.meta.original_name, "report.txt");
        assert_eq!(first.size_bytes, 10);
        assert_eq!(read_all(first.stream).await, b"0123456789");

        // not single-download: still there for the next reader
        let second = svc.serve(&stored.identifier).await.unwrap();
        assert_eq!(read_all(second.stream).await, b"0123456789");
    }

    #[tokio::test]
    async fn single_download_file_disappears_after_a_full_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let settings = UploadSettings {
            single_download: true,
            ..Default::default()
        };
        let stored = upload(&svc, "once.bin", &settings).await;

        let download = svc.serve(&stored.identifier).await.unwrap();
        assert_eq!(read_all(download.stream).await.len(), 10);

        // deletion runs on a spawned task after the last chunk
        let mut gone = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if matches!(
                svc.serve(&stored.identifier).await,
                Err(ShareError::NotFound(_))
            ) {
                gone = true;
                break;
            }
        }
        assert!(gone, "single-download file should be removed after delivery");
    }

    #[tokio::test]
    async fn partial_single_download_does_not_consume_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let settings = UploadSettings {
            single_download: true,
            ..Default::default()
        };
        let stored = upload(&svc, "once.bin", &settings).await;

        // open and drop the stream without reading to the end
        let download = svc.serve(&stored.identifier).await.unwrap();
        drop(download);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(svc.serve(&stored.identifier).await.is_ok());
    }

    #[tokio::test]
    async fn expired_file_is_not_found_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let name = expired_name("stale", "old.txt");
        std::fs::write(dir.path().join(&name), b"stale").unwrap();

        assert!(matches!(
            svc.serve("stale").await,
            Err(ShareError::Expired(_))
        ));
        assert!(!dir.path().join(&name).exists());
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        assert!(matches!(
            svc.serve("nothing").await,
            Err(ShareError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delimiter_in_filename_survives_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let stored = upload(&svc, "a-b.txt", &UploadSettings::default()).await;
        let download = svc.serve(&stored.identifier).await.unwrap();
        assert_eq!(download.meta.original_name, "a-b.txt");
    }

    #[tokio::test]
    async fn sweep_removes_expired_and_malformed_but_spares_live() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let expired = expired_name("old", "old.txt");
        std::fs::write(dir.path().join(&expired), b"x").unwrap();
        std::fs::write(dir.path().join("garbage"), b"x").unwrap();
        let live = upload(&svc, "keep.txt", &UploadSettings::default()).await;

        let removed = svc.sweep().await;
        assert_eq!(removed, 2);
        assert!(!dir.path().join(&expired).exists());
        assert!(!dir.path().join("garbage").exists());
        assert!(dir.path().join(&live.name).exists());
    }

    #[tokio::test]
    async fn aborted_upload_leaves_nothing_resolvable() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let staged = svc.stage_upload(ten_bytes()).await.unwrap();
        svc.abort_upload(staged).await;

        assert!(svc.store.list().await.unwrap().is_empty());
        assert!(svc.list_live().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_reports_live_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let expired = expired_name("old", "old.txt");
        std::fs::write(dir.path().join(&expired), b"x").unwrap();
        std::fs::write(dir.path().join("garbage"), b"x").unwrap();
        let settings = UploadSettings {
            single_download: true,
            ..Default::default()
        };
        let live = upload(&svc, "keep.txt", &settings).await;

        let entries = svc.list_live().await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.name, "keep.txt");
        assert_eq!(entry.identifier, live.identifier);
        assert_eq!(entry.size, 10);
        assert!(entry.single_download);
    }
}
