//! Represents a stored file and its derived views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata carried by a stored file.
///
/// A stored file has no metadata record anywhere else — these fields
/// *are* its on-disk name, encoded and decoded by the key codec. Size
/// and creation time come from file attributes instead.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Short public locator, unique among files currently on disk.
    pub identifier: String,

    /// Expiration stamp, `YYYYMMDDHH` in UTC. Kept raw so a malformed
    /// stamp can still fail closed at expiry-check time.
    pub expires: String,

    /// Delete the file after its first fully delivered download.
    pub single_download: bool,

    /// User-supplied filename, extension included. May itself contain
    /// the name delimiter.
    pub original_name: String,
}

/// Result of a completed upload.
#[derive(Clone, Debug)]
pub struct StoredFile {
    /// Public locator minted for this upload.
    pub identifier: String,

    /// Full encoded on-disk name.
    pub name: String,

    /// User-supplied filename.
    pub original_name: String,

    /// Bytes written to disk.
    pub size_bytes: i64,
}

/// One row of the live-file listing.
///
/// Display only — lifecycle decisions never consult this view.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// User-supplied filename.
    pub name: String,

    /// Public locator.
    pub identifier: String,

    /// Size in bytes.
    pub size: i64,

    /// When the file landed on disk, per file attributes.
    pub upload_date: DateTime<Utc>,

    /// Whether the file disappears after its first download.
    pub single_download: bool,

    /// Expiration stamp (`YYYYMMDDHH`, UTC).
    pub expires: String,
}
