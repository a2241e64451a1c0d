//! Represents uploader-chosen settings attached to a new file.

use serde::{Deserialize, Serialize};

/// Settings parsed from the upload form and echoed back in the upload
/// response.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    /// Opaque passphrase, kept for an external checker. Never enforced
    /// here.
    pub password: Option<String>,

    /// Delete the file after its first fully delivered download.
    pub single_download: bool,

    /// Duration token: `1h`, `6h`, `24h`, or `72h`. Anything else
    /// resolves as `1h`.
    pub expiration: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            password: None,
            single_download: false,
            expiration: "1h".into(),
        }
    }
}
