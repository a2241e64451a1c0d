//! Encodes file metadata into the stored name and back.
//!
//! Layout: `{identifier}-{YYYYMMDDHH}-{true|false}-{originalName}`.
//! The original name is the only segment allowed to contain the
//! delimiter; decoding splits into at most four parts and keeps
//! everything after the third `-` rejoined as the name. A filename
//! whose own leading characters happen to mimic a stamp and flag is a
//! known, accepted ambiguity — it is not guessed around.

use crate::models::file::ObjectMeta;

pub const DELIMITER: char = '-';

/// Encode metadata into an on-disk name.
pub fn encode(meta: &ObjectMeta) -> String {
    format!(
        "{id}{d}{exp}{d}{flag}{d}{name}",
        id = meta.identifier,
        exp = meta.expires,
        flag = meta.single_download,
        name = meta.original_name,
        d = DELIMITER
    )
}

/// Decode an on-disk name.
///
/// `None` when fewer than four segments are present; callers treat
/// that as an orphan, never a panic. The expiration segment is kept
/// raw — the expiry check owns fail-closed parsing.
pub fn decode(name: &str) -> Option<ObjectMeta> {
    let mut parts = name.splitn(4, DELIMITER);
    let identifier = parts.next()?;
    let expires = parts.next()?;
    let flag = parts.next()?;
    let original_name = parts.next()?;

    Some(ObjectMeta {
        identifier: identifier.to_string(),
        expires: expires.to_string(),
        single_download: flag == "true",
        original_name: original_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(identifier: &str, single_download: bool, original_name: &str) -> ObjectMeta {
        ObjectMeta {
            identifier: identifier.into(),
            expires: "2024030512".into(),
            single_download,
            original_name: original_name.into(),
        }
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let original = meta("AbCdE", true, "report.pdf");
        let name = encode(&original);
        assert_eq!(name, "AbCdE-2024030512-true-report.pdf");
        assert_eq!(decode(&name), Some(original));
    }

    #[test]
    fn delimiter_in_original_name_round_trips() {
        let original = meta("xYz", false, "a-b.txt");
        let name = encode(&original);
        assert_eq!(name, "xYz-2024030512-false-a-b.txt");
        assert_eq!(decode(&name), Some(original));
    }

    #[test]
    fn heavily_delimited_name_stays_in_the_trailing_segment() {
        let original = meta("q", false, "2024-03-05-notes-final-v2.md");
        assert_eq!(decode(&encode(&original)), Some(original));
    }

    #[test]
    fn too_few_segments_is_invalid() {
        assert_eq!(decode("loneword"), None);
        assert_eq!(decode("id-2024030512"), None);
        assert_eq!(decode("id-2024030512-true"), None);
    }

    #[test]
    fn only_exact_true_sets_the_flag() {
        let decoded = decode("id-2024030512-TRUE-file.txt").unwrap();
        assert!(!decoded.single_download);
        let decoded = decode("id-2024030512-yes-file.txt").unwrap();
        assert!(!decoded.single_download);
    }
}
