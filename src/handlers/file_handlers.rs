//! HTTP handlers for upload, download, and the live-file listing.
//! Streams bodies in both directions and delegates lifecycle concerns
//! to `ShareService`.

use crate::{
    errors::AppError,
    models::{file::FileEntry, upload::UploadSettings},
    services::lifecycle::ShareService,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use serde::Serialize;
use std::io;

/// JSON reply for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub url: String,
    pub size: i64,
    pub settings: UploadSettings,
}

/// POST `/upload` — multipart form with a `file` part plus optional
/// `password`, `singleDownload`, and `expiration` parts.
///
/// The file part streams straight into a temp name; the public
/// identifier is minted only after every part has arrived, so a
/// connection dropped mid-upload never yields a live link.
pub async fn upload_file(
    State(service): State<ShareService>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut staged = None;
    let mut original_name = None;
    let mut settings = UploadSettings::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                if let Some(staged) = staged.take() {
                    service.abort_upload(staged).await;
                }
                return Err(AppError::new(StatusCode::BAD_REQUEST, err.to_string()));
            }
        };

        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("file") => {
                if let Some(previous) = staged.take() {
                    service.abort_upload(previous).await;
                }
                original_name = field.file_name().map(|n| n.to_string());
                let stream = field
                    .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));
                staged = Some(service.stage_upload(stream).await?);
            }
            // settings parts fall back to defaults when unreadable;
            // the default expiration is already the shortest one
            Some("password") => {
                settings.password = field.text().await.ok().filter(|p| !p.is_empty());
            }
            Some("singleDownload") => {
                settings.single_download = field.text().await.ok().as_deref() == Some("true");
            }
            Some("expiration") => {
                if let Ok(text) = field.text().await {
                    settings.expiration = text;
                }
            }
            _ => {}
        }
    }

    let Some(staged) = staged else {
        return Err(AppError::new(StatusCode::BAD_REQUEST, "No file uploaded"));
    };
    let original_name = original_name.unwrap_or_else(|| "file".to_string());

    let stored = service.finish_upload(staged, &original_name, &settings).await?;
    let url = format!(
        "{}/{}",
        base_url(service.public_url(), &headers),
        stored.identifier
    );

    Ok(Json(UploadResponse {
        success: true,
        filename: stored.original_name,
        url,
        size: stored.size_bytes,
        settings,
    }))
}

/// GET `/{identifier}` — stream the file back with its original name
/// as the download disposition.
pub async fn download_file(
    State(service): State<ShareService>,
    Path(identifier): Path<String>,
) -> Result<Response, AppError> {
    let download = service.serve(&identifier).await?;

    let mut response = Response::new(Body::from_stream(download.stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&download.size_bytes.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_disposition(&download.meta.original_name)
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// GET `/files` — JSON listing of live files. Display only; lifecycle
/// decisions never consult it.
pub async fn list_files(
    State(service): State<ShareService>,
) -> Result<Json<Vec<FileEntry>>, AppError> {
    let entries = service.list_live().await?;
    Ok(Json(entries))
}

/// Public base for share links: the configured override when set,
/// otherwise derived from the request's Host header.
fn base_url(public_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = public_url {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}", host)
}

/// Strip quote and control characters so the filename stays a valid
/// header value.
fn sanitize_disposition(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' { '\'' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_prefers_the_configured_override() {
        let headers = HeaderMap::new();
        assert_eq!(
            base_url(Some("https://share.example.com/"), &headers),
            "https://share.example.com"
        );
    }

    #[test]
    fn base_url_falls_back_to_the_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("files.local:3000"));
        assert_eq!(base_url(None, &headers), "http://files.local:3000");
    }

    #[test]
    fn disposition_filename_is_header_safe() {
        assert_eq!(sanitize_disposition("a-b.txt"), "a-b.txt");
        assert_eq!(sanitize_disposition("we\"ird\n.txt"), "we'ird.txt");
    }
}
