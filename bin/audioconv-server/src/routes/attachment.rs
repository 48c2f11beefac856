//! Streamed `Content-Disposition: attachment` responses.

use std::path::Path;

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;

use crate::error::ServerError;
use audioconv_core::ConvertError;

const READ_CHUNK: usize = 64 * 1024;

/// Stream the file at `path` back to the client as a download named
/// `file_name`.
///
/// The file is opened before the response is built, so a vanished file is
/// reported as an error instead of a truncated body.
pub async fn file_attachment(
    path: &Path,
    media_type: &'static str,
    file_name: &str,
) -> Result<Response, ServerError> {
    let file = tokio::fs::File::open(path).await.map_err(ConvertError::from)?;
    let size = file.metadata().await.map_err(ConvertError::from)?.len();

    let stream = futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let n = file.read_buf(&mut buf).await?;
        if n == 0 {
            Ok::<_, std::io::Error>(None)
        } else {
            Ok(Some((buf.freeze(), file)))
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, media_type)
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, content_disposition(file_name))
        .body(Body::from_stream(stream))
        .map_err(|e| ServerError::Internal(format!("failed to build file response: {e}")))
}

fn content_disposition(file_name: &str) -> String {
    let quoted: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{quoted}\"")
}

#[cfg(test)]
mod test {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn disposition_quotes_are_neutralised() {
        assert_eq!(content_disposition("a.mp3"), "attachment; filename=\"a.mp3\"");
        assert_eq!(content_disposition("a\"b.mp3"), "attachment; filename=\"a_b.mp3\"");
    }

    #[tokio::test]
    async fn streams_whole_file_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.ogg");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &payload).unwrap();

        let resp = file_attachment(&path, "audio/ogg", "tone.ogg").await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/ogg");
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "200000");

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_attachment(&dir.path().join("gone.mp3"), "audio/mpeg", "gone.mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Convert(ConvertError::Io(_))));
    }
}
