//! Router harness for handler tests: a full app over temp directories and a
//! scripted converter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use audioconv_core::testing::{Script, ScriptedConverter};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::Config;
use crate::state::AppState;

pub const BOUNDARY: &str = "audioconv-test-boundary";

pub struct TestApp {
    pub router: Router,
    tmp: TempDir,
}

impl TestApp {
    /// Parent of both storage roots; never served.
    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.tmp.path().join("output")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.tmp.path().join("scratch")
    }
}

/// App with a 1 MiB upload limit and two conversion slots.
pub async fn test_app(script: Script) -> TestApp {
    test_app_with(script, &[]).await
}

pub async fn test_app_with(script: Script, overrides: &[(&str, &str)]) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let mut env: HashMap<String, String> = HashMap::from([
        ("AUDIOCONV_OUTPUT_DIR".into(), tmp.path().join("output").display().to_string()),
        ("AUDIOCONV_TEMP_DIR".into(), tmp.path().join("scratch").display().to_string()),
        ("AUDIOCONV_MAX_FILE_SIZE_MB".into(), "1".into()),
        ("AUDIOCONV_MAX_CONCURRENT".into(), "2".into()),
    ]);
    for (k, v) in overrides {
        env.insert((*k).to_owned(), (*v).to_owned());
    }
    let config = Config::from_lookup(move |k| env.get(k).cloned());

    let state = Arc::new(
        AppState::new(config, Arc::new(ScriptedConverter::new(script)))
            .await
            .unwrap(),
    );
    TestApp {
        router: super::build(state),
        tmp,
    }
}

pub async fn send(app: &TestApp, req: Request<Body>) -> Response {
    app.router.clone().oneshot(req).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    let req = Request::builder()
        .uri(uri)
        .header(header::HOST, "localhost:8000")
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

pub async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(resp: Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

/// Hand-assembled `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(content);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    /// `POST /convert` with this body and `Host: localhost:8000`.
    pub fn into_request(self) -> Request<Body> {
        self.into_request_with(&[])
    }

    pub fn into_request_with(mut self, headers: &[(&str, &str)]) -> Request<Body> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method("POST")
            .uri("/convert")
            .header(header::HOST, "localhost:8000")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Body::from(self.bytes)).unwrap()
    }
}
