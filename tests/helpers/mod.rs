//! Shared test helpers for API integration tests.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use chunkhub_core::config::{AppConfig, StorageConfig};

const BOUNDARY: &str = "chunkhub-test-boundary";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Data root, removed on drop
    pub data_dir: TempDir,
}

impl TestApp {
    /// Create a new test application on a fresh data root
    pub async fn new() -> Self {
        let data_dir = tempfile::tempdir().expect("Failed to create data dir");
        let config = AppConfig {
            storage: StorageConfig::rooted_at(data_dir.path().to_string_lossy()),
            ..AppConfig::default()
        };

        let state = chunkhub_api::build_state(config)
            .await
            .expect("Failed to build state");

        Self {
            router: chunkhub_api::build_app(state),
            data_dir,
        }
    }

    /// Make a JSON request
    pub async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body_str))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Make a GET request with extra headers
    pub async fn get_with(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut req = Request::builder().method("GET").uri(path);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let req = req.body(Body::empty()).expect("Failed to build request");
        self.send(req).await
    }

    /// Send a raw request body
    pub async fn raw(&self, method: &str, path: &str, body: &[u8]) -> TestResponse {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(body.to_vec()))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Send a multipart form with text fields and file parts
    pub async fn multipart(&self, path: &str, fields: &[(&str, &str)], files: &[FilePart<'_>]) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for file in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    file.field, file.filename, file.content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(file.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Upload one chunk through the multipart endpoint
    pub async fn upload_chunk(&self, file_id: &str, index: u32, total: u32, total_size: u64, data: &[u8]) -> TestResponse {
        let index = index.to_string();
        let total = total.to_string();
        let total_size = total_size.to_string();
        self.multipart(
            "/api/chunk/upload",
            &[
                ("fileId", file_id),
                ("chunkIndex", &index),
                ("totalChunks", &total),
                ("totalSize", &total_size),
                ("originalname", "a.txt"),
                ("mimetype", "text/plain"),
            ],
            &[FilePart {
                field: "file",
                filename: "blob",
                content_type: "application/octet-stream",
                data,
            }],
        )
        .await
    }

    /// Merge an upload
    pub async fn merge(&self, file_id: &str) -> TestResponse {
        self.request(
            "POST",
            "/api/chunk/merge",
            Some(serde_json::json!({ "fileId": file_id })),
        )
        .await
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body")
            .to_vec();

        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }
}

/// One file part of a multipart form
pub struct FilePart<'a> {
    /// Form field name
    pub field: &'a str,
    /// Client file name
    pub filename: &'a str,
    /// Part content type
    pub content_type: &'a str,
    /// Part content
    pub data: &'a [u8],
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body, `Null` for non-JSON bodies
    pub body: Value,
    /// Raw body
    pub bytes: Vec<u8>,
}

impl TestResponse {
    /// String field under `data`
    pub fn data_str(&self, field: &str) -> String {
        self.body["data"][field]
            .as_str()
            .unwrap_or_else(|| panic!("No data.{field} in {:?}", self.body))
            .to_string()
    }

    /// Header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
