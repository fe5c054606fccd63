use crate::config::WorkflowConfig;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum WorkflowClientError {
    #[error("Failed to read image {path}: {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("Failed to reach workflow endpoint: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Workflow endpoint returned {status}: {body}")]
    Remote { status: StatusCode, body: String },
    #[error("Workflow response is not valid JSON: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct WorkflowRequest<'a> {
    api_key: &'a str,
    inputs: WorkflowInputs,
}

#[derive(Debug, Serialize)]
struct WorkflowInputs {
    image: ImageInput,
}

#[derive(Debug, Serialize)]
struct ImageInput {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

impl<'a> WorkflowRequest<'a> {
    pub fn new(api_key: &'a str, encoded_image: String) -> Self {
        Self {
            api_key,
            inputs: WorkflowInputs {
                image: ImageInput {
                    kind: "base64",
                    value: encoded_image,
                },
            },
        }
    }
}

pub fn encode_image(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub struct WorkflowClient {
    http: Client,
    endpoint_url: String,
    api_key: String,
}

impl WorkflowClient {
    pub fn new(config: &WorkflowConfig) -> Result<Self, WorkflowClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.get_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(WorkflowClientError::ClientBuild)?;

        Ok(Self {
            http,
            endpoint_url: config.endpoint_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn run_workflow(&self, image_path: &Path) -> Result<Value, WorkflowClientError> {
        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|source| WorkflowClientError::ReadImage {
                path: image_path.to_path_buf(),
                source,
            })?;

        self.send_image(&bytes).await
    }

    /// Single POST, no retry. The response JSON is returned as-is.
    #[instrument(skip(self, image_data), fields(endpoint = %self.endpoint_url, bytes = image_data.len()))]
    pub async fn send_image(&self, image_data: &[u8]) -> Result<Value, WorkflowClientError> {
        let request = WorkflowRequest::new(&self.api_key, encode_image(image_data));

        let response = self
            .http
            .post(&self.endpoint_url)
            .json(&request)
            .send()
            .await
            .map_err(WorkflowClientError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Workflow endpoint returned {}", status);
            return Err(WorkflowClientError::Remote { status, body });
        }

        let body = response
            .bytes()
            .await
            .map_err(WorkflowClientError::Transport)?;
        tracing::debug!("Received {} bytes from workflow endpoint", body.len());

        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_endpoint(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/workflow", addr)
    }

    fn client_for(endpoint_url: String) -> WorkflowClient {
        WorkflowClient::new(&WorkflowConfig {
            endpoint_url,
            api_key: "test-key".to_string(),
            timeout_secs: Some(10),
        })
        .unwrap()
    }

    #[test]
    fn test_base64_round_trip() {
        let bytes: Vec<u8> = (0..=255).chain([0, 0, 1]).collect();
        let encoded = encode_image(&bytes);

        assert_eq!(BASE64.decode(encoded).unwrap(), bytes);
    }

    #[test]
    fn test_request_body_shape() {
        let request = WorkflowRequest::new("key", encode_image(b"abc"));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "api_key": "key",
                "inputs": { "image": { "type": "base64", "value": "YWJj" } }
            })
        );
    }

    #[tokio::test]
    async fn test_send_image_posts_payload_and_returns_json() {
        // echo the request so the test can inspect what was sent
        let router = Router::new().route(
            "/workflow",
            post(|Json(body): Json<Value>| async move { Json(json!({ "received": body })) }),
        );
        let client = client_for(spawn_endpoint(router).await);

        let response = client.send_image(b"\x89PNG fake").await.unwrap();

        let sent = &response["received"];
        assert_eq!(sent["api_key"], "test-key");
        assert_eq!(sent["inputs"]["image"]["type"], "base64");
        let value = sent["inputs"]["image"]["value"].as_str().unwrap();
        assert_eq!(BASE64.decode(value).unwrap(), b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_run_workflow_reads_file() {
        let router = Router::new().route(
            "/workflow",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "length": body["inputs"]["image"]["value"].as_str().map(str::len) }))
            }),
        );
        let client = client_for(spawn_endpoint(router).await);
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"123456").unwrap();

        let response = client.run_workflow(file.path()).await.unwrap();

        assert_eq!(response["length"], 8);
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_error() {
        let router = Router::new().route(
            "/workflow",
            post(|| async { (AxumStatus::UNAUTHORIZED, "invalid api key") }),
        );
        let client = client_for(spawn_endpoint(router).await);

        let err = client.send_image(b"img").await.unwrap_err();

        match err {
            WorkflowClientError::Remote { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_response() {
        let router = Router::new().route("/workflow", post(|| async { "<html>oops</html>" }));
        let client = client_for(spawn_endpoint(router).await);

        let err = client.send_image(b"img").await.unwrap_err();

        assert!(matches!(err, WorkflowClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(format!("http://{}/workflow", addr));

        let err = client.send_image(b"img").await.unwrap_err();

        assert!(matches!(err, WorkflowClientError::Transport(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let client = client_for("http://127.0.0.1:9/workflow".to_string());

        let err = client
            .run_workflow(Path::new("/no/such/image.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowClientError::ReadImage { .. }));
    }
}
