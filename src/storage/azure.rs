//! Azure Blob REST client for history documents.

use super::auth::{SharedKeyCredential, SignedRequest};
use super::{Blob, BlobStore, WriteCondition};
use crate::config::StorageConfig;
use crate::error::TrackerError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use wreq::{Client, Response};

const API_VERSION: &str = "2021-08-06";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Get,
    Put,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
        }
    }
}

/// Container-scoped blob client authenticated with a shared key.
pub struct AzureBlobClient {
    client: Client,
    credential: SharedKeyCredential,
    endpoint: String,
    container: String,
}

impl AzureBlobClient {
    /// Creates a client from validated storage settings.
    pub fn new(storage: &StorageConfig) -> Result<Self, TrackerError> {
        let credential = storage.credential()?;
        let endpoint = storage.endpoint_for(credential.account());
        Self::with_endpoint(credential, endpoint, storage.container.clone())
    }

    /// Creates a client against an explicit endpoint (emulator or tests).
    pub fn with_endpoint(
        credential: SharedKeyCredential,
        endpoint: impl Into<String>,
        container: impl Into<String>,
    ) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TrackerError::Config(format!("failed to build storage client: {}", e)))?;

        Ok(Self {
            client,
            credential,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            container: container.into(),
        })
    }

    /// Path component of the endpoint, e.g. `/devstoreaccount1` for the emulator.
    fn endpoint_path(&self) -> &str {
        let without_scheme = self.endpoint.split_once("://").map(|(_, rest)| rest).unwrap_or(&self.endpoint);
        match without_scheme.find('/') {
            Some(idx) => &without_scheme[idx..],
            None => "",
        }
    }

    fn resource_path(&self, blob: Option<&str>) -> String {
        match blob {
            Some(name) => format!(
                "{}/{}/{}",
                self.endpoint_path(),
                self.container,
                urlencoding::encode(name)
            ),
            None => format!("{}/{}", self.endpoint_path(), self.container),
        }
    }

    fn url(&self, blob: Option<&str>, query: &[(&str, &str)]) -> String {
        let path = match blob {
            Some(name) => format!("/{}/{}", self.container, urlencoding::encode(name)),
            None => format!("/{}", self.container),
        };

        let mut url = format!("{}{}", self.endpoint, path);
        for (i, (key, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }

    /// Signs and sends a request.
    async fn send(
        &self,
        verb: Verb,
        blob: Option<&str>,
        query: &[(&str, &str)],
        mut headers: BTreeMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        headers.insert("x-ms-date".to_string(), date);
        headers.insert("x-ms-version".to_string(), API_VERSION.to_string());
        if verb == Verb::Put {
            let len = body.as_ref().map(Vec::len).unwrap_or(0);
            headers.insert("content-length".to_string(), len.to_string());
        }

        let path = self.resource_path(blob);
        let signed = SignedRequest { method: verb.as_str(), path: &path, query, headers: &headers };
        let authorization = self.credential.authorization(&signed)?;

        let url = self.url(blob, query);
        debug!("{} {}", verb.as_str(), url);

        let mut request = match verb {
            Verb::Get => self.client.get(&url),
            Verb::Put => self.client.put(&url),
        };

        for (name, value) in &headers {
            // The client derives content-length from the body
            if name == "content-length" {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        request = request.header("authorization", authorization);

        if verb == Verb::Put {
            request = request.body(body.unwrap_or_default());
        }

        request.send().await.context("Failed to send request")
    }
}

/// Reads an error response body for diagnostics.
async fn describe_failure(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let code = extract_error_code(&body);
    match code {
        Some(code) => format!("status {} ({})", status, code),
        None => format!("status {}", status),
    }
}

/// Pulls `<Code>...</Code>` out of a storage error document.
fn extract_error_code(body: &str) -> Option<&str> {
    let start = body.find("<Code>")? + "<Code>".len();
    let end = body[start..].find("</Code>")? + start;
    Some(&body[start..end])
}

#[async_trait]
impl BlobStore for AzureBlobClient {
    async fn ensure_container(&self) -> Result<(), TrackerError> {
        let response = self
            .send(Verb::Put, None, &[("restype", "container")], BTreeMap::new(), None)
            .await
            .map_err(|e| TrackerError::StorageWrite {
                blob: self.container.clone(),
                message: format!("{:#}", e),
            })?;

        match response.status().as_u16() {
            201 => {
                info!("Created container {}", self.container);
                Ok(())
            }
            409 => {
                debug!("Container {} already exists", self.container);
                Ok(())
            }
            _ => Err(TrackerError::StorageWrite {
                blob: self.container.clone(),
                message: format!("creating container: {}", describe_failure(response).await),
            }),
        }
    }

    async fn download(&self, name: &str) -> Result<Option<Blob>, TrackerError> {
        let read_error = |message: String| TrackerError::StorageRead { blob: name.to_string(), message };

        let response = self
            .send(Verb::Get, Some(name), &[], BTreeMap::new(), None)
            .await
            .map_err(|e| read_error(format!("{:#}", e)))?;

        let status = response.status();
        debug!("Download {} returned {}", name, status);

        if status == 404 {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(read_error(describe_failure(response).await));
        }

        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response
            .bytes()
            .await
            .map_err(|e| read_error(format!("failed to read body: {}", e)))?;

        Ok(Some(Blob { body: body.to_vec(), etag }))
    }

    async fn upload(
        &self,
        name: &str,
        body: Vec<u8>,
        condition: WriteCondition,
    ) -> Result<(), TrackerError> {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), JSON_CONTENT_TYPE.to_string());
        headers.insert("x-ms-blob-type".to_string(), "BlockBlob".to_string());
        headers.insert("x-ms-blob-content-type".to_string(), JSON_CONTENT_TYPE.to_string());

        let conditional = match &condition {
            WriteCondition::Unconditional => false,
            WriteCondition::IfMatch(etag) => {
                headers.insert("if-match".to_string(), etag.clone());
                true
            }
            WriteCondition::IfAbsent => {
                headers.insert("if-none-match".to_string(), "*".to_string());
                true
            }
        };

        let size = body.len();
        let response = self
            .send(Verb::Put, Some(name), &[], headers, Some(body))
            .await
            .map_err(|e| TrackerError::StorageWrite {
                blob: name.to_string(),
                message: format!("{:#}", e),
            })?;

        match response.status().as_u16() {
            200 | 201 => {
                debug!("Uploaded {} ({} bytes)", name, size);
                Ok(())
            }
            409 | 412 if conditional => Err(TrackerError::Conflict { blob: name.to_string() }),
            _ => Err(TrackerError::StorageWrite {
                blob: name.to_string(),
                message: describe_failure(response).await,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = "c2VjcmV0LWtleS0xMjM0NQ==";

    fn make_client(endpoint: &str) -> AzureBlobClient {
        let credential = SharedKeyCredential::new("cards", TEST_KEY).unwrap();
        AzureBlobClient::with_endpoint(credential, endpoint, "indexes").unwrap()
    }

    #[test]
    fn test_default_endpoint_from_config() {
        let storage = StorageConfig {
            account: Some("cards".to_string()),
            access_key: Some(TEST_KEY.to_string()),
            ..StorageConfig::default()
        };
        let client = AzureBlobClient::new(&storage).unwrap();
        assert_eq!(client.endpoint, "https://cards.blob.core.windows.net");
        assert_eq!(client.endpoint_path(), "");
        assert_eq!(
            client.url(Some("Iono.json"), &[]),
            "https://cards.blob.core.windows.net/indexes/Iono.json"
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = AzureBlobClient::new(&StorageConfig::default()).err().unwrap();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn test_emulator_endpoint_paths() {
        let client = make_client("http://127.0.0.1:10000/devstoreaccount1/");
        assert_eq!(client.endpoint_path(), "/devstoreaccount1");
        assert_eq!(client.resource_path(None), "/devstoreaccount1/indexes");
        assert_eq!(
            client.url(None, &[("restype", "container")]),
            "http://127.0.0.1:10000/devstoreaccount1/indexes?restype=container"
        );
    }

    #[test]
    fn test_blob_names_are_encoded() {
        let client = make_client("https://cards.blob.core.windows.net");
        assert_eq!(client.resource_path(Some("Charizard ex.json")), "/indexes/Charizard%20ex.json");
    }

    #[test]
    fn test_extract_error_code() {
        let body = r#"<?xml version="1.0"?><Error><Code>AuthenticationFailed</Code></Error>"#;
        assert_eq!(extract_error_code(body), Some("AuthenticationFailed"));
        assert_eq!(extract_error_code("plain text"), None);
    }

    #[tokio::test]
    async fn test_ensure_container_created() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/indexes"))
            .and(query_param("restype", "container"))
            .and(header_exists("authorization"))
            .and(header("x-ms-version", API_VERSION))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        assert!(client.ensure_container().await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_container_already_exists() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(409).set_body_string(
                "<Error><Code>ContainerAlreadyExists</Code></Error>",
            ))
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        assert!(client.ensure_container().await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_container_forbidden() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/indexes"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string("<Error><Code>AuthenticationFailed</Code></Error>"),
            )
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let err = client.ensure_container().await.unwrap_err();
        assert!(matches!(err, TrackerError::StorageWrite { .. }));
        assert!(err.to_string().contains("AuthenticationFailed"));
    }

    #[tokio::test]
    async fn test_download_existing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/Iono.json"))
            .and(header_exists("x-ms-date"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("etag", "\"0x8DC0FFEE\"")
                    .set_body_string("[]"),
            )
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let blob = client.download("Iono.json").await.unwrap().unwrap();
        assert_eq!(blob.body, b"[]");
        assert_eq!(blob.etag.as_deref(), Some("\"0x8DC0FFEE\""));
    }

    #[tokio::test]
    async fn test_download_missing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/Iono.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        assert!(client.download("Iono.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_download_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/Iono.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let err = client.download("Iono.json").await.unwrap_err();
        assert!(matches!(err, TrackerError::StorageRead { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_upload_sends_json_block_blob() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/indexes/Iono.json"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("content-type", JSON_CONTENT_TYPE))
            .and(header("x-ms-blob-content-type", JSON_CONTENT_TYPE))
            .and(header("if-match", "\"0x8DC0FFEE\""))
            .and(header_exists("authorization"))
            .and(body_string("[1,2]"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let result = client
            .upload(
                "Iono.json",
                b"[1,2]".to_vec(),
                WriteCondition::IfMatch("\"0x8DC0FFEE\"".to_string()),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_upload_precondition_failed_is_conflict() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/indexes/Iono.json"))
            .and(header("if-none-match", "*"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let err = client.upload("Iono.json", b"[]".to_vec(), WriteCondition::IfAbsent).await.unwrap_err();
        assert!(matches!(err, TrackerError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_upload_unconditional_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/indexes/Iono.json"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let err = client
            .upload("Iono.json", b"[]".to_vec(), WriteCondition::Unconditional)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::StorageWrite { .. }));
    }
}
