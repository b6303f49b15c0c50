//! Metadata document acquisition
//!
//! Fetching is the only blocking step of a metadata load and is delegated to
//! a [`Connection`] collaborator; timeouts and retries are its business, not
//! the compiler's. A local file path can stand in for the network entirely.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};

use crate::compiler::{compile_with_root, CompiledSchema};
use crate::error::MetadataError;

/// Fetches a byte stream for a URL. Implementors own transport concerns:
/// authentication, timeouts, retries.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>, MetadataError>;
}

/// Plain HTTPS connection with pooling, for services that need no custom
/// transport.
pub struct HttpConnection {
    client: reqwest::Client,
}

impl HttpConnection {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("odata-metadata/0.1")
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }

    /// Use a preconfigured client (custom TLS, proxies, auth middleware).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn get(&self, url: &str) -> Result<Vec<u8>, MetadataError> {
        let response = self.client.get(url).send().await?;
        debug!("Metadata request status: {}", response.status());
        if !response.status().is_success() {
            return Err(MetadataError::Status(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// One service's metadata endpoint. Loading compiles the document into a
/// fresh [`CompiledSchema`]; reloading builds a new graph rather than
/// mutating the old one.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    service_url: String,
    local_file: Option<PathBuf>,
}

impl Metadata {
    /// Metadata for the service root; the document is fetched from
    /// `<url>$metadata/`.
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            local_file: None,
        }
    }

    /// Metadata read from a local document instead of the service.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            service_url: String::new(),
            local_file: Some(path.into()),
        }
    }

    /// Read the document from the given file, keeping the service root for
    /// the compiled graph.
    pub fn with_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_file = Some(path.into());
        self
    }

    pub fn metadata_url(&self) -> String {
        format!("{}$metadata/", self.service_url)
    }

    /// Acquire and compile the document. Retrieval failures (I/O, HTTP) and
    /// parse failures are the only errors; both fail fast.
    pub async fn load(&self, connection: &dyn Connection) -> Result<CompiledSchema, MetadataError> {
        let xml = match &self.local_file {
            Some(path) => {
                info!("Reading metadata document: {}", path.display());
                std::fs::read_to_string(path)?
            }
            None => {
                let url = self.metadata_url();
                info!("Loading metadata document: {url}");
                let bytes = connection.get(&url).await?;
                String::from_utf8(bytes)?
            }
        };
        compile_with_root(&xml, &self.service_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;

    struct StaticConnection(&'static [u8]);

    #[async_trait]
    impl Connection for StaticConnection {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, MetadataError> {
            Ok(self.0.to_vec())
        }
    }

    const DOC: &[u8] = br#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="NS">
      <EntityType Name="Account">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Guid"/>
      </EntityType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    #[tokio::test]
    async fn test_load_from_connection() {
        let metadata = Metadata::new("https://example.org/api/data/v9.2/");
        let compiled = metadata.load(&StaticConnection(DOC)).await.unwrap();
        assert_eq!(
            compiled.base.service_root,
            "https://example.org/api/data/v9.2/"
        );
        assert!(compiled.types.entity("NS.Account").is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_a_retrieval_error() {
        let metadata = Metadata::from_file("/nonexistent/$metadata.xml");
        let err = metadata
            .load(&StaticConnection(DOC))
            .await
            .unwrap_err();
        assert!(err.is_retrieval());
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_a_parse_error() {
        let metadata = Metadata::new("https://example.org/");
        let err = metadata
            .load(&StaticConnection(b"not xml at all <"))
            .await
            .unwrap_err();
        assert!(!err.is_retrieval());
    }

    #[test]
    fn test_metadata_url_suffix() {
        let metadata = Metadata::new("https://example.org/odata/");
        assert_eq!(metadata.metadata_url(), "https://example.org/odata/$metadata/");
    }
}
