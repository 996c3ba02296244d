//! Client for a hosted, Pinecone-compatible vector index REST API.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use imgsearch_core::config::IndexSettings;
use imgsearch_core::error::{Error, Result};
use imgsearch_core::types::{DistanceMetric, IndexEntry, IndexSpec, Namespace, QueryMatch};

use crate::service::{IndexService, QueryRequest};

#[derive(Debug, Clone)]
pub struct HttpIndexConfig {
    pub api_key: String,
    pub control_url: String,
    pub host: Option<String>,
    pub timeout: Duration,
    pub cloud: String,
    pub region: String,
}

impl HttpIndexConfig {
    pub fn from_settings(settings: &IndexSettings) -> Result<Self> {
        Ok(Self {
            api_key: settings.require_api_key()?.to_string(),
            control_url: settings.control_url.trim_end_matches('/').to_string(),
            host: settings.host.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            cloud: settings.cloud.clone(),
            region: settings.region.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateIndexRequest {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub spec: ServerlessSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerlessSpec {
    pub serverless: Serverless,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Serverless {
    pub cloud: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpsertBody<'a> {
    pub vectors: &'a [IndexEntry],
    pub namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBody<'a> {
    pub vector: &'a [f32],
    pub top_k: usize,
    pub namespace: &'a str,
    pub include_metadata: bool,
    pub include_values: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
}

/// Talks to the control plane (`/indexes`) and to one index's data-plane host.
///
/// The data-plane host comes from `index.host` or, failing that, from the
/// first `describe_index` response.
pub struct HttpIndexService {
    config: HttpIndexConfig,
    client: Client,
    host: OnceLock<String>,
}

fn with_scheme(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn parse<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if !status.is_success() {
        return Err(Error::Backend(format!("HTTP {status}: {body}")));
    }
    serde_json::from_str(body).map_err(|e| Error::Backend(format!("Failed to parse response: {e}")))
}

impl HttpIndexService {
    pub fn new(config: HttpIndexConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("index API key is required".into()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
        let host = OnceLock::new();
        if let Some(h) = config.host.as_deref() {
            let _ = host.set(with_scheme(h));
        }
        Ok(Self { config, client, host })
    }

    pub fn from_settings(settings: &IndexSettings) -> Result<Self> {
        Self::new(HttpIndexConfig::from_settings(settings)?)
    }

    async fn call(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request
            .header("Api-Key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(Error::backend)?;
        let status = response.status();
        let body = response.text().await.map_err(Error::backend)?;
        Ok((status, body))
    }

    fn data_host(&self) -> Result<&str> {
        self.host
            .get()
            .map(String::as_str)
            .ok_or_else(|| Error::Config("index.host is not set and the index was never described".into()))
    }
}

#[async_trait]
impl IndexService for HttpIndexService {
    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let body = CreateIndexRequest {
            name: spec.name.clone(),
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: Serverless { cloud: self.config.cloud.clone(), region: self.config.region.clone() },
            },
        };
        let url = format!("{}/indexes", self.config.control_url);
        let (status, text) = self.call(self.client.post(&url).json(&body)).await?;
        if status == StatusCode::CONFLICT {
            return Err(Error::IndexExists(spec.name.clone()));
        }
        if !status.is_success() {
            return Err(Error::Backend(format!("HTTP {status}: {text}")));
        }
        info!(index = %spec.name, cloud = %self.config.cloud, region = %self.config.region, "requested serverless index");
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexSpec> {
        let url = format!("{}/indexes/{name}", self.config.control_url);
        let (status, text) = self.call(self.client.get(&url)).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(Error::IndexNotFound(name.to_string()));
        }
        let description: IndexDescription = parse(status, &text)?;
        if let Some(h) = description.host.as_deref() {
            let _ = self.host.set(with_scheme(h));
        }
        IndexSpec::new(description.name, description.dimension, description.metric)
    }

    async fn upsert(&self, index: &str, namespace: &Namespace, entries: &[IndexEntry]) -> Result<usize> {
        let url = format!("{}/vectors/upsert", self.data_host()?);
        let body = UpsertBody { vectors: entries, namespace: namespace.as_str() };
        let (status, text) = self.call(self.client.post(&url).json(&body)).await?;
        let response: UpsertResponse = parse(status, &text)?;
        debug!(index, %namespace, upserted = response.upserted_count, "upsert call");
        Ok(response.upserted_count)
    }

    async fn query(&self, index: &str, namespace: &Namespace, request: &QueryRequest) -> Result<Vec<QueryMatch>> {
        let url = format!("{}/query", self.data_host()?);
        let body = QueryBody {
            vector: &request.vector,
            top_k: request.top_k,
            namespace: namespace.as_str(),
            include_metadata: request.include_metadata,
            include_values: request.include_values,
        };
        let (status, text) = self.call(self.client.post(&url).json(&body)).await?;
        let response: QueryResponse = parse(status, &text)?;
        debug!(index, %namespace, matches = response.matches.len(), "query call");
        Ok(response.matches)
    }
}
