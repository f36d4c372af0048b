//! Elasticsearch client over the REST API.
//!
//! Uses two endpoints only:
//!
//! * `POST /{index}/_doc` — insert with a server-assigned id
//! * `POST /{index}/_refresh` — make submitted documents searchable
//!
//! Elastic Cloud deployments are addressed by Cloud ID, which encodes the
//! deployment host and the Elasticsearch cluster UUID; [`decode_cloud_id`]
//! turns it into a plain HTTPS base URL.

use super::SearchIndex;
use crate::config::SearchConfig;
use crate::error::PipelineError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
enum Auth {
    None,
    Basic { username: String, password: String },
    ApiKey(String),
}

/// [`SearchIndex`] talking to an Elasticsearch cluster.
#[derive(Clone)]
pub struct ElasticsearchIndex {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl std::fmt::Debug for ElasticsearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match self.auth {
            Auth::None => "none",
            Auth::Basic { .. } => "basic",
            Auth::ApiKey(_) => "api_key",
        };
        f.debug_struct("ElasticsearchIndex")
            .field("base_url", &self.base_url)
            .field("auth", &auth)
            .finish()
    }
}

#[derive(Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

impl ElasticsearchIndex {
    /// Build a client from validated connection settings.
    pub fn new(config: &SearchConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let base_url = match (&config.url, &config.cloud_id) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(cloud_id)) => {
                decode_cloud_id(cloud_id).map_err(PipelineError::InvalidConfig)?
            }
            (None, None) => {
                return Err(PipelineError::InvalidConfig(
                    "either a URL or a Cloud ID is required".into(),
                ))
            }
        };

        let auth = match (&config.api_key, &config.username, &config.password) {
            (Some(key), _, _) => Auth::ApiKey(key.clone()),
            (None, Some(u), Some(p)) => Auth::Basic {
                username: u.clone(),
                password: p.clone(),
            },
            _ => Auth::None,
        };

        let timeout = if config.timeout_secs == 0 {
            30
        } else {
            config.timeout_secs
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| PipelineError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, path));
        match self.auth {
            Auth::None => builder,
            Auth::Basic {
                ref username,
                ref password,
            } => builder.basic_auth(username, Some(password)),
            Auth::ApiKey(ref key) => builder.header("Authorization", format!("ApiKey {key}")),
        }
    }
}

/// Read the body of a failed response into a short error detail.
async fn failure_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else if body.len() > 300 {
        let cut = (0..=300).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
        format!("HTTP {status}: {}\u{2026}", &body[..cut])
    } else {
        format!("HTTP {status}: {body}")
    }
}

impl SearchIndex for ElasticsearchIndex {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    fn index_document<'a>(
        &'a self,
        index: &'a str,
        document: &'a Value,
    ) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let response = self
                .request(Method::POST, &format!("{index}/_doc"))
                .json(document)
                .send()
                .await
                .map_err(|e| e.to_string())?;

            if !response.status().is_success() {
                return Err(failure_detail(response).await);
            }

            let body: IndexResponse = response
                .json()
                .await
                .map_err(|e| format!("unexpected index response: {e}"))?;
            debug!("Indexed document {} into '{}'", body.id, index);
            Ok(body.id)
        })
    }

    fn refresh<'a>(&'a self, index: &'a str) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            let response = self
                .request(Method::POST, &format!("{index}/_refresh"))
                .send()
                .await
                .map_err(|e| e.to_string())?;
            if !response.status().is_success() {
                return Err(failure_detail(response).await);
            }
            Ok(())
        })
    }
}

/// Decode an Elastic Cloud ID into the HTTPS base URL of its Elasticsearch
/// endpoint.
///
/// A Cloud ID is `{deployment}:{base64("{host}[:{port}]${es_uuid}[:{port}]${kibana_uuid}")}`;
/// the resulting URL is `https://{es_uuid}.{host}:{port}` with port 443
/// unless one is encoded.
pub fn decode_cloud_id(cloud_id: &str) -> Result<String, String> {
    let encoded = match cloud_id.split_once(':') {
        Some((_, rest)) => rest,
        None => cloud_id,
    };
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("Cloud ID is not valid base64: {e}"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| "Cloud ID is not UTF-8".to_string())?;

    let mut parts = decoded.split('$');
    let host = parts.next().unwrap_or_default();
    let es_uuid = parts.next().unwrap_or_default();
    if host.is_empty() || es_uuid.is_empty() {
        return Err("Cloud ID does not contain a host and Elasticsearch UUID".to_string());
    }

    let (host, mut port) = match host.rsplit_once(':') {
        Some((h, p)) => (h, p.to_string()),
        None => (host, "443".to_string()),
    };
    let es_uuid = match es_uuid.rsplit_once(':') {
        Some((u, p)) => {
            port = p.to_string();
            u
        }
        None => es_uuid,
    };

    Ok(format!("https://{es_uuid}.{host}:{port}"))
}
