// # DNSimple DNS Provider
//
// This crate provides the DNSimple API v2 provider for dnsbatch.
//
// ## Responsibilities
//
// - Phrase zone listing, record listing, record creation and record update
//   requests against the account-scoped API
// - Send exactly one HTTP request per `send` call with a 30 second timeout
// - Hand back every HTTP response as-is, whatever its status
// - Read `data` and `pagination` out of response bodies
//
// Retry, backoff and throttling are owned by `RemoteCallScheduler`. A 429
// is returned like any other response so the scheduler can read the
// rate-limit headers on it.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Construction fails if the token or account id is empty
//
// ## API Reference
//
// - DNSimple API v2: https://developer.dnsimple.com/v2/
// - List Zones: GET `/:account/zones?per_page=100&page=:n`
// - List Records: GET `/:account/zones/:zone/records?per_page=100`
// - Create Record: POST `/:account/zones/:zone/records`
// - Update Record: PATCH `/:account/zones/:zone/records/:id`

use async_trait::async_trait;
use dnsbatch_core::config::{BatchConfig, ProviderConfig};
use dnsbatch_core::traits::{
    ApiRequest, DnsProvider, HttpMethod, RawResponse, RecordSpec, ZonePage, ZoneRecord,
};
use dnsbatch_core::{BatchEngine, BatchEvent, Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size requested from list endpoints
const PER_PAGE: u32 = 100;

/// DNSimple DNS provider
///
/// Stateless apart from the HTTP client: every call is independent and the
/// same provider can be shared behind an `Arc` by the scheduler and engine.
pub struct DnsimpleProvider {
    /// Bearer token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Account the zones belong to
    account_id: String,

    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for DnsimpleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsimpleProvider")
            .field("api_token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DnsimpleProvider {
    /// Create a new DNSimple provider
    ///
    /// # Errors
    ///
    /// `Error::Config` if the configuration is incomplete or the HTTP client
    /// cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("dnsbatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token: config.api_token.clone(),
            account_id: config.account_id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl DnsProvider for DnsimpleProvider {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };

        let mut builder = self
            .client
            .request(method, self.url(&request.path))
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(format!("{} failed: {}", request, e)))?;

        let status = response.status();
        // Header names from reqwest are already lowercase.
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("{} body read failed: {}", request, e)))?;

        Ok(RawResponse {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: parse_body(&text),
        })
    }

    fn list_zones_request(&self, page: u32) -> ApiRequest {
        ApiRequest::new(
            HttpMethod::Get,
            format!(
                "{}/zones?per_page={}&page={}",
                self.account_id,
                PER_PAGE,
                page.max(1)
            ),
        )
    }

    fn list_records_request(&self, zone: &str) -> ApiRequest {
        ApiRequest::new(
            HttpMethod::Get,
            format!("{}/zones/{}/records?per_page={}", self.account_id, zone, PER_PAGE),
        )
    }

    fn create_record_request(&self, zone: &str, record: &RecordSpec) -> ApiRequest {
        ApiRequest::new(
            HttpMethod::Post,
            format!("{}/zones/{}/records", self.account_id, zone),
        )
        .with_payload(serde_json::json!({
            "name": record.name.as_deref().unwrap_or_default(),
            "type": record.record_type,
            "content": record.content,
        }))
    }

    fn update_record_request(&self, record: &ZoneRecord, content: &str) -> ApiRequest {
        ApiRequest::new(
            HttpMethod::Patch,
            format!(
                "{}/zones/{}/records/{}",
                self.account_id, record.zone, record.id
            ),
        )
        .with_payload(serde_json::json!({ "content": content }))
    }

    fn parse_zone_page(&self, body: &Value) -> Result<ZonePage> {
        let envelope: Envelope<Vec<ZoneData>> = serde_json::from_value(body.clone())?;
        let pagination = envelope.pagination.unwrap_or_default();

        Ok(ZonePage {
            zones: envelope.data.into_iter().map(|z| z.name).collect(),
            page: pagination.current_page.max(1),
            total_pages: pagination.total_pages.max(1),
        })
    }

    fn parse_records(&self, zone: &str, body: &Value) -> Result<Vec<ZoneRecord>> {
        let envelope: Envelope<Vec<RecordData>> = serde_json::from_value(body.clone())?;

        Ok(envelope
            .data
            .into_iter()
            .map(|r| ZoneRecord {
                id: r.id,
                zone: zone.to_string(),
                record_type: r.record_type,
                name: r.name,
                ttl: r.ttl,
                priority: r.priority,
                content: r.content,
            })
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "dnsimple"
    }
}

/// Build a DNSimple provider and a batch engine on top of it
///
/// # Returns
///
/// A tuple of (engine, event_receiver), as from [`BatchEngine::new`]
pub fn batch_engine(config: BatchConfig) -> Result<(BatchEngine, mpsc::Receiver<BatchEvent>)> {
    let provider = DnsimpleProvider::new(&config.provider)?;
    tracing::debug!("Created {:?}", provider);
    BatchEngine::new(Arc::new(provider), config)
}

/// JSON if the body parses as JSON, otherwise the raw text as a JSON string
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    current_page: u32,
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct ZoneData {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecordData {
    id: u64,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    content: String,
    ttl: Option<u32>,
    priority: Option<u32>,
}
