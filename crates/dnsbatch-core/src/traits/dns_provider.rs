// # DNS Provider Trait
//
// Defines the interface between dnsbatch and a remote DNS provider API.
//
// ## Implementations
//
// - DNSimple v2: `dnsbatch-provider-dnsimple` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsbatch_core::{DnsProvider, RemoteCallScheduler};
//
// let request = provider.list_records_request("example.com");
// let result = scheduler.execute(request).await?;
// let records = provider.parse_records("example.com", &result.body)?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// HTTP method of a logical API request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
        };
        f.write_str(name)
    }
}

/// One logical request against the provider API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the API base, including any query string
    pub path: String,
    /// JSON payload for mutations
    pub payload: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a request without payload
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            payload: None,
        }
    }

    /// Attach a JSON payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A response as received from the wire, before any interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Reason phrase for the status
    pub status_message: String,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// JSON body; plain-text bodies are carried as a JSON string
    pub body: serde_json::Value,
}

impl RawResponse {
    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A DNS record as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Provider record id
    pub id: u64,
    /// Zone (domain) the record belongs to
    pub zone: String,
    /// Record type, e.g. `TXT`
    pub record_type: String,
    /// Record name relative to the zone; empty for the apex
    pub name: String,
    /// Time-to-live
    pub ttl: Option<u32>,
    /// Priority (MX, SRV)
    pub priority: Option<u32>,
    /// Record content
    pub content: String,
}

impl ZoneRecord {
    /// Record name for display, `@` for the apex
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { "@" } else { &self.name }
    }

    /// Whether the content looks like an SPF policy
    pub fn is_spf(&self) -> bool {
        self.content
            .trim_start_matches('"')
            .to_ascii_lowercase()
            .starts_with("v=spf1")
    }
}

/// A record to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    /// Record type
    pub record_type: String,
    /// Record name; `None` or empty for the apex
    pub name: Option<String>,
    /// Record content
    pub content: String,
}

impl RecordSpec {
    /// Create a record specification
    pub fn new(
        record_type: impl Into<String>,
        name: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            name,
            content: content.into(),
        }
    }

    /// Record name for display, `@` for the apex
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "@",
        }
    }
}

/// One page of zone names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonePage {
    /// Zone names on this page
    pub zones: Vec<String>,
    /// Current page (1-based)
    pub page: u32,
    /// Total number of pages reported by the provider
    pub total_pages: u32,
}

/// Trait for DNS provider implementations
///
/// A provider knows how to phrase requests for its API and how to read the
/// answers. It sends exactly one HTTP request per [`DnsProvider::send`].
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed call is surfaced to the caller)
/// - ❌ Sleep or throttle (owned by `RemoteCallScheduler`)
/// - ❌ Treat non-2xx statuses as errors (a 429 is a valid response)
/// - ❌ Log the API token
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Send a single request
    ///
    /// # Returns
    ///
    /// - `Ok(RawResponse)`: any HTTP response, whatever its status
    /// - `Err(Error::Transport)`: no response was received
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, crate::Error>;

    /// Request for one page of zones (1-based)
    fn list_zones_request(&self, page: u32) -> ApiRequest;

    /// Request for the records of a zone
    fn list_records_request(&self, zone: &str) -> ApiRequest;

    /// Request creating a record in a zone
    fn create_record_request(&self, zone: &str, record: &RecordSpec) -> ApiRequest;

    /// Request replacing the content of an existing record
    fn update_record_request(&self, record: &ZoneRecord, content: &str) -> ApiRequest;

    /// Read a zone page from a `list_zones_request` response body
    fn parse_zone_page(&self, body: &serde_json::Value) -> Result<ZonePage, crate::Error>;

    /// Read records from a `list_records_request` response body
    fn parse_records(
        &self,
        zone: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<ZoneRecord>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
