//! Test doubles and common utilities for contract tests
//!
//! This module provides a scripted provider and a fixed wall clock so the
//! scheduler and batch engine can be driven without a network.

#![allow(dead_code)]

use dnsbatch_core::config::{BatchConfig, SchedulerConfig};
use dnsbatch_core::error::{Error, Result};
use dnsbatch_core::traits::{
    ApiRequest, Clock, DnsProvider, HttpMethod, RawResponse, RecordSpec, ZonePage, ZoneRecord,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// A wall clock that only moves when told to
pub struct FixedClock {
    now_millis: AtomicI64,
}

impl FixedClock {
    pub fn new(now_millis: i64) -> Arc<Self> {
        Arc::new(Self {
            now_millis: AtomicI64::new(now_millis),
        })
    }

    pub fn set(&self, now_millis: i64) {
        self.now_millis.store(now_millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.now_millis.load(Ordering::SeqCst)
    }
}

/// A provider that answers from a script and records what it was asked
///
/// When the script runs out, every further call gets `200 OK` with
/// `x-ratelimit-remaining: 2000`.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<RawResponse>>>,
    sent: Mutex<Vec<(Instant, ApiRequest)>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Queue the next answer
    pub fn push(&self, answer: Result<RawResponse>) {
        self.script.lock().unwrap().push_back(answer);
    }

    /// Requests received, in order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Times at which requests were received
    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DnsProvider for ScriptedProvider {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.sent
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(response(200, &[("x-ratelimit-remaining", "2000")], serde_json::json!({}))))
    }

    fn list_zones_request(&self, page: u32) -> ApiRequest {
        ApiRequest::new(HttpMethod::Get, format!("1/zones?page={}", page))
    }

    fn list_records_request(&self, zone: &str) -> ApiRequest {
        ApiRequest::new(HttpMethod::Get, format!("1/zones/{}/records", zone))
    }

    fn create_record_request(&self, zone: &str, record: &RecordSpec) -> ApiRequest {
        ApiRequest::new(HttpMethod::Post, format!("1/zones/{}/records", zone)).with_payload(
            serde_json::json!({
                "name": record.name.clone().unwrap_or_default(),
                "type": record.record_type,
                "content": record.content,
            }),
        )
    }

    fn update_record_request(&self, record: &ZoneRecord, content: &str) -> ApiRequest {
        ApiRequest::new(
            HttpMethod::Patch,
            format!("1/zones/{}/records/{}", record.zone, record.id),
        )
        .with_payload(serde_json::json!({ "content": content }))
    }

    fn parse_zone_page(&self, body: &serde_json::Value) -> Result<ZonePage> {
        let zones = body["data"]
            .as_array()
            .ok_or_else(|| Error::unexpected_response("data is not an array"))?
            .iter()
            .filter_map(|z| z["name"].as_str().map(str::to_string))
            .collect();
        Ok(ZonePage {
            zones,
            page: body["pagination"]["current_page"].as_u64().unwrap_or(1) as u32,
            total_pages: body["pagination"]["total_pages"].as_u64().unwrap_or(1) as u32,
        })
    }

    fn parse_records(&self, zone: &str, body: &serde_json::Value) -> Result<Vec<ZoneRecord>> {
        let data = body["data"]
            .as_array()
            .ok_or_else(|| Error::unexpected_response("data is not an array"))?;
        Ok(data
            .iter()
            .map(|r| ZoneRecord {
                id: r["id"].as_u64().unwrap_or(0),
                zone: zone.to_string(),
                record_type: r["type"].as_str().unwrap_or_default().to_string(),
                name: r["name"].as_str().unwrap_or_default().to_string(),
                ttl: r["ttl"].as_u64().map(|t| t as u32),
                priority: r["priority"].as_u64().map(|p| p as u32),
                content: r["content"].as_str().unwrap_or_default().to_string(),
            })
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Build a raw response
pub fn response(status_code: u16, headers: &[(&str, &str)], body: serde_json::Value) -> RawResponse {
    RawResponse {
        status_code,
        status_message: match status_code {
            200 => "OK",
            201 => "Created",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            _ => "",
        }
        .to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        body,
    }
}

/// A TXT record carrying `content`
pub fn txt_record(id: u64, zone: &str, content: &str) -> ZoneRecord {
    ZoneRecord {
        id,
        zone: zone.to_string(),
        record_type: "TXT".to_string(),
        name: String::new(),
        ttl: Some(3600),
        priority: None,
        content: content.to_string(),
    }
}

/// Scheduler config with the default pad and a given interval
pub fn scheduler_config(min_interval_ms: u64) -> SchedulerConfig {
    SchedulerConfig {
        min_interval_ms,
        ..SchedulerConfig::default()
    }
}

/// Helper to create a minimal BatchConfig for testing
pub fn minimal_config(commit: bool) -> BatchConfig {
    let mut config = BatchConfig::new("test-token", "1");
    config.commit = commit;
    config.scheduler = scheduler_config(0);
    config.event_channel_capacity = 100;
    config
}

/// Route engine logs to the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
