//! Bulk record operations
//!
//! The BatchEngine is responsible for:
//! - Issuing every provider call through the [`RemoteCallScheduler`]
//! - Logging each intended mutation before it is sent
//! - Computing merged SPF values with the [`SpfEngine`]
//! - Carrying on past a failed domain or record
//!
//! ## Architecture
//!
//! ```text
//!  domains / records (caller supplied)
//!             │
//!             ▼
//!    ┌──────────────────┐        ┌─────────────┐
//!    │   BatchEngine    │───────▶│  SpfEngine  │
//!    └──────────────────┘        └─────────────┘
//!             │
//!             ▼
//!  ┌─────────────────────┐       ┌─────────────┐
//!  │ RemoteCallScheduler │──────▶│ DnsProvider │
//!  └─────────────────────┘       └─────────────┘
//!             │
//!             ▼
//!       BatchEvent stream
//! ```
//!
//! ## Dry-run
//!
//! With `commit = false` every mutation is logged and reported as
//! [`MutationOutcome::Planned`]; no mutating request reaches the provider.
//! Read-only fetches are always sent.

use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::scheduler::RemoteCallScheduler;
use crate::spf::SpfEngine;
use crate::spf::token::unquote;
use crate::traits::{ApiRequest, Clock, DnsProvider, RecordSpec, SystemClock, ZonePage, ZoneRecord};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the BatchEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// A batch started
    Started {
        total: usize,
        commit: bool,
    },

    /// A mutation was logged but not sent (dry run)
    MutationPlanned {
        target: String,
        description: String,
    },

    /// A mutation was accepted by the provider
    MutationApplied {
        target: String,
        status: u16,
    },

    /// The provider answered a mutation with a non-2xx status
    MutationRejected {
        target: String,
        status: u16,
    },

    /// A mutation could not be issued
    MutationFailed {
        target: String,
        error: String,
    },

    /// SPF validation produced findings
    SpfDiagnostics {
        domain: String,
        record: String,
        count: usize,
    },

    /// A batch finished
    Finished {
        attempted: usize,
        failed: usize,
    },
}

/// What happened to one requested mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Logged only (dry run)
    Planned,
    /// Nothing to change; no request sent
    Unchanged,
    /// Provider answered 2xx
    Applied { status: u16 },
    /// Provider answered with another status
    Rejected { status: u16, message: String },
}

/// Operation applied to each record of a record batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOperation {
    /// Replace the content outright
    UpdateValue(String),
    /// Merge a mechanism into the SPF content
    EnsureSpfMechanism(String),
}

/// Tally of a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub applied: usize,
    pub planned: usize,
    pub unchanged: usize,
    pub rejected: usize,
    /// Failed targets with the error that stopped them
    pub failures: Vec<(String, String)>,
}

impl BatchReport {
    fn record(&mut self, target: &str, outcome: &Result<MutationOutcome>) {
        self.attempted += 1;
        match outcome {
            Ok(MutationOutcome::Planned) => self.planned += 1,
            Ok(MutationOutcome::Unchanged) => self.unchanged += 1,
            Ok(MutationOutcome::Applied { .. }) => self.applied += 1,
            Ok(MutationOutcome::Rejected { .. }) => self.rejected += 1,
            Err(e) => self.failures.push((target.to_string(), e.to_string())),
        }
    }

    /// Number of operations that failed to issue
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Bulk DNS record engine
///
/// ## Threading
///
/// Operations take `&self`; concurrent callers are serialised by the
/// scheduler, one remote call at a time.
pub struct BatchEngine {
    /// Provider used to phrase and read requests
    provider: Arc<dyn DnsProvider>,

    /// Paces every call
    scheduler: RemoteCallScheduler,

    /// SPF rewriting
    spf: SpfEngine,

    /// Send mutations (false = dry run)
    commit: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<BatchEvent>,
}

impl BatchEngine {
    /// Create a new batch engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields batch events
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        config: BatchConfig,
    ) -> Result<(Self, mpsc::Receiver<BatchEvent>)> {
        Self::with_clock(provider, config, Arc::new(SystemClock))
    }

    /// Create a new batch engine with an explicit wall clock
    pub fn with_clock(
        provider: Arc<dyn DnsProvider>,
        config: BatchConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, mpsc::Receiver<BatchEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        info!(
            "Batch engine ready: provider {}, throttle {}ms, committing? {}",
            provider.provider_name(),
            config.scheduler.min_interval_ms,
            if config.commit { "yes" } else { "no" }
        );

        let engine = Self {
            scheduler: RemoteCallScheduler::with_clock(
                Arc::clone(&provider),
                config.scheduler,
                clock,
            ),
            provider,
            spf: SpfEngine::new(&config.spf),
            commit: config.commit,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Scheduler used for every call
    pub fn scheduler(&self) -> &RemoteCallScheduler {
        &self.scheduler
    }

    /// SPF engine used for merges
    pub fn spf(&self) -> &SpfEngine {
        &self.spf
    }

    /// Whether mutations are sent
    pub fn is_committing(&self) -> bool {
        self.commit
    }

    /// Fetch one page of zones
    pub async fn fetch_zone_page(&self, page: u32) -> Result<ZonePage> {
        let result = self
            .scheduler
            .execute(self.provider.list_zones_request(page))
            .await?;
        if !result.is_success() {
            return Err(Error::unexpected_response(format!(
                "Listing zone page {} returned {}: {}",
                page, result.status_code, result.status_message
            )));
        }

        let zone_page = self.provider.parse_zone_page(&result.body)?;
        info!(
            "[fetch_zone_page] Got zone page {} of {}",
            zone_page.page, zone_page.total_pages
        );
        Ok(zone_page)
    }

    /// Fetch the records of one zone
    pub async fn fetch_zone_records(&self, zone: &str) -> Result<Vec<ZoneRecord>> {
        let result = self
            .scheduler
            .execute(self.provider.list_records_request(zone))
            .await?;
        if !result.is_success() {
            return Err(Error::unexpected_response(format!(
                "Listing records of {} returned {}: {}",
                zone, result.status_code, result.status_message
            )));
        }

        let records = self.provider.parse_records(zone, &result.body)?;
        info!("[fetch_zone_records] Got {} records for {}", records.len(), zone);
        Ok(records)
    }

    /// Create a record in a zone
    pub async fn insert_record(&self, zone: &str, record: &RecordSpec) -> Result<MutationOutcome> {
        let description = format!(
            "{} {} {} {}",
            zone,
            record.record_type,
            record.display_name(),
            record.content
        );
        info!("[insert_record] {}", description);

        let request = self.provider.create_record_request(zone, record);
        self.mutate(zone, description, request).await
    }

    /// Replace a record's content
    pub async fn update_record_value(
        &self,
        record: &ZoneRecord,
        value: &str,
    ) -> Result<MutationOutcome> {
        let target = record_target(record);
        let description = format!(
            "{} {} {} > {}",
            record.record_type,
            record.display_name(),
            record.content,
            value
        );
        info!("[update_record_value] {} {}", record.zone, description);

        let request = self.provider.update_record_request(record, value);
        self.mutate(&target, description, request).await
    }

    /// Merge an SPF mechanism into a record's content
    ///
    /// Both the current and the merged value are validated; findings are
    /// logged and emitted but never stop the update.
    pub async fn ensure_spf_mechanism(
        &self,
        record: &ZoneRecord,
        mechanism: &str,
    ) -> Result<MutationOutcome> {
        self.check_spf(&record.content, &record.zone);
        let new_value = self.spf.ensure_mechanism(&record.content, mechanism);
        self.check_spf(&new_value, &record.zone);

        let target = record_target(record);
        // Stored TXT content may be quoted; the merged value never is.
        if new_value == unquote(&record.content) {
            debug!(
                "[ensure_spf_mechanism] {} already contains {}",
                target, mechanism
            );
            return Ok(MutationOutcome::Unchanged);
        }

        let description = format!(
            "{} {} {} > {}",
            record.record_type,
            record.display_name(),
            record.content,
            new_value
        );
        info!("[ensure_spf_mechanism] {} {}", record.zone, description);

        let request = self.provider.update_record_request(record, &new_value);
        self.mutate(&target, description, request).await
    }

    /// Insert the same record into every domain
    ///
    /// A failure on one domain is logged and recorded; the batch continues.
    pub async fn run_domain_batch(&self, domains: &[String], record: &RecordSpec) -> BatchReport {
        let total = domains.len();
        info!("[domain_batch] {} domains ready", total);
        self.emit_event(BatchEvent::Started {
            total,
            commit: self.commit,
        });

        let mut report = BatchReport::default();
        for (i, domain) in domains.iter().enumerate() {
            info!("[domain_batch] domain {} of {}", i + 1, total);
            let outcome = self.insert_record(domain, record).await;
            if let Err(e) = &outcome {
                error!("[domain_batch] {} failed: {}", domain, e);
            }
            report.record(domain, &outcome);
        }

        self.finish(&report);
        report
    }

    /// Apply one operation to every record
    ///
    /// A failure on one record is logged and recorded; the batch continues.
    pub async fn run_record_batch(
        &self,
        records: &[ZoneRecord],
        operation: &RecordOperation,
    ) -> BatchReport {
        let total = records.len();
        info!("[record_batch] {} records ready", total);
        self.emit_event(BatchEvent::Started {
            total,
            commit: self.commit,
        });

        let mut report = BatchReport::default();
        for (i, record) in records.iter().enumerate() {
            info!("[record_batch] record {} of {}", i + 1, total);
            let outcome = match operation {
                RecordOperation::UpdateValue(value) => self.update_record_value(record, value).await,
                RecordOperation::EnsureSpfMechanism(mechanism) => {
                    self.ensure_spf_mechanism(record, mechanism).await
                }
            };
            let target = record_target(record);
            if let Err(e) = &outcome {
                error!("[record_batch] {} failed: {}", target, e);
            }
            report.record(&target, &outcome);
        }

        self.finish(&report);
        report
    }

    /// Send (or in dry-run, only announce) a mutating request
    async fn mutate(
        &self,
        target: &str,
        description: String,
        request: ApiRequest,
    ) -> Result<MutationOutcome> {
        if !self.commit {
            debug!("[dry-run] Would send {}", request);
            self.emit_event(BatchEvent::MutationPlanned {
                target: target.to_string(),
                description,
            });
            return Ok(MutationOutcome::Planned);
        }

        let result = match self.scheduler.execute(request).await {
            Ok(result) => result,
            Err(e) => {
                self.emit_event(BatchEvent::MutationFailed {
                    target: target.to_string(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        if result.is_success() {
            self.emit_event(BatchEvent::MutationApplied {
                target: target.to_string(),
                status: result.status_code,
            });
            Ok(MutationOutcome::Applied {
                status: result.status_code,
            })
        } else {
            warn!(
                "{} rejected with {}: {}",
                target, result.status_code, result.status_message
            );
            self.emit_event(BatchEvent::MutationRejected {
                target: target.to_string(),
                status: result.status_code,
            });
            Ok(MutationOutcome::Rejected {
                status: result.status_code,
                message: rejection_message(&result.body, &result.status_message),
            })
        }
    }

    fn check_spf(&self, record: &str, domain: &str) {
        let report = self.spf.validate(record, domain);
        if self.spf.report(&report) > 0 {
            self.emit_event(BatchEvent::SpfDiagnostics {
                domain: report.domain.clone(),
                record: report.record.clone(),
                count: report.diagnostics.len(),
            });
        }
    }

    fn finish(&self, report: &BatchReport) {
        info!(
            "Batch done: {} attempted, {} applied, {} planned, {} unchanged, {} rejected, {} failed",
            report.attempted,
            report.applied,
            report.planned,
            report.unchanged,
            report.rejected,
            report.failed()
        );
        self.emit_event(BatchEvent::Finished {
            attempted: report.attempted,
            failed: report.failed(),
        });
    }

    /// Emit a batch event
    fn emit_event(&self, event: BatchEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

fn record_target(record: &ZoneRecord) -> String {
    format!("{}#{}", record.zone, record.id)
}

/// Prefer the API's own error message over the bare reason phrase
fn rejection_message(body: &serde_json::Value, status_message: &str) -> String {
    body.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or(status_message)
        .to_string()
}
