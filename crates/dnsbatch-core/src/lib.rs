// # dnsbatch-core
//
// Core library for bulk DNS record management against a provider API.
//
// ## Architecture Overview
//
// - **DnsProvider**: Trait for phrasing, sending and reading provider API calls
// - **RemoteCallScheduler**: Paces every call by the rate-limit state the
//   provider reports, sleeping after a call rather than failing it
// - **SpfEngine**: Parses SPF records and merges mechanisms into them without
//   breaking ordering, duplicating entries or blocking on validation findings
// - **BatchEngine**: Applies insert/update/ensure-SPF operations across
//   caller-supplied domain and record lists, in dry-run or commit mode
//
// ## Design Principles
//
// 1. **Single thread of control**: one remote call at a time, in request order
// 2. **Throttle after, never fail on, rate limits**: a 429 is a normal result
// 3. **Partial-failure tolerance**: one failed record never aborts a batch
// 4. **Audit first**: every mutation is logged before it is sent

pub mod traits;
pub mod scheduler;
pub mod spf;
pub mod engine;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{ApiRequest, Clock, DnsProvider, HttpMethod, RawResponse, RecordSpec, SystemClock, ZonePage, ZoneRecord};
pub use scheduler::{RateWindow, RemoteCallScheduler, RemoteResult, Throttle};
pub use spf::{SpfEngine, SpfToken, SpfTokenKind, ValidationReport};
pub use engine::{BatchEngine, BatchEvent, BatchReport, MutationOutcome, RecordOperation};
pub use config::{BatchConfig, ProviderConfig, SchedulerConfig, SpfConfig};
pub use error::{Error, Result};
