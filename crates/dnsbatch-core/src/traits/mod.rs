//! Core traits for dnsbatch
//!
//! This module defines the abstract interfaces that implementations must follow.
//!
//! - [`DnsProvider`]: Build, send and read provider API requests
//! - [`Clock`]: Wall-clock time for rate-limit reset arithmetic

pub mod clock;
pub mod dns_provider;

pub use clock::{Clock, SystemClock};
pub use dns_provider::{
    ApiRequest, DnsProvider, HttpMethod, RawResponse, RecordSpec, ZonePage, ZoneRecord,
};
