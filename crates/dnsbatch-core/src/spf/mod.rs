//! SPF mechanism parsing and merging
//!
//! [`SpfEngine`] rewrites an SPF record so that it contains a given
//! mechanism while keeping the record well formed:
//!
//! 1. parse the record into [`SpfToken`]s
//! 2. append the new mechanism
//! 3. stable-sort by sort key (version first, `all` last)
//! 4. deduplicate by exact content, first occurrence wins
//! 5. strip configured exclusions
//! 6. join with single spaces
//!
//! The engine is pure: no I/O and no shared state. Validation findings are
//! reported through `tracing` and never stop a merge.

pub mod token;
pub mod validate;

pub use token::{SpfToken, SpfTokenKind, classify, parse};
pub use validate::{Severity, SpfDiagnostic, ValidationReport};

use crate::config::SpfConfig;
use std::collections::HashSet;
use tracing::{error, warn};

/// Parser, merger and validator for SPF records
#[derive(Debug, Clone, Default)]
pub struct SpfEngine {
    exclusions: Vec<String>,
    errors_only: bool,
}

impl SpfEngine {
    /// Create an engine from configuration
    pub fn new(config: &SpfConfig) -> Self {
        Self {
            exclusions: config.exclusions.clone(),
            errors_only: config.errors_only,
        }
    }

    /// Tokenize a record
    pub fn parse(&self, record: &str) -> Vec<SpfToken> {
        parse(record)
    }

    /// Add `mechanism` to the parsed record and reassemble it
    ///
    /// The mechanism is trimmed of surrounding whitespace before it becomes a
    /// token; one that is empty after trimming adds nothing. An empty record
    /// yields only the new mechanism, without version or `all` markers.
    pub fn merge(&self, mut tokens: Vec<SpfToken>, mechanism: &str) -> String {
        let mechanism = mechanism.trim();
        if !mechanism.is_empty() {
            tokens.push(SpfToken::mechanism(mechanism));
        }
        self.assemble(tokens)
    }

    /// Order, deduplicate, filter and join tokens
    pub fn assemble(&self, mut tokens: Vec<SpfToken>) -> String {
        tokens.sort_by_key(SpfToken::sort_key);

        let mut seen = HashSet::new();
        tokens
            .iter()
            .map(|t| t.content.as_str())
            .filter(|content| seen.insert(*content))
            .filter(|content| !self.exclusions.iter().any(|e| e == content))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse `record` and merge `mechanism` into it
    pub fn ensure_mechanism(&self, record: &str, mechanism: &str) -> String {
        self.merge(self.parse(record), mechanism)
    }

    /// Check a record's structure
    pub fn validate(&self, record: &str, domain: &str) -> ValidationReport {
        validate::validate(record, domain)
    }

    /// Log a report's findings
    ///
    /// Errors are always logged. Warnings are logged unless the engine is
    /// configured for errors only. Returns the number of findings logged.
    pub fn report(&self, report: &ValidationReport) -> usize {
        let threshold = if self.errors_only {
            Severity::Error
        } else {
            Severity::Warning
        };

        let mut logged = 0;
        for diagnostic in report.at_least(threshold) {
            match diagnostic.severity {
                Severity::Error => error!(
                    "[validate_spf] {} Invalid SPF '{}': {}",
                    report.domain, report.record, diagnostic.message
                ),
                Severity::Warning => warn!(
                    "[validate_spf] {} SPF '{}': {}",
                    report.domain, report.record, diagnostic.message
                ),
            }
            logged += 1;
        }
        logged
    }

    /// Mechanisms stripped on every rewrite
    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }
}
