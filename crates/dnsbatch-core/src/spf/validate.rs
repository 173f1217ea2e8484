//! Structural SPF checks (RFC 7208 §4.6, §5, §6)
//!
//! Validation never blocks a merge or a mutation. It produces a
//! [`ValidationReport`] that the caller logs and collects.

use super::token::unquote;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Maximum number of DNS-querying terms allowed in one record
pub const MAX_DNS_LOOKUPS: usize = 10;

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The record is legal but probably not what was intended
    Warning,
    /// The record violates SPF syntax or limits
    Error,
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpfDiagnostic {
    pub severity: Severity,
    pub message: String,
}

impl SpfDiagnostic {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Findings for one record, keyed by the domain it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Domain label the record was checked for
    pub domain: String,
    /// The record as checked
    pub record: String,
    /// Findings in encounter order
    pub diagnostics: Vec<SpfDiagnostic>,
}

impl ValidationReport {
    /// True when no error-severity finding was produced
    pub fn is_valid(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// True when there is anything to report at all
    pub fn has_findings(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Findings at or above a severity
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &SpfDiagnostic> {
        self.diagnostics.iter().filter(move |d| d.severity >= severity)
    }
}

/// Check a record's structure
pub fn validate(record: &str, domain: &str) -> ValidationReport {
    let mut diagnostics = Vec::new();
    let terms: Vec<&str> = unquote(record).split_whitespace().collect();

    match terms.first() {
        None => diagnostics.push(SpfDiagnostic::error("Record is empty")),
        Some(first) if !first.eq_ignore_ascii_case("v=spf1") => {
            diagnostics.push(SpfDiagnostic::error(format!(
                "Record must begin with 'v=spf1', found '{}'",
                first
            )));
        }
        Some(_) => {}
    }

    let mut lookups = 0;
    let mut seen_all = false;
    let mut seen_redirect = false;
    let mut seen_exp = false;
    let mut warned_after_all = false;

    for (index, term) in terms.iter().enumerate() {
        if term.eq_ignore_ascii_case("v=spf1") {
            if index > 0 {
                diagnostics.push(SpfDiagnostic::error("Duplicate 'v=spf1' version term"));
            }
            continue;
        }

        if seen_all && !warned_after_all {
            diagnostics.push(SpfDiagnostic::warning(format!(
                "Terms after 'all' are ignored, starting at '{}'",
                term
            )));
            warned_after_all = true;
        }

        if let Some((name, value)) = modifier(term) {
            match name.to_ascii_lowercase().as_str() {
                "redirect" => {
                    lookups += 1;
                    if seen_redirect {
                        diagnostics.push(SpfDiagnostic::error("Duplicate 'redirect' modifier"));
                    }
                    seen_redirect = true;
                }
                "exp" => {
                    if seen_exp {
                        diagnostics.push(SpfDiagnostic::error("Duplicate 'exp' modifier"));
                    }
                    seen_exp = true;
                }
                _ => diagnostics.push(SpfDiagnostic::warning(format!(
                    "Unknown modifier '{}'",
                    name
                ))),
            }
            if value.is_empty() {
                diagnostics.push(SpfDiagnostic::error(format!(
                    "Modifier '{}' has no value",
                    name
                )));
            }
            continue;
        }

        let body = term.trim_start_matches(['+', '-', '?', '~']);
        if body.len() + 1 < term.len() {
            diagnostics.push(SpfDiagnostic::error(format!(
                "Mechanism '{}' has more than one qualifier",
                term
            )));
        }

        let (name, rest) = split_mechanism(body);
        match name.to_ascii_lowercase().as_str() {
            "all" => {
                if !rest.is_empty() {
                    diagnostics.push(SpfDiagnostic::error(format!(
                        "'all' takes no arguments, found '{}'",
                        term
                    )));
                }
                seen_all = true;
            }
            "include" | "exists" => {
                lookups += 1;
                if domain_spec(rest).is_none_or(str::is_empty) {
                    diagnostics.push(SpfDiagnostic::error(format!(
                        "Mechanism '{}' requires a domain",
                        term
                    )));
                }
            }
            "a" | "mx" => {
                lookups += 1;
                if let Some(message) = check_dual_cidr(term, rest) {
                    diagnostics.push(SpfDiagnostic::error(message));
                }
            }
            "ptr" => {
                lookups += 1;
                diagnostics.push(SpfDiagnostic::warning(
                    "The 'ptr' mechanism is deprecated and should not be used",
                ));
            }
            "ip4" => {
                if let Some(message) = check_ip4(term, rest) {
                    diagnostics.push(SpfDiagnostic::error(message));
                }
            }
            "ip6" => {
                if let Some(message) = check_ip6(term, rest) {
                    diagnostics.push(SpfDiagnostic::error(message));
                }
            }
            _ => diagnostics.push(SpfDiagnostic::error(format!(
                "Unknown mechanism '{}'",
                term
            ))),
        }
    }

    if seen_all && seen_redirect {
        diagnostics.push(SpfDiagnostic::warning(
            "'redirect' is ignored when 'all' is present",
        ));
    }

    if lookups > MAX_DNS_LOOKUPS {
        diagnostics.push(SpfDiagnostic::error(format!(
            "Too many DNS lookups ({} > {})",
            lookups, MAX_DNS_LOOKUPS
        )));
    }

    ValidationReport {
        domain: domain.to_string(),
        record: record.to_string(),
        diagnostics,
    }
}

/// `name=value` terms are modifiers; names are alphanumeric plus `-_.`
fn modifier(term: &str) -> Option<(&str, &str)> {
    let (name, value) = term.split_once('=')?;
    let is_name = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    is_name.then_some((name, value))
}

/// Split `name[:arg][/cidr]` into the name and the remainder
fn split_mechanism(body: &str) -> (&str, &str) {
    match body.find([':', '/']) {
        Some(pos) => (&body[..pos], &body[pos..]),
        None => (body, ""),
    }
}

/// Domain part of `:domain[/cidr]`, `None` when no `:` is present
fn domain_spec(rest: &str) -> Option<&str> {
    let domain = rest.strip_prefix(':')?;
    Some(domain.split('/').next().unwrap_or(""))
}

fn check_dual_cidr(term: &str, rest: &str) -> Option<String> {
    let cidr_part = match rest.strip_prefix(':') {
        Some(domain) => {
            let (domain, cidr) = match domain.find('/') {
                Some(pos) => (&domain[..pos], &domain[pos..]),
                None => (domain, ""),
            };
            if domain.is_empty() {
                return Some(format!("Mechanism '{}' has an empty domain", term));
            }
            cidr
        }
        None => rest,
    };

    if cidr_part.is_empty() {
        return None;
    }

    let (v4, v6) = match cidr_part.split_once("//") {
        Some((v4, v6)) => (v4, Some(v6)),
        None => (cidr_part, None),
    };

    if !v4.is_empty() {
        let ok = v4
            .strip_prefix('/')
            .and_then(|n| n.parse::<u8>().ok())
            .is_some_and(|n| n <= 32);
        if !ok {
            return Some(format!("Mechanism '{}' has an invalid IPv4 prefix", term));
        }
    }
    if let Some(v6) = v6 {
        if !v6.parse::<u8>().is_ok_and(|n| n <= 128) {
            return Some(format!("Mechanism '{}' has an invalid IPv6 prefix", term));
        }
    }
    None
}

fn check_ip4(term: &str, rest: &str) -> Option<String> {
    let Some(network) = rest.strip_prefix(':') else {
        return Some(format!("Mechanism '{}' requires an address", term));
    };
    let (addr, prefix) = match network.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (network, None),
    };
    if addr.parse::<Ipv4Addr>().is_err() {
        return Some(format!("Mechanism '{}' has an invalid IPv4 address", term));
    }
    if let Some(prefix) = prefix {
        if !prefix.parse::<u8>().is_ok_and(|n| n <= 32) {
            return Some(format!("Mechanism '{}' has an invalid IPv4 prefix", term));
        }
    }
    None
}

fn check_ip6(term: &str, rest: &str) -> Option<String> {
    let Some(network) = rest.strip_prefix(':') else {
        return Some(format!("Mechanism '{}' requires an address", term));
    };
    let (addr, prefix) = match network.rsplit_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (network, None),
    };
    if addr.parse::<Ipv6Addr>().is_err() {
        return Some(format!("Mechanism '{}' has an invalid IPv6 address", term));
    }
    if let Some(prefix) = prefix {
        if !prefix.parse::<u8>().is_ok_and(|n| n <= 128) {
            return Some(format!("Mechanism '{}' has an invalid IPv6 prefix", term));
        }
    }
    None
}
