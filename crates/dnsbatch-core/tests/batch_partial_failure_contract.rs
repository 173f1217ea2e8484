//! Contract Test: Batch Execution and Partial Failure
//!
//! Constraints verified:
//! - A failure on one record is recorded and the batch continues
//! - Dry-run mode sends no mutating request and reports every mutation as planned
//! - An SPF update sends the merged value, and an unchanged merge sends nothing
//! - A non-2xx answer is a rejection, not a failure
//! - Events are emitted for each step

mod common;

use common::*;
use dnsbatch_core::error::Error;
use dnsbatch_core::traits::{DnsProvider, HttpMethod, RecordSpec};
use dnsbatch_core::{BatchEngine, BatchEvent, MutationOutcome, RecordOperation};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

fn engine(
    provider: &Arc<ScriptedProvider>,
    commit: bool,
) -> (BatchEngine, tokio::sync::mpsc::Receiver<BatchEvent>) {
    BatchEngine::with_clock(
        Arc::clone(provider) as Arc<dyn DnsProvider>,
        minimal_config(commit),
        FixedClock::new(1_700_000_000_000),
    )
    .unwrap()
}

async fn drain(engine: BatchEngine, rx: tokio::sync::mpsc::Receiver<BatchEvent>) -> Vec<BatchEvent> {
    drop(engine);
    ReceiverStream::new(rx).collect().await
}

#[tokio::test(start_paused = true)]
async fn transport_error_does_not_stop_batch() {
    init_tracing();
    let provider = ScriptedProvider::new();
    provider.push(Ok(response(200, &[], serde_json::json!({}))));
    provider.push(Err(Error::transport("connection reset by peer")));
    provider.push(Ok(response(200, &[], serde_json::json!({}))));
    let (engine, rx) = engine(&provider, true);

    let records = vec![
        txt_record(1, "a.com", "old"),
        txt_record(2, "b.com", "old"),
        txt_record(3, "c.com", "old"),
    ];
    let report = engine
        .run_record_batch(&records, &RecordOperation::UpdateValue("new".to_string()))
        .await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].0, "b.com#2");
    assert!(report.failures[0].1.contains("connection reset"));
    assert_eq!(provider.call_count(), 3);
    assert_eq!(provider.requests()[2].path, "1/zones/c.com/records/3");

    let events = drain(engine, rx).await;
    assert_eq!(
        events.first(),
        Some(&BatchEvent::Started {
            total: 3,
            commit: true
        })
    );
    assert!(events.contains(&BatchEvent::MutationFailed {
        target: "b.com#2".to_string(),
        error: "Transport error: connection reset by peer".to_string(),
    }));
    assert!(events.contains(&BatchEvent::MutationApplied {
        target: "c.com#3".to_string(),
        status: 200,
    }));
    assert_eq!(
        events.last(),
        Some(&BatchEvent::Finished {
            attempted: 3,
            failed: 1
        })
    );
}

#[tokio::test(start_paused = true)]
async fn dry_run_sends_no_mutations() {
    let provider = ScriptedProvider::new();
    let (engine, rx) = engine(&provider, false);

    let domains: Vec<String> = ["a.com", "b.com", "c.com"]
        .iter()
        .map(|d| d.to_string())
        .collect();
    let record = RecordSpec::new("TXT", None, "v=spf1 include:new.com -all");
    let report = engine.run_domain_batch(&domains, &record).await;

    let records = vec![txt_record(7, "a.com", "v=spf1 -all")];
    let spf = engine
        .run_record_batch(
            &records,
            &RecordOperation::EnsureSpfMechanism("include:new.com".to_string()),
        )
        .await;

    assert_eq!(provider.call_count(), 0);
    assert_eq!(report.planned, 3);
    assert_eq!(report.applied, 0);
    assert_eq!(spf.planned, 1);

    let events = drain(engine, rx).await;
    let planned: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::MutationPlanned { target, description } => {
                Some((target.as_str(), description.as_str()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(planned.len(), 4);
    assert_eq!(planned[0], ("a.com", "a.com TXT @ v=spf1 include:new.com -all"));
    assert_eq!(
        planned[3],
        ("a.com#7", "TXT @ v=spf1 -all > v=spf1 include:new.com -all")
    );
}

#[tokio::test(start_paused = true)]
async fn dry_run_still_fetches() {
    let provider = ScriptedProvider::new();
    provider.push(Ok(response(
        200,
        &[],
        serde_json::json!({
            "data": [
                { "id": 11, "type": "TXT", "name": "", "ttl": 3600, "content": "v=spf1 mx -all" },
                { "id": 12, "type": "MX", "name": "", "ttl": 3600, "priority": 10, "content": "mx.a.com" }
            ]
        }),
    )));
    let (engine, _rx) = engine(&provider, false);

    let records = engine.fetch_zone_records("a.com").await.unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(records.len(), 2);
    assert!(records[0].is_spf());
    assert_eq!(records[0].zone, "a.com");
    assert_eq!(records[1].priority, Some(10));
    assert!(!records[1].is_spf());
}

#[tokio::test(start_paused = true)]
async fn failed_listing_is_an_error() {
    let provider = ScriptedProvider::new();
    provider.push(Ok(response(
        404,
        &[],
        serde_json::json!({ "message": "Zone `nope.com` not found" }),
    )));
    let (engine, _rx) = engine(&provider, true);

    let err = engine.fetch_zone_records("nope.com").await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse(_)));
}

#[tokio::test(start_paused = true)]
async fn fetch_zone_page_reports_pagination() {
    let provider = ScriptedProvider::new();
    provider.push(Ok(response(
        200,
        &[],
        serde_json::json!({
            "data": [ { "name": "a.com" }, { "name": "b.com" } ],
            "pagination": { "current_page": 2, "total_pages": 5 }
        }),
    )));
    let (engine, _rx) = engine(&provider, true);

    let page = engine.fetch_zone_page(2).await.unwrap();
    assert_eq!(page.zones, vec!["a.com", "b.com"]);
    assert_eq!(page.page, 2);
    assert_eq!(page.total_pages, 5);
    assert_eq!(provider.requests()[0].method, HttpMethod::Get);
}

#[tokio::test(start_paused = true)]
async fn spf_update_sends_merged_value() {
    let provider = ScriptedProvider::new();
    let (engine, _rx) = engine(&provider, true);

    let record = txt_record(42, "a.com", "\"v=spf1 include:example.com -all\"");
    let outcome = engine
        .ensure_spf_mechanism(&record, "include:new.com")
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Applied { status: 200 });
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Patch);
    assert_eq!(requests[0].path, "1/zones/a.com/records/42");
    assert_eq!(
        requests[0].payload,
        Some(serde_json::json!({
            "content": "v=spf1 include:example.com include:new.com -all"
        }))
    );
}

#[tokio::test(start_paused = true)]
async fn unchanged_spf_sends_nothing() {
    let provider = ScriptedProvider::new();
    let (engine, _rx) = engine(&provider, true);

    let records = vec![
        txt_record(1, "a.com", "v=spf1 a include:new.com -all"),
        txt_record(2, "b.com", "v=spf1 include:new.com ~all"),
    ];
    let report = engine
        .run_record_batch(
            &records,
            &RecordOperation::EnsureSpfMechanism("include:new.com".to_string()),
        )
        .await;

    assert_eq!(report.unchanged, 2);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unchanged_quoted_spf_sends_nothing() {
    let provider = ScriptedProvider::new();
    let (engine, _rx) = engine(&provider, true);

    let record = txt_record(1, "a.com", "\"v=spf1 include:new.com -all\"");
    let outcome = engine
        .ensure_spf_mechanism(&record, "include:new.com")
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Unchanged);
    assert_eq!(provider.call_count(), 0);

    // A quoted record that does need the mechanism is still updated.
    let record = txt_record(2, "a.com", "\"v=spf1 -all\"");
    let outcome = engine
        .ensure_spf_mechanism(&record, "include:new.com")
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Applied { status: 200 });
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejection_is_not_a_failure() {
    let provider = ScriptedProvider::new();
    provider.push(Ok(response(
        422,
        &[],
        serde_json::json!({ "message": "Validation failed" }),
    )));
    let (engine, rx) = engine(&provider, true);

    let domains = vec!["a.com".to_string(), "b.com".to_string()];
    let record = RecordSpec::new("TXT", Some("_dmarc".to_string()), "v=DMARC1; p=none");
    let report = engine.run_domain_batch(&domains, &record).await;

    assert_eq!(report.rejected, 1);
    assert_eq!(report.applied, 1);
    assert_eq!(report.failed(), 0);

    let requests = provider.requests();
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[1].path, "1/zones/b.com/records");
    assert_eq!(
        requests[1].payload,
        Some(serde_json::json!({
            "name": "_dmarc",
            "type": "TXT",
            "content": "v=DMARC1; p=none"
        }))
    );

    let events = drain(engine, rx).await;
    assert!(events.contains(&BatchEvent::MutationRejected {
        target: "a.com".to_string(),
        status: 422,
    }));
}

#[tokio::test(start_paused = true)]
async fn rejected_outcome_carries_api_message() {
    let provider = ScriptedProvider::new();
    provider.push(Ok(response(
        422,
        &[],
        serde_json::json!({ "message": "Validation failed" }),
    )));
    let (engine, _rx) = engine(&provider, true);

    let outcome = engine
        .update_record_value(&txt_record(5, "a.com", "old"), "new")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MutationOutcome::Rejected {
            status: 422,
            message: "Validation failed".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn spf_findings_are_emitted_but_do_not_block() {
    let provider = ScriptedProvider::new();
    let (engine, rx) = engine(&provider, true);

    let record = txt_record(9, "a.com", "v=spf1 ptr -all");
    let outcome = engine.ensure_spf_mechanism(&record, "mx").await.unwrap();
    assert_eq!(outcome, MutationOutcome::Applied { status: 200 });
    assert_eq!(provider.call_count(), 1);

    let events = drain(engine, rx).await;
    let diagnostics: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::SpfDiagnostics { record, .. } => Some(record.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(diagnostics, vec!["v=spf1 ptr -all", "v=spf1 ptr mx -all"]);
}
