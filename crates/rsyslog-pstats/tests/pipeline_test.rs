// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, Registry, TextEncoder};
use rsyslog_pstats::{Ingestor, MetricKind, PointKey, PointStore, ScrapeAdapter, Termination};

const BATCH: &str = r#"2017-08-30T08:10:04.786350+00:00 some-node.example.org rsyslogd-pstats: {"name":"test_action","origin":"core.action","processed":100000,"failed":2,"suspended":1,"suspended.duration":1000,"resumed":1}
2017-08-30T08:10:04.786350+00:00 some-node.example.org rsyslogd-pstats: {"name":"imuxsock","origin":"imuxsock","submitted":1000}
2017-08-30T08:10:04.786350+00:00 some-node.example.org rsyslogd-pstats: {"name":"main Q","origin":"core.queue","size":10,"enqueued":20,"full":30,"discarded.full":40,"discarded.nf":50,"maxqsize":60}
2017-08-30T08:10:04.786350+00:00 some-node.example.org rsyslogd-pstats: {"name":"resource-usage","origin":"impstats","utime":10,"stime":20,"maxrss":30,"minflt":40,"majflt":50,"inblock":60,"oublock":70,"nvcsw":80,"nivcsw":90}
2017-08-30T08:10:04.786350+00:00 some-node.example.org rsyslogd-pstats: { "name": "omkafka", "origin": "omkafka", "submitted": 59, "maxoutqsize": 9, "failures": 0, "topicdynacache.skipped": 57, "topicdynacache.miss": 2, "topicdynacache.evicted": 0, "acked": 55 }
2017-08-30T08:10:04.786350+00:00 some-node.example.org rsyslogd-pstats: { "name": "global", "origin": "dynstats", "values": { "msg_per_host.ops_overflow": 1, "msg_per_host.new_metric_add": 3 } }
2017-08-30T08:10:04.786350+00:00 some-node.example.org rsyslogd-pstats: { "name": "host_statistics", "origin": "percentile.bucket", "values": { "msg_per_host|p95": 1950, "msg_per_host|window_count": 7 } }
2017-08-30T08:10:04.786350+00:00 some-node.example.org rsyslogd-pstats: {"a":"b"}
"#;

async fn ingest(input: &str) -> Arc<PointStore> {
    let store = Arc::new(PointStore::new());
    let ingestor = Ingestor::new(Arc::clone(&store), true);
    let termination = ingestor.run(input.as_bytes()).await;
    assert!(matches!(termination, Termination::EndOfInput));
    store
}

fn value(store: &PointStore, name: &str, label: &str) -> i64 {
    store
        .lookup(&PointKey::new(name, label))
        .unwrap_or_else(|e| panic!("{e}"))
        .value
}

fn adapter(store: Arc<PointStore>) -> ScrapeAdapter {
    ScrapeAdapter::new(store).unwrap_or_else(|e| panic!("{e}"))
}

fn render(registry: &Registry) -> String {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .unwrap_or_else(|e| panic!("{e}"));
    String::from_utf8(buffer).unwrap_or_else(|e| panic!("{e}"))
}

#[tokio::test]
async fn batch_populates_store() {
    let store = ingest(BATCH).await;

    assert_eq!(value(&store, "action_processed", "test_action"), 100_000);
    assert_eq!(value(&store, "input_submitted", "imuxsock"), 1000);
    assert_eq!(value(&store, "queue_discarded_not_full", "main Q"), 50);
    assert_eq!(value(&store, "resource_nivcsw", "resource-usage"), 90);
    assert_eq!(value(&store, "omkafka_messages", "acked"), 55);
    assert_eq!(value(&store, "omkafka_topicdynacache", "skipped"), 57);
    // Kafka lines keep producing the point they produced as plain inputs.
    assert_eq!(value(&store, "input_submitted", "omkafka"), 59);
    assert_eq!(
        value(&store, "dynstat_global", "msg_per_host.new_metric_add"),
        3
    );
    assert_eq!(
        value(
            &store,
            "host_statistics_percentile_bucket",
            "msg_per_host|p95"
        ),
        1950
    );
    assert_eq!(value(&store, "stats_line_errors", ""), 1);

    let bucket = store
        .lookup(&PointKey::new(
            "host_statistics_percentile_bucket",
            "msg_per_host|window_count",
        ))
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(bucket.kind, MetricKind::Counter);
}

#[tokio::test]
async fn reingesting_replaces_values() {
    let twice = format!("{BATCH}{BATCH}");
    let store = ingest(&twice).await;

    assert_eq!(value(&store, "action_processed", "test_action"), 100_000);
    assert_eq!(value(&store, "queue_size", "main Q"), 10);
    assert_eq!(value(&store, "stats_line_errors", ""), 2);
    assert_eq!(store.len(), ingest(BATCH).await.len());
}

#[tokio::test]
async fn scrape_renders_exposition() {
    let store = ingest(BATCH).await;
    let adapter = adapter(Arc::clone(&store));
    let descs = adapter.describe();
    let registry = Registry::new();
    registry
        .register(Box::new(adapter))
        .unwrap_or_else(|e| panic!("{e}"));

    let output = render(&registry);

    assert!(output.contains("# TYPE rsyslog_action_processed counter\n"));
    assert!(output.contains("rsyslog_action_processed{action=\"test_action\"} 100000\n"));
    assert!(output.contains("# TYPE rsyslog_queue_size gauge\n"));
    assert!(output.contains("rsyslog_queue_size{queue=\"main Q\"} 10\n"));
    assert!(output.contains("rsyslog_omkafka_maxoutqsize 9\n"));
    // `window_count` is a counter next to gauges, so the family is a gauge.
    assert!(output.contains("# TYPE rsyslog_host_statistics_percentile_bucket gauge\n"));
    assert!(output.contains(
        "rsyslog_host_statistics_percentile_bucket{bucket=\"msg_per_host|p95\"} 1950\n"
    ));
    assert!(output.contains("rsyslog_stats_line_errors 1\n"));
    assert!(output.contains("rsyslog_scrapes 1\n"));
    assert_eq!(output.matches("# HELP rsyslog_input_submitted ").count(), 1);

    assert!(descs.iter().any(|desc| desc.fq_name == "rsyslog_dynstat_global"
        && desc.variable_labels == ["counter"]));
    assert_eq!(
        descs.last().map(|desc| desc.fq_name.as_str()),
        Some("rsyslog_scrapes")
    );
    for desc in &descs {
        assert!(
            output.contains(&format!("# TYPE {} ", desc.fq_name)),
            "{} described but not exposed",
            desc.fq_name
        );
    }
}

#[tokio::test]
async fn concurrent_scrapes_during_ingestion() {
    let store = Arc::new(PointStore::new());
    let adapter = Arc::new(adapter(Arc::clone(&store)));
    let input = BATCH.repeat(50);

    let ingestor = Ingestor::new(Arc::clone(&store), true);
    let ingest_task = tokio::spawn(async move { ingestor.run(input.as_bytes()).await });

    let scrapers: Vec<_> = (0..4)
        .map(|_| {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move {
                for _ in 0..20 {
                    for family in adapter.collect() {
                        if family.get_name() == "rsyslog_action_processed" {
                            for metric in family.get_metric() {
                                assert_eq!(metric.get_counter().get_value(), 100_000.0);
                            }
                        }
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let termination = ingest_task.await.unwrap_or_else(|e| panic!("{e}"));
    assert!(matches!(termination, Termination::EndOfInput));
    for scraper in scrapers {
        scraper.await.unwrap_or_else(|e| panic!("{e}"));
    }

    assert_eq!(adapter.scrapes(), 80);
    assert_eq!(value(&store, "stats_line_errors", ""), 50);
}
