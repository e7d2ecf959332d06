// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Picks the record shape of an impstats payload.
//!
//! Shapes overlap: an omkafka line also carries `submitted`, and action names routinely contain
//! words that look like other shapes. Classification therefore walks [`RULES`] top to bottom and
//! the first matching predicate wins. The order of that table is the whole contract.

use std::borrow::Cow;

use derive_more::Display;
use serde::Deserialize;


/// The known impstats record shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RecordShape {
    #[display("action")]
    Action,
    #[display("omkafka")]
    Kafka,
    #[display("input")]
    Input,
    #[display("imudp input")]
    UdpInput,
    #[display("queue")]
    Queue,
    #[display("resource usage")]
    Resource,
    #[display("dynstats")]
    DynStat,
    #[display("dynafile cache")]
    DynafileCache,
    #[display("forward")]
    Forward,
    #[display("kubernetes")]
    Kubernetes,
    #[display("percentile")]
    Percentile,
    #[display("percentile bucket")]
    PercentileBucket,
}

/// `name` and `origin`, when the payload is a JSON object carrying them as strings.
#[derive(Debug, Default, Deserialize)]
struct Header {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    origin: Option<String>,
}

/// A payload prepared for the classification predicates.
pub struct Payload<'a> {
    text: Cow<'a, str>,
    header: Header,
}

impl<'a> Payload<'a> {
    #[must_use]
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            text: String::from_utf8_lossy(payload),
            header: serde_json::from_slice(payload).unwrap_or_default(),
        }
    }

    fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    fn name(&self) -> Option<&str> {
        self.header.name.as_deref()
    }

    fn origin_is(&self, origin: &str) -> bool {
        self.header.origin.as_deref() == Some(origin)
    }
}

type Predicate = fn(&Payload<'_>) -> bool;

/// Classification rules, highest priority first.
pub static RULES: &[(RecordShape, Predicate)] = &[
    (RecordShape::Action, has_processed),
    // Must run before `Input`: omkafka lines carry a `submitted` field too.
    (RecordShape::Kafka, is_omkafka),
    (RecordShape::Input, has_submitted),
    (RecordShape::UdpInput, has_recvmmsg),
    (RecordShape::Queue, has_enqueued),
    (RecordShape::Resource, has_utime),
    (RecordShape::DynStat, is_dynstats),
    (RecordShape::DynafileCache, is_dynafile_cache),
    (RecordShape::Forward, is_omfwd),
    (RecordShape::Kubernetes, is_kubernetes),
    (RecordShape::Percentile, is_percentile),
    (RecordShape::PercentileBucket, is_percentile_bucket),
];

fn has_processed(payload: &Payload<'_>) -> bool {
    payload.contains("processed")
}

fn is_omkafka(payload: &Payload<'_>) -> bool {
    payload.name() == Some("omkafka")
}

fn has_submitted(payload: &Payload<'_>) -> bool {
    payload.contains("submitted")
}

fn has_recvmmsg(payload: &Payload<'_>) -> bool {
    payload.contains("called.recvmmsg")
}

fn has_enqueued(payload: &Payload<'_>) -> bool {
    payload.contains("enqueued")
}

fn has_utime(payload: &Payload<'_>) -> bool {
    payload.contains("utime")
}

fn is_dynstats(payload: &Payload<'_>) -> bool {
    payload.origin_is("dynstats")
}

fn is_dynafile_cache(payload: &Payload<'_>) -> bool {
    payload
        .name()
        .is_some_and(|name| name.starts_with("dynafile cache"))
}

fn is_omfwd(payload: &Payload<'_>) -> bool {
    payload.origin_is("omfwd")
}

/// The API URL in `mmkubernetes(<url>)` is optional; a bare `mmkubernetes`
/// record is still counted.
fn is_kubernetes(payload: &Payload<'_>) -> bool {
    payload
        .name()
        .is_some_and(|name| name.contains("mmkubernetes"))
}

fn is_percentile(payload: &Payload<'_>) -> bool {
    payload.origin_is("percentile")
}

fn is_percentile_bucket(payload: &Payload<'_>) -> bool {
    payload.origin_is("percentile.bucket")
}

/// Returns the shape of `payload`, or `None` when no rule matches.
#[must_use]
pub fn classify(payload: &[u8]) -> Option<RecordShape> {
    let payload = Payload::new(payload);
    RULES
        .iter()
        .find(|(_, matches)| matches(&payload))
        .map(|(shape, _)| *shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_shape() {
        let cases: &[(&str, RecordShape)] = &[
            (
                r#"{"name":"test_action","processed":100000,"failed":2,"suspended":1,"suspended.duration":1000,"resumed":1}"#,
                RecordShape::Action,
            ),
            (
                r#"{ "name": "omkafka", "origin": "omkafka", "submitted": 59, "maxoutqsize": 9 }"#,
                RecordShape::Kafka,
            ),
            (
                r#"{"name":"test_input", "origin":"imuxsock", "submitted":1000}"#,
                RecordShape::Input,
            ),
            (
                r#"{"name":"imudp(w0)","origin":"imudp","called.recvmmsg":1,"called.recvmsg":2,"msgs.received":3}"#,
                RecordShape::UdpInput,
            ),
            (
                r#"{"name":"main Q","size":10,"enqueued":20,"full":30,"discarded.full":40,"discarded.nf":50,"maxqsize":60}"#,
                RecordShape::Queue,
            ),
            (
                r#"{"name":"resource-usage","utime":10,"stime":20,"maxrss":30}"#,
                RecordShape::Resource,
            ),
            (
                r#"{ "name": "global", "origin": "dynstats", "values": { "msg_per_host.ops_overflow": 1 } }"#,
                RecordShape::DynStat,
            ),
            (
                r#"{ "name": "dynafile cache cluster", "origin": "omfile", "requests": 412044 }"#,
                RecordShape::DynafileCache,
            ),
            (
                r#"{ "name": "TCP-FQDN-6514", "origin": "omfwd", "bytes.sent": 666 }"#,
                RecordShape::Forward,
            ),
            (
                r#"{ "name": "mmkubernetes(https://host.domain.tld:6443)", "origin": "mmkubernetes", "recordseen": 477943 }"#,
                RecordShape::Kubernetes,
            ),
            (
                r#"{ "name": "global", "origin": "percentile", "values": { "host_statistics.new_metric_add": 1 } }"#,
                RecordShape::Percentile,
            ),
            (
                r#"{ "name": "host_statistics", "origin": "percentile.bucket", "values": { "msg_per_host|p95": 1950 } }"#,
                RecordShape::PercentileBucket,
            ),
        ];

        for (payload, want) in cases {
            assert_eq!(classify(payload.as_bytes()), Some(*want), "payload: {payload}");
        }
    }

    #[test]
    fn test_kafka_wins_over_generic_input() {
        let payload = br#"{"name":"omkafka","origin":"omkafka","submitted":59}"#;
        assert_eq!(classify(payload), Some(RecordShape::Kafka));
    }

    #[test]
    fn test_kafka_action_is_still_an_action() {
        // The omkafka action's own stats line reports `processed`.
        let payload = br#"{"name":"omkafka","origin":"core.action","processed":12,"failed":0}"#;
        assert_eq!(classify(payload), Some(RecordShape::Action));
    }

    #[test]
    fn test_omkafka_in_other_names_is_not_kafka() {
        let payload = br#"{"name":"omkafka-main","origin":"imuxsock","submitted":3}"#;
        assert_eq!(classify(payload), Some(RecordShape::Input));
    }

    #[test]
    fn test_processed_beats_everything() {
        let payload =
            br#"{"name":"dynafile cache x","origin":"omfwd","processed":1,"enqueued":2,"utime":3}"#;
        assert_eq!(classify(payload), Some(RecordShape::Action));
    }

    #[test]
    fn test_origin_must_match_exactly() {
        // `percentile.bucket` must not be taken for `percentile` and vice versa.
        let bucket = br#"{"name":"x","origin":"percentile.bucket","values":{}}"#;
        let summary = br#"{"name":"x","origin":"percentile","values":{}}"#;
        assert_eq!(classify(bucket), Some(RecordShape::PercentileBucket));
        assert_eq!(classify(summary), Some(RecordShape::Percentile));
    }

    #[test]
    fn test_kubernetes_without_url_in_name() {
        let payload = br#"{"name":"mmkubernetes","origin":"mmkubernetes","recordseen":1}"#;
        assert_eq!(classify(payload), Some(RecordShape::Kubernetes));
        let other = br#"{"name":"imkubernetes-ish","origin":"core","recordseen":1}"#;
        assert_eq!(classify(other), None);
    }

    #[test]
    fn test_unknown_payloads() {
        assert_eq!(classify(br#"{"a":"b"}"#), None);
        assert_eq!(classify(b"not json at all"), None);
        assert_eq!(classify(b""), None);
    }

    #[test]
    fn test_substring_rules_apply_to_malformed_json() {
        // Field payloads look at the raw text, so a broken queue line still reaches its decoder.
        assert_eq!(
            classify(br#"{"name":"main Q","enqueued":"#),
            Some(RecordShape::Queue)
        );
    }

    #[test]
    fn test_rule_table_covers_every_shape_once() {
        let shapes: std::collections::HashSet<RecordShape> =
            RULES.iter().map(|(shape, _)| *shape).collect();
        assert_eq!(shapes.len(), RULES.len());
        assert_eq!(RULES.len(), 12);
        assert_eq!(RULES[0].0, RecordShape::Action);
        assert_eq!(RULES[1].0, RecordShape::Kafka);
        assert_eq!(RULES[2].0, RecordShape::Input);
    }
}
