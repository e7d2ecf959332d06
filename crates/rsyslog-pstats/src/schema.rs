// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Schema tables for the fixed-shape impstats records.
//!
//! Every fixed shape is a list of numeric JSON keys, each mapped to exactly one metric. A single
//! flatten routine turns a decoded record into points using its table, so adding a counter to a
//! shape is a one-line change here.

use crate::classifier::RecordShape;
use crate::point::{MetricKind, Point};

/// Where a field's point takes its label from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLabel {
    /// The schema's label name, valued with the record name.
    Record,
    /// A constant label pair, used to fold related fields into one family.
    Fixed(&'static str, &'static str),
    Unlabeled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Key of the numeric field in the impstats JSON object.
    pub key: &'static str,
    pub metric: &'static str,
    pub kind: MetricKind,
    pub help: &'static str,
    pub label: FieldLabel,
}

impl Field {
    const fn counter(key: &'static str, metric: &'static str, help: &'static str) -> Self {
        Self {
            key,
            metric,
            kind: MetricKind::Counter,
            help,
            label: FieldLabel::Record,
        }
    }

    const fn gauge(key: &'static str, metric: &'static str, help: &'static str) -> Self {
        Self {
            key,
            metric,
            kind: MetricKind::Gauge,
            help,
            label: FieldLabel::Record,
        }
    }

    const fn typed(self, label_value: &'static str) -> Self {
        Self {
            label: FieldLabel::Fixed("type", label_value),
            ..self
        }
    }

    const fn unlabeled(self) -> Self {
        Self {
            label: FieldLabel::Unlabeled,
            ..self
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    pub shape: RecordShape,
    /// Label name for [`FieldLabel::Record`] fields.
    pub label: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    /// Builds one point per field. `values` is aligned with [`Schema::fields`].
    #[must_use]
    pub fn flatten(&self, record_name: &str, values: &[i64]) -> Vec<Point> {
        self.fields
            .iter()
            .zip(values)
            .map(|(field, value)| {
                let point = Point::new(field.metric, field.kind, *value, field.help);
                match field.label {
                    FieldLabel::Record => point.with_label(self.label, record_name),
                    FieldLabel::Fixed(name, value) => point.with_label(name, value),
                    FieldLabel::Unlabeled => point,
                }
            })
            .collect()
    }
}

// Each shape has exactly one schema.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
    }
}

impl Eq for Schema {}

pub static ACTION: Schema = Schema {
    shape: RecordShape::Action,
    label: "action",
    fields: &[
        Field::counter("processed", "action_processed", "messages processed"),
        Field::counter("failed", "action_failed", "messages failed"),
        Field::counter("suspended", "action_suspended", "times suspended"),
        Field::counter(
            "suspended.duration",
            "action_suspended_duration",
            "time spent suspended",
        ),
        Field::counter("resumed", "action_resumed", "times resumed"),
    ],
};

pub static INPUT: Schema = Schema {
    shape: RecordShape::Input,
    label: "input",
    fields: &[Field::counter(
        "submitted",
        "input_submitted",
        "messages submitted",
    )],
};

pub static UDP_INPUT: Schema = Schema {
    shape: RecordShape::UdpInput,
    label: "worker",
    fields: &[
        Field::counter(
            "called.recvmmsg",
            "input_called_recvmmsg",
            "Number of recvmmsg called",
        ),
        Field::counter(
            "called.recvmsg",
            "input_called_recvmsg",
            "Number of recvmsg called",
        ),
        Field::counter("msgs.received", "input_received", "messages received"),
    ],
};

pub static QUEUE: Schema = Schema {
    shape: RecordShape::Queue,
    label: "queue",
    fields: &[
        Field::gauge("size", "queue_size", "messages currently in queue"),
        Field::counter("enqueued", "queue_enqueued", "total messages enqueued"),
        Field::counter("full", "queue_full", "times queue was full"),
        Field::counter(
            "discarded.full",
            "queue_discarded_full",
            "messages discarded due to queue being full",
        ),
        Field::counter(
            "discarded.nf",
            "queue_discarded_not_full",
            "messages discarded when queue not full",
        ),
        Field::gauge(
            "maxqsize",
            "queue_max_size",
            "maximum size queue has reached",
        ),
    ],
};

pub static RESOURCE: Schema = Schema {
    shape: RecordShape::Resource,
    label: "resource",
    fields: &[
        Field::counter("utime", "resource_utime", "user time used in microseconds"),
        Field::counter("stime", "resource_stime", "system time used in microseconds"),
        Field::gauge("maxrss", "resource_maxrss", "maximum resident set size"),
        Field::counter("minflt", "resource_minflt", "total minor faults"),
        Field::counter("majflt", "resource_majflt", "total major faults"),
        Field::counter("inblock", "resource_inblock", "filesystem input operations"),
        Field::counter("oublock", "resource_oublock", "filesystem output operations"),
        Field::counter("nvcsw", "resource_nvcsw", "voluntary context switches"),
        Field::counter("nivcsw", "resource_nivcsw", "involuntary context switches"),
    ],
};

pub static DYNAFILE_CACHE: Schema = Schema {
    shape: RecordShape::DynafileCache,
    label: "cache",
    fields: &[
        Field::counter(
            "requests",
            "dynafile_cache_requests",
            "number of requests made to obtain a dynafile",
        ),
        Field::counter(
            "level0",
            "dynafile_cache_level0",
            "number of requests for the current active file",
        ),
        Field::counter("missed", "dynafile_cache_missed", "number of cache misses"),
        Field::counter(
            "evicted",
            "dynafile_cache_evicted",
            "number of times a file needed to be evicted from cache",
        ),
        Field::counter(
            "maxused",
            "dynafile_cache_maxused",
            "maximum number of cache entries ever used",
        ),
        Field::counter(
            "closetimeouts",
            "dynafile_cache_closetimeouts",
            "number of times a file was closed due to timeout settings",
        ),
    ],
};

pub static FORWARD: Schema = Schema {
    shape: RecordShape::Forward,
    label: "destination",
    fields: &[Field::counter(
        "bytes.sent",
        "forward_bytes_total",
        "bytes forwarded to destination",
    )],
};

pub static KUBERNETES: Schema = Schema {
    shape: RecordShape::Kubernetes,
    label: "url",
    fields: &[
        Field::counter(
            "namespacemetadatasuccess",
            "kubernetes_namespace_metadata_success_total",
            "successful fetches of namespace metadata",
        ),
        Field::counter(
            "namespacemetadatanotfound",
            "kubernetes_namespace_metadata_notfound_total",
            "notfound fetches of namespace metadata",
        ),
        Field::counter(
            "namespacemetadatabusy",
            "kubernetes_namespace_metadata_busy_total",
            "busy fetches of namespace metadata",
        ),
        Field::counter(
            "namespacemetadataerror",
            "kubernetes_namespace_metadata_error_total",
            "error fetches of namespace metadata",
        ),
        Field::counter(
            "podmetadatasuccess",
            "kubernetes_pod_metadata_success_total",
            "successful fetches of pod metadata",
        ),
        Field::counter(
            "podmetadatanotfound",
            "kubernetes_pod_metadata_notfound_total",
            "notfound fetches of pod metadata",
        ),
        Field::counter(
            "podmetadatabusy",
            "kubernetes_pod_metadata_busy_total",
            "busy fetches of pod metadata",
        ),
        Field::counter(
            "podmetadataerror",
            "kubernetes_pod_metadata_error_total",
            "error fetches of pod metadata",
        ),
        Field::counter(
            "recordseen",
            "kubernetes_record_seen_total",
            "records fetched from the api",
        ),
    ],
};

const KAFKA_MESSAGES_HELP: &str = "number of messages: submitted: messages submitted to omkafka for processing (with both acknowledged deliveries to broker as well as failed or re-submitted from omkafka to librdkafka); failures: messages that librdkafka failed to deliver (broken down into various types in omkafka_failures); acked: messages that were acknowledged by kafka broker. Note that kafka broker provides two levels of delivery acknowledgements depending on topicConfParam: default (acks=1) implies delivery to the leader only while acks=-1 implies delivery to leader as well as replication to all brokers";
const KAFKA_TOPIC_DYNACACHE_HELP: &str = "skipped: dynamic topic cache lookups that find an existing topic and skip creating a new one; miss: dynamic topic cache lookups that fail to find an existing topic and end up creating new one; evicted: dynamic topic cache entry evictions";
const KAFKA_FAILURES_HELP: &str = "msg_too_large: failed to deliver to the broker because broker considers message to be too large. Note that omkafka may still resubmit to librdkafka depending on resubmitOnFailure option; unknown_topic: failed to deliver to the broker because broker does not recognize the topic; queue_full: dropped by librdkafka when its queue becomes full. Note that default size of librdkafka queue is 100,000 messages; unknown_partition: failed to deliver because broker does not recognize a partition; other: all of the rest of the failures that do not fall in any of the other failure categories";
const KAFKA_ERRORS_HELP: &str = "timed_out: messages that librdkafka could not deliver within timeout. These errors will cause action to be suspended but messages can be retried depending on retry options; transport: messages that librdkafka could not deliver due to transport errors. These messages can be retried depending on retry options; broker_down: messages that librdkafka could not deliver because it thinks that broker is not accessible. These messages can be retried depending on options; auth: messages that librdkafka could not deliver due to authentication errors. These messages can be retried depending on the options; ssl: messages that librdkafka could not deliver due to ssl errors. These messages can be retried depending on the options; other: rest of librdkafka errors";

/// omkafka folds its counters into `type`-labeled families instead of labeling by record name.
pub static KAFKA: Schema = Schema {
    shape: RecordShape::Kafka,
    label: "type",
    fields: &[
        Field::counter("submitted", "omkafka_messages", KAFKA_MESSAGES_HELP).typed("submitted"),
        Field::counter(
            "maxoutqsize",
            "omkafka_maxoutqsize",
            "high water mark of output queue size",
        )
        .unlabeled(),
        Field::counter("failures", "omkafka_messages", KAFKA_MESSAGES_HELP).typed("failures"),
        Field::counter(
            "topicdynacache.skipped",
            "omkafka_topicdynacache",
            KAFKA_TOPIC_DYNACACHE_HELP,
        )
        .typed("skipped"),
        Field::counter(
            "topicdynacache.miss",
            "omkafka_topicdynacache",
            KAFKA_TOPIC_DYNACACHE_HELP,
        )
        .typed("miss"),
        Field::counter(
            "topicdynacache.evicted",
            "omkafka_topicdynacache",
            KAFKA_TOPIC_DYNACACHE_HELP,
        )
        .typed("evicted"),
        Field::counter("acked", "omkafka_messages", KAFKA_MESSAGES_HELP).typed("acked"),
        Field::counter(
            "failures_msg_too_large",
            "omkafka_failures",
            KAFKA_FAILURES_HELP,
        )
        .typed("msg_too_large"),
        Field::counter(
            "failures_unknown_topic",
            "omkafka_failures",
            KAFKA_FAILURES_HELP,
        )
        .typed("unknown_topic"),
        Field::counter(
            "failures_queue_full",
            "omkafka_failures",
            KAFKA_FAILURES_HELP,
        )
        .typed("queue_full"),
        Field::counter(
            "failures_unknown_partition",
            "omkafka_failures",
            KAFKA_FAILURES_HELP,
        )
        .typed("unknown_partition"),
        Field::counter("failures_other", "omkafka_failures", KAFKA_FAILURES_HELP).typed("other"),
        Field::counter("errors_timed_out", "omkafka_errors", KAFKA_ERRORS_HELP)
            .typed("timed_out"),
        Field::counter("errors_transport", "omkafka_errors", KAFKA_ERRORS_HELP)
            .typed("transport"),
        Field::counter("errors_broker_down", "omkafka_errors", KAFKA_ERRORS_HELP)
            .typed("broker_down"),
        Field::counter("errors_auth", "omkafka_errors", KAFKA_ERRORS_HELP).typed("auth"),
        Field::counter("errors_ssl", "omkafka_errors", KAFKA_ERRORS_HELP).typed("ssl"),
        Field::counter("errors_other", "omkafka_errors", KAFKA_ERRORS_HELP).typed("other"),
        Field::gauge(
            "rtt_avg_usec",
            "omkafka_rtt_avg_usec_acg",
            "broker round trip time in microseconds averaged over all brokers. It is based on the statistics callback window specified through statistics.interval.ms parameter to librdkafka. Average exclude brokers with less than 100 microseconds rtt",
        )
        .unlabeled(),
        Field::gauge(
            "throttle_avg_msec",
            "omkafka_throttle_avg_msec_avg",
            "broker throttling time in milliseconds averaged over all brokers. This is also a part of window statistics delivered by librdkakfka. Average excludes brokers with zero throttling time",
        )
        .unlabeled(),
        Field::gauge(
            "int_latency_avg_usec",
            "omkafka_int_latency_avg_usec_avg",
            "internal librdkafka producer queue latency in microseconds averaged other all brokers. This is also part of window statistics and average excludes brokers with zero internal latency",
        )
        .unlabeled(),
    ],
};
