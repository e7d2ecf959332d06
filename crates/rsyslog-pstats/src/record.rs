// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoding of impstats payloads into transient records, and flattening into points.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::classifier::RecordShape;
use crate::errors::DecodeError;
use crate::point::{MetricKind, Point};
use crate::schema::{self, Schema};

type Object = Map<String, Value>;

/// Extracts the API server URL from an mmkubernetes stats name such as
/// `mmkubernetes(https://host:6443)`.
fn kubernetes_api_url(name: &str) -> Option<&str> {
    static API_NAME: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    let regex = API_NAME
        .get_or_init(|| Regex::new(r"mmkubernetes\((\S+)\)").expect("invalid mmkubernetes regex"));
    regex
        .captures(name)
        .and_then(|captures| captures.get(1))
        .map(|url| url.as_str())
}

/// A decoded impstats line. Lives only until it is flattened.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Fixed(FixedRecord),
    Kafka(KafkaRecord),
    Dynamic(DynamicRecord),
}

impl Record {
    #[must_use]
    pub fn to_points(&self) -> Vec<Point> {
        match self {
            Record::Fixed(record) => record.to_points(),
            Record::Kafka(record) => record.to_points(),
            Record::Dynamic(record) => record.to_points(),
        }
    }
}

/// Decodes `payload` as a record of `shape`.
pub fn decode(shape: RecordShape, payload: &[u8]) -> Result<Record, DecodeError> {
    let object = parse_object(payload)?;
    match shape {
        RecordShape::Kafka => KafkaRecord::from_object(&object).map(Record::Kafka),
        RecordShape::DynStat => {
            DynamicRecord::from_object(DynamicFamily::DynStat, &object).map(Record::Dynamic)
        }
        RecordShape::Percentile => {
            DynamicRecord::from_object(DynamicFamily::Percentile, &object).map(Record::Dynamic)
        }
        RecordShape::PercentileBucket => {
            DynamicRecord::from_object(DynamicFamily::PercentileBucket, &object)
                .map(Record::Dynamic)
        }
        RecordShape::Action => fixed(&schema::ACTION, &object),
        RecordShape::Input => fixed(&schema::INPUT, &object),
        RecordShape::UdpInput => fixed(&schema::UDP_INPUT, &object),
        RecordShape::Queue => fixed(&schema::QUEUE, &object),
        RecordShape::Resource => fixed(&schema::RESOURCE, &object),
        RecordShape::DynafileCache => fixed(&schema::DYNAFILE_CACHE, &object),
        RecordShape::Forward => fixed(&schema::FORWARD, &object),
        RecordShape::Kubernetes => fixed(&schema::KUBERNETES, &object),
    }
}

fn fixed(schema: &'static Schema, object: &Object) -> Result<Record, DecodeError> {
    let name = string_field(object, "name")?;
    let label_value = match schema.shape {
        RecordShape::DynafileCache => name
            .strip_prefix("dynafile cache ")
            .map(str::to_string)
            .unwrap_or(name),
        RecordShape::Kubernetes => kubernetes_api_url(&name).unwrap_or_default().to_string(),
        _ => name,
    };
    FixedRecord::from_object(schema, label_value, object).map(Record::Fixed)
}

/// A record whose numeric fields are described by a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRecord {
    pub schema: &'static Schema,
    /// Label value of the emitted points, usually the impstats `name`.
    pub name: String,
    /// Aligned with `schema.fields`.
    pub values: Vec<i64>,
}

impl FixedRecord {
    fn from_object(
        schema: &'static Schema,
        name: String,
        object: &Object,
    ) -> Result<Self, DecodeError> {
        let values = schema
            .fields
            .iter()
            .map(|field| integer_field(object, field.key))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            schema,
            name,
            values,
        })
    }

    /// Value of the field stored under `key`, zero when the schema has no such key.
    #[must_use]
    pub fn value(&self, key: &str) -> i64 {
        self.schema
            .fields
            .iter()
            .position(|field| field.key == key)
            .and_then(|index| self.values.get(index).copied())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn to_points(&self) -> Vec<Point> {
        self.schema.flatten(&self.name, &self.values)
    }
}

/// omkafka stats, plus the `input_submitted` point older exporters produced for them when they
/// were classified as plain inputs. That extra point is kept so existing dashboards keep working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaRecord {
    pub stats: FixedRecord,
    pub compat: FixedRecord,
}

impl KafkaRecord {
    fn from_object(object: &Object) -> Result<Self, DecodeError> {
        let name = string_field(object, "name")?;
        Ok(Self {
            stats: FixedRecord::from_object(&schema::KAFKA, name.clone(), object)?,
            compat: FixedRecord::from_object(&schema::INPUT, name, object)?,
        })
    }

    #[must_use]
    pub fn to_points(&self) -> Vec<Point> {
        let mut points = self.compat.to_points();
        points.extend(self.stats.to_points());
        points
    }
}

/// The open-ended record families, which carry an arbitrary `values` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicFamily {
    DynStat,
    Percentile,
    PercentileBucket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicRecord {
    pub family: DynamicFamily,
    pub name: String,
    pub origin: String,
    pub values: Vec<(String, i64)>,
}

impl DynamicRecord {
    fn from_object(family: DynamicFamily, object: &Object) -> Result<Self, DecodeError> {
        let name = string_field(object, "name")?;
        let origin = string_field(object, "origin")?;
        let values = match object.get("values") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(values)) => values
                .iter()
                .map(|(key, value)| integer(key, value).map(|value| (key.clone(), value)))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(DecodeError::InvalidField {
                    field: "values".to_string(),
                    expected: "an object",
                    found: other.to_string(),
                })
            }
        };
        Ok(Self {
            family,
            name,
            origin,
            values,
        })
    }

    #[must_use]
    pub fn to_points(&self) -> Vec<Point> {
        let (metric, help, label) = match self.family {
            DynamicFamily::DynStat => (
                format!("dynstat_{}", self.name),
                format!("dynamic statistic bucket {}", self.name),
                "counter",
            ),
            DynamicFamily::Percentile => (
                format!("percentile_{}", self.name),
                format!("percentile statistics {}", self.name),
                "counter",
            ),
            DynamicFamily::PercentileBucket => (
                format!("{}_percentile_bucket", self.name),
                format!("percentile bucket statistics {}", self.name),
                "bucket",
            ),
        };

        self.values
            .iter()
            .map(|(key, value)| {
                Point::new(&metric, self.kind_of(key), *value, &help).with_label(label, key.as_str())
            })
            .collect()
    }

    /// Percentile buckets mix running counts with window statistics; only the counts are
    /// monotonic.
    fn kind_of(&self, key: &str) -> MetricKind {
        match self.family {
            DynamicFamily::PercentileBucket if !key.contains("count") => MetricKind::Gauge,
            _ => MetricKind::Counter,
        }
    }
}

fn parse_object(payload: &[u8]) -> Result<Object, DecodeError> {
    match serde_json::from_slice(payload)? {
        Value::Object(object) => Ok(object),
        _ => Err(DecodeError::NotAnObject),
    }
}

fn string_field(object: &Object, key: &str) -> Result<String, DecodeError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(DecodeError::InvalidField {
            field: key.to_string(),
            expected: "a string",
            found: other.to_string(),
        }),
    }
}

fn integer_field(object: &Object, key: &str) -> Result<i64, DecodeError> {
    match object.get(key) {
        None => Ok(0),
        Some(value) => integer(key, value),
    }
}

fn integer(key: &str, value: &Value) -> Result<i64, DecodeError> {
    match value {
        Value::Null => Ok(0),
        Value::Number(number) => number.as_i64().ok_or_else(|| DecodeError::InvalidField {
            field: key.to_string(),
            expected: "a 64-bit integer",
            found: number.to_string(),
        }),
        other => Err(DecodeError::InvalidField {
            field: key.to_string(),
            expected: "a 64-bit integer",
            found: other.to_string(),
        }),
    }
}
