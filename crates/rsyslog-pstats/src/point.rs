// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The uniform metric point every impstats record is flattened into.

use std::cmp::Ordering;
use std::fmt;

use derive_more::Display;
use ustr::Ustr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MetricKind {
    /// Monotonic total since rsyslog started.
    #[display("counter")]
    Counter,
    /// Instantaneous value.
    #[display("gauge")]
    Gauge,
}

/// A single named observation.
///
/// Points are immutable once built; the store swaps whole points, it never edits one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub name: Ustr,
    pub description: Ustr,
    pub kind: MetricKind,
    pub value: i64,
    /// Empty when the point carries no label dimension.
    pub label_name: Ustr,
    pub label_value: String,
}

impl Point {
    #[must_use]
    pub fn new(name: &str, kind: MetricKind, value: i64, description: &str) -> Self {
        Self {
            name: Ustr::from(name),
            description: Ustr::from(description),
            kind,
            value,
            label_name: Ustr::from(""),
            label_value: String::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, name: &str, value: impl Into<String>) -> Self {
        self.label_name = Ustr::from(name);
        self.label_value = value.into();
        self
    }

    #[must_use]
    pub fn with_value(&self, value: i64) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_labeled(&self) -> bool {
        !self.label_name.is_empty()
    }

    #[must_use]
    pub fn key(&self) -> PointKey {
        PointKey {
            name: self.name,
            label_value: self.label_value.clone(),
        }
    }
}

/// Identity of a series: two points with the same key are the same series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointKey {
    pub name: Ustr,
    pub label_value: String,
}

impl PointKey {
    #[must_use]
    pub fn new(name: &str, label_value: &str) -> Self {
        Self {
            name: Ustr::from(name),
            label_value: label_value.to_string(),
        }
    }
}

// Keys sort by their text, name first.
impl Ord for PointKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .as_str()
            .cmp(other.name.as_str())
            .then_with(|| self.label_value.cmp(&other.label_value))
    }
}

impl PartialOrd for PointKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.label_value)
    }
}
