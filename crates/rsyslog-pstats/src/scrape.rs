// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bridges the point store to a Prometheus scrape.
//!
//! [`ScrapeAdapter`] is a [`prometheus::core::Collector`]: register it in a
//! [`prometheus::Registry`] and every `gather` reads the store once and turns
//! each stored point into a constant counter or gauge sample.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};
use tracing::{debug, warn};

use crate::point::{MetricKind, Point};
use crate::point_store::PointStore;

pub const NAMESPACE: &str = "rsyslog";
const SCRAPES_NAME: &str = "scrapes";
const SCRAPES_HELP: &str = "times exporter has been scraped";

/// Exposed name of a stored point name: namespaced, with every character
/// outside `[a-zA-Z0-9_:]` replaced by `_`.
#[must_use]
pub fn fq_name(name: &str) -> String {
    let mut fq_name = String::with_capacity(NAMESPACE.len() + 1 + name.len());
    fq_name.push_str(NAMESPACE);
    fq_name.push('_');
    fq_name.extend(name.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
            c
        } else {
            '_'
        }
    }));
    fq_name
}

/// Points sharing one exposed name.
struct Family<'a> {
    fq_name: String,
    points: Vec<&'a Point>,
}

impl Family<'_> {
    fn help(&self) -> &str {
        self.points.first().map_or("", |point| point.description.as_str())
    }

    fn label_name(&self) -> Option<String> {
        self.points
            .first()
            .filter(|point| point.is_labeled())
            .map(|point| point.label_name.to_string())
    }

    /// Counter or gauge when every point agrees, gauge otherwise.
    fn kind(&self) -> MetricKind {
        let mut kinds = self.points.iter().map(|point| point.kind);
        match kinds.next() {
            Some(first) if kinds.all(|kind| kind == first) => first,
            _ => MetricKind::Gauge,
        }
    }
}

/// Groups a sorted snapshot into families, in snapshot order.
///
/// Two stored names can sanitize to the same exposed name (`a.b` and `a-b`).
/// The name seen first owns the family and the other name's points are left
/// out of the scrape.
fn families(points: &[Arc<Point>]) -> Vec<Family<'_>> {
    let mut families: Vec<Family<'_>> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut dropped: BTreeSet<&str> = BTreeSet::new();

    for point in points {
        let fq_name = fq_name(&point.name);
        match by_name.get(&fq_name) {
            Some(&index) => {
                let family = &mut families[index];
                if family.points.first().map(|first| first.name) == Some(point.name) {
                    family.points.push(point.as_ref());
                } else {
                    dropped.insert(point.name.as_str());
                }
            }
            None => {
                by_name.insert(fq_name.clone(), families.len());
                families.push(Family {
                    fq_name,
                    points: vec![point.as_ref()],
                });
            }
        }
    }

    for name in dropped {
        warn!(
            "Metric {name} collides with another metric as {}, skipping it",
            fq_name(name)
        );
    }
    families
}

fn metric(point: &Point, kind: MetricKind) -> proto::Metric {
    let mut metric = proto::Metric::new();
    if point.is_labeled() {
        let mut label = proto::LabelPair::new();
        label.set_name(point.label_name.to_string());
        label.set_value(point.label_value.clone());
        metric.mut_label().push(label);
    }

    let value = point.value as f64;
    match kind {
        MetricKind::Counter => {
            let mut counter = proto::Counter::new();
            counter.set_value(value);
            metric.set_counter(counter);
        }
        MetricKind::Gauge => {
            let mut gauge = proto::Gauge::new();
            gauge.set_value(value);
            metric.set_gauge(gauge);
        }
    }
    metric
}

fn metric_family(fq_name: String, help: &str, kind: MetricKind) -> MetricFamily {
    let mut family = MetricFamily::new();
    family.set_name(fq_name);
    family.set_help(help.to_string());
    family.set_field_type(match kind {
        MetricKind::Counter => MetricType::COUNTER,
        MetricKind::Gauge => MetricType::GAUGE,
    });
    family
}

#[derive(Debug)]
pub struct ScrapeAdapter {
    store: Arc<PointStore>,
    scrapes: AtomicU64,
    scrapes_desc: Desc,
}

impl ScrapeAdapter {
    pub fn new(store: Arc<PointStore>) -> prometheus::Result<Self> {
        let scrapes_desc = Desc::new(
            fq_name(SCRAPES_NAME),
            SCRAPES_HELP.to_string(),
            Vec::new(),
            HashMap::new(),
        )?;
        Ok(Self {
            store,
            scrapes: AtomicU64::new(0),
            scrapes_desc,
        })
    }

    #[must_use]
    pub fn scrapes(&self) -> u64 {
        self.scrapes.load(Ordering::Relaxed)
    }

    /// Descriptors for every family currently in the store, then the scrape
    /// counter. Families are known only once a point for them has been stored.
    #[must_use]
    pub fn describe(&self) -> Vec<Desc> {
        let snapshot = self.store.snapshot();
        let mut descs: Vec<Desc> = families(&snapshot)
            .into_iter()
            .filter_map(|family| {
                let help = family.help().to_string();
                let labels = family.label_name().into_iter().collect();
                Desc::new(family.fq_name, help, labels, HashMap::new())
                    .map_err(|e| debug!("Skipping descriptor: {e}"))
                    .ok()
            })
            .collect();
        descs.push(self.scrapes_desc.clone());
        descs
    }
}

impl Collector for ScrapeAdapter {
    /// Only the scrape counter is fixed; point families appear as rsyslog
    /// reports them.
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.scrapes_desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let scrapes = self.scrapes.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = self.store.snapshot();

        let mut families: Vec<MetricFamily> = families(&snapshot)
            .into_iter()
            .map(|family| {
                let kind = family.kind();
                let mut exposed = metric_family(family.fq_name.clone(), family.help(), kind);
                for point in &family.points {
                    exposed.mut_metric().push(metric(point, kind));
                }
                exposed
            })
            .collect();

        let mut counter = proto::Counter::new();
        counter.set_value(scrapes as f64);
        let mut scrape_metric = proto::Metric::new();
        scrape_metric.set_counter(counter);
        let mut scrape_family = metric_family(
            self.scrapes_desc.fq_name.clone(),
            &self.scrapes_desc.help,
            MetricKind::Counter,
        );
        scrape_family.mut_metric().push(scrape_metric);
        families.push(scrape_family);

        families
    }
}
