// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Latest-value store shared by the ingestion loop and scrapes.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::errors::LookupError;
use crate::point::{Point, PointKey};

/// Maps each series identity to the most recent point seen for it.
///
/// Points are stored behind `Arc` and never mutated, so a snapshot holds whole points even while
/// the ingestion loop keeps replacing them. The map only grows.
#[derive(Debug, Default)]
pub struct PointStore {
    points: RwLock<BTreeMap<PointKey, Arc<Point>>>,
}

impl PointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `point`, replacing whatever was stored under the same identity.
    pub fn upsert(&self, point: Point) {
        let key = point.key();
        let point = Arc::new(point);
        #[allow(clippy::expect_used)]
        let mut points = self.points.write().expect("lock poisoned");
        points.insert(key, point);
    }

    /// All current points, ordered by identity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Point>> {
        #[allow(clippy::expect_used)]
        let points = self.points.read().expect("lock poisoned");
        points.values().cloned().collect()
    }

    pub fn lookup(&self, key: &PointKey) -> Result<Arc<Point>, LookupError> {
        #[allow(clippy::expect_used)]
        let points = self.points.read().expect("lock poisoned");
        points
            .get(key)
            .cloned()
            .ok_or_else(|| LookupError(key.clone()))
    }

    #[must_use]
    pub fn keys(&self) -> Vec<PointKey> {
        #[allow(clippy::expect_used)]
        let points = self.points.read().expect("lock poisoned");
        points.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        let points = self.points.read().expect("lock poisoned");
        points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
