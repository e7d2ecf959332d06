// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns rsyslog impstats lines into a latest-value metric store.
//!
//! Lines flow through [`ingest::Ingestor`]: the payload is classified by
//! [`classifier::classify`], decoded by [`record::decode`] and flattened into
//! [`point::Point`]s held in a [`point_store::PointStore`]. A
//! [`scrape::ScrapeAdapter`] registered in a [`prometheus::Registry`] reads the
//! store on every scrape.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod classifier;
pub mod errors;
pub mod ingest;
pub mod point;
pub mod point_store;
pub mod record;
pub mod schema;
pub mod scrape;

pub use classifier::{classify, RecordShape};
pub use errors::{DecodeError, LineError, LookupError};
pub use ingest::{Ingestor, Termination};
pub use point::{MetricKind, Point, PointKey};
pub use point_store::PointStore;
pub use record::{decode, Record};
pub use scrape::ScrapeAdapter;
