// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sequential ingestion of impstats lines into the point store.
//!
//! Each line is expected as `<timestamp> <host> <tag> <json payload>`. A bad line is counted in
//! `stats_line_errors`, logged unless silent, and dropped; it never stops the loop.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::{debug, error, warn};

use crate::classifier::classify;
use crate::errors::LineError;
use crate::point::{MetricKind, Point};
use crate::point_store::PointStore;
use crate::record::decode;

pub const ERROR_POINT_NAME: &str = "stats_line_errors";
const ERROR_POINT_HELP: &str = "Counts errors during stats line handling";

const COLUMNS: usize = 4;

/// Longest line handled, newline excluded. Longer lines are counted as errors
/// and skipped without being buffered.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// How the ingestion loop ended.
#[derive(Debug)]
pub enum Termination {
    EndOfInput,
    ReadError(io::Error),
}

pub struct Ingestor {
    store: Arc<PointStore>,
    silent: bool,
    max_line_length: usize,
    error_point: Point,
}

impl Ingestor {
    /// Creates the loop state and publishes `stats_line_errors` at zero.
    #[must_use]
    pub fn new(store: Arc<PointStore>, silent: bool) -> Self {
        let error_point = Point::new(ERROR_POINT_NAME, MetricKind::Counter, 0, ERROR_POINT_HELP);
        store.upsert(error_point.clone());
        Self {
            store,
            silent,
            max_line_length: MAX_LINE_LENGTH,
            error_point,
        }
    }

    #[must_use]
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Reads lines until end of input or a read error.
    pub async fn run<R>(mut self, mut reader: R) -> Termination
    where
        R: AsyncBufRead + Unpin,
    {
        // One extra byte for the newline.
        let limit = self.max_line_length as u64 + 1;
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = (&mut reader).take(limit).read_until(b'\n', &mut line).await;
            match read {
                Ok(0) => return Termination::EndOfInput,
                Ok(_) if line.len() > self.max_line_length && !line.ends_with(b"\n") => {
                    self.record_error(
                        &LineError::TooLong {
                            limit: self.max_line_length,
                        },
                        &line,
                    );
                    if let Err(e) = skip_line(&mut reader).await {
                        return Termination::ReadError(e);
                    }
                }
                Ok(_) => self.ingest_line(&line),
                Err(e) => return Termination::ReadError(e),
            }
        }
    }

    /// Handles one line and accounts for its failure, if any.
    pub fn ingest_line(&mut self, line: &[u8]) {
        match self.handle_line(line) {
            Ok(count) => debug!("Stored {} points", count),
            Err(e) => self.record_error(&e, line),
        }
    }

    /// Splits, classifies, decodes and stores one line. Returns the number of points upserted.
    pub fn handle_line(&self, line: &[u8]) -> Result<usize, LineError> {
        let line = trim_line_end(line);
        let columns: Vec<&[u8]> = line.splitn(COLUMNS, |b| *b == b' ').collect();
        if columns.len() < COLUMNS {
            return Err(LineError::Framing {
                columns: columns.len(),
            });
        }
        let payload = columns[COLUMNS - 1];

        let shape = classify(payload).ok_or(LineError::UnknownShape)?;
        let record =
            decode(shape, payload).map_err(|source| LineError::Decode { shape, source })?;

        let points = record.to_points();
        let count = points.len();
        for point in points {
            self.store.upsert(point);
        }
        Ok(count)
    }

    fn record_error(&mut self, e: &LineError, line: &[u8]) {
        self.error_point = self.error_point.with_value(self.error_point.value + 1);
        self.store.upsert(self.error_point.clone());

        if self.silent {
            return;
        }
        let line = String::from_utf8_lossy(trim_line_end(line));
        match e {
            LineError::UnknownShape => warn!("Error handling stats line: {}, line was: {}", e, line),
            LineError::TooLong { .. } => error!("Error handling stats line: {}", e),
            _ => error!("Error handling stats line: {}, line was: {}", e, line),
        }
    }

    #[must_use]
    pub fn errors(&self) -> i64 {
        self.error_point.value
    }
}

/// Consumes input up to and including the next newline.
async fn skip_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|b| *b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
