// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for line handling and store lookups.

use crate::classifier::RecordShape;
use crate::point::PointKey;

/// A payload classified as a known shape could not be decoded into its record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("field `{field}` must be {expected}, got `{found}`")]
    InvalidField {
        field: String,
        expected: &'static str,
        found: String,
    },
}

/// Why a single stats line was rejected. Never fatal for the ingestion loop.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("failed to split log line, expected 4 columns, got: {columns}")]
    Framing { columns: usize },
    #[error("line longer than {limit} bytes, skipped")]
    TooLong { limit: usize },
    #[error("unknown pstat type")]
    UnknownShape,
    #[error("failed to decode {shape} stat: {source}")]
    Decode {
        shape: RecordShape,
        #[source]
        source: DecodeError,
    },
}

/// The requested point identity is not present in the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("point {0} does not exist")]
pub struct LookupError(pub PointKey);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_error_display() {
        let error = LineError::Framing { columns: 2 };
        assert_eq!(
            error.to_string(),
            "failed to split log line, expected 4 columns, got: 2"
        );
    }

    #[test]
    fn test_too_long_display() {
        let error = LineError::TooLong { limit: 65536 };
        assert_eq!(error.to_string(), "line longer than 65536 bytes, skipped");
    }

    #[test]
    fn test_decode_error_names_shape() {
        let source = DecodeError::InvalidField {
            field: "processed".to_string(),
            expected: "an integer",
            found: "\"many\"".to_string(),
        };
        let error = LineError::Decode {
            shape: RecordShape::Action,
            source,
        };
        assert_eq!(
            error.to_string(),
            "failed to decode action stat: field `processed` must be an integer, got `\"many\"`"
        );
    }

    #[test]
    fn test_lookup_error_display() {
        let error = LookupError(PointKey::new("queue_size", "main Q"));
        assert_eq!(error.to_string(), "point queue_size.main Q does not exist");
    }
}
