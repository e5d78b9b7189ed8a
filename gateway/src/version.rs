//! `?expectedVersion=` query extraction for optimistic-concurrency writes.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExpectedVersion {
    #[serde(rename = "expectedVersion")]
    pub expected_version: i64,
}
