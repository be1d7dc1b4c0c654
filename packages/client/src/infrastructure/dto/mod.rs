//! Data Transfer Objects (DTOs) for the CRM backend.
//!
//! DTOs are organized by protocol:
//! - `websocket`: notification and chat socket frames
//! - `http`: REST request / response bodies
//!
//! The backend is loose about scalar types, so ids and timestamps go through
//! [`RawId`] and [`RawTimestamp`] before reaching the domain.

pub mod conversion;
pub mod http;
pub mod websocket;

use serde::{Deserialize, Deserializer, Serialize};

use crm_live_shared::time::parse_timestamp;

/// Integer timestamps below this are taken as seconds rather than milliseconds
const SECONDS_THRESHOLD: i64 = 100_000_000_000;

/// An identifier sent either as a JSON string or a JSON number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    pub fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// A timestamp sent as milliseconds, seconds or an ISO 8601 string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Integer(i64),
    Seconds(f64),
    Text(String),
}

impl RawTimestamp {
    /// Unix milliseconds, `None` if the value cannot be interpreted.
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            Self::Integer(value) if value.abs() < SECONDS_THRESHOLD => Some(value * 1000),
            Self::Integer(value) => Some(*value),
            Self::Seconds(seconds) if seconds.is_finite() => Some((seconds * 1000.0) as i64),
            Self::Seconds(_) => None,
            Self::Text(text) => parse_timestamp(text),
        }
    }
}

/// `deserialize_with` helper accepting string or numeric ids
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(RawId::into_string)
}
