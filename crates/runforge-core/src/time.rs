// crates/runforge-core/src/time.rs
// ============================================================================
// Module: Runforge Time Model
// Description: Canonical wall-clock timestamp used across run records.
// Purpose: Give every persisted JSON document one RFC 3339 timestamp shape.
// Dependencies: time, serde
// ============================================================================

//! ## Overview
//! Unlike a deterministic-replay engine, a run's manifest, status history,
//! and event stream need genuine wall-clock time: when a run was created,
//! when a status transition happened, when an artifact was signed. This
//! module wraps `time::OffsetDateTime` in a newtype that always serializes
//! as an RFC 3339 string in UTC.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A UTC timestamp serialized as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Returns the current wall-clock time in UTC.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wraps an existing `OffsetDateTime`, normalizing it to UTC.
    #[must_use]
    pub fn from_offset(value: OffsetDateTime) -> Self {
        Self(value.to_offset(time::UtcOffset::UTC))
    }

    /// Returns the underlying `OffsetDateTime`.
    #[must_use]
    pub const fn as_offset(&self) -> OffsetDateTime {
        self.0
    }

    /// Formats the timestamp as an RFC 3339 string.
    ///
    /// # Errors
    /// Returns an error if the underlying value cannot be formatted, which
    /// does not happen for values produced by [`Timestamp::now`].
    pub fn to_rfc3339(&self) -> Result<String, time::error::Format> {
        self.0.format(&Rfc3339)
    }

    /// Parses an RFC 3339 string into a `Timestamp`.
    ///
    /// # Errors
    /// Returns an error if `value` is not a valid RFC 3339 timestamp.
    pub fn parse(value: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(value, &Rfc3339).map(Self::from_offset)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let formatted = self
            .to_rfc3339()
            .map_err(|err| serde::ser::Error::custom(err.to_string()))?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(|err| serde::de::Error::custom(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn round_trips_through_rfc3339() {
        let now = Timestamp::now();
        let formatted = now.to_rfc3339().expect("format should not fail for now()");
        let parsed = Timestamp::parse(&formatted).expect("parse should accept its own output");
        assert_eq!(now, parsed);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Timestamp::parse("not-a-timestamp").is_err());
    }
}
