// crates/ums-core/src/core/time.rs
// ============================================================================
// Module: UMS Time Model
// Description: Normalized timestamps and the injected clock service.
// Purpose: Provide deterministic, replayable time values across UMS records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Timestamps are stored as unix milliseconds and serialize as RFC 3339 UTC
//! strings, so canonical JSON forms are identical across replicas. The core
//! engine never reads wall-clock time directly; hosts inject a [`Clock`],
//! and identifier fingerprints include time only when the caller supplied
//! it explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as DeError;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds per UTC day, used for schedule day bucketing.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp: unix milliseconds with an RFC 3339 UTC wire form.
///
/// # Invariants
/// - Ordering matches chronological order.
/// - The wire form always renders in UTC (`Z` suffix); offsets are
///   normalized away during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn unix_millis(self) -> i64 {
        self.0
    }

    /// Parses an RFC 3339 string, normalizing any offset to UTC.
    ///
    /// # Errors
    ///
    /// Returns a message when the input is not a valid RFC 3339 timestamp
    /// or lies outside the representable millisecond range.
    pub fn parse(value: &str) -> Result<Self, String> {
        let parsed = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|err| format!("invalid RFC 3339 timestamp {value:?}: {err}"))?;
        let utc = parsed.to_offset(UtcOffset::UTC);
        let millis = utc.unix_timestamp_nanos() / 1_000_000;
        i64::try_from(millis)
            .map(Self)
            .map_err(|_| format!("timestamp out of range: {value:?}"))
    }

    /// Renders the timestamp as an RFC 3339 UTC string.
    ///
    /// Sub-second digits appear only when the millisecond component is
    /// non-zero, keeping the canonical form minimal and stable.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        let nanos = i128::from(self.0) * 1_000_000;
        let Ok(utc) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
            // Out-of-range values cannot occur through the parsing path;
            // render the raw epoch offset rather than losing the record.
            return format!("unix-millis:{}", self.0);
        };
        let year = utc.year();
        let month = u8::from(utc.month());
        let day = utc.day();
        let hour = utc.hour();
        let minute = utc.minute();
        let second = utc.second();
        let milli = utc.millisecond();
        if milli == 0 {
            format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
        } else {
            format!(
                "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{milli:03}Z"
            )
        }
    }

    /// Returns the UTC day index (days since the unix epoch).
    #[must_use]
    pub const fn utc_day(self) -> i64 {
        self.0.div_euclid(MILLIS_PER_DAY)
    }

    /// Returns a timestamp shifted by whole days.
    #[must_use]
    pub const fn plus_days(self, days: i64) -> Self {
        Self(self.0 + days * MILLIS_PER_DAY)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(DeError::custom)
    }
}

// ============================================================================
// SECTION: Clock Service
// ============================================================================

/// Injected wall-clock service.
///
/// Deterministic hosts (tests, replay harnesses) supply a [`FixedClock`];
/// production shells supply [`SystemClock`].
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or(0);
        Timestamp::from_unix_millis(i64::try_from(millis).unwrap_or(i64::MAX))
    }
}

/// Clock pinned to a fixed instant for deterministic replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    /// The instant returned by every [`Clock::now`] call.
    instant: Timestamp,
}

impl FixedClock {
    /// Creates a fixed clock pinned to `instant`.
    #[must_use]
    pub const fn new(instant: Timestamp) -> Self {
        Self {
            instant,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.instant
    }
}
