use std::fmt;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

const MAX_OFFSET_MINUTES: i32 = 18 * 60;

/// How a minute field is moved onto the even-minute grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlignPolicy {
    /// Round down to the nearest even minute. Used for outbound poll stamps.
    Floor,
    /// Round to the nearest even minute, odd minutes going up, carrying into
    /// the next hour or day. Used for manual entries about to be persisted.
    Nearest,
}

/// An instant in the reference zone, on an even minute, with seconds and
/// sub-seconds zeroed.
///
/// The only ways to obtain one are [`TimeNormalizer`] and
/// [`CanonicalTimestamp::parse`], both of which enforce the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalTimestamp(DateTime<FixedOffset>);

impl CanonicalTimestamp {
    /// Decodes an RFC 3339 string and rejects anything off the grid.
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed = DateTime::parse_from_rfc3339(raw.trim())
            .with_context(|| format!("invalid canonical timestamp '{raw}'"))?;
        if parsed.second() != 0 || parsed.nanosecond() != 0 {
            bail!("canonical timestamp '{raw}' carries seconds");
        }
        if parsed.minute() % 2 != 0 {
            bail!("canonical timestamp '{raw}' is not on an even minute");
        }
        Ok(Self(parsed))
    }

    pub fn as_datetime(&self) -> DateTime<FixedOffset> {
        self.0
    }

}

impl fmt::Display for CanonicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl TryFrom<String> for CanonicalTimestamp {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).map_err(|err| format!("{err:#}"))
    }
}

impl From<CanonicalTimestamp> for String {
    fn from(value: CanonicalTimestamp) -> Self {
        value.to_string()
    }
}

/// Converts instants into canonical timestamps in one fixed reference zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeNormalizer {
    source: FixedOffset,
    reference: FixedOffset,
}

impl TimeNormalizer {
    /// `source` is the zone naive wall-clock inputs are read in; `reference`
    /// is the zone every canonical timestamp is expressed in.
    pub fn new(source_offset_minutes: i32, reference_offset_minutes: i32) -> Result<Self> {
        Ok(Self {
            source: offset_from_minutes(source_offset_minutes, "source")?,
            reference: offset_from_minutes(reference_offset_minutes, "reference")?,
        })
    }

    pub fn reference_offset(&self) -> FixedOffset {
        self.reference
    }

    pub fn source_offset(&self) -> FixedOffset {
        self.source
    }

    pub fn floor_align(&self, instant: DateTime<Utc>) -> CanonicalTimestamp {
        self.align(instant, AlignPolicy::Floor)
    }

    pub fn nearest_align(&self, instant: DateTime<Utc>) -> CanonicalTimestamp {
        self.align(instant, AlignPolicy::Nearest)
    }

    pub fn align(&self, instant: DateTime<Utc>, policy: AlignPolicy) -> CanonicalTimestamp {
        let local = instant.with_timezone(&self.reference);
        let whole_minute = local
            - Duration::seconds(i64::from(local.second()))
            - Duration::nanoseconds(i64::from(local.nanosecond()));
        let odd = i64::from(whole_minute.minute() % 2);

        let aligned = match policy {
            AlignPolicy::Floor => whole_minute - Duration::minutes(odd),
            AlignPolicy::Nearest => whole_minute + Duration::minutes(odd),
        };

        CanonicalTimestamp(aligned)
    }

    /// Reads `wall_clock` in the source zone, then aligns it in the reference
    /// zone.
    pub fn from_wall_clock(
        &self,
        wall_clock: NaiveDateTime,
        policy: AlignPolicy,
    ) -> Result<CanonicalTimestamp> {
        let instant = self
            .source
            .from_local_datetime(&wall_clock)
            .single()
            .ok_or_else(|| anyhow!("wall clock {wall_clock} is ambiguous in the source zone"))?;
        Ok(self.align(instant.with_timezone(&Utc), policy))
    }
}

fn offset_from_minutes(minutes: i32, which: &str) -> Result<FixedOffset> {
    if minutes.abs() > MAX_OFFSET_MINUTES {
        bail!("{which} UTC offset of {minutes} minutes is out of range");
    }
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| anyhow!("{which} UTC offset of {minutes} minutes is invalid"))
}
