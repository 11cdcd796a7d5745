//! The single timestamp type used by report records.
//!
//! Document stores hand back times in several shapes: RFC 3339 strings, epoch milliseconds, and
//! native `{ seconds, nanoseconds }` objects. Everything is normalized to [`Timestamp`] as soon
//! as it is deserialized; serialization always writes RFC 3339.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub type Timestamp = DateTime<Utc>;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Rfc3339(String),
    EpochMillis(i64),
    Native {
        seconds: i64,
        #[serde(default, alias = "nanos")]
        nanoseconds: u32,
    },
}

impl RawTimestamp {
    fn normalize(self) -> Result<Timestamp, String> {
        match self {
            RawTimestamp::Rfc3339(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|value| value.with_timezone(&Utc))
                .map_err(|err| format!("failed to parse '{raw}' as RFC 3339 ({err})")),
            RawTimestamp::EpochMillis(millis) => Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| format!("epoch milliseconds {millis} out of range")),
            RawTimestamp::Native {
                seconds,
                nanoseconds,
            } => Utc
                .timestamp_opt(seconds, nanoseconds)
                .single()
                .ok_or_else(|| format!("timestamp {seconds}s/{nanoseconds}ns out of range")),
        }
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    RawTimestamp::deserialize(deserializer)?
        .normalize()
        .map_err(serde::de::Error::custom)
}

pub fn serialize<S>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}
