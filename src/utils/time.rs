use chrono::NaiveTime;
use serde::{de, Deserialize, Deserializer, Serializer};

/// Accepts `HH:MM:SS` or `HH:MM`.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

pub fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

pub fn deserialize_clock<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_clock(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid time '{raw}', expected HH:MM")))
}

pub fn deserialize_optional_clock<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_clock(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid time '{raw}', expected HH:MM"))),
    }
}

pub fn serialize_clock<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_clock(*time))
}
