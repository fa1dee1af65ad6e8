use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle state of a help request.
///
/// `Pending` is the only non-terminal state. The only legal transitions are
/// `Pending -> Resolved` and `Pending -> Unresolved`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Resolved,
    Unresolved,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 3] = [Self::Pending, Self::Resolved, Self::Unresolved];
    pub const TERMINAL: [RequestStatus; 2] = [Self::Resolved, Self::Unresolved];

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "unresolved" => Ok(Self::Unresolved),
            _ => Err(format!("Unknown request status: {s}")),
        }
    }
}

/// Speaker of a conversation turn. Anything other than `user` or
/// `assistant` collapses into `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ChatRole {
    User,
    Assistant,
    #[default]
    Other,
}

impl From<String> for ChatRole {
    fn from(value: String) -> Self {
        ChatRole::from(value.as_str())
    }
}

impl From<&str> for ChatRole {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "user" => ChatRole::User,
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::Other,
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<ChatRole>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Only user/assistant turns with actual text are worth showing.
    pub fn is_displayable(&self) -> bool {
        matches!(self.role, ChatRole::User | ChatRole::Assistant)
            && !self.content.trim().is_empty()
    }
}

/// Encode a timestamp for storage.
///
/// Fixed precision and a `Z` suffix keep the text lexicographically ordered,
/// which the store relies on for `ORDER BY` and cutoff comparisons.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Deserialize an optional timestamp, mapping anything unparseable to `None`.
///
/// Accepts RFC 3339 strings and `{ "seconds": .., "nanoseconds": .. }`
/// objects as produced by document stores.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        serde_json::Value::String(s) => decode_timestamp(&s),
        serde_json::Value::Object(map) => {
            let seconds = map.get("seconds").and_then(|v| v.as_i64())?;
            let nanos = map
                .get("nanoseconds")
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                .min(999_999_999) as u32;
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_is_open() {
        assert!(!RequestStatus::Pending.is_terminal());
        for status in RequestStatus::TERMINAL {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_status_parse_round_trips_display() {
        for status in RequestStatus::ALL {
            assert_eq!(status.to_string().parse::<RequestStatus>(), Ok(status));
        }
        assert!("archived".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_unknown_roles_become_other() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"system","content":"be nice"}"#).unwrap();
        assert_eq!(msg.role, ChatRole::Other);
        assert!(!msg.is_displayable());

        let msg: ChatMessage = serde_json::from_str(r#"{"role":"USER","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, ChatRole::User);
        assert!(msg.is_displayable());
    }

    #[test]
    fn test_empty_content_is_not_displayable() {
        assert!(!ChatMessage::new("assistant", "   ").is_displayable());
        assert!(ChatMessage::new("assistant", "Sure!").is_displayable());
    }

    #[test]
    fn test_encoded_timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(encode_timestamp(early) < encode_timestamp(late));
        assert_eq!(decode_timestamp(&encode_timestamp(late)), Some(late));
    }

    #[derive(Deserialize)]
    struct Stamped {
        #[serde(default, deserialize_with = "lenient_timestamp")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_lenient_timestamp_accepts_known_shapes() {
        let parsed: Stamped = serde_json::from_str(r#"{"at":"2026-10-16T10:00:00Z"}"#).unwrap();
        assert!(parsed.at.is_some());

        let parsed: Stamped =
            serde_json::from_str(r#"{"at":{"seconds":1760608800,"nanoseconds":5}}"#).unwrap();
        assert_eq!(parsed.at.map(|t| t.timestamp()), Some(1_760_608_800));
    }

    #[test]
    fn test_lenient_timestamp_tolerates_garbage() {
        let parsed: Stamped = serde_json::from_str(r#"{"at":"yesterday"}"#).unwrap();
        assert!(parsed.at.is_none());
        let parsed: Stamped = serde_json::from_str(r#"{"at":42}"#).unwrap();
        assert!(parsed.at.is_none());
        let parsed: Stamped = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.at.is_none());
    }
}
