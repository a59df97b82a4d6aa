//! Core types for the ledger
//!
//! Field names follow the JSON shape served by the HTTP layer, so the same
//! structs are used for storage and for responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Settings key for the automatic token use preference
pub const AUTO_USE_TOKENS: &str = "autoUseTokens";

/// Settings key for the flag read by the threshold gating policy
pub const REDUCE_ADS: &str = "reduceAds";

/// Per-user ledger record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// External user identifier (never empty once stored)
    #[serde(alias = "Xid")]
    pub id: String,

    /// Number of ads the user started watching
    #[serde(alias = "Ads")]
    pub ads_watched: u64,

    /// Number of videos the user started watching
    #[serde(alias = "Videos")]
    pub videos_watched: u64,

    /// Spendable tokens (may go negative in unfloored mode)
    #[serde(alias = "Tokens")]
    pub token_balance: i64,

    /// Tokens spent to skip ads
    #[serde(alias = "UsedTokens")]
    pub tokens_used: u64,

    /// User preferences
    #[serde(default, alias = "Settings")]
    pub settings: Settings,
}

impl UserRecord {
    /// Create a zeroed record for a user seen for the first time
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Whether the user has credit to spend
    pub fn has_credit(&self) -> bool {
        self.token_balance > 0
    }
}

/// Preference name to value mapping
///
/// Values are stored as-is; only the keys read by gating are interpreted.
/// Lookups prefer an exact key and fall back to an ASCII case-insensitive
/// match, so `AutoUseTokens` and `autoUseTokens` name the same preference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, serde_json::Value>);

impl Settings {
    /// Create empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw value for a key
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    /// String value for a key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    /// Interpret a key as an on/off flag
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => {
                matches!(s.to_ascii_lowercase().as_str(), "yes" | "true" | "on" | "1")
            }
            Some(serde_json::Value::Number(n)) => n.as_i64().map_or(false, |n| n != 0),
            _ => false,
        }
    }

    /// Automatic token use preference
    pub fn auto_use_tokens(&self) -> Option<&str> {
        self.get_str(AUTO_USE_TOKENS)
    }

    /// Whether no preference is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Engagement event type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An ad started playing
    AdStart,
    /// An ad finished playing
    AdEnd,
    /// A video started playing
    VideoStart,
    /// A video finished playing
    VideoEnd,
    /// Anything else the player reports
    Other(String),
}

impl EventKind {
    /// Wire name
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::AdStart => "ad_start",
            EventKind::AdEnd => "ad_end",
            EventKind::VideoStart => "video_start",
            EventKind::VideoEnd => "video_end",
            EventKind::Other(s) => s,
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "ad_start" => EventKind::AdStart,
            "ad_end" => EventKind::AdEnd,
            "video_start" => EventKind::VideoStart,
            "video_end" => EventKind::VideoEnd,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User reference carried by player events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventUser {
    /// Platform user id, empty for anonymous viewers
    #[serde(default)]
    pub xid: String,
}

/// Player engagement event, as posted by the front-end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Who watched
    #[serde(default)]
    pub user: EventUser,

    /// Event type (open set)
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Video being watched
    #[serde(default)]
    pub video_id: String,
}

impl Event {
    /// Create an event
    pub fn new(
        user_id: impl Into<String>,
        kind: impl Into<String>,
        video_id: impl Into<String>,
    ) -> Self {
        Self {
            user: EventUser { xid: user_id.into() },
            kind: kind.into(),
            video_id: video_id.into(),
        }
    }

    /// User id (empty for anonymous viewers)
    pub fn user_id(&self) -> &str {
        &self.user.xid
    }

    /// Parsed event type
    pub fn kind(&self) -> EventKind {
        EventKind::from(self.kind.as_str())
    }

    /// Whether the event has no user attached
    pub fn is_anonymous(&self) -> bool {
        self.user.xid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_zeroed() {
        let record = UserRecord::new("x2abc");
        assert_eq!(record.id, "x2abc");
        assert_eq!(record.ads_watched, 0);
        assert_eq!(record.videos_watched, 0);
        assert_eq!(record.token_balance, 0);
        assert_eq!(record.tokens_used, 0);
        assert!(record.settings.is_empty());
        assert!(!record.has_credit());
    }

    #[test]
    fn test_record_json_field_names() {
        let record = UserRecord {
            id: "u1".to_string(),
            ads_watched: 2,
            videos_watched: 3,
            token_balance: 1,
            tokens_used: 1,
            settings: Settings::new().with(AUTO_USE_TOKENS, "yes"),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["adsWatched"], 2);
        assert_eq!(json["videosWatched"], 3);
        assert_eq!(json["tokenBalance"], 1);
        assert_eq!(json["tokensUsed"], 1);
        assert_eq!(json["settings"]["autoUseTokens"], "yes");
    }

    #[test]
    fn test_event_kind_parsing() {
        assert_eq!(EventKind::from("ad_start"), EventKind::AdStart);
        assert_eq!(EventKind::from("video_end"), EventKind::VideoEnd);
        assert_eq!(
            EventKind::from("seek"),
            EventKind::Other("seek".to_string())
        );
        assert_eq!(EventKind::from("seek").as_str(), "seek");
    }

    #[test]
    fn test_event_wire_format() {
        let event: Event = serde_json::from_str(
            r#"{"user":{"xid":"x7"},"type":"ad_start","video_id":"v9"}"#,
        )
        .unwrap();
        assert_eq!(event.user_id(), "x7");
        assert_eq!(event.kind(), EventKind::AdStart);
        assert_eq!(event.video_id, "v9");

        let anonymous: Event = serde_json::from_str(r#"{"type":"video_start"}"#).unwrap();
        assert!(anonymous.is_anonymous());
    }

    #[test]
    fn test_settings_flag() {
        let settings = Settings::new()
            .with("a", true)
            .with("b", "Yes")
            .with("c", "no")
            .with("d", 1)
            .with("e", serde_json::Value::Null);
        assert!(settings.flag("a"));
        assert!(settings.flag("b"));
        assert!(!settings.flag("c"));
        assert!(settings.flag("d"));
        assert!(!settings.flag("e"));
        assert!(!settings.flag("missing"));
    }

    #[test]
    fn test_settings_keys_ignore_case() {
        let settings: Settings =
            serde_json::from_str(r#"{"AutoUseTokens":"yes","REDUCEADS":true}"#).unwrap();
        assert_eq!(settings.auto_use_tokens(), Some("yes"));
        assert!(settings.flag(REDUCE_ADS));

        let settings = Settings::new()
            .with("autouseTokens", "no")
            .with(AUTO_USE_TOKENS, "yes");
        assert_eq!(settings.auto_use_tokens(), Some("yes"));
    }

    #[test]
    fn test_legacy_record_keys() {
        let record: UserRecord = serde_json::from_str(
            r#"{"Xid":"x9","Ads":5,"Videos":2,"Tokens":3,"UsedTokens":2,
                "Settings":{"AutoUseTokens":"yes"}}"#,
        )
        .unwrap();
        assert_eq!(record.id, "x9");
        assert_eq!(record.ads_watched, 5);
        assert_eq!(record.videos_watched, 2);
        assert_eq!(record.token_balance, 3);
        assert_eq!(record.tokens_used, 2);
        assert_eq!(record.settings.auto_use_tokens(), Some("yes"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["adsWatched"], 5);
        assert!(json.get("Ads").is_none());
    }
}
