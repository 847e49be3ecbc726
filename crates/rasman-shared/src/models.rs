//! Entity snapshots returned by the RAS management API.
//!
//! Every struct tolerates partial payloads from older server versions: a
//! missing or `null` field decodes to the type's default (empty string, 0,
//! `false`, `None`).  Nothing beyond type coercion is validated.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::constants::{UNCATEGORIZED_ID, UNKNOWN};
use crate::error::ModelError;
use crate::format::{format_duration, network_label};

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

fn null_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown))
}

// ---------------------------------------------------------------------------
// Account status
// ---------------------------------------------------------------------------

/// Reason an account is not active.  `None` on a [`User`] means active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SuspendedStatus {
    Deleted,
    Expired,
    Suspended,
    SuspendedAge,
    /// A value this console does not know about, kept verbatim.
    Other(String),
}

impl SuspendedStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Deleted => "deleted",
            Self::Expired => "expired",
            Self::Suspended => "suspended",
            Self::SuspendedAge => "suspended_age",
            Self::Other(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Deleted => "Deleted",
            Self::Expired => "Expired",
            Self::Suspended => "Suspended",
            Self::SuspendedAge => "Suspended (Age)",
            Self::Other(raw) => raw,
        }
    }

    /// Every status an operator can pick, in display order, `None` first.
    pub fn choices() -> Vec<(&'static str, Option<SuspendedStatus>)> {
        vec![
            ("Active", None),
            ("Deleted", Some(Self::Deleted)),
            ("Expired", Some(Self::Expired)),
            ("Suspended", Some(Self::Suspended)),
            ("Suspended (Age)", Some(Self::SuspendedAge)),
        ]
    }

    /// Parse an operator-supplied choice.  `active` maps to `None`.
    pub fn parse_choice(input: &str) -> Result<Option<SuspendedStatus>, ModelError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "active" | "none" | "" => Ok(None),
            "deleted" => Ok(Some(Self::Deleted)),
            "expired" => Ok(Some(Self::Expired)),
            "suspended" => Ok(Some(Self::Suspended)),
            "suspended_age" | "suspended-age" => Ok(Some(Self::SuspendedAge)),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }

    /// Display label for an optional status, `Active` when absent.
    pub fn label_of(status: Option<&SuspendedStatus>) -> &str {
        status.map_or("Active", SuspendedStatus::label)
    }
}

impl From<String> for SuspendedStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "deleted" => Self::Deleted,
            "expired" => Self::Expired,
            "suspended" => Self::Suspended,
            "suspended_age" => Self::SuspendedAge,
            _ => Self::Other(raw),
        }
    }
}

impl From<SuspendedStatus> for String {
    fn from(status: SuspendedStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SuspendedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user account.  The list endpoint only fills the first four fields; the
/// account endpoint fills the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub screen_name: String,
    #[serde(deserialize_with = "null_default")]
    pub is_icq: bool,
    pub suspended_status: Option<SuspendedStatus>,
    pub profile: Option<String>,
    pub email_address: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub confirmed: bool,
}

impl User {
    /// `"AIM • Active"`, `"ICQ • Suspended (Age)"`, ...
    pub fn display_description(&self) -> String {
        format!(
            "{} • {}",
            network_label(self.is_icq),
            SuspendedStatus::label_of(self.suspended_status.as_ref())
        )
    }

    pub fn is_active(&self) -> bool {
        self.suspended_status.is_none()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A live connection.  Sessions are polled, never cached beyond one fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub screen_name: String,
    #[serde(deserialize_with = "null_default")]
    pub online_seconds: f64,
    #[serde(deserialize_with = "null_default")]
    pub away_message: String,
    #[serde(deserialize_with = "null_default")]
    pub idle_seconds: f64,
    #[serde(deserialize_with = "null_default")]
    pub is_icq: bool,
    #[serde(deserialize_with = "null_default")]
    pub remote_addr: String,
    #[serde(deserialize_with = "null_default")]
    pub remote_port: u16,
}

impl Session {
    pub fn display_description(&self) -> String {
        let idle = if self.idle_seconds > 0.0 {
            format_duration(self.idle_seconds)
        } else {
            "Not idle".to_string()
        };

        let mut out = format!(
            "{} • Online: {} • {} • {}:{}",
            network_label(self.is_icq),
            format_duration(self.online_seconds),
            idle,
            self.remote_addr,
            self.remote_port
        );
        if !self.away_message.is_empty() {
            out.push_str(" • Away: ");
            out.push_str(&self.away_message);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Chat room
// ---------------------------------------------------------------------------

/// A public chat room.  The name is its identity; there is no numeric id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatRoom {
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub create_time: String,
    /// Opaque participant records, only ever counted.
    #[serde(deserialize_with = "null_default")]
    pub participants: Vec<Value>,
    pub creator_id: Option<String>,
}

impl ChatRoom {
    pub fn display_description(&self) -> String {
        let created = if self.create_time.is_empty() {
            UNKNOWN
        } else {
            self.create_time.as_str()
        };
        format!(
            "{} participants • Created: {}",
            self.participants.len(),
            created
        )
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    #[serde(deserialize_with = "null_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
}

impl Category {
    pub fn display_description(&self) -> String {
        format!("Category ID: {}", self.id)
    }

    pub fn is_uncategorized(&self) -> bool {
        self.id == UNCATEGORIZED_ID
    }
}

/// A directory keyword.  Older servers report the owning category as
/// `parent` instead of `category_id`; both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "KeywordRecord")]
pub struct Keyword {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct KeywordRecord {
    #[serde(deserialize_with = "null_default")]
    id: i64,
    #[serde(deserialize_with = "null_default")]
    name: String,
    category_id: Option<i64>,
    parent: Option<i64>,
}

impl From<KeywordRecord> for Keyword {
    fn from(record: KeywordRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            category_id: record
                .category_id
                .or(record.parent)
                .unwrap_or(UNCATEGORIZED_ID),
        }
    }
}

impl Keyword {
    pub fn display_description(&self) -> String {
        if self.category_id == UNCATEGORIZED_ID {
            format!("Keyword ID: {} • Uncategorized", self.id)
        } else {
            format!("Keyword ID: {} • Category ID: {}", self.id, self.category_id)
        }
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Build information reported by `GET /version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default = "unknown", deserialize_with = "null_unknown")]
    pub version: String,
    #[serde(default = "unknown", deserialize_with = "null_unknown")]
    pub commit: String,
    #[serde(default = "unknown", deserialize_with = "null_unknown")]
    pub date: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            version: unknown(),
            commit: unknown(),
            date: unknown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_missing_fields_default() {
        let user: User = serde_json::from_value(json!({ "screen_name": "alice" })).unwrap();
        assert_eq!(user.screen_name, "alice");
        assert_eq!(user.id, "");
        assert!(!user.is_icq);
        assert!(user.suspended_status.is_none());
        assert!(!user.confirmed);
    }

    #[test]
    fn test_user_null_fields_default() {
        let user: User = serde_json::from_value(json!({
            "id": null,
            "screen_name": "bob",
            "is_icq": null,
            "suspended_status": null,
        }))
        .unwrap();
        assert_eq!(user.id, "");
        assert!(user.is_active());
    }

    #[test]
    fn test_user_description() {
        let mut user = User {
            screen_name: "carol".into(),
            ..User::default()
        };
        assert_eq!(user.display_description(), "AIM • Active");

        user.is_icq = true;
        user.suspended_status = Some(SuspendedStatus::SuspendedAge);
        assert_eq!(user.display_description(), "ICQ • Suspended (Age)");
    }

    #[test]
    fn test_unknown_status_kept_verbatim() {
        let user: User =
            serde_json::from_value(json!({ "suspended_status": "banished" })).unwrap();
        assert_eq!(
            user.suspended_status,
            Some(SuspendedStatus::Other("banished".into()))
        );
        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["suspended_status"], "banished");
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(SuspendedStatus::parse_choice("Active"), Ok(None));
        assert_eq!(
            SuspendedStatus::parse_choice("suspended-age"),
            Ok(Some(SuspendedStatus::SuspendedAge))
        );
        assert!(SuspendedStatus::parse_choice("frozen").is_err());
    }

    #[test]
    fn test_session_description() {
        let session = Session {
            screen_name: "dave".into(),
            online_seconds: 9000.0,
            idle_seconds: 0.0,
            remote_addr: "10.0.0.7".into(),
            remote_port: 5190,
            away_message: "brb".into(),
            ..Session::default()
        };
        assert_eq!(
            session.display_description(),
            "AIM • Online: 2h 30m • Not idle • 10.0.0.7:5190 • Away: brb"
        );
    }

    #[test]
    fn test_chat_room_description() {
        let room: ChatRoom = serde_json::from_value(json!({
            "name": "lobby",
            "create_time": "2024-01-01T00:00:00Z",
            "participants": [{ "screen_name": "a" }, { "screen_name": "b" }],
        }))
        .unwrap();
        assert_eq!(
            room.display_description(),
            "2 participants • Created: 2024-01-01T00:00:00Z"
        );
        assert!(room.creator_id.is_none());
    }

    #[test]
    fn test_keyword_category_fallbacks() {
        let current: Keyword =
            serde_json::from_value(json!({ "id": 1, "name": "rust", "category_id": 4 })).unwrap();
        assert_eq!(current.category_id, 4);

        let legacy: Keyword =
            serde_json::from_value(json!({ "id": 2, "name": "go", "parent": 7 })).unwrap();
        assert_eq!(legacy.category_id, 7);

        let both: Keyword = serde_json::from_value(
            json!({ "id": 3, "name": "c", "category_id": 2, "parent": 9 }),
        )
        .unwrap();
        assert_eq!(both.category_id, 2);

        let neither: Keyword = serde_json::from_value(json!({ "id": 4, "name": "x" })).unwrap();
        assert_eq!(neither.category_id, UNCATEGORIZED_ID);
        assert_eq!(neither.display_description(), "Keyword ID: 4 • Uncategorized");
    }

    #[test]
    fn test_version_defaults_to_unknown() {
        let info: VersionInfo =
            serde_json::from_value(json!({ "version": "0.9.1", "commit": null })).unwrap();
        assert_eq!(info.version, "0.9.1");
        assert_eq!(info.commit, UNKNOWN);
        assert_eq!(info.date, UNKNOWN);
    }
}
