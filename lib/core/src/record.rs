//! The credential record kept in the remote document.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Expiration date used when none is given.
pub const DEFAULT_EXPIRATION: &str = "2025-12-12";

const ID: &str = "id";
const USERNAME: &str = "username";
const PASSWORD: &str = "password";
const EXPIRES_AT: &str = "expiresAt";
const ALLOW_OFFLINE: &str = "allowOffline";

/// One managed credential entry.
///
/// Decoding is lenient because the document is edited by hand as well as by
/// the bot: missing strings become empty, numbers become their decimal text,
/// and members this type does not know about are carried in [`Record::extra`].
///
/// A decoded record remembers the object it came from. As long as its fields
/// still match that object it is written back exactly as it was read, so a
/// save never rewrites entries the bot did not touch.
#[derive(Debug, Clone)]
pub struct Record {
    /// Device identifier. Not required to be unique.
    pub id: String,
    /// Login name. Removal looks records up by this field.
    pub username: String,
    pub password: String,
    /// Expiration date as `YYYY-MM-DD`.
    pub expires_at: String,
    pub allow_offline: bool,
    /// Unrecognised members, written back unchanged.
    pub extra: Map<String, Value>,
    source: Option<Map<String, Value>>,
}

impl Record {
    /// Creates a record with no extra members.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        expires_at: impl Into<String>,
        allow_offline: bool,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password.into(),
            expires_at: expires_at.into(),
            allow_offline,
            extra: Map::new(),
            source: None,
        }
    }

    /// Returns true if this record has exactly the given username and password.
    #[must_use]
    pub fn has_credentials(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }

    fn from_object(object: Map<String, Value>) -> Self {
        let mut extra = object.clone();
        let mut text = |key: &str| extra.remove(key).and_then(lenient_text);

        let id = text(ID).unwrap_or_default();
        let username = text(USERNAME).unwrap_or_default();
        let password = text(PASSWORD).unwrap_or_default();
        let expires_at = text(EXPIRES_AT).unwrap_or_else(default_expiration);
        let allow_offline = extra.remove(ALLOW_OFFLINE).is_some_and(lenient_bool);

        Self {
            id,
            username,
            password,
            expires_at,
            allow_offline,
            extra,
            source: Some(object),
        }
    }

    /// The object this record was decoded from, if its fields still match it.
    fn unchanged_source(&self) -> Option<&Map<String, Value>> {
        self.source
            .as_ref()
            .filter(|source| Self::from_object((*source).clone()) == *self)
    }
}

/// Records compare by their decoded fields; how they were spelled in the
/// document does not matter.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.username == other.username
            && self.password == other.password
            && self.expires_at == other.expires_at
            && self.allow_offline == other.allow_offline
            && self.extra == other.extra
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(source) = self.unchanged_source() {
            return source.serialize(serializer);
        }

        let known = [ID, USERNAME, PASSWORD, EXPIRES_AT, ALLOW_OFFLINE];
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(ID, &self.id)?;
        map.serialize_entry(USERNAME, &self.username)?;
        map.serialize_entry(PASSWORD, &self.password)?;
        map.serialize_entry(EXPIRES_AT, &self.expires_at)?;
        map.serialize_entry(ALLOW_OFFLINE, &self.allow_offline)?;
        for (key, value) in &self.extra {
            if !known.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from_object)
    }
}

fn default_expiration() -> String {
    DEFAULT_EXPIRATION.to_string()
}

fn lenient_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_bool(value: Value) -> bool {
    match value {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}
