//! Normalized user record returned by the identity API

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque user identifier. The identity API sends numbers, but string ids
/// are accepted so other backends can be plugged in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{n}"),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<UserId> for Value {
    fn from(id: UserId) -> Self {
        match id {
            UserId::Number(n) => Value::from(n),
            UserId::Text(s) => Value::String(s),
        }
    }
}

impl TryFrom<&Value> for UserId {
    type Error = ();

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => n.as_i64().map(UserId::Number).ok_or(()),
            Value::String(s) => Ok(UserId::Text(s.clone())),
            _ => Err(()),
        }
    }
}

/// Identity resolved from an SSO token.
///
/// Created fresh for every successful exchange and never persisted here;
/// remembering it is the session strategy's job. `token` is the SSO token
/// that produced the record; every other field the API returned is kept in
/// `attributes`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: UserId,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub token: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RemoteUser {
    pub fn new(id: UserId, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            token: String::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Every field as a `(name, text)` pair, `id`, `login` and `token` first.
    ///
    /// Strings are used verbatim; other JSON values use their JSON text.
    pub fn field_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("id".to_string(), self.id.to_string()),
            ("login".to_string(), self.login.clone()),
            ("token".to_string(), self.token.clone()),
        ];
        pairs.extend(self.attributes.iter().map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k.clone(), text)
        }));
        pairs
    }
}

impl fmt::Debug for RemoteUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteUser")
            .field("id", &self.id)
            .field("login", &self.login)
            .field("token", &"[REDACTED]")
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_numeric_id_and_extra_fields() {
        let user: RemoteUser =
            serde_json::from_str(r#"{"id":1,"login":"bob","name":"Bob","is_syncing":false}"#)
                .unwrap();
        assert_eq!(user.id, UserId::Number(1));
        assert_eq!(user.login, "bob");
        assert!(user.token.is_empty());
        assert_eq!(user.attributes["name"], "Bob");
        assert_eq!(user.attributes["is_syncing"], false);
    }

    #[test]
    fn deserializes_string_id() {
        let user: RemoteUser = serde_json::from_str(r#"{"id":"u-7","login":"amy"}"#).unwrap();
        assert_eq!(user.id, UserId::Text("u-7".into()));
        assert_eq!(user.id.to_string(), "u-7");
    }

    #[test]
    fn field_pairs_put_identity_first() {
        let user = RemoteUser::new(UserId::Number(1), "bob")
            .with_token("abc123")
            .with_attribute("name", "Bob")
            .with_attribute("admin", true);
        let pairs = user.field_pairs();
        assert_eq!(pairs[0], ("id".into(), "1".into()));
        assert_eq!(pairs[1], ("login".into(), "bob".into()));
        assert_eq!(pairs[2], ("token".into(), "abc123".into()));
        assert!(pairs.contains(&("name".into(), "Bob".into())));
        assert!(pairs.contains(&("admin".into(), "true".into())));
    }

    #[test]
    fn debug_hides_token() {
        let user = RemoteUser::new(UserId::Number(1), "bob").with_token("abc123");
        let debug = format!("{user:?}");
        assert!(!debug.contains("abc123"), "got: {debug}");
        assert!(debug.contains("bob"));
    }

    #[test]
    fn user_id_round_trips_through_json_value() {
        let value: Value = UserId::Number(42).into();
        assert_eq!(UserId::try_from(&value), Ok(UserId::Number(42)));
        assert!(UserId::try_from(&Value::Bool(true)).is_err());
    }
}
