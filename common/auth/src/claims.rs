use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Reserved claim holding the absolute expiry in seconds since the epoch.
pub const EXPIRATION: &str = "exp";
/// Reserved claim holding the issuing service name.
pub const ISSUER: &str = "iss";

/// Flat set of named values carried in a token payload.
///
/// `exp` and `iss` are written by [`crate::TokenCodec::encode`]; every other
/// key is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Reads an integer claim. Float values are truncated, which is how
    /// numbers that went through a generic JSON decoder come back.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        let value = self.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|number| number as i64))
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get_str(ISSUER)
    }

    /// `None` when no expiry is present; an error when `exp` is not numeric.
    pub fn expires_at(&self) -> Option<AuthResult<i64>> {
        let value = self.get(EXPIRATION)?;
        Some(
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|number| number as i64))
                .ok_or_else(|| AuthError::InvalidToken(format!("non-numeric exp claim: {value}"))),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for Claims {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl TryFrom<Value> for Claims {
    type Error = AuthError;

    fn try_from(value: Value) -> AuthResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AuthError::InvalidToken(format!(
                "claims payload must be an object, got {}",
                json_type(&other)
            ))),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn float_expiry_is_truncated() {
        let claims = Claims::new().with(EXPIRATION, 1_700_000_000.75_f64);
        assert_eq!(claims.expires_at().unwrap().unwrap(), 1_700_000_000);
    }

    #[test]
    fn missing_expiry_is_none() {
        assert!(Claims::new().with("id", 42).expires_at().is_none());
    }

    #[test]
    fn string_expiry_is_rejected() {
        let claims = Claims::new().with(EXPIRATION, "tomorrow");
        let err = claims.expires_at().unwrap().expect_err("string exp");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn serializes_as_flat_object() {
        let claims = Claims::new().with("id", 42).with("name", "alice");
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value, json!({"id": 42, "name": "alice"}));
    }

    #[test]
    fn non_object_payload_is_invalid() {
        let err = Claims::try_from(json!([1, 2, 3])).expect_err("array payload");
        assert!(matches!(err, AuthError::InvalidToken(message) if message.contains("array")));
    }
}
