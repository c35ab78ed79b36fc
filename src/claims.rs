//! The payload carried inside a JWS/JWE: an arbitrary JSON object with a
//! handful of registered claims (RFC 7519 §4.1) that the validator and
//! builder know how to read and write.

use serde_json::{Map, Value};

/// A claim set. Backed by a plain JSON object so any claim — registered or
/// private — round-trips without the handler needing to know its shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(pub Map<String, Value>);

impl Claims {
    /// An empty claim set.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps an already-built JSON object as a claim set.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// `iss` (issuer), RFC 7519 §4.1.1.
    pub fn iss(&self) -> Option<&str> {
        self.0.get("iss").and_then(Value::as_str)
    }

    /// `aud` (audience), RFC 7519 §4.1.3. Normalizes the string-or-array
    /// encoding into a flat list; a single string is returned as a
    /// one-element list.
    pub fn aud(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// `exp` (expiration time), RFC 7519 §4.1.4, as seconds since the epoch.
    pub fn exp(&self) -> Option<i64> {
        self.numeric_date("exp")
    }

    /// `nbf` (not before), RFC 7519 §4.1.5, as seconds since the epoch.
    pub fn nbf(&self) -> Option<i64> {
        self.numeric_date("nbf")
    }

    /// `iat` (issued at), RFC 7519 §4.1.6, as seconds since the epoch.
    pub fn iat(&self) -> Option<i64> {
        self.numeric_date("iat")
    }

    /// `act` (actor), the nested-token claim used for delegation/impersonation
    /// chains. Not a registered RFC 7519 claim but standard practice for
    /// actor-chain validation (OAuth token exchange, RFC 8693 §4.1).
    pub fn act(&self) -> Option<&Value> {
        self.0.get("act")
    }

    fn numeric_date(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    /// Sets `iss`.
    pub fn set_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.0.insert("iss".into(), Value::String(issuer.into()));
        self
    }

    /// Sets `aud` to a single audience string.
    pub fn set_audience(mut self, audience: impl Into<String>) -> Self {
        self.0.insert("aud".into(), Value::String(audience.into()));
        self
    }

    /// Sets `aud` to a list of audience strings.
    pub fn set_audiences<I, S>(mut self, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = audiences.into_iter().map(|s| Value::String(s.into())).collect();
        self.0.insert("aud".into(), Value::Array(values));
        self
    }

    /// Sets `exp`.
    pub fn set_expiration(mut self, exp: i64) -> Self {
        self.0.insert("exp".into(), Value::from(exp));
        self
    }

    /// Sets `nbf`.
    pub fn set_not_before(mut self, nbf: i64) -> Self {
        self.0.insert("nbf".into(), Value::from(nbf));
        self
    }

    /// Sets `iat`.
    pub fn set_issued_at(mut self, iat: i64) -> Self {
        self.0.insert("iat".into(), Value::from(iat));
        self
    }

    /// Sets an arbitrary claim, registered or private.
    pub fn set_claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl serde::Serialize for Claims {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Claims {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(Claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_normalizes_string_or_array() {
        let single = Claims::new().set_audience("svc-a");
        assert_eq!(single.aud(), vec!["svc-a"]);

        let many = Claims::new().set_audiences(["svc-a", "svc-b"]);
        assert_eq!(many.aud(), vec!["svc-a", "svc-b"]);

        let none = Claims::new();
        assert!(none.aud().is_empty());
    }

    #[test]
    fn numeric_dates_round_trip() {
        let claims = Claims::new().set_expiration(1_700_000_000).set_not_before(1_699_999_000);
        assert_eq!(claims.exp(), Some(1_700_000_000));
        assert_eq!(claims.nbf(), Some(1_699_999_000));
        assert_eq!(claims.iat(), None);
    }

    #[test]
    fn actor_claim_is_opaque_json() {
        let actor = serde_json::json!({"sub": "service-account"});
        let claims = Claims::new().set_claim("act", actor.clone());
        assert_eq!(claims.act(), Some(&actor));
    }
}
