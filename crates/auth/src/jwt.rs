use {
    base64::{Engine, engine::general_purpose::STANDARD},
    hmac::{Hmac, Mac},
    serde_json::{Map, Value},
    sha2::Sha256,
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

/// Compact HMAC-SHA256 signed token: three dot-separated segments.
///
/// Header and payload are base64-encoded compact JSON; the third segment is
/// the lowercase hex HMAC-SHA256 of `header.payload` under the server key.
/// Equality is payload equality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonWebToken {
    payload: Map<String, Value>,
}

impl JsonWebToken {
    pub fn new(payload: Map<String, Value>) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Serialize and sign with `key`.
    pub fn encode(&self, key: &[u8]) -> String {
        let header = serde_json::json!({"alg": "HS256", "typ": "JWT"}).to_string();
        let payload = Value::Object(self.payload.clone()).to_string();

        let mut jwt = STANDARD.encode(header);
        jwt.push('.');
        jwt.push_str(&STANDARD.encode(payload));

        let signature = sign(jwt.as_bytes(), key);
        jwt.push('.');
        jwt.push_str(&signature);
        jwt
    }

    /// Verify `jwt` against `key` and return its payload.
    ///
    /// The supplied signature is never trusted: it is recomputed over the
    /// first two segments and compared in constant time. Returns `None` on
    /// structural errors, signature mismatch, or a non-object payload.
    pub fn decode(jwt: &str, key: &[u8]) -> Option<Self> {
        let parts: Vec<&str> = jwt.split('.').collect();
        if parts.len() != 3 {
            return None;
        }

        let message = format!("{}.{}", parts[0], parts[1]);
        let expected = sign(message.as_bytes(), key);
        if !bool::from(expected.as_bytes().ct_eq(parts[2].as_bytes())) {
            return None;
        }

        let payload = STANDARD.decode(parts[1]).ok()?;
        match serde_json::from_slice(&payload).ok()? {
            Value::Object(map) => Some(Self::new(map)),
            _ => None,
        }
    }
}

fn sign(message: &[u8], key: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message);
    to_hex(&mac.finalize().into_bytes())
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("iat".into(), 1_400_000_000i64.into());
        map.insert("exp".into(), 1_400_086_400i64.into());
        map.insert("jti".into(), "some-identifier".into());
        map
    }

    #[test]
    fn round_trip() {
        let token = JsonWebToken::new(payload());
        let jwt = token.encode(b"secret");
        assert_eq!(JsonWebToken::decode(&jwt, b"secret"), Some(token));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let jwt = JsonWebToken::new(payload()).encode(b"secret");
        assert_eq!(JsonWebToken::decode(&jwt, b"other"), None);
    }

    #[test]
    fn corrupted_signature_byte_is_rejected() {
        let jwt = JsonWebToken::new(payload()).encode(b"secret");
        let (message, signature) = jwt.rsplit_once('.').unwrap();
        for i in 0..signature.len() {
            let mut corrupt = signature.to_string();
            let original = corrupt.remove(i);
            let replacement = if original == '0' { '1' } else { '0' };
            corrupt.insert(i, replacement);
            let forged = format!("{message}.{corrupt}");
            assert_eq!(JsonWebToken::decode(&forged, b"secret"), None);
        }
    }

    #[test]
    fn wrong_segment_count_is_rejected() {
        assert_eq!(JsonWebToken::decode("", b"secret"), None);
        assert_eq!(JsonWebToken::decode("a.b", b"secret"), None);
        assert_eq!(JsonWebToken::decode("a.b.c.d", b"secret"), None);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        // Hand-build a correctly signed token over a JSON array payload.
        let header = STANDARD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let body = STANDARD.encode("[1,2,3]");
        let message = format!("{header}.{body}");
        let jwt = format!("{message}.{}", sign(message.as_bytes(), b"secret"));
        assert_eq!(JsonWebToken::decode(&jwt, b"secret"), None);
    }

    #[test]
    fn empty_payload_round_trips() {
        let token = JsonWebToken::default();
        let jwt = token.encode(b"secret");
        assert_eq!(JsonWebToken::decode(&jwt, b"secret"), Some(token));
    }
}
