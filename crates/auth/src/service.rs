use std::{
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    rand::Rng,
    serde_json::{Map, Value},
    subtle::ConstantTimeEq,
    tracing::debug,
    uuid::Uuid,
};

use crate::jwt::JsonWebToken;

/// The access code is always exactly this many zero-padded decimal digits.
pub const PASSWORD_LENGTH: usize = 8;

const PASSWORD_MAX: u32 = 99_999_999;
const PASSWORD_ATTEMPTS_MAX: u8 = 3;
const VALIDITY_DURATION_SECS: i64 = 86_400;

/// Invoked with the new access code whenever it actually changes.
pub type PasswordChangedSink = Box<dyn Fn(&str) + Send + Sync>;

/// Password and attempt counter are only ever mutated together.
struct Rotation {
    password: String,
    attempts: u8,
}

/// Rotating-password guard and token mint.
///
/// Holds the current 8-digit access code and a failed-attempt counter.
/// A successful `authenticate` consumes the code (it is regenerated) and
/// mints a signed token valid for 24 hours. Exhausting the attempt counter
/// also rotates the code.
pub struct AuthService {
    rotation: Mutex<Rotation>,
    key: Vec<u8>,
    password_changed: Option<PasswordChangedSink>,
}

impl AuthService {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            rotation: Mutex::new(Rotation {
                password: generate_password(),
                attempts: PASSWORD_ATTEMPTS_MAX,
            }),
            key: key.into(),
            password_changed: None,
        }
    }

    /// Install a sink notified whenever the access code changes.
    ///
    /// The code generated at construction does not fire the sink.
    pub fn with_password_changed(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.password_changed = Some(Box::new(sink));
        self
    }

    /// Current access code, for out-of-band display by the host.
    pub fn password(&self) -> String {
        let rotation = self.rotation.lock().unwrap_or_else(|e| e.into_inner());
        rotation.password.clone()
    }

    /// Compare `candidate` against the current code and mint a token.
    ///
    /// On mismatch the attempt counter is decremented; when it reaches zero
    /// the code is rotated and the counter reset. On match the code is
    /// rotated immediately so it cannot be replayed.
    pub fn authenticate(&self, candidate: &str) -> Option<JsonWebToken> {
        let mut rotation = self.rotation.lock().unwrap_or_else(|e| e.into_inner());

        if !bool::from(candidate.as_bytes().ct_eq(rotation.password.as_bytes())) {
            rotation.attempts = rotation.attempts.saturating_sub(1);
            debug!(remaining = rotation.attempts, "authentication failed");
            if rotation.attempts == 0 {
                self.rotate(&mut rotation);
            }
            return None;
        }

        // One-shot code: a successful exchange invalidates it.
        self.rotate(&mut rotation);
        drop(rotation);

        let iat = unix_now();
        let mut payload = Map::new();
        payload.insert("iat".into(), iat.into());
        payload.insert("exp".into(), (iat + VALIDITY_DURATION_SECS).into());
        // TODO: check jti against a revocation set once one-time tokens land.
        payload.insert("jti".into(), Uuid::new_v4().to_string().into());
        Some(JsonWebToken::new(payload))
    }

    /// Serialize and sign `token` with the server key.
    pub fn sign(&self, token: &JsonWebToken) -> String {
        token.encode(&self.key)
    }

    /// True iff `jwt` carries a valid signature and has not expired.
    ///
    /// Signature mismatch, structural errors, and expiry all collapse into
    /// `false`; callers cannot distinguish them.
    pub fn is_authorized(&self, jwt: &str) -> bool {
        let Some(token) = JsonWebToken::decode(jwt, &self.key) else {
            return false;
        };
        let Some(exp) = token.payload().get("exp").and_then(Value::as_i64) else {
            return false;
        };
        unix_now() < exp
    }

    fn rotate(&self, rotation: &mut Rotation) {
        let password = generate_password();
        if password != rotation.password {
            rotation.password = password.clone();
            if let Some(sink) = &self.password_changed {
                sink(&password);
            }
        }
        rotation.attempts = PASSWORD_ATTEMPTS_MAX;
    }
}

fn generate_password() -> String {
    let code = rand::rng().random_range(0..=PASSWORD_MAX);
    format!("{code:0width$}", width = PASSWORD_LENGTH)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
