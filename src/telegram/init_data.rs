//! Telegram Mini App init data: the opaque credential and its decoded form.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::core::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// The raw init-data blob, used as a bearer credential.
///
/// Held in memory only. `Debug` never prints the value and clones share
/// one allocation.
#[derive(Clone)]
pub struct Credential(Arc<SecretString>);

impl Credential {
    /// Wraps a raw blob, rejecting empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Result<Self, AuthError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(AuthError::EmptyInitData);
        }
        Ok(Self(Arc::new(SecretString::from(raw))))
    }

    /// The raw blob, for building the `Authorization` header and socket URL.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// `Authorization` header value: `twa <credential>`
    pub fn authorization(&self) -> String {
        format!("{} {}", crate::core::config::network::AUTH_SCHEME, self.expose())
    }

    /// The credential URL-encoded for the socket query string.
    pub fn url_encoded(&self) -> String {
        urlencoding::encode(self.expose()).into_owned()
    }

    /// Decodes the blob's fields for diagnostics.
    pub fn decode(&self) -> InitData {
        InitData::parse(self.expose())
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Decoded key/value view of an init-data query string.
#[derive(Debug, Clone, Default)]
pub struct InitData {
    params: HashMap<String, String>,
}

impl InitData {
    /// Parses `key=value&...`, URL-decoding values. Malformed pairs are skipped.
    pub fn parse(init_data: &str) -> Self {
        let params = init_data
            .split('&')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                let decoded = urlencoding::decode(value).ok()?;
                Some((key.to_string(), decoded.into_owned()))
            })
            .collect();
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn hash(&self) -> Option<&str> {
        self.get("hash")
    }

    /// Unix timestamp the blob was signed at.
    pub fn auth_date(&self) -> Option<i64> {
        self.get("auth_date")?.parse().ok()
    }

    /// Telegram user id from the embedded `user` JSON.
    pub fn user_id(&self) -> Option<i64> {
        let user: serde_json::Value = serde_json::from_str(self.get("user")?).ok()?;
        user.get("id")?.as_i64()
    }

    /// Everything except `hash`, sorted and joined by newlines.
    fn data_check_string(&self) -> String {
        let mut pairs: Vec<String> = self
            .params
            .iter()
            .filter(|(key, _)| key.as_str() != "hash")
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        pairs.sort();
        pairs.join("\n")
    }

    /// Checks the signature the same way the backend does.
    ///
    /// secret = HMAC_SHA256(key = "WebAppData", bot_token),
    /// hash = hex(HMAC_SHA256(key = secret, data_check_string)).
    /// When `max_age` is set, `auth_date` must be present and recent enough.
    pub fn verify(&self, bot_token: &str, max_age: Option<Duration>) -> Result<(), AuthError> {
        let received = self
            .hash()
            .ok_or_else(|| AuthError::InvalidInitData("missing hash parameter".to_string()))?;
        let received = hex::decode(received)
            .map_err(|_| AuthError::InvalidInitData("hash is not hex".to_string()))?;

        let mut secret_mac = HmacSha256::new_from_slice(b"WebAppData")
            .map_err(|e| AuthError::InvalidInitData(e.to_string()))?;
        secret_mac.update(bot_token.as_bytes());
        let secret = secret_mac.finalize().into_bytes();

        let mut mac = HmacSha256::new_from_slice(&secret).map_err(|e| AuthError::InvalidInitData(e.to_string()))?;
        mac.update(self.data_check_string().as_bytes());
        mac.verify_slice(&received)
            .map_err(|_| AuthError::InvalidInitData("signature mismatch".to_string()))?;

        if let Some(max_age) = max_age {
            let auth_date = self
                .auth_date()
                .ok_or_else(|| AuthError::InvalidInitData("missing auth_date".to_string()))?;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default();
            let age = now - auth_date;
            if age > max_age.as_secs() as i64 {
                return Err(AuthError::InvalidInitData(format!("init data is too old ({} seconds)", age)));
            }
        }

        Ok(())
    }
}
