//! Request signing for the Marketo SOAP authentication header.
//!
//! Marketo authenticates each call with a `requestTimestamp` and a
//! `requestSignature` (HMAC-SHA1 over timestamp + user id, hex encoded).
//! Stale timestamps are rejected by the service (error 20016), so a
//! signature must be computed fresh for every call and never cached.

use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Marketo SOAP API credentials.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub user_id: String,
    encryption_key: String,
}

/// One freshly computed authentication header value pair.
///
/// Valid only for the single call it was computed for.
#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub timestamp: String,
    pub signature: String,
}

/// Complete `AuthenticationHeader` contents for one call.
#[derive(Clone, Debug)]
pub struct AuthHeader {
    pub user_id: String,
    pub timestamp: String,
    pub signature: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, encryption_key: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            encryption_key: encryption_key.into(),
        }
    }

    /// Build the full authentication header with a fresh signature.
    pub fn auth_header(&self) -> AuthHeader {
        let Signature {
            timestamp,
            signature,
        } = self.signature();
        AuthHeader {
            user_id: self.user_id.clone(),
            timestamp,
            signature,
        }
    }

    /// Compute a fresh signature at the current wall-clock instant.
    ///
    /// Do not memoize the result across calls.
    pub fn signature(&self) -> Signature {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.signature_at(&timestamp)
    }

    /// Compute the signature for a given timestamp string.
    ///
    /// The signed message is `timestamp + user_id`, keyed by the encryption
    /// key, digested with HMAC-SHA1 and hex encoded.
    pub fn signature_at(&self, timestamp: &str) -> Signature {
        // new_from_slice accepts keys of any length for HMAC
        let mut mac = HmacSha1::new_from_slice(self.encryption_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(timestamp.as_bytes());
        mac.update(self.user_id.as_bytes());
        let digest = mac.finalize().into_bytes();

        let signature = digest
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<String>();

        Signature {
            timestamp: timestamp.to_string(),
            signature,
        }
    }
}

impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the encryption key
        write!(f, "user_id={}", self.user_id)
    }
}
