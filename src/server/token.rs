//! Signed stream tokens.
//!
//! A token carries the full set of stream parameters so the server keeps no
//! session state. It is the base64url JSON payload followed by an
//! HMAC-SHA256 signature over that encoded payload:
//!
//! ```text
//! token = base64url({"torrent":"…","file":"…","iat":1735689600}) "." hex(HMAC-SHA256(secret, payload))
//! ```
//!
//! # Security Properties
//!
//! - **Tamper-evident**: any change to the payload invalidates the signature
//! - **Time-limited**: tokens older than the configured max age are rejected
//! - **Constant-time comparison**: signature verification uses `subtle`
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use stream_gateway::server::token::StreamTokenCodec;
//! use stream_gateway::server::StreamParams;
//!
//! let codec = StreamTokenCodec::new("my-secret-key", Duration::from_secs(3600));
//! let params = StreamParams::new("my-item").with_file("my-item/video.mp4");
//!
//! let token = codec.encode(&params).unwrap();
//! let decoded: StreamParams = codec.decode(&token).unwrap();
//! assert_eq!(decoded, params);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::TokenError;

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Separator between payload and signature.
const SEPARATOR: char = '.';

// =============================================================================
// Clock
// =============================================================================

/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

// =============================================================================
// Codec
// =============================================================================

#[derive(Serialize)]
struct ClaimsRef<'a, T> {
    #[serde(flatten)]
    bundle: &'a T,
    iat: u64,
}

#[derive(Deserialize)]
struct Claims<T> {
    #[serde(flatten)]
    bundle: T,
    iat: u64,
}

/// Encoder and verifier for signed stream tokens.
#[derive(Clone)]
pub struct StreamTokenCodec {
    /// Secret key for HMAC computation
    secret_key: Vec<u8>,

    /// Maximum token age accepted by `decode`
    max_age: Duration,

    clock: Arc<dyn Clock>,
}

impl fmt::Debug for StreamTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTokenCodec")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl StreamTokenCodec {
    /// Create a codec using the system clock.
    ///
    /// # Arguments
    ///
    /// * `secret_key` - The secret key used for HMAC computation. Should be
    ///   at least 32 bytes for security.
    /// * `max_age` - How long after issue a token stays valid
    pub fn new(secret_key: impl AsRef<[u8]>, max_age: Duration) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            max_age,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock (used by tests to pin issue and check times).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Encode a bundle, stamped with the current time.
    pub fn encode<T: Serialize>(&self, bundle: &T) -> Result<String, TokenError> {
        self.encode_at(bundle, self.clock.now_secs())
    }

    /// Encode a bundle with an explicit issue time.
    ///
    /// Identical inputs always produce the identical token.
    pub fn encode_at<T: Serialize>(&self, bundle: &T, issued_at: u64) -> Result<String, TokenError> {
        let claims = ClaimsRef {
            bundle,
            iat: issued_at,
        };
        let json = serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.compute_signature(&payload));

        Ok(format!("{}{}{}", payload, SEPARATOR, signature))
    }

    /// Verify a token and return the bundle it carries.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let (payload, signature) = token
            .split_once(SEPARATOR)
            .ok_or(TokenError::Malformed("missing signature"))?;

        let provided = hex::decode(signature).map_err(|_| TokenError::Malformed("signature is not hex"))?;
        let expected = self.compute_signature(payload);

        // Constant-time comparison
        if !bool::from(provided.ct_eq(&expected)) {
            return Err(TokenError::InvalidSignature);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed("payload is not base64url"))?;
        let claims: Claims<T> =
            serde_json::from_slice(&json).map_err(|_| TokenError::Malformed("payload is not valid JSON"))?;

        let current_time = self.clock.now_secs();
        if current_time.saturating_sub(claims.iat) > self.max_age.as_secs() {
            return Err(TokenError::Expired {
                issued_at: claims.iat,
                current_time,
            });
        }

        Ok(claims.bundle)
    }

    /// Compute the HMAC-SHA256 signature for an encoded payload.
    fn compute_signature(&self, payload: &str) -> Vec<u8> {
        // HMAC-SHA256 accepts keys of any length, so new_from_slice cannot fail
        let mut mac = match HmacSha256::new_from_slice(&self.secret_key) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC can take key of any size"),
        };
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

// =============================================================================
// Tests
// =============================================================================
