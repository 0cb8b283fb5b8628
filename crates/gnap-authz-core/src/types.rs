//! Strong type definitions for identifiers and token values.
//!
//! Both identifiers are random byte strings rendered as lowercase hex on the
//! wire. Newtypes keep a client reference from being passed where a token
//! value is expected.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Opaque, stable identifier for a session.
///
/// Handed to the client in the access-request response so later requests can
/// present the client by reference instead of by key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ClientId(pub [u8; 16]);

impl ClientId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        decode_fixed("client id", s).map(Self)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.to_hex())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for ClientId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

/// The value of a continuation or access token.
///
/// 32 bytes from the thread-local CSPRNG. `Display` and `Debug` only show an
/// 8-character prefix so token values never end up in logs whole.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TokenValue(pub [u8; 32]);

impl TokenValue {
    /// Generate a fresh random token value.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string. This is the full secret value.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        decode_fixed("token value", s).map(Self)
    }
}

impl fmt::Debug for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenValue({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..", &self.to_hex()[..8])
    }
}

impl From<TokenValue> for String {
    fn from(value: TokenValue) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for TokenValue {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

/// Decode a hex string into a fixed-size array.
pub(crate) fn decode_fixed<const N: usize>(what: &'static str, s: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(s)?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| CoreError::InvalidLength {
        what,
        expected: N,
        got,
    })
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
