//! Strong-name keys and public key tokens.
//!
//! A reference names its target either by the full public key or by the 8-byte token
//! derived from it. The token is the last 8 bytes of the key's hash, in reverse order.
//!
//! # Example
//! ```rust
//! use asmrelink::identity::{HashAlgorithm, StrongName, FRAMEWORK_PUBLIC_KEY_TOKEN};
//!
//! // The ECMA standard key, which the framework assemblies carry
//! let ecma = StrongName::PubKey(vec![0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0]);
//! assert_eq!(ecma.to_token(HashAlgorithm::Sha1)?, FRAMEWORK_PUBLIC_KEY_TOKEN);
//! # Ok::<(), asmrelink::Error>(())
//! ```

use std::fmt::Write as _;

use md5::{Digest, Md5};
use sha1::Sha1;

use crate::{Error, Result};

/// Hash algorithm an assembly declares for its manifest, §II.23.1.1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// No hash algorithm
    None,
    /// MD5
    Md5,
    /// SHA-1, the default for strong-named assemblies
    #[default]
    Sha1,
}

impl HashAlgorithm {
    /// Raw `AssemblyHashAlgorithm` value of MD5
    pub const MD5_ID: u32 = 0x8003;
    /// Raw `AssemblyHashAlgorithm` value of SHA-1
    pub const SHA1_ID: u32 = 0x8004;
}

impl TryFrom<u32> for HashAlgorithm {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            Self::MD5_ID => Ok(Self::Md5),
            Self::SHA1_ID => Ok(Self::Sha1),
            _ => Err(Error::UnsupportedHashAlgorithm(value)),
        }
    }
}

/// The strong-name identity of an assembly.
/// Can be either a public-key or a hashed token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StrongName {
    /// The full RSA public-key
    PubKey(Vec<u8>),
    /// The 8-byte public key token
    Token([u8; 8]),
}

impl StrongName {
    /// Create a `StrongName` from raw manifest data.
    ///
    /// # Arguments
    /// * `data`    - The key or token bytes
    /// * `is_pub`  - Whether `data` is a full public key
    ///
    /// # Errors
    /// Returns an error if a token is requested and `data` holds fewer than 8 bytes.
    pub fn from(data: &[u8], is_pub: bool) -> Result<Self> {
        if is_pub {
            return Ok(StrongName::PubKey(data.to_vec()));
        }

        let token: [u8; 8] = data
            .get(..8)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| malformed_error!("Public key token needs 8 bytes, got {}", data.len()))?;
        Ok(StrongName::Token(token))
    }

    /// Get the public key token, hashing the key with `algo` when needed.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedHashAlgorithm`] when a key must be hashed with
    /// [`HashAlgorithm::None`].
    pub fn to_token(&self, algo: HashAlgorithm) -> Result<[u8; 8]> {
        let digest: Vec<u8> = match self {
            StrongName::Token(token) => return Ok(*token),
            StrongName::PubKey(data) => match algo {
                HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
                HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
                HashAlgorithm::None => return Err(Error::UnsupportedHashAlgorithm(0)),
            },
        };

        let mut token = [0u8; 8];
        for (dst, src) in token.iter_mut().zip(digest.iter().rev()) {
            *dst = *src;
        }
        Ok(token)
    }

    /// Whether this identity carries the full public key rather than a token.
    #[must_use]
    pub fn is_public_key(&self) -> bool {
        matches!(self, StrongName::PubKey(_))
    }
}

/// Render a public key token the way display names print it, or `null` when empty.
#[must_use]
pub fn format_token(token: &[u8]) -> String {
    if token.is_empty() {
        return "null".to_string();
    }

    let mut result = String::with_capacity(token.len() * 2);
    for byte in token {
        let _ = write!(result, "{:02x}", byte);
    }
    result
}
