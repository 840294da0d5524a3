//! Assembly reference descriptors.

use std::fmt;

use crate::identity::{format_token, AssemblyVersion};

/// An entry of a module's assembly reference list.
///
/// Descriptors are rewritten in place while relinking; changing which assembly a
/// descriptor names never touches the referencing module's other fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescriptor {
    /// Simple name of the referenced assembly
    pub name: String,
    /// Version the reference binds against
    pub version: AssemblyVersion,
    /// Culture, `None` for culture-neutral
    pub culture: Option<String>,
    /// Public key token bytes; empty when the reference is not strong-named
    pub public_key_token: Vec<u8>,
    /// Whether the reference carries a full public key instead of a token
    pub has_public_key: bool,
    /// Whether the reference targets a Windows Runtime metadata file
    pub is_windows_runtime: bool,
}

impl ReferenceDescriptor {
    /// Create a culture-neutral, unsigned reference.
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        Self {
            name: name.into(),
            version,
            culture: None,
            public_key_token: Vec::new(),
            has_public_key: false,
            is_windows_runtime: false,
        }
    }

    /// Attach a public key token.
    #[must_use]
    pub fn with_token(mut self, token: &[u8]) -> Self {
        self.public_key_token = token.to_vec();
        self
    }

    /// Format as `Name, Version=a.b.c.d, Culture=neutral, PublicKeyToken=...`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!(
            "{}, Version={}, Culture={}, PublicKeyToken={}",
            self.name,
            self.version,
            self.culture.as_deref().unwrap_or("neutral"),
            format_token(&self.public_key_token)
        )
    }
}

impl fmt::Display for ReferenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}
