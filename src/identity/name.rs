//! The identity a module declares for itself.

use std::fmt;

use crate::{
    identity::{format_token, AssemblyVersion, HashAlgorithm, StrongName},
    module::ReferenceDescriptor,
};

/// Identity information declared by an assembly manifest.
///
/// This is what other modules bind against. When the relinker points a reference at a
/// mapping target, the new [`ReferenceDescriptor`] is derived from the target's
/// `AssemblyName` via [`AssemblyName::to_reference`].
///
/// # Examples
///
/// ```rust
/// use asmrelink::identity::{AssemblyName, AssemblyVersion};
///
/// let name = AssemblyName::new("FNA", AssemblyVersion::new(23, 3, 0, 0));
/// assert_eq!(name.display_name(), "FNA, Version=23.3.0.0, Culture=neutral, PublicKeyToken=null");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyName {
    /// Simple assembly name
    pub name: String,
    /// Four-part version
    pub version: AssemblyVersion,
    /// Culture, `None` for culture-neutral assemblies
    pub culture: Option<String>,
    /// Strong-name identity, `None` for unsigned assemblies
    pub strong_name: Option<StrongName>,
    /// Algorithm used to derive tokens from `strong_name`
    pub hash_algorithm: HashAlgorithm,
}

impl AssemblyName {
    /// Create a culture-neutral, unsigned assembly name.
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        Self {
            name: name.into(),
            version,
            culture: None,
            strong_name: None,
            hash_algorithm: HashAlgorithm::default(),
        }
    }

    /// Attach a strong-name identity.
    #[must_use]
    pub fn with_strong_name(mut self, strong_name: StrongName) -> Self {
        self.strong_name = Some(strong_name);
        self
    }

    /// The public key token of this assembly, empty if unsigned or the token cannot be derived.
    #[must_use]
    pub fn public_key_token(&self) -> Vec<u8> {
        self.strong_name
            .as_ref()
            .and_then(|sn| sn.to_token(self.hash_algorithm).ok())
            .map(|token| token.to_vec())
            .unwrap_or_default()
    }

    /// Drop the strong-name identity so references to this assembly carry no token.
    pub fn clear_strong_name(&mut self) {
        self.strong_name = None;
    }

    /// Build the reference descriptor another module uses to bind against this assembly.
    #[must_use]
    pub fn to_reference(&self) -> ReferenceDescriptor {
        let public_key_token = self.public_key_token();
        ReferenceDescriptor {
            name: self.name.clone(),
            version: self.version,
            culture: self.culture.clone(),
            has_public_key: false,
            public_key_token,
            is_windows_runtime: false,
        }
    }

    /// Format as `Name, Version=a.b.c.d, Culture=neutral, PublicKeyToken=...`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{}, Version={}, Culture={}, PublicKeyToken={}",
            self.name,
            self.version,
            self.culture.as_deref().unwrap_or("neutral"),
            format_token(&self.public_key_token())
        )
    }
}

impl fmt::Display for AssemblyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FRAMEWORK_PUBLIC_KEY_TOKEN;

    #[test]
    fn test_to_reference_derives_token_from_key() {
        let name = AssemblyName::new("mscorlib", AssemblyVersion::new(4, 0, 0, 0)).with_strong_name(
            StrongName::PubKey(vec![0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0]),
        );

        let reference = name.to_reference();
        assert_eq!(reference.name, "mscorlib");
        assert_eq!(reference.public_key_token, FRAMEWORK_PUBLIC_KEY_TOKEN.to_vec());
        assert!(!reference.has_public_key);
    }

    #[test]
    fn test_unsigned_reference_has_empty_token() {
        let name = AssemblyName::new("Game", AssemblyVersion::new(1, 0, 0, 0));
        assert!(name.to_reference().public_key_token.is_empty());
    }

    #[test]
    fn test_display_name_with_culture() {
        let mut name = AssemblyName::new("Game.resources", AssemblyVersion::new(1, 0, 0, 0));
        name.culture = Some("de-DE".to_string());
        name.strong_name = Some(StrongName::Token(FRAMEWORK_PUBLIC_KEY_TOKEN));

        assert_eq!(
            name.to_string(),
            "Game.resources, Version=1.0.0.0, Culture=de-DE, PublicKeyToken=b77a5c561934e089"
        );
    }
}
