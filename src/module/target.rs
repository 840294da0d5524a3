//! Target architecture and runtime of a module.

use std::{fmt, str::FromStr};

use strum::{Display, EnumIter, EnumString};

use crate::{Error, Result};

/// Processor architecture a module's PE header targets.
///
/// # Architecture Types
///
/// - **I386**: 32-bit x86, also what "AnyCPU" images declare
/// - **AMD64**: 64-bit x86-64
/// - **IA64**: Intel Itanium
/// - **ARM**: 32-bit ARM
/// - **ARM64**: 64-bit ARM
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TargetArchitecture {
    /// 32-bit x86. Managed-only images built for "AnyCPU" use this machine type too.
    #[default]
    I386,
    /// 64-bit x86-64 (Intel/AMD).
    ///
    /// Both "AMD64" and "x64" are accepted when parsing; the display name is "AMD64".
    AMD64,
    /// Intel Itanium.
    IA64,
    /// 32-bit ARM.
    ARM,
    /// 64-bit ARM.
    ARM64,
}

impl TargetArchitecture {
    /// Parse an architecture from its conventional name.
    ///
    /// # Errors
    /// Returns an error if the architecture string is not recognized.
    pub fn parse(arch_str: &str) -> Result<Self> {
        match arch_str.trim().to_lowercase().as_str() {
            "i386" | "x86" => Ok(Self::I386),
            "amd64" | "x64" => Ok(Self::AMD64),
            "ia64" => Ok(Self::IA64),
            "arm" | "armv7" => Ok(Self::ARM),
            "arm64" => Ok(Self::ARM64),
            _ => Err(malformed_error!(
                "Unknown target architecture: '{}'",
                arch_str.trim()
            )),
        }
    }

    /// The PE/COFF machine type (`IMAGE_FILE_MACHINE_*`) of this architecture.
    #[must_use]
    pub fn machine(&self) -> u16 {
        match self {
            Self::I386 => 0x014C,
            Self::AMD64 => 0x8664,
            Self::IA64 => 0x0200,
            Self::ARM => 0x01C4,
            Self::ARM64 => 0xAA64,
        }
    }
}

impl fmt::Display for TargetArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arch_str = match self {
            Self::I386 => "I386",
            Self::AMD64 => "AMD64",
            Self::IA64 => "IA64",
            Self::ARM => "ARM",
            Self::ARM64 => "ARM64",
        };
        write!(f, "{}", arch_str)
    }
}

impl FromStr for TargetArchitecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<u16> for TargetArchitecture {
    type Error = Error;

    /// Convert a PE/COFF machine type to a `TargetArchitecture`.
    ///
    /// Both ARM Thumb-2 (`0x01C4`) and plain ARM (`0x01C0`) map to [`TargetArchitecture::ARM`].
    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x014C => Ok(Self::I386),
            0x8664 => Ok(Self::AMD64),
            0x0200 => Ok(Self::IA64),
            0x01C0 | 0x01C4 => Ok(Self::ARM),
            0xAA64 => Ok(Self::ARM64),
            _ => Err(malformed_error!("Unknown machine type: 0x{:04X}", value)),
        }
    }
}

/// Runtime version a module declares in its metadata root.
///
/// Variants are ordered oldest first, so `<` answers "is older than".
///
/// ```rust
/// use asmrelink::module::TargetRuntime;
///
/// let runtime: TargetRuntime = "v2.0.50727".parse().unwrap();
/// assert!(runtime < TargetRuntime::Net4_0);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
pub enum TargetRuntime {
    /// .NET Framework 1.0
    #[strum(to_string = "v1.0.3705", serialize = "1.0")]
    Net1_0,
    /// .NET Framework 1.1
    #[strum(to_string = "v1.1.4322", serialize = "1.1")]
    Net1_1,
    /// .NET Framework 2.0 through 3.5
    #[strum(to_string = "v2.0.50727", serialize = "2.0")]
    Net2_0,
    /// .NET Framework 4.x
    #[default]
    #[strum(to_string = "v4.0.30319", serialize = "4.0")]
    Net4_0,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_architecture_parse() {
        assert_eq!(TargetArchitecture::parse("x86").unwrap(), TargetArchitecture::I386);
        assert_eq!(TargetArchitecture::parse("x64").unwrap(), TargetArchitecture::AMD64);
        assert_eq!(TargetArchitecture::parse(" ARM64 ").unwrap(), TargetArchitecture::ARM64);
        assert!(TargetArchitecture::parse("sparc").is_err());
    }

    #[test]
    fn test_architecture_machine_roundtrip() {
        for arch in [
            TargetArchitecture::I386,
            TargetArchitecture::AMD64,
            TargetArchitecture::IA64,
            TargetArchitecture::ARM,
            TargetArchitecture::ARM64,
        ] {
            assert_eq!(TargetArchitecture::try_from(arch.machine()).unwrap(), arch);
        }
        assert!(TargetArchitecture::try_from(0xFFFF).is_err());
    }

    #[test]
    fn test_runtime_ordering_and_parsing() {
        let all: Vec<TargetRuntime> = TargetRuntime::iter().collect();
        assert!(all.windows(2).all(|pair| pair[0] < pair[1]));

        assert_eq!("4.0".parse::<TargetRuntime>().unwrap(), TargetRuntime::Net4_0);
        assert_eq!(TargetRuntime::Net1_1.to_string(), "v1.1.4322");
        assert!("5.0".parse::<TargetRuntime>().is_err());
    }
}
