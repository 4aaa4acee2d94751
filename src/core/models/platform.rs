use serde::{Deserialize, Serialize};

use crate::core::errors::{LayerlockError, Result};

/// Operating systems a platform specifier may name on its own.
const KNOWN_OS: &[&str] = &["linux", "windows", "darwin", "freebsd", "solaris", "aix"];

/// Target platform of an image manifest or layer, as recorded in an
/// OCI image index (`os`, `architecture`, optional `variant`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    /// Parse a user-supplied specifier: `os`, `arch`, `os/arch` or
    /// `os/arch/variant`. A single token is taken as an OS when it names
    /// a known one, otherwise as an architecture running on linux.
    ///
    /// Architecture aliases are normalized so that `linux/x86_64` and
    /// `linux/amd64` select the same layers.
    pub fn parse(specifier: &str) -> Result<Self> {
        let parse_err = |detail: &str| LayerlockError::PlatformParse {
            specifier: specifier.to_string(),
            detail: detail.to_string(),
        };

        let parts: Vec<&str> = specifier.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(parse_err("empty component"));
        }

        let platform = match parts.as_slice() {
            [single] => {
                let token = single.to_lowercase();
                if KNOWN_OS.contains(&token.as_str()) {
                    Self {
                        os: token,
                        architecture: "amd64".to_string(),
                        variant: None,
                    }
                } else {
                    let (arch, variant) = normalize_arch(&token);
                    Self {
                        os: "linux".to_string(),
                        architecture: arch,
                        variant,
                    }
                }
            }
            [os, arch] => {
                let (architecture, variant) = normalize_arch(&arch.to_lowercase());
                Self {
                    os: os.to_lowercase(),
                    architecture,
                    variant,
                }
            }
            [os, arch, variant] => {
                let (architecture, _) = normalize_arch(&arch.to_lowercase());
                Self {
                    os: os.to_lowercase(),
                    architecture,
                    variant: Some(variant.to_lowercase()),
                }
                .normalized()
            }
            _ => return Err(parse_err("expected os/arch[/variant]")),
        };

        Ok(platform)
    }

    /// Canonical form used for comparisons: arm64 treats a `v8` variant
    /// and no variant as the same platform.
    pub fn normalized(&self) -> Self {
        let mut p = self.clone();
        if p.architecture == "arm64" && p.variant.as_deref() == Some("v8") {
            p.variant = None;
        }
        p
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{}/{}", self.os, self.architecture, variant),
            None => write!(f, "{}/{}", self.os, self.architecture),
        }
    }
}

/// Map architecture aliases to their canonical name; arm aliases carry
/// an implied variant.
fn normalize_arch(arch: &str) -> (String, Option<String>) {
    match arch {
        "x86_64" | "x86-64" | "x64" | "amd64" => ("amd64".to_string(), None),
        "aarch64" | "arm64" => ("arm64".to_string(), None),
        "armhf" => ("arm".to_string(), Some("v7".to_string())),
        "armel" => ("arm".to_string(), Some("v6".to_string())),
        "i386" | "386" => ("386".to_string(), None),
        other => (other.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_os_arch() {
        let p = Platform::parse("linux/amd64").unwrap();
        assert_eq!(p.os, "linux");
        assert_eq!(p.architecture, "amd64");
        assert_eq!(p.variant, None);
    }

    #[test]
    fn parse_normalizes_arch_aliases() {
        assert_eq!(
            Platform::parse("linux/x86_64").unwrap(),
            Platform::parse("linux/amd64").unwrap()
        );
        assert_eq!(
            Platform::parse("linux/aarch64").unwrap(),
            Platform::parse("linux/arm64").unwrap()
        );
    }

    #[test]
    fn parse_single_token_os() {
        let p = Platform::parse("windows").unwrap();
        assert_eq!(p.os, "windows");
        assert_eq!(p.architecture, "amd64");
    }

    #[test]
    fn parse_single_token_arch() {
        let p = Platform::parse("arm64").unwrap();
        assert_eq!(p.os, "linux");
        assert_eq!(p.architecture, "arm64");
    }

    #[test]
    fn parse_with_variant() {
        let p = Platform::parse("linux/arm/v7").unwrap();
        assert_eq!(p.variant.as_deref(), Some("v7"));
    }

    #[test]
    fn parse_rejects_empty_component() {
        assert!(Platform::parse("linux//v7").is_err());
        assert!(Platform::parse("").is_err());
    }

    #[test]
    fn parse_rejects_too_many_components() {
        assert!(Platform::parse("linux/arm/v7/extra").is_err());
    }

    #[test]
    fn arm64_v8_normalizes_to_no_variant() {
        let p = Platform::parse("linux/arm64/v8").unwrap();
        assert_eq!(p.variant, None);
    }

    #[test]
    fn display_round_trip() {
        let p = Platform::parse("linux/arm/v7").unwrap();
        assert_eq!(p.to_string(), "linux/arm/v7");
    }
}
