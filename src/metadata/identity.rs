//! Assembly identities as used for reference resolution.
//!
//! An [`AssemblyIdentity`] is the name/version/culture/public-key-token tuple that
//! assembly references and assembly definitions carry. The resolver matches requested
//! identities against the identities of the assemblies a compilation references.
//!
//! # Example
//! ```rust
//! use dotsource::metadata::identity::{AssemblyIdentity, AssemblyVersion};
//!
//! let identity = AssemblyIdentity::parse(
//!     "System.Runtime, Version=8.0.0.0, Culture=neutral, PublicKeyToken=b03f5f7f11d50a3a",
//! )?;
//! assert_eq!(identity.name, "System.Runtime");
//! assert_eq!(identity.version, AssemblyVersion::new(8, 0, 0, 0));
//! assert!(identity.public_key_token.is_some());
//! # Ok::<(), dotsource::Error>(())
//! ```

use std::fmt::{self, Write};

use crate::Result;

/// Four-part version number of an assembly.
///
/// Versions order component-wise (major, minor, build, revision), which is what the
/// resolver relies on when it picks the highest candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssemblyVersion {
    /// Major version component.
    pub major: u16,
    /// Minor version component.
    pub minor: u16,
    /// Build version component.
    pub build: u16,
    /// Revision version component.
    pub revision: u16,
}

impl AssemblyVersion {
    /// Creates a version from its four components.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parses a dotted version string with one to four components.
    ///
    /// Missing trailing components are zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the string has more than four components or
    /// a component is not a valid `u16`.
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// The 8-byte public key token of a strong-named assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyToken(pub [u8; 8]);

impl PublicKeyToken {
    /// Parses a token from its 16-character hex form.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the text is not exactly 16 hex digits.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.len() != 16 || !text.is_ascii() {
            return Err(malformed_error!(
                "PublicKeyToken must be exactly 16 hex characters, got '{}'",
                text
            ));
        }

        let mut bytes = [0u8; 8];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let pair = &text[index * 2..index * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| malformed_error!("Invalid hex in PublicKeyToken '{}'", text))?;
        }
        Ok(PublicKeyToken(bytes))
    }
}

impl fmt::Display for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Name, version, culture and public key token of an assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyIdentity {
    /// Simple assembly name (e.g. `System.Runtime`).
    pub name: String,
    /// Four-part version.
    pub version: AssemblyVersion,
    /// Culture of a satellite assembly; `None` is culture-neutral.
    pub culture: Option<String>,
    /// Public key token; `None` for assemblies that are not strong-named.
    pub public_key_token: Option<PublicKeyToken>,
}

impl AssemblyIdentity {
    /// Creates a culture-neutral identity without a public key token.
    #[must_use]
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        AssemblyIdentity {
            name: name.into(),
            version,
            culture: None,
            public_key_token: None,
        }
    }

    /// Returns the identity with the given public key token.
    #[must_use]
    pub fn with_public_key_token(mut self, token: PublicKeyToken) -> Self {
        self.public_key_token = Some(token);
        self
    }

    /// Returns the identity with the given culture.
    #[must_use]
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    /// Parses an assembly display name.
    ///
    /// ```text
    /// Name[, Version=Major.Minor.Build.Revision][, Culture=culture][, PublicKeyToken=token]
    /// ```
    ///
    /// Unknown components are ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty name or an invalid component.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut parts = display_name.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(malformed_error!("Assembly name cannot be empty"));
        }

        let mut identity = AssemblyIdentity::new(name, AssemblyVersion::default());
        for part in parts {
            if let Some(value) = part.strip_prefix("Version=") {
                identity.version = AssemblyVersion::parse(value)?;
            } else if let Some(value) = part.strip_prefix("Culture=") {
                if value != "neutral" && !value.is_empty() {
                    identity.culture = Some(value.to_string());
                }
            } else if let Some(value) = part.strip_prefix("PublicKeyToken=") {
                if value != "null" && !value.is_empty() {
                    identity.public_key_token = Some(PublicKeyToken::parse(value)?);
                }
            }
        }

        Ok(identity)
    }

    /// Formats the identity as a display name.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);
        result.push_str(&self.name);
        let _ = write!(result, ", Version={}", self.version);
        let _ = write!(
            result,
            ", Culture={}",
            self.culture.as_deref().unwrap_or("neutral")
        );
        match &self.public_key_token {
            Some(token) => {
                let _ = write!(result, ", PublicKeyToken={token}");
            }
            None => result.push_str(", PublicKeyToken=null"),
        }
        result
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
