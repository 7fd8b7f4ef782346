//! Item identity
//!
//! An item is referenced across processes only by its namespaced key
//! `namespace:name`. Equality is case-sensitive and byte-exact.

use std::fmt;
use std::str::FromStr;

use crate::{ArmoryError, ArmoryResult};

/// Separator between namespace and name
pub const NAMESPACE_SEPARATOR: char = ':';

/// Maximum encoded length of an identifier in bytes
pub const MAX_IDENTIFIER_LEN: usize = 256;

/// Stable cross-process item key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    raw: String,
    split: usize,
}

impl Identifier {
    /// Parse an identifier from its textual `namespace:name` form
    pub fn parse(input: &str) -> ArmoryResult<Self> {
        let fail = |reason: &str| ArmoryError::Parse {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(fail("identifier is empty"));
        }
        if input.len() > MAX_IDENTIFIER_LEN {
            return Err(fail("identifier exceeds 256 bytes"));
        }
        if input.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(fail("identifier contains whitespace or control characters"));
        }

        let split = input
            .find(NAMESPACE_SEPARATOR)
            .ok_or_else(|| fail("expected the form 'namespace:name'"))?;
        let (namespace, rest) = input.split_at(split);
        let name = &rest[NAMESPACE_SEPARATOR.len_utf8()..];

        if namespace.is_empty() {
            return Err(fail("namespace is empty"));
        }
        if name.is_empty() {
            return Err(fail("name is empty"));
        }
        if name.contains(NAMESPACE_SEPARATOR) {
            return Err(fail("more than one ':' separator"));
        }

        Ok(Identifier {
            raw: input.to_string(),
            split,
        })
    }

    /// Build an identifier from its two parts
    pub fn new(namespace: &str, name: &str) -> ArmoryResult<Self> {
        Self::parse(&format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, name))
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.raw[..self.split]
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.raw[self.split + NAMESPACE_SEPARATOR.len_utf8()..]
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Identifier {
    type Err = ArmoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item({})", self.raw)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identifier_parts() {
        let id = Identifier::parse("modx:greatsword").unwrap();
        assert_eq!(id.namespace(), "modx");
        assert_eq!(id.name(), "greatsword");
        assert_eq!(id.to_string(), "modx:greatsword");
    }

    #[test]
    fn test_identifier_rejects_malformed() {
        for bad in [
            "",
            "bad-format",
            ":sword",
            "modx:",
            "a:b:c",
            "modx:great sword",
            "modx:tab\tname",
        ] {
            assert!(
                matches!(Identifier::parse(bad), Err(ArmoryError::Parse { .. })),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_identifier_length_limit() {
        // "modx:" takes 5 bytes
        let name = "x".repeat(MAX_IDENTIFIER_LEN - 4);
        assert!(Identifier::new("modx", &name).is_err());
        let name = "x".repeat(MAX_IDENTIFIER_LEN - 5);
        assert!(Identifier::new("modx", &name).is_ok());
    }

    #[test]
    fn test_identifier_case_sensitive() {
        let lower = Identifier::parse("modx:sword").unwrap();
        let upper = Identifier::parse("modx:Sword").unwrap();
        assert_ne!(lower, upper);
    }

    proptest! {
        #[test]
        fn prop_new_matches_parse(ns in "[a-z0-9_.-]{1,16}", name in "[a-z0-9_./-]{1,32}") {
            let built = Identifier::new(&ns, &name).unwrap();
            let parsed: Identifier = format!("{ns}:{name}").parse().unwrap();
            prop_assert_eq!(&built, &parsed);
            prop_assert_eq!(built.namespace(), ns.as_str());
            prop_assert_eq!(built.name(), name.as_str());
        }
    }
}
