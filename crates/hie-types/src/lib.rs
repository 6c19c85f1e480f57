//! Shared identifier primitives for the outbound HIE workspace.
//!
//! Remote gateways are inconsistent about how they write identifiers: the same home community
//! id may arrive as `1.2.840.114350`, `urn:oid:1.2.840.114350` or wrapped in brackets, and status
//! or severity codes are frequently namespaced (`urn:oasis:names:tc:ebxml-regrep:...:Success`).
//! The helpers here normalise those shapes once so every other crate compares plain values.

/// Errors that can occur when constructing validated identifier types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// The input was empty or contained only whitespace (after prefix stripping).
    #[error("identifier cannot be empty")]
    Empty,

    /// The input contained characters outside the OID alphabet.
    #[error("invalid OID: {0}")]
    InvalidOid(String),
}

/// Result type for identifier operations.
pub type TypesResult<T> = Result<T, TypesError>;

const URN_PREFIXES: [&str; 2] = ["urn:oid:", "urn:uuid:"];

/// Strips a leading `urn:oid:` or `urn:uuid:` prefix (case-insensitive) and surrounding whitespace.
///
/// Values without a known prefix are returned trimmed but otherwise unchanged.
pub fn strip_urn_prefix(value: &str) -> &str {
    let trimmed = value.trim();
    for prefix in URN_PREFIXES {
        let head = trimmed.get(..prefix.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
            return trimmed[prefix.len()..].trim();
        }
    }
    trimmed
}

/// Strips one pair of enclosing angle or square brackets, e.g. `<1.2.3>` or `[1.2.3]`.
pub fn strip_brackets(value: &str) -> &str {
    let trimmed = value.trim();
    let stripped = trimmed
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .or_else(|| trimmed.strip_prefix('[').and_then(|v| v.strip_suffix(']')));
    stripped.unwrap_or(trimmed).trim()
}

/// Returns the text after the final `:` of a possibly namespaced code.
///
/// `urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Success` becomes `Success`; values without
/// a colon are returned unchanged.
pub fn local_code(value: &str) -> &str {
    let trimmed = value.trim();
    match trimmed.rfind(':') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// An ISO object identifier, stored without any `urn:oid:` prefix.
///
/// Used for home community ids and repository ids. Construction strips the prefix and checks the
/// value only contains digits and dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(String);

impl Oid {
    /// Parses an OID, accepting the `urn:oid:` form.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::Empty`] for blank input and [`TypesError::InvalidOid`] if anything
    /// other than ASCII digits and dots remains after stripping.
    pub fn parse(input: impl AsRef<str>) -> TypesResult<Self> {
        let value = strip_urn_prefix(input.as_ref());
        if value.is_empty() {
            return Err(TypesError::Empty);
        }
        let well_formed = value.bytes().all(|b| b.is_ascii_digit() || b == b'.')
            && !value.starts_with('.')
            && !value.ends_with('.')
            && !value.contains("..");
        if !well_formed {
            return Err(TypesError::InvalidOid(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the OID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Oid {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for Oid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Oid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Oid::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_urn_prefixes_case_insensitively() {
        assert_eq!(strip_urn_prefix("urn:oid:1.2.3"), "1.2.3");
        assert_eq!(strip_urn_prefix("URN:OID:1.2.3"), "1.2.3");
        assert_eq!(
            strip_urn_prefix(" urn:uuid:2e82c1f6-a085-4c72-9da3-8640a32e42ab "),
            "2e82c1f6-a085-4c72-9da3-8640a32e42ab"
        );
        assert_eq!(strip_urn_prefix("1.2.3"), "1.2.3");
    }

    #[test]
    fn strips_enclosing_brackets_only_when_balanced() {
        assert_eq!(strip_brackets("<1.2.3>"), "1.2.3");
        assert_eq!(strip_brackets("[1.2.3]"), "1.2.3");
        assert_eq!(strip_brackets("<1.2.3"), "<1.2.3");
        assert_eq!(strip_brackets("1.2.3"), "1.2.3");
    }

    #[test]
    fn local_code_keeps_text_after_final_colon() {
        assert_eq!(
            local_code("urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:PartialSuccess"),
            "PartialSuccess"
        );
        assert_eq!(local_code("Success"), "Success");
        assert_eq!(local_code("trailing:"), "");
    }

    #[test]
    fn oid_parse_strips_prefix() {
        let oid = Oid::parse("urn:oid:2.16.840.1.113883.3.9621").expect("valid oid");
        assert_eq!(oid.as_str(), "2.16.840.1.113883.3.9621");
        assert_eq!(oid.to_string(), "2.16.840.1.113883.3.9621");
    }

    #[test]
    fn oid_parse_rejects_blank_and_malformed_values() {
        assert!(matches!(Oid::parse("   "), Err(TypesError::Empty)));
        assert!(matches!(Oid::parse("urn:oid:"), Err(TypesError::Empty)));
        assert!(matches!(Oid::parse("1.2.x"), Err(TypesError::InvalidOid(_))));
        assert!(matches!(Oid::parse("1..2"), Err(TypesError::InvalidOid(_))));
        assert!(matches!(Oid::parse(".1.2"), Err(TypesError::InvalidOid(_))));
    }

    #[test]
    fn oid_serde_uses_plain_string() {
        let oid: Oid = serde_json::from_str("\"urn:oid:1.2.3\"").expect("deserialize oid");
        assert_eq!(oid.as_str(), "1.2.3");
        assert_eq!(serde_json::to_string(&oid).expect("serialize"), "\"1.2.3\"");

        let err = serde_json::from_str::<Oid>("\"not-an-oid\"").expect_err("should reject");
        assert!(err.to_string().contains("invalid OID"));
    }
}
