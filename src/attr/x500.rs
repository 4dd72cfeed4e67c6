use std::fmt;

use crate::{Error, Result};

/// Distinguished name kept as ordered `(key, value)` components, most
/// significant first (the slash notation order).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct X500Name {
    rdns: Vec<(String, String)>,
}

impl X500Name {
    /// Accepts both `/O=Grid/OU=Org/CN=Name` and `CN=Name,OU=Org,O=Grid`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let components: Vec<&str> = if raw.starts_with('/') {
            raw.split('/').filter(|part| !part.is_empty()).collect()
        } else {
            let mut parts = split_unescaped(raw, ',');
            parts.reverse();
            parts
        };

        let mut rdns = Vec::with_capacity(components.len());
        for component in components {
            let (key, value) = component
                .split_once('=')
                .ok_or_else(|| Error::invalid_value("x500Name", raw))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::invalid_value("x500Name", raw));
            }
            rdns.push((key.to_ascii_uppercase(), value.trim().replace("\\,", ",")));
        }

        if rdns.is_empty() {
            return Err(Error::invalid_value("x500Name", raw));
        }
        Ok(Self { rdns })
    }

    pub fn components(&self) -> &[(String, String)] {
        &self.rdns
    }

    /// Equality that ignores the order of the relative distinguished names.
    pub fn eq_unordered(&self, other: &X500Name) -> bool {
        if self.rdns.len() != other.rdns.len() {
            return false;
        }
        let mut left = self.rdns.clone();
        let mut right = other.rdns.clone();
        left.sort();
        right.sort();
        left == right
    }

    /// `self` is a hierarchical prefix of `other`, i.e. `other` lives
    /// below `self` in the naming tree.
    pub fn is_prefix_of(&self, other: &X500Name) -> bool {
        self.rdns.len() <= other.rdns.len() && other.rdns.starts_with(&self.rdns)
    }
}

impl fmt::Display for X500Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.rdns {
            write!(f, "/{}={}", key, value)?;
        }
        Ok(())
    }
}

fn split_unescaped(raw: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut previous = None;
    for (index, c) in raw.char_indices() {
        if c == separator && previous != Some('\\') {
            parts.push(&raw[start..index]);
            start = index + c.len_utf8();
        }
        previous = Some(c);
    }
    parts.push(&raw[start..]);
    parts.into_iter().filter(|part| !part.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_and_comma_notations_are_equal() {
        let slash = X500Name::parse("/O=Grid/OU=KnowARC/CN=John Doe").unwrap();
        let comma = X500Name::parse("CN=John Doe, OU=KnowARC, O=Grid").unwrap();

        assert_eq!(slash, comma);
        assert_eq!("/O=Grid/OU=KnowARC/CN=John Doe", comma.to_string());
    }

    #[test]
    fn keys_are_case_insensitive() {
        assert_eq!(
            X500Name::parse("/o=Grid/cn=X").unwrap(),
            X500Name::parse("/O=Grid/CN=X").unwrap()
        );
    }

    #[test]
    fn escaped_commas_stay_in_values() {
        let name = X500Name::parse(r"CN=Doe\, John,O=Grid").unwrap();
        assert_eq!(("CN".to_string(), "Doe, John".to_string()), name.components()[1]);
    }

    #[test]
    fn unordered_equality_and_prefix() {
        let a = X500Name::parse("/O=Grid/CN=X").unwrap();
        let b = X500Name::parse("/CN=X/O=Grid").unwrap();
        let parent = X500Name::parse("/O=Grid").unwrap();

        assert_ne!(a, b);
        assert!(a.eq_unordered(&b));
        assert!(parent.is_prefix_of(&a));
        assert!(!a.is_prefix_of(&parent));
    }

    #[test]
    fn rejects_garbage() {
        assert!(X500Name::parse("not a dn").is_err());
        assert!(X500Name::parse("/").is_err());
    }
}
