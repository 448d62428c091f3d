//! Identifiers for certificate authorities.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::commons::error::Error;


//------------ CaId ----------------------------------------------------------

/// The identifier of a certificate authority.
///
/// Identifiers are random UUIDs. They are also used to address the storage
/// of an authority, so parsing only accepts the canonical hyphenated shape
/// of 32 hex digits in groups of 8-4-4-4-12. Anything else, including the
/// other forms the `uuid` crate would happily accept, is rejected. The
/// `Display` impl always produces the lowercase canonical form and is thus
/// safe to use as a single path segment.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CaId(Uuid);

impl CaId {
    /// The length of the canonical form.
    const LEN: usize = 36;

    /// Creates a new random identifier.
    pub fn random() -> Self {
        CaId(Uuid::new_v4())
    }

    /// Checks that `bytes` has the canonical shape.
    const fn check_bytes(bytes: &[u8]) -> bool {
        if bytes.len() != Self::LEN {
            return false;
        }
        let mut i = 0;
        while i < Self::LEN {
            let ok = match i {
                8 | 13 | 18 | 23 => bytes[i] == b'-',
                _ => bytes[i].is_ascii_hexdigit(),
            };
            if !ok {
                return false;
            }
            i += 1;
        }
        true
    }
}

impl FromStr for CaId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !Self::check_bytes(s.as_bytes()) {
            return Err(Error::InvalidCaId(s.to_string()));
        }
        Uuid::parse_str(s)
            .map(CaId)
            .map_err(|_| Error::InvalidCaId(s.to_string()))
    }
}

impl fmt::Display for CaId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid(s: &str) -> bool {
        CaId::from_str(s).is_ok()
    }

    #[test]
    fn random_ids_are_canonical_and_distinct() {
        let one = CaId::random();
        let two = CaId::random();
        assert_ne!(one, two);

        let s = one.to_string();
        assert_eq!(s.len(), 36);
        assert_eq!(CaId::from_str(&s).unwrap(), one);
    }

    #[test]
    fn accepts_canonical_shape() {
        assert!(is_valid("0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9e"));
        assert!(is_valid("0D7A9C1E-5B9F-4A3C-8E4B-2F1D3C5A7B9E"));
    }

    #[test]
    fn displays_lowercase() {
        let id = CaId::from_str("0D7A9C1E-5B9F-4A3C-8E4B-2F1D3C5A7B9E").unwrap();
        assert_eq!(id.to_string(), "0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9e");
    }

    #[test]
    fn rejects_path_like_values() {
        assert!(!is_valid(""));
        assert!(!is_valid(".."));
        assert!(!is_valid("../0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9e"));
        assert!(!is_valid("0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9e/../../etc"));
        assert!(!is_valid("/etc/passwd"));
        assert!(!is_valid("0d7a9c1e/5b9f/4a3c/8e4b/2f1d3c5a7b9e"));
        assert!(!is_valid("0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9.."));
        assert!(!is_valid("..\\..\\windows-5b9f-4a3c-8e4b-2f1d3c5a7b"));
    }

    #[test]
    fn rejects_other_uuid_forms() {
        assert!(!is_valid("0d7a9c1e5b9f4a3c8e4b2f1d3c5a7b9e"));
        assert!(!is_valid("{0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9e}"));
        assert!(!is_valid("urn:uuid:0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9e"));
        assert!(!is_valid(" 0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9e"));
        assert!(!is_valid("0d7a9c1e-5b9f-4a3c-8e4b-2f1d3c5a7b9g"));
        assert!(!is_valid("0d7a9c1e-5b9f-4a3c-8e4b2-f1d3c5a7b9e"));
    }
}
