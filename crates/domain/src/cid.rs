//! Controller identifier canonicalisation.
//!
//! A CID is a 3-10 digit decimal string. Canonical form strips all
//! non-digit characters, then re-renders as the decimal string of the
//! parsed integer so leading zeros never survive a round trip.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, used for watchlist sort order (insertion order is
    /// the sorted numeric order).
    pub fn numeric(&self) -> u64 {
        // Canonical form is always parseable; constructed only via `parse`.
        self.0.parse().expect("canonical CID is always numeric")
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(Error::ClientInput("Invalid CID format".into()));
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| Error::ClientInput("Invalid CID format".into()))?;
        let canonical = value.to_string();
        if canonical.len() < 3 || canonical.len() > 10 {
            return Err(Error::ClientInput("Invalid CID format".into()));
        }
        Ok(Self(canonical))
    }
}

/// Never a valid canonical CID — exists only so types embedding a `Cid`
/// can derive `Default` for struct-update construction; always overwritten
/// before use.
impl Default for Cid {
    fn default() -> Self {
        Cid(String::new())
    }
}

impl TryFrom<String> for Cid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_digits() {
        assert_eq!(Cid::parse("1234567").unwrap().as_str(), "1234567");
    }

    #[test]
    fn strips_non_digits() {
        assert_eq!(Cid::parse(" 123-456 ").unwrap().as_str(), "123456");
    }

    #[test]
    fn strips_leading_zeros() {
        assert_eq!(Cid::parse("0012345").unwrap().as_str(), "12345");
    }

    #[test]
    fn rejects_too_short() {
        assert!(Cid::parse("12").is_err());
    }

    #[test]
    fn rejects_too_long() {
        assert!(Cid::parse("12345678901").is_err());
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(Cid::parse("abc").is_err());
    }

    #[test]
    fn numeric_sort_order() {
        let a = Cid::parse("123").unwrap();
        let b = Cid::parse("456").unwrap();
        assert!(a.numeric() < b.numeric());
    }
}
