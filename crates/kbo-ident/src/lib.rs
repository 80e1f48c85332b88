//! The 10-digit Belgian enterprise number: parsing, checksum validation,
//! and canonical formatting.

use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("{0:?} is not a valid enterprise number")]
    InvalidIdentifier(String),
}

/// A validated 10-digit enterprise number, stored as its numeric value.
///
/// Validity requires exactly 10 digits and a checksum on the last two:
/// `chk == 97 - (head mod 97)` where `head` is the first eight digits.
/// A weaker legacy check (`head < 1e8`) exists in older data but is not
/// honored here; data failing the checksum is `InvalidIdentifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct EnterpriseNumber(u64);

const MODULUS: u64 = 97;

impl EnterpriseNumber {
    /// Parses `s`, keeping only its decimal digits, and validates the checksum.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() != 10 {
            return Err(Error::InvalidIdentifier(s.to_string()));
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| Error::InvalidIdentifier(s.to_string()))?;

        let head = n / 100;
        let chk = n % 100;
        let expected = MODULUS - (head % MODULUS);
        if chk != expected {
            return Err(Error::InvalidIdentifier(s.to_string()));
        }
        Ok(Self(n))
    }

    /// The raw 10-digit numeric value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Formats as `NNNN.NNN.NNN`, matching the `"F"` format specifier.
    pub fn format_f(self) -> String {
        let head = self.0 / 100;
        let chk = self.0 % 100;
        format!("{:04}.{:03}.{:03}", head / 1000, head % 1000, chk)
    }
}

impl fmt::Display for EnterpriseNumber {
    /// The display-default format is the unformatted 10-digit string,
    /// zero-padded.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}", self.0)
    }
}

/// An establishment number has the same textual shape as an enterprise
/// number but its first digit is >= 2, and it carries no checksum rule;
/// it is kept as an opaque string rather than parsed into a value type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct EstablishmentNumber(String);

impl EstablishmentNumber {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EstablishmentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `entity_number` is a polymorphic key that denotes an enterprise,
/// establishment, or branch. The rule for telling them apart — "has
/// exactly two dots means enterprise" — is brittle but intentional;
/// keep it encapsulated here rather than re-implemented at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Enterprise,
    Other,
}

pub fn classify_entity_number(entity_number: &str) -> EntityKind {
    if entity_number.matches('.').count() == 2 {
        EntityKind::Enterprise
    } else {
        EntityKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            EnterpriseNumber::parse("12345"),
            Err(Error::InvalidIdentifier("12345".to_string()))
        );
    }

    #[test]
    fn roundtrips_canonical_form() {
        // head = 4031997, chk = 97 - (4031997 % 97)
        let head = 4031997u64;
        let chk = MODULUS - (head % MODULUS);
        let n = head * 100 + chk;
        let canonical = format!(
            "{:04}.{:03}.{:03}",
            head / 1000,
            head % 1000,
            chk
        );
        let parsed = EnterpriseNumber::parse(&canonical).unwrap();
        assert_eq!(parsed.value(), n);
        assert_eq!(parsed.format_f(), canonical);
    }

    #[test]
    fn rejects_bad_checksum() {
        let head = 4031997u64;
        let bad_chk = (MODULUS - (head % MODULUS) + 1) % 100;
        let s = format!("{head:08}{bad_chk:02}");
        assert!(EnterpriseNumber::parse(&s).is_err());
    }

    #[test]
    fn classifies_entity_numbers() {
        assert_eq!(classify_entity_number("0403.199.702"), EntityKind::Enterprise);
        assert_eq!(classify_entity_number("2123456789"), EntityKind::Other);
    }

    #[test]
    fn display_is_unformatted_digits() {
        let head = 4031997u64;
        let chk = MODULUS - (head % MODULUS);
        let n = head * 100 + chk;
        let s = format!("{n:010}");
        let parsed = EnterpriseNumber::parse(&s).unwrap();
        assert_eq!(parsed.to_string(), s);
    }
}
