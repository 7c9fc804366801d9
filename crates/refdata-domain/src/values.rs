//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Value objects shared by entities."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;
use crate::messages::ERROR_MONEY_INVALID;

/// Business code. Surrounding whitespace is dropped and comparison ignores case.
#[derive(Debug, Clone, Eq)]
pub struct Code(String);

impl Code {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercased form used for unique indexes and lookups.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0) || self.normalized() == other.normalized()
    }
}

impl Hash for Code {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Code {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Non-negative monetary amount kept in its decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Money(String);

impl Money {
    pub fn zero() -> Self {
        Self("0.00".to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        let (whole, fraction) = match value.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (value, None),
        };
        let digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
        if !digits(whole) || fraction.is_some_and(|f| !digits(f)) {
            return Err(DomainError::validation(
                ERROR_MONEY_INVALID,
                format!("'{raw}' is not a non-negative decimal amount"),
            ));
        }
        Ok(Self(value.to_owned()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// How an orderable is dispensed to patients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispensable {
    pub dispensing_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_of_administration: Option<String>,
}

impl Dispensable {
    pub fn of_unit(unit: impl Into<String>) -> Self {
        Self {
            dispensing_unit: unit.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for Dispensable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.size_code, &self.route_of_administration) {
            (Some(size), _) => f.write_str(size),
            (None, Some(route)) => f.write_str(route),
            (None, None) => f.write_str(&self.dispensing_unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_compare_case_insensitively() {
        let a = Code::new(" SN1 ");
        let b = Code::new("sn1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "SN1");
        let set: HashSet<Code> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn money_accepts_numbers_and_strings() {
        let from_number: Money = serde_json::from_str("12.50").unwrap();
        let from_text: Money = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(from_number.as_str(), "12.5");
        assert_eq!(from_text.as_str(), "3");
    }

    #[test]
    fn money_rejects_negative_and_garbage() {
        assert!("-1".parse::<Money>().is_err());
        assert!("1.".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn dispensable_prefers_size_code() {
        let mut dispensable = Dispensable::of_unit("tablet");
        assert_eq!(dispensable.to_string(), "tablet");
        dispensable.size_code = Some("1ml".into());
        assert_eq!(dispensable.to_string(), "1ml");
    }
}
