//! Phone number normalisation.
//!
//! Arbitrary user or address-book input is reduced to a canonical
//! `+<calling code><national number>` string so that numbers written in
//! different local conventions compare equal. Normalisation never fails
//! loudly: input that cannot be a phone number yields `None`.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calling_codes::{self, CallingCode};
use crate::constants::{
    DEFAULT_COUNTRY_CODE, INTERNATIONAL_PREFIX, LOCAL_NUMBER_DIGITS, MIN_PHONE_DIGITS,
};

/// A phone number in canonical international form, e.g. `+97312345678`.
///
/// Only [`normalize`] produces values; a deserialized value is trusted to
/// have been produced by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The number without its leading `+`.
    pub fn digits(&self) -> &str {
        self.0.trim_start_matches('+')
    }

    /// Calling code this number belongs to, when it is in the table.
    pub fn calling_code(&self) -> Option<&'static CallingCode> {
        calling_codes::match_prefix(self.digits())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalPhone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalPhone {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Keep only ASCII digits.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Normalise `raw` using `default_country_code` for bare local numbers.
///
/// Returns `None` when fewer than seven digits are present. A 7 or 8 digit
/// number that already starts with the default code is kept as is.
pub fn normalize(raw: &str, default_country_code: &str) -> Option<CanonicalPhone> {
    let digits = digits_only(raw);
    if digits.len() < MIN_PHONE_DIGITS {
        return None;
    }

    // International prefix, then any trunk zeros left in front of the number.
    let rest = digits
        .strip_prefix(INTERNATIONAL_PREFIX)
        .unwrap_or(&digits)
        .trim_start_matches('0');
    if rest.len() < MIN_PHONE_DIGITS {
        return None;
    }

    if let Some(cc) = calling_codes::match_prefix(rest) {
        let national = &rest[cc.prefix.len()..];
        return Some(CanonicalPhone(format!("+{}{national}", cc.prefix)));
    }

    // Already led by the default code: treat as canonical.
    let country = digits_only(default_country_code);
    let country = country.trim_start_matches('0');
    if LOCAL_NUMBER_DIGITS.contains(&rest.len())
        && !country.is_empty()
        && !rest.starts_with(country)
    {
        return Some(CanonicalPhone(format!("+{country}{rest}")));
    }

    Some(CanonicalPhone(format!("+{rest}")))
}

/// Lookup forms of `raw`: canonical with and without `+`.
///
/// Input that does not normalise falls back to its bare digits so that an
/// unparseable number still equals itself; input without digits has no
/// variants.
pub fn variants(raw: &str, default_country_code: &str) -> Vec<String> {
    match normalize(raw, default_country_code) {
        Some(phone) => vec![phone.as_str().to_string(), phone.digits().to_string()],
        None => {
            let digits = digits_only(raw);
            if digits.is_empty() {
                Vec::new()
            } else {
                vec![digits]
            }
        }
    }
}

/// Whether `a` and `b` share a lookup variant.
pub fn equals(a: &str, b: &str, default_country_code: &str) -> bool {
    let left = variants(a, default_country_code);
    variants(b, default_country_code)
        .iter()
        .any(|v| left.contains(v))
}

/// Human readable form, e.g. `+973 1234 5678`.
///
/// Falls back to `raw` when the number does not normalise or its country
/// has no grouping rule.
pub fn display(raw: &str, default_country_code: &str) -> String {
    normalize(raw, default_country_code)
        .and_then(|phone| {
            let cc = phone.calling_code()?;
            let national = &phone.digits()[cc.prefix.len()..];
            calling_codes::format_grouped(cc.prefix, national)
        })
        .unwrap_or_else(|| raw.to_string())
}

/// Normaliser bound to the host application's default country code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNormalizer {
    default_country_code: String,
}

impl PhoneNormalizer {
    pub fn new(default_country_code: impl Into<String>) -> Self {
        Self {
            default_country_code: default_country_code.into(),
        }
    }

    pub fn default_country_code(&self) -> &str {
        &self.default_country_code
    }

    pub fn normalize(&self, raw: &str) -> Option<CanonicalPhone> {
        normalize(raw, &self.default_country_code)
    }

    pub fn variants(&self, raw: &str) -> Vec<String> {
        variants(raw, &self.default_country_code)
    }

    pub fn equals(&self, a: &str, b: &str) -> bool {
        equals(a, b, &self.default_country_code)
    }

    pub fn display(&self, raw: &str) -> String {
        display(raw, &self.default_country_code)
    }
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTRY_CODE)
    }
}
