//! Raw phone-number input to canonical [`RecipientId`].
//!
//! Canonical form is `<prefix><10 digits><suffix>`, e.g. `919876543210@c.us`.
//! Anything else is rejected silently: callers drop rejected inputs and
//! report only how many were dropped.

use std::fmt;

use regex::Regex;
use serde::{Serialize, Serializer};

use super::ContactsError;

/// Default country-code prefix.
pub const DEFAULT_COUNTRY_PREFIX: &str = "91";

/// Default domain suffix of a WhatsApp user JID.
pub const DEFAULT_DOMAIN_SUFFIX: &str = "@c.us";

/// Number of subscriber digits after the country prefix.
const SUBSCRIBER_DIGITS: usize = 10;

/// Digits left visible by [`mask`].
const VISIBLE_TAIL: usize = 4;

/// A validated, canonical recipient address.
///
/// Only [`Normalizer::normalize`] produces these, so every value matches the
/// canonical shape and equality is plain string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientId(String);

impl RecipientId {
    /// The full canonical address including the domain suffix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The address without its domain suffix, as written to group files.
    pub fn bare(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(digits, _)| digits)
    }

    /// Display form revealing only the last four digits.
    pub fn masked(&self) -> String {
        mask(self.bare())
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RecipientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Mask a number for display: `919876543210@c.us` becomes `XXXXXX3210`.
pub fn mask(number: &str) -> String {
    let bare = number.split_once('@').map_or(number, |(digits, _)| digits);
    if bare.is_empty() {
        return "Hidden Number".to_owned();
    }
    let tail: String = {
        let mut chars: Vec<char> = bare.chars().rev().take(VISIBLE_TAIL).collect();
        chars.reverse();
        chars.into_iter().collect()
    };
    format!("XXXXXX{tail}")
}

/// Turns raw identifier strings into canonical [`RecipientId`]s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    prefix: String,
    suffix: String,
    shape: Regex,
}

impl Normalizer {
    /// Build a normalizer for the given country prefix and domain suffix.
    ///
    /// # Errors
    ///
    /// Returns [`ContactsError::InvalidNormalizer`] if the prefix is not
    /// all ASCII digits or the suffix does not start with `@`.
    pub fn new(prefix: &str, suffix: &str) -> Result<Self, ContactsError> {
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ContactsError::InvalidNormalizer(format!(
                "country prefix must be digits, got {prefix:?}"
            )));
        }
        if !suffix.starts_with('@') {
            return Err(ContactsError::InvalidNormalizer(format!(
                "domain suffix must start with '@', got {suffix:?}"
            )));
        }
        let pattern = format!(
            "^{}[0-9]{{{SUBSCRIBER_DIGITS}}}{}$",
            regex::escape(prefix),
            regex::escape(suffix)
        );
        let shape = Regex::new(&pattern)
            .map_err(|e| ContactsError::InvalidNormalizer(e.to_string()))?;
        Ok(Self {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
            shape,
        })
    }

    /// Normalize one raw input, or `None` if it cannot be made canonical.
    pub fn normalize(&self, raw: &str) -> Option<RecipientId> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let digits = digits.trim_start_matches('0');

        let mut candidate = String::with_capacity(
            digits
                .len()
                .saturating_add(self.prefix.len())
                .saturating_add(self.suffix.len()),
        );
        if digits.len() == SUBSCRIBER_DIGITS && !digits.starts_with(&self.prefix) {
            candidate.push_str(&self.prefix);
        }
        candidate.push_str(digits);
        candidate.push_str(&self.suffix);

        self.shape
            .is_match(&candidate)
            .then_some(RecipientId(candidate))
    }

    /// Normalize a batch, dropping rejects and keeping input order.
    ///
    /// Duplicates are kept; the registry applies set semantics on insert.
    pub fn normalize_all<I, S>(&self, raw: I) -> Vec<RecipientId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .filter_map(|r| self.normalize(r.as_ref()))
            .collect()
    }
}
