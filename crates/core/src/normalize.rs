//! Field normalization: raw source rows to canonical records.
//!
//! Every function here is pure and total. Malformed input degrades to a
//! default or passes through; it never produces an error.

use regex::Regex;
use std::sync::LazyLock;

use crate::record::{CanonicalRecord, RawRecord, DEFAULT_STATUS};

static NON_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9]").expect("static regex"));

/// Normalizes one raw record.
pub fn normalize(raw: RawRecord) -> CanonicalRecord {
    CanonicalRecord {
        nom: raw.nom.to_uppercase(),
        prenom: capitalize(&raw.prenom.to_lowercase()),
        email: raw.email.to_lowercase(),
        telephone: format_phone(raw.telephone.as_deref()),
        adresse: raw.adresse,
        ville: raw.ville.filter(|v| !v.is_empty()).map(|v| capitalize(&v)),
        code_postal: raw.code_postal,
        date_naissance: raw.date_naissance,
        statut: raw.statut.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        updated_at: raw.updated_at,
    }
}

/// Formats a phone number.
///
/// Non-digits are stripped. Exactly ten digits are regrouped as five pairs
/// separated by single spaces; any other digit count is returned as the bare
/// digit string. Absent or empty input stays absent.
pub fn format_phone(phone: Option<&str>) -> Option<String> {
    let phone = phone.filter(|p| !p.is_empty())?;
    let digits = NON_DIGIT.replace_all(phone, "");

    if digits.len() != 10 {
        return Some(digits.into_owned());
    }

    let pairs: Vec<&str> = (0..10).step_by(2).map(|i| &digits[i..i + 2]).collect();
    Some(pairs.join(" "))
}

/// Upper-cases the first character and leaves the rest untouched.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
