// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Short-lived email verification codes.
//!
//! Codes live only in process memory and are lost on restart. Keys are
//! normalized emails (NFKC, trimmed, lowercased) so that visually identical
//! addresses share one entry.

use rand::Rng;
use unicode_normalization::UnicodeNormalization;

mod memory;

pub use memory::InMemoryVerificationStore;

/// Number of digits in an issued code.
pub const CODE_DIGITS: usize = 6;

/// Wrong guesses allowed per issued code; the last one discards it.
pub const MAX_CONFIRM_ATTEMPTS: u32 = 5;

/// Result of checking a submitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Code matched and the entry was consumed.
    Confirmed,
    /// An entry exists but the code differs; the entry is kept.
    Mismatch,
    /// The code differs and the attempt limit was reached; the entry is gone.
    Exhausted,
    /// No live entry for this email.
    Missing,
}

/// email → code mapping. Last write wins.
pub trait VerificationStore: Send + Sync {
    fn set(&self, email: &str, code: String);

    fn get(&self, email: &str) -> Option<String>;

    /// Remove the entry, returning the code it held.
    fn remove(&self, email: &str) -> Option<String>;

    /// Consume the entry if `code` matches it.
    ///
    /// Each mismatch counts against the entry; after
    /// [`MAX_CONFIRM_ATTEMPTS`] mismatches the entry is discarded.
    fn confirm(&self, email: &str, code: &str) -> ConfirmOutcome;
}

/// Canonical store key for an email address.
pub fn normalize_email(email: &str) -> String {
    email.nfkc().collect::<String>().trim().to_lowercase()
}

/// Rough shape check: one `@` with text on both sides.
pub fn is_plausible_email(email: &str) -> bool {
    let normalized = normalize_email(email);
    match normalized.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !normalized.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Fresh zero-padded numeric code, uniform over all `CODE_DIGITS`-digit values.
pub fn generate_code() -> String {
    let n = rand::rng().random_range(0..10u32.pow(CODE_DIGITS as u32));
    format!("{n:0width$}", width = CODE_DIGITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_normalize_case_width_and_whitespace() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
        // Fullwidth letters fold under NFKC.
        assert_eq!(normalize_email("ＡＤＡ@example.com"), "ada@example.com");
    }

    #[test]
    fn plausible_email_check() {
        assert!(is_plausible_email("ada@example.com"));
        assert!(!is_plausible_email("ada"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ada@"));
        assert!(!is_plausible_email("a@b@c"));
        assert!(!is_plausible_email("a da@example.com"));
    }

    #[test]
    fn codes_spread_over_the_whole_range() {
        let distinct: std::collections::HashSet<String> =
            (0..200).map(|_| generate_code()).collect();
        assert!(distinct.len() > 190);
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_DIGITS);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
