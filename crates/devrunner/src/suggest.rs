//! "Did you mean" suggestions for mistyped script names

use strsim::normalized_levenshtein;

/// Minimum similarity for a suggestion
pub const THRESHOLD: f64 = 0.5;

/// The declared name `input` refers to: an exact match, else the first
/// case-insensitive one
pub fn find_known<'a>(input: &str, names: &[&'a str]) -> Option<&'a str> {
    names
        .iter()
        .find(|name| **name == input)
        .or_else(|| names.iter().find(|name| name.eq_ignore_ascii_case(input)))
        .copied()
}

pub fn is_known(input: &str, names: &[&str]) -> bool {
    find_known(input, names).is_some()
}

/// Candidates scoring at least [`THRESHOLD`], best first
pub fn ranked<'a>(input: &str, names: &[&'a str]) -> Vec<(&'a str, f64)> {
    let input = input.to_lowercase();

    let mut scored: Vec<(&str, f64)> = names
        .iter()
        .map(|name| (*name, normalized_levenshtein(&input, &name.to_lowercase())))
        .filter(|(_, score)| *score >= THRESHOLD)
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
}

/// Closest name to `input`, if any is close enough
pub fn closest<'a>(input: &str, names: &[&'a str]) -> Option<&'a str> {
    ranked(input, names).first().map(|(name, _)| *name)
}
