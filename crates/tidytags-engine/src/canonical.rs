use std::collections::BTreeSet;

/// Display form of a tag: upper-case for known acronyms, title case
/// otherwise. Depends only on the lower-cased input, so spellings that
/// differ by case always normalize identically.
pub fn normalize_case(raw: &str, acronyms: &BTreeSet<String>) -> String {
    let lower = raw.to_lowercase();
    if acronyms.contains(&lower) {
        return lower.to_uppercase();
    }
    title_case(&lower)
}

pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_capital = true;
    for ch in input.chars() {
        if ch.is_whitespace() {
            pending_capital = true;
            out.push(ch);
        } else if pending_capital && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
            pending_capital = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Canonical spelling for a group of variants, derived from the first one.
/// Callers order variants by descending usage before calling.
pub fn choose_canonical_form<S: AsRef<str>>(
    variants: &[S],
    acronyms: &BTreeSet<String>,
) -> Option<String> {
    variants
        .first()
        .map(|first| normalize_case(first.as_ref(), acronyms))
}
