//! Placeholder interpolation over raw config text.
//!
//! A `$NAME$` token is replaced with the value of the environment variable
//! the mapping assigns to `NAME`. Substitution runs on the document text
//! before JSON parsing, so substituted values are trusted input and may
//! carry JSON structure.

use std::collections::HashMap;

/// Substitute placeholders using the process environment.
pub fn interpolate_env(text: &str, mapping: &HashMap<String, String>) -> String {
    interpolate(text, mapping, |var| std::env::var(var).ok())
}

/// Substitute placeholders using `lookup` to resolve variable names.
///
/// Single left-to-right pass: replaced text is never rescanned, and a `$`
/// that does not open a mapped placeholder is copied verbatim. Unset
/// variables substitute the empty string.
pub fn interpolate<F>(text: &str, mapping: &HashMap<String, String>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if mapping.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let replaced = after.find('$').and_then(|end| {
            let name = &after[..end];
            mapping.get(name).map(|var| (lookup(var).unwrap_or_default(), end))
        });

        match replaced {
            Some((value, end)) => {
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
