//! Matching policy for free-text lookups
//!
//! Bills and accounts are located from utterance fragments ("aluguel",
//! "Itaú"), so lookups are case-insensitive substring matches. The policy
//! lives here so both store backends share one definition and the
//! heuristic can change without touching handler logic.

/// Builds the `ILIKE` pattern for a user-supplied fragment, escaping the
/// wildcard characters so the fragment is matched literally.
pub fn sql_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    for c in fragment.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("%{}%", escaped)
}

/// In-memory counterpart of the SQL pattern: case-insensitive containment.
pub fn contains(haystack: &str, fragment: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(fragment.trim().to_lowercase().as_str())
}
