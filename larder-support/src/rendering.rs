//! Text rendering utilities for human-friendly error messages.
//!
//! Identifiers in Larder carry a free-form description. These helpers
//! derive descriptions from Rust type names and turn a list of registered
//! descriptions into "did you mean" hints.

/// Shortens a fully qualified type name for display.
///
/// ```
/// use larder_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>");
/// assert_eq!(short, "Arc<dyn Logger>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Ranks `available` descriptions by similarity to `requested`.
///
/// Returns at most `max_suggestions` entries, best match first. Exact
/// duplicates of `requested` are skipped: two identifiers may share a
/// description and still be distinct, and suggesting the same text back
/// is useless.
///
/// ```
/// use larder_support::rendering::suggest_similar;
///
/// let hints = suggest_similar("UserServise", &["UserService", "Database"], 3);
/// assert_eq!(hints, vec!["UserService".to_string()]);
/// ```
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    if max_suggestions == 0 {
        return Vec::new();
    }

    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    // stable: equal scores keep registration order
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Renders a hint line listing `suggestions`, or `None` when there are none.
///
/// ```
/// use larder_support::rendering::render_suggestions;
///
/// let hint = render_suggestions(&["Logger".to_string(), "LogSink".to_string()]);
/// assert_eq!(hint.as_deref(), Some("did you mean Logger, LogSink?"));
/// assert_eq!(render_suggestions(&[]), None);
/// ```
pub fn render_suggestions(suggestions: &[String]) -> Option<String> {
    if suggestions.is_empty() {
        return None;
    }
    Some(format!("did you mean {}?", suggestions.join(", ")))
}
