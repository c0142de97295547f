//! Session ID generation
//!
//! All IDs use the format: `{6-char-hex}-sess-{slug}`
//! Example: `019a42-sess-weekly-report-workflow`

/// Generate a session ID from the initial request text
pub fn generate_id(initial_request: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    let slug = slugify(initial_request);
    if slug.is_empty() {
        format!("{}-sess", hex_prefix)
    } else {
        format!("{}-sess-{}", hex_prefix, slug)
    }
}

/// Slugify request text for use in IDs
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .take(5)
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(50)
        .collect()
}
