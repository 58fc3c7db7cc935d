use std::sync::LazyLock;

use regex::Regex;

/// A username extracted from a delivery list, together with the site it was
/// declared for. MassMessage target lists track usernames along with the
/// wiki that username belongs to; a missing site means the caller must
/// supply one before any lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsernameWithSite {
    pub username: String,
    pub site: Option<String>,
}

impl UsernameWithSite {
    pub fn new(username: impl Into<String>, site: Option<String>) -> Self {
        Self {
            username: username.into(),
            site,
        }
    }
}

// Only the user-before-site field order is recognized;
// {{target | site = ... | user = ...}} does not match.
static TARGET_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*target\s*\|\s*user\s*=\s*(.+?)\s*(?:\|\s*site\s*=\s*(.+?)\s*)?\s*\}\}")
        .expect("regex is valid")
});

/// Extract every `{{target | user = Username | site = en.wikipedia.org}}`
/// occurrence from one line, left to right. Lines without any occurrence
/// yield an empty sequence.
pub fn parse_line(line: &str) -> impl Iterator<Item = UsernameWithSite> + '_ {
    TARGET_TEMPLATE.captures_iter(line).map(|captures| {
        let username = captures[1].trim().to_string();
        let site = captures
            .get(2)
            .map(|matched| matched.as_str().trim().to_string());
        UsernameWithSite { username, site }
    })
}
